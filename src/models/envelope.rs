use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AppError;

/// Metadata attached to every API response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    /// Business-level outcome. `false` is a recoverable result, never a transport error.
    pub success: bool,
    /// Total number of matching rows for list endpoints.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    /// Server-provided error detail; shape varies per endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Value>,
}

/// The `{ data, meta }` wrapper returned by every endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T = Value> {
    #[serde(default = "Option::default")]
    pub data: Option<T>,
    pub meta: Meta,
}

impl<T> Envelope<T> {
    pub fn success(data: T) -> Self {
        Self {
            data: Some(data),
            meta: Meta {
                success: true,
                ..Meta::default()
            },
        }
    }

    /// A non-success envelope produced locally, e.g. when sign-in could not
    /// reach the server or its input was rejected before sending.
    pub fn failure(errors: impl Into<Value>) -> Self {
        Self {
            data: None,
            meta: Meta {
                success: false,
                count: None,
                errors: Some(errors.into()),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        self.meta.success
    }

    pub fn count(&self) -> Option<u64> {
        self.meta.count
    }

    /// Human-readable rendering of `meta.errors` for user-facing messages.
    pub fn error_text(&self) -> String {
        match &self.meta.errors {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(text)) => text.clone(),
            Some(other) => other.to_string(),
        }
    }
}

impl Envelope<Value> {
    /// Re-reads the untyped `data` payload as `U`.
    ///
    /// Returns `Ok(None)` when the envelope carries no data.
    pub fn parse_data<U: DeserializeOwned>(&self) -> Result<Option<U>, AppError> {
        match &self.data {
            None | Some(Value::Null) => Ok(None),
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
        }
    }

    /// Converts into a typed envelope, keeping `meta` untouched.
    pub fn typed<U: DeserializeOwned>(self) -> Result<Envelope<U>, AppError> {
        let data = match self.data {
            None | Some(Value::Null) => None,
            Some(value) => Some(serde_json::from_value(value)?),
        };
        Ok(Envelope {
            data,
            meta: self.meta,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_deserialization() {
        let envelope: Envelope = serde_json::from_value(json!({
            "data": [{ "id": 1 }],
            "meta": { "success": true, "count": 12 }
        }))
        .unwrap();
        assert!(envelope.is_success());
        assert_eq!(envelope.count(), Some(12));
        assert_eq!(envelope.error_text(), "");

        // `data` may be missing entirely on failures
        let envelope: Envelope = serde_json::from_value(json!({
            "meta": { "success": false, "errors": "Invalid credentials" }
        }))
        .unwrap();
        assert!(!envelope.is_success());
        assert!(envelope.data.is_none());
        assert_eq!(envelope.error_text(), "Invalid credentials");
    }

    #[test]
    fn test_structured_errors_are_rendered_as_json() {
        let envelope: Envelope = Envelope::failure(json!({ "title": ["required"] }));
        assert_eq!(envelope.error_text(), r#"{"title":["required"]}"#);
    }

    #[test]
    fn test_typed_conversion() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Item {
            id: i64,
        }

        let envelope: Envelope = Envelope::success(json!({ "id": 7 }));
        assert_eq!(envelope.parse_data::<Item>().unwrap(), Some(Item { id: 7 }));

        let typed: Envelope<Item> = envelope.typed().unwrap();
        assert_eq!(typed.data, Some(Item { id: 7 }));
        assert!(typed.is_success());

        let bad: Envelope = Envelope::success(json!({ "id": "seven" }));
        assert!(bad.parse_data::<Item>().is_err());
    }
}
