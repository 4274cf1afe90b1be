use std::fmt;

use crate::models::Envelope;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Success,
    Error,
}

/// A short message for the user about the outcome of an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub text: String,
}

impl Notice {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Info,
            text: text.into(),
        }
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Success,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            text: text.into(),
        }
    }

    /// Error notice for a failed action: `"<context>: <server errors>"`, or
    /// just the context when no envelope came back at all.
    pub fn failure<T>(context: &str, envelope: Option<&Envelope<T>>) -> Self {
        match envelope.map(Envelope::error_text) {
            Some(errors) if !errors.is_empty() => Self::error(format!("{}: {}", context, errors)),
            _ => Self::error(context),
        }
    }

    /// `None` when the envelope reports success; otherwise the failure notice.
    pub fn from_envelope<T>(context: &str, envelope: Option<&Envelope<T>>) -> Option<Self> {
        match envelope {
            Some(envelope) if envelope.is_success() => None,
            other => Some(Self::failure(context, other)),
        }
    }

    pub fn is_error(&self) -> bool {
        self.kind == NoticeKind::Error
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.kind {
            NoticeKind::Info => "info",
            NoticeKind::Success => "ok",
            NoticeKind::Error => "error",
        };
        write!(f, "[{}] {}", label, self.text)
    }
}
