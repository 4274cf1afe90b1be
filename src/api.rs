//! The single configured HTTP client every component talks through.
//!
//! Any status below 500 counts as a successful transport: business failures
//! are signalled by `meta.success == false` inside the envelope. Statuses of
//! 500 and above surface as `AppError::Server`.

use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::config::Config;
use crate::error::AppError;
use crate::models::Envelope;
use crate::session::SessionHandle;

pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: SessionHandle,
}

impl ApiClient {
    pub fn new(config: &Config, session: SessionHandle) -> Result<Self, AppError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_str(&config.locale)
                .map_err(|e| AppError::Config(format!("Invalid locale: {}", e)))?,
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            session,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Starts a request, attaching `Authorization: Bearer <token>` when a
    /// session is active at this moment.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, self.url(path));
        match self.session.token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Sends a request and decodes the `{ data, meta }` envelope.
    pub async fn send<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> Result<Envelope<T>, AppError> {
        let response = builder.send().await?;
        let status = response.status();
        debug!("{} {}", status.as_u16(), response.url().path());
        accept_status(status)?;

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Sends a request whose outcome is carried by the status code alone
    /// (e.g. deletions answering 204 No Content).
    pub async fn send_for_status(&self, builder: RequestBuilder) -> Result<StatusCode, AppError> {
        let response = builder.send().await?;
        let status = response.status();
        debug!("{} {}", status.as_u16(), response.url().path());
        accept_status(status)?;
        Ok(status)
    }

    pub async fn get(&self, path: &str) -> Result<Envelope<Value>, AppError> {
        self.send(self.request(Method::GET, path)).await
    }

    pub async fn get_with_params(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<Envelope<Value>, AppError> {
        self.send(self.request(Method::GET, path).query(params)).await
    }

    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Envelope<Value>, AppError> {
        self.send(self.request(Method::POST, path).json(body)).await
    }

    pub async fn put_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Envelope<Value>, AppError> {
        self.send(self.request(Method::PUT, path).json(body)).await
    }

    pub async fn patch_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Envelope<Value>, AppError> {
        self.send(self.request(Method::PATCH, path).json(body)).await
    }

    /// Multipart upload. The form sets its own `multipart/form-data` content
    /// type, overriding the JSON default.
    pub async fn post_multipart(
        &self,
        path: &str,
        form: reqwest::multipart::Form,
    ) -> Result<Envelope<Value>, AppError> {
        self.send(self.request(Method::POST, path).multipart(form)).await
    }

    pub async fn delete(&self, path: &str) -> Result<StatusCode, AppError> {
        self.send_for_status(self.request(Method::DELETE, path)).await
    }
}

fn accept_status(status: StatusCode) -> Result<(), AppError> {
    if status.as_u16() >= 500 {
        return Err(AppError::Server {
            status: status.as_u16(),
        });
    }
    Ok(())
}
