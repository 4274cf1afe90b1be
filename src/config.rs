use std::env;
use std::path::PathBuf;

use crate::error::AppError;

pub const DEFAULT_BASE_URL: &str = "https://onlibrary.mhsw.com.br";
pub const DEFAULT_USER_AGENT: &str = "mobileonlibrary";
const DEFAULT_LOCALE: &str = "en";

#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    pub locale: String,
    pub user_agent: String,
    pub data_dir: PathBuf,
}

impl Config {
    /// Builds the configuration from the process environment.
    ///
    /// - `ONLIBRARY_BASE_URL`: API address, defaults to the hosted service.
    /// - `ONLIBRARY_LOCALE`: `Accept-Language` value, defaults to the language
    ///   part of `LANG` (`pt_BR.UTF-8` -> `pt`).
    /// - `ONLIBRARY_USER_AGENT`: defaults to `mobileonlibrary`.
    /// - `ONLIBRARY_DATA_DIR`: where the session file lives.
    pub fn from_env() -> Result<Self, AppError> {
        let base_url = env::var("ONLIBRARY_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string())
            .trim()
            .trim_end_matches('/')
            .to_string();
        if base_url.is_empty() {
            return Err(AppError::Config(
                "No server domain set, ONLIBRARY_BASE_URL is empty".into(),
            ));
        }

        let locale = match env::var("ONLIBRARY_LOCALE") {
            Ok(locale) if !locale.trim().is_empty() => locale.trim().to_string(),
            _ => env::var("LANG")
                .ok()
                .and_then(|lang| language_code(&lang))
                .unwrap_or_else(|| DEFAULT_LOCALE.to_string()),
        };

        let user_agent =
            env::var("ONLIBRARY_USER_AGENT").unwrap_or_else(|_| DEFAULT_USER_AGENT.to_string());

        let data_dir = match env::var("ONLIBRARY_DATA_DIR") {
            Ok(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
            _ => dirs::data_dir()
                .unwrap_or_else(env::temp_dir)
                .join("onlibrary"),
        };

        Ok(Self {
            base_url,
            locale,
            user_agent,
            data_dir,
        })
    }

    /// Configuration pointing at an explicit server, used by tests and embedders.
    pub fn with_base_url(base_url: impl Into<String>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            locale: DEFAULT_LOCALE.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            data_dir: data_dir.into(),
        }
    }

    pub fn session_file(&self) -> PathBuf {
        self.data_dir.join("session.json")
    }
}

// Only the main language code is sent, region and encoding are dropped.
fn language_code(raw: &str) -> Option<String> {
    let code = raw
        .split(|c| c == '_' || c == '-' || c == '.')
        .next()
        .unwrap_or_default()
        .trim();
    if code.is_empty() || code.eq_ignore_ascii_case("C") || code.eq_ignore_ascii_case("POSIX") {
        None
    } else {
        Some(code.to_lowercase())
    }
}
