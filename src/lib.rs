#![doc = "The `onlibrary` library crate."]
#![doc = ""]
#![doc = "Client-side core of the OnLibrary library-management app: session persistence,"]
#![doc = "the authenticated HTTP client, sign-in, list queries, notifications, books and profile."]
#![doc = "The `onlibrary` binary (`main.rs`) drives it from the command line."]

pub mod api;
pub mod app;
pub mod auth;
pub mod books;
pub mod config;
pub mod error;
pub mod models;
pub mod notice;
pub mod notifications;
pub mod profile;
pub mod query;
pub mod session;
pub mod storage;

pub use crate::app::AppState;
pub use crate::config::Config;
pub use crate::error::AppError;
