pub mod book;
pub mod envelope;
pub mod notification;
pub mod user;

pub use book::{Book, Document, DocumentModel, DocumentUpload, FileUpload};
pub use envelope::{Envelope, Meta};
pub use notification::{MobileAction, Notification};
pub use user::{Role, User};
