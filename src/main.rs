use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use log::error;
use serde::Serialize;

use onlibrary::auth::SignInCredentials;
use onlibrary::books::{BookFilter, BookSort};
use onlibrary::models::{DocumentUpload, Envelope, FileUpload, Notification};
use onlibrary::notice::Notice;
use onlibrary::notifications::{NotificationFilter, ReadFilter, NOTIFICATIONS_ROUTE};
use onlibrary::profile::{PasswordChange, ProfileUpdate};
use onlibrary::query::{Direction, Latest};
use onlibrary::{AppError, AppState, Config};

#[derive(Parser)]
#[command(name = "onlibrary", version, about = "OnLibrary command-line client")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in and keep the session for later commands
    Login {
        /// Falls back to the remembered username
        username: Option<String>,
        #[arg(long, env = "ONLIBRARY_PASSWORD", hide_env_values = true)]
        password: String,
        /// Remember the username for the next sign-in
        #[arg(long)]
        remember: bool,
    },
    Logout,
    Whoami,
    /// Cache the device push token, sent to the server on the next sign-in
    PushToken { token: String },
    Books {
        #[arg(long, default_value = "")]
        title: String,
        #[arg(long, default_value = "")]
        author: String,
        /// Available from (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Available until (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,
        #[arg(long, value_enum, default_value_t = SortArg::Title)]
        sort: SortArg,
        #[arg(long)]
        asc: bool,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },
    Book { id: i64 },
    Documents {
        book_id: i64,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },
    UploadDocument {
        book_id: i64,
        file: PathBuf,
        #[arg(long)]
        description: String,
        #[arg(long, default_value = "")]
        observations: String,
    },
    UploadPhoto { book_id: i64, file: PathBuf },
    Notifications {
        #[arg(long, default_value = "")]
        search: String,
        #[arg(long, value_enum, default_value_t = ReadArg::Unread)]
        show: ReadArg,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },
    /// Toggle the read state of a notification
    Read { id: i64 },
    /// Show a notification, marking it read
    Open { id: i64 },
    DeleteNotification { id: i64 },
    UpdateProfile {
        #[arg(long)]
        name: String,
        #[arg(long)]
        username: String,
    },
    ChangePassword {
        #[arg(long)]
        current: String,
        #[arg(long)]
        new: String,
        #[arg(long)]
        confirmation: String,
    },
    UploadAvatar { file: PathBuf },
}

#[derive(Clone, Copy, ValueEnum)]
enum SortArg {
    Title,
    Id,
}

#[derive(Clone, Copy, ValueEnum)]
enum ReadArg {
    All,
    Read,
    Unread,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();
    match run(cli.command).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{}", e);
            eprintln!("{}", Notice::error(e.to_string()));
            ExitCode::FAILURE
        }
    }
}

// Ok(false) means the server answered but the action did not succeed.
async fn run(command: Command) -> Result<bool, AppError> {
    let state = AppState::new(Config::from_env()?)?;
    state.auth.restore().await;

    match command {
        Command::Login {
            username,
            password,
            remember,
        } => {
            let username = match username {
                Some(username) => username,
                None => state
                    .auth
                    .store()
                    .remembered_username()
                    .await?
                    .unwrap_or_default(),
            };
            let credentials = SignInCredentials::new(username.clone(), password);
            let envelope = state.auth.sign_in(&credentials).await?;
            if !report("Error while signing in", Some(&envelope)) {
                return Ok(false);
            }
            let remembered = remember.then_some(username.as_str());
            state.auth.store().remember_username(remembered).await?;
            if let Some(user) = state.session.user() {
                println!("{}", Notice::success(format!("Signed in as {}", user.username)));
            }
            Ok(true)
        }
        Command::Logout => {
            state.auth.sign_out().await?;
            println!("{}", Notice::info("Signed out"));
            Ok(true)
        }
        Command::Whoami => match state.session.user() {
            Some(user) => print_json(&user),
            None => {
                println!("{}", Notice::info("Not signed in"));
                Ok(false)
            }
        },
        Command::PushToken { token } => {
            state.auth.store().cache_push_token(&token).await?;
            println!("{}", Notice::success("Push token cached"));
            Ok(true)
        }
        Command::Books {
            title,
            author,
            from,
            to,
            sort,
            asc,
            page,
            limit,
        } => {
            let filter = BookFilter {
                title,
                author,
                available_from: from,
                available_to: to,
                sort: match sort {
                    SortArg::Title => BookSort::Title,
                    SortArg::Id => BookSort::Id,
                },
                direction: if asc { Direction::Asc } else { Direction::Desc },
                page,
                limit,
            };
            let envelope = state.books.list(&filter).await;
            print_latest("Error while loading books", envelope)
        }
        Command::Book { id } => {
            let envelope = state.books.get(id).await;
            print_envelope("Error while loading the book", envelope.as_ref())
        }
        Command::Documents {
            book_id,
            page,
            limit,
        } => {
            let envelope = state.books.documents(book_id, page, limit).await;
            print_latest("Error while loading documents", envelope)
        }
        Command::UploadDocument {
            book_id,
            file,
            description,
            observations,
        } => {
            let upload = DocumentUpload {
                description,
                observations,
                file: read_file(&file).await?,
            };
            let envelope = state.books.upload_document(book_id, upload).await?;
            print_envelope("Error while uploading the file", envelope.as_ref())
        }
        Command::UploadPhoto { book_id, file } => {
            let envelope = state
                .books
                .upload_photo(book_id, read_file(&file).await?)
                .await?;
            print_envelope("Error while uploading the file", envelope.as_ref())
        }
        Command::Notifications {
            search,
            show,
            page,
            limit,
        } => {
            let filter = NotificationFilter {
                text: search,
                read: match show {
                    ReadArg::All => ReadFilter::All,
                    ReadArg::Read => ReadFilter::Read,
                    ReadArg::Unread => ReadFilter::Unread,
                },
                page,
                limit,
            };
            let envelope = state.notifications.list(&filter).await?;
            print_latest("Error while loading notifications", envelope)
        }
        Command::Read { id } => {
            let loaded = state.queries.load(NOTIFICATIONS_ROUTE, id).await;
            let item = loaded
                .as_ref()
                .map(|envelope| envelope.parse_data::<Notification>())
                .transpose()?
                .flatten();
            let Some(mut item) = item else {
                return Ok(report("Error while loading the notification", loaded.as_ref()));
            };
            let toggle = state
                .notifications
                .set_read(&mut item, &NotificationFilter::default())
                .await?;
            if !report("Error while updating notification", toggle.response.as_ref()) {
                return Ok(false);
            }
            let state_text = if item.is_read() { "read" } else { "unread" };
            println!("{}", Notice::success(format!("Notification {} marked {}", id, state_text)));
            Ok(true)
        }
        Command::Open { id } => {
            let envelope = state.notifications.open(id).await?;
            print_envelope("Error while loading the notification", envelope.as_ref())
        }
        Command::DeleteNotification { id } => {
            if state.notifications.delete(id).await {
                println!("{}", Notice::success("Notification deleted"));
                Ok(true)
            } else {
                eprintln!("{}", Notice::error("Error while deleting notification"));
                Ok(false)
            }
        }
        Command::UpdateProfile { name, username } => {
            let envelope = state
                .profile
                .update(&ProfileUpdate { name, username })
                .await?;
            print_envelope("Error while updating profile", envelope.as_ref())
        }
        Command::ChangePassword {
            current,
            new,
            confirmation,
        } => {
            let change = PasswordChange {
                current_password: current,
                new_password: new,
                password_confirmation: confirmation,
            };
            let envelope = state.profile.change_password(&change).await?;
            print_envelope("Error while changing password", envelope.as_ref())
        }
        Command::UploadAvatar { file } => {
            let envelope = state.profile.upload_avatar(read_file(&file).await?).await?;
            print_envelope("Error while uploading the file", envelope.as_ref())
        }
    }
}

async fn read_file(path: &Path) -> Result<FileUpload, AppError> {
    let bytes = tokio::fs::read(path).await?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());
    Ok(FileUpload {
        content_type: guess_content_type(&file_name).map(str::to_string),
        file_name,
        bytes,
    })
}

fn guess_content_type(file_name: &str) -> Option<&'static str> {
    let extension = Path::new(file_name).extension()?.to_str()?.to_ascii_lowercase();
    match extension.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "pdf" => Some("application/pdf"),
        "txt" => Some("text/plain"),
        _ => None,
    }
}

/// Prints a failure notice when the envelope is missing or unsuccessful.
fn report<T>(context: &str, envelope: Option<&Envelope<T>>) -> bool {
    match Notice::from_envelope(context, envelope) {
        Some(notice) => {
            eprintln!("{}", notice);
            false
        }
        None => true,
    }
}

fn print_envelope<T: Serialize>(
    context: &str,
    envelope: Option<&Envelope<T>>,
) -> Result<bool, AppError> {
    if !report(context, envelope) {
        return Ok(false);
    }
    match envelope.and_then(|envelope| envelope.data.as_ref()) {
        Some(data) => print_json(data),
        None => Ok(true),
    }
}

fn print_latest<T: Serialize>(
    context: &str,
    latest: Latest<Option<Envelope<T>>>,
) -> Result<bool, AppError> {
    let envelope = latest.current().flatten();
    if let Some(count) = envelope.as_ref().and_then(Envelope::count) {
        println!("{}", Notice::info(format!("{} total", count)));
    }
    print_envelope(context, envelope.as_ref())
}

fn print_json<T: Serialize>(value: &T) -> Result<bool, AppError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(true)
}
