use std::sync::Arc;

use crate::api::ApiClient;
use crate::auth::AuthManager;
use crate::books::BookService;
use crate::config::Config;
use crate::error::AppError;
use crate::notifications::NotificationFlow;
use crate::profile::ProfileService;
use crate::query::ListQueryFacade;
use crate::session::{SessionHandle, SessionStore};
use crate::storage::{FileStore, KeyValueStore};

/// Every shared component, wired once and handed to whoever needs it.
pub struct AppState {
    pub config: Config,
    pub session: SessionHandle,
    pub api: Arc<ApiClient>,
    pub auth: Arc<AuthManager>,
    pub queries: Arc<ListQueryFacade>,
    pub notifications: NotificationFlow,
    pub books: BookService,
    pub profile: ProfileService,
}

impl AppState {
    /// Builds the state with the session persisted under `config.data_dir`.
    pub fn new(config: Config) -> Result<Self, AppError> {
        let store = Arc::new(FileStore::new(config.session_file()));
        Self::with_store(config, store)
    }

    pub fn with_store(config: Config, storage: Arc<dyn KeyValueStore>) -> Result<Self, AppError> {
        let session = SessionHandle::new();
        let api = Arc::new(ApiClient::new(&config, session.clone())?);
        let auth = Arc::new(AuthManager::new(
            api.clone(),
            SessionStore::new(storage),
            session.clone(),
        ));
        let queries = Arc::new(ListQueryFacade::new(api.clone()));

        Ok(Self {
            notifications: NotificationFlow::new(api.clone(), auth.clone(), queries.clone()),
            books: BookService::new(api.clone(), queries.clone()),
            profile: ProfileService::new(api.clone(), auth.clone()),
            config,
            session,
            api,
            auth,
            queries,
        })
    }
}
