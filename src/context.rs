/// Application context and dependency injection
use crate::{
    account::AccountManager,
    config::ServerConfig,
    db,
    error::NoteResult,
    mailer::{Mailer, Notifier},
    note::NoteStore,
    oauth::GoogleOAuth,
    session::SessionKeys,
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub account_manager: Arc<AccountManager>,
    pub note_store: NoteStore,
    pub sessions: SessionKeys,
    /// Present only when Google credentials are configured
    pub google: Option<Arc<GoogleOAuth>>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> NoteResult<Self> {
        // Validate configuration
        config.validate()?;

        let pool = db::create_pool(&config.storage.database_path, db::DatabaseOptions::default())
            .await?;
        db::run_migrations(&pool).await?;
        db::test_connection(&pool).await?;
        tracing::info!("Database ready at {:?}", config.storage.database_path);

        let mailer = Mailer::new(config.email.clone())?;
        if !mailer.is_configured() {
            tracing::warn!("SMTP not configured, passcodes will only be logged");
        }

        Self::with_parts(config, pool, Arc::new(mailer))
    }

    /// Assemble the context around an existing pool and notifier
    pub fn with_parts(
        config: ServerConfig,
        db: SqlitePool,
        notifier: Arc<dyn Notifier>,
    ) -> NoteResult<Self> {
        let config = Arc::new(config);
        let sessions = SessionKeys::new(&config.authentication.jwt_secret);

        let account_manager = Arc::new(AccountManager::new(
            db.clone(),
            Arc::clone(&config),
            sessions.clone(),
            notifier,
        ));
        let note_store = NoteStore::new(db);

        let google = match &config.google {
            Some(google_config) => {
                tracing::info!("Google sign-in enabled");
                Some(Arc::new(GoogleOAuth::new(google_config)?))
            }
            None => {
                tracing::info!("Google sign-in disabled - no client configured");
                None
            }
        };

        Ok(Self {
            config,
            account_manager,
            note_store,
            sessions,
            google,
        })
    }

    /// Get service URL
    pub fn service_url(&self) -> String {
        format!(
            "http://{}:{}",
            self.config.service.hostname, self.config.service.port
        )
    }
}
