use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::PgPool;

use crate::{
    auth::{
        jwt::JwtKeys,
        password::PasswordHasher,
        repo::{PgUserRepo, UserRepo},
        services::AuthService,
    },
    config::AppConfig,
    crypto::FieldCipher,
    db,
    reminders::{
        repo::{PgReminderRepo, ReminderRepo},
        services::ReminderService,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<AppConfig>,
    pub keys: JwtKeys,
    pub hasher: PasswordHasher,
    pub cipher: Arc<FieldCipher>,
    pub users: Arc<dyn UserRepo>,
    pub reminders: Arc<dyn ReminderRepo>,
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let db = db::connect(&config).await?;
        Self::from_parts(db, Arc::new(config))
    }

    /// Wires the Postgres-backed stores around an existing pool.
    pub fn from_parts(db: PgPool, config: Arc<AppConfig>) -> anyhow::Result<Self> {
        let keys = JwtKeys::new(&config.jwt)?;
        let hasher = PasswordHasher::new(config.password)?;
        let cipher = Arc::new(FieldCipher::new(&config.encryption_key)?);

        Ok(Self {
            users: Arc::new(PgUserRepo::new(db.clone())),
            reminders: Arc::new(PgReminderRepo::new(db.clone())),
            db,
            config,
            keys,
            hasher,
            cipher,
        })
    }

    pub fn auth(&self) -> AuthService<'_> {
        AuthService {
            users: self.users.as_ref(),
            keys: &self.keys,
            hasher: &self.hasher,
        }
    }

    pub fn reminders(&self) -> ReminderService<'_> {
        ReminderService {
            repo: self.reminders.as_ref(),
            cipher: &self.cipher,
        }
    }
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        state.keys.clone()
    }
}
