use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;
use tokio::sync::broadcast;

use crate::config::AppConfig;
use crate::errors::AppError;
use crate::models::Notification;
use crate::services::auth::AuthService;
use crate::services::payment::PaymentGateway;

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub auth: AuthService,
    pub payments: Box<dyn PaymentGateway>,
    pub notifications_tx: broadcast::Sender<Notification>,
}

impl AppState {
    pub fn new(conn: Connection, config: AppConfig, payments: Box<dyn PaymentGateway>) -> Self {
        let auth = AuthService::new(&config.jwt_secret, config.token_ttl_hours, config.bcrypt_cost);
        let (notifications_tx, _) = broadcast::channel(256);
        Self {
            db: Arc::new(Mutex::new(conn)),
            config,
            auth,
            payments,
            notifications_tx,
        }
    }

    pub fn db(&self) -> Result<MutexGuard<'_, Connection>, AppError> {
        self.db
            .lock()
            .map_err(|_| AppError::Internal(anyhow::anyhow!("database mutex poisoned")))
    }
}
