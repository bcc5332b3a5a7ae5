use std::sync::Arc;

use crate::db::queries;
use crate::models::{Notification, UserId};
use crate::state::AppState;

/// Stores a notification and pushes it to live subscribers.
/// Errors are logged and swallowed.
pub fn notify(state: &Arc<AppState>, user_id: &UserId, kind: &str, message: &str) {
    let notification_id = state
        .db()
        .map_err(anyhow::Error::from)
        .and_then(|db| queries::insert_notification(&db, user_id, kind, message));

    match notification_id {
        Ok(id) => {
            let notification = Notification {
                id,
                user_id: user_id.clone(),
                kind: kind.to_string(),
                message: message.to_string(),
                is_read: false,
                created_at: queries::now_string(),
            };
            // No receivers is fine.
            let _ = state.notifications_tx.send(notification);
        }
        Err(e) => {
            tracing::error!(error = %e, user_id = %user_id, kind, "failed to record notification");
        }
    }
}
