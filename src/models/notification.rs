use serde::{Deserialize, Serialize};

use super::UserId;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub user_id: UserId,
    pub kind: String,
    pub message: String,
    pub is_read: bool,
    pub created_at: String,
}
