use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::UserId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub id: String,
    pub booking_id: String,
    pub customer_id: UserId,
    pub artist_id: UserId,
    pub rating: u8,
    pub comment: Option<String>,
    pub created_at: NaiveDateTime,
}
