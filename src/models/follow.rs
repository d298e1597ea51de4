use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// Directed edge in "user_follows"; (follower_id, following_id) is unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserFollow {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub follower_id: String,
    pub following_id: String,
    pub created_at: i64,
}

impl UserFollow {
    pub fn new(follower_id: &str, following_id: &str) -> Self {
        Self {
            id: None,
            follower_id: follower_id.to_string(),
            following_id: following_id.to_string(),
            created_at: chrono::Utc::now().timestamp(),
        }
    }
}
