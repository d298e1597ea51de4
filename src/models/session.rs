use mongodb::bson::{oid::ObjectId, DateTime as BsonDateTime};
use serde::{Deserialize, Serialize};

/// Server-side session referenced by the signed cookie. `expires_at` backs a
/// TTL index, so expired rows disappear on their own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub session_id: String,
    pub user_id: String,
    #[serde(default)]
    pub user_agent: Option<String>,
    pub created_at: BsonDateTime,
    pub expires_at: BsonDateTime,
}

impl Session {
    pub fn is_expired(&self) -> bool {
        self.expires_at <= BsonDateTime::now()
    }
}
