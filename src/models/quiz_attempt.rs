use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// Append-only record in "quiz_attempts"
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizAttempt {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub attempt_id: String,
    pub study_set_id: String,
    pub user_id: String,
    pub score: u32,
    pub total: u32,
    pub created_at: i64,
}

impl QuizAttempt {
    pub fn new(study_set_id: &str, user_id: &str, score: u32, total: u32) -> Self {
        Self {
            id: None,
            attempt_id: uuid::Uuid::new_v4().to_string(),
            study_set_id: study_set_id.to_string(),
            user_id: user_id.to_string(),
            score,
            total,
            created_at: chrono::Utc::now().timestamp(),
        }
    }
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct RecordAttemptRequest {
    pub score: i64,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct AttemptView {
    pub id: String,
    pub score: u32,
    pub total: u32,
    pub created_at: i64,
}

impl From<QuizAttempt> for AttemptView {
    fn from(attempt: QuizAttempt) -> Self {
        AttemptView {
            id: attempt.attempt_id,
            score: attempt.score,
            total: attempt.total,
            created_at: attempt.created_at,
        }
    }
}
