use crate::{
    database::{Cascade, MongoDB, QUIZ_ATTEMPTS, STUDY_SETS, USERS},
    models::{AttemptView, QuizAttempt, StudySet, StudySetDetail, UserSummary},
    services::auth_service,
    utils::AppError,
};
use futures::TryStreamExt;
use mongodb::bson::{doc, Document};
use mongodb::options::ReturnDocument;
use serde::Serialize;

pub const MAX_ATTEMPT_HISTORY: i64 = 50;

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct StudySetView {
    pub study_set: StudySetDetail,
    pub owner: Option<UserSummary>,
    pub is_owner: bool,
    pub is_favorited: bool,
    pub attempts: Vec<AttemptView>,
}

#[derive(Debug, Serialize, PartialEq, utoipa::ToSchema)]
pub struct AttemptOutcome {
    pub high_score: u32,
    pub new_high_score: bool,
}

#[derive(Debug, Default, Serialize, PartialEq)]
pub struct RemovedStudySets {
    pub study_sets: u64,
    pub attempts: u64,
    pub favorites_cleared: u64,
}

pub async fn find_study_set(db: &MongoDB, study_set_id: &str) -> Result<Option<StudySet>, AppError> {
    Ok(db
        .collection::<StudySet>(STUDY_SETS)
        .find_one(doc! { "study_set_id": study_set_id })
        .await?)
}

/// Private sets of other users answer exactly like missing ones.
pub async fn require_visible(db: &MongoDB, study_set_id: &str, viewer: Option<&str>) -> Result<StudySet, AppError> {
    find_study_set(db, study_set_id)
        .await?
        .filter(|set| set.is_visible_to(viewer))
        .ok_or_else(|| AppError::NotFound("Study set not found".to_string()))
}

pub async fn require_owned(db: &MongoDB, study_set_id: &str, user_id: &str) -> Result<StudySet, AppError> {
    let set = require_visible(db, study_set_id, Some(user_id)).await?;
    if !set.is_owned_by(user_id) {
        return Err(AppError::Forbidden("Only the owner can change this study set".to_string()));
    }
    Ok(set)
}

pub async fn get_study_set(db: &MongoDB, study_set_id: &str, viewer: Option<&str>) -> Result<StudySetView, AppError> {
    let set = require_visible(db, study_set_id, viewer).await?;

    let owner = auth_service::find_user(db, &set.owner_id).await?;
    let (is_favorited, attempts) = match viewer {
        Some(user_id) => {
            let favorited = db
                .collection::<Document>(USERS)
                .count_documents(doc! { "user_id": user_id, "favorites": study_set_id })
                .await?
                > 0;
            (favorited, attempt_history(db, study_set_id, user_id).await?)
        }
        None => (false, Vec::new()),
    };

    Ok(StudySetView {
        is_owner: viewer.map_or(false, |id| set.is_owned_by(id)),
        owner: owner.as_ref().map(UserSummary::from),
        is_favorited,
        attempts,
        study_set: StudySetDetail::from(set),
    })
}

async fn attempt_history(db: &MongoDB, study_set_id: &str, user_id: &str) -> Result<Vec<AttemptView>, AppError> {
    let attempts: Vec<QuizAttempt> = db
        .collection::<QuizAttempt>(QUIZ_ATTEMPTS)
        .find(doc! { "study_set_id": study_set_id, "user_id": user_id })
        .sort(doc! { "created_at": -1 })
        .limit(MAX_ATTEMPT_HISTORY)
        .await?
        .try_collect()
        .await?;

    Ok(attempts.into_iter().map(AttemptView::from).collect())
}

/// Appends the attempt, then raises the high score only if this one beats it.
pub async fn record_attempt(
    db: &MongoDB,
    study_set_id: &str,
    user_id: &str,
    score: i64,
) -> Result<AttemptOutcome, AppError> {
    let set = require_visible(db, study_set_id, Some(user_id)).await?;

    if !set.quiz.accepts_score(score) {
        return Err(AppError::InvalidRequest(format!(
            "Score must be between 0 and {}",
            set.quiz.total()
        )));
    }
    let score = score as u32;

    db.collection::<QuizAttempt>(QUIZ_ATTEMPTS)
        .insert_one(QuizAttempt::new(study_set_id, user_id, score, set.quiz.total()))
        .await?;

    // `$lt` keeps a higher score written concurrently
    let raised = if set.quiz.is_new_high_score(score) {
        let stored = i64::from(score);
        db.collection::<StudySet>(STUDY_SETS)
            .find_one_and_update(
                doc! { "study_set_id": study_set_id, "quiz.high_score": { "$lt": stored } },
                doc! { "$set": { "quiz.high_score": stored } },
            )
            .return_document(ReturnDocument::After)
            .await?
    } else {
        None
    };

    let outcome = match raised {
        Some(updated) => AttemptOutcome { high_score: updated.quiz.high_score, new_high_score: true },
        None => {
            // Unchanged: the stored score is already at least this one
            let current = find_study_set(db, study_set_id)
                .await?
                .map(|s| s.quiz.high_score)
                .unwrap_or(set.quiz.high_score);
            AttemptOutcome { high_score: current.max(score), new_high_score: false }
        }
    };

    if outcome.new_high_score {
        log::info!("🏆 New high score {} on study set {} by {}", score, study_set_id, user_id);
    }
    Ok(outcome)
}

pub async fn delete_study_set(db: &MongoDB, study_set_id: &str, user_id: &str) -> Result<RemovedStudySets, AppError> {
    require_owned(db, study_set_id, user_id).await?;

    let ids = vec![study_set_id.to_string()];
    let mut cascade = Cascade::begin(db).await?;
    let removed = remove_study_sets(&mut cascade, db, &ids).await?;
    cascade.commit().await?;

    log::info!("🗑️  Study set {} deleted by {}", study_set_id, user_id);
    Ok(removed)
}

/// Removes the sets, every attempt on them, and their ids from all favorites.
pub async fn remove_study_sets(
    cascade: &mut Cascade,
    db: &MongoDB,
    study_set_ids: &[String],
) -> Result<RemovedStudySets, AppError> {
    if study_set_ids.is_empty() {
        return Ok(RemovedStudySets::default());
    }

    let attempts = cascade
        .delete_many(
            &db.collection(QUIZ_ATTEMPTS),
            doc! { "study_set_id": { "$in": study_set_ids } },
        )
        .await?;

    let favorites_cleared = cascade
        .update_many(
            &db.collection(USERS),
            doc! { "favorites": { "$in": study_set_ids } },
            doc! { "$pull": { "favorites": { "$in": study_set_ids } } },
        )
        .await?;

    let study_sets = cascade
        .delete_many(
            &db.collection(STUDY_SETS),
            doc! { "study_set_id": { "$in": study_set_ids } },
        )
        .await?;

    Ok(RemovedStudySets { study_sets, attempts, favorites_cleared })
}
