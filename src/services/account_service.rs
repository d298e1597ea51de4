use crate::{
    database::{Cascade, MongoDB, QUIZ_ATTEMPTS, SESSIONS, STUDY_SETS, USERS, USER_FOLLOWS},
    models::{
        normalize_categories, normalize_name, AccountSettings, StudySet, StudySetSummary,
        UpdateSettingsRequest, UpdateStudySetRequest, User, UserSummary, MAX_NAME_CHARS,
    },
    services::{auth_service, study_set_service},
    utils::{is_duplicate_key, query::contains_ci, AppError},
};
use bcrypt::{hash, verify, DEFAULT_COST};
use futures::TryStreamExt;
use mongodb::bson::{doc, Bson, Document};
use mongodb::options::ReturnDocument;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct AccountOverview {
    pub user: UserSummary,
    pub study_sets: Vec<StudySetSummary>,
    pub favorites: Vec<StudySetSummary>,
    pub study_set_count: usize,
    pub favorite_count: usize,
}

#[derive(Debug, Serialize, PartialEq, utoipa::ToSchema)]
pub struct FavoriteOutcome {
    pub favorited: bool,
    pub favorite_count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SearchScope {
    Owned,
    Favorites,
    #[default]
    All,
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AccountSearchQuery {
    pub q: Option<String>,
    pub scope: Option<SearchScope>,
}

#[derive(Debug, Default, Serialize, PartialEq, utoipa::ToSchema)]
pub struct ResetSummary {
    pub study_sets_deleted: u64,
    pub attempts_deleted: u64,
}

#[derive(Debug, Default, Serialize, PartialEq, utoipa::ToSchema)]
pub struct DeleteSummary {
    pub study_sets_deleted: u64,
    pub attempts_deleted: u64,
    pub follows_deleted: u64,
    pub sessions_deleted: u64,
}

/// Account routes act on the path user, who must be the session user.
pub fn authorize(session_user_id: &str, path_user_id: &str) -> Result<(), AppError> {
    if session_user_id != path_user_id {
        return Err(AppError::Forbidden("You can only manage your own account".to_string()));
    }
    Ok(())
}

async fn collect_sets(db: &MongoDB, filter: Document) -> Result<Vec<StudySetSummary>, AppError> {
    let sets: Vec<StudySet> = db
        .collection::<StudySet>(STUDY_SETS)
        .find(filter)
        .sort(doc! { "created_at": -1 })
        .await?
        .try_collect()
        .await?;
    Ok(sets.iter().map(StudySetSummary::from).collect())
}

/// Favorites the user can still see: public ones and their own.
fn visible_favorites_filter(user: &User) -> Document {
    doc! {
        "study_set_id": { "$in": user.favorites.as_slice() },
        "$or": [ { "is_public": true }, { "owner_id": user.user_id.as_str() } ],
    }
}

pub async fn get_account(db: &MongoDB, user_id: &str) -> Result<AccountOverview, AppError> {
    let user = auth_service::require_user(db, user_id).await?;

    let study_sets = collect_sets(db, doc! { "owner_id": user_id }).await?;
    let favorites = if user.favorites.is_empty() {
        Vec::new()
    } else {
        collect_sets(db, visible_favorites_filter(&user)).await?
    };

    Ok(AccountOverview {
        user: UserSummary::from(&user),
        study_set_count: study_sets.len(),
        favorite_count: favorites.len(),
        study_sets,
        favorites,
    })
}

/// Adds the set to the user's favorites, or removes it when already there.
///
/// Both the membership change and the counter update are conditional, so a
/// repeated request cannot count the same user twice.
pub async fn toggle_favorite(db: &MongoDB, user_id: &str, study_set_id: &str) -> Result<FavoriteOutcome, AppError> {
    let users = db.collection::<Document>(USERS);
    let sets = db.collection::<StudySet>(STUDY_SETS);

    study_set_service::find_study_set(db, study_set_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Study set not found".to_string()))?;

    let removed = users
        .update_one(
            doc! { "user_id": user_id, "favorites": study_set_id },
            doc! { "$pull": { "favorites": study_set_id } },
        )
        .await?;

    if removed.modified_count > 0 {
        let updated = sets
            .find_one_and_update(
                doc! { "study_set_id": study_set_id, "favorite_count": { "$gt": 0 } },
                doc! { "$inc": { "favorite_count": -1 } },
            )
            .return_document(ReturnDocument::After)
            .await?;
        let favorite_count = match updated {
            Some(set) => set.favorite_count,
            None => current_favorite_count(db, study_set_id).await?,
        };
        log::info!("💔 {} unfavorited {}", user_id, study_set_id);
        return Ok(FavoriteOutcome { favorited: false, favorite_count });
    }

    // Unfavoriting works on any set; favoriting needs a visible one
    study_set_service::require_visible(db, study_set_id, Some(user_id)).await?;

    let added = users
        .update_one(
            doc! { "user_id": user_id, "favorites": { "$ne": study_set_id } },
            doc! { "$addToSet": { "favorites": study_set_id } },
        )
        .await?;

    let favorite_count = if added.modified_count > 0 {
        sets.find_one_and_update(
            doc! { "study_set_id": study_set_id },
            doc! { "$inc": { "favorite_count": 1 } },
        )
        .return_document(ReturnDocument::After)
        .await?
        .map(|set| set.favorite_count)
        .unwrap_or(0)
    } else {
        current_favorite_count(db, study_set_id).await?
    };

    log::info!("⭐ {} favorited {}", user_id, study_set_id);
    Ok(FavoriteOutcome { favorited: true, favorite_count })
}

async fn current_favorite_count(db: &MongoDB, study_set_id: &str) -> Result<i64, AppError> {
    Ok(study_set_service::find_study_set(db, study_set_id)
        .await?
        .map(|set| set.favorite_count)
        .unwrap_or(0))
}

/// `$set` document for an edit request, or an error for an invalid field.
pub fn study_set_changes(request: &UpdateStudySetRequest) -> Result<Document, AppError> {
    let mut changes = Document::new();

    if let Some(name) = &request.name {
        let name = normalize_name(name).ok_or_else(|| {
            AppError::InvalidRequest(format!("Name must be between 1 and {} characters", MAX_NAME_CHARS))
        })?;
        changes.insert("name", name);
    }
    if let Some(categories) = &request.categories {
        changes.insert("categories", normalize_categories(categories));
    }
    if let Some(difficulty) = request.difficulty {
        changes.insert("difficulty", difficulty.as_str());
    }
    if let Some(is_public) = request.is_public {
        changes.insert("is_public", is_public);
    }

    if changes.is_empty() {
        return Err(AppError::InvalidRequest("Nothing to update".to_string()));
    }
    changes.insert("updated_at", chrono::Utc::now().timestamp());
    Ok(changes)
}

pub async fn edit_study_set(
    db: &MongoDB,
    user_id: &str,
    study_set_id: &str,
    request: &UpdateStudySetRequest,
) -> Result<StudySetSummary, AppError> {
    let changes = study_set_changes(request)?;
    study_set_service::require_owned(db, study_set_id, user_id).await?;

    let updated = db
        .collection::<StudySet>(STUDY_SETS)
        .find_one_and_update(
            doc! { "study_set_id": study_set_id, "owner_id": user_id },
            doc! { "$set": changes },
        )
        .return_document(ReturnDocument::After)
        .await?
        .ok_or_else(|| AppError::NotFound("Study set not found".to_string()))?;

    log::info!("✏️  Study set {} edited", study_set_id);
    Ok(StudySetSummary::from(&updated))
}

pub fn search_filter(user: &User, q: &str, scope: SearchScope) -> Document {
    let scope_filter = match scope {
        SearchScope::Owned => doc! { "owner_id": user.user_id.as_str() },
        SearchScope::Favorites => visible_favorites_filter(user),
        SearchScope::All => doc! {
            "$or": [
                { "owner_id": user.user_id.as_str() },
                { "study_set_id": { "$in": user.favorites.as_slice() }, "is_public": true },
            ]
        },
    };

    let q = q.trim();
    if q.is_empty() {
        return scope_filter;
    }
    doc! {
        "$and": [
            scope_filter,
            { "$or": [ contains_ci("name", q), contains_ci("categories", q) ] },
        ]
    }
}

pub async fn search_account(
    db: &MongoDB,
    user_id: &str,
    q: &str,
    scope: SearchScope,
) -> Result<Vec<StudySetSummary>, AppError> {
    let user = auth_service::require_user(db, user_id).await?;
    collect_sets(db, search_filter(&user, q, scope)).await
}

pub async fn get_settings(db: &MongoDB, user_id: &str) -> Result<AccountSettings, AppError> {
    let user = auth_service::require_user(db, user_id).await?;
    Ok(AccountSettings::from(&user))
}

/// Validated settings change, before availability checks and hashing.
#[derive(Debug, Default, PartialEq)]
pub struct SettingsChange {
    pub username: Option<String>,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub new_password: Option<String>,
}

impl SettingsChange {
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.email.is_none() && self.display_name.is_none() && self.new_password.is_none()
    }
}

/// Format checks; fields equal to the current value are dropped.
pub fn settings_change(user: &User, request: &UpdateSettingsRequest) -> Result<SettingsChange, AppError> {
    let mut change = SettingsChange::default();

    if let Some(username) = request.username.as_deref().map(str::trim) {
        auth_service::validate_username(username).map_err(AppError::InvalidRequest)?;
        if username != user.username {
            change.username = Some(username.to_string());
        }
    }
    if let Some(email) = request.email.as_deref().map(|e| e.trim().to_lowercase()) {
        auth_service::validate_email(&email).map_err(AppError::InvalidRequest)?;
        if email != user.email {
            change.email = Some(email);
        }
    }
    if let Some(display_name) = request.display_name.as_deref().map(str::trim) {
        auth_service::validate_display_name(display_name).map_err(AppError::InvalidRequest)?;
        let display_name = if display_name.is_empty() { user.username.as_str() } else { display_name };
        if display_name != user.display_name {
            change.display_name = Some(display_name.to_string());
        }
    }
    if let Some(password) = &request.new_password {
        auth_service::validate_password(password).map_err(AppError::InvalidRequest)?;
        if user.password.is_some() && request.current_password.as_deref().map_or(true, str::is_empty) {
            return Err(AppError::InvalidRequest("Current password is required".to_string()));
        }
        change.new_password = Some(password.clone());
    }

    Ok(change)
}

pub async fn update_settings(
    db: &MongoDB,
    user_id: &str,
    request: &UpdateSettingsRequest,
) -> Result<AccountSettings, AppError> {
    let user = auth_service::require_user(db, user_id).await?;
    let change = settings_change(&user, request)?;
    if change.is_empty() {
        return Ok(AccountSettings::from(&user));
    }

    if let Some(username) = &change.username {
        if auth_service::username_taken(db, username).await? {
            return Err(AppError::Conflict("Username is already taken".to_string()));
        }
    }
    if let Some(email) = &change.email {
        if auth_service::email_taken(db, email).await? {
            return Err(AppError::Conflict("An account with this email already exists".to_string()));
        }
    }

    let mut set = Document::new();
    if let Some(username) = change.username {
        set.insert("username", username);
    }
    if let Some(email) = change.email {
        set.insert("email", email);
    }
    if let Some(display_name) = change.display_name {
        set.insert("display_name", display_name);
    }
    if let Some(password) = change.new_password {
        if let Some(stored) = &user.password {
            let current = request.current_password.as_deref().unwrap_or_default();
            if !verify(current, stored)? {
                return Err(AppError::InvalidRequest("Current password is incorrect".to_string()));
            }
        }
        set.insert("password", hash(&password, DEFAULT_COST)?);
    }
    set.insert("updated_at", chrono::Utc::now().timestamp());

    let updated = match db
        .collection::<User>(USERS)
        .find_one_and_update(doc! { "user_id": user_id }, doc! { "$set": set })
        .return_document(ReturnDocument::After)
        .await
    {
        Ok(updated) => updated,
        Err(e) if is_duplicate_key(&e) => {
            return Err(AppError::Conflict("Username or email is already taken".to_string()))
        }
        Err(e) => return Err(e.into()),
    }
    .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    log::info!("⚙️  Settings updated for {}", user_id);
    Ok(AccountSettings::from(&updated))
}

async fn owned_study_set_ids(db: &MongoDB, user_id: &str) -> Result<Vec<String>, AppError> {
    let ids = db
        .collection::<Document>(STUDY_SETS)
        .distinct("study_set_id", doc! { "owner_id": user_id })
        .await?;

    Ok(ids
        .into_iter()
        .filter_map(|id| match id {
            Bson::String(id) => Some(id),
            _ => None,
        })
        .collect())
}

/// Removes everything the user created and undoes their favorites.
async fn clear_content(cascade: &mut Cascade, db: &MongoDB, user: &User) -> Result<ResetSummary, AppError> {
    let owned = owned_study_set_ids(db, &user.user_id).await?;
    let removed = study_set_service::remove_study_sets(cascade, db, &owned).await?;

    let own_attempts = cascade
        .delete_many(&db.collection(QUIZ_ATTEMPTS), doc! { "user_id": user.user_id.as_str() })
        .await?;

    let still_favorited: Vec<String> = user
        .favorites
        .iter()
        .filter(|id| !owned.contains(id))
        .cloned()
        .collect();
    if !still_favorited.is_empty() {
        cascade
            .update_many(
                &db.collection(STUDY_SETS),
                doc! { "study_set_id": { "$in": still_favorited }, "favorite_count": { "$gt": 0 } },
                doc! { "$inc": { "favorite_count": -1 } },
            )
            .await?;
    }

    cascade
        .update_many(
            &db.collection(USERS),
            doc! { "user_id": user.user_id.as_str() },
            doc! { "$set": { "favorites": [], "updated_at": chrono::Utc::now().timestamp() } },
        )
        .await?;

    Ok(ResetSummary {
        study_sets_deleted: removed.study_sets,
        attempts_deleted: removed.attempts + own_attempts,
    })
}

pub async fn reset_account(db: &MongoDB, user_id: &str) -> Result<ResetSummary, AppError> {
    let user = auth_service::require_user(db, user_id).await?;

    let mut cascade = Cascade::begin(db).await?;
    let summary = clear_content(&mut cascade, db, &user).await?;
    cascade.commit().await?;

    log::info!(
        "🧹 Account {} reset: {} study sets, {} attempts removed",
        user_id,
        summary.study_sets_deleted,
        summary.attempts_deleted
    );
    Ok(summary)
}

pub async fn delete_account(db: &MongoDB, user_id: &str) -> Result<DeleteSummary, AppError> {
    let user = auth_service::require_user(db, user_id).await?;

    let mut cascade = Cascade::begin(db).await?;
    let content = clear_content(&mut cascade, db, &user).await?;

    let follows_deleted = cascade
        .delete_many(
            &db.collection(USER_FOLLOWS),
            doc! { "$or": [ { "follower_id": user_id }, { "following_id": user_id } ] },
        )
        .await?;
    let sessions_deleted = cascade
        .delete_many(&db.collection(SESSIONS), doc! { "user_id": user_id })
        .await?;
    cascade
        .delete_one(&db.collection(USERS), doc! { "user_id": user_id })
        .await?;

    cascade.commit().await?;

    log::info!("🗑️  Account {} ({}) deleted", user.username, user_id);
    Ok(DeleteSummary {
        study_sets_deleted: content.study_sets_deleted,
        attempts_deleted: content.attempts_deleted,
        follows_deleted,
        sessions_deleted,
    })
}
