use crate::{
    database::{MongoDB, STUDY_SETS, USERS, USER_FOLLOWS},
    models::{StudySet, StudySetSummary, User, UserFollow, UserSummary},
    services::auth_service,
    utils::{is_duplicate_key, query::contains_ci, AppError},
};
use futures::TryStreamExt;
use mongodb::bson::{doc, Document};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const MAX_SEARCH_RESULTS: i64 = 20;

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ProfileView {
    pub user: UserSummary,
    pub study_sets: Vec<StudySetSummary>,
    pub follower_count: u64,
    pub following_count: u64,
    pub is_following: bool,
    pub is_self: bool,
}

#[derive(Debug, Serialize, PartialEq, utoipa::ToSchema)]
pub struct FollowOutcome {
    pub following: bool,
    pub follower_count: u64,
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProfileSearchQuery {
    pub q: Option<String>,
}

fn follows(db: &MongoDB) -> mongodb::Collection<UserFollow> {
    db.collection::<UserFollow>(USER_FOLLOWS)
}

async fn follower_count(db: &MongoDB, user_id: &str) -> Result<u64, AppError> {
    Ok(follows(db).count_documents(doc! { "following_id": user_id }).await?)
}

async fn is_following(db: &MongoDB, follower_id: &str, following_id: &str) -> Result<bool, AppError> {
    let count = follows(db)
        .count_documents(doc! { "follower_id": follower_id, "following_id": following_id })
        .await?;
    Ok(count > 0)
}

pub async fn get_profile(db: &MongoDB, user_id: &str, viewer: Option<&str>) -> Result<ProfileView, AppError> {
    let user = auth_service::require_user(db, user_id).await?;
    let is_self = viewer == Some(user_id);

    // Owners see their private sets on their own profile
    let filter = if is_self {
        doc! { "owner_id": user_id }
    } else {
        doc! { "owner_id": user_id, "is_public": true }
    };
    let sets: Vec<StudySet> = db
        .collection::<StudySet>(STUDY_SETS)
        .find(filter)
        .sort(doc! { "created_at": -1 })
        .await?
        .try_collect()
        .await?;

    let is_following = match viewer {
        Some(viewer_id) if !is_self => is_following(db, viewer_id, user_id).await?,
        _ => false,
    };

    Ok(ProfileView {
        user: UserSummary::from(&user),
        study_sets: sets.iter().map(StudySetSummary::from).collect(),
        follower_count: follower_count(db, user_id).await?,
        following_count: follows(db).count_documents(doc! { "follower_id": user_id }).await?,
        is_following,
        is_self,
    })
}

/// Unfollows when the edge exists, follows otherwise.
pub async fn toggle_follow(db: &MongoDB, follower_id: &str, target_id: &str) -> Result<FollowOutcome, AppError> {
    if follower_id == target_id {
        return Err(AppError::InvalidRequest("You cannot follow yourself".to_string()));
    }
    auth_service::require_user(db, target_id).await?;

    let removed = follows(db)
        .delete_one(doc! { "follower_id": follower_id, "following_id": target_id })
        .await?;

    let following = if removed.deleted_count > 0 {
        log::info!("👋 {} unfollowed {}", follower_id, target_id);
        false
    } else {
        match follows(db).insert_one(UserFollow::new(follower_id, target_id)).await {
            Ok(_) => log::info!("🤝 {} followed {}", follower_id, target_id),
            // A concurrent request created the same edge
            Err(e) if is_duplicate_key(&e) => {}
            Err(e) => return Err(e.into()),
        }
        true
    };

    Ok(FollowOutcome {
        following,
        follower_count: follower_count(db, target_id).await?,
    })
}

/// Users on the other end of the edges matching `filter`, newest edge first.
async fn follow_list(db: &MongoDB, filter: Document, other_side: fn(&UserFollow) -> &str) -> Result<Vec<UserSummary>, AppError> {
    let edges: Vec<UserFollow> = follows(db)
        .find(filter)
        .sort(doc! { "created_at": -1 })
        .await?
        .try_collect()
        .await?;
    if edges.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<String> = edges.iter().map(|edge| other_side(edge).to_string()).collect();
    let users: Vec<User> = db
        .collection::<User>(USERS)
        .find(doc! { "user_id": { "$in": ids.as_slice() } })
        .await?
        .try_collect()
        .await?;

    let by_id: HashMap<&str, &User> = users.iter().map(|u| (u.user_id.as_str(), u)).collect();
    Ok(ids
        .iter()
        .filter_map(|id| by_id.get(id.as_str()).map(|user| UserSummary::from(*user)))
        .collect())
}

pub async fn list_followers(db: &MongoDB, user_id: &str) -> Result<Vec<UserSummary>, AppError> {
    auth_service::require_user(db, user_id).await?;
    follow_list(db, doc! { "following_id": user_id }, |edge| edge.follower_id.as_str()).await
}

pub async fn list_following(db: &MongoDB, user_id: &str) -> Result<Vec<UserSummary>, AppError> {
    auth_service::require_user(db, user_id).await?;
    follow_list(db, doc! { "follower_id": user_id }, |edge| edge.following_id.as_str()).await
}

pub fn profile_search_filter(q: &str) -> Document {
    doc! { "$or": [ contains_ci("username", q), contains_ci("display_name", q) ] }
}

pub async fn search_profiles(db: &MongoDB, q: &str) -> Result<Vec<UserSummary>, AppError> {
    let q = q.trim();
    if q.is_empty() {
        return Ok(Vec::new());
    }

    let users: Vec<User> = db
        .collection::<User>(USERS)
        .find(profile_search_filter(q))
        .sort(doc! { "username": 1 })
        .limit(MAX_SEARCH_RESULTS)
        .await?
        .try_collect()
        .await?;

    Ok(users.iter().map(UserSummary::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_filter_matches_both_names() {
        let filter = profile_search_filter("ada.l");
        let or = filter.get_array("$or").unwrap();
        assert_eq!(or.len(), 2);
        let username = or[0].as_document().unwrap().get_document("username").unwrap();
        assert_eq!(username.get_str("$regex").unwrap(), r"ada\.l");
        assert!(or[1].as_document().unwrap().contains_key("display_name"));
    }

    #[test]
    fn test_follow_outcome_shape() {
        let json = serde_json::to_value(FollowOutcome { following: true, follower_count: 3 }).unwrap();
        assert_eq!(json, serde_json::json!({ "following": true, "follower_count": 3 }));
    }
}
