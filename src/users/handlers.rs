use anyhow::Context;
use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{handlers::is_valid_email, jwt::AuthUser},
    error::ApiError,
    problems,
    state::AppState,
    users::{
        dto::{BookmarkAction, BookmarkResponse, ProfileResponse, ProfileUser, StatsResponse},
        repo::{ProfilePatch, User},
    },
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users/profile", get(get_profile).put(update_profile))
        .route("/users/bookmarks", post(toggle_bookmark))
        .route("/users/stats", get(user_stats))
        .layer(DefaultBodyLimit::max(5 * 1024 * 1024)) // avatar uploads
}

async fn load_profile(state: &AppState, user: User) -> Result<ProfileUser, ApiError> {
    let solved = problems::repo::titles_for(&state.db, &user.solved_problems).await?;
    Ok(ProfileUser::from_user(user, solved))
}

#[instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<ProfileResponse>, ApiError> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| {
            warn!(user_id = %user_id, "profile for missing user");
            ApiError::NotFound("User not found".into())
        })?;
    let user = load_profile(&state, user).await?;
    Ok(Json(ProfileResponse {
        success: true,
        user,
    }))
}

#[instrument(skip(state, mp))]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    mut mp: Multipart,
) -> Result<Json<ProfileResponse>, ApiError> {
    let mut patch = ProfilePatch::default();

    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("malformed multipart body: {e}")))?
    {
        let name = field.name().map(|s| s.to_string());
        match name.as_deref() {
            Some("username") => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::Validation(e.to_string()))?;
                let value = value.trim().to_string();
                if !value.is_empty() {
                    patch.username = Some(value);
                }
            }
            Some("email") => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::Validation(e.to_string()))?;
                let value = value.trim().to_lowercase();
                if !value.is_empty() {
                    if !is_valid_email(&value) {
                        return Err(ApiError::Validation("Invalid email address".into()));
                    }
                    patch.email = Some(value);
                }
            }
            Some("avatar") => {
                let content_type = field
                    .content_type()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "application/octet-stream".into());
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::Validation(e.to_string()))?;
                let ext = ext_from_mime(&content_type);
                let key = format!(
                    "{}/{}-{}.{}",
                    state.config.s3.avatar_folder,
                    user_id,
                    Uuid::new_v4(),
                    ext
                );
                let url = state
                    .storage
                    .upload(&key, data, &content_type)
                    .await
                    .with_context(|| format!("upload avatar {key}"))?;
                patch.profile_image = Some(url);
            }
            _ => {}
        }
    }

    if patch.is_empty() {
        return Err(ApiError::Validation("Nothing to update".into()));
    }

    // Email uniqueness is re-checked here, same as at registration.
    if let Some(email) = &patch.email {
        if let Some(other) = User::find_by_email(&state.db, email).await? {
            if other.id != user_id {
                warn!(email = %email, "profile update email clash");
                return Err(ApiError::Conflict("Email already in use".into()));
            }
        }
    }

    let user = User::update_profile(&state.db, user_id, &patch)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    info!(user_id = %user.id, "profile updated");
    let user = load_profile(&state, user).await?;
    Ok(Json(ProfileResponse {
        success: true,
        user,
    }))
}

#[derive(Debug, Deserialize)]
pub struct BookmarkRequest {
    pub problem_id: Uuid,
}

/// Flips membership of `problem_id` in the bookmark list, preserving the
/// insertion order of everything else.
fn apply_toggle(bookmarks: &mut Vec<Uuid>, problem_id: Uuid) -> BookmarkAction {
    match bookmarks.iter().position(|id| *id == problem_id) {
        Some(pos) => {
            bookmarks.remove(pos);
            BookmarkAction::Removed
        }
        None => {
            bookmarks.push(problem_id);
            BookmarkAction::Added
        }
    }
}

#[instrument(skip(state))]
pub async fn toggle_bookmark(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<BookmarkRequest>,
) -> Result<Json<BookmarkResponse>, ApiError> {
    if !problems::repo::exists(&state.db, payload.problem_id).await? {
        warn!(problem_id = %payload.problem_id, "bookmark for unknown problem");
        return Err(ApiError::NotFound("Problem not found".into()));
    }

    let mut user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    // Read-modify-write; concurrent toggles on the same user last-write-win.
    let action = apply_toggle(&mut user.bookmarks, payload.problem_id);
    User::set_bookmarks(&state.db, user.id, &user.bookmarks).await?;

    info!(user_id = %user.id, problem_id = %payload.problem_id, action = ?action, "bookmark toggled");
    Ok(Json(BookmarkResponse {
        success: true,
        action,
        bookmarks: user.bookmarks,
    }))
}

#[instrument(skip(state))]
pub async fn user_stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, ApiError> {
    let total_users = User::count(&state.db).await?;
    Ok(Json(StatsResponse {
        success: true,
        total_users,
    }))
}

fn ext_from_mime(content_type: &str) -> &'static str {
    match content_type {
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "bin",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_adds_when_absent() {
        let existing = Uuid::new_v4();
        let new = Uuid::new_v4();
        let mut bookmarks = vec![existing];
        let action = apply_toggle(&mut bookmarks, new);
        assert_eq!(action, BookmarkAction::Added);
        assert_eq!(bookmarks, vec![existing, new]);
    }

    #[test]
    fn toggle_removes_when_present() {
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let mut bookmarks = vec![first, second];
        let action = apply_toggle(&mut bookmarks, first);
        assert_eq!(action, BookmarkAction::Removed);
        assert_eq!(bookmarks, vec![second]);
    }

    #[test]
    fn double_toggle_restores_original_state() {
        let original = vec![Uuid::new_v4(), Uuid::new_v4()];
        let problem = Uuid::new_v4();
        let mut bookmarks = original.clone();

        let first = apply_toggle(&mut bookmarks, problem);
        let second = apply_toggle(&mut bookmarks, problem);

        assert_eq!(first, BookmarkAction::Added);
        assert_eq!(second, BookmarkAction::Removed);
        assert_eq!(bookmarks, original);
    }

    #[test]
    fn toggle_never_duplicates() {
        let problem = Uuid::new_v4();
        let mut bookmarks = vec![problem];
        apply_toggle(&mut bookmarks, problem);
        apply_toggle(&mut bookmarks, problem);
        assert_eq!(bookmarks.iter().filter(|id| **id == problem).count(), 1);
    }

    #[test]
    fn ext_from_mime_known_and_unknown() {
        assert_eq!(ext_from_mime("image/png"), "png");
        assert_eq!(ext_from_mime("image/jpeg"), "jpg");
        assert_eq!(ext_from_mime("application/pdf"), "bin");
    }
}
