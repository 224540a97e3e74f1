use serde::Serialize;
use uuid::Uuid;

use crate::problems::repo::ProblemTitle;
use crate::users::repo::User;

/// Solved problem expanded to its title for display.
#[derive(Debug, Serialize)]
pub struct SolvedProblem {
    pub id: Uuid,
    pub title: String,
}

/// User as returned to the client: no password hash, solved problems
/// expanded.
#[derive(Debug, Serialize)]
pub struct ProfileUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub profile_image: String,
    pub role: String,
    pub bookmarks: Vec<Uuid>,
    pub solved_problems: Vec<SolvedProblem>,
}

impl ProfileUser {
    pub fn from_user(user: User, solved: Vec<ProblemTitle>) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            profile_image: user.profile_image,
            role: user.role,
            bookmarks: user.bookmarks,
            solved_problems: solved
                .into_iter()
                .map(|p| SolvedProblem {
                    id: p.id,
                    title: p.title,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub success: bool,
    pub user: ProfileUser,
}

#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum BookmarkAction {
    Added,
    Removed,
}

#[derive(Debug, Serialize)]
pub struct BookmarkResponse {
    pub success: bool,
    pub action: BookmarkAction,
    pub bookmarks: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub success: bool,
    pub total_users: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    fn sample_user() -> User {
        User {
            id: Uuid::new_v4(),
            username: "ann".into(),
            email: "ann@x.com".into(),
            password_hash: "$argon2id$v=19$secret".into(),
            profile_image: crate::users::repo::DEFAULT_PROFILE_IMAGE.into(),
            role: "user".into(),
            bookmarks: vec![],
            solved_problems: vec![],
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn profile_user_never_serializes_password() {
        let profile = ProfileUser::from_user(sample_user(), vec![]);
        let json = serde_json::to_string(&profile).unwrap();
        assert!(json.contains("ann@x.com"));
        assert!(!json.contains("password"));
        assert!(!json.contains("argon2"));
    }

    #[test]
    fn user_row_skips_password_hash_too() {
        let json = serde_json::to_string(&sample_user()).unwrap();
        assert!(!json.contains("password_hash"));
        assert!(!json.contains("argon2"));
    }

    #[test]
    fn bookmark_action_labels() {
        assert_eq!(
            serde_json::to_string(&BookmarkAction::Added).unwrap(),
            "\"added\""
        );
        assert_eq!(
            serde_json::to_string(&BookmarkAction::Removed).unwrap(),
            "\"removed\""
        );
    }

    #[test]
    fn solved_problems_keep_given_order() {
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let profile = ProfileUser::from_user(
            sample_user(),
            vec![
                ProblemTitle {
                    id: first,
                    title: "Two Sum".into(),
                },
                ProblemTitle {
                    id: second,
                    title: "Valid Parentheses".into(),
                },
            ],
        );
        assert_eq!(profile.solved_problems[0].id, first);
        assert_eq!(profile.solved_problems[0].title, "Two Sum");
        assert_eq!(profile.solved_problems[1].id, second);
    }
}
