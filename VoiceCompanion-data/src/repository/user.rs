use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};
use tracing::debug;

use crate::database::DatabasePool;
use crate::models::user::{NewUser, User, UserProfileUpdate};
use super::errors::RepositoryError;

const USER_COLUMNS: &str = "id, username, password_hash, full_name, email, avatar_url, age, region, \
                            created_at, last_login_at, preferences";

/// Repository trait for users
#[async_trait]
pub trait UserRepositoryTrait {
    /// Insert a user; a taken username gives `Conflict`
    async fn create(&self, user: NewUser) -> Result<User, RepositoryError>;

    async fn get_by_id(&self, id: i64) -> Result<Option<User>, RepositoryError>;

    async fn get_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError>;

    /// Stamp `last_login_at` with the current time
    async fn touch_last_login(&self, id: i64) -> Result<(), RepositoryError>;

    /// Apply the non-empty fields of `update` and return the stored user
    async fn update_profile(&self, id: i64, update: UserProfileUpdate) -> Result<User, RepositoryError>;

    async fn update_password(&self, id: i64, password_hash: &str) -> Result<(), RepositoryError>;
}

/// SQLite-backed user repository
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: DatabasePool,
}

impl UserRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
        full_name: row.get(3)?,
        email: row.get(4)?,
        avatar_url: row.get(5)?,
        age: row.get(6)?,
        region: row.get(7)?,
        created_at: row.get(8)?,
        last_login_at: row.get(9)?,
        preferences: row.get(10)?,
    })
}

#[async_trait]
impl UserRepositoryTrait for UserRepository {
    async fn create(&self, user: NewUser) -> Result<User, RepositoryError> {
        if user.username.trim().is_empty() {
            return Err(RepositoryError::Validation("username must not be empty".to_string()));
        }

        debug!("Creating user: {}", user.username);
        let conn = self.pool.connection()?;
        let now = Utc::now();

        conn.execute(
            "INSERT INTO users (username, password_hash, full_name, email, age, region, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                user.username,
                user.password_hash,
                user.full_name,
                user.email,
                user.age,
                user.region,
                now,
            ],
        )
        .map_err(|e| RepositoryError::from_insert(e, "username"))?;

        let id = conn.last_insert_rowid();
        let sql = format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS);
        Ok(conn.query_row(&sql, params![id], map_user)?)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>, RepositoryError> {
        let conn = self.pool.connection()?;
        let sql = format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS);
        Ok(conn.query_row(&sql, params![id], map_user).optional()?)
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError> {
        let conn = self.pool.connection()?;
        let sql = format!("SELECT {} FROM users WHERE username = ?1", USER_COLUMNS);
        Ok(conn.query_row(&sql, params![username], map_user).optional()?)
    }

    async fn touch_last_login(&self, id: i64) -> Result<(), RepositoryError> {
        let conn = self.pool.connection()?;
        let changed = conn.execute(
            "UPDATE users SET last_login_at = ?1 WHERE id = ?2",
            params![Utc::now(), id],
        )?;
        if changed == 0 {
            return Err(RepositoryError::NotFound(format!("user {}", id)));
        }
        Ok(())
    }

    async fn update_profile(&self, id: i64, update: UserProfileUpdate) -> Result<User, RepositoryError> {
        let conn = self.pool.connection()?;
        let changed = conn.execute(
            "UPDATE users SET
                full_name = COALESCE(?1, full_name),
                email = COALESCE(?2, email),
                avatar_url = COALESCE(?3, avatar_url),
                age = COALESCE(?4, age),
                region = COALESCE(?5, region),
                preferences = COALESCE(?6, preferences)
             WHERE id = ?7",
            params![
                update.full_name,
                update.email,
                update.avatar_url,
                update.age,
                update.region,
                update.preferences,
                id,
            ],
        )?;
        if changed == 0 {
            return Err(RepositoryError::NotFound(format!("user {}", id)));
        }

        let sql = format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS);
        Ok(conn.query_row(&sql, params![id], map_user)?)
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> Result<(), RepositoryError> {
        let conn = self.pool.connection()?;
        let changed = conn.execute(
            "UPDATE users SET password_hash = ?1 WHERE id = ?2",
            params![password_hash, id],
        )?;
        if changed == 0 {
            return Err(RepositoryError::NotFound(format!("user {}", id)));
        }
        Ok(())
    }
}

/// Mock user repository for testing
#[cfg(any(test, feature = "mock"))]
pub mod tests {
    use super::*;
    use std::sync::Mutex;

    /// In-memory implementation of [`UserRepositoryTrait`]
    #[derive(Default)]
    pub struct MockUserRepository {
        users: Mutex<Vec<User>>,
    }

    impl MockUserRepository {
        pub fn new() -> Self {
            Self::default()
        }

        /// Create a mock repository with predefined users
        pub fn with_users(users: Vec<User>) -> Self {
            Self { users: Mutex::new(users) }
        }
    }

    #[async_trait]
    impl UserRepositoryTrait for MockUserRepository {
        async fn create(&self, user: NewUser) -> Result<User, RepositoryError> {
            let mut users = self.users.lock()?;
            if users.iter().any(|u| u.username == user.username) {
                return Err(RepositoryError::Conflict("username already exists".to_string()));
            }
            let stored = User {
                id: users.iter().map(|u| u.id).max().unwrap_or(0) + 1,
                username: user.username,
                password_hash: user.password_hash,
                full_name: user.full_name,
                email: user.email,
                avatar_url: None,
                age: user.age,
                region: user.region,
                created_at: Utc::now(),
                last_login_at: None,
                preferences: None,
            };
            users.push(stored.clone());
            Ok(stored)
        }

        async fn get_by_id(&self, id: i64) -> Result<Option<User>, RepositoryError> {
            Ok(self.users.lock()?.iter().find(|u| u.id == id).cloned())
        }

        async fn get_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError> {
            Ok(self.users.lock()?.iter().find(|u| u.username == username).cloned())
        }

        async fn touch_last_login(&self, id: i64) -> Result<(), RepositoryError> {
            let mut users = self.users.lock()?;
            let user = users
                .iter_mut()
                .find(|u| u.id == id)
                .ok_or_else(|| RepositoryError::NotFound(format!("user {}", id)))?;
            user.last_login_at = Some(Utc::now());
            Ok(())
        }

        async fn update_profile(&self, id: i64, update: UserProfileUpdate) -> Result<User, RepositoryError> {
            let mut users = self.users.lock()?;
            let user = users
                .iter_mut()
                .find(|u| u.id == id)
                .ok_or_else(|| RepositoryError::NotFound(format!("user {}", id)))?;
            if update.full_name.is_some() {
                user.full_name = update.full_name;
            }
            if update.email.is_some() {
                user.email = update.email;
            }
            if update.avatar_url.is_some() {
                user.avatar_url = update.avatar_url;
            }
            if update.age.is_some() {
                user.age = update.age;
            }
            if update.region.is_some() {
                user.region = update.region;
            }
            if update.preferences.is_some() {
                user.preferences = update.preferences;
            }
            Ok(user.clone())
        }

        async fn update_password(&self, id: i64, password_hash: &str) -> Result<(), RepositoryError> {
            let mut users = self.users.lock()?;
            let user = users
                .iter_mut()
                .find(|u| u.id == id)
                .ok_or_else(|| RepositoryError::NotFound(format!("user {}", id)))?;
            user.password_hash = password_hash.to_string();
            Ok(())
        }
    }

    #[cfg(test)]
    mod sqlite {
        use super::super::*;
        use crate::database::create_in_memory_pool;

        fn new_user(name: &str) -> NewUser {
            NewUser {
                username: name.to_string(),
                password_hash: "hash".to_string(),
                age: Some(30),
                region: Some("上海".to_string()),
                ..Default::default()
            }
        }

        #[tokio::test]
        async fn test_create_and_lookup() {
            let repo = UserRepository::new(create_in_memory_pool().unwrap());
            let created = repo.create(new_user("alice")).await.unwrap();

            assert_eq!(created.username, "alice");
            assert_eq!(created.age, Some(30));
            assert!(created.last_login_at.is_none());

            let by_name = repo.get_by_username("alice").await.unwrap().unwrap();
            assert_eq!(by_name.id, created.id);
            assert!(repo.get_by_id(created.id + 100).await.unwrap().is_none());
        }

        #[tokio::test]
        async fn test_duplicate_username_conflicts() {
            let repo = UserRepository::new(create_in_memory_pool().unwrap());
            repo.create(new_user("bob")).await.unwrap();

            let err = repo.create(new_user("bob")).await.unwrap_err();
            assert!(matches!(err, RepositoryError::Conflict(_)));
        }

        #[tokio::test]
        async fn test_update_profile_keeps_unset_fields() {
            let repo = UserRepository::new(create_in_memory_pool().unwrap());
            let user = repo.create(new_user("carol")).await.unwrap();

            let updated = repo
                .update_profile(
                    user.id,
                    UserProfileUpdate {
                        full_name: Some("Carol".to_string()),
                        preferences: Some(r#"{"theme":"dark"}"#.to_string()),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();

            assert_eq!(updated.full_name.as_deref(), Some("Carol"));
            assert_eq!(updated.region.as_deref(), Some("上海"));
            assert_eq!(updated.preferences_json()["theme"], "dark");
        }

        #[tokio::test]
        async fn test_touch_last_login_and_password() {
            let repo = UserRepository::new(create_in_memory_pool().unwrap());
            let user = repo.create(new_user("dave")).await.unwrap();

            repo.touch_last_login(user.id).await.unwrap();
            repo.update_password(user.id, "new-hash").await.unwrap();

            let stored = repo.get_by_id(user.id).await.unwrap().unwrap();
            assert!(stored.last_login_at.is_some());
            assert_eq!(stored.password_hash, "new-hash");

            assert!(matches!(
                repo.update_password(999, "x").await,
                Err(RepositoryError::NotFound(_))
            ));
        }
    }
}
