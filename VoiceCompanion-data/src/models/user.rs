use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Storage model for a registered user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    /// bcrypt hash, never serialized into responses
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    pub age: Option<i32>,
    pub region: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
    /// JSON object stored as text
    pub preferences: Option<String>,
}

impl User {
    /// Parsed preferences; anything that is not a JSON object reads as empty
    pub fn preferences_json(&self) -> serde_json::Map<String, serde_json::Value> {
        self.preferences
            .as_deref()
            .and_then(|raw| serde_json::from_str::<serde_json::Value>(raw).ok())
            .and_then(|value| match value {
                serde_json::Value::Object(map) => Some(map),
                _ => None,
            })
            .unwrap_or_default()
    }
}

/// Input for creating a user
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub age: Option<i32>,
    pub region: Option<String>,
}

/// Partial profile update; `None` leaves the column untouched
#[derive(Debug, Clone, Default)]
pub struct UserProfileUpdate {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    pub age: Option<i32>,
    pub region: Option<String>,
    pub preferences: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_with(preferences: Option<&str>) -> User {
        User {
            id: 1,
            username: "alice".to_string(),
            password_hash: "hash".to_string(),
            full_name: None,
            email: None,
            avatar_url: None,
            age: None,
            region: None,
            created_at: Utc::now(),
            last_login_at: None,
            preferences: preferences.map(str::to_string),
        }
    }

    #[test]
    fn test_preferences_json() {
        assert!(user_with(None).preferences_json().is_empty());
        assert!(user_with(Some("not json")).preferences_json().is_empty());
        assert!(user_with(Some("[1,2]")).preferences_json().is_empty());

        let prefs = user_with(Some(r#"{"voice":{"voice_speed":1.2}}"#)).preferences_json();
        assert!(prefs.contains_key("voice"));
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let json = serde_json::to_value(user_with(None)).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["username"], "alice");
    }
}
