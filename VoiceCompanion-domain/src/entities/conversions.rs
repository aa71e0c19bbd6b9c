//! Conversions between storage models and domain entities

use voice_companion_data::models::{HealthData, NewHealthData, NewUser, User};

use crate::entities::health_data::{HealthRecord, UploadHealthDataRequest};
use crate::entities::user::{RegisterRequest, UserProfile};

pub fn convert_to_user_profile(user: &User) -> UserProfile {
    UserProfile {
        id: user.id,
        username: user.username.clone(),
        full_name: user.full_name.clone(),
        email: user.email.clone(),
        avatar_url: user.avatar_url.clone(),
        age: user.age,
        region: user.region.clone(),
        created_at: user.created_at,
        last_login_at: user.last_login_at,
        preferences: user.preferences_json(),
    }
}

/// Registration data for storage; non-positive ages and blank regions become unknown
pub fn convert_to_new_user(request: &RegisterRequest, password_hash: String) -> NewUser {
    NewUser {
        username: request.username.trim().to_string(),
        password_hash,
        full_name: request.full_name.clone().filter(|s| !s.trim().is_empty()),
        email: request.email.clone().filter(|s| !s.trim().is_empty()),
        age: request.age.filter(|age| *age > 0),
        region: request.region.clone().filter(|s| !s.trim().is_empty()),
    }
}

pub fn convert_to_health_record(data: HealthData) -> HealthRecord {
    HealthRecord {
        id: data.id,
        date: data.date,
        steps: data.steps,
        heart_rate: data.heart_rate,
        sleep_hours: data.sleep_hours,
        calories: data.calories,
        distance: data.distance,
        created_at: data.created_at,
    }
}

pub fn convert_to_new_health_data(request: &UploadHealthDataRequest) -> NewHealthData {
    NewHealthData {
        date: request.date,
        steps: request.steps,
        heart_rate: request.heart_rate,
        sleep_hours: request.sleep_hours,
        calories: request.calories,
        distance: request.distance,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_cleans_optional_fields() {
        let request = RegisterRequest {
            username: " alice ".to_string(),
            password: "secret1".to_string(),
            full_name: Some("Alice".to_string()),
            email: Some(String::new()),
            age: Some(0),
            region: Some("  ".to_string()),
        };
        let user = convert_to_new_user(&request, "hash".to_string());
        assert_eq!(user.username, "alice");
        assert_eq!(user.full_name.as_deref(), Some("Alice"));
        assert!(user.email.is_none());
        assert!(user.age.is_none());
        assert!(user.region.is_none());
    }
}
