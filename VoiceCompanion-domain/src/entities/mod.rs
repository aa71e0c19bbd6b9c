// Domain entities: request payloads and client-facing views
pub mod conversions;
pub mod health_data;
pub mod user;

// Re-export common types for easier imports
pub use health_data::{HealthRecord, HealthStats, UploadHealthDataRequest};
pub use user::{
    AuthSession, ChangePasswordRequest, LoginRequest, ProfileUpdateRequest, RefreshTokenRequest, RegisterRequest,
    SpeechPreferences, UserProfile,
};
