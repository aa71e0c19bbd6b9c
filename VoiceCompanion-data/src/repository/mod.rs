// Repository module structure
pub mod errors;
mod user;
mod session;
mod health_data;
mod interaction;

// Re-export commonly used types
pub use errors::RepositoryError;
pub use user::{UserRepository, UserRepositoryTrait};
pub use session::{SessionRepository, SessionRepositoryTrait};
pub use health_data::{HealthDataRepository, HealthDataRepositoryTrait};
pub use interaction::{InteractionRepository, InteractionRepositoryTrait};

// Re-export mocks for both testing and when mock feature is enabled
#[cfg(any(test, feature = "mock"))]
pub mod mocks {
    pub use super::health_data::tests::MockHealthDataRepository;
    pub use super::user::tests::MockUserRepository;
}
