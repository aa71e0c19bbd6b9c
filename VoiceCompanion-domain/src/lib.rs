// VoiceCompanion Domain
// Business logic for the voice companion: auth, AI providers and services

// Services that implement business logic
pub mod services;

// Authentication
pub mod auth;

// Domain entities
pub mod entities;

// Health checks and system status
pub mod health;

// Cloud AI provider clients
pub mod providers;

// Re-export the database module from voice_companion_data for convenience
pub use voice_companion_data::database;

// Testing utilities - only available in tests or with the mock feature
#[cfg(any(test, feature = "mock"))]
pub mod testing;
