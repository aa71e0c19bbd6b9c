// Public request and response bodies of the HTTP API
pub mod admin;
pub mod ai;
pub mod auth;
pub mod common;
pub mod device;
pub mod health_data;
pub mod navigation;
pub mod speech;
pub mod system;

pub use common::{ErrorResponse, MessageResponse};
