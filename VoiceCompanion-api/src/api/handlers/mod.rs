pub mod admin;
pub mod ai;
pub mod auth;
pub mod dashboard;
pub mod device;
pub mod health_data;
pub mod navigation;
pub mod speech;
pub mod system;
pub mod voice_chat;

// Tests module
#[cfg(test)]
mod tests;

pub use system::{health_check, initialize_server_start_time};
