// Storage models
pub mod user;
pub mod session;
pub mod health_data;
pub mod interaction;

pub use user::{NewUser, User, UserProfileUpdate};
pub use session::{AiSession, ConversationMessage, MessageType, NewConversationMessage, SessionUpdate};
pub use health_data::{HealthData, NewHealthData};
pub use interaction::{InteractionLog, InteractionStatistics, NewInteractionLog};
