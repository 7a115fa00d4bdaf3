pub mod api_key;
pub mod chatbot;
pub mod context;
pub mod session;
pub mod user;

pub use api_key::ApiKey;
pub use chatbot::{BusinessInfo, Chatbot, NewChatbot};
pub use context::{UserContext, UserProfile};
pub use session::UserSession;
pub use user::{NewUser, User, UserDetails, UserSummary};
