pub mod errors;
pub mod id;
pub mod notifications;

pub use errors::{CallError, ConfigError, RoomcallError};
pub use id::{new_call_id, new_id, CallId};
pub use notifications::{Notification, NotificationLevel};

pub type Result<T> = std::result::Result<T, RoomcallError>;
