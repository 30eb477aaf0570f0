pub mod config;
pub mod error;
pub mod events;
pub mod jitter;
pub mod ports;
pub mod session;
pub mod trigger;

pub use config::{RatingKeys, SessionConfig, StateKey};
pub use error::{ConfigError, SessionError};
pub use events::EventLog;
pub use ports::{InputSource, KeyEvent, Surface, TriggerPort};
pub use session::{Session, SessionReport};
pub use trigger::{NullEmitter, PortEmitter, TriggerEmitter};
