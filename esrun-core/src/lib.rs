pub mod codes;
pub mod event;
pub mod record;
pub mod screen;

pub use event::{Event, EventKind};
pub use record::TrialRecord;
pub use screen::Screen;
