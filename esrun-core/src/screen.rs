/// Participant-facing display states.
///
/// The controller only decides *what* is on screen; how it is rendered is
/// the surface implementation's concern.
#[derive(Debug, Clone, PartialEq)]
pub enum Screen {
    Blank,
    Instructions { text: String },
    Fixation,
    Probe,
    Prompt { states: Vec<String> },
    Feedback { state: String },
    Rating { value: u8 },
    Completion { volumes: u64 },
}
