use serde::{Deserialize, Serialize};

/// What happened at a given point of the session timeline.
///
/// Variants that carry data (pulse counter value, response key, final
/// rating) embed it directly so the persisted record is self-describing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
    ScannerPulse { volume: u64 },
    RecordingStart,
    RecordingEnd,
    TrialStart,
    TrialEnd,
    ProbeOnset,
    PromptOnset,
    Response { key: char },
    RatingFinal { value: u8 },
}

/// One timestamped occurrence, immutable once created.
///
/// `time` is seconds since the session clock's zero. Events may be appended
/// out of strict time order within a trial (pulse draining interleaves with
/// trial logic); the log restores time order at flush.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub time: f64,
    #[serde(flatten)]
    pub kind: EventKind,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub trial: Option<usize>,
}

impl Event {
    pub fn new(time: f64, kind: EventKind, trial: Option<usize>) -> Self {
        Self { time, kind, trial }
    }
}
