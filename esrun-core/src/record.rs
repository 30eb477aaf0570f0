use serde::{Deserialize, Serialize};

/// Data for one completed trial, produced exactly once per trial in order.
///
/// `trial` is 1-based to match the analysis pipeline's numbering. Rating
/// fields are only present when the reported state triggered the arousal
/// scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    pub trial: usize,
    pub probe_onset: f64,
    pub prompt_onset: f64,
    pub rest_duration: f64,
    pub state: String,
    pub response_key: char,
    pub response_latency: f64,
    pub rating: Option<u8>,
    pub rating_latency: Option<f64>,
}
