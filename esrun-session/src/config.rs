use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// One response channel: a physical key and the mental-state label it
/// reports. The mapping is explicit so semantics never depend on the order
/// the buttons were declared in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateKey {
    pub key: char,
    pub label: String,
}

/// Keys driving the arousal rating scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingKeys {
    pub up: char,
    pub down: char,
    pub confirm: char,
}

impl Default for RatingKeys {
    fn default() -> Self {
        // Matches the MRI joystick layout: b/g adjust, y confirms.
        Self {
            up: 'b',
            down: 'g',
            confirm: 'y',
        }
    }
}

/// Full configuration for one session, validated eagerly before any
/// resource is acquired.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub participant: String,
    #[serde(default = "default_task")]
    pub task: String,
    pub data_dir: PathBuf,

    pub n_trials: usize,
    /// Nominal rest interval between probes, seconds.
    pub nominal_interval: f64,
    /// Per-trial rest offsets are drawn from [-jitter_bound, +jitter_bound].
    pub jitter_bound: f64,
    /// When set, the rest schedule is constrained to sum to exactly this
    /// many seconds of total session time (fixed scanner-run duration).
    #[serde(default)]
    pub total_duration: Option<f64>,
    /// Seed for the jitter draw; a fixed seed replays the exact schedule.
    #[serde(default)]
    pub jitter_seed: Option<u64>,

    pub states: Vec<StateKey>,
    /// Label that triggers the arousal rating after the response.
    #[serde(default = "default_rating_state")]
    pub rating_state: String,
    #[serde(default)]
    pub rating_keys: RatingKeys,
    #[serde(default = "default_rating_step")]
    pub rating_step: u8,

    #[serde(default = "default_sync_pulses")]
    pub sync_pulses: usize,
    #[serde(default = "default_pulse_key")]
    pub pulse_key: char,
    #[serde(default = "default_start_key")]
    pub start_key: char,
    #[serde(default = "default_finish_key")]
    pub finish_key: char,
    #[serde(default = "default_abort_key")]
    pub abort_key: char,
    /// Largest tolerated spread between inter-pulse intervals during sync,
    /// seconds. None disables the check.
    #[serde(default)]
    pub pulse_interval_tolerance: Option<f64>,

    #[serde(default)]
    pub hardware_trigger: bool,
    /// Character device the trigger codes are written to, when enabled.
    #[serde(default)]
    pub trigger_device: Option<PathBuf>,
    #[serde(default = "default_trigger_hold")]
    pub trigger_hold: f64,

    #[serde(default = "default_probe_duration")]
    pub probe_duration: f64,
    #[serde(default = "default_feedback_duration")]
    pub feedback_duration: f64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default)]
    pub instructions: Option<String>,
}

fn default_task() -> String {
    "ES".to_string()
}

fn default_rating_state() -> String {
    "Blank".to_string()
}

fn default_rating_step() -> u8 {
    5
}

fn default_sync_pulses() -> usize {
    5
}

fn default_pulse_key() -> char {
    't'
}

fn default_start_key() -> char {
    'e'
}

fn default_finish_key() -> char {
    'f'
}

fn default_abort_key() -> char {
    '\u{1b}'
}

// Existing recordings were marked with 100 ms pulses; alignment tooling
// expects that width.
fn default_trigger_hold() -> f64 {
    0.1
}

fn default_probe_duration() -> f64 {
    1.0
}

fn default_feedback_duration() -> f64 {
    1.0
}

fn default_poll_interval_ms() -> u64 {
    20
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.n_trials == 0 {
            return Err(ConfigError::NoTrials);
        }
        if self.nominal_interval <= 0.0 {
            return Err(ConfigError::NonPositiveInterval(self.nominal_interval));
        }
        if self.jitter_bound < 0.0 || self.jitter_bound > self.nominal_interval {
            return Err(ConfigError::JitterExceedsInterval {
                bound: self.jitter_bound,
                interval: self.nominal_interval,
            });
        }
        if self.sync_pulses == 0 {
            return Err(ConfigError::NoSyncPulses);
        }
        if self.states.is_empty() {
            return Err(ConfigError::NoStates);
        }
        for (i, s) in self.states.iter().enumerate() {
            if self.states[..i].iter().any(|other| other.key == s.key) {
                return Err(ConfigError::DuplicateKey(s.key));
            }
        }
        // Pulses and the abort/start/finish keys are consumed before the
        // response match in every wait loop, so a shared key would make the
        // corresponding response unobservable.
        let rating = [
            self.rating_keys.up,
            self.rating_keys.down,
            self.rating_keys.confirm,
        ];
        for key in [
            self.pulse_key,
            self.abort_key,
            self.start_key,
            self.finish_key,
        ] {
            if rating.contains(&key) || self.states.iter().any(|s| s.key == key) {
                return Err(ConfigError::ControlKeyCollision(key));
            }
        }
        if let Some(target) = self.total_duration {
            let required = self.n_trials as f64 * self.nominal_interval;
            if target < required {
                return Err(ConfigError::DurationTooShort {
                    target,
                    required,
                    trials: self.n_trials,
                });
            }
            let needed = (target - required) / self.n_trials as f64;
            if needed.abs() > self.jitter_bound {
                return Err(ConfigError::DurationOutOfReach {
                    target,
                    needed,
                    bound: self.jitter_bound,
                });
            }
        }
        Ok(())
    }

    /// Maps a pressed response key to its state label.
    pub fn state_for_key(&self, key: char) -> Option<&str> {
        self.states
            .iter()
            .find(|s| s.key == key)
            .map(|s| s.label.as_str())
    }

    pub fn response_keys(&self) -> Vec<char> {
        self.states.iter().map(|s| s.key).collect()
    }

    pub fn state_labels(&self) -> Vec<String> {
        self.states.iter().map(|s| s.label.clone()).collect()
    }

    /// `sub-<participant>_task-<task>` under the data directory.
    pub fn session_dir(&self) -> PathBuf {
        self.data_dir
            .join(format!("sub-{}_task-{}", self.participant, self.task))
    }

    pub fn file_stem(&self) -> String {
        format!("sub-{}_task-{}", self.participant, self.task)
    }
}

#[cfg(test)]
pub(crate) fn test_config(data_dir: PathBuf) -> SessionConfig {
    SessionConfig {
        participant: "001".to_string(),
        task: default_task(),
        data_dir,
        n_trials: 3,
        nominal_interval: 5.0,
        jitter_bound: 2.0,
        total_duration: None,
        jitter_seed: Some(7),
        states: vec![
            StateKey {
                key: 'b',
                label: "Thought".to_string(),
            },
            StateKey {
                key: 'y',
                label: "Blank".to_string(),
            },
            StateKey {
                key: 'g',
                label: "Sleep".to_string(),
            },
        ],
        rating_state: default_rating_state(),
        rating_keys: RatingKeys::default(),
        rating_step: default_rating_step(),
        sync_pulses: 5,
        pulse_key: default_pulse_key(),
        start_key: default_start_key(),
        finish_key: default_finish_key(),
        abort_key: default_abort_key(),
        pulse_interval_tolerance: None,
        hardware_trigger: false,
        trigger_device: None,
        trigger_hold: default_trigger_hold(),
        probe_duration: default_probe_duration(),
        feedback_duration: default_feedback_duration(),
        poll_interval_ms: 20,
        instructions: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_config_passes() {
        let cfg = test_config(PathBuf::from("/tmp"));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn zero_trials_rejected() {
        let mut cfg = test_config(PathBuf::from("/tmp"));
        cfg.n_trials = 0;
        assert!(matches!(cfg.validate(), Err(ConfigError::NoTrials)));
    }

    #[test]
    fn zero_sync_pulses_rejected() {
        let mut cfg = test_config(PathBuf::from("/tmp"));
        cfg.sync_pulses = 0;
        assert!(matches!(cfg.validate(), Err(ConfigError::NoSyncPulses)));
    }

    #[test]
    fn pulse_key_shadowing_a_response_key_rejected() {
        let mut cfg = test_config(PathBuf::from("/tmp"));
        cfg.pulse_key = 'b'; // also the "Thought" response key
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::ControlKeyCollision('b'))
        ));
    }

    #[test]
    fn finish_key_shadowing_a_rating_key_rejected() {
        let mut cfg = test_config(PathBuf::from("/tmp"));
        cfg.finish_key = cfg.rating_keys.confirm;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::ControlKeyCollision('y'))
        ));
    }

    #[test]
    fn duplicate_response_key_rejected() {
        let mut cfg = test_config(PathBuf::from("/tmp"));
        cfg.states.push(StateKey {
            key: 'b',
            label: "Other".to_string(),
        });
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::DuplicateKey('b'))
        ));
    }

    #[test]
    fn target_duration_shorter_than_schedule_rejected() {
        let mut cfg = test_config(PathBuf::from("/tmp"));
        cfg.total_duration = Some(10.0); // needs at least 15s for 3 trials
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::DurationTooShort { .. })
        ));
    }

    #[test]
    fn target_duration_beyond_jitter_reach_rejected() {
        let mut cfg = test_config(PathBuf::from("/tmp"));
        // Mean offset would need to be (30 - 15) / 3 = 5s, beyond ±2s.
        cfg.total_duration = Some(30.0);
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::DurationOutOfReach { .. })
        ));
    }

    #[test]
    fn key_mapping_is_positional_independent() {
        let cfg = test_config(PathBuf::from("/tmp"));
        assert_eq!(cfg.state_for_key('y'), Some("Blank"));
        assert_eq!(cfg.state_for_key('g'), Some("Sleep"));
        assert_eq!(cfg.state_for_key('x'), None);
    }

    #[test]
    fn defaults_fill_from_minimal_json() {
        let json = r#"{
            "participant": "042",
            "data_dir": "/tmp/es",
            "n_trials": 50,
            "nominal_interval": 45.0,
            "jitter_bound": 15.0,
            "states": [
                {"key": "b", "label": "Thought"},
                {"key": "y", "label": "Blank"},
                {"key": "g", "label": "Sleep"}
            ]
        }"#;
        let cfg: SessionConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.task, "ES");
        assert_eq!(cfg.sync_pulses, 5);
        assert_eq!(cfg.pulse_key, 't');
        assert_eq!(cfg.rating_step, 5);
        assert_eq!(cfg.rating_keys, RatingKeys::default());
        assert_eq!(cfg.trigger_hold, 0.1);
        assert!(cfg.validate().is_ok());
    }
}
