use std::path::PathBuf;

use thiserror::Error;

/// Problems detected before any session resource is acquired. All fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("session directory already exists: {0}")]
    SessionDirExists(PathBuf),

    #[error("failed to create session directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("trial count must be non-zero")]
    NoTrials,

    #[error("nominal interval must be positive, got {0}")]
    NonPositiveInterval(f64),

    #[error("jitter bound {bound} exceeds nominal interval {interval}")]
    JitterExceedsInterval { bound: f64, interval: f64 },

    #[error("at least one sync pulse is required")]
    NoSyncPulses,

    #[error("no response states configured")]
    NoStates,

    #[error("response key '{0}' is mapped to more than one state")]
    DuplicateKey(char),

    #[error("control key '{0}' collides with a response or rating key")]
    ControlKeyCollision(char),

    #[error(
        "target duration {target}s is shorter than the {required}s needed \
         for {trials} trials at the nominal interval"
    )]
    DurationTooShort {
        target: f64,
        required: f64,
        trials: usize,
    },

    #[error(
        "target duration {target}s needs a mean offset of {needed}s per \
         trial, outside the ±{bound}s jitter bound"
    )]
    DurationOutOfReach {
        target: f64,
        needed: f64,
        bound: f64,
    },

    #[error("no jitter schedule met the duration constraint after {0} draws")]
    JitterDrawFailed(usize),
}

/// Errors that end a running session.
///
/// Hardware trigger failures and flush failures are deliberately absent:
/// those are absorbed with a warning and the session continues.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("session aborted by operator")]
    Aborted,

    #[error("inconsistent scanner pulse intervals during sync: {intervals:?}")]
    UnstablePulseTrain { intervals: Vec<f64> },

    #[error("display failure: {0}")]
    Surface(#[source] anyhow::Error),
}
