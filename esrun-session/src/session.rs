//! Session orchestration and the per-trial state machine.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use esrun_core::{EventKind, Screen, TrialRecord, codes};
use esrun_timing::Clock;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::error::{ConfigError, SessionError};
use crate::events::EventLog;
use crate::jitter::{self, JitterPolicy};
use crate::ports::{InputSource, KeyEvent, Surface};
use crate::trigger::TriggerEmitter;

const RATING_INITIAL: u8 = 50;
const VOLUME_SUMMARY_EVERY: u64 = 50;

const DEFAULT_INSTRUCTIONS: &str =
    "Whenever you see the probe, report the mental state you were in just \
     before it appeared.";

/// Phases of one trial. `Resting` is the only variable-length phase.
#[derive(Debug, Clone, Copy, PartialEq)]
enum TrialPhase {
    Resting,
    ProbeShown,
    AwaitingResponse,
    AwaitingRating,
    Done,
}

enum Wait {
    Key(KeyEvent),
    Deadline,
}

/// What a finished session hands back to the operator frontend.
#[derive(Debug)]
pub struct SessionReport {
    pub volumes: u64,
    pub records: Vec<TrialRecord>,
}

/// One experiment run for one participant.
///
/// Owns the clock, the event log, the trigger emitter and the pulse counter
/// for its whole lifetime; collaborators are trait seams so the controller
/// runs identically against hardware or simulation.
pub struct Session<C, S, I, E> {
    config: SessionConfig,
    clock: C,
    surface: S,
    input: I,
    trigger: E,
    events: EventLog,
    records: Vec<TrialRecord>,
    records_path: PathBuf,
    volume_count: u64,
    poll_interval: Duration,
    trigger_hold: Duration,
}

// Bound-free so `Result<Session, _>::unwrap_err` works with collaborators
// that are not themselves `Debug`.
impl<C, S, I, E> std::fmt::Debug for Session<C, S, I, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("volume_count", &self.volume_count)
            .finish_non_exhaustive()
    }
}

impl<C, S, I, E> Session<C, S, I, E>
where
    C: Clock,
    S: Surface,
    I: InputSource,
    E: TriggerEmitter,
{
    /// Validates the configuration and claims the session directory.
    ///
    /// Fails before acquiring anything else if the configuration is
    /// inconsistent or a prior run already wrote into the directory.
    pub fn new(
        config: SessionConfig,
        clock: C,
        surface: S,
        input: I,
        trigger: E,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let dir = config.session_dir();
        if dir.exists() {
            return Err(ConfigError::SessionDirExists(dir));
        }
        fs::create_dir_all(&dir).map_err(|source| ConfigError::CreateDir {
            path: dir.clone(),
            source,
        })?;

        let stem = config.file_stem();
        let events = EventLog::new(dir.join(format!("{stem}_events.json")));
        let records_path = dir.join(format!("{stem}_trials.json"));
        let poll_interval = Duration::from_millis(config.poll_interval_ms);
        let trigger_hold = Duration::from_secs_f64(config.trigger_hold);

        info!(
            participant = %config.participant,
            task = %config.task,
            trials = config.n_trials,
            dir = %dir.display(),
            "session created"
        );

        Ok(Self {
            config,
            clock,
            surface,
            input,
            trigger,
            events,
            records: Vec::new(),
            records_path,
            volume_count: 0,
            poll_interval,
            trigger_hold,
        })
    }

    /// Runs the full session lifecycle.
    ///
    /// Every exit path, operator abort included, still attempts a final
    /// flush and closes the surface before returning.
    pub fn run(mut self) -> Result<SessionReport, SessionError> {
        let result = self.run_inner();
        self.flush_all();
        self.surface.close();
        result.map(move |()| SessionReport {
            volumes: self.volume_count,
            records: self.records,
        })
    }

    fn run_inner(&mut self) -> Result<(), SessionError> {
        // Instructions, then the operator arms the recording.
        let text = self
            .config
            .instructions
            .clone()
            .unwrap_or_else(|| DEFAULT_INSTRUCTIONS.to_string());
        self.present(&Screen::Instructions { text })?;
        info!(key = %self.config.start_key, "start the recording, then press the start key");
        let start = self.wait_for_key(&[self.config.start_key])?;
        self.trigger.pulse(codes::RECORDING_START, self.trigger_hold);
        self.events.record(start.time, EventKind::RecordingStart, None);
        info!(time = start.time, "recording start mark sent");

        // Synchronize to the scanner.
        self.present(&Screen::Blank)?;
        let t0 = self.wait_for_pulses(self.config.sync_pulses)?;
        info!(t0, "synchronized to first pulse");

        let offsets = self.draw_schedule()?;

        for (index, offset) in offsets.into_iter().enumerate() {
            self.drain_pulses()?;
            let record = self.run_trial(index, self.config.nominal_interval + offset)?;
            self.events
                .record(self.clock.now(), EventKind::TrialEnd, Some(index));
            info!(trial = index + 1, total = self.config.n_trials, "trial completed");
            self.records.push(record);
            self.flush_all();
        }

        self.drain_pulses()?;
        self.trigger.pulse(codes::RECORDING_END, self.trigger_hold);
        self.events
            .record(self.clock.now(), EventKind::RecordingEnd, None);

        // Keep counting pulses until the operator stops the sequence and
        // confirms.
        info!(
            volumes = self.volume_count,
            key = %self.config.finish_key,
            "task finished, stop the sequence and press the finish key"
        );
        self.await_operator_finish()?;

        Ok(())
    }

    /// Completion screen shown until the operator confirms; pulses keep
    /// arriving after the task, so the displayed volume count is refreshed
    /// whenever it changes.
    fn await_operator_finish(&mut self) -> Result<(), SessionError> {
        let mut shown = self.volume_count;
        self.present(&Screen::Completion { volumes: shown })?;
        loop {
            for ev in self.input.poll() {
                if ev.key == self.config.abort_key {
                    info!("operator abort");
                    return Err(SessionError::Aborted);
                }
                if ev.key == self.config.pulse_key {
                    self.log_pulse(ev.time);
                } else if ev.key == self.config.finish_key {
                    return Ok(());
                }
            }
            if self.volume_count != shown {
                shown = self.volume_count;
                self.present(&Screen::Completion { volumes: shown })?;
            }
            self.clock.sleep(self.poll_interval);
        }
    }

    fn draw_schedule(&mut self) -> Result<Vec<f64>, SessionError> {
        let policy = match self.config.total_duration {
            Some(total_duration) => JitterPolicy::DurationConstrained { total_duration },
            None => JitterPolicy::Unconstrained,
        };
        let mut rng = match self.config.jitter_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let offsets = jitter::rest_offsets(
            &mut rng,
            self.config.n_trials,
            self.config.jitter_bound,
            self.config.nominal_interval,
            policy,
        )?;
        Ok(offsets)
    }

    /// One pass through the trial state machine, yielding the trial record.
    fn run_trial(&mut self, index: usize, rest_duration: f64) -> Result<TrialRecord, SessionError> {
        let mut phase = TrialPhase::Resting;
        let mut probe_onset = 0.0;
        let mut prompt_onset = 0.0;
        let mut state = String::new();
        let mut response_key = ' ';
        let mut response_latency = 0.0;
        let mut rating = None;
        let mut rating_latency = None;

        loop {
            match phase {
                TrialPhase::Resting => {
                    let start = self.present(&Screen::Fixation)?;
                    self.trigger.pulse(codes::TRIAL_START, self.trigger_hold);
                    self.events.record(start, EventKind::TrialStart, Some(index));
                    info!(trial = index + 1, rest = rest_duration, "trial started");
                    self.wait_until(start + rest_duration)?;
                    phase = TrialPhase::ProbeShown;
                }
                TrialPhase::ProbeShown => {
                    probe_onset = self.present(&Screen::Probe)?;
                    self.trigger.pulse(codes::PROBE_ONSET, self.trigger_hold);
                    self.events
                        .record(probe_onset, EventKind::ProbeOnset, Some(index));
                    debug!(trial = index + 1, time = probe_onset, "probe presented");
                    self.wait_until(probe_onset + self.config.probe_duration)?;
                    phase = TrialPhase::AwaitingResponse;
                }
                TrialPhase::AwaitingResponse => {
                    self.surface.draw(&Screen::Prompt {
                        states: self.config.state_labels(),
                    });
                    // Stale presses must not count as responses.
                    self.drain_pulses()?;
                    prompt_onset = self.surface.present().map_err(SessionError::Surface)?;
                    self.events
                        .record(prompt_onset, EventKind::PromptOnset, Some(index));

                    let keys = self.config.response_keys();
                    let (ev, label) = loop {
                        let ev = self.wait_for_key(&keys)?;
                        if let Some(label) = self.config.state_for_key(ev.key) {
                            break (ev, label.to_string());
                        }
                    };
                    response_key = ev.key;
                    response_latency = ev.time - prompt_onset;
                    self.trigger.pulse(codes::RESPONSE, self.trigger_hold);
                    self.events
                        .record(ev.time, EventKind::Response { key: ev.key }, Some(index));
                    info!(
                        trial = index + 1,
                        state = %label,
                        latency = response_latency,
                        "response recorded"
                    );

                    let fb = self.present(&Screen::Feedback {
                        state: label.clone(),
                    })?;
                    self.wait_until(fb + self.config.feedback_duration)?;

                    phase = if label == self.config.rating_state {
                        TrialPhase::AwaitingRating
                    } else {
                        TrialPhase::Done
                    };
                    state = label;
                }
                TrialPhase::AwaitingRating => {
                    let (value, latency) = self.collect_rating(index)?;
                    rating = Some(value);
                    rating_latency = Some(latency);
                    phase = TrialPhase::Done;
                }
                TrialPhase::Done => {
                    return Ok(TrialRecord {
                        trial: index + 1,
                        probe_onset,
                        prompt_onset,
                        rest_duration,
                        state,
                        response_key,
                        response_latency,
                        rating,
                        rating_latency,
                    });
                }
            }
        }
    }

    /// Bounded 0..=100 arousal scale; latency is relative to the scale's
    /// first presentation.
    fn collect_rating(&mut self, index: usize) -> Result<(u8, f64), SessionError> {
        let keys = self.config.rating_keys.clone();
        let step = self.config.rating_step;
        let mut value = RATING_INITIAL;

        self.drain_pulses()?;
        let onset = self.present(&Screen::Rating { value })?;

        loop {
            let ev = self.wait_for_key(&[keys.up, keys.down, keys.confirm])?;
            if ev.key == keys.confirm {
                let latency = ev.time - onset;
                self.trigger.pulse(codes::RATING_RESPONSE, self.trigger_hold);
                self.events
                    .record(ev.time, EventKind::RatingFinal { value }, Some(index));
                info!(trial = index + 1, value, latency, "arousal rating confirmed");
                return Ok((value, latency));
            } else if ev.key == keys.up {
                value = value.saturating_add(step).min(100);
            } else if ev.key == keys.down {
                value = value.saturating_sub(step);
            }
            self.present(&Screen::Rating { value })?;
        }
    }

    /// Blocks until `n` scanner pulses have arrived; returns the time of the
    /// first pulse as the session's synchronization anchor.
    fn wait_for_pulses(&mut self, n: usize) -> Result<f64, SessionError> {
        info!(pulses = n, "waiting for scanner pulses");
        let mut times = Vec::with_capacity(n);
        while times.len() < n {
            for ev in self.input.poll() {
                if ev.key == self.config.abort_key {
                    info!("abort during scanner sync");
                    return Err(SessionError::Aborted);
                }
                if ev.key == self.config.pulse_key {
                    if times.len() < n {
                        times.push(ev.time);
                        info!(pulse = times.len(), of = n, time = ev.time, "sync pulse");
                    }
                    self.log_pulse(ev.time);
                }
            }
            if times.len() < n {
                self.clock.sleep(self.poll_interval);
            }
        }

        if let Some(tolerance) = self.config.pulse_interval_tolerance {
            let intervals: Vec<f64> = times.windows(2).map(|w| w[1] - w[0]).collect();
            if let (Some(min), Some(max)) = (
                intervals.iter().copied().reduce(f64::min),
                intervals.iter().copied().reduce(f64::max),
            ) && max - min > tolerance
            {
                return Err(SessionError::UnstablePulseTrain { intervals });
            }
        }

        Ok(times[0])
    }

    /// One non-blocking poll pass: pulses are counted and logged, anything
    /// else (stale responses included) is discarded.
    fn drain_pulses(&mut self) -> Result<(), SessionError> {
        for ev in self.input.poll() {
            if ev.key == self.config.abort_key {
                return Err(SessionError::Aborted);
            }
            if ev.key == self.config.pulse_key {
                self.log_pulse(ev.time);
            }
        }
        Ok(())
    }

    /// Shared poll-with-short-sleep primitive behind every wait in the
    /// session: keeps draining pulses, honors the abort key, and returns on
    /// an accepted key or the deadline, whichever comes first.
    fn poll_wait(&mut self, accept: &[char], deadline: Option<f64>) -> Result<Wait, SessionError> {
        loop {
            for ev in self.input.poll() {
                if ev.key == self.config.abort_key {
                    info!("operator abort");
                    return Err(SessionError::Aborted);
                }
                if ev.key == self.config.pulse_key {
                    self.log_pulse(ev.time);
                } else if accept.contains(&ev.key) {
                    return Ok(Wait::Key(ev));
                }
            }
            if let Some(deadline) = deadline
                && self.clock.now() >= deadline
            {
                return Ok(Wait::Deadline);
            }
            self.clock.sleep(self.poll_interval);
        }
    }

    fn wait_for_key(&mut self, accept: &[char]) -> Result<KeyEvent, SessionError> {
        match self.poll_wait(accept, None)? {
            Wait::Key(ev) => Ok(ev),
            Wait::Deadline => unreachable!("no deadline was set"),
        }
    }

    fn wait_until(&mut self, deadline: f64) -> Result<(), SessionError> {
        match self.poll_wait(&[], Some(deadline))? {
            Wait::Deadline => Ok(()),
            Wait::Key(_) => unreachable!("no keys were accepted"),
        }
    }

    fn log_pulse(&mut self, time: f64) {
        let volume = self.volume_count;
        self.events
            .record(time, EventKind::ScannerPulse { volume }, None);
        self.volume_count += 1;
        debug!(volume, time, "scanner pulse");
        if self.volume_count % VOLUME_SUMMARY_EVERY == 0 {
            info!(volumes = self.volume_count, time, "volume count");
        }
    }

    fn present(&mut self, screen: &Screen) -> Result<f64, SessionError> {
        self.surface.draw(screen);
        self.surface.present().map_err(SessionError::Surface)
    }

    /// Persists the event log and the trial list. Storage failures are
    /// logged and retried on the next flush; they never block the session.
    fn flush_all(&mut self) {
        self.events.flush();
        if let Err(e) = self.write_records() {
            warn!(path = %self.records_path.display(), error = %e, "trial list flush failed, retrying on next flush");
        }
    }

    fn write_records(&self) -> std::io::Result<()> {
        let json = serde_json::to_vec_pretty(&self.records)?;
        fs::write(&self.records_path, json)
    }
}
