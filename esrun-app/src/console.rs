//! Console implementations of the session's collaborator seams: a text
//! surface, a line-buffered stdin input source, and a character-device
//! trigger port.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread;

use anyhow::Result;
use esrun_core::Screen;
use esrun_session::{InputSource, KeyEvent, Surface, TriggerPort};
use esrun_timing::{Clock, MonotonicClock};

/// Text rendering of the participant-facing screens. `present` confirms the
/// onset as the moment the text hit stdout.
pub struct ConsoleSurface {
    clock: MonotonicClock,
}

impl ConsoleSurface {
    pub fn new(clock: MonotonicClock) -> Self {
        Self { clock }
    }
}

impl Surface for ConsoleSurface {
    fn draw(&mut self, screen: &Screen) {
        match screen {
            Screen::Blank => println!(),
            Screen::Instructions { text } => println!("\n{text}\n"),
            Screen::Fixation => println!("+"),
            Screen::Probe => println!("!"),
            Screen::Prompt { states } => {
                println!();
                for state in states {
                    println!("{state}");
                }
            }
            Screen::Feedback { state } => println!("You chose: {state}"),
            Screen::Rating { value } => println!("How awake do you feel right now?  {value}%"),
            Screen::Completion { volumes } => println!(
                "Experiment done. Volumes = {volumes}. Stop the sequence and confirm to save."
            ),
        }
    }

    fn present(&mut self) -> Result<f64> {
        std::io::stdout().flush()?;
        Ok(self.clock.now())
    }

    fn close(&mut self) {
        println!("\nSession closed.");
    }
}

/// Key events from stdin: every character of a typed line is one key press,
/// timestamped at read time. The whole words "esc" and "escape" map to the
/// abort key.
pub struct StdinInput {
    rx: Receiver<KeyEvent>,
}

impl StdinInput {
    pub fn spawn(clock: MonotonicClock) -> Self {
        let (tx, rx) = channel();
        thread::spawn(move || read_lines(clock, tx));
        Self { rx }
    }
}

fn read_lines(clock: MonotonicClock, tx: Sender<KeyEvent>) {
    let mut line = String::new();
    loop {
        line.clear();
        if std::io::stdin().read_line(&mut line).unwrap_or(0) == 0 {
            return;
        }
        let time = clock.now();
        let trimmed = line.trim();
        if trimmed.eq_ignore_ascii_case("esc") || trimmed.eq_ignore_ascii_case("escape") {
            if tx.send(KeyEvent { key: '\u{1b}', time }).is_err() {
                return;
            }
            continue;
        }
        for key in trimmed.chars().filter(|c| !c.is_whitespace()) {
            if tx.send(KeyEvent { key, time }).is_err() {
                return;
            }
        }
    }
}

impl InputSource for StdinInput {
    fn poll(&mut self) -> Vec<KeyEvent> {
        self.rx.try_iter().collect()
    }
}

/// Trigger port backed by a character device (e.g. a parallel-port adapter).
pub struct CharDeviceTrigger {
    device: File,
}

impl CharDeviceTrigger {
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let device = OpenOptions::new().write(true).open(path)?;
        Ok(Self { device })
    }
}

impl TriggerPort for CharDeviceTrigger {
    fn set_output(&mut self, code: u8) -> std::io::Result<()> {
        self.device.write_all(&[code])?;
        self.device.flush()
    }
}
