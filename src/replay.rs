use crate::caption::CaptionSet;
use crate::parser::{ScriptEvent, ScriptLine};
use crate::serialiser::{SharedWriter, TranscriptWriter};
use crate::session::{KeyOutcome, OverlaySession, PlaybackHost};
use crate::store::KeyValueStore;
use crate::sync::{DisplaySurface, TextTrackSource};

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::debug;

pub struct ScriptHost {
    out: SharedWriter,
    video: bool,
    track: Option<CaptionSet>,
    time: f64,
}

impl ScriptHost {
    pub fn new(out: SharedWriter, video: bool, track: Option<CaptionSet>) -> Self {
        Self {
            out,
            video,
            track,
            time: 0.0,
        }
    }

    pub fn seek(&mut self, time: f64) {
        self.time = time;
    }

    fn note(&self, message: &str) -> Result<()> {
        let mut out = self.out.borrow_mut();
        writeln!(out, "-- {}", message).context("Failed to write to output.")?;
        out.flush().context("Failed to write to output.")?;
        Ok(())
    }
}

impl PlaybackHost for ScriptHost {
    fn create_surface(&mut self) -> Box<dyn DisplaySurface> {
        Box::new(TranscriptWriter::new(self.out.clone()))
    }

    fn has_video(&self) -> bool {
        self.video
    }

    fn text_track(&mut self) -> Option<Box<dyn TextTrackSource>> {
        if !self.video {
            return None;
        }
        let track = self.track.clone()?;
        Some(Box::new(track))
    }

    fn current_time(&self) -> Option<f64> {
        if self.video {
            Some(self.time)
        } else {
            None
        }
    }
}

fn read_payload(path: &Path) -> Result<Value> {
    let data = std::fs::read_to_string(path)
        .context(format!("Failed to open caption file: '{}'", path.display()))?;
    serde_json::from_str(&data).context(format!("'{}' is not valid JSON", path.display()))
}

fn resolve_path(base_dir: Option<&Path>, path: &str) -> PathBuf {
    match base_dir {
        Some(dir) if Path::new(path).is_relative() => dir.join(path),
        _ => PathBuf::from(path),
    }
}

/// Runs every script line against `session`. Relative `load` paths are taken
/// from `base_dir` when given.
pub fn run_script<S: KeyValueStore>(
    session: &mut OverlaySession<ScriptHost, S>,
    lines: &[ScriptLine],
    base_dir: Option<&Path>,
) -> Result<()> {
    for line in lines {
        debug!("Line {}: {:?}", line.line, line.event);
        match &line.event {
            ScriptEvent::Toggle => {
                let status = session.toggle();
                let state = if status.enabled { "enabled" } else { "disabled" };
                session.host_mut().note(&format!("overlay {}", state))?;
            }
            ScriptEvent::Status => {
                let state = if session.is_enabled() { "enabled" } else { "disabled" };
                let position = session.position();
                let message = format!(
                    "status: {}, {} captions, overlay at ({}, {})",
                    state,
                    session.captions().len(),
                    position.x,
                    position.y
                );
                session.host_mut().note(&message)?;
            }
            ScriptEvent::Tick(time) => {
                session.host_mut().seek(*time);
                session.on_tick(*time);
            }
            ScriptEvent::Load(path) => {
                let path = resolve_path(base_dir, path);
                let message = match read_payload(&path)
                    .and_then(|payload| Ok(session.load_captions(&payload)?))
                {
                    Ok(report) => format!("loaded {} captions", report.count),
                    Err(err) => format!("load failed: {:#}", err),
                };
                session.host_mut().note(&message)?;
            }
            ScriptEvent::Key(event) => {
                if session.handle_key(event) == KeyOutcome::Handled {
                    let state = if session.is_enabled() { "enabled" } else { "disabled" };
                    session.host_mut().note(&format!("shortcut: overlay {}", state))?;
                }
            }
            ScriptEvent::PointerDown(pointer) => session.pointer_down(*pointer),
            ScriptEvent::PointerMove(pointer) => {
                session.pointer_move(*pointer);
            }
            ScriptEvent::PointerUp => {
                if let Some(position) = session.pointer_up() {
                    session
                        .host_mut()
                        .note(&format!("position saved at ({}, {})", position.x, position.y))?;
                }
            }
            ScriptEvent::Command(message) => {
                let response = session.handle_message(message);
                let response = serde_json::to_string(&response)?;
                session.host_mut().note(&response)?;
            }
        }
    }
    Ok(())
}

/// Plays `payload` from `from` to `to` seconds, ticking every `step` seconds.
pub fn play<S: KeyValueStore>(
    session: &mut OverlaySession<ScriptHost, S>,
    payload: &Value,
    from: f64,
    to: f64,
    step: f64,
) -> Result<()> {
    if !session.is_enabled() {
        session.toggle();
    }
    let report = session
        .load_captions(payload)
        .context("Failed to load captions")?;
    session
        .host_mut()
        .note(&format!("loaded {} captions", report.count))?;

    let mut tick = 0u64;
    loop {
        let time = from + tick as f64 * step;
        if time > to {
            break;
        }
        session.host_mut().seek(time);
        session.on_tick(time);
        tick += 1;
    }
    Ok(())
}
