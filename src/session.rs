use crate::caption::CaptionSet;
use crate::error::Result;
use crate::keys::{KeyCombo, KeyEvent};
use crate::position::{OverlayPosition, OverlayPositionStore, Point};
use crate::store::KeyValueStore;
use crate::sync::{CaptionFrame, DisplaySurface, SyncController, TextTrackSource};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

pub const CAPTIONS_KEY: &str = "captionsData";

/// The page the overlay lives in.
pub trait PlaybackHost {
    /// Creates a fresh display surface; called once per mount.
    fn create_surface(&mut self) -> Box<dyn DisplaySurface>;
    fn has_video(&self) -> bool;
    /// The video's native caption track, if it has one.
    fn text_track(&mut self) -> Option<Box<dyn TextTrackSource>>;
    /// Current playback position, `None` without a video.
    fn current_time(&self) -> Option<f64>;
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub offset_seconds: f64,
    pub shortcut: KeyCombo,
    pub default_position: OverlayPosition,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            offset_seconds: 0.0,
            shortcut: KeyCombo::default(),
            default_position: OverlayPosition::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Status {
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub success: bool,
    pub count: usize,
}

/// Issued when an asynchronous load starts. Completing with a ticket that
/// has been superseded by a destroy or a newer load discards the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Applied(usize),
    Discarded,
}

/// Whether a key press was consumed; `Handled` means the host should
/// suppress its default handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    Handled,
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Command {
    #[serde(alias = "toggleOverlay")]
    Toggle,
    GetStatus,
    LoadCaptions { data: Value },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Status(Status),
    Loaded(LoadReport),
    Failed { success: bool, error: String },
}

impl Response {
    fn failed(error: String) -> Self {
        Response::Failed {
            success: false,
            error,
        }
    }
}

pub struct OverlaySession<H, S> {
    host: H,
    store: S,
    options: SessionOptions,
    enabled: bool,
    generation: u64,
    controller: SyncController,
    drag: OverlayPositionStore,
    position: OverlayPosition,
}

impl<H: PlaybackHost, S: KeyValueStore> OverlaySession<H, S> {
    pub fn new(host: H, store: S, options: SessionOptions) -> Self {
        Self {
            controller: SyncController::new(options.offset_seconds),
            position: options.default_position,
            host,
            store,
            options,
            enabled: false,
            generation: 0,
            drag: OverlayPositionStore::new(),
        }
    }

    pub fn status(&self) -> Status {
        Status {
            enabled: self.enabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn position(&self) -> OverlayPosition {
        self.position
    }

    pub fn captions(&self) -> &CaptionSet {
        self.controller.primary()
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn toggle(&mut self) -> Status {
        if self.enabled {
            self.destroy();
        } else {
            self.mount();
        }
        self.status()
    }

    fn mount(&mut self) {
        info!("Mounting overlay");
        self.enabled = true;

        let mut surface = self.host.create_surface();
        if let Some(saved) = OverlayPositionStore::load_position(&self.store) {
            debug!("Restoring saved position {:?}", saved);
            self.position = saved;
        }
        if let Err(err) = surface.move_to(self.position) {
            warn!("Failed to position overlay: {}", err);
        }

        let track = self.host.text_track();
        let has_video = self.host.has_video();
        self.controller.mount(surface, track, has_video);

        let ticket = self.begin_load();
        match self.store.get(CAPTIONS_KEY) {
            Ok(Some(payload)) => {
                if let Err(err) = self.complete_load(ticket, &payload) {
                    warn!("Ignoring stored captions: {}", err);
                }
            }
            Ok(None) => (),
            Err(err) => warn!("Failed to read stored captions: {}", err),
        }

        if let Some(now) = self.host.current_time() {
            self.controller.on_tick(now);
        }
    }

    fn destroy(&mut self) {
        info!("Destroying overlay");
        self.enabled = false;
        self.generation += 1;
        self.drag.cancel();
        self.controller.destroy();
    }

    /// Starts an asynchronous load. Any earlier outstanding ticket becomes stale.
    pub fn begin_load(&mut self) -> LoadTicket {
        self.generation += 1;
        LoadTicket {
            generation: self.generation,
        }
    }

    pub fn complete_load(&mut self, ticket: LoadTicket, payload: &Value) -> Result<LoadOutcome> {
        if !self.enabled || ticket.generation != self.generation {
            info!("Discarding stale caption load");
            return Ok(LoadOutcome::Discarded);
        }
        let captions = CaptionSet::from_payload(payload)?;
        let count = captions.len();
        self.controller.load(captions);
        Ok(LoadOutcome::Applied(count))
    }

    /// Validates and installs a caption set, and stores it for later mounts.
    ///
    /// An invalid payload leaves both the loaded set and the store untouched.
    pub fn load_captions(&mut self, payload: &Value) -> Result<LoadReport> {
        let captions = CaptionSet::from_payload(payload)?;
        let count = captions.len();

        if let Err(err) = self.store.set(CAPTIONS_KEY, captions.to_payload()) {
            warn!("Failed to persist captions: {}", err);
        }
        self.generation += 1;
        if self.enabled {
            self.controller.load(captions);
        }
        Ok(LoadReport {
            success: true,
            count,
        })
    }

    pub fn on_tick(&mut self, raw_time: f64) -> Option<CaptionFrame> {
        if !self.enabled {
            return None;
        }
        self.controller.on_tick(raw_time)
    }

    pub fn pointer_down(&mut self, pointer: Point) {
        if self.enabled {
            self.drag.begin_drag(pointer, self.position);
        }
    }

    pub fn pointer_move(&mut self, pointer: Point) -> Option<OverlayPosition> {
        if !self.enabled {
            return None;
        }
        let position = self.drag.update_drag(pointer)?;
        self.position = position;
        if let Some(surface) = self.controller.surface_mut() {
            if let Err(err) = surface.move_to(position) {
                warn!("Failed to move overlay: {}", err);
            }
        }
        Some(position)
    }

    pub fn pointer_up(&mut self) -> Option<OverlayPosition> {
        if !self.enabled {
            return None;
        }
        self.drag.end_drag(&mut self.store)
    }

    pub fn handle_key(&mut self, event: &KeyEvent) -> KeyOutcome {
        if self.options.shortcut.matches(event) {
            debug!("Shortcut {} pressed", self.options.shortcut);
            self.toggle();
            KeyOutcome::Handled
        } else {
            KeyOutcome::Ignored
        }
    }

    pub fn handle_command(&mut self, command: Command) -> Response {
        match command {
            Command::Toggle => Response::Status(self.toggle()),
            Command::GetStatus => Response::Status(self.status()),
            Command::LoadCaptions { data } => match self.load_captions(&data) {
                Ok(report) => Response::Loaded(report),
                Err(err) => Response::failed(err.to_string()),
            },
        }
    }

    /// Handles a JSON command message such as `{"action":"getStatus"}`.
    pub fn handle_message(&mut self, message: &str) -> Response {
        match serde_json::from_str::<Command>(message) {
            Ok(command) => self.handle_command(command),
            Err(err) => Response::failed(format!("Invalid command: {}", err)),
        }
    }
}
