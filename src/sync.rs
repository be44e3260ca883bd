use crate::caption::{CaptionEntry, CaptionSet, TextField};
use crate::error::Result;
use crate::index;
use crate::position::OverlayPosition;

use std::fmt;

use tracing::{debug, info, trace, warn};

/// Where rendered captions go. Styling is up to the implementor.
pub trait DisplaySurface {
    fn render(&mut self, frame: &CaptionFrame) -> Result<()>;
    fn move_to(&mut self, position: OverlayPosition) -> Result<()>;
}

/// The host's native caption track, used when no primary set is loaded.
pub trait TextTrackSource {
    /// `None` while the track has not loaded its cues yet.
    fn cues(&self) -> Option<&[CaptionEntry]>;
}

impl TextTrackSource for CaptionSet {
    fn cues(&self) -> Option<&[CaptionEntry]> {
        Some(self.entries())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSource {
    Primary,
    Fallback,
}

impl fmt::Display for FrameSource {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FrameSource::Primary => write!(fmt, "primary"),
            FrameSource::Fallback => write!(fmt, "fallback"),
        }
    }
}

/// The contents of every text slot after one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionFrame {
    /// Raw playback time of the tick that produced this frame.
    pub time: f64,
    pub source: FrameSource,
    pub text: String,
    pub phonetic: String,
    pub translation: String,
}

impl CaptionFrame {
    pub fn blank(time: f64, source: FrameSource) -> Self {
        Self {
            time,
            source,
            text: String::new(),
            phonetic: String::new(),
            translation: String::new(),
        }
    }

    pub fn from_entry(time: f64, source: FrameSource, entry: &CaptionEntry) -> Self {
        Self {
            time,
            source,
            text: entry.field(TextField::Text).to_string(),
            phonetic: entry.field(TextField::Phonetic).to_string(),
            translation: entry.field(TextField::Translation).to_string(),
        }
    }

    pub fn slot(&self, field: TextField) -> &str {
        match field {
            TextField::Text => &self.text,
            TextField::Phonetic => &self.phonetic,
            TextField::Translation => &self.translation,
        }
    }

    pub fn is_blank(&self) -> bool {
        TextField::ALL.iter().all(|&field| self.slot(field).is_empty())
    }
}

struct Attachment {
    surface: Box<dyn DisplaySurface>,
    track: Option<Box<dyn TextTrackSource>>,
    /// False when the host had no video to subscribe to.
    subscribed: bool,
}

enum SyncState {
    Uninitialized,
    Active(Attachment),
}

pub struct SyncController {
    offset_seconds: f64,
    primary: CaptionSet,
    state: SyncState,
    active: Option<(FrameSource, usize)>,
}

impl SyncController {
    pub fn new(offset_seconds: f64) -> Self {
        Self {
            offset_seconds,
            primary: CaptionSet::default(),
            state: SyncState::Uninitialized,
            active: None,
        }
    }

    pub fn primary(&self) -> &CaptionSet {
        &self.primary
    }

    /// Attaches the controller to a freshly mounted overlay.
    ///
    /// Without a video there is nothing to subscribe to and ticks are ignored
    /// until the next mount.
    pub fn mount(
        &mut self,
        surface: Box<dyn DisplaySurface>,
        track: Option<Box<dyn TextTrackSource>>,
        has_video: bool,
    ) {
        if !has_video {
            info!("No video element found; captions will not be synchronised");
        } else if track.is_none() {
            debug!("No native text track available for fallback");
        }
        self.state = SyncState::Active(Attachment {
            surface,
            track,
            subscribed: has_video,
        });
        self.active = None;
    }

    /// Detaches from the overlay and drops the loaded set. Ticks arriving
    /// afterwards are no-ops.
    pub fn destroy(&mut self) {
        self.state = SyncState::Uninitialized;
        self.primary = CaptionSet::default();
        self.active = None;
    }

    /// Replaces the primary set wholesale.
    pub fn load(&mut self, captions: CaptionSet) {
        info!("Loaded {} captions", captions.len());
        self.primary = captions;
        self.active = None;
    }

    pub fn surface_mut(&mut self) -> Option<&mut (dyn DisplaySurface + 'static)> {
        match &mut self.state {
            SyncState::Active(attachment) => Some(attachment.surface.as_mut()),
            SyncState::Uninitialized => None,
        }
    }

    /// Resolves and renders one tick. Returns the rendered frame, if any.
    pub fn on_tick(&mut self, raw_time: f64) -> Option<CaptionFrame> {
        let attachment = match &mut self.state {
            SyncState::Active(attachment) if attachment.subscribed => attachment,
            _ => {
                trace!("Ignoring tick at {} while unsubscribed", raw_time);
                return None;
            }
        };

        let (frame, active) = if !self.primary.is_empty() {
            let t = raw_time + self.offset_seconds;
            let entries = self.primary.entries();
            match index::resolve_index(t, entries) {
                Some(i) => (
                    CaptionFrame::from_entry(raw_time, FrameSource::Primary, &entries[i]),
                    Some((FrameSource::Primary, i)),
                ),
                None => (CaptionFrame::blank(raw_time, FrameSource::Primary), None),
            }
        } else {
            let cues = attachment.track.as_ref().and_then(|track| track.cues())?;
            match index::resolve_index(raw_time, cues) {
                Some(i) => (
                    CaptionFrame::from_entry(raw_time, FrameSource::Fallback, &cues[i]),
                    Some((FrameSource::Fallback, i)),
                ),
                None => (CaptionFrame::blank(raw_time, FrameSource::Fallback), None),
            }
        };

        if active != self.active {
            match active {
                Some((source, i)) => debug!("Cue {} ({}) active at {:.3}s", i, source, raw_time),
                None => debug!("No cue active at {:.3}s", raw_time),
            }
            self.active = active;
        }

        if let Err(err) = attachment.surface.render(&frame) {
            warn!("Failed to render captions: {}", err);
        }
        Some(frame)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    use std::cell::RefCell;
    use std::rc::Rc;

    /// Shares everything it is asked to show with the test that created it.
    #[derive(Clone, Default)]
    pub(crate) struct RecordingSurface {
        pub frames: Rc<RefCell<Vec<CaptionFrame>>>,
        pub moves: Rc<RefCell<Vec<OverlayPosition>>>,
    }

    impl RecordingSurface {
        pub fn last_text(&self) -> Option<String> {
            self.frames.borrow().last().map(|f| f.text.clone())
        }
    }

    impl DisplaySurface for RecordingSurface {
        fn render(&mut self, frame: &CaptionFrame) -> Result<()> {
            self.frames.borrow_mut().push(frame.clone());
            Ok(())
        }

        fn move_to(&mut self, position: OverlayPosition) -> Result<()> {
            self.moves.borrow_mut().push(position);
            Ok(())
        }
    }

    pub(crate) struct UnloadedTrack;

    impl TextTrackSource for UnloadedTrack {
        fn cues(&self) -> Option<&[CaptionEntry]> {
            None
        }
    }

    fn primary_set() -> CaptionSet {
        CaptionSet::new(vec![
            CaptionEntry {
                start: 0.0,
                end: 2.0,
                text: Some("A".to_string()),
                phonetic: Some("a".to_string()),
                translation: Some("ay".to_string()),
            },
            CaptionEntry::new(2.0, 4.0, "B"),
        ])
    }

    fn fallback_track() -> Box<dyn TextTrackSource> {
        Box::new(CaptionSet::new(vec![CaptionEntry::new(0.0, 1.0, "native")]))
    }

    fn mounted(offset: f64, track: Option<Box<dyn TextTrackSource>>) -> (SyncController, RecordingSurface) {
        let surface = RecordingSurface::default();
        let mut controller = SyncController::new(offset);
        controller.mount(Box::new(surface.clone()), track, true);
        (controller, surface)
    }

    #[test]
    fn renders_every_slot_of_active_entry() {
        let (mut controller, surface) = mounted(0.0, None);
        controller.load(primary_set());

        let frame = controller.on_tick(1.0).unwrap();

        assert_eq!(frame.text, "A");
        assert_eq!(frame.phonetic, "a");
        assert_eq!(frame.translation, "ay");
        assert_eq!(frame.source, FrameSource::Primary);
        assert_eq!(surface.frames.borrow().len(), 1);
    }

    #[test]
    fn absent_fields_render_empty() {
        let (mut controller, _) = mounted(0.0, None);
        controller.load(primary_set());

        let frame = controller.on_tick(3.0).unwrap();

        assert_eq!(frame.text, "B");
        assert_eq!(frame.phonetic, "");
        assert_eq!(frame.translation, "");
    }

    #[test]
    fn gap_clears_previous_text() {
        let (mut controller, surface) = mounted(0.0, None);
        controller.load(primary_set());

        controller.on_tick(1.0);
        controller.on_tick(4.5);

        let frames = surface.frames.borrow();
        assert_eq!(frames[0].text, "A");
        assert!(frames[1].is_blank());
    }

    #[test]
    fn offset_shifts_primary_lookup() {
        let (mut controller, _) = mounted(18.8, None);
        controller.load(CaptionSet::new(vec![CaptionEntry::new(18.0, 20.0, "late")]));

        let frame = controller.on_tick(0.0).unwrap();

        assert_eq!(frame.text, "late");
        assert_eq!(frame.time, 0.0);
    }

    #[test]
    fn fallback_uses_unadjusted_time() {
        let (mut controller, _) = mounted(18.8, Some(fallback_track()));

        let frame = controller.on_tick(0.5).unwrap();

        assert_eq!(frame.text, "native");
        assert_eq!(frame.source, FrameSource::Fallback);
    }

    #[test]
    fn empty_primary_set_falls_back() {
        let (mut controller, _) = mounted(0.0, Some(fallback_track()));
        controller.load(CaptionSet::default());

        assert_eq!(controller.on_tick(0.5).unwrap().source, FrameSource::Fallback);
        assert!(controller.on_tick(3.0).unwrap().is_blank());
    }

    #[test]
    fn loaded_primary_takes_over_from_fallback() {
        let (mut controller, _) = mounted(0.0, Some(fallback_track()));
        controller.load(primary_set());

        assert_eq!(controller.on_tick(0.5).unwrap().text, "A");
    }

    #[test]
    fn nothing_renders_without_any_source() {
        let (mut controller, surface) = mounted(0.0, None);
        assert_eq!(controller.on_tick(1.0), None);

        let (mut unloaded, _) = mounted(0.0, Some(Box::new(UnloadedTrack)));
        assert_eq!(unloaded.on_tick(1.0), None);

        assert!(surface.frames.borrow().is_empty());
    }

    #[test]
    fn load_replaces_previous_set() {
        let (mut controller, _) = mounted(0.0, None);
        controller.load(primary_set());
        controller.load(CaptionSet::new(vec![CaptionEntry::new(10.0, 12.0, "new")]));

        assert!(controller.on_tick(1.0).unwrap().is_blank());
        assert_eq!(controller.on_tick(11.0).unwrap().text, "new");
    }

    #[test]
    fn ticks_after_destroy_are_ignored() {
        let (mut controller, surface) = mounted(0.0, None);
        controller.load(primary_set());
        controller.destroy();

        assert_eq!(controller.on_tick(1.0), None);
        assert!(surface.frames.borrow().is_empty());
        assert!(controller.primary().is_empty());
        assert!(controller.surface_mut().is_none());
    }

    #[test]
    fn no_video_means_no_ticks() {
        let surface = RecordingSurface::default();
        let mut controller = SyncController::new(0.0);
        controller.mount(Box::new(surface.clone()), None, false);
        controller.load(primary_set());

        assert_eq!(controller.on_tick(1.0), None);
        assert!(controller.surface_mut().is_some());
    }

    #[test]
    fn irregular_and_backwards_ticks_resolve_independently() {
        let (mut controller, _) = mounted(0.0, None);
        controller.load(primary_set());

        let texts: Vec<String> = [3.9, 3.9, 0.1, 100.0, 2.5]
            .iter()
            .filter_map(|&t| controller.on_tick(t))
            .map(|f| f.text)
            .collect();

        assert_eq!(texts, vec!["B", "B", "A", "", "B"]);
    }
}
