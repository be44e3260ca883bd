use crate::store::KeyValueStore;

use std::ops::Sub;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

pub const POSITION_KEY: &str = "overlayPosition";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

/// Top-left corner of the overlay, in pixels.
pub type OverlayPosition = Point;

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, other: Point) -> Point {
        Point::new(self.x.saturating_sub(other.x), self.y.saturating_sub(other.y))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DragState {
    Idle,
    Dragging {
        grab_offset: Point,
        origin: OverlayPosition,
    },
}

/// Tracks one drag gesture at a time and persists where it ended.
#[derive(Debug)]
pub struct OverlayPositionStore {
    state: DragState,
}

impl OverlayPositionStore {
    pub fn new() -> Self {
        Self {
            state: DragState::Idle,
        }
    }

    pub fn begin_drag(&mut self, pointer: Point, element_origin: OverlayPosition) {
        self.state = DragState::Dragging {
            grab_offset: pointer - element_origin,
            origin: element_origin,
        };
        trace!("Drag started at {:?}", element_origin);
    }

    /// New overlay origin for the pointer, or `None` outside a drag.
    pub fn update_drag(&mut self, pointer: Point) -> Option<OverlayPosition> {
        match &mut self.state {
            DragState::Dragging {
                grab_offset,
                origin,
            } => {
                *origin = pointer - *grab_offset;
                Some(*origin)
            }
            DragState::Idle => {
                trace!("Ignoring pointer move outside of a drag");
                None
            }
        }
    }

    /// Ends the gesture and writes the final origin to `store`.
    ///
    /// Returns the persisted position, or `None` if no drag was in progress.
    /// A failed write is logged and otherwise ignored.
    pub fn end_drag(&mut self, store: &mut dyn KeyValueStore) -> Option<OverlayPosition> {
        let DragState::Dragging { origin, .. } = self.state else {
            return None;
        };
        self.state = DragState::Idle;

        match serde_json::to_value(origin) {
            Ok(value) => {
                if let Err(err) = store.set(POSITION_KEY, value) {
                    warn!("Failed to persist overlay position: {}", err);
                }
            }
            Err(err) => warn!("Failed to encode overlay position: {}", err),
        }
        debug!("Drag ended at {:?}", origin);
        Some(origin)
    }

    /// Abandons a gesture without persisting anything.
    pub fn cancel(&mut self) {
        self.state = DragState::Idle;
    }

    pub fn load_position(store: &dyn KeyValueStore) -> Option<OverlayPosition> {
        let value = match store.get(POSITION_KEY) {
            Ok(value) => value?,
            Err(err) => {
                warn!("Failed to read overlay position: {}", err);
                return None;
            }
        };
        match serde_json::from_value(value) {
            Ok(position) => Some(position),
            Err(err) => {
                warn!("Ignoring malformed overlay position: {}", err);
                None
            }
        }
    }
}

impl Default for OverlayPositionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn drag_follows_pointer_without_drift() {
        let mut store = MemoryStore::new();
        let mut drag = OverlayPositionStore::new();

        drag.begin_drag(Point::new(110, 220), Point::new(100, 200));
        assert_eq!(drag.update_drag(Point::new(150, 260)), Some(Point::new(140, 240)));
        assert_eq!(drag.update_drag(Point::new(111, 221)), Some(Point::new(101, 201)));
        assert_eq!(drag.update_drag(Point::new(110, 220)), Some(Point::new(100, 200)));

        assert_eq!(drag.end_drag(&mut store), Some(Point::new(100, 200)));
        assert_eq!(drag.update_drag(Point::new(0, 0)), None);
    }

    #[test]
    fn click_without_movement_persists_start_origin() {
        let mut store = MemoryStore::new();
        let mut drag = OverlayPositionStore::new();

        drag.begin_drag(Point::new(5, 5), Point::new(40, 60));
        drag.end_drag(&mut store);

        assert_eq!(
            OverlayPositionStore::load_position(&store),
            Some(Point::new(40, 60))
        );
    }

    #[test]
    fn move_outside_drag_is_ignored() {
        let mut drag = OverlayPositionStore::new();
        assert_eq!(drag.update_drag(Point::new(1, 1)), None);
    }

    #[test]
    fn end_without_begin_writes_nothing() {
        let mut store = MemoryStore::new();
        let mut drag = OverlayPositionStore::new();

        assert_eq!(drag.end_drag(&mut store), None);
        assert_eq!(OverlayPositionStore::load_position(&store), None);
    }

    #[test]
    fn cancelled_drag_is_not_persisted() {
        let mut store = MemoryStore::new();
        let mut drag = OverlayPositionStore::new();

        drag.begin_drag(Point::new(0, 0), Point::new(0, 0));
        drag.update_drag(Point::new(30, 30));
        drag.cancel();

        assert_eq!(drag.end_drag(&mut store), None);
        assert_eq!(OverlayPositionStore::load_position(&store), None);
    }

    #[test]
    fn extreme_pointer_coordinates_saturate() {
        let mut store = MemoryStore::new();
        let mut drag = OverlayPositionStore::new();

        drag.begin_drag(Point::new(i32::MIN, 0), Point::new(0, 0));
        assert_eq!(
            drag.update_drag(Point::new(i32::MAX, 0)),
            Some(Point::new(i32::MAX, 0))
        );
        drag.begin_drag(Point::new(i32::MAX, i32::MAX), Point::new(-1, -1));
        assert_eq!(
            drag.update_drag(Point::new(i32::MIN, i32::MIN)),
            Some(Point::new(i32::MIN, i32::MIN))
        );
        assert_eq!(
            drag.end_drag(&mut store),
            Some(Point::new(i32::MIN, i32::MIN))
        );
    }

    #[test]
    fn malformed_stored_position_reads_as_none() {
        let mut store = MemoryStore::new();
        store
            .set(POSITION_KEY, serde_json::json!({ "x": "left" }))
            .unwrap();
        assert_eq!(OverlayPositionStore::load_position(&store), None);
    }
}
