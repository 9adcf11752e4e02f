//! Behavioral event collection before the receptivity engine is ready.
//!
//! Only the latest event of each kind is kept. The buffer is encoded as
//! base64 JSON of the shape
//! `{"ui": {"position": {x, y, timestampMs}, "screen": {topLeft, width, height, timestampMs}}}`
//! and attached to bid requests until the engine takes over.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Raw UI event forwarded by the host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UiEvent {
    /// Pointer moved to client coordinates `(x, y)`.
    PointerMove { x: f64, y: f64 },
    /// Viewport geometry.
    Screen {
        top_left: Point,
        width: u32,
        height: u32,
    },
}

/// Viewport geometry at a point in time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenGeometry {
    pub top_left: Point,
    pub width: u32,
    pub height: u32,
}

impl From<ScreenGeometry> for UiEvent {
    fn from(geometry: ScreenGeometry) -> Self {
        UiEvent::Screen {
            top_left: geometry.top_left,
            width: geometry.width,
            height: geometry.height,
        }
    }
}

/// Source of the current viewport geometry, read once at init.
pub trait Viewport {
    fn geometry(&self) -> ScreenGeometry;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PositionEntry {
    x: f64,
    y: f64,
    timestamp_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScreenEntry {
    top_left: Point,
    width: u32,
    height: u32,
    timestamp_ms: i64,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
struct UiBuffer {
    #[serde(skip_serializing_if = "Option::is_none")]
    position: Option<PositionEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    screen: Option<ScreenEntry>,
}

impl UiBuffer {
    fn is_empty(&self) -> bool {
        self.position.is_none() && self.screen.is_none()
    }
}

#[derive(Serialize)]
struct EventPayload<'a> {
    ui: &'a UiBuffer,
}

pub struct EventCollector {
    clock: Rc<dyn Clock>,
    buffer: RefCell<UiBuffer>,
    listening: Cell<bool>,
}

impl EventCollector {
    pub fn new(clock: Rc<dyn Clock>) -> Self {
        Self {
            clock,
            buffer: RefCell::new(UiBuffer::default()),
            listening: Cell::new(true),
        }
    }

    pub fn is_listening(&self) -> bool {
        self.listening.get()
    }

    /// Record `event`, replacing the previous event of the same kind.
    ///
    /// Returns `false` once collection has stopped.
    pub fn record(&self, event: UiEvent) -> bool {
        if !self.listening.get() {
            return false;
        }

        let timestamp_ms = self.clock.now_ms();
        let mut buffer = self.buffer.borrow_mut();
        match event {
            UiEvent::PointerMove { x, y } => {
                buffer.position = Some(PositionEntry { x, y, timestamp_ms });
            }
            UiEvent::Screen {
                top_left,
                width,
                height,
            } => {
                buffer.screen = Some(ScreenEntry {
                    top_left,
                    width,
                    height,
                    timestamp_ms,
                });
            }
        }
        true
    }

    /// Stop collecting and drop everything buffered so far.
    pub fn stop(&self) {
        if self.listening.replace(false) {
            log::debug!("Behavioral event collection stopped");
        }
        *self.buffer.borrow_mut() = UiBuffer::default();
    }

    /// Encode the buffered events, or `None` when there is nothing to send.
    pub fn encode(&self) -> Option<String> {
        if !self.listening.get() {
            return None;
        }

        let buffer = self.buffer.borrow();
        if buffer.is_empty() {
            return None;
        }

        match serde_json::to_vec(&EventPayload { ui: &buffer }) {
            Ok(json) => Some(STANDARD.encode(json)),
            Err(e) => {
                log::warn!("Failed to encode behavioral events: {}", e);
                None
            }
        }
    }
}
