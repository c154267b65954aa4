//! Virtual d-pad sampling.
//!
//! Converts a pointer position over the pad surface into four independent
//! direction flags. The two axes are compared against the dead zone
//! separately, so diagonals come out as two active directions rather than
//! an 8-way section.

use crate::controller::button_registry::LogicalButton;
use tracing::{debug, trace};

pub const DEFAULT_DEAD_ZONE: f32 = 0.15;

// Degrees of visual tilt per active axis
const TILT_DEGREES: f32 = 10.0;

pub type PointerId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerKind {
    Touch,
    Mouse,
}

// One contact as reported by the platform, in client coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerContact {
    pub id: PointerId,
    pub kind: PointerKind,
    pub x: f32,
    pub y: f32,
    /// Held mouse buttons bitmask; ignored for touch
    pub buttons: u16,
}

impl PointerContact {
    pub fn touch(id: PointerId, x: f32, y: f32) -> Self {
        Self {
            id,
            kind: PointerKind::Touch,
            x,
            y,
            buttons: 0,
        }
    }

    pub fn mouse(x: f32, y: f32, buttons: u16) -> Self {
        Self {
            id: 0,
            kind: PointerKind::Mouse,
            x,
            y,
            buttons,
        }
    }

    fn is_hovering_mouse(&self) -> bool {
        self.kind == PointerKind::Mouse && self.buttons == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Down(PointerContact),
    Move(PointerContact),
    Up { id: PointerId },
    Cancel { id: PointerId },
    /// Mouse left the surface; handled like a release
    Leave,
}

/// Bounding box of the pad surface in client coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PadGeometry {
    pub center_x: f32,
    pub center_y: f32,
    pub half_width: f32,
    pub half_height: f32,
}

impl PadGeometry {
    pub fn from_rect(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            center_x: left + width / 2.0,
            center_y: top + height / 2.0,
            half_width: width / 2.0,
            half_height: height / 2.0,
        }
    }

    /// Offset from the center scaled to [-1, 1] per axis. Positive y is down.
    pub fn normalize(&self, x: f32, y: f32) -> PointerSample {
        PointerSample {
            x: scale_axis(x - self.center_x, self.half_width),
            y: scale_axis(y - self.center_y, self.half_height),
        }
    }
}

fn scale_axis(offset: f32, half_extent: f32) -> f32 {
    if half_extent <= 0.0 || !offset.is_finite() {
        return 0.0;
    }
    (offset / half_extent).clamp(-1.0, 1.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PointerSample {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DirectionState {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

impl DirectionState {
    pub const RELEASED: DirectionState = DirectionState {
        up: false,
        down: false,
        left: false,
        right: false,
    };

    pub fn from_sample(sample: PointerSample, dead_zone: f32) -> Self {
        Self {
            up: sample.y < -dead_zone,
            down: sample.y > dead_zone,
            left: sample.x < -dead_zone,
            right: sample.x > dead_zone,
        }
    }

    pub fn buttons(&self) -> [(LogicalButton, bool); 4] {
        [
            (LogicalButton::Up, self.up),
            (LogicalButton::Down, self.down),
            (LogicalButton::Left, self.left),
            (LogicalButton::Right, self.right),
        ]
    }

    pub fn is_released(&self) -> bool {
        *self == Self::RELEASED
    }

    /// Perspective tilt `(rotate_x, rotate_y)` in degrees for the pad graphic.
    pub fn tilt(&self) -> (f32, f32) {
        let rotate_x = if self.down {
            TILT_DEGREES
        } else if self.up {
            -TILT_DEGREES
        } else {
            0.0
        };
        let rotate_y = if self.right {
            TILT_DEGREES
        } else if self.left {
            -TILT_DEGREES
        } else {
            0.0
        };
        (rotate_x, rotate_y)
    }
}

/// Tracks the single contact driving the pad and samples its position.
#[derive(Debug, Clone)]
pub struct DpadSampler {
    dead_zone: f32,
    geometry: PadGeometry,
    tracked: Option<PointerId>,
    state: DirectionState,
}

impl DpadSampler {
    pub fn new(geometry: PadGeometry, dead_zone: f32) -> Self {
        Self {
            dead_zone,
            geometry,
            tracked: None,
            state: DirectionState::RELEASED,
        }
    }

    pub fn set_geometry(&mut self, geometry: PadGeometry) {
        debug!("Pad geometry updated: {:?}", geometry);
        self.geometry = geometry;
    }

    pub fn dead_zone(&self) -> f32 {
        self.dead_zone
    }

    pub fn state(&self) -> DirectionState {
        self.state
    }

    pub fn sample(&self, x: f32, y: f32) -> DirectionState {
        let sample = self.geometry.normalize(x, y);
        DirectionState::from_sample(sample, self.dead_zone)
    }

    /// Feeds one pointer event. Returns the new direction state when the
    /// event concerns the tracked contact, `None` when it must be ignored.
    pub fn handle(&mut self, event: PointerEvent) -> Option<DirectionState> {
        match event {
            PointerEvent::Down(contact) => {
                if contact.kind == PointerKind::Mouse && contact.buttons == 0 {
                    // synthetic mousedown without a button is noise
                    return None;
                }
                match self.tracked {
                    Some(id) if id != contact.id => {
                        trace!("Ignoring secondary contact {} on pad", contact.id);
                        None
                    }
                    _ => {
                        self.tracked = Some(contact.id);
                        Some(self.update(contact))
                    }
                }
            }
            PointerEvent::Move(contact) => {
                if contact.is_hovering_mouse() {
                    return None;
                }
                match self.tracked {
                    Some(id) if id != contact.id => None,
                    // an untracked move takes over: a finger left down after
                    // another one lifted, or a mouse dragged in with a button held
                    _ => {
                        self.tracked = Some(contact.id);
                        Some(self.update(contact))
                    }
                }
            }
            PointerEvent::Up { .. } | PointerEvent::Cancel { .. } | PointerEvent::Leave => {
                Some(self.release())
            }
        }
    }

    /// Drops the tracked contact and forces every direction off.
    pub fn release(&mut self) -> DirectionState {
        self.tracked = None;
        self.state = DirectionState::RELEASED;
        self.state
    }

    fn update(&mut self, contact: PointerContact) -> DirectionState {
        self.state = self.sample(contact.x, contact.y);
        self.state
    }
}
