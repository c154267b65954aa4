//! Logical buttons and the profiles that bind them to keyboard keys.
//!
//! A profile is pure data: for every [`LogicalButton`] it holds exactly one
//! [`ButtonDescriptor`]. The descriptors mirror what a browser keyboard event
//! carries (`code`, `key`, legacy `keyCode`) because the engine only ever
//! sees synthetic keyboard input.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// Closed set of buttons on the virtual pad
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalButton {
    Up,
    Down,
    Left,
    Right,
    A,
    B,
    X,
    Y,
    L,
    R,
    Select,
    Start,
}

impl LogicalButton {
    pub const ALL: [LogicalButton; 12] = [
        LogicalButton::Up,
        LogicalButton::Down,
        LogicalButton::Left,
        LogicalButton::Right,
        LogicalButton::A,
        LogicalButton::B,
        LogicalButton::X,
        LogicalButton::Y,
        LogicalButton::L,
        LogicalButton::R,
        LogicalButton::Select,
        LogicalButton::Start,
    ];

    pub const DIRECTIONS: [LogicalButton; 4] = [
        LogicalButton::Up,
        LogicalButton::Down,
        LogicalButton::Left,
        LogicalButton::Right,
    ];

    fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LogicalButton::Up => "UP",
            LogicalButton::Down => "DOWN",
            LogicalButton::Left => "LEFT",
            LogicalButton::Right => "RIGHT",
            LogicalButton::A => "A",
            LogicalButton::B => "B",
            LogicalButton::X => "X",
            LogicalButton::Y => "Y",
            LogicalButton::L => "L",
            LogicalButton::R => "R",
            LogicalButton::Select => "SELECT",
            LogicalButton::Start => "START",
        }
    }

    /// Text printed on the on-screen button. The d-pad arms are unlabeled.
    pub fn label(self) -> Option<&'static str> {
        if self.is_direction() {
            None
        } else {
            Some(self.as_str())
        }
    }

    pub fn is_direction(self) -> bool {
        Self::DIRECTIONS.contains(&self)
    }
}

impl fmt::Display for LogicalButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Unknown button: {0}")]
    UnknownButton(String),

    #[error("Unknown profile: {0}")]
    UnknownProfile(String),
}

impl FromStr for LogicalButton {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LogicalButton::ALL
            .into_iter()
            .find(|button| button.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| RegistryError::UnknownButton(s.to_string()))
    }
}

/// Physical key a logical button is reported as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonDescriptor {
    /// Physical key code, e.g. `KeyX`
    pub code: &'static str,
    /// Key value, e.g. `x`
    pub key: &'static str,
    /// Legacy numeric code read by older cores through `keyCode`/`which`
    pub key_code: u32,
}

impl ButtonDescriptor {
    const fn new(code: &'static str, key: &'static str, key_code: u32) -> Self {
        Self {
            code,
            key,
            key_code,
        }
    }
}

/// Named binding of every logical button to a descriptor.
///
/// Indexed in [`LogicalButton::ALL`] order, so a profile can never be missing
/// a button.
#[derive(Debug, PartialEq, Eq)]
pub struct Profile {
    pub name: &'static str,
    descriptors: [ButtonDescriptor; 12],
}

impl Profile {
    pub fn resolve(&self, button: LogicalButton) -> ButtonDescriptor {
        self.descriptors[button.index()]
    }
}

// RetroArch default keyboard binds, which Emscripten SNES cores expect
pub static RETROARCH_PROFILE: Profile = Profile {
    name: "retroarch",
    descriptors: [
        ButtonDescriptor::new("ArrowUp", "ArrowUp", 38),
        ButtonDescriptor::new("ArrowDown", "ArrowDown", 40),
        ButtonDescriptor::new("ArrowLeft", "ArrowLeft", 37),
        ButtonDescriptor::new("ArrowRight", "ArrowRight", 39),
        ButtonDescriptor::new("KeyX", "x", 88),
        ButtonDescriptor::new("KeyZ", "z", 90),
        ButtonDescriptor::new("KeyS", "s", 83),
        ButtonDescriptor::new("KeyA", "a", 65),
        ButtonDescriptor::new("KeyQ", "q", 81),
        ButtonDescriptor::new("KeyW", "w", 87),
        ButtonDescriptor::new("ShiftRight", "Shift", 16),
        ButtonDescriptor::new("Enter", "Enter", 13),
    ],
};

// Left hand on WASD, face buttons on the home row of the right hand
pub static WASD_PROFILE: Profile = Profile {
    name: "wasd",
    descriptors: [
        ButtonDescriptor::new("KeyW", "w", 87),
        ButtonDescriptor::new("KeyS", "s", 83),
        ButtonDescriptor::new("KeyA", "a", 65),
        ButtonDescriptor::new("KeyD", "d", 68),
        ButtonDescriptor::new("KeyK", "k", 75),
        ButtonDescriptor::new("KeyJ", "j", 74),
        ButtonDescriptor::new("KeyI", "i", 73),
        ButtonDescriptor::new("KeyU", "u", 85),
        ButtonDescriptor::new("KeyQ", "q", 81),
        ButtonDescriptor::new("KeyE", "e", 69),
        ButtonDescriptor::new("Backspace", "Backspace", 8),
        ButtonDescriptor::new("Enter", "Enter", 13),
    ],
};

/// Lookup table of the built-in profiles.
#[derive(Debug, Clone)]
pub struct ButtonRegistry {
    profiles: Vec<&'static Profile>,
}

impl Default for ButtonRegistry {
    fn default() -> Self {
        Self {
            profiles: vec![&RETROARCH_PROFILE, &WASD_PROFILE],
        }
    }
}

impl ButtonRegistry {
    pub fn resolve(profile: &Profile, button: LogicalButton) -> ButtonDescriptor {
        profile.resolve(button)
    }

    pub fn profile(&self, name: &str) -> Result<&'static Profile, RegistryError> {
        self.profiles
            .iter()
            .copied()
            .find(|profile| profile.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| RegistryError::UnknownProfile(name.to_string()))
    }

    pub fn profile_names(&self) -> Vec<&'static str> {
        self.profiles.iter().map(|profile| profile.name).collect()
    }

    pub fn default_profile() -> &'static Profile {
        &RETROARCH_PROFILE
    }
}
