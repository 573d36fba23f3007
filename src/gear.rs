//! Sequential gearbox with edge-triggered shifting.
//!
//! The gearbox is a fixed ordered sequence `R, N, 1, 2, 3, 4, 5`. The
//! current gear is an index into that sequence. Shift requests move the
//! index by one and are clamped at both ends (never wrapped).
//!
//! Shift buttons are edge-triggered: a shift is applied only on the tick
//! where the button goes from released to held. Holding a paddle for
//! many ticks shifts exactly once.
//!
//! # Example
//!
//! ```rust
//! use rc_link::gear::{Gear, GearStateMachine};
//!
//! let mut gearbox = GearStateMachine::new();
//! assert_eq!(gearbox.gear(), Gear::Neutral);
//!
//! // Press and hold "up" for three ticks: one shift.
//! gearbox.update(true, false);
//! gearbox.update(true, false);
//! gearbox.update(true, false);
//! assert_eq!(gearbox.gear(), Gear::First);
//!
//! // Release, press again: second shift.
//! gearbox.update(false, false);
//! gearbox.update(true, false);
//! assert_eq!(gearbox.gear(), Gear::Second);
//! ```

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One position of the virtual transmission.
///
/// Serialized on the wire as `"R"`, `"N"`, `"1"` .. `"5"`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Gear {
    /// Reverse.
    #[serde(rename = "R")]
    Reverse,
    /// Neutral. The motor is always held at its neutral pulse.
    #[default]
    #[serde(rename = "N")]
    Neutral,
    /// First forward gear.
    #[serde(rename = "1")]
    First,
    /// Second forward gear.
    #[serde(rename = "2")]
    Second,
    /// Third forward gear.
    #[serde(rename = "3")]
    Third,
    /// Fourth forward gear.
    #[serde(rename = "4")]
    Fourth,
    /// Fifth forward gear.
    #[serde(rename = "5")]
    Fifth,
}

/// Shift order, lowest index first.
pub const GEAR_SEQUENCE: [Gear; 7] = [
    Gear::Reverse,
    Gear::Neutral,
    Gear::First,
    Gear::Second,
    Gear::Third,
    Gear::Fourth,
    Gear::Fifth,
];

/// Index of [`Gear::Neutral`] in [`GEAR_SEQUENCE`].
pub const NEUTRAL_INDEX: usize = 1;

/// Number of forward gears.
pub const FORWARD_GEARS: usize = 5;

impl Gear {
    /// Position of this gear in [`GEAR_SEQUENCE`].
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Gear::Reverse => 0,
            Gear::Neutral => 1,
            Gear::First => 2,
            Gear::Second => 3,
            Gear::Third => 4,
            Gear::Fourth => 5,
            Gear::Fifth => 6,
        }
    }

    /// Gear at `index`, or `None` if the index is outside the sequence.
    pub fn from_index(index: usize) -> Option<Self> {
        GEAR_SEQUENCE.get(index).copied()
    }

    /// Wire label (`"R"`, `"N"`, `"1"` .. `"5"`).
    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Gear::Reverse => "R",
            Gear::Neutral => "N",
            Gear::First => "1",
            Gear::Second => "2",
            Gear::Third => "3",
            Gear::Fourth => "4",
            Gear::Fifth => "5",
        }
    }

    /// Ordinal of a forward gear (1..=5), `None` for reverse and neutral.
    ///
    /// ```
    /// use rc_link::gear::Gear;
    ///
    /// assert_eq!(Gear::First.forward_ordinal(), Some(1));
    /// assert_eq!(Gear::Fifth.forward_ordinal(), Some(5));
    /// assert_eq!(Gear::Neutral.forward_ordinal(), None);
    /// assert_eq!(Gear::Reverse.forward_ordinal(), None);
    /// ```
    #[inline]
    pub const fn forward_ordinal(self) -> Option<usize> {
        match self {
            Gear::Reverse | Gear::Neutral => None,
            other => Some(other.index() - NEUTRAL_INDEX),
        }
    }

    /// True for `1` through `5`.
    #[inline]
    pub const fn is_forward(self) -> bool {
        self.forward_ordinal().is_some()
    }
}

impl fmt::Display for Gear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a gear label does not name a gear.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown gear label: {0:?}")]
pub struct UnknownGear(pub String);

impl FromStr for Gear {
    type Err = UnknownGear;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "R" => Ok(Gear::Reverse),
            "N" => Ok(Gear::Neutral),
            "1" => Ok(Gear::First),
            "2" => Ok(Gear::Second),
            "3" => Ok(Gear::Third),
            "4" => Ok(Gear::Fourth),
            "5" => Ok(Gear::Fifth),
            other => Err(UnknownGear(other.to_owned())),
        }
    }
}

/// A single-step shift request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shift {
    /// Towards fifth.
    Up,
    /// Towards reverse.
    Down,
}

/// Tracks one shift button across ticks to detect rising edges.
///
/// Only the previous tick's level is kept.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ShiftEdge {
    held_last_tick: bool,
}

impl ShiftEdge {
    /// Feed this tick's button level; returns true on a released→held transition.
    #[inline]
    pub fn rising(&mut self, held_now: bool) -> bool {
        let rising = held_now && !self.held_last_tick;
        self.held_last_tick = held_now;
        rising
    }
}

/// Gear state owned by the sampling loop.
///
/// Pure and synchronous: one [`update`](Self::update) per tick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GearStateMachine {
    index: usize,
    up: ShiftEdge,
    down: ShiftEdge,
}

impl Default for GearStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl GearStateMachine {
    /// Start in neutral with both buttons released.
    pub fn new() -> Self {
        Self {
            index: NEUTRAL_INDEX,
            up: ShiftEdge::default(),
            down: ShiftEdge::default(),
        }
    }

    /// Current gear.
    #[inline]
    pub fn gear(&self) -> Gear {
        GEAR_SEQUENCE[self.index]
    }

    /// Current index into [`GEAR_SEQUENCE`]; always `< GEAR_SEQUENCE.len()`.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Apply one shift directly, bypassing edge detection.
    ///
    /// Returns the new gear if the index moved, `None` when the request
    /// was clamped at the end of the sequence.
    pub fn shift(&mut self, shift: Shift) -> Option<Gear> {
        let next = match shift {
            Shift::Up if self.index < GEAR_SEQUENCE.len() - 1 => self.index + 1,
            Shift::Down if self.index > 0 => self.index - 1,
            _ => return None,
        };
        self.index = next;
        Some(self.gear())
    }

    /// Feed this tick's button levels.
    ///
    /// Up is evaluated before down, so pressing both on the same tick from
    /// neutral ends back in neutral.
    pub fn update(&mut self, up_held: bool, down_held: bool) -> Gear {
        if self.up.rising(up_held) {
            if let Some(gear) = self.shift(Shift::Up) {
                tracing::debug!(%gear, "shifted up");
            }
        }
        if self.down.rising(down_held) {
            if let Some(gear) = self.shift(Shift::Down) {
                tracing::debug!(%gear, "shifted down");
            }
        }
        self.gear()
    }
}
