//! `peakcore`: claim/timer bookkeeping for the Secret Peak chat panels.
//!
//! Everything in here is single-loop state: one task owns the [`store::ClaimStore`],
//! the [`lang::LangPrefs`] map and the [`reconcile::Reconciler`], and drives them
//! from interaction events plus a 60 s sweep tick. The chat platform itself sits
//! behind the [`gateway::Gateway`] trait; this crate never talks to the network
//! directly, which is also what keeps the reconciler testable.

use std::fmt;

pub mod gateway;
pub mod handler;
pub mod lang;
pub mod reconcile;
pub mod render;
pub mod schedule;
pub mod store;

pub const FLOORS: [&str; 4] = ["7", "8", "9", "10"];
pub const CHAMBERS: [&str; 4] = [
    "Experience Chamber 1",
    "Experience Chamber 2",
    "Experience Chamber 3",
    "Antidemon Chamber",
];
pub const ROOMS: [&str; 3] = ["Left", "Center", "Right"];

/// Platform-assigned user id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Side of a floor, for the yellow boss timers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn parse(s: &str) -> Option<Side> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" | "l" => Some(Side::Left),
            "right" | "r" => Some(Side::Right),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
        }
    }
}

/// Identifies one claimable room: (floor, chamber, room).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RoomKey {
    pub floor: String,
    pub chamber: String,
    pub room: String,
}

impl RoomKey {
    pub fn new(floor: &str, chamber: &str, room: &str) -> Self {
        Self {
            floor: floor.to_string(),
            chamber: chamber.to_string(),
            room: room.to_string(),
        }
    }
}

impl fmt::Display for RoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} (floor {})", self.chamber, self.room, self.floor)
    }
}
