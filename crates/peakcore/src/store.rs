//! In-memory timed-claim store.
//!
//! All operations take `now` explicitly; nothing in here reads a clock. An
//! entry whose `end_time <= now` is logically absent for every reader, even
//! if the sweep has not run yet, so the accessors filter on expiry too.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::{RoomKey, Side, UserId};

/// One claim ticket buys 30 minutes of room time.
pub const TICKET_UNIT: Duration = Duration::from_secs(30 * 60);
pub const FLOOR_CLAIM_DURATION: Duration = Duration::from_secs(30 * 60);
/// Yellow boss and mineral respawn countdowns.
pub const RESPAWN_DURATION: Duration = Duration::from_secs(60 * 60);
pub const MAX_TICKETS: u8 = 20;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClaimError {
    /// An unexpired claim already holds the slot.
    Occupied,
    /// No live claim at the target location.
    NotFound,
    /// Cancel requested by someone other than the claim owner.
    NotOwner,
}

impl std::fmt::Display for ClaimError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClaimError::Occupied => write!(f, "slot is occupied"),
            ClaimError::NotFound => write!(f, "no live claim"),
            ClaimError::NotOwner => write!(f, "claim belongs to someone else"),
        }
    }
}

impl std::error::Error for ClaimError {}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Claim {
    pub owner: UserId,
    pub end_time: Instant,
    pub tickets: u8,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FloorClaim {
    pub owner: UserId,
    pub end_time: Instant,
}

#[derive(Clone, Copy, Debug, Default)]
struct SidedTimer {
    left: Option<Instant>,
    right: Option<Instant>,
}

/// What a sweep removed, for logging.
#[derive(Debug, Default)]
pub struct SweepReport {
    pub rooms: Vec<RoomKey>,
    pub floors: Vec<String>,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty() && self.floors.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct ClaimStore {
    rooms: HashMap<RoomKey, Claim>,
    floors: HashMap<String, FloorClaim>,
    yellow: HashMap<String, SidedTimer>,
    mineral: HashMap<String, Instant>,
}

impl ClaimStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a room for `tickets * 30` minutes.
    ///
    /// Callers present a 1..=20 choice set; the count is clamped to that
    /// range before the duration math.
    pub fn claim_room(
        &mut self,
        key: RoomKey,
        owner: UserId,
        tickets: u8,
        now: Instant,
    ) -> Result<Claim, ClaimError> {
        let tickets = tickets.clamp(1, MAX_TICKETS);
        if let Some(c) = self.rooms.get(&key) {
            if c.end_time > now {
                return Err(ClaimError::Occupied);
            }
        }
        let claim = Claim {
            owner,
            end_time: now + TICKET_UNIT * u32::from(tickets),
            tickets,
        };
        self.rooms.insert(key, claim.clone());
        Ok(claim)
    }

    /// Remove the requester's own live claim on a room.
    pub fn cancel_room(
        &mut self,
        key: &RoomKey,
        requester: UserId,
        now: Instant,
    ) -> Result<(), ClaimError> {
        match self.rooms.get(key) {
            None => Err(ClaimError::NotFound),
            Some(c) if c.end_time <= now => Err(ClaimError::NotFound),
            Some(c) if c.owner != requester => Err(ClaimError::NotOwner),
            Some(_) => {
                self.rooms.remove(key);
                Ok(())
            }
        }
    }

    /// Claim an entire floor for a fixed 30 minutes.
    pub fn claim_floor(
        &mut self,
        floor: &str,
        owner: UserId,
        now: Instant,
    ) -> Result<FloorClaim, ClaimError> {
        if let Some(c) = self.floors.get(floor) {
            if c.end_time > now {
                return Err(ClaimError::Occupied);
            }
        }
        let claim = FloorClaim {
            owner,
            end_time: now + FLOOR_CLAIM_DURATION,
        };
        self.floors.insert(floor.to_string(), claim.clone());
        Ok(claim)
    }

    /// Restart the yellow boss countdown for one side of a floor.
    ///
    /// Unconditional overwrite: pressing the button means "I watched the
    /// respawn happen", so an already-running timer just restarts.
    pub fn start_yellow(&mut self, floor: &str, side: Side, now: Instant) {
        let timer = self.yellow.entry(floor.to_string()).or_default();
        let end = now + RESPAWN_DURATION;
        match side {
            Side::Left => timer.left = Some(end),
            Side::Right => timer.right = Some(end),
        }
    }

    /// Restart the mineral countdown for a floor. Same overwrite semantics
    /// as [`ClaimStore::start_yellow`].
    pub fn start_mineral(&mut self, floor: &str, now: Instant) {
        self.mineral
            .insert(floor.to_string(), now + RESPAWN_DURATION);
    }

    pub fn room_claim(&self, key: &RoomKey, now: Instant) -> Option<&Claim> {
        self.rooms.get(key).filter(|c| c.end_time > now)
    }

    pub fn floor_claim(&self, floor: &str, now: Instant) -> Option<&FloorClaim> {
        self.floors.get(floor).filter(|c| c.end_time > now)
    }

    /// End of the yellow countdown for one side, if still running.
    pub fn yellow_end(&self, floor: &str, side: Side, now: Instant) -> Option<Instant> {
        let timer = self.yellow.get(floor)?;
        let end = match side {
            Side::Left => timer.left,
            Side::Right => timer.right,
        }?;
        (end > now).then_some(end)
    }

    pub fn mineral_end(&self, floor: &str, now: Instant) -> Option<Instant> {
        let end = *self.mineral.get(floor)?;
        (end > now).then_some(end)
    }

    /// Users whose display names a panel for `floor` will need.
    pub fn owners_on_floor(&self, floor: &str, now: Instant) -> Vec<UserId> {
        let mut owners: Vec<UserId> = self
            .rooms
            .iter()
            .filter(|(k, c)| k.floor == floor && c.end_time > now)
            .map(|(_, c)| c.owner)
            .collect();
        if let Some(c) = self.floor_claim(floor, now) {
            owners.push(c.owner);
        }
        owners.sort_by_key(|u| u.0);
        owners.dedup();
        owners
    }

    /// Drop every room and floor claim with `end_time <= now`.
    ///
    /// Yellow/mineral timers are left alone: the accessors already read an
    /// expired timer as "available", and starting one is an overwrite anyway.
    pub fn sweep_expired(&mut self, now: Instant) -> SweepReport {
        let mut report = SweepReport::default();
        self.rooms.retain(|k, c| {
            if c.end_time <= now {
                report.rooms.push(k.clone());
                false
            } else {
                true
            }
        });
        self.floors.retain(|f, c| {
            if c.end_time <= now {
                report.floors.push(f.clone());
                false
            } else {
                true
            }
        });
        report
    }
}
