//! Red boss respawn schedule.
//!
//! The schedule is fixed server time (UTC-4), eight events a day alternating
//! between the bottom and top spawn points.

use chrono::{Duration, NaiveDateTime, NaiveTime, Utc};

pub const RED_BOSS_SCHEDULE: [(u32, &str); 8] = [
    (1, "Bottom"),
    (4, "Top"),
    (7, "Bottom"),
    (10, "Top"),
    (13, "Bottom"),
    (16, "Top"),
    (19, "Bottom"),
    (22, "Top"),
];

/// Offset of the game's reference zone from UTC, in hours west.
pub const LOCAL_OFFSET_HOURS: i64 = 4;

pub fn local_now() -> NaiveDateTime {
    Utc::now().naive_utc() - Duration::hours(LOCAL_OFFSET_HOURS)
}

/// First scheduled event strictly after `now_local`; wraps to the next day.
///
/// Strictly after: an event at exactly the current instant has already
/// happened, so 01:00:00 sharp resolves to the 04:00 spawn.
pub fn next_red_boss(now_local: NaiveDateTime) -> (NaiveDateTime, &'static str) {
    let day_start = now_local.date().and_time(NaiveTime::MIN);
    for (hour, pos) in RED_BOSS_SCHEDULE {
        let at = day_start + Duration::hours(i64::from(hour));
        if at > now_local {
            return (at, pos);
        }
    }
    let (hour, pos) = RED_BOSS_SCHEDULE[0];
    (
        day_start + Duration::days(1) + Duration::hours(i64::from(hour)),
        pos,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn early_morning_hits_first_event() {
        let (when, pos) = next_red_boss(at(0, 30, 0));
        assert_eq!(when, at(1, 0, 0));
        assert_eq!(pos, "Bottom");
    }

    #[test]
    fn exact_event_time_is_already_past() {
        let (when, pos) = next_red_boss(at(1, 0, 0));
        assert_eq!(when, at(4, 0, 0));
        assert_eq!(pos, "Top");

        // One second earlier still resolves to 01:00.
        let (when, pos) = next_red_boss(at(0, 59, 59));
        assert_eq!(when, at(1, 0, 0));
        assert_eq!(pos, "Bottom");
    }

    #[test]
    fn after_last_event_wraps_to_tomorrow() {
        let (when, pos) = next_red_boss(at(23, 10, 0));
        assert_eq!(when, at(1, 0, 0) + Duration::days(1));
        assert_eq!(pos, "Bottom");
    }
}
