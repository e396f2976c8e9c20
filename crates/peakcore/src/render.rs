//! Panel renderers.
//!
//! Pure functions from (store snapshot, resolved names, language, now) to a
//! [`Document`]. The titles below double as panel identity: the reconciler
//! recognizes its own messages in a channel by them, so they must stay
//! byte-for-byte stable.

use std::collections::HashMap;
use std::time::Instant;

use chrono::NaiveDateTime;

use crate::lang::{template, Lang, MsgKey};
use crate::schedule;
use crate::store::ClaimStore;
use crate::{RoomKey, Side, UserId, CHAMBERS, ROOMS};

pub const ROOM_PANEL_TITLE: &str = "📍 Chamber status";
pub const OVERVIEW_PANEL_TITLE: &str = "⛰️ Secret Peak Status";
pub const PANEL_TITLES: [&str; 2] = [ROOM_PANEL_TITLE, OVERVIEW_PANEL_TITLE];

pub fn is_panel_title(title: &str) -> bool {
    PANEL_TITLES.contains(&title)
}

/// One titled text block of a panel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Section {
    pub name: String,
    pub value: String,
}

/// A rendered panel: ordered titled sections.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Document {
    pub title: String,
    pub description: String,
    pub sections: Vec<Section>,
}

/// Whole minutes left, clamped at zero (the sweep may lag a claim's expiry
/// by up to one period, and the panel must never show negative time).
fn minutes_left(end: Instant, now: Instant) -> u64 {
    end.saturating_duration_since(now).as_secs() / 60
}

fn display_name(names: &HashMap<UserId, String>, owner: UserId) -> String {
    names
        .get(&owner)
        .cloned()
        .unwrap_or_else(|| owner.to_string())
}

/// Per-chamber room occupancy for one floor's `ms` channel.
pub fn render_room_status(
    floor: &str,
    store: &ClaimStore,
    names: &HashMap<UserId, String>,
    lang: Lang,
    now: Instant,
) -> Document {
    let available = template(MsgKey::Available, lang);
    let mut sections = Vec::with_capacity(CHAMBERS.len());
    for chamber in CHAMBERS {
        let mut value = String::new();
        for room in ROOMS {
            let key = RoomKey::new(floor, chamber, room);
            match store.room_claim(&key, now) {
                Some(c) => value.push_str(&format!(
                    "🔴 {room}: {} ({} min)\n",
                    display_name(names, c.owner),
                    minutes_left(c.end_time, now)
                )),
                None => value.push_str(&format!("🟢 {room}: {available}\n")),
            }
        }
        sections.push(Section {
            name: format!("🧪 {chamber}"),
            value,
        });
    }
    Document {
        title: ROOM_PANEL_TITLE.to_string(),
        description: format!("Current status of the rooms in Floor {floor}."),
        sections,
    }
}

/// Floor claim, yellow boss sides, mineral and next red boss for the `sp`
/// channel of one floor.
pub fn render_floor_overview(
    floor: &str,
    store: &ClaimStore,
    names: &HashMap<UserId, String>,
    lang: Lang,
    now: Instant,
    now_local: NaiveDateTime,
) -> Document {
    let available = template(MsgKey::Available, lang);
    let mut sections = Vec::with_capacity(6);

    match store.floor_claim(floor, now) {
        Some(c) => sections.push(Section {
            name: "🔒 Floor Claim".to_string(),
            value: format!(
                "{} ({} min)",
                display_name(names, c.owner),
                minutes_left(c.end_time, now)
            ),
        }),
        None => sections.push(Section {
            name: "🔓 Floor Claim".to_string(),
            value: available.to_string(),
        }),
    }

    for side in [Side::Left, Side::Right] {
        let value = match store.yellow_end(floor, side, now) {
            Some(end) => format!("{} min", minutes_left(end, now)),
            None => available.to_string(),
        };
        sections.push(Section {
            name: match side {
                Side::Left => "🟡 Yellow Boss (Left)".to_string(),
                Side::Right => "🟡 Yellow Boss (Right)".to_string(),
            },
            value,
        });
    }

    sections.push(Section {
        name: "⛏️ Mineral".to_string(),
        value: match store.mineral_end(floor, now) {
            Some(end) => format!("{} min", minutes_left(end, now)),
            None => available.to_string(),
        },
    });

    let (respawn, position) = schedule::next_red_boss(now_local);
    sections.push(Section {
        name: "🕒 Próximo Boss Rojo".to_string(),
        value: format!("{} UTC ({position})", respawn.format("%H:%M")),
    });
    sections.push(Section {
        name: "⏳ Tiempo restante".to_string(),
        value: format!("{} minutos", (respawn - now_local).num_minutes()),
    });

    Document {
        title: OVERVIEW_PANEL_TITLE.to_string(),
        description: format!("Overview of Floor {floor}"),
        sections,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use chrono::NaiveDate;

    fn names() -> HashMap<UserId, String> {
        HashMap::from([(UserId(1), "Alice".to_string())])
    }

    fn local(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn room_line<'a>(doc: &'a Document, chamber_ix: usize, room: &str) -> &'a str {
        doc.sections[chamber_ix]
            .value
            .lines()
            .find(|l| l.contains(room))
            .unwrap()
    }

    #[test]
    fn two_ticket_claim_counts_down_and_clamps() {
        let t0 = Instant::now();
        let mut store = ClaimStore::new();
        store
            .claim_room(
                RoomKey::new("8", "Experience Chamber 1", "Left"),
                UserId(1),
                2,
                t0,
            )
            .unwrap();

        let doc = render_room_status("8", &store, &names(), Lang::En, t0);
        assert_eq!(room_line(&doc, 0, "Left"), "🔴 Left: Alice (60 min)");

        // One second before expiry: clamped floor, 0 min, never negative.
        let almost = t0 + Duration::from_secs(3599);
        let doc = render_room_status("8", &store, &names(), Lang::En, almost);
        assert_eq!(room_line(&doc, 0, "Left"), "🔴 Left: Alice (0 min)");

        // At expiry the claim reads as absent even though it was not swept.
        let expired = t0 + Duration::from_secs(3600);
        let doc = render_room_status("8", &store, &names(), Lang::En, expired);
        assert_eq!(room_line(&doc, 0, "Left"), "🟢 Left: Available");
    }

    #[test]
    fn rendering_is_idempotent() {
        let t0 = Instant::now();
        let mut store = ClaimStore::new();
        store
            .claim_room(
                RoomKey::new("7", "Antidemon Chamber", "Right"),
                UserId(1),
                5,
                t0,
            )
            .unwrap();
        store.claim_floor("7", UserId(1), t0).unwrap();
        store.start_yellow("7", Side::Left, t0);

        let now_local = local(9, 15);
        let a = render_floor_overview("7", &store, &names(), Lang::En, t0, now_local);
        let b = render_floor_overview("7", &store, &names(), Lang::En, t0, now_local);
        assert_eq!(a, b);

        let a = render_room_status("7", &store, &names(), Lang::En, t0);
        let b = render_room_status("7", &store, &names(), Lang::En, t0);
        assert_eq!(a, b);
    }

    #[test]
    fn overview_lists_every_resource() {
        let t0 = Instant::now();
        let mut store = ClaimStore::new();
        store.start_yellow("9", Side::Right, t0);
        store.start_mineral("9", t0);

        let doc = render_floor_overview("9", &store, &names(), Lang::En, t0, local(0, 30));
        let by_name = |n: &str| {
            doc.sections
                .iter()
                .find(|s| s.name.contains(n))
                .unwrap()
                .value
                .clone()
        };

        assert_eq!(by_name("Floor Claim"), "Available");
        assert_eq!(by_name("Yellow Boss (Left)"), "Available");
        assert_eq!(by_name("Yellow Boss (Right)"), "60 min");
        assert_eq!(by_name("Mineral"), "60 min");
        assert_eq!(by_name("Boss Rojo"), "01:00 UTC (Bottom)");
        assert_eq!(by_name("Tiempo restante"), "30 minutos");
    }

    #[test]
    fn unresolved_owner_falls_back_to_id() {
        let t0 = Instant::now();
        let mut store = ClaimStore::new();
        store
            .claim_room(
                RoomKey::new("8", "Experience Chamber 1", "Left"),
                UserId(42),
                1,
                t0,
            )
            .unwrap();
        let doc = render_room_status("8", &store, &HashMap::new(), Lang::En, t0);
        assert_eq!(room_line(&doc, 0, "Left"), "🔴 Left: 42 (30 min)");
    }
}
