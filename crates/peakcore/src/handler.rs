//! Interaction handlers and the periodic sweep.
//!
//! Each handler performs exactly one store mutation, then acknowledges the
//! requester ephemerally in their language, then refreshes the affected
//! panel. Domain errors stop at this boundary as localized ephemeral
//! messages; only gateway errors bubble up to the caller's log line.

use std::collections::HashMap;
use std::time::Instant;

use tracing::{info, warn};

use crate::gateway::{Controls, Gateway, GatewayError};
use crate::lang::{fill, template, Lang, LangPrefs, MsgKey};
use crate::reconcile::Reconciler;
use crate::render;
use crate::schedule;
use crate::store::ClaimStore;
use crate::{RoomKey, Side, UserId, FLOORS};

pub fn room_channel(floor: &str) -> String {
    format!("ms{floor}")
}

pub fn overview_channel(floor: &str) -> String {
    format!("sp{floor}")
}

/// All panel state for one process: store, language prefs, reconciler.
/// Owned by the single event-loop task; no locks anywhere.
#[derive(Debug, Default)]
pub struct PanelApp {
    pub store: ClaimStore,
    pub prefs: LangPrefs,
    pub reconciler: Reconciler,
}

async fn resolve_names<G: Gateway>(gw: &mut G, owners: Vec<UserId>) -> HashMap<UserId, String> {
    let mut names = HashMap::new();
    for owner in owners {
        match gw.resolve_display_name(owner).await {
            Ok(name) => {
                names.insert(owner, name);
            }
            // The renderer falls back to the raw id.
            Err(e) => warn!(user = %owner, err = %e, "display name lookup failed"),
        }
    }
    names
}

impl PanelApp {
    pub fn new() -> Self {
        Self::default()
    }

    async fn say<G: Gateway>(
        &self,
        gw: &mut G,
        user: UserId,
        key: MsgKey,
        args: &[(&str, &str)],
    ) -> Result<(), GatewayError> {
        let text = fill(template(key, self.prefs.get(user)), args);
        gw.send_ephemeral(user, &text).await
    }

    pub async fn claim_room<G: Gateway>(
        &mut self,
        gw: &mut G,
        user: UserId,
        floor: &str,
        chamber: &str,
        room: &str,
        tickets: u8,
        now: Instant,
    ) -> Result<(), GatewayError> {
        let key = RoomKey::new(floor, chamber, room);
        match self.store.claim_room(key, user, tickets, now) {
            Err(_) => self.say(gw, user, MsgKey::RoomOccupied, &[]).await,
            Ok(claim) => {
                info!(user = %user, floor = %floor, chamber = %chamber, room = %room,
                    tickets = claim.tickets, "room claimed");
                self.say(
                    gw,
                    user,
                    MsgKey::RoomClaimed,
                    &[
                        ("room", room),
                        ("chamber", chamber),
                        ("floor", floor),
                        ("tickets", &claim.tickets.to_string()),
                    ],
                )
                .await?;
                self.refresh_room_panel(gw, floor, now).await
            }
        }
    }

    pub async fn cancel_room<G: Gateway>(
        &mut self,
        gw: &mut G,
        user: UserId,
        floor: &str,
        chamber: &str,
        room: &str,
        now: Instant,
    ) -> Result<(), GatewayError> {
        let key = RoomKey::new(floor, chamber, room);
        match self.store.cancel_room(&key, user, now) {
            Err(_) => self.say(gw, user, MsgKey::CancelRefused, &[]).await,
            Ok(()) => {
                info!(user = %user, key = %key, "claim cancelled");
                self.say(gw, user, MsgKey::ClaimCancelled, &[]).await?;
                self.refresh_room_panel(gw, floor, now).await
            }
        }
    }

    pub async fn claim_floor<G: Gateway>(
        &mut self,
        gw: &mut G,
        user: UserId,
        floor: &str,
        now: Instant,
    ) -> Result<(), GatewayError> {
        match self.store.claim_floor(floor, user, now) {
            Err(_) => self.say(gw, user, MsgKey::FloorOccupied, &[]).await,
            Ok(_) => {
                info!(user = %user, floor = %floor, "floor claimed");
                self.say(gw, user, MsgKey::FloorClaimed, &[]).await?;
                self.refresh_overview_panel(gw, floor, now).await
            }
        }
    }

    pub async fn start_yellow<G: Gateway>(
        &mut self,
        gw: &mut G,
        user: UserId,
        floor: &str,
        side: Side,
        now: Instant,
    ) -> Result<(), GatewayError> {
        self.store.start_yellow(floor, side, now);
        info!(user = %user, floor = %floor, side = side.label(), "yellow boss timer started");
        self.say(gw, user, MsgKey::YellowStarted, &[("side", side.label())])
            .await?;
        self.refresh_overview_panel(gw, floor, now).await
    }

    pub async fn start_mineral<G: Gateway>(
        &mut self,
        gw: &mut G,
        user: UserId,
        floor: &str,
        now: Instant,
    ) -> Result<(), GatewayError> {
        self.store.start_mineral(floor, now);
        info!(user = %user, floor = %floor, "mineral timer started");
        self.say(gw, user, MsgKey::MineralStarted, &[]).await?;
        self.refresh_overview_panel(gw, floor, now).await
    }

    pub async fn set_language<G: Gateway>(
        &mut self,
        gw: &mut G,
        user: UserId,
        lang: Lang,
    ) -> Result<(), GatewayError> {
        self.prefs.set(user, lang);
        self.say(gw, user, MsgKey::LanguageSet, &[]).await
    }

    /// Admin command: place both panels for every floor. Missing channels
    /// are reported per channel and skipped; a summary closes the run.
    pub async fn setup_panels<G: Gateway>(
        &mut self,
        gw: &mut G,
        user: UserId,
        is_admin: bool,
        now: Instant,
    ) -> Result<(), GatewayError> {
        if !is_admin {
            return self.say(gw, user, MsgKey::NotAdmin, &[]).await;
        }
        for floor in FLOORS {
            let passes = [
                (room_channel(floor), self.refresh_room_panel(gw, floor, now).await),
                (
                    overview_channel(floor),
                    self.refresh_overview_panel(gw, floor, now).await,
                ),
            ];
            for (channel, res) in passes {
                match res {
                    Ok(()) => {}
                    Err(GatewayError::ChannelNotFound(_)) => {
                        self.say(gw, user, MsgKey::ChannelMissing, &[("channel", &channel)])
                            .await?;
                    }
                    Err(e) => warn!(channel = %channel, err = %e, "panel setup failed"),
                }
            }
        }
        self.say(gw, user, MsgKey::PanelsReady, &[]).await
    }

    /// One sweep tick: drop expired claims, then refresh every floor's
    /// panels. A failing floor never blocks its siblings.
    pub async fn sweep_tick<G: Gateway>(&mut self, gw: &mut G, now: Instant) {
        let removed = self.store.sweep_expired(now);
        if !removed.is_empty() {
            info!(
                rooms = removed.rooms.len(),
                floors = removed.floors.len(),
                "expired claims swept"
            );
        }
        for floor in FLOORS {
            if let Err(e) = self.refresh_room_panel(gw, floor, now).await {
                warn!(floor = %floor, err = %e, "room panel refresh failed");
            }
            if let Err(e) = self.refresh_overview_panel(gw, floor, now).await {
                warn!(floor = %floor, err = %e, "overview panel refresh failed");
            }
        }
    }

    async fn refresh_room_panel<G: Gateway>(
        &mut self,
        gw: &mut G,
        floor: &str,
        now: Instant,
    ) -> Result<(), GatewayError> {
        let names = resolve_names(gw, self.store.owners_on_floor(floor, now)).await;
        let doc = render::render_room_status(floor, &self.store, &names, Lang::En, now);
        self.reconciler
            .reconcile(
                gw,
                &room_channel(floor),
                &doc,
                &Controls::RoomPanel {
                    floor: floor.to_string(),
                },
            )
            .await
    }

    async fn refresh_overview_panel<G: Gateway>(
        &mut self,
        gw: &mut G,
        floor: &str,
        now: Instant,
    ) -> Result<(), GatewayError> {
        let names = resolve_names(gw, self.store.owners_on_floor(floor, now)).await;
        let doc = render::render_floor_overview(
            floor,
            &self.store,
            &names,
            Lang::En,
            now,
            schedule::local_now(),
        );
        self.reconciler
            .reconcile(
                gw,
                &overview_channel(floor),
                &doc,
                &Controls::OverviewPanel {
                    floor: floor.to_string(),
                },
            )
            .await
    }
}
