//! Panel reconciliation: one live panel per channel, always current.
//!
//! Two passes over one bounded history fetch. Pass one keeps the first
//! bot message that carries a known panel title and best-effort deletes
//! everything else in the window. Pass two edits the kept message in place
//! if its title matches the freshly rendered document, otherwise sends a
//! new panel with its controls. Running it twice with unchanged state adds
//! no mutations beyond an identical-content edit.

use std::collections::HashMap;

use tracing::warn;

use crate::gateway::{Controls, Gateway, GatewayError, MessageId};
use crate::render::{is_panel_title, Document};

/// How far back the prune pass looks.
pub const HISTORY_SCAN_LIMIT: usize = 50;

#[derive(Debug, Default)]
pub struct Reconciler {
    /// Last panel we placed per channel. Purely an optimization: it picks
    /// the edit target without re-searching the fetched history, and is
    /// only trusted when the fetched history confirms it.
    last_panel: HashMap<String, MessageId>,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn reconcile<G: Gateway>(
        &mut self,
        gw: &mut G,
        channel: &str,
        doc: &Document,
        controls: &Controls,
    ) -> Result<(), GatewayError> {
        let history = gw.recent_history(channel, HISTORY_SCAN_LIMIT).await?;

        // Pass one: the newest bot message titled like any known panel is
        // this channel's panel; everything else in the window goes. Delete
        // failures are logged and swallowed, the next pass retries anyway.
        let keep = history
            .iter()
            .find(|m| m.from_bot && m.title.as_deref().is_some_and(is_panel_title))
            .map(|m| m.id);
        for m in &history {
            if Some(m.id) == keep {
                continue;
            }
            if let Err(e) = gw.delete_message(channel, m.id).await {
                warn!(channel = %channel, id = %m.id, err = %e, "stale message delete failed");
            }
        }

        // Pass two: find-or-create the current document's panel.
        let cached = self.last_panel.get(channel).copied();
        let target = history
            .iter()
            .filter(|m| m.from_bot && m.title.as_deref() == Some(doc.title.as_str()))
            .filter(|m| Some(m.id) == keep || Some(m.id) == cached)
            .map(|m| m.id)
            .next();

        let id = match target {
            Some(id) => {
                gw.edit_panel(channel, id, doc, controls).await?;
                id
            }
            None => gw.send_panel(channel, doc, controls).await?,
        };
        self.last_panel.insert(channel.to_string(), id);
        Ok(())
    }
}
