//! Two-language message table and per-user language preferences.
//!
//! Every user-facing acknowledgment goes through [`template`]: a message key
//! plus a language tag selects one fixed template string, and [`fill`]
//! substitutes `{name}` placeholders. Preferences live for the process only.

use std::collections::HashMap;

use crate::UserId;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Lang {
    #[default]
    En,
    Es,
}

impl Lang {
    pub fn parse(s: &str) -> Option<Lang> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" => Some(Lang::En),
            "es" => Some(Lang::Es),
            _ => None,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            Lang::En => "en",
            Lang::Es => "es",
        }
    }
}

#[derive(Debug, Default)]
pub struct LangPrefs {
    map: HashMap<UserId, Lang>,
}

impl LangPrefs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, user: UserId) -> Lang {
        self.map.get(&user).copied().unwrap_or_default()
    }

    pub fn set(&mut self, user: UserId, lang: Lang) {
        self.map.insert(user, lang);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MsgKey {
    LanguageSet,
    Available,
    FloorOccupied,
    FloorClaimed,
    YellowStarted,
    MineralStarted,
    RoomOccupied,
    RoomClaimed,
    ClaimCancelled,
    CancelRefused,
    ChooseTickets,
    ChannelMissing,
    PanelsReady,
    NotAdmin,
}

fn pair(key: MsgKey) -> (&'static str, &'static str) {
    match key {
        MsgKey::LanguageSet => ("✅ Language set!", "✅ Idioma establecido!"),
        MsgKey::Available => ("Available", "Disponible"),
        MsgKey::FloorOccupied => ("⛔ Floor is occupied.", "⛔ Piso ocupado."),
        MsgKey::FloorClaimed => (
            "✅ Floor claimed for 30 min.",
            "✅ Piso reclamado por 30 min.",
        ),
        MsgKey::YellowStarted => (
            "✅ Yellow boss ({side}) timer started.",
            "✅ Timer iniciado para boss amarillo ({side}).",
        ),
        MsgKey::MineralStarted => (
            "✅ Mineral timer started.",
            "✅ Timer de mineral iniciado.",
        ),
        MsgKey::RoomOccupied => ("⛔ Room is occupied.", "⛔ Sala ocupada."),
        MsgKey::RoomClaimed => (
            "✅ Claimed {room} in {chamber} (Floor {floor}) for {tickets} tickets.",
            "✅ Sala {room} en {chamber} (Piso {floor}) reclamada por {tickets} tickets.",
        ),
        MsgKey::ClaimCancelled => ("✅ Claim cancelled.", "✅ Reclamo cancelado."),
        MsgKey::CancelRefused => (
            "⛔ You can't cancel this claim.",
            "⛔ No puedes cancelar este reclamo.",
        ),
        MsgKey::ChooseTickets => (
            "🎟️ How many tickets (1-20)?",
            "🎟️ ¿Cuántos tickets (1-20)?",
        ),
        MsgKey::ChannelMissing => (
            "❌ Text channel `{channel}` not found.",
            "❌ Canal de texto `{channel}` no encontrado.",
        ),
        MsgKey::PanelsReady => (
            "✅ Panels initialized! Run claims in each `#msX`.",
            "✅ Paneles inicializados! Reclama en cada `#msX`.",
        ),
        MsgKey::NotAdmin => ("⛔ Admins only.", "⛔ Solo administradores."),
    }
}

pub fn template(key: MsgKey, lang: Lang) -> &'static str {
    let (en, es) = pair(key);
    match lang {
        Lang::En => en,
        Lang::Es => es,
    }
}

/// Replace `{name}` placeholders. Unknown placeholders are left as-is.
pub fn fill(template: &str, args: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (name, value) in args {
        out = out.replace(&format!("{{{name}}}"), value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefs_default_to_english() {
        let mut prefs = LangPrefs::new();
        assert_eq!(prefs.get(UserId(1)), Lang::En);
        prefs.set(UserId(1), Lang::Es);
        assert_eq!(prefs.get(UserId(1)), Lang::Es);
        assert_eq!(prefs.get(UserId(2)), Lang::En);
    }

    #[test]
    fn template_selects_by_tag() {
        assert_eq!(template(MsgKey::RoomOccupied, Lang::En), "⛔ Room is occupied.");
        assert_eq!(template(MsgKey::RoomOccupied, Lang::Es), "⛔ Sala ocupada.");
    }

    #[test]
    fn fill_substitutes_named_placeholders() {
        let s = fill(template(MsgKey::RoomClaimed, Lang::En), &[
            ("room", "Left"),
            ("chamber", "Antidemon Chamber"),
            ("floor", "8"),
            ("tickets", "4"),
        ]);
        assert_eq!(
            s,
            "✅ Claimed Left in Antidemon Chamber (Floor 8) for 4 tickets."
        );
    }
}
