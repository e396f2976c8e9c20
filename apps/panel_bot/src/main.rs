//! panel_bot: runs the Secret Peak claim panels over a chat-platform
//! WebSocket API.
//!
//! One task owns everything: interaction events and the 60 s sweep tick
//! interleave through a single `select!` loop, so the claim store never
//! needs a lock. The socket is split; a reader task routes seq-correlated
//! replies back to waiting requests and pushes interaction events into the
//! loop's channel.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{info, warn, Level};

use peakcore::gateway::{Controls, Gateway, GatewayError, MessageId, MessageView};
use peakcore::handler::PanelApp;
use peakcore::lang::Lang;
use peakcore::render::Document;
use peakcore::store::MAX_TICKETS;
use peakcore::{Side, UserId};

const SWEEP_PERIOD: Duration = Duration::from_secs(60);

#[derive(Clone, Debug)]
struct Config {
    ws_url: String,
    token: Option<String>,
}

fn usage_and_exit() -> ! {
    eprintln!(
        "panel_bot\n\n\
USAGE:\n  panel_bot [--ws URL] [--token TOKEN]\n\n\
ENV:\n  CHAT_WS_URL  default ws://127.0.0.1:4200/v1/panel\n  PANEL_TOKEN  bot token (required)\n"
    );
    std::process::exit(2);
}

fn parse_args() -> Config {
    let mut ws_url = std::env::var("CHAT_WS_URL")
        .unwrap_or_else(|_| "ws://127.0.0.1:4200/v1/panel".to_string());
    let mut token = std::env::var("PANEL_TOKEN").ok();

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--ws" => ws_url = it.next().unwrap_or_else(|| usage_and_exit()),
            "--token" => token = Some(it.next().unwrap_or_else(|| usage_and_exit())),
            "-h" | "--help" => usage_and_exit(),
            _ => usage_and_exit(),
        }
    }

    Config { ws_url, token }
}

// ---- wire protocol ---------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum ClientMsg<'a> {
    Auth { seq: u64, token: &'a str },
    Send { seq: u64, channel: &'a str, message: WireDoc, controls: WireControls },
    Edit { seq: u64, channel: &'a str, id: u64, message: WireDoc, controls: WireControls },
    Delete { seq: u64, channel: &'a str, id: u64 },
    History { seq: u64, channel: &'a str, limit: usize },
    WhoIs { seq: u64, user: u64 },
    Ephemeral { seq: u64, user: u64, text: &'a str },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum ServerMsg {
    Ready {},
    Ack {
        seq: u64,
        #[serde(default)]
        id: Option<u64>,
    },
    History {
        seq: u64,
        messages: Vec<WireMsgView>,
    },
    Name {
        seq: u64,
        name: String,
    },
    Err {
        seq: u64,
        #[serde(default)]
        code: Option<String>,
        text: String,
    },
    Interaction {
        user: u64,
        #[serde(default)]
        admin: bool,
        action: WireAction,
    },
}

#[derive(Debug, Serialize)]
struct WireSection {
    name: String,
    value: String,
}

#[derive(Debug, Serialize)]
struct WireDoc {
    title: String,
    description: String,
    sections: Vec<WireSection>,
}

impl From<&Document> for WireDoc {
    fn from(doc: &Document) -> Self {
        WireDoc {
            title: doc.title.clone(),
            description: doc.description.clone(),
            sections: doc
                .sections
                .iter()
                .map(|s| WireSection {
                    name: s.name.clone(),
                    value: s.value.clone(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum WireControls {
    RoomPanel { floor: String },
    OverviewPanel { floor: String },
}

impl From<&Controls> for WireControls {
    fn from(c: &Controls) -> Self {
        match c {
            Controls::RoomPanel { floor } => WireControls::RoomPanel {
                floor: floor.clone(),
            },
            Controls::OverviewPanel { floor } => WireControls::OverviewPanel {
                floor: floor.clone(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireMsgView {
    id: u64,
    from_bot: bool,
    #[serde(default)]
    title: Option<String>,
}

/// Final, resolved actions; the platform's component framework drives the
/// multi-step claim flow (chamber, room, ticket choice set) on its own.
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum WireAction {
    ClaimRoom {
        floor: String,
        chamber: String,
        room: String,
        tickets: u8,
    },
    CancelClaim {
        floor: String,
        chamber: String,
        room: String,
    },
    ClaimFloor {
        floor: String,
    },
    YellowRespawn {
        floor: String,
        side: String,
    },
    MineralRespawn {
        floor: String,
    },
    SetLanguage {
        lang: String,
    },
    SetupPanels {},
}

#[derive(Debug)]
struct InteractionEvent {
    user: u64,
    admin: bool,
    action: WireAction,
}

// ---- gateway over the socket -----------------------------------------

#[derive(Debug)]
enum Reply {
    Ack { id: Option<u64> },
    History(Vec<WireMsgView>),
    Name(String),
    Err { code: Option<String>, text: String },
}

type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<Reply>>>>;

struct WsGateway {
    out: mpsc::Sender<Message>,
    pending: Pending,
    seq: u64,
}

impl WsGateway {
    async fn request(&mut self, build: impl FnOnce(u64) -> String) -> Result<Reply, GatewayError> {
        self.seq += 1;
        let seq = self.seq;
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(seq, tx);

        let text = build(seq);
        if self.out.send(Message::Text(text)).await.is_err() {
            self.pending.lock().await.remove(&seq);
            return Err(GatewayError::Transient("socket writer closed".to_string()));
        }

        match rx.await {
            Ok(Reply::Err { code, text }) => {
                if code.as_deref() == Some("channel_not_found") {
                    Err(GatewayError::ChannelNotFound(text))
                } else {
                    Err(GatewayError::Transient(text))
                }
            }
            Ok(reply) => Ok(reply),
            Err(_) => Err(GatewayError::Transient("connection closed".to_string())),
        }
    }
}

fn encode(msg: &ClientMsg<'_>) -> String {
    // ClientMsg holds only strings and integers; serialization cannot fail.
    serde_json::to_string(msg).unwrap_or_default()
}

impl Gateway for WsGateway {
    async fn send_panel(
        &mut self,
        channel: &str,
        doc: &Document,
        controls: &Controls,
    ) -> Result<MessageId, GatewayError> {
        let reply = self
            .request(|seq| {
                encode(&ClientMsg::Send {
                    seq,
                    channel,
                    message: doc.into(),
                    controls: controls.into(),
                })
            })
            .await?;
        match reply {
            Reply::Ack { id: Some(id) } => Ok(MessageId(id)),
            _ => Err(GatewayError::Transient("send not acknowledged".to_string())),
        }
    }

    async fn edit_panel(
        &mut self,
        channel: &str,
        id: MessageId,
        doc: &Document,
        controls: &Controls,
    ) -> Result<(), GatewayError> {
        self.request(|seq| {
            encode(&ClientMsg::Edit {
                seq,
                channel,
                id: id.0,
                message: doc.into(),
                controls: controls.into(),
            })
        })
        .await?;
        Ok(())
    }

    async fn delete_message(&mut self, channel: &str, id: MessageId) -> Result<(), GatewayError> {
        self.request(|seq| encode(&ClientMsg::Delete { seq, channel, id: id.0 }))
            .await?;
        Ok(())
    }

    async fn recent_history(
        &mut self,
        channel: &str,
        limit: usize,
    ) -> Result<Vec<MessageView>, GatewayError> {
        let reply = self
            .request(|seq| encode(&ClientMsg::History { seq, channel, limit }))
            .await?;
        match reply {
            Reply::History(messages) => Ok(messages
                .into_iter()
                .map(|m| MessageView {
                    id: MessageId(m.id),
                    from_bot: m.from_bot,
                    title: m.title,
                })
                .collect()),
            _ => Err(GatewayError::Transient("bad history reply".to_string())),
        }
    }

    async fn resolve_display_name(&mut self, user: UserId) -> Result<String, GatewayError> {
        let reply = self
            .request(|seq| encode(&ClientMsg::WhoIs { seq, user: user.0 }))
            .await?;
        match reply {
            Reply::Name(name) => Ok(name),
            _ => Err(GatewayError::Transient("bad whois reply".to_string())),
        }
    }

    async fn send_ephemeral(&mut self, user: UserId, text: &str) -> Result<(), GatewayError> {
        self.request(|seq| encode(&ClientMsg::Ephemeral { seq, user: user.0, text }))
            .await?;
        Ok(())
    }
}

async fn read_socket(
    mut stream: impl futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>>
        + Unpin
        + Send,
    pending: Pending,
    events: mpsc::UnboundedSender<InteractionEvent>,
) {
    while let Some(m) = stream.next().await {
        let m = match m {
            Ok(m) => m,
            Err(e) => {
                warn!(err = %e, "socket read error");
                break;
            }
        };
        let text = match m {
            Message::Text(s) => s,
            Message::Close(_) => break,
            _ => continue,
        };
        let msg = match serde_json::from_str::<ServerMsg>(&text) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(err = %e, "unparseable server message");
                continue;
            }
        };
        match msg {
            ServerMsg::Ready {} => {}
            ServerMsg::Interaction { user, admin, action } => {
                // Unbounded on purpose: this task also routes replies, and
                // must never block behind a busy main loop.
                if events.send(InteractionEvent { user, admin, action }).is_err() {
                    break;
                }
            }
            ServerMsg::Ack { seq, id } => route(&pending, seq, Reply::Ack { id }).await,
            ServerMsg::History { seq, messages } => {
                route(&pending, seq, Reply::History(messages)).await
            }
            ServerMsg::Name { seq, name } => route(&pending, seq, Reply::Name(name)).await,
            ServerMsg::Err { seq, code, text } => {
                route(&pending, seq, Reply::Err { code, text }).await
            }
        }
    }
    // Dropping the pending map wakes every in-flight request with an error.
    pending.lock().await.clear();
}

async fn route(pending: &Pending, seq: u64, reply: Reply) {
    match pending.lock().await.remove(&seq) {
        Some(tx) => {
            let _ = tx.send(reply);
        }
        None => warn!(seq, "reply with no waiting request"),
    }
}

// ---- dispatch --------------------------------------------------------

async fn dispatch(
    app: &mut PanelApp,
    gw: &mut WsGateway,
    ev: InteractionEvent,
) -> Result<(), GatewayError> {
    let now = Instant::now();
    let user = UserId(ev.user);
    match ev.action {
        WireAction::ClaimRoom {
            floor,
            chamber,
            room,
            tickets,
        } => {
            // The controls expose a 1..=20 choice set; anything else is a
            // forged event and is dropped.
            if !(1..=MAX_TICKETS).contains(&tickets) {
                warn!(user = %user, tickets, "ticket count outside choice set");
                return Ok(());
            }
            app.claim_room(gw, user, &floor, &chamber, &room, tickets, now)
                .await
        }
        WireAction::CancelClaim { floor, chamber, room } => {
            app.cancel_room(gw, user, &floor, &chamber, &room, now).await
        }
        WireAction::ClaimFloor { floor } => app.claim_floor(gw, user, &floor, now).await,
        WireAction::YellowRespawn { floor, side } => match Side::parse(&side) {
            Some(side) => app.start_yellow(gw, user, &floor, side, now).await,
            None => {
                warn!(user = %user, side = %side, "unknown boss side");
                Ok(())
            }
        },
        WireAction::MineralRespawn { floor } => app.start_mineral(gw, user, &floor, now).await,
        WireAction::SetLanguage { lang } => match Lang::parse(&lang) {
            Some(lang) => app.set_language(gw, user, lang).await,
            None => {
                warn!(user = %user, lang = %lang, "unknown language tag");
                Ok(())
            }
        },
        WireAction::SetupPanels {} => app.setup_panels(gw, user, ev.admin, now).await,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,panel_bot=info".into()),
        )
        .with_target(false)
        .with_max_level(Level::INFO)
        .init();

    let cfg = parse_args();
    let token = cfg.token.context("PANEL_TOKEN must be set")?;

    let (ws, _) = tokio_tungstenite::connect_async(cfg.ws_url.as_str())
        .await
        .with_context(|| format!("connect {}", cfg.ws_url))?;
    info!(ws_url = %cfg.ws_url, "connected");
    let (mut sink, stream) = ws.split();

    let (out_tx, mut out_rx) = mpsc::channel::<Message>(64);
    tokio::spawn(async move {
        while let Some(m) = out_rx.recv().await {
            if let Err(e) = sink.send(m).await {
                warn!(err = %e, "socket write error");
                break;
            }
        }
    });

    let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
    let (event_tx, mut events) = mpsc::unbounded_channel::<InteractionEvent>();
    tokio::spawn(read_socket(stream, pending.clone(), event_tx));

    let mut gw = WsGateway {
        out: out_tx,
        pending,
        seq: 0,
    };
    match gw
        .request(|seq| encode(&ClientMsg::Auth { seq, token: &token }))
        .await
    {
        Ok(Reply::Ack { .. }) => info!("authenticated"),
        Ok(_) => anyhow::bail!("unexpected auth reply"),
        Err(e) => return Err(e).context("auth failed"),
    }

    let mut app = PanelApp::new();
    let mut sweep = tokio::time::interval(SWEEP_PERIOD);
    // Ticks stack or delay behind slow gateway calls, never overlap.
    sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = sweep.tick() => {
                app.sweep_tick(&mut gw, Instant::now()).await;
            }
            ev = events.recv() => {
                let Some(ev) = ev else {
                    info!("event stream closed, shutting down");
                    break;
                };
                if let Err(e) = dispatch(&mut app, &mut gw, ev).await {
                    warn!(err = %e, "interaction handling failed");
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interaction_events_deserialize() {
        let raw = r#"{"op":"interaction","user":42,"admin":true,
            "action":{"kind":"claim_room","floor":"8",
            "chamber":"Experience Chamber 1","room":"Left","tickets":3}}"#;
        let msg: ServerMsg = serde_json::from_str(raw).unwrap();
        match msg {
            ServerMsg::Interaction { user, admin, action } => {
                assert_eq!(user, 42);
                assert!(admin);
                match action {
                    WireAction::ClaimRoom { floor, tickets, .. } => {
                        assert_eq!(floor, "8");
                        assert_eq!(tickets, 3);
                    }
                    other => panic!("wrong action: {other:?}"),
                }
            }
            other => panic!("wrong op: {other:?}"),
        }
    }

    #[test]
    fn admin_flag_defaults_to_false() {
        let raw = r#"{"op":"interaction","user":7,"action":{"kind":"setup_panels"}}"#;
        let msg: ServerMsg = serde_json::from_str(raw).unwrap();
        match msg {
            ServerMsg::Interaction { admin, .. } => assert!(!admin),
            other => panic!("wrong op: {other:?}"),
        }
    }

    #[test]
    fn requests_carry_tagged_ops() {
        let s = encode(&ClientMsg::History {
            seq: 9,
            channel: "ms8",
            limit: 50,
        });
        let v: serde_json::Value = serde_json::from_str(&s).unwrap();
        assert_eq!(v["op"], "history");
        assert_eq!(v["seq"], 9);
        assert_eq!(v["channel"], "ms8");
        assert_eq!(v["limit"], 50);
    }
}
