use crate::error::AppError;
use crate::middleware::bearer_token;
use crate::state::AppState;
use crate::websocket::{PollEvent, PollEventHub, SubscriberId, WsInboundEvent};
use actix::{Actor, ActorContext, AsyncContext, Handler, Message as ActixMessage, StreamHandler};
use actix_web::{get, web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedReceiver;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub token: Option<String>,
}

// Message type for forwarding hub payloads to the WebSocket actor
#[derive(ActixMessage)]
#[rtype(result = "()")]
struct BroadcastMessage(String);

// WebSocket Actor
struct WsSession {
    subscriber_id: SubscriberId,
    /// Taken in `started`; the hub queue is drained by a spawned forwarder
    rx: Option<UnboundedReceiver<String>>,
    hub: PollEventHub,
    principal_id: Option<String>,
    hb: Instant,
}

impl WsSession {
    fn new(
        subscriber_id: SubscriberId,
        rx: UnboundedReceiver<String>,
        hub: PollEventHub,
        principal_id: Option<String>,
    ) -> Self {
        Self {
            subscriber_id,
            rx: Some(rx),
            hub,
            principal_id,
            hb: Instant::now(),
        }
    }

    fn hb(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.hb) > CLIENT_TIMEOUT {
                tracing::warn!(subscriber = ?act.subscriber_id, "WebSocket heartbeat failed, disconnecting");
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }

    fn handle_inbound(&self, text: &str, ctx: &mut ws::WebsocketContext<Self>) {
        let evt = match serde_json::from_str::<WsInboundEvent>(text) {
            Ok(evt) => evt,
            Err(e) => {
                tracing::warn!("Failed to parse WS message: {:?}", e);
                ctx.text(PollEvent::Error("Invalid message".to_string()).to_json());
                return;
            }
        };

        match self.hub.relay(self.subscriber_id, &evt.into_outbound()) {
            Ok(delivered) => {
                tracing::debug!(
                    principal = ?self.principal_id,
                    delivered,
                    "relayed observer event"
                );
            }
            Err(AppError::Unauthorized) => {
                ctx.text(PollEvent::Error("Unauthorized".to_string()).to_json());
            }
            Err(e) => {
                tracing::error!("Failed to relay WebSocket event: {}", e);
            }
        }
    }
}

impl Actor for WsSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!(
            subscriber = ?self.subscriber_id,
            authenticated = self.principal_id.is_some(),
            "WebSocket session started"
        );

        self.hb(ctx);

        // Bridge the hub's queue into the actor mailbox
        if let Some(mut rx) = self.rx.take() {
            let addr = ctx.address();
            actix::spawn(async move {
                while let Some(payload) = rx.recv().await {
                    if !addr.connected() {
                        break;
                    }
                    addr.do_send(BroadcastMessage(payload));
                }
            });
        }
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::info!(subscriber = ?self.subscriber_id, "WebSocket session stopped");
        self.hub.unsubscribe(self.subscriber_id);
    }
}

impl Handler<BroadcastMessage> for WsSession {
    type Result = ();

    fn handle(&mut self, msg: BroadcastMessage, ctx: &mut Self::Context) {
        ctx.text(msg.0);
    }
}

// Handle WebSocket protocol messages
impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.hb = Instant::now();
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                self.hb = Instant::now();
            }
            Ok(ws::Message::Text(text)) => {
                self.hb = Instant::now();
                self.handle_inbound(&text, ctx);
            }
            Ok(ws::Message::Binary(_)) => {
                tracing::warn!("Binary WebSocket messages not supported");
            }
            Ok(ws::Message::Close(reason)) => {
                tracing::info!("WebSocket close message received: {:?}", reason);
                ctx.close(reason);
                ctx.stop();
            }
            Err(e) => {
                tracing::warn!("WebSocket protocol error: {:?}", e);
                ctx.stop();
            }
            _ => {}
        }
    }
}

/// Token from `?token=` or the bearer header. A missing token connects an
/// anonymous observer; a present but invalid one is rejected.
fn resolve_principal(
    params: &WsParams,
    req: &HttpRequest,
    state: &AppState,
) -> Result<Option<String>, AppError> {
    let token = params
        .token
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .or_else(|| bearer_token(req));

    match token {
        None => Ok(None),
        Some(t) => state.verifier.verify(t).map(|p| Some(p.id)).map_err(|e| {
            tracing::warn!("WebSocket connection rejected: invalid token");
            e
        }),
    }
}

// HTTP handler
#[get("/ws")]
pub async fn ws_handler(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
    query: web::Query<WsParams>,
) -> Result<HttpResponse, Error> {
    let principal_id = resolve_principal(&query, &req, &state)?;

    let (subscriber_id, rx) = state.hub.subscribe(principal_id.is_some());
    let session = WsSession::new(subscriber_id, rx, state.hub.clone(), principal_id);

    match ws::start(session, &req, stream) {
        Ok(resp) => Ok(resp),
        Err(e) => {
            // Handshake failed; the actor never started so nothing unsubscribes for us
            state.hub.unsubscribe(subscriber_id);
            Err(e)
        }
    }
}
