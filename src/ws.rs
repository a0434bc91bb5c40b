use actix::prelude::*;
use actix_web::{web, Error, HttpMessage, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use log::info;
use serde::Deserialize;
use std::time::{Duration, Instant};

use crate::app_state::AppState;
use crate::auth::CallerIdentity;
use crate::notify_server::{NotifyServer, OutboundNotification, Subscribe, Unsubscribe};
use crate::router;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Deserialize)]
pub struct WsQuery {
    pub channel: String,
}

/// One websocket subscription to a single notification channel.
pub struct NotificationSession {
    pub channel: String,
    pub hb: Instant,
    pub server: Addr<NotifyServer>,
}

impl NotificationSession {
    pub fn new(channel: String, server: Addr<NotifyServer>) -> Self {
        NotificationSession { channel, hb: Instant::now(), server }
    }

    fn hb(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.hb) > CLIENT_TIMEOUT {
                info!("WebSocket client heartbeat failed, disconnecting.");
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }
}

impl Actor for NotificationSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.hb(ctx);
        self.server.do_send(Subscribe {
            channel: self.channel.clone(),
            addr: ctx.address().recipient(),
        });
    }

    fn stopped(&mut self, ctx: &mut Self::Context) {
        self.server.do_send(Unsubscribe {
            channel: self.channel.clone(),
            addr: ctx.address().recipient(),
        });
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for NotificationSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.hb = Instant::now();
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                self.hb = Instant::now();
            }
            // Subscriptions are read-only; inbound text is ignored.
            Ok(ws::Message::Text(_)) => {}
            Ok(ws::Message::Close(_)) => {
                ctx.stop();
            }
            Err(e) => {
                info!("WebSocket error: {}", e);
                ctx.stop();
            }
            _ => {}
        }
    }
}

impl Handler<OutboundNotification> for NotificationSession {
    type Result = ();

    fn handle(&mut self, msg: OutboundNotification, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.text(msg.0);
    }
}

/// GET /ws?channel={role}:{userId}
///
/// A subscriber may only listen on its own channels; the router has already
/// filtered recipients, so whatever arrives here is for this user.
pub async fn ws_index(
    req: HttpRequest,
    stream: web::Payload,
    data: web::Data<AppState>,
    query: web::Query<WsQuery>,
) -> Result<HttpResponse, Error> {
    let caller = match req.extensions().get::<CallerIdentity>() {
        Some(identity) => identity.clone(),
        None => return Ok(HttpResponse::Unauthorized().body("Unauthorized")),
    };

    let allowed = query.channel == router::owner_channel(&caller.user_id)
        || query.channel == router::assignee_channel(&caller.user_id);
    if !allowed {
        return Ok(HttpResponse::Forbidden().body("Cannot subscribe to another user's channel"));
    }

    info!("User {} subscribing to {}", caller.user_id, query.channel);
    ws::start(
        NotificationSession::new(query.channel.clone(), data.notifier.clone()),
        &req,
        stream,
    )
}
