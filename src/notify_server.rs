//! Channel-keyed fan-out actor.
//!
//! Websocket sessions register under channel names (`owner:{userId}`,
//! `assignee:{userId}`); `Publish` delivers routed notifications to every
//! session on the matching channel. The actor mailbox processes publishes
//! sequentially, so delivery order within one channel matches emission
//! order; no ordering is promised across channels.

use actix::prelude::*;
use log::{debug, info};
use std::collections::HashMap;

use crate::router::Delivery;

/// A rendered notification on its way to one websocket session.
#[derive(Message)]
#[rtype(result = "()")]
pub struct OutboundNotification(pub String);

#[derive(Message)]
#[rtype(result = "()")]
pub struct Subscribe {
    pub channel: String,
    pub addr: Recipient<OutboundNotification>,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Unsubscribe {
    pub channel: String,
    pub addr: Recipient<OutboundNotification>,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Publish {
    pub deliveries: Vec<Delivery>,
}

pub struct NotifyServer {
    // Multiple connections per channel: a user may have several tabs open.
    sessions: HashMap<String, Vec<Recipient<OutboundNotification>>>,
}

impl NotifyServer {
    pub fn new() -> Self {
        NotifyServer { sessions: HashMap::new() }
    }
}

impl Default for NotifyServer {
    fn default() -> Self {
        Self::new()
    }
}

impl Actor for NotifyServer {
    type Context = Context<Self>;
}

impl Handler<Subscribe> for NotifyServer {
    type Result = ();

    fn handle(&mut self, msg: Subscribe, _: &mut Context<Self>) {
        info!("Subscriber joined channel {}", msg.channel);
        self.sessions.entry(msg.channel).or_default().push(msg.addr);
    }
}

impl Handler<Unsubscribe> for NotifyServer {
    type Result = ();

    fn handle(&mut self, msg: Unsubscribe, _: &mut Context<Self>) {
        info!("Subscriber left channel {}", msg.channel);
        if let Some(addrs) = self.sessions.get_mut(&msg.channel) {
            addrs.retain(|a| a != &msg.addr);
            if addrs.is_empty() {
                self.sessions.remove(&msg.channel);
            }
        }
    }
}

impl Handler<Publish> for NotifyServer {
    type Result = ();

    fn handle(&mut self, msg: Publish, _: &mut Context<Self>) {
        for delivery in msg.deliveries {
            let payload = serde_json::to_string(&delivery.notification).unwrap_or_default();
            match self.sessions.get(&delivery.channel) {
                Some(addrs) => {
                    for addr in addrs {
                        addr.do_send(OutboundNotification(payload.clone()));
                    }
                    debug!(
                        "published {:?} to {} ({} session(s))",
                        delivery.notification.kind,
                        delivery.channel,
                        addrs.len()
                    );
                }
                // Nobody listening; at-least-once delivery is the
                // subscriber's concern once connected, not a queue here.
                None => debug!("no sessions on {}", delivery.channel),
            }
        }
    }
}
