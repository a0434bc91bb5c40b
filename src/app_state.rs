use crate::config::Config;
use crate::dispatcher::Dispatcher;
use crate::notify_server::NotifyServer;
use actix::Addr;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub notifier: Addr<NotifyServer>,
    pub config: Config,
}
