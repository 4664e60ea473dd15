use std::sync::Arc;

use crate::connectivity::ConnectivityMonitor;
use crate::events::EventSender;
use crate::proxy::ForegroundProxy;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub proxy: ForegroundProxy,
    pub monitor: Arc<ConnectivityMonitor>,
    pub events: EventSender,
}
