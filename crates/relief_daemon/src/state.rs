use std::sync::Arc;

use relief_world::ReferenceData;

use crate::dispatch::Dispatcher;
use crate::registry::ScenarioRegistry;
use crate::store::AuditStore;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ScenarioRegistry>,
    pub store: Arc<AuditStore>,
    pub dispatcher: Arc<Dispatcher>,
    pub reference: Arc<ReferenceData>,
}
