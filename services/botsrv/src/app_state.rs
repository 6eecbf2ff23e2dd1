//! Shared state for the HTTP handlers

use std::sync::Arc;

use crate::config::Settings;
use crate::seatalk::MessageSender;
use crate::stuckup::StuckupMonitor;
use crate::workflows::WorkflowRouter;

pub struct AppState {
    pub settings: Arc<Settings>,

    /// Chat command router
    pub router: Arc<WorkflowRouter>,

    /// Replies to employees
    pub sender: Arc<dyn MessageSender>,

    /// Background monitor; `None` when the stuckup subsystem could not be built
    pub monitor: Option<Arc<StuckupMonitor>>,
}

impl AppState {
    pub fn new(
        settings: Arc<Settings>,
        sender: Arc<dyn MessageSender>,
        monitor: Option<Arc<StuckupMonitor>>,
    ) -> Self {
        let router = Arc::new(WorkflowRouter::with_defaults(monitor.clone()));
        Self {
            settings,
            router,
            sender,
            monitor,
        }
    }
}
