use std::sync::Arc;

use tracing::debug;

use super::{SmallTalkWorkflow, StuckupWorkflow, Workflow, WorkflowContext, WorkflowResult};
use crate::stuckup::StuckupMonitor;

pub const FALLBACK_REPLY: &str =
    "I didn't catch that command.\nYou can chat with me using `/stuckup`.";

pub struct WorkflowRouter {
    workflows: Vec<Box<dyn Workflow>>,
}

impl WorkflowRouter {
    pub fn new(workflows: Vec<Box<dyn Workflow>>) -> Self {
        Self { workflows }
    }

    /// Commands first, then small talk
    pub fn with_defaults(monitor: Option<Arc<StuckupMonitor>>) -> Self {
        Self::new(vec![
            Box::new(StuckupWorkflow::new(monitor)),
            Box::new(SmallTalkWorkflow),
        ])
    }

    pub async fn route(&self, context: &WorkflowContext) -> WorkflowResult {
        for workflow in &self.workflows {
            let result = workflow.handle(context).await;
            if result.handled {
                debug!("Message handled by '{}' workflow", workflow.name());
                return result;
            }
        }
        WorkflowResult {
            handled: false,
            response_text: Some(FALLBACK_REPLY.to_string()),
        }
    }
}
