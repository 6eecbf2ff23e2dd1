//! Chat command layer
//!
//! Each workflow inspects an incoming text message and either answers it or
//! passes. The router asks them in order.

pub mod router;
pub mod smalltalk;
pub mod stuckup;

use async_trait::async_trait;

pub use router::WorkflowRouter;
pub use smalltalk::SmallTalkWorkflow;
pub use stuckup::StuckupWorkflow;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowContext {
    pub employee_code: String,
    pub seatalk_id: Option<String>,
    pub thread_id: Option<String>,
    pub text: String,
}

impl WorkflowContext {
    pub fn new(employee_code: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            employee_code: employee_code.into(),
            seatalk_id: None,
            thread_id: None,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowResult {
    pub handled: bool,
    pub response_text: Option<String>,
}

impl WorkflowResult {
    pub fn pass() -> Self {
        Self {
            handled: false,
            response_text: None,
        }
    }

    pub fn reply(text: impl Into<String>) -> Self {
        Self {
            handled: true,
            response_text: Some(text.into()),
        }
    }
}

#[async_trait]
pub trait Workflow: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, context: &WorkflowContext) -> WorkflowResult;
}
