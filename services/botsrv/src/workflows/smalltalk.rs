//! Conversational replies for plain (non-command) messages

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use super::{Workflow, WorkflowContext, WorkflowResult};

type Intent = LazyLock<Option<Regex>>;

fn whole_words(alternatives: &str) -> Option<Regex> {
    Regex::new(&format!(r"\b({})\b", alternatives)).ok()
}

static HOW_ARE_YOU: Intent = LazyLock::new(|| whole_words("how are you|how r u|how're you"));
static GREETING: Intent =
    LazyLock::new(|| whole_words("hi|hello|hey|good morning|good afternoon|good evening"));
static THANKS: Intent = LazyLock::new(|| whole_words("thanks|thank you|ty"));
static BYE: Intent = LazyLock::new(|| whole_words("bye|goodbye|see you|cya"));
static HELP: Intent = LazyLock::new(|| whole_words("help|what can you do|commands?"));

fn matches(intent: &Intent, text: &str) -> bool {
    intent.as_ref().is_some_and(|re| re.is_match(text))
}

pub struct SmallTalkWorkflow;

#[async_trait]
impl Workflow for SmallTalkWorkflow {
    fn name(&self) -> &'static str {
        "smalltalk"
    }

    async fn handle(&self, context: &WorkflowContext) -> WorkflowResult {
        let text = context.text.trim();
        // Slash commands stay on the command path
        if text.is_empty() || text.starts_with('/') {
            return WorkflowResult::pass();
        }

        let lowered = text
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        let reply = if matches(&HOW_ARE_YOU, &lowered) {
            "I'm doing well, thanks for asking. I can help with /stuckup."
        } else if matches(&GREETING, &lowered) {
            "Hi! Nice to hear from you. What do you want to work on today?"
        } else if matches(&THANKS, &lowered) {
            "You're welcome. If you need a command, start with /stuckup help."
        } else if matches(&BYE, &lowered) {
            "See you. Message me anytime if you need help."
        } else if matches(&HELP, &lowered) {
            "I can help with the /stuckup workflow. Try /stuckup help for setup details."
        } else {
            "I hear you. I can help with /stuckup. Tell me what you need."
        };
        WorkflowResult::reply(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn reply(text: &str) -> Option<String> {
        SmallTalkWorkflow
            .handle(&WorkflowContext::new("e_1", text))
            .await
            .response_text
    }

    async fn is_greeting(text: &str) -> bool {
        reply(text).await.is_some_and(|r| r.starts_with("Hi!"))
    }

    #[test]
    fn test_intent_patterns_compile() {
        for intent in [&HOW_ARE_YOU, &GREETING, &THANKS, &BYE, &HELP] {
            assert!(intent.is_some());
        }
    }

    #[tokio::test]
    async fn test_replies_by_intent() {
        assert!(reply("How are you doing?").await.is_some_and(|r| r.starts_with("I'm doing well")));
        assert!(reply("How   ARE\tyou").await.is_some_and(|r| r.starts_with("I'm doing well")));
        assert!(is_greeting("hey there").await);
        assert!(reply("thank you!").await.is_some_and(|r| r.starts_with("You're welcome")));
        assert!(reply("ok bye").await.is_some_and(|r| r.starts_with("See you")));
        assert!(reply("any commands?").await.is_some_and(|r| r.starts_with("I can help")));
        assert!(reply("lorem").await.is_some_and(|r| r.starts_with("I hear you")));
    }

    #[tokio::test]
    async fn test_greeting_uses_word_boundaries() {
        // "this" contains "hi" but is not a greeting
        assert!(!is_greeting("this").await);
        // underscore is a word character, quotes are not
        assert!(!is_greeting("hi_team").await);
        assert!(is_greeting("'hi'").await);
        assert!(is_greeting("hi, team").await);
    }

    #[tokio::test]
    async fn test_slash_commands_pass() {
        let result = SmallTalkWorkflow
            .handle(&WorkflowContext::new("e_1", "/hello"))
            .await;
        assert!(!result.handled);
    }
}
