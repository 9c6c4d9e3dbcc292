// ABOUTME: User-facing prompts raised by interactive flows
// ABOUTME: Front ends supply a prompt handler; the default prints to stderr

use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowPrompt {
    /// Authorization URL the user must open
    VisitUrl { provider: String, url: String },
    /// Device flow code to enter at the verification URI
    EnterCode {
        provider: String,
        verification_uri: String,
        user_code: String,
    },
}

pub type PromptHandler = Arc<dyn Fn(&FlowPrompt) + Send + Sync>;

pub fn stderr_prompt() -> PromptHandler {
    Arc::new(|prompt: &FlowPrompt| match prompt {
        FlowPrompt::VisitUrl { provider, url } => {
            eprintln!("Open this URL to authorize {}:\n  {}", provider, url);
        }
        FlowPrompt::EnterCode {
            provider,
            verification_uri,
            user_code,
        } => {
            eprintln!(
                "To connect {}, visit {} and enter the code: {}",
                provider, verification_uri, user_code
            );
        }
    })
}
