use console::{Style, StyledObject};
use prompt_grok_core::usage::{CostEstimate, UsageRecord};

/// Represents the type of a chat message, used for styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatMessageType {
    /// The prompt for user input.
    Prompt,
    /// Echo of the submitted prompt.
    User,
    /// Header above the model answer.
    Response,
    /// Header above the reasoning trace.
    Reasoning,
    /// Status lines: welcome, farewell, interruptions.
    Notice,
    /// Token usage and cost.
    Footer,
    /// An error message.
    Error,
}

/// Styles a string of text according to the specified `ChatMessageType`.
pub fn style_chat_text(text: &str, style: ChatMessageType) -> StyledObject<&str> {
    let style_obj = match style {
        ChatMessageType::Prompt => Style::new().green(),
        ChatMessageType::User => Style::new().green().bold(),
        ChatMessageType::Response => Style::new().blue().bold(),
        ChatMessageType::Reasoning => Style::new().cyan().bold(),
        ChatMessageType::Notice | ChatMessageType::Footer => Style::new().yellow(),
        ChatMessageType::Error => Style::new().red().bold(),
    };
    style_obj.apply_to(text)
}

/// Colour applied to default-styled text of a rendered block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Prompt,
    Response,
    Reasoning,
}

impl Role {
    pub fn style(&self) -> Style {
        match self {
            Role::Prompt => Style::new().green(),
            Role::Response => Style::new().blue(),
            Role::Reasoning => Style::new().cyan(),
        }
    }
}

/// Formats the usage footer printed after a buffered response.
pub fn format_usage_line(usage: &UsageRecord, cost: &CostEstimate) -> String {
    format!(
        "Tokens used: prompt={}, completion={}, total={} | Cost: {cost}",
        usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
    )
}
