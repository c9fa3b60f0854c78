//! Canned replies that bypass the pipeline entirely.

use std::sync::LazyLock;

use regex::Regex;

pub const GREETING_REPLY: &str = "Hello! How can I help you with this project today?";
pub const THANKS_REPLY: &str = "You're welcome! Anything else about this project I can assist with?";

static GREETING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(hi|hello|hey|hii|hey there)[!.]?$").expect("static pattern compiles")
});

static THANKS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(thanks|thank(?: you| u)|thx)\b").expect("static pattern compiles")
});

/// Which canned reply a message triggers, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shortcut {
    Greeting,
    Thanks,
}

impl Shortcut {
    pub fn reply(&self) -> &'static str {
        match self {
            Shortcut::Greeting => GREETING_REPLY,
            Shortcut::Thanks => THANKS_REPLY,
        }
    }
}

/// Greetings must be the whole message; thanks may appear anywhere.
pub fn detect(message: &str) -> Option<Shortcut> {
    if GREETING.is_match(message.trim()) {
        Some(Shortcut::Greeting)
    } else if THANKS.is_match(message) {
        Some(Shortcut::Thanks)
    } else {
        None
    }
}
