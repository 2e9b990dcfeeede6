//! Text helpers for inbound messages.
//!
//! Regex patterns are compile-time validated via the `lazy_regex!` macro.

#![allow(clippy::non_std_lazy_statics)]

use lazy_regex::lazy_regex;

/// Match a leading command token, with optional `@botname` suffix:
/// `/word` or `/word@relay_bot`.
static RE_COMMAND: lazy_regex::Lazy<regex::Regex> = lazy_regex!(r"^/(\w+)(?:@\w+)?\s*");

/// Split a message into its command token and the remaining text.
///
/// Returns `(None, trimmed_text)` when the message does not start with a
/// command, otherwise `(Some(command), text_after_the_token)`.
///
/// # Examples
///
/// ```
/// use tg_ai_relay::utils::extract_command;
/// assert_eq!(
///     extract_command("/p What is the meaning of life?"),
///     (Some("p".to_string()), "What is the meaning of life?".to_string())
/// );
/// assert_eq!(extract_command("hello"), (None, "hello".to_string()));
/// ```
#[must_use]
pub fn extract_command(text: &str) -> (Option<String>, String) {
    match RE_COMMAND.captures(text) {
        Some(caps) => {
            let command = caps
                .get(1)
                .map(|m| m.as_str().to_lowercase())
                .unwrap_or_default();
            let cleaned = RE_COMMAND.replace(text, "").trim().to_string();
            (Some(command), cleaned)
        }
        None => (None, text.trim().to_string()),
    }
}
