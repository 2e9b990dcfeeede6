//! Handlers behind the dispatch table.
//!
//! Provider failures are recovered here and converted into reply text; the
//! store is only updated after a successful provider call, and the reply is
//! built from the updated state.

use super::dispatch::{InboundEvent, OutboundAction};
use crate::llm::ProviderGateway;
use crate::registry::NetworkEntry;
use crate::store::{CompletionEntry, ConversationKey, ConversationStore, DialogEntry};
use crate::whitelist::WhitelistStore;
use tracing::debug;

/// Leading token that clears a conversation instead of calling the provider.
const CLEAR_TOKEN: &str = "clear";

fn is_clear_request(cleaned: &str) -> bool {
    cleaned.split_whitespace().next() == Some(CLEAR_TOKEN)
}

/// Running-dialog handler for OpenAI text networks.
pub(super) async fn chat(
    store: &ConversationStore,
    gateway: &dyn ProviderGateway,
    network: &NetworkEntry,
    event: &InboundEvent,
    cleaned: &str,
) -> OutboundAction {
    let key = ConversationKey::for_event(event.chat_id, event.user_id);
    if is_clear_request(cleaned) {
        store.clear_dialogs(key);
        return OutboundAction::ReplyText("History cleared".to_string());
    }

    let history = store.clean_old_dialogs(key);
    debug!(
        "Chat request via /{} with {} context entries",
        network.command,
        history.len()
    );
    match gateway.chat(network, &history, cleaned).await {
        Ok(response) => {
            store.add_dialog(
                key,
                DialogEntry::new(cleaned.to_string(), response.clone(), event.timestamp),
            );
            OutboundAction::ReplyText(response)
        }
        Err(e) => OutboundAction::ReplyText(format!("Error while getting response, {e}")),
    }
}

/// One-shot completion handler for Replicate text networks.
pub(super) async fn complete(
    store: &ConversationStore,
    gateway: &dyn ProviderGateway,
    network: &NetworkEntry,
    event: &InboundEvent,
    cleaned: &str,
) -> OutboundAction {
    let key = ConversationKey::for_event(event.chat_id, event.user_id);
    if is_clear_request(cleaned) {
        store.clear_completions(key);
        return OutboundAction::ReplyText("History cleared".to_string());
    }

    let history = store.clean_old_completions(key);
    match gateway.complete(network, &history, cleaned).await {
        Ok(response) => {
            store.add_completion(
                key,
                CompletionEntry::new(cleaned.to_string(), response.clone(), event.timestamp),
            );
            OutboundAction::ReplyText(response)
        }
        Err(e) => OutboundAction::ReplyText(format!("Error while getting response, {e}")),
    }
}

pub(super) async fn image(
    gateway: &dyn ProviderGateway,
    network: &NetworkEntry,
    cleaned: &str,
) -> OutboundAction {
    if cleaned.is_empty() {
        return OutboundAction::ReplyText("No text provided".to_string());
    }
    match gateway.generate_image(network, cleaned).await {
        Ok(output) => OutboundAction::ReplyPhoto(output),
        Err(e) => OutboundAction::ReplyText(format!("Error while getting image: {e}")),
    }
}

pub(super) async fn transcribe(
    gateway: &dyn ProviderGateway,
    network: &NetworkEntry,
    event: &InboundEvent,
    cleaned: &str,
) -> OutboundAction {
    let Some(audio) = event.voice.as_deref() else {
        return OutboundAction::ReplyText(format!(
            "Reply to a voice message with /{} to transcribe it",
            network.command
        ));
    };
    // A two-letter remainder is taken as a language hint for the model.
    let language = (cleaned.len() == 2).then_some(cleaned);
    match gateway.transcribe(network, audio, language).await {
        Ok(text) => OutboundAction::ReplyText(text),
        Err(e) => OutboundAction::ReplyText(format!("Error while getting audio: {e}")),
    }
}

pub(super) fn whitelist_add(whitelist: &WhitelistStore, cleaned: &str) -> OutboundAction {
    if cleaned.is_empty() {
        return OutboundAction::ReplyText("Usage: /whitelist <id or username>".to_string());
    }
    match whitelist.whitelist(cleaned) {
        Ok(()) => {
            OutboundAction::ReplyText(format!("Added {} to whitelist", cleaned.to_lowercase()))
        }
        Err(e) => OutboundAction::ReplyText(e.to_string()),
    }
}

pub(super) fn whitelist_remove(whitelist: &WhitelistStore, cleaned: &str) -> OutboundAction {
    if cleaned.is_empty() {
        return OutboundAction::ReplyText("Usage: /blacklist <id or username>".to_string());
    }
    match whitelist.blacklist(cleaned) {
        Ok(()) => {
            OutboundAction::ReplyText(format!("Removed {} from whitelist", cleaned.to_lowercase()))
        }
        Err(e) => OutboundAction::ReplyText(e.to_string()),
    }
}
