//! Command routing for inbound chat events.
//!
//! The dispatch table is built once from the validated registry and treated
//! as immutable: command string -> tagged route (built-in or provider call).
//! `Dispatcher::handle` runs the full pipeline for one event — command
//! extraction, built-in dispatch, registry resolution, access check, handler
//! invocation — and always returns an [`OutboundAction`]; no error escapes to
//! the event loop.

use super::denial::DenialCache;
use super::handlers;
use crate::access::AccessPolicy;
use crate::config::{NetworkKind, Settings};
use crate::llm::{ImageOutput, ProviderGateway};
use crate::registry::{NetworkEntry, NetworkRegistry, Provider};
use crate::store::ConversationStore;
use crate::utils::extract_command;
use crate::whitelist::WhitelistStore;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Seconds between denial log lines for one sender.
const DENIAL_LOG_COOLDOWN_SECS: u64 = 600;
const DENIAL_CACHE_CAPACITY: u64 = 10_000;

/// Transport-independent view of one incoming message.
#[derive(Debug, Clone)]
pub struct InboundEvent {
    pub chat_id: i64,
    pub user_id: i64,
    pub username: Option<String>,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    /// Voice attachment bytes: from the replied-to message when the event is
    /// a command reply, or from the message itself for a bare voice note.
    pub voice: Option<Vec<u8>>,
}

/// What the transport should do in response to an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundAction {
    ReplyText(String),
    ReplyPhoto(ImageOutput),
    NoAction,
}

/// Tagged handler variant bound to a command at table-build time.
#[derive(Debug, Clone)]
enum Route {
    Start,
    Ping,
    Help,
    Whitelist,
    Blacklist,
    Chat(NetworkEntry),
    Complete(NetworkEntry),
    Image(NetworkEntry),
    Transcribe(NetworkEntry),
}

/// Immutable command -> route mapping.
struct DispatchTable {
    routes: BTreeMap<String, Route>,
}

impl DispatchTable {
    fn build(registry: &NetworkRegistry) -> Self {
        let mut routes = BTreeMap::new();
        routes.insert("start".to_string(), Route::Start);
        routes.insert("ping".to_string(), Route::Ping);
        routes.insert("help".to_string(), Route::Help);
        routes.insert("whitelist".to_string(), Route::Whitelist);
        routes.insert("blacklist".to_string(), Route::Blacklist);

        for entry in registry.entries() {
            let route = match entry.kind {
                NetworkKind::Text => match entry.provider {
                    Provider::OpenAi => Route::Chat(entry.clone()),
                    Provider::Replicate => Route::Complete(entry.clone()),
                },
                NetworkKind::Image => Route::Image(entry.clone()),
                NetworkKind::Audio => Route::Transcribe(entry.clone()),
            };
            routes.insert(entry.command.clone(), route);
        }

        Self { routes }
    }

    fn get(&self, command: &str) -> Option<&Route> {
        self.routes.get(command)
    }

    fn help_text(&self) -> String {
        let mut lines = vec!["Available commands:".to_string()];
        for (command, route) in &self.routes {
            let line = match route {
                Route::Start => "/start - say hello".to_string(),
                Route::Ping => "/ping - check the bot is alive".to_string(),
                Route::Help => "/help - this message".to_string(),
                Route::Whitelist => "/whitelist <entry> - allow a user or chat (admin)".to_string(),
                Route::Blacklist => {
                    "/blacklist <entry> - remove a user or chat (admin)".to_string()
                }
                Route::Chat(e) | Route::Complete(e) => format!("/{command} - text ({})", e.name),
                Route::Image(e) => format!("/{command} - image ({})", e.name),
                Route::Transcribe(e) => format!("/{command} - voice transcription ({})", e.name),
            };
            lines.push(line);
        }
        lines.join("\n")
    }
}

/// Routes one event at a time through access control to its handler.
pub struct Dispatcher {
    table: DispatchTable,
    default_audio: Option<NetworkEntry>,
    access: AccessPolicy,
    conversations: ConversationStore,
    whitelist: Arc<WhitelistStore>,
    gateway: Arc<dyn ProviderGateway>,
    denials: DenialCache,
}

impl Dispatcher {
    #[must_use]
    pub fn new(
        settings: &Settings,
        registry: &NetworkRegistry,
        whitelist: Arc<WhitelistStore>,
        gateway: Arc<dyn ProviderGateway>,
    ) -> Self {
        let table = DispatchTable::build(registry);
        let default_audio = registry.find_by_kind(NetworkKind::Audio).cloned();
        let access = AccessPolicy::new(&settings.telegram, Arc::clone(&whitelist));
        let conversations = ConversationStore::new(
            settings.general.text_history_ttl,
            settings.general.text_history_size,
        );
        Self {
            table,
            default_audio,
            access,
            conversations,
            whitelist,
            gateway,
            denials: DenialCache::new(DENIAL_LOG_COOLDOWN_SECS, DENIAL_CACHE_CAPACITY),
        }
    }

    /// Handle one inbound event to completion.
    pub async fn handle(&self, event: &InboundEvent) -> OutboundAction {
        let (command, cleaned) = extract_command(&event.text);

        let route = match command {
            Some(ref cmd) => match self.table.get(cmd) {
                Some(route) => route.clone(),
                None => {
                    info!("Unknown command /{cmd} from user {}", event.user_id);
                    return OutboundAction::ReplyText(format!("Unknown command /{cmd}"));
                }
            },
            // Un-commanded input: a bare voice note goes to the first audio
            // network; anything else is not for us.
            None => match (&event.voice, &self.default_audio) {
                (Some(_), Some(entry)) => Route::Transcribe(entry.clone()),
                _ => return OutboundAction::NoAction,
            },
        };

        // Whitelist management is gated on the admin identity, everything
        // else on the regular access decision. Denials never reach the
        // sender; they only produce a (throttled) log line.
        match &route {
            Route::Whitelist | Route::Blacklist => {
                if !self.access.is_admin(event.user_id) {
                    if self.allowed(event) {
                        return OutboundAction::ReplyText(
                            "Only the admin can manage the whitelist.".to_string(),
                        );
                    }
                    return self.deny(event).await;
                }
            }
            _ => {
                if !self.allowed(event) {
                    return self.deny(event).await;
                }
            }
        }

        match route {
            Route::Start => {
                OutboundAction::ReplyText("Shaka, bruh! Ask me something.".to_string())
            }
            Route::Ping => OutboundAction::ReplyText("Pong, bruh!".to_string()),
            Route::Help => OutboundAction::ReplyText(self.table.help_text()),
            Route::Whitelist => handlers::whitelist_add(&self.whitelist, &cleaned),
            Route::Blacklist => handlers::whitelist_remove(&self.whitelist, &cleaned),
            Route::Chat(network) => {
                handlers::chat(
                    &self.conversations,
                    self.gateway.as_ref(),
                    &network,
                    event,
                    &cleaned,
                )
                .await
            }
            Route::Complete(network) => {
                handlers::complete(
                    &self.conversations,
                    self.gateway.as_ref(),
                    &network,
                    event,
                    &cleaned,
                )
                .await
            }
            Route::Image(network) => {
                handlers::image(self.gateway.as_ref(), &network, &cleaned).await
            }
            Route::Transcribe(network) => {
                handlers::transcribe(self.gateway.as_ref(), &network, event, &cleaned).await
            }
        }
    }

    fn allowed(&self, event: &InboundEvent) -> bool {
        self.access
            .is_allowed(event.user_id, event.chat_id, event.username.as_deref())
    }

    async fn deny(&self, event: &InboundEvent) -> OutboundAction {
        if self.denials.should_log(event.user_id).await {
            warn!(
                "Blocked event from user {} in chat {}",
                event.user_id, event.chat_id
            );
        }
        OutboundAction::NoAction
    }
}
