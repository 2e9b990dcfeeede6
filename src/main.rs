use dotenvy::dotenv;
use std::sync::Arc;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{InputFile, ReplyParameters, Voice};
use tg_ai_relay::bot::{Dispatcher as Relay, InboundEvent, OutboundAction};
use tg_ai_relay::config::Settings;
use tg_ai_relay::llm::{ImageOutput, LiveGateway};
use tg_ai_relay::registry::NetworkRegistry;
use tg_ai_relay::whitelist::WhitelistStore;
use tracing::{error, info};
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenv().ok();

    init_logging();

    info!("Starting tg-ai-relay...");

    let settings = init_settings();
    let whitelist = init_whitelist(&settings);
    let registry = init_registry(&settings);

    let gateway = Arc::new(LiveGateway::from_settings(&settings.integrations));
    let relay = Arc::new(Relay::new(&settings, &registry, whitelist, gateway));

    let bot = Bot::new(settings.telegram.bot_token.clone());
    let handler = Update::filter_message().endpoint(on_message);

    info!("Bot is running...");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![relay])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_settings() -> Settings {
    match Settings::new() {
        Ok(s) => {
            info!("Configuration loaded successfully.");
            s
        }
        Err(e) => {
            error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    }
}

fn init_whitelist(settings: &Settings) -> Arc<WhitelistStore> {
    match WhitelistStore::open(&settings.general.whitelist_path) {
        Ok(w) => Arc::new(w),
        Err(e) => {
            error!("Failed to open whitelist file: {e}");
            std::process::exit(1);
        }
    }
}

fn init_registry(settings: &Settings) -> NetworkRegistry {
    match NetworkRegistry::from_settings(&settings.integrations) {
        Ok(r) => {
            if r.is_empty() {
                info!("No provider networks configured; only built-ins will work.");
            }
            r
        }
        Err(e) => {
            error!("Invalid network configuration: {e}");
            std::process::exit(1);
        }
    }
}

async fn on_message(
    bot: Bot,
    msg: Message,
    relay: Arc<Relay>,
) -> Result<(), teloxide::RequestError> {
    let event = match build_event(&bot, &msg).await {
        Ok(Some(event)) => event,
        Ok(None) => return respond(()),
        Err(e) => {
            error!("Voice download failed: {e}");
            if let Err(e) = bot
                .send_message(msg.chat.id, "Error while getting audio, try again")
                .reply_parameters(ReplyParameters::new(msg.id))
                .await
            {
                error!("Failed to send reply: {e}");
            }
            return respond(());
        }
    };

    match relay.handle(&event).await {
        OutboundAction::ReplyText(text) => {
            if let Err(e) = bot
                .send_message(msg.chat.id, text)
                .reply_parameters(ReplyParameters::new(msg.id))
                .await
            {
                error!("Failed to send reply: {e}");
            }
        }
        OutboundAction::ReplyPhoto(output) => {
            let input = match output {
                ImageOutput::Bytes(bytes) => Some(InputFile::memory(bytes)),
                ImageOutput::Url(url) => match reqwest::Url::parse(&url) {
                    Ok(parsed) => Some(InputFile::url(parsed)),
                    Err(e) => {
                        error!("Provider returned an unparsable image URL: {e}");
                        None
                    }
                },
            };
            if let Some(input) = input {
                if let Err(e) = bot
                    .send_photo(msg.chat.id, input)
                    .reply_parameters(ReplyParameters::new(msg.id))
                    .await
                {
                    error!("Failed to send photo: {e}");
                }
            }
        }
        OutboundAction::NoAction => {}
    }

    respond(())
}

/// Convert a Telegram message into the transport-independent event, fetching
/// voice bytes when the message is (or replies to) a voice note.
///
/// Returns `Ok(None)` for messages the relay has no use for, and `Err` when
/// a wanted voice attachment cannot be downloaded; the caller reports that
/// failure to the sender instead of pretending no voice was attached.
async fn build_event(bot: &Bot, msg: &Message) -> anyhow::Result<Option<InboundEvent>> {
    let Some(from) = msg.from.as_ref() else {
        return Ok(None);
    };
    let text = msg.text().map(ToOwned::to_owned).unwrap_or_default();

    let voice = msg
        .reply_to_message()
        .and_then(Message::voice)
        .or_else(|| msg.voice());
    let voice_bytes = match voice {
        Some(v) if wants_voice(&text) => Some(download_voice(bot, v).await?),
        _ => None,
    };

    if text.is_empty() && voice_bytes.is_none() {
        return Ok(None);
    }

    Ok(Some(InboundEvent {
        chat_id: msg.chat.id.0,
        user_id: from.id.0.cast_signed(),
        username: from.username.clone(),
        text,
        timestamp: msg.date,
        voice: voice_bytes,
    }))
}

/// Whether an attached voice note should be fetched at all: only a bare
/// voice note or a command can route to transcription, so a plain-text reply
/// to someone's voice message never triggers a download.
fn wants_voice(text: &str) -> bool {
    text.is_empty() || text.starts_with('/')
}

async fn download_voice(bot: &Bot, voice: &Voice) -> anyhow::Result<Vec<u8>> {
    let file = bot.get_file(voice.file.id.clone()).await?;
    let mut buf = Vec::new();
    bot.download_file(&file.path, &mut buf).await?;
    Ok(buf)
}
