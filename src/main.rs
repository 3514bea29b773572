mod apikey;
mod ask;
mod commands;
mod completion;
mod config;
mod history;
mod log_chat;
mod personas;
mod platform;
mod purge;
mod telegram;

use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::{ChatKind, User};
use tracing::{error, info, warn};
use tracing_subscriber::prelude::*;

use apikey::ApiKeyStore;
use ask::AskPlugin;
use commands::{Command, Target};
use config::Config;
use history::{HistoryMessage, MessageHistory};
use platform::ChatPlatform;
use purge::{ArchiveUploader, DeletionExecutor, PurgePlugin, PurgeRequest};
use telegram::{TelegramClient, display_name, scope_for, topic_of};

struct BotState {
    config: Config,
    bot_username: Option<String>,
    telegram: Arc<TelegramClient>,
    ask: AskPlugin,
    purge: PurgePlugin,
}

impl BotState {
    async fn new(config: Config, bot: &Bot) -> Self {
        let bot_username = match bot.get_me().await {
            Ok(me) => {
                info!("Bot user ID: {}, username: @{}", me.id, me.username());
                Some(me.username().to_string())
            }
            Err(e) => {
                warn!("Failed to get bot info: {e}");
                None
            }
        };

        let history = Arc::new(MessageHistory::new(config.history_capacity));
        let telegram = Arc::new(TelegramClient::new(bot.clone(), history));

        let keys = ApiKeyStore::load(&config.data_dir, config.completion_api_key.clone());
        let client = completion::Client::new(config.completion_url.clone(), config.completion_model.clone());
        let ask = AskPlugin::new(client, keys, config.completion_max_tokens);

        let purge = PurgePlugin::new(
            DeletionExecutor::new(config.scan_multiplier),
            Box::new(ArchiveUploader::new(config.archive_url.clone())),
        );

        Self {
            config,
            bot_username,
            telegram,
            ask,
            purge,
        }
    }

    /// Owners always count; otherwise the chat's own admin list decides.
    async fn is_moderator(&self, chat_id: ChatId, user: &User) -> Result<bool, String> {
        if self.config.is_owner(user.id) {
            return Ok(true);
        }
        self.telegram
            .is_moderator(&chat_id.0.to_string(), user.id.0 as i64)
            .await
    }
}

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "warden.json".to_string());
    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    let bot = Bot::new(&config.telegram_bot_token);

    // Setup logging
    let log_dir = config.data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).ok();
    let file_appender = tracing_appender::rolling::never(&log_dir, "warden.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let registry = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        );

    if let Some(log_chat_id) = config.log_chat_id {
        registry.with(log_chat::LogChatLayer::new(bot.clone(), log_chat_id)).init();
    } else {
        registry.init();
    }

    info!("🚀 Starting warden...");
    info!("Loaded config from {config_path}");
    info!("Owner IDs: {:?}", config.owner_ids);

    let state = Arc::new(BotState::new(config, &bot).await);

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(handle_new_message))
        .branch(Update::filter_edited_message().endpoint(handle_edited_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

async fn handle_new_message(msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    let is_group = matches!(msg.chat.kind, ChatKind::Public(_));
    let is_private = matches!(msg.chat.kind, ChatKind::Private(_));

    let Some(user) = msg.from.clone() else {
        return Ok(());
    };
    let Some(text) = msg.text().or_else(|| msg.caption()).map(str::to_string) else {
        return Ok(());
    };

    if is_group {
        if !state.config.is_allowed_group(msg.chat.id) {
            return Ok(());
        }
        state.telegram.history().record(
            &scope_for(msg.chat.id, topic_of(&msg)),
            HistoryMessage {
                message_id: msg.id.0,
                user_id: user.id.0 as i64,
                user_name: display_name(&user),
                username: user.username.clone(),
                text: text.clone(),
                timestamp: msg.date,
            },
        );
    } else if !is_private {
        return Ok(());
    }

    let is_reply = msg.reply_to_message().is_some();
    let command = match commands::parse(&text, state.bot_username.as_deref(), is_reply) {
        Ok(Some(command)) => command,
        Ok(None) => return Ok(()),
        Err(usage) => {
            reply(&state, &msg, &usage).await;
            return Ok(());
        }
    };

    let response = match command {
        Command::Help => commands::HELP.to_string(),
        Command::Personas => format!("Available personas:\n{}", personas::list()),
        Command::Ask { persona, question } => state.ask.answer(&persona, &question).await,
        Command::SetKey { key } => handle_set_key(&state, &msg, &user, &key).await,
        Command::Purge { .. } | Command::PurgeLogs { .. } if !is_group => {
            "Moderation commands only work in groups.".to_string()
        }
        Command::Purge {
            target,
            amount,
            keyword,
            topic,
        } => handle_purge(&state, &msg, &user, target, amount, keyword, topic).await,
        Command::PurgeLogs { target, limit, topic } => {
            handle_purge_logs(&state, &msg, &user, target, limit, topic).await
        }
    };

    if !response.is_empty() {
        reply(&state, &msg, &response).await;
    }
    Ok(())
}

async fn handle_edited_message(msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    if !matches!(msg.chat.kind, ChatKind::Public(_)) || !state.config.is_allowed_group(msg.chat.id) {
        return Ok(());
    }
    if let Some(text) = msg.text().or_else(|| msg.caption()) {
        state
            .telegram
            .history()
            .edit(&scope_for(msg.chat.id, topic_of(&msg)), msg.id.0, text);
    }
    Ok(())
}

async fn reply(state: &BotState, msg: &Message, text: &str) {
    if let Err(e) = state
        .telegram
        .send_message(msg.chat.id, topic_of(msg), text, Some(msg.id))
        .await
    {
        error!("Failed to reply in chat {}: {e}", msg.chat.id);
    }
}

async fn handle_set_key(state: &BotState, msg: &Message, user: &User, key: &str) -> String {
    if !matches!(msg.chat.kind, ChatKind::Private(_)) {
        // The key is now visible to the group; try to take it down.
        let report = state
            .telegram
            .delete_messages(&scope_for(msg.chat.id, topic_of(msg)), &[msg.id.0])
            .await;
        if let Some(e) = report.error {
            warn!("Could not remove /setkey message from group {}: {e}", msg.chat.id);
        }
        if let Err(e) = state
            .telegram
            .send_message(msg.chat.id, topic_of(msg), "Send /setkey in a private chat with me.", None)
            .await
        {
            warn!("Failed to answer /setkey in group {}: {e}", msg.chat.id);
        }
        // The command message is gone, so there is nothing to reply to.
        return String::new();
    }
    if !state.config.is_owner(user.id) {
        info!("Rejected /setkey from non-owner {} ({})", display_name(user), user.id);
        return "Only bot owners can set the API key.".to_string();
    }
    match state.ask.keys().set(key) {
        Ok(()) => "API key updated.".to_string(),
        Err(e) => {
            error!("Failed to store API key: {e}");
            format!("Could not store the API key: {e}")
        }
    }
}

/// Resolve a command target to (user id, display name).
fn resolve_target(state: &BotState, msg: &Message, target: &Target) -> Result<(i64, String), String> {
    let guild_id = msg.chat.id.0.to_string();
    match target {
        Target::Id(id) => {
            let name = state
                .telegram
                .history()
                .user_name(&guild_id, *id)
                .unwrap_or_else(|| id.to_string());
            Ok((*id, name))
        }
        Target::Username(name) => state
            .telegram
            .history()
            .resolve_username(&guild_id, name)
            .ok_or_else(|| format!("I haven't seen any messages from @{name} here, so I can't find them.")),
        Target::Reply => msg
            .reply_to_message()
            .and_then(|reply| reply.from.as_ref())
            .map(|author| (author.id.0 as i64, display_name(author)))
            .ok_or_else(|| "The replied-to message has no author.".to_string()),
    }
}

async fn handle_purge(
    state: &BotState,
    msg: &Message,
    user: &User,
    target: Target,
    amount: i64,
    keyword: Option<String>,
    topic: Option<i32>,
) -> String {
    match state.is_moderator(msg.chat.id, user).await {
        Ok(true) => {}
        Ok(false) => return "Only moderators can purge messages.".to_string(),
        Err(e) => return format!("Could not check your permissions: {e}"),
    }

    let (target_user_id, target_name) = match resolve_target(state, msg, &target) {
        Ok(resolved) => resolved,
        Err(reply) => return reply,
    };

    let request = PurgeRequest {
        scope: scope_for(msg.chat.id, topic.unwrap_or_else(|| topic_of(msg))),
        target_user_id,
        amount,
        keyword,
        trigger_message_id: msg.id.0,
    };
    info!(
        "{} ({}) requested purge of {} message(s) from {} in {}",
        display_name(user),
        user.id,
        amount,
        target_name,
        request.scope
    );

    let timestamp = msg.date.format("%Y-%m-%d %H:%M:%S").to_string();
    match state
        .purge
        .purge(state.telegram.as_ref(), &request, &target_name, &timestamp)
        .await
    {
        Ok(outcome) => outcome.reply(&target_name),
        Err(e) => {
            warn!("Purge failed: {e}");
            format!("Purge failed: {e}")
        }
    }
}

async fn handle_purge_logs(
    state: &BotState,
    msg: &Message,
    user: &User,
    target: Option<Target>,
    limit: usize,
    topic: Option<i32>,
) -> String {
    match state.is_moderator(msg.chat.id, user).await {
        Ok(true) => {}
        Ok(false) => return "Only moderators can view purge logs.".to_string(),
        Err(e) => return format!("Could not check your permissions: {e}"),
    }

    let user_id = match target.as_ref().map(|t| resolve_target(state, msg, t)).transpose() {
        Ok(resolved) => resolved.map(|(id, _)| id),
        Err(reply) => return reply,
    };

    let scope = scope_for(msg.chat.id, topic.unwrap_or_else(|| topic_of(msg)));
    match state.purge.logs(&scope, user_id, limit) {
        Ok(text) => text,
        Err(e) => format!("{e}"),
    }
}
