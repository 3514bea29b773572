//! Forwards warnings and purge audit lines to a Telegram log chat.

use std::time::Duration;

use teloxide::prelude::*;
use tokio::sync::mpsc;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

use crate::telegram::truncate_message;

/// Events with this target are copied to the log chat.
pub const AUDIT_TARGET: &str = "audit";

/// Audit lines buffered before an early flush.
const MAX_BUFFERED: usize = 20;

enum Forward {
    /// WARN/ERROR, sent right away.
    Alert(String),
    /// Audit line, sent with the next batch.
    Audit(String),
}

pub struct LogChatLayer {
    tx: mpsc::UnboundedSender<Forward>,
}

impl LogChatLayer {
    pub fn new(bot: Bot, chat_id: ChatId) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Forward>();

        tokio::spawn(async move {
            let mut audit: Vec<String> = Vec::new();
            let mut interval = tokio::time::interval(Duration::from_secs(10));

            loop {
                tokio::select! {
                    forward = rx.recv() => match forward {
                        Some(Forward::Alert(text)) => send(&bot, chat_id, &text).await,
                        Some(Forward::Audit(text)) => {
                            audit.push(text);
                            if audit.len() >= MAX_BUFFERED {
                                send(&bot, chat_id, &audit.join("\n")).await;
                                audit.clear();
                            }
                        }
                        None => break,
                    },
                    _ = interval.tick() => {
                        if !audit.is_empty() {
                            send(&bot, chat_id, &audit.join("\n")).await;
                            audit.clear();
                        }
                    }
                }
            }
        });

        Self { tx }
    }
}

async fn send(bot: &Bot, chat_id: ChatId, text: &str) {
    // Logging from here would loop back into this layer.
    if let Err(e) = bot.send_message(chat_id, truncate_message(text)).await {
        eprintln!("Failed to send to log chat: {e}");
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else if self.message.is_empty() {
            self.message = format!("{} = {:?}", field.name(), value);
        } else {
            self.message.push_str(&format!(", {} = {:?}", field.name(), value));
        }
    }
}

fn classify(level: Level, target: &str, message: String) -> Option<Forward> {
    match level {
        Level::ERROR => Some(Forward::Alert(format!("❌ {message}"))),
        Level::WARN => Some(Forward::Alert(format!("⚠️ {message}"))),
        _ if target == AUDIT_TARGET => Some(Forward::Audit(format!("🧹 {message}"))),
        _ => None,
    }
}

impl<S: Subscriber> Layer<S> for LogChatLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        // teloxide's own errors would be re-sent through teloxide.
        if metadata.target().starts_with("teloxide") || metadata.target().starts_with("reqwest") {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        if let Some(forward) = classify(*metadata.level(), metadata.target(), visitor.message)
            && self.tx.send(forward).is_err()
        {
            eprintln!("Log chat channel closed, message dropped");
        }
    }
}
