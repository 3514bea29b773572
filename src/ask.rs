//! Ask plugin: answer a question in the voice of a persona.

use tracing::{info, warn};

use crate::apikey::ApiKeyStore;
use crate::completion::{self, Message, Role};
use crate::personas::{self, Persona};

pub struct AskPlugin {
    client: completion::Client,
    keys: ApiKeyStore,
    max_tokens: u32,
}

impl AskPlugin {
    pub fn new(client: completion::Client, keys: ApiKeyStore, max_tokens: u32) -> Self {
        Self { client, keys, max_tokens }
    }

    pub fn keys(&self) -> &ApiKeyStore {
        &self.keys
    }

    /// Reply text for `/ask <persona> <question>`. Failures become readable replies.
    pub async fn answer(&self, persona: &str, question: &str) -> String {
        let (persona, api_key) = match prepare(persona, question, self.keys.get()) {
            Ok(ready) => ready,
            Err(reply) => return reply,
        };

        let preview: String = question.chars().take(80).collect();
        info!("💬 Ask [{}]: \"{}\"", persona.name, preview);

        match self
            .client
            .complete(&api_key, &build_messages(persona, question), self.max_tokens)
            .await
        {
            Ok(text) => text,
            Err(e) => {
                warn!("Completion failed for persona {}: {e}", persona.name);
                format!("Sorry, I couldn't get an answer right now ({e}).")
            }
        }
    }
}

fn prepare(persona: &str, question: &str, api_key: Option<String>) -> Result<(&'static Persona, String), String> {
    let Some(found) = personas::find(persona) else {
        return Err(format!(
            "Unknown persona '{persona}'. Available personas:\n{}",
            personas::list()
        ));
    };
    if question.trim().is_empty() {
        return Err("Usage: /ask <persona> <question>".to_string());
    }
    let Some(api_key) = api_key else {
        return Err("No completion API key is configured. A bot owner can set one with /setkey in a private chat.".to_string());
    };
    Ok((found, api_key))
}

fn build_messages(persona: &Persona, question: &str) -> Vec<Message> {
    vec![
        Message {
            role: Role::System,
            content: persona.prompt.to_string(),
        },
        Message {
            role: Role::User,
            content: question.trim().to_string(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_persona_lists_options() {
        let err = prepare("wizard", "why?", Some("k".to_string())).unwrap_err();
        assert!(err.contains("Unknown persona 'wizard'"));
        assert!(err.contains("pirate"));
    }

    #[test]
    fn test_empty_question() {
        let err = prepare("pirate", "   ", Some("k".to_string())).unwrap_err();
        assert!(err.starts_with("Usage"));
    }

    #[test]
    fn test_missing_key() {
        let err = prepare("pirate", "why is the sea salty?", None).unwrap_err();
        assert!(err.contains("/setkey"));
    }

    #[test]
    fn test_ready() {
        let (persona, key) = prepare("PIRATE", "why?", Some("k".to_string())).unwrap();
        assert_eq!(persona.name, "pirate");
        assert_eq!(key, "k");
    }

    #[test]
    fn test_messages_frame_question_with_persona() {
        let persona = personas::find("robot").unwrap();
        let messages = build_messages(persona, "  what is 2+2? ");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[0].content, persona.prompt);
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(messages[1].content, "what is 2+2?");
    }
}
