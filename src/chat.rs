use anyhow::{Context as _, Result};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serenity::model::id::UserId;
use std::collections::VecDeque;
use std::time::Duration;
use tracing::debug;

const GROQ_ENDPOINT: &str = "https://api.groq.com/openai/v1/chat/completions";

const SYSTEM_PROMPT: &str = "Eres el asistente de Onda Music, un bot de música para Discord. \
Responde breve y con buen humor. Si te preguntan por los comandos de música, \
recuerda que el comando de ayuda muestra la lista completa.";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
        }
    }
}

/// Historial acotado de una conversación: al llenarse descarta lo más viejo
#[derive(Debug)]
pub struct ConversationHistory {
    messages: VecDeque<ChatMessage>,
    max_messages: usize,
}

impl ConversationHistory {
    pub fn new(max_messages: usize) -> Self {
        Self {
            messages: VecDeque::new(),
            max_messages,
        }
    }

    pub fn push(&mut self, role: &str, content: &str) {
        if self.messages.len() == self.max_messages {
            self.messages.pop_front();
        }
        self.messages.push_back(ChatMessage::new(role, content));
    }

    pub fn messages(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Conversaciones por usuario. Sin más sincronización que el propio mapa:
/// cada entrada se muta entera dentro de una operación del mapa.
pub struct ChatManager {
    conversations: DashMap<UserId, ConversationHistory>,
    max_messages: usize,
}

impl ChatManager {
    pub fn new(max_messages: usize) -> Self {
        Self {
            conversations: DashMap::new(),
            max_messages,
        }
    }

    /// Contexto completo para el modelo: prompt de sistema, historial del
    /// usuario y su mensaje nuevo al final
    pub fn context_for(&self, user_id: UserId, prompt: &str) -> Vec<ChatMessage> {
        let mut context = vec![ChatMessage::new("system", SYSTEM_PROMPT)];
        if let Some(history) = self.conversations.get(&user_id) {
            context.extend(history.messages().cloned());
        }
        context.push(ChatMessage::new("user", prompt));
        context
    }

    pub fn record_exchange(&self, user_id: UserId, prompt: &str, reply: &str) {
        let mut history = self
            .conversations
            .entry(user_id)
            .or_insert_with(|| ConversationHistory::new(self.max_messages));
        history.push("user", prompt);
        history.push("assistant", reply);
    }

    /// Devuelve `true` si había historial que borrar
    pub fn clear(&self, user_id: UserId) -> bool {
        self.conversations
            .remove(&user_id)
            .map(|(_, history)| !history.is_empty())
            .unwrap_or(false)
    }
}

/// Cliente del endpoint de chat de Groq (API compatible con OpenAI)
pub struct GroqClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

impl GroqClient {
    pub fn new(api_key: String, model: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            api_key,
            model,
        })
    }

    pub async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        debug!("💬 Pidiendo respuesta a {} ({} mensajes)", self.model, messages.len());

        let request = ChatRequest {
            model: &self.model,
            messages,
            max_tokens: 1024,
            temperature: 0.7,
        };

        let response = self
            .http
            .post(GROQ_ENDPOINT)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("no se pudo contactar el servicio de chat")?
            .error_for_status()
            .context("el servicio de chat respondió con error")?;

        let body: ChatResponse = response
            .json()
            .await
            .context("respuesta del servicio de chat ilegible")?;

        body.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("el servicio de chat no devolvió contenido"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn user() -> UserId {
        UserId::new(42)
    }

    #[test]
    fn test_history_drops_oldest_when_full() {
        let mut history = ConversationHistory::new(3);
        for i in 0..5 {
            history.push("user", &format!("mensaje {i}"));
        }

        assert_eq!(history.len(), 3);
        let contents: Vec<&str> = history.messages().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["mensaje 2", "mensaje 3", "mensaje 4"]);
    }

    #[test]
    fn test_context_starts_with_system_and_ends_with_prompt() {
        let manager = ChatManager::new(10);
        manager.record_exchange(user(), "hola", "¡hola!");

        let context = manager.context_for(user(), "¿qué tal?");
        assert_eq!(context.first().unwrap().role, "system");
        assert_eq!(context.last().unwrap().content, "¿qué tal?");
        assert_eq!(context.len(), 4); // system + user + assistant + prompt
    }

    #[test]
    fn test_context_without_history_is_just_system_and_prompt() {
        let manager = ChatManager::new(10);
        let context = manager.context_for(user(), "hola");
        assert_eq!(context.len(), 2);
    }

    #[test]
    fn test_clear_reports_whether_something_was_dropped() {
        let manager = ChatManager::new(10);
        assert!(!manager.clear(user()));

        manager.record_exchange(user(), "hola", "¡hola!");
        assert!(manager.clear(user()));
        assert!(!manager.clear(user()));
    }

    #[test]
    fn test_chat_response_parsing() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"claro que sí"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.choices[0].message.content, "claro que sí");
    }
}
