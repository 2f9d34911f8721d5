use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub command_prefix: String,

    // Reproducción
    pub max_queue_size: usize,

    // Chat IA (opcional)
    pub groq_api_key: Option<String>,
    pub groq_model: String,
    pub chat_history_size: usize,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            // Discord
            discord_token: std::env::var("DISCORD_TOKEN")?,
            command_prefix: std::env::var("COMMAND_PREFIX")
                .unwrap_or_else(|_| "!".to_string()),

            // Reproducción
            max_queue_size: std::env::var("MAX_QUEUE_SIZE")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()?,

            // Chat IA
            groq_api_key: std::env::var("GROQ_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty()),
            groq_model: std::env::var("GROQ_MODEL")
                .unwrap_or_else(|_| "llama-3.3-70b-versatile".to_string()),
            chat_history_size: std::env::var("CHAT_HISTORY_SIZE")
                .unwrap_or_else(|_| "10".to_string())
                .parse()?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Comprobaciones de sanidad para atrapar configuraciones rotas antes
    /// de arrancar el bot
    pub fn validate(&self) -> Result<()> {
        if self.command_prefix.trim().is_empty() {
            anyhow::bail!("El prefijo de comandos no puede estar vacío");
        }

        if self.max_queue_size == 0 {
            anyhow::bail!("MAX_QUEUE_SIZE debe ser mayor que 0");
        }

        if self.chat_history_size == 0 {
            anyhow::bail!("CHAT_HISTORY_SIZE debe ser mayor que 0");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (sin defaults: el token siempre se provee)
            discord_token: String::new(),
            command_prefix: "!".to_string(),

            // Reproducción
            max_queue_size: 1000,

            // Chat IA
            groq_api_key: None,
            groq_model: "llama-3.3-70b-versatile".to_string(),
            chat_history_size: 10,
        }
    }
}
