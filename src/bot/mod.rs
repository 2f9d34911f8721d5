//! Capa Discord del bot: despacho de comandos con prefijo y limpieza de
//! estado de voz. Toda la lógica con invariantes vive en [`crate::player`];
//! aquí solo se parsea, se delega y se responde.

use serenity::{
    all::{Context, EventHandler, Message, Ready, VoiceState},
    async_trait,
};
use std::sync::Arc;
use tracing::{error, info, warn};

pub mod commands;
pub mod handlers;

use crate::{
    chat::{ChatManager, GroqClient},
    config::Config,
    player::PlayerService,
};
use commands::ParseOutcome;

/// Función de chat IA completa (historial + cliente); solo existe si hay
/// credenciales configuradas
pub struct ChatFeature {
    pub manager: ChatManager,
    pub client: GroqClient,
}

pub struct OndaBot {
    pub config: Arc<Config>,
    pub player: Arc<PlayerService>,
    pub chat: Option<Arc<ChatFeature>>,
}

impl OndaBot {
    pub fn new(
        config: Arc<Config>,
        player: Arc<PlayerService>,
        chat: Option<Arc<ChatFeature>>,
    ) -> Self {
        Self {
            config,
            player,
            chat,
        }
    }
}

#[async_trait]
impl EventHandler for OndaBot {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());
        info!("💬 Prefijo de comandos: {}", self.config.command_prefix);
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }

        let Some(outcome) = commands::parse(&msg.content, &self.config.command_prefix) else {
            return;
        };

        match outcome {
            ParseOutcome::Command(command) => {
                info!(
                    "📝 Comando {:?} de {} en {:?}",
                    command, msg.author.name, msg.guild_id
                );
                if let Err(e) = handlers::dispatch(&ctx, &msg, self, command).await {
                    error!("Error manejando comando: {e:?}");
                    let _ = msg
                        .reply(&ctx.http, "❌ Hubo un error ejecutando ese comando")
                        .await;
                }
            }
            ParseOutcome::MissingArgument(usage) => {
                let _ = msg
                    .reply(
                        &ctx.http,
                        format!("Uso: `{}{}`", self.config.command_prefix, usage),
                    )
                    .await;
            }
            ParseOutcome::Unknown(name) => {
                let _ = msg
                    .reply(
                        &ctx.http,
                        format!(
                            "Comando desconocido: `{name}`. Usa `{}help` para ver la lista",
                            self.config.command_prefix
                        ),
                    )
                    .await;
            }
        }
    }

    /// Si echan al bot del canal de voz a mano, su sesión se desconecta
    /// para no dejar colas ni conexiones huérfanas
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let current_user_id = ctx.cache.current_user().id;
        if new.user_id != current_user_id {
            return;
        }

        if old.is_some() && new.channel_id.is_none() {
            if let Some(guild_id) = new.guild_id {
                warn!("🔌 Bot desconectado del canal de voz en guild {}", guild_id);
                self.player.disconnect(guild_id).await;
            }
        }
    }
}
