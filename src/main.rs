use anyhow::Result;
use serenity::{model::gateway::GatewayIntents, Client};
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tracing::{error, info};

mod bot;
mod chat;
mod config;
mod player;
mod sources;
mod ui;

use crate::bot::{ChatFeature, OndaBot};
use crate::chat::{ChatManager, GroqClient};
use crate::config::Config;
use crate::player::registry::SessionRegistry;
use crate::player::voice::{SerenityNotifier, SongbirdDriver};
use crate::player::PlayerService;
use crate::sources::YtDlpResolver;

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("onda_music=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎶 Iniciando Onda Music v{}", env!("CARGO_PKG_VERSION"));

    // Manejar health check si es necesario
    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check().await;
    }

    // Cargar configuración
    let config = Config::load()?;

    // Configurar intents mínimos necesarios
    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_VOICE_STATES
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    // Un único Songbird compartido entre serenity y el driver de voz
    let songbird = Songbird::serenity();
    let http_client = reqwest::Client::new();

    // Componentes del reproductor: registro vacío al arrancar, inyectado
    // por referencia a quien lo necesite
    let registry = Arc::new(SessionRegistry::new());
    let driver = Arc::new(SongbirdDriver::new(songbird.clone(), http_client));
    let resolver = Arc::new(YtDlpResolver::new());
    let notifier = Arc::new(SerenityNotifier::new(Arc::new(serenity::http::Http::new(
        &config.discord_token,
    ))));
    let player = Arc::new(PlayerService::new(
        registry.clone(),
        resolver,
        driver,
        notifier,
        config.max_queue_size,
    ));

    let chat = build_chat_feature(&config)?;

    let handler = OndaBot::new(Arc::new(config.clone()), player, chat);

    // Construir cliente
    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird_with(songbird.clone())
        .await?;

    // Apagado ordenado: desconectar todas las sesiones antes de salir
    {
        let registry = registry.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c()
                .await
                .expect("Error al registrar Ctrl+C");
            info!("⚠️ Señal de apagado recibida, cerrando...");
            registry.shutdown_all().await;
            std::process::exit(0);
        });
    }

    // Iniciar bot
    info!("🚀 Bot iniciado exitosamente");
    if let Err(why) = client.start().await {
        error!("Error al ejecutar cliente: {:?}", why);
    }

    Ok(())
}

fn build_chat_feature(config: &Config) -> Result<Option<Arc<ChatFeature>>> {
    let Some(api_key) = config.groq_api_key.clone() else {
        info!("💬 Chat IA deshabilitado (sin GROQ_API_KEY)");
        return Ok(None);
    };

    let client = GroqClient::new(api_key, config.groq_model.clone())?;
    let manager = ChatManager::new(config.chat_history_size);
    info!("💬 Chat IA habilitado con modelo {}", config.groq_model);

    Ok(Some(Arc::new(ChatFeature { manager, client })))
}

async fn health_check() -> Result<()> {
    // Verificar dependencias críticas
    let yt_dlp = async_process::Command::new("yt-dlp")
        .arg("--version")
        .output()
        .await?;

    if yt_dlp.status.success() {
        println!("OK");
        Ok(())
    } else {
        anyhow::bail!("yt-dlp no disponible");
    }
}
