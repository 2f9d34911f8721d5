use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::sources::TrackDescriptor;

/// Identifica un stream arrancado por el driver. Monótono a nivel de
/// proceso: una señal con token viejo delata un stream que ya no es el
/// actual y se descarta en vez de corromper el estado de la sesión.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamToken(u64);

impl StreamToken {
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Señal terminal de un stream: terminó solo o falló a mitad.
/// El driver la emite una única vez por stream arrancado; los duplicados
/// que pueda producir la librería de audio se deduplican por token.
#[derive(Debug, Clone)]
pub struct StreamEnded {
    pub token: StreamToken,
    pub error: Option<String>,
}

/// No se pudo establecer la conexión de voz (permisos, canal lleno,
/// timeout de red: todos se reportan con una razón descriptiva)
#[derive(Debug, Clone, Error)]
#[error("{reason}")]
pub struct VoiceJoinError {
    pub reason: String,
}

#[derive(Debug, Clone, Error)]
pub enum DriverError {
    #[error("no se pudo iniciar el stream: {0}")]
    StartFailed(String),
    #[error("no se pudo cerrar la conexión de voz: {0}")]
    LeaveFailed(String),
}

/// Motor de audio visto desde la sesión: unirse a voz, arrancar un
/// stream, pararlo y abandonar el canal. La implementación real envuelve
/// songbird; los tests usan un doble.
#[async_trait]
pub trait VoiceDriver: Send + Sync + 'static {
    async fn join(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<(), VoiceJoinError>;

    /// Arranca el streaming de `track`. La señal terminal llegará por
    /// `signals` con el token devuelto.
    async fn start(
        &self,
        guild_id: GuildId,
        track: &TrackDescriptor,
        signals: mpsc::UnboundedSender<StreamEnded>,
    ) -> Result<StreamToken, DriverError>;

    /// Detiene el stream activo del guild, si hay. Parar un stream hace
    /// que el motor emita igualmente su señal de fin.
    async fn stop(&self, guild_id: GuildId);

    async fn leave(&self, guild_id: GuildId) -> Result<(), DriverError>;
}
