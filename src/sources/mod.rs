pub mod ytdlp;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serenity::model::id::UserId;
use std::time::Duration;
use thiserror::Error;

pub use ytdlp::YtDlpResolver;

/// Pista resuelta y lista para reproducir. Inmutable una vez creada.
#[derive(Debug, Clone)]
pub struct TrackDescriptor {
    /// URL (o localizador) que el driver de audio sabe convertir en stream
    pub stream_locator: String,
    pub title: String,
    pub duration: Option<Duration>,
    pub requested_by: UserId,
    pub added_at: DateTime<Utc>,
}

impl TrackDescriptor {
    pub fn new(
        stream_locator: String,
        title: String,
        duration: Option<Duration>,
        requested_by: UserId,
    ) -> Self {
        Self {
            stream_locator,
            title,
            duration,
            requested_by,
            added_at: Utc::now(),
        }
    }
}

/// Errores al resolver una búsqueda o URL a una fuente reproducible
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("no se encontró nada para esa búsqueda")]
    NotFound,
    #[error("fallo de red al resolver la fuente: {0}")]
    NetworkFailure(String),
    #[error("fuente no soportada: {0}")]
    Unsupported(String),
}

/// Resuelve texto libre o una URL a un `TrackDescriptor`.
///
/// Es el único punto de contacto con el servicio de búsqueda externo: puede
/// ser lento (I/O de red) y fallar de forma transitoria, por lo que siempre
/// se invoca fuera de la sección crítica de la sesión.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SourceResolver: Send + Sync {
    async fn resolve(
        &self,
        query: &str,
        requested_by: UserId,
    ) -> Result<TrackDescriptor, ResolveError>;
}
