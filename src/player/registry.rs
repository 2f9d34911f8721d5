use dashmap::DashMap;
use serenity::model::id::GuildId;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

use super::session::SessionHandle;

/// Registro de sesiones vivas: a lo sumo una por guild.
///
/// Es estado de proceso pero no un singleton: se construye vacío en el
/// arranque y se inyecta por `Arc` a quien lo necesite. Las entradas solo
/// entran y salen por `get_or_create` y `remove_session`.
pub struct SessionRegistry {
    sessions: DashMap<GuildId, SessionHandle>,
    next_session_id: AtomicU64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
            next_session_id: AtomicU64::new(1),
        }
    }

    pub fn get(&self, guild_id: GuildId) -> Option<SessionHandle> {
        self.sessions.get(&guild_id).map(|entry| entry.clone())
    }

    /// Devuelve la sesión del guild o la construye atómicamente con
    /// `factory`. Dos llamadas concurrentes para el mismo guild observan
    /// exactamente una sesión: la perdedora adopta en silencio la de la
    /// ganadora.
    pub fn get_or_create<F>(&self, guild_id: GuildId, factory: F) -> SessionHandle
    where
        F: FnOnce(u64) -> SessionHandle,
    {
        self.sessions
            .entry(guild_id)
            .or_insert_with(|| {
                let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
                debug!("🆕 Creando sesión {} para guild {}", session_id, guild_id);
                factory(session_id)
            })
            .clone()
    }

    /// Quita la entrada solo si sigue perteneciendo a `session_id`: una
    /// sesión moribunda nunca borra a su sucesora. Llamar de más es
    /// inocuo; la ausencia no es un error.
    pub fn remove_session(&self, guild_id: GuildId, session_id: u64) {
        self.sessions
            .remove_if(&guild_id, |_, session| session.session_id() == session_id);
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Desconecta todas las sesiones vivas (apagado del proceso). Cada
    /// sesión hace su propio teardown best-effort y se borra sola; se
    /// espera a que terminen, con un tope por si alguna se atasca.
    pub async fn shutdown_all(&self) {
        let handles: Vec<SessionHandle> = self
            .sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        if handles.is_empty() {
            return;
        }

        info!("🛑 Desconectando {} sesión(es) de voz activa(s)", handles.len());
        for handle in handles {
            handle.disconnect().await;
        }

        let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(2);
        while !self.sessions.is_empty() && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    fn guild() -> GuildId {
        GuildId::new(5)
    }

    #[tokio::test]
    async fn test_concurrent_get_or_create_builds_exactly_one_session() {
        let registry = Arc::new(SessionRegistry::new());
        let created = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(tokio::sync::Barrier::new(16));

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let registry = registry.clone();
            let created = created.clone();
            let barrier = barrier.clone();
            tasks.push(tokio::spawn(async move {
                barrier.wait().await;
                registry
                    .get_or_create(guild(), |session_id| {
                        created.fetch_add(1, Ordering::SeqCst);
                        SessionHandle::detached(session_id)
                    })
                    .session_id()
            }));
        }

        let mut observed = Vec::new();
        for task in tasks {
            observed.push(task.await.unwrap());
        }

        assert_eq!(created.load(Ordering::SeqCst), 1);
        assert!(observed.iter().all(|&id| id == observed[0]));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_is_idempotent_and_successor_safe() {
        let registry = SessionRegistry::new();
        let handle = registry.get_or_create(guild(), SessionHandle::detached);
        let session_id = handle.session_id();

        // un id ajeno no borra la entrada actual
        registry.remove_session(guild(), session_id + 100);
        assert_eq!(registry.len(), 1);

        registry.remove_session(guild(), session_id);
        assert!(registry.get(guild()).is_none());

        // redundante: sin pánico ni error
        registry.remove_session(guild(), session_id);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_get_or_create_after_remove_builds_fresh_session() {
        let registry = SessionRegistry::new();
        let first = registry.get_or_create(guild(), SessionHandle::detached);
        registry.remove_session(guild(), first.session_id());

        let second = registry.get_or_create(guild(), SessionHandle::detached);
        assert_ne!(first.session_id(), second.session_id());
    }
}
