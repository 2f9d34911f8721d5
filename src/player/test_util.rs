//! Dobles de prueba compartidos por los tests del reproductor.

use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId, UserId};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

use super::driver::{DriverError, StreamEnded, StreamToken, VoiceDriver, VoiceJoinError};
use super::ChannelNotifier;
use crate::sources::TrackDescriptor;

pub(crate) fn guild() -> GuildId {
    GuildId::new(7)
}

pub(crate) fn user() -> UserId {
    UserId::new(9)
}

pub(crate) fn text_channel() -> ChannelId {
    ChannelId::new(11)
}

pub(crate) fn voice_channel() -> ChannelId {
    ChannelId::new(13)
}

pub(crate) fn test_track(title: &str) -> TrackDescriptor {
    TrackDescriptor::new(
        format!("https://example.com/{title}"),
        title.to_string(),
        Some(Duration::from_secs(180)),
        user(),
    )
}

/// Espera activa con timeout para condiciones que dependen de la tarea
/// de la sesión
pub(crate) async fn wait_until<F>(condition: F)
where
    F: Fn() -> bool,
{
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("la condición esperada no se alcanzó a tiempo");
}

struct FakeStream {
    title: String,
    token: StreamToken,
    signals: mpsc::UnboundedSender<StreamEnded>,
}

/// Driver de voz controlable: registra llamadas y deja disparar las
/// señales de fin/error a mano, igual que haría el motor real.
pub(crate) struct FakeDriver {
    join_error: Mutex<Option<String>>,
    fail_starts: Mutex<HashSet<String>>,
    fail_leave: AtomicBool,
    attempts: Mutex<Vec<String>>,
    streams: Mutex<Vec<FakeStream>>,
    active: Mutex<Option<usize>>,
    stops: AtomicUsize,
    leaves: AtomicUsize,
}

impl FakeDriver {
    pub(crate) fn arc() -> Arc<Self> {
        Arc::new(Self {
            join_error: Mutex::new(None),
            fail_starts: Mutex::new(HashSet::new()),
            fail_leave: AtomicBool::new(false),
            attempts: Mutex::new(Vec::new()),
            streams: Mutex::new(Vec::new()),
            active: Mutex::new(None),
            stops: AtomicUsize::new(0),
            leaves: AtomicUsize::new(0),
        })
    }

    pub(crate) fn fail_join(&self, reason: &str) {
        *self.join_error.lock().unwrap() = Some(reason.to_string());
    }

    pub(crate) fn fail_start(&self, title: &str) {
        self.fail_starts.lock().unwrap().insert(title.to_string());
    }

    pub(crate) fn fail_leave(&self) {
        self.fail_leave.store(true, Ordering::SeqCst);
    }

    /// Títulos cuyos streams arrancaron con éxito, en orden
    pub(crate) fn started_titles(&self) -> Vec<String> {
        self.streams
            .lock()
            .unwrap()
            .iter()
            .map(|s| s.title.clone())
            .collect()
    }

    /// Todos los intentos de arranque, incluidos los fallidos
    pub(crate) fn attempt_titles(&self) -> Vec<String> {
        self.attempts.lock().unwrap().clone()
    }

    pub(crate) fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub(crate) fn leaves(&self) -> usize {
        self.leaves.load(Ordering::SeqCst)
    }

    /// El stream activo termina con normalidad
    pub(crate) fn finish_active(&self) {
        self.end_active(None);
    }

    /// El stream activo falla a mitad
    pub(crate) fn error_active(&self, reason: &str) {
        self.end_active(Some(reason.to_string()));
    }

    /// Reenvía la señal de fin de un stream ya terminado (duplicado tardío)
    pub(crate) fn resend_signal_for(&self, title: &str) {
        let streams = self.streams.lock().unwrap();
        if let Some(stream) = streams.iter().find(|s| s.title == title) {
            let _ = stream.signals.send(StreamEnded {
                token: stream.token,
                error: None,
            });
        }
    }

    fn end_active(&self, error: Option<String>) {
        let index = self.active.lock().unwrap().take();
        if let Some(index) = index {
            let streams = self.streams.lock().unwrap();
            let stream = &streams[index];
            let _ = stream.signals.send(StreamEnded {
                token: stream.token,
                error,
            });
        }
    }
}

#[async_trait]
impl VoiceDriver for FakeDriver {
    async fn join(&self, _guild_id: GuildId, _channel_id: ChannelId) -> Result<(), VoiceJoinError> {
        match self.join_error.lock().unwrap().clone() {
            Some(reason) => Err(VoiceJoinError { reason }),
            None => Ok(()),
        }
    }

    async fn start(
        &self,
        _guild_id: GuildId,
        track: &TrackDescriptor,
        signals: mpsc::UnboundedSender<StreamEnded>,
    ) -> Result<StreamToken, DriverError> {
        self.attempts.lock().unwrap().push(track.title.clone());
        if self.fail_starts.lock().unwrap().contains(&track.title) {
            return Err(DriverError::StartFailed("fuente no disponible".to_string()));
        }

        let token = StreamToken::next();
        let mut streams = self.streams.lock().unwrap();
        streams.push(FakeStream {
            title: track.title.clone(),
            token,
            signals,
        });
        *self.active.lock().unwrap() = Some(streams.len() - 1);
        Ok(token)
    }

    async fn stop(&self, _guild_id: GuildId) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        // igual que el motor real: parar un stream dispara su señal de fin
        self.end_active(None);
    }

    async fn leave(&self, _guild_id: GuildId) -> Result<(), DriverError> {
        self.leaves.fetch_add(1, Ordering::SeqCst);
        if self.fail_leave.load(Ordering::SeqCst) {
            return Err(DriverError::LeaveFailed("gateway caído".to_string()));
        }
        Ok(())
    }
}

/// Notificador que solo acumula los avisos enviados
#[derive(Default)]
pub(crate) struct RecordingNotifier {
    notices: Mutex<Vec<(ChannelId, String)>>,
}

impl RecordingNotifier {
    pub(crate) fn notices(&self) -> Vec<(ChannelId, String)> {
        self.notices.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChannelNotifier for RecordingNotifier {
    async fn notify(&self, channel: ChannelId, message: String) {
        self.notices.lock().unwrap().push((channel, message));
    }
}
