use serenity::model::id::{ChannelId, GuildId};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::driver::{StreamEnded, StreamToken, VoiceDriver};
use super::queue::TrackQueue;
use super::registry::SessionRegistry;
use super::{ChannelNotifier, PlayError, PlayOutcome, QueueSnapshot, SkipOutcome};
use crate::sources::TrackDescriptor;

/// Estados del ciclo de vida de la conexión de voz de un guild
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    /// Sin conexión de voz
    Idle,
    /// Estableciendo la conexión
    Connecting,
    /// Streaming activo de la pista actual
    Playing,
    /// Transitorio: avanzando la cola tras el fin de un stream
    Advancing,
    /// Cerrando; la tarea termina al salir de este estado
    Disconnecting,
}

/// Mensajes que acepta la sesión. Cada uno se procesa entero antes del
/// siguiente: el buzón serializado es el token de exclusión del guild.
pub(crate) enum SessionCommand {
    Play {
        track: TrackDescriptor,
        reply: oneshot::Sender<Result<PlayOutcome, PlayError>>,
    },
    Skip {
        reply: oneshot::Sender<SkipOutcome>,
    },
    Disconnect {
        reply: oneshot::Sender<()>,
    },
    Queue {
        reply: oneshot::Sender<QueueSnapshot>,
    },
    NowPlaying {
        reply: oneshot::Sender<Option<TrackDescriptor>>,
    },
}

/// Acceso clonable a una sesión viva. Si la sesión ya terminó, cada
/// operación degrada a "sesión cerrada" en vez de fallar fuerte: una
/// petición que llega tarde se descarta sin tocar estado ajeno.
#[derive(Clone)]
pub struct SessionHandle {
    session_id: u64,
    tx: mpsc::UnboundedSender<SessionCommand>,
}

impl SessionHandle {
    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    pub async fn play(&self, track: TrackDescriptor) -> Result<PlayOutcome, PlayError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(SessionCommand::Play { track, reply })
            .map_err(|_| PlayError::SessionClosed)?;
        rx.await.map_err(|_| PlayError::SessionClosed)?
    }

    /// `None` cuando la sesión ya no existe
    pub async fn skip(&self) -> Option<SkipOutcome> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(SessionCommand::Skip { reply }).ok()?;
        rx.await.ok()
    }

    pub async fn disconnect(&self) {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(SessionCommand::Disconnect { reply }).is_ok() {
            let _ = rx.await;
        }
    }

    pub async fn queue_snapshot(&self) -> Option<QueueSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(SessionCommand::Queue { reply }).ok()?;
        rx.await.ok()
    }

    pub async fn now_playing(&self) -> Option<TrackDescriptor> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(SessionCommand::NowPlaying { reply }).ok()?;
        rx.await.ok().flatten()
    }
}

/// Todo lo que necesita una sesión nueva
pub(crate) struct SessionContext {
    pub guild_id: GuildId,
    pub text_channel: ChannelId,
    pub voice_channel: ChannelId,
    pub max_queue_size: usize,
    pub driver: Arc<dyn VoiceDriver>,
    pub notifier: Arc<dyn ChannelNotifier>,
    pub registry: Arc<SessionRegistry>,
}

/// Arranca la tarea de la sesión y devuelve su handle
pub(crate) fn spawn(context: SessionContext, session_id: u64) -> SessionHandle {
    let (tx, inbox) = mpsc::unbounded_channel();
    let (signals_tx, signals_rx) = mpsc::unbounded_channel();

    let session = GuildSession {
        guild_id: context.guild_id,
        session_id,
        text_channel: context.text_channel,
        voice_channel: context.voice_channel,
        queue: TrackQueue::new(context.max_queue_size),
        state: SessionState::Idle,
        current_token: None,
        inbox,
        signals_rx,
        signals_tx,
        driver: context.driver,
        notifier: context.notifier,
        registry: context.registry,
    };

    tokio::spawn(session.run());

    SessionHandle { session_id, tx }
}

struct GuildSession {
    guild_id: GuildId,
    session_id: u64,
    text_channel: ChannelId,
    voice_channel: ChannelId,
    queue: TrackQueue,
    state: SessionState,
    /// Token del stream vivo; las señales con otro token son obsoletas
    current_token: Option<StreamToken>,
    inbox: mpsc::UnboundedReceiver<SessionCommand>,
    signals_rx: mpsc::UnboundedReceiver<StreamEnded>,
    signals_tx: mpsc::UnboundedSender<StreamEnded>,
    driver: Arc<dyn VoiceDriver>,
    notifier: Arc<dyn ChannelNotifier>,
    registry: Arc<SessionRegistry>,
}

impl GuildSession {
    async fn run(mut self) {
        debug!(
            "🆕 Sesión {} arrancada para guild {}",
            self.session_id, self.guild_id
        );

        loop {
            tokio::select! {
                command = self.inbox.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    // el registro soltó el handle; nadie puede hablarnos ya
                    None => self.state = SessionState::Disconnecting,
                },
                Some(signal) = self.signals_rx.recv() => self.handle_signal(signal).await,
            }

            if self.state == SessionState::Disconnecting {
                break;
            }
        }

        self.teardown().await;
    }

    async fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Play { track, reply } => {
                let title = track.title.clone();
                let position = match self.queue.enqueue(track) {
                    Ok(position) => position,
                    Err(full) => {
                        let _ = reply.send(Err(PlayError::QueueFull(full)));
                        return;
                    }
                };

                if self.state != SessionState::Idle {
                    let _ = reply.send(Ok(PlayOutcome {
                        title,
                        position,
                        started: false,
                    }));
                    return;
                }

                self.state = SessionState::Connecting;
                info!(
                    "🔌 Conectando al canal de voz {} en guild {}",
                    self.voice_channel, self.guild_id
                );

                match self.driver.join(self.guild_id, self.voice_channel).await {
                    Ok(()) => {
                        self.advance().await;
                        let started = self.state == SessionState::Playing;
                        let _ = reply.send(Ok(PlayOutcome {
                            title,
                            position,
                            started,
                        }));
                    }
                    Err(e) => {
                        warn!(
                            "❌ No se pudo conectar a voz en guild {}: {}",
                            self.guild_id, e
                        );
                        let _ = reply.send(Err(PlayError::VoiceJoinFailed {
                            reason: e.reason,
                        }));
                        self.state = SessionState::Disconnecting;
                    }
                }
            }

            SessionCommand::Skip { reply } => match self.queue.peek_current().cloned() {
                None => {
                    let _ = reply.send(SkipOutcome::NothingPlaying);
                }
                Some(current) => {
                    info!("⏭️ Saltando {} en guild {}", current.title, self.guild_id);
                    self.state = SessionState::Advancing;
                    // invalidar el token ANTES de parar: la señal de fin que
                    // induce el stop llega con token viejo y se descarta, así
                    // el salto avanza la cola exactamente una posición
                    self.current_token = None;
                    self.driver.stop(self.guild_id).await;
                    self.advance().await;
                    let _ = reply.send(SkipOutcome::Skipped {
                        title: current.title,
                    });
                }
            },

            SessionCommand::Disconnect { reply } => {
                info!("👋 Desconexión solicitada en guild {}", self.guild_id);
                self.queue.clear();
                self.current_token = None;
                self.driver.stop(self.guild_id).await;
                self.state = SessionState::Disconnecting;
                let _ = reply.send(());
            }

            SessionCommand::Queue { reply } => {
                let _ = reply.send(QueueSnapshot {
                    current: self.queue.peek_current().cloned(),
                    pending: self.queue.pending().cloned().collect(),
                });
            }

            SessionCommand::NowPlaying { reply } => {
                let _ = reply.send(self.queue.peek_current().cloned());
            }
        }
    }

    async fn handle_signal(&mut self, signal: StreamEnded) {
        if self.current_token != Some(signal.token) {
            debug!(
                "Señal de stream obsoleta descartada en guild {}",
                self.guild_id
            );
            return;
        }

        self.state = SessionState::Advancing;
        self.current_token = None;

        if let Some(reason) = signal.error {
            let title = self
                .queue
                .peek_current()
                .map(|t| t.title.clone())
                .unwrap_or_else(|| "pista desconocida".to_string());
            warn!(
                "❌ Stream falló en guild {}: {} ({})",
                self.guild_id, title, reason
            );
            self.notifier
                .notify(
                    self.text_channel,
                    format!("⚠️ Falló la reproducción de **{title}**, sigo con la cola"),
                )
                .await;
        }

        self.advance().await;
    }

    /// Saca la siguiente pista y arranca su stream. Una pista cuyo stream
    /// no arranca se avisa y se salta; con la cola vacía la sesión pasa a
    /// desconectarse. Nunca se queda avanzando indefinidamente.
    async fn advance(&mut self) {
        self.state = SessionState::Advancing;

        loop {
            let Some(track) = self.queue.pop_next() else {
                info!("📭 Cola vacía en guild {}, desconectando", self.guild_id);
                self.state = SessionState::Disconnecting;
                return;
            };

            match self
                .driver
                .start(self.guild_id, &track, self.signals_tx.clone())
                .await
            {
                Ok(token) => {
                    info!("🎵 Reproduciendo {} en guild {}", track.title, self.guild_id);
                    self.current_token = Some(token);
                    self.state = SessionState::Playing;
                    return;
                }
                Err(e) => {
                    warn!(
                        "❌ No se pudo iniciar {} en guild {}: {}",
                        track.title, self.guild_id, e
                    );
                    self.notifier
                        .notify(
                            self.text_channel,
                            format!(
                                "⚠️ No se pudo reproducir **{}**, sigo con la cola",
                                track.title
                            ),
                        )
                        .await;
                }
            }
        }
    }

    async fn teardown(mut self) {
        // cerrar el buzón primero: cualquier petición que llegue a partir
        // de aquí ve una sesión cerrada y su resultado se descarta
        self.inbox.close();

        // liberación best-effort: el teardown continúa aunque el cierre falle
        if let Err(e) = self.driver.leave(self.guild_id).await {
            warn!(
                "⚠️ Error al cerrar la conexión de voz en guild {}: {}",
                self.guild_id, e
            );
        }

        // responder lo que quedara encolado para no dejar llamadores colgados
        while let Ok(command) = self.inbox.try_recv() {
            reject(command);
        }

        // la entrada del registro guarda la conexión de voz del guild: solo
        // se suelta cuando ya está liberada, así nunca conviven dos
        self.registry.remove_session(self.guild_id, self.session_id);

        info!(
            "🗑️ Sesión {} terminada en guild {}",
            self.session_id, self.guild_id
        );
    }
}

/// Respuesta para comandos que llegan a una sesión ya terminada
fn reject(command: SessionCommand) {
    match command {
        SessionCommand::Play { reply, .. } => {
            let _ = reply.send(Err(PlayError::SessionClosed));
        }
        SessionCommand::Skip { reply } => {
            let _ = reply.send(SkipOutcome::NothingPlaying);
        }
        SessionCommand::Disconnect { reply } => {
            let _ = reply.send(());
        }
        SessionCommand::Queue { reply } => drop(reply),
        SessionCommand::NowPlaying { reply } => {
            let _ = reply.send(None);
        }
    }
}

#[cfg(test)]
impl SessionHandle {
    /// Handle sin tarea detrás, para tests del registro
    pub(crate) fn detached(session_id: u64) -> Self {
        let (tx, _rx) = mpsc::unbounded_channel();
        Self { session_id, tx }
    }
}
