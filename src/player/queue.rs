use std::collections::VecDeque;
use thiserror::Error;
use tracing::debug;

use crate::sources::TrackDescriptor;

/// La cola rechaza pistas nuevas al alcanzar su capacidad configurada
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("la cola está llena (máximo {max} pistas)")]
pub struct QueueFull {
    pub max: usize,
}

/// Cola FIFO de un guild: pistas pendientes más la que suena ahora.
///
/// Solo la muta la sesión propietaria, nunca de forma concurrente; el
/// orden de reproducción es estrictamente el orden de llegada.
#[derive(Debug)]
pub struct TrackQueue {
    pending: VecDeque<TrackDescriptor>,
    current: Option<TrackDescriptor>,
    max_size: usize,
}

impl TrackQueue {
    pub fn new(max_size: usize) -> Self {
        Self {
            pending: VecDeque::new(),
            current: None,
            max_size,
        }
    }

    /// Agrega al final y devuelve la posición 1-based entre las pendientes
    pub fn enqueue(&mut self, track: TrackDescriptor) -> Result<usize, QueueFull> {
        if self.pending.len() >= self.max_size {
            return Err(QueueFull { max: self.max_size });
        }
        debug!("➕ En cola: {}", track.title);
        self.pending.push_back(track);
        Ok(self.pending.len())
    }

    /// Saca la cabeza de las pendientes y la deja como actual.
    /// Con la cola vacía limpia `current` y devuelve `None`.
    pub fn pop_next(&mut self) -> Option<TrackDescriptor> {
        match self.pending.pop_front() {
            Some(next) => {
                self.current = Some(next.clone());
                Some(next)
            }
            None => {
                self.current = None;
                None
            }
        }
    }

    pub fn peek_current(&self) -> Option<&TrackDescriptor> {
        self.current.as_ref()
    }

    /// Vacía pendientes y actual (desconexión forzada)
    pub fn clear(&mut self) {
        self.pending.clear();
        self.current = None;
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty() && self.current.is_none()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn pending(&self) -> impl Iterator<Item = &TrackDescriptor> {
        self.pending.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serenity::model::id::UserId;

    fn track(title: &str) -> TrackDescriptor {
        TrackDescriptor::new(
            format!("https://example.com/{title}"),
            title.to_string(),
            None,
            UserId::new(1),
        )
    }

    #[test]
    fn test_enqueue_reports_one_based_positions() {
        let mut queue = TrackQueue::new(10);
        assert_eq!(queue.enqueue(track("a")).unwrap(), 1);
        assert_eq!(queue.enqueue(track("b")).unwrap(), 2);
        assert_eq!(queue.enqueue(track("c")).unwrap(), 3);
    }

    #[test]
    fn test_pop_next_is_fifo() {
        let mut queue = TrackQueue::new(10);
        for title in ["a", "b", "c"] {
            queue.enqueue(track(title)).unwrap();
        }

        let popped: Vec<String> = std::iter::from_fn(|| queue.pop_next())
            .map(|t| t.title)
            .collect();
        assert_eq!(popped, vec!["a", "b", "c"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_pop_next_sets_and_clears_current() {
        let mut queue = TrackQueue::new(10);
        queue.enqueue(track("a")).unwrap();

        assert!(queue.peek_current().is_none());
        queue.pop_next().unwrap();
        assert_eq!(queue.peek_current().unwrap().title, "a");
        assert!(!queue.is_empty());

        assert!(queue.pop_next().is_none());
        assert!(queue.peek_current().is_none());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_enqueue_rejects_when_full() {
        let mut queue = TrackQueue::new(2);
        queue.enqueue(track("a")).unwrap();
        queue.enqueue(track("b")).unwrap();
        assert_eq!(queue.enqueue(track("c")), Err(QueueFull { max: 2 }));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_clear_drops_pending_and_current() {
        let mut queue = TrackQueue::new(10);
        queue.enqueue(track("a")).unwrap();
        queue.enqueue(track("b")).unwrap();
        queue.pop_next().unwrap();

        queue.clear();
        assert!(queue.is_empty());
        assert!(queue.peek_current().is_none());
        assert!(queue.pop_next().is_none());
    }
}
