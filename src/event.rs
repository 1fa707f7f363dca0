use std::path::PathBuf;

use tokio::sync::mpsc;

use crate::error::{AppError, Result};
use crate::fs::navigator::DeleteProgress;

/// Application events.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Filesystem change detected by watcher.
    FsChange(Vec<PathBuf>),
    /// Progress update from a running delete.
    DeleteProgress(DeleteProgress),
    /// Stop the event loop.
    Shutdown,
}

/// Channel that collects events from the watcher, delete tasks and signal
/// handlers.
pub struct EventHandler {
    rx: mpsc::UnboundedReceiver<Event>,
    tx: mpsc::UnboundedSender<Event>,
}

impl Default for EventHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHandler {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { rx, tx }
    }

    /// Get a sender clone for async tasks to send events.
    pub fn sender(&self) -> mpsc::UnboundedSender<Event> {
        self.tx.clone()
    }

    /// Receive the next event (waits until available).
    pub async fn next(&mut self) -> Result<Event> {
        self.rx
            .recv()
            .await
            .ok_or(AppError::ChannelClosed)
    }

    /// Next event if one is already queued.
    pub fn try_next(&mut self) -> Option<Event> {
        self.rx.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_arrive_in_order() {
        let mut events = EventHandler::new();
        let tx = events.sender();
        tx.send(Event::FsChange(vec![PathBuf::from("/tmp/a")])).unwrap();
        tx.send(Event::Shutdown).unwrap();

        assert_eq!(
            events.next().await.unwrap(),
            Event::FsChange(vec![PathBuf::from("/tmp/a")])
        );
        assert_eq!(events.next().await.unwrap(), Event::Shutdown);
        assert_eq!(events.try_next(), None);
    }
}
