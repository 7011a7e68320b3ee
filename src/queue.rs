use tokio::sync::mpsc;

/// Creates the pending-send queue: an unbounded FIFO with a single consumer (the drain loop).
pub fn pending_send_queue() -> (PendingSender, PendingReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (PendingSender { tx }, PendingReceiver { rx })
}

#[derive(Debug, Clone)]
pub struct PendingSender {
    tx: mpsc::UnboundedSender<String>,
}

impl PendingSender {
    /// Appends to the tail. Never blocks and never rejects; a payload enqueued after the drain
    /// loop is gone is dropped with a warning.
    pub fn enqueue(&self, payload: String) {
        if let Err(mpsc::error::SendError(payload)) = self.tx.send(payload) {
            tracing::warn!(%payload, "drain loop is gone, dropping payload");
        }
    }
}

#[derive(Debug)]
pub struct PendingReceiver {
    rx: mpsc::UnboundedReceiver<String>,
}

impl PendingReceiver {
    /// Pops the head, waiting while the queue is empty. `None` once every sender is dropped.
    pub async fn dequeue(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
