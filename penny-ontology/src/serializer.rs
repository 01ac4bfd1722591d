//! Per-backend write serializer.
//!
//! Each backend accepts a single writer. Every write for a backend is queued
//! as a [`WriteTicket`] and executed by that backend's worker task strictly
//! in submission order, with at most one write in flight and a minimum
//! pause between one write completing and the next being dispatched.
//! Different backends have independent workers and never wait on each other.

use crate::error::{OntologyError, OntologyResult};
use futures::FutureExt;
use futures::future::BoxFuture;
use penny_types::BackendId;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// A queued write. The job resolves to `false` when its caller had already
/// gone away and nothing was sent.
pub struct WriteTicket {
    pub backend_id: BackendId,
    pub operation: String,
    pub enqueue_time: Instant,
    job: BoxFuture<'static, bool>,
}

impl std::fmt::Debug for WriteTicket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteTicket")
            .field("backend_id", &self.backend_id)
            .field("operation", &self.operation)
            .field("enqueue_time", &self.enqueue_time)
            .finish_non_exhaustive()
    }
}

struct BackendQueue {
    tx: mpsc::Sender<WriteTicket>,
    handle: JoinHandle<()>,
}

/// Routes writes to one FIFO worker per backend.
pub struct WriteSerializer {
    write_delay: Duration,
    max_queue_depth: usize,
    queues: Mutex<HashMap<BackendId, BackendQueue>>,
    accepting: AtomicBool,
    cancel: watch::Sender<bool>,
}

impl WriteSerializer {
    pub fn new(write_delay: Duration, max_queue_depth: usize) -> Self {
        let (cancel, _) = watch::channel(false);
        Self {
            write_delay,
            max_queue_depth: max_queue_depth.max(1),
            queues: Mutex::new(HashMap::new()),
            accepting: AtomicBool::new(true),
            cancel,
        }
    }

    pub fn write_delay(&self) -> Duration {
        self.write_delay
    }

    /// Queues `write` behind every earlier write for `backend_id` and waits
    /// for its result.
    ///
    /// Fails with [`OntologyError::WriteQueueOverflow`] when the backend's
    /// queue is full, and with [`OntologyError::Cancelled`] when the
    /// serializer shuts down before the write is dispatched.
    pub async fn submit<T, F>(
        &self,
        backend_id: &BackendId,
        operation: &str,
        write: F,
    ) -> OntologyResult<T>
    where
        T: Send + 'static,
        F: Future<Output = OntologyResult<T>> + Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job = async move {
            if reply_tx.is_closed() {
                return false;
            }
            let _ = reply_tx.send(write.await);
            true
        }
        .boxed();

        self.enqueue(WriteTicket {
            backend_id: backend_id.clone(),
            operation: operation.to_string(),
            enqueue_time: Instant::now(),
            job,
        })
        .await?;

        reply_rx.await.map_err(|_| OntologyError::Cancelled)?
    }

    async fn enqueue(&self, ticket: WriteTicket) -> OntologyResult<()> {
        let mut queues = self.queues.lock().await;
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(OntologyError::Cancelled);
        }

        let queue = queues
            .entry(ticket.backend_id.clone())
            .or_insert_with(|| self.spawn_worker(&ticket.backend_id));

        match queue.tx.try_send(ticket) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(ticket)) => {
                warn!(
                    backend = %ticket.backend_id,
                    operation = %ticket.operation,
                    depth = self.max_queue_depth,
                    "Write queue full"
                );
                Err(OntologyError::WriteQueueOverflow {
                    backend: ticket.backend_id,
                    depth: self.max_queue_depth,
                })
            }
            Err(TrySendError::Closed(_)) => Err(OntologyError::Cancelled),
        }
    }

    fn spawn_worker(&self, backend_id: &BackendId) -> BackendQueue {
        let (tx, rx) = mpsc::channel(self.max_queue_depth);
        debug!(backend = %backend_id, "Starting write worker");
        let handle = tokio::spawn(run_worker(
            backend_id.clone(),
            rx,
            self.write_delay,
            self.cancel.subscribe(),
        ));
        BackendQueue { tx, handle }
    }

    /// Writes waiting in `backend_id`'s queue, not counting one in flight.
    pub async fn pending_writes(&self, backend_id: &BackendId) -> usize {
        self.queues
            .lock()
            .await
            .get(backend_id)
            .map(|q| q.tx.max_capacity() - q.tx.capacity())
            .unwrap_or(0)
    }

    /// Stops accepting writes and drains every queue.
    ///
    /// Queued writes keep running until `drain_timeout` elapses. After that
    /// the write in flight on each backend finishes, and every ticket still
    /// queued is dropped, its caller receiving [`OntologyError::Cancelled`].
    /// Returns true when everything drained in time.
    pub async fn shutdown(&self, drain_timeout: Duration) -> bool {
        let handles: Vec<JoinHandle<()>> = {
            let mut queues = self.queues.lock().await;
            self.accepting.store(false, Ordering::SeqCst);
            queues.drain().map(|(_, queue)| queue.handle).collect()
        };
        if handles.is_empty() {
            return true;
        }

        info!(backends = handles.len(), "Draining write queues");
        let mut joined = Box::pin(futures::future::join_all(handles));
        match tokio::time::timeout(drain_timeout, joined.as_mut()).await {
            Ok(_) => {
                info!("Write queues drained");
                true
            }
            Err(_) => {
                warn!(
                    timeout_ms = drain_timeout.as_millis() as u64,
                    "Drain timed out, cancelling queued writes"
                );
                let _ = self.cancel.send(true);
                joined.await;
                false
            }
        }
    }
}

async fn wait_cancelled(cancel: &mut watch::Receiver<bool>) {
    if cancel.wait_for(|cancelled| *cancelled).await.is_err() {
        std::future::pending::<()>().await;
    }
}

async fn run_worker(
    backend_id: BackendId,
    mut rx: mpsc::Receiver<WriteTicket>,
    write_delay: Duration,
    mut cancel: watch::Receiver<bool>,
) {
    let mut last_completed: Option<Instant> = None;

    loop {
        let ticket = tokio::select! {
            biased;
            _ = wait_cancelled(&mut cancel) => break,
            ticket = rx.recv() => match ticket {
                Some(ticket) => ticket,
                None => break,
            },
        };

        if let Some(done) = last_completed {
            let ready_at = done + write_delay;
            if Instant::now() < ready_at {
                tokio::select! {
                    biased;
                    _ = wait_cancelled(&mut cancel) => break,
                    _ = tokio::time::sleep_until(ready_at) => {}
                }
            }
        }

        let WriteTicket {
            operation,
            enqueue_time,
            job,
            ..
        } = ticket;
        debug!(
            backend = %backend_id,
            operation = %operation,
            queued_ms = enqueue_time.elapsed().as_millis() as u64,
            "Dispatching write"
        );
        if job.await {
            last_completed = Some(Instant::now());
        } else {
            debug!(backend = %backend_id, operation = %operation, "Caller gone, write skipped");
        }
    }

    rx.close();
    let mut dropped = 0usize;
    while rx.try_recv().is_ok() {
        dropped += 1;
    }
    if dropped > 0 {
        warn!(backend = %backend_id, dropped, "Dropped queued writes");
    }
    debug!(backend = %backend_id, "Write worker stopped");
}
