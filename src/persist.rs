use std::collections::HashMap;
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{Context, anyhow};
use flume::{Receiver, RecvTimeoutError, Sender};
use log::{debug, error};

use crate::location::LocationToken;
use crate::position_store::PositionStore;

enum PersistCommand {
    Store {
        key: String,
        location: LocationToken,
    },
    Load {
        key: String,
        reply: Sender<anyhow::Result<Option<LocationToken>>>,
    },
    Flush(Sender<()>),
    Shutdown,
}

/// Handle to the background persistence thread.
///
/// The view thread never touches storage directly. Writes are sent to a
/// dedicated thread which drains everything queued so far and keeps only the
/// newest token per key before writing, so a burst of scroll events costs one
/// write.
pub struct PositionWriter {
    tx: Sender<PersistCommand>,
    worker: Option<JoinHandle<()>>,
}

impl PositionWriter {
    pub fn spawn(store: Box<dyn PositionStore>) -> anyhow::Result<Self> {
        let (tx, rx) = flume::unbounded();
        let worker = std::thread::Builder::new()
            .name("position-writer".to_string())
            .spawn(move || run_writer_loop(store, rx))
            .context("spawning position writer thread")?;
        Ok(Self {
            tx,
            worker: Some(worker),
        })
    }

    /// Queue a write. Failures are logged, never returned.
    pub fn persist(&self, key: &str, location: &LocationToken) {
        let command = PersistCommand::Store {
            key: key.to_string(),
            location: location.clone(),
        };
        if self.tx.send(command).is_err() {
            error!("Position writer is gone, dropping position for {key}");
        }
    }

    /// Read a stored position, waiting at most `timeout`.
    pub fn load(&self, key: &str, timeout: Duration) -> anyhow::Result<Option<LocationToken>> {
        let (reply, response) = flume::bounded(1);
        self.tx
            .send(PersistCommand::Load {
                key: key.to_string(),
                reply,
            })
            .map_err(|_| anyhow!("position writer is not running"))?;
        match response.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                Err(anyhow!("position store did not answer within {timeout:?}"))
            }
            Err(RecvTimeoutError::Disconnected) => Err(anyhow!("position writer stopped")),
        }
    }

    /// Block until every write queued before this call has reached the store.
    pub fn flush(&self) -> anyhow::Result<()> {
        let (ack, done) = flume::bounded(1);
        self.tx
            .send(PersistCommand::Flush(ack))
            .map_err(|_| anyhow!("position writer is not running"))?;
        done.recv().map_err(|_| anyhow!("position writer stopped"))
    }

    /// Stop the thread after it has written everything queued, and wait for it.
    pub fn shutdown(mut self) {
        let _ = self.tx.send(PersistCommand::Shutdown);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("Position writer thread panicked");
            }
        }
    }
}

impl Drop for PositionWriter {
    fn drop(&mut self) {
        // Not joined: a write in flight finishes on its own.
        let _ = self.tx.send(PersistCommand::Shutdown);
    }
}

fn run_writer_loop(mut store: Box<dyn PositionStore>, rx: Receiver<PersistCommand>) {
    let mut pending: HashMap<String, LocationToken> = HashMap::new();

    while let Ok(first) = rx.recv() {
        let mut stop = false;
        for command in std::iter::once(first).chain(rx.try_iter()) {
            match command {
                PersistCommand::Store { key, location } => {
                    pending.insert(key, location);
                }
                PersistCommand::Load { key, reply } => {
                    write_pending(store.as_mut(), &mut pending);
                    let _ = reply.send(store.load(&key));
                }
                PersistCommand::Flush(ack) => {
                    write_pending(store.as_mut(), &mut pending);
                    let _ = ack.send(());
                }
                PersistCommand::Shutdown => {
                    stop = true;
                    break;
                }
            }
        }
        write_pending(store.as_mut(), &mut pending);
        if stop {
            break;
        }
    }
    debug!("Position writer stopped");
}

fn write_pending(store: &mut dyn PositionStore, pending: &mut HashMap<String, LocationToken>) {
    for (key, location) in pending.drain() {
        match store.store(&key, &location) {
            Ok(()) => debug!("Persisted {key} = {location}"),
            Err(e) => error!("Failed to persist position for {key}: {e:#}"),
        }
    }
}
