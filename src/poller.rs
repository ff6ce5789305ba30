//! Background refresh of one collection.
//!
//! The poller thread only fetches and decodes. Results travel over a channel
//! and are applied by the owner of the store with
//! [`EntityStore::apply_fetched`](crate::store::EntityStore::apply_fetched),
//! so the store itself never leaves the UI thread.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::Result;
use crate::gateway::client::{Gateway, Query};
use crate::store::{decode, Entity};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);

/// Sleep granularity, so `stop` is noticed well before a long interval ends.
const TICK: Duration = Duration::from_millis(50);

pub struct Poller<E: Entity> {
    stop: Arc<AtomicBool>,
    rx: Receiver<Result<Vec<E>>>,
    handle: Option<JoinHandle<()>>,
    _entity: PhantomData<E>,
}

impl<E: Entity> Poller<E> {
    /// Fetch `E::COLLECTION` now and then every `interval` until stopped.
    pub fn start(gateway: Arc<dyn Gateway>, interval: Duration) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel();
        let flag = Arc::clone(&stop);

        let handle = thread::spawn(move || {
            debug!(collection = E::COLLECTION, ?interval, "poller started");
            while !flag.load(Ordering::Relaxed) {
                let result = gateway.get(E::COLLECTION, &Query::new()).and_then(decode::<Vec<E>>);
                if let Err(e) = &result {
                    warn!(collection = E::COLLECTION, "poll failed: {e}");
                }
                if tx.send(result).is_err() {
                    // Receiver gone.
                    break;
                }
                let mut waited = Duration::ZERO;
                while waited < interval && !flag.load(Ordering::Relaxed) {
                    let step = TICK.min(interval - waited);
                    thread::sleep(step);
                    waited += step;
                }
            }
            debug!(collection = E::COLLECTION, "poller stopped");
        });

        Self { stop, rx, handle: Some(handle), _entity: PhantomData }
    }

    /// Next pending result, if one has arrived.
    pub fn try_recv(&self) -> Option<Result<Vec<E>>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Block up to `timeout` for the next result.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<Result<Vec<E>>> {
        self.rx.recv_timeout(timeout).ok()
    }

    /// Everything that has arrived since the last drain, oldest first.
    pub fn drain(&self) -> Vec<Result<Vec<E>>> {
        self.rx.try_iter().collect()
    }

    /// Prevent further iterations. An in-flight request still completes.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some() && !self.stop.load(Ordering::Relaxed)
    }
}

impl<E: Entity> Drop for Poller<E> {
    fn drop(&mut self) {
        self.stop();
    }
}
