//! Per-user connection pooling.
//!
//! The pool maps each username to at most one live backend connection,
//! created with the password recovered from that user's credential
//! envelope. Entries are refreshed on reuse, reclaimed by a periodic sweep
//! once idle past the TTL, and closed exactly once.
//!
//! Locking is per user: the shared map lock is only ever held to look up or
//! insert a slot, while a per-slot gate serializes connect/close for one
//! username. A slow reconnect for one user therefore never stalls lookups
//! for another.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{watch, Mutex as AsyncMutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant};
use tracing::{debug, warn};

use mediasync_common::{Error, Result};

use crate::backend::{Connection, StorageBackend};

/// One username's pool slot.
///
/// The `gate` serializes connect, close, and removal for this username;
/// `state` is a cheap sync lock that is never held across an await point.
struct Slot {
    gate: AsyncMutex<()>,
    state: Mutex<SlotState>,
}

struct SlotState {
    conn: Option<Arc<Connection>>,
    last_used: Instant,
}

/// Outcome of a sweep inspection.
enum SweepVerdict {
    Fresh,
    Empty,
    Stale(Arc<Connection>),
}

impl Slot {
    fn new() -> Self {
        Self {
            gate: AsyncMutex::new(()),
            state: Mutex::new(SlotState {
                conn: None,
                last_used: Instant::now(),
            }),
        }
    }

    /// Return the connection if it is fresh, refreshing its timestamp.
    ///
    /// A non-fresh entry is treated as absent even before the sweep has
    /// physically removed it.
    fn fresh(&self, ttl: Duration) -> Option<Arc<Connection>> {
        let mut state = self.state.lock().unwrap();
        match state.conn.clone() {
            Some(conn) if state.last_used.elapsed() < ttl => {
                state.last_used = Instant::now();
                Some(conn)
            }
            _ => None,
        }
    }

    /// Remove and return the connection regardless of freshness.
    fn take(&self) -> Option<Arc<Connection>> {
        self.state.lock().unwrap().conn.take()
    }

    /// Remove and return the connection only if it has gone stale.
    fn take_stale(&self, ttl: Duration) -> SweepVerdict {
        let mut state = self.state.lock().unwrap();
        if state.conn.is_none() {
            return SweepVerdict::Empty;
        }
        if state.last_used.elapsed() >= ttl {
            return SweepVerdict::Stale(state.conn.take().expect("checked above"));
        }
        SweepVerdict::Fresh
    }

    fn install(&self, conn: Arc<Connection>) {
        let mut state = self.state.lock().unwrap();
        state.conn = Some(conn);
        state.last_used = Instant::now();
    }
}

struct PoolInner {
    backend: Arc<dyn StorageBackend>,
    ttl: Duration,
    slots: RwLock<HashMap<String, Arc<Slot>>>,
    sealed: AtomicBool,
}

impl PoolInner {
    /// Close a connection, logging rather than propagating failures:
    /// `close` is always best-effort and non-fatal.
    async fn close_connection(&self, conn: &Connection) {
        if let Err(error) = self.backend.close(conn).await {
            warn!(username = conn.username(), %error, "failed to close backend connection");
        }
    }

    /// Remove `slot` from the map if it is still the current slot for
    /// `username`. A newer slot installed after a removal is left alone.
    async fn detach(&self, username: &str, slot: &Arc<Slot>) {
        let mut slots = self.slots.write().await;
        if let Some(current) = slots.get(username) {
            if Arc::ptr_eq(current, slot) {
                slots.remove(username);
            }
        }
    }

    /// One reclamation pass over every slot.
    async fn sweep(&self) {
        let slots: Vec<(String, Arc<Slot>)> = self
            .slots
            .read()
            .await
            .iter()
            .map(|(username, slot)| (username.clone(), slot.clone()))
            .collect();

        for (username, slot) in slots {
            // Same gate as get_connection, so the sweep never races a
            // connect or refresh on this entry.
            let _gate = slot.gate.lock().await;

            match slot.take_stale(self.ttl) {
                SweepVerdict::Fresh => {}
                SweepVerdict::Empty => {
                    self.detach(&username, &slot).await;
                }
                SweepVerdict::Stale(conn) => {
                    self.detach(&username, &slot).await;
                    self.close_connection(&conn).await;
                    debug!(username = %username, "reclaimed idle backend connection");
                }
            }
        }
    }
}

/// Pooled connection manager.
///
/// Holds at most one live [`Connection`] per username, lazily established
/// through the injected backend and reused while fresh. Safe for concurrent
/// use. The reclamation sweep starts with the pool and stops when the pool
/// is closed or dropped.
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
    shutdown_tx: watch::Sender<bool>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionPool {
    /// Create a pool over `backend`.
    ///
    /// Entries idle for `ttl` or longer are stale; the background sweep
    /// reclaims them every `sweep_interval`. Must be called from within a
    /// tokio runtime.
    pub fn new(backend: Arc<dyn StorageBackend>, ttl: Duration, sweep_interval: Duration) -> Self {
        let inner = Arc::new(PoolInner {
            backend,
            ttl,
            slots: RwLock::new(HashMap::new()),
            sealed: AtomicBool::new(false),
        });

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let sweeper = tokio::spawn(sweep_loop(inner.clone(), sweep_interval, shutdown_rx));

        Self {
            inner,
            shutdown_tx,
            sweeper: Mutex::new(Some(sweeper)),
        }
    }

    /// Get a live connection for `username`, connecting if necessary.
    ///
    /// A fresh pooled connection is returned directly with its timestamp
    /// refreshed. Otherwise the per-user gate is taken, freshness is
    /// re-checked (another request may have reconnected in the meantime),
    /// any stale connection is closed, and a new one is established. No two
    /// `connect` calls for the same username are ever in flight at once,
    /// and no connection is closed more than once.
    ///
    /// Connect failures are returned immediately and install nothing; the
    /// pool never retries.
    ///
    /// # Cancellation
    /// Cancel-safe: dropping the future releases the per-user gate, and an
    /// entry is only installed after `connect` completes. A connection that
    /// completes while shutdown is racing is still closed by shutdown's
    /// per-slot pass.
    pub async fn get_connection(&self, username: &str, password: &str) -> Result<Arc<Connection>> {
        loop {
            if self.inner.sealed.load(Ordering::Acquire) {
                return Err(Error::PoolClosed);
            }

            // Optimistic path: shared map lock, per-slot state only.
            let slot = {
                let slots = self.inner.slots.read().await;
                slots.get(username).cloned()
            };

            let slot = match slot {
                Some(slot) => slot,
                None => {
                    let mut slots = self.inner.slots.write().await;
                    slots
                        .entry(username.to_string())
                        .or_insert_with(|| Arc::new(Slot::new()))
                        .clone()
                }
            };

            if let Some(conn) = slot.fresh(self.inner.ttl) {
                return Ok(conn);
            }

            // Slow path: exclusive per-user gate.
            let _gate = slot.gate.lock().await;

            // The sweep may have detached this slot while we waited for
            // the gate; start over on a current slot if so.
            {
                let slots = self.inner.slots.read().await;
                match slots.get(username) {
                    Some(current) if Arc::ptr_eq(current, &slot) => {}
                    _ => continue,
                }
            }

            if self.inner.sealed.load(Ordering::Acquire) {
                return Err(Error::PoolClosed);
            }

            // Double-check: another request may have refreshed or
            // recreated the entry while the gate was being acquired.
            if let Some(conn) = slot.fresh(self.inner.ttl) {
                return Ok(conn);
            }

            // Replace the stale connection, closing it exactly once.
            if let Some(stale) = slot.take() {
                self.inner.close_connection(&stale).await;
            }

            let conn = Arc::new(self.inner.backend.connect(username, password).await?);
            slot.install(conn.clone());

            debug!(username, backend = self.inner.backend.name(), "pooled new backend connection");
            return Ok(conn);
        }
    }

    /// Whether the pool has been shut down.
    pub fn is_closed(&self) -> bool {
        self.inner.sealed.load(Ordering::Acquire)
    }

    /// Shut the pool down.
    ///
    /// Seals the pool (further `get_connection` calls fail fast with
    /// [`Error::PoolClosed`]), stops the sweep, then closes every remaining
    /// connection exactly once. Idempotent.
    pub async fn close(&self) {
        if self.inner.sealed.swap(true, Ordering::AcqRel) {
            return;
        }

        let _ = self.shutdown_tx.send(true);
        let sweeper = self.sweeper.lock().unwrap().take();
        if let Some(handle) = sweeper {
            let _ = handle.await;
        }

        let slots: Vec<Arc<Slot>> = {
            let mut slots = self.inner.slots.write().await;
            slots.drain().map(|(_, slot)| slot).collect()
        };

        for slot in slots {
            // Wait out any in-flight connect so its result is closed
            // rather than leaked.
            let _gate = slot.gate.lock().await;
            if let Some(conn) = slot.take() {
                self.inner.close_connection(&conn).await;
            }
        }

        debug!("connection pool closed");
    }
}

/// Periodic reclamation loop.
///
/// Stops when the pool signals shutdown or is dropped; the sweep never
/// outlives its owner.
async fn sweep_loop(
    inner: Arc<PoolInner>,
    sweep_interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = interval(sweep_interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => inner.sweep().await,
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }

    debug!("connection pool sweeper stopped");
}
