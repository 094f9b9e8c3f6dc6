use crate::{
    Error, Result,
    pool::{config::PoolConfig, guard::PooledConnection, manager::ManageConnection},
};
use core::sync::atomic::{AtomicU64, Ordering};
use parking_lot::Mutex;
use std::{collections::VecDeque, sync::Arc};
use tokio::{
    sync::{OwnedSemaphorePermit, Semaphore},
    time::{Instant, timeout_at},
};
use tokio_util::sync::CancellationToken;

/// A bounded pool of reusable connections produced by a [`ManageConnection`].
///
/// Cloning a `Pool` is cheap and yields another handle to the same
/// connections.
pub struct Pool<M: ManageConnection> {
    shared: Arc<Shared<M>>,
}

impl<M: ManageConnection> Clone for Pool<M> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

/// Point-in-time view of the pool's bookkeeping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolState {
    /// Configured capacity.
    pub max_size: usize,
    /// Connections that currently exist, idle or checked out.
    pub open: usize,
    /// Connections waiting in the idle set.
    pub idle: usize,
    /// Capacity tokens currently held by callers.
    pub in_use: usize,
}

pub(crate) struct Shared<M: ManageConnection> {
    manager: M,
    config: PoolConfig,
    slots: Arc<Semaphore>,
    inventory: Mutex<Inventory<M::Connection>>,
    next_id: AtomicU64,
}

struct Inventory<C> {
    idle: VecDeque<IdleConnection<C>>,
    /// Idle plus checked-out connections, including ones still being dialed.
    open: usize,
    closed: bool,
}

struct IdleConnection<C> {
    id: u64,
    conn: C,
    since: Instant,
}

enum Checkout<C> {
    Idle(IdleConnection<C>),
    Dial,
}

/// Returns a dial reservation to the pool unless it was fulfilled.
struct Reservation<'a, M: ManageConnection> {
    shared: &'a Shared<M>,
    armed: bool,
}

impl<M: ManageConnection> Drop for Reservation<'_, M> {
    fn drop(&mut self) {
        if self.armed {
            self.shared.inventory.lock().open -= 1;
        }
    }
}

impl<M: ManageConnection> Pool<M> {
    /// Creates a pool and eagerly establishes `config.min_size` connections.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidInput`] if `config` is inconsistent.
    /// - [`Error::Connection`] (or whatever the manager reports) if any of the
    ///   initial connections cannot be established. Connections opened so far
    ///   are dropped.
    pub async fn new(manager: M, config: PoolConfig) -> Result<Self> {
        config.validate()?;

        let shared = Shared {
            manager,
            slots: Arc::new(Semaphore::new(config.max_size)),
            inventory: Mutex::new(Inventory {
                idle: VecDeque::with_capacity(config.max_size),
                open: 0,
                closed: false,
            }),
            next_id: AtomicU64::new(0),
            config,
        };

        let mut warm = VecDeque::with_capacity(shared.config.min_size);
        for _ in 0..shared.config.min_size {
            let conn = shared.manager.connect().await.inspect_err(|e| {
                tracing::error!(error = %e, "failed to establish initial pooled connection");
            })?;
            warm.push_back(IdleConnection {
                id: shared.next_id(),
                conn,
                since: Instant::now(),
            });
        }

        {
            let mut inventory = shared.inventory.lock();
            inventory.open = warm.len();
            inventory.idle = warm;
        }

        tracing::debug!(
            min_size = shared.config.min_size,
            max_size = shared.config.max_size,
            "connection pool ready"
        );

        Ok(Self {
            shared: Arc::new(shared),
        })
    }

    /// Checks out a connection, waiting at most the configured
    /// `acquire_timeout` for one to become available.
    ///
    /// # Errors
    ///
    /// See [`Pool::acquire_until`].
    pub async fn acquire(&self) -> Result<PooledConnection<M>> {
        let deadline = Instant::now() + self.shared.config.acquire_timeout;
        self.acquire_until(deadline, &CancellationToken::new()).await
    }

    /// Checks out a connection that no other caller holds.
    ///
    /// An idle connection is reused when one exists; otherwise a new one is
    /// dialed as long as fewer than `max_size` connections exist. A saturated
    /// pool suspends the caller until a connection is released, `deadline`
    /// passes, or `cancel` fires. Waiters are woken in arrival order.
    ///
    /// Dropping the returned future at any point leaves no slot checked out.
    ///
    /// # Errors
    ///
    /// - [`Error::PoolTimeout`] if `deadline` passes first.
    /// - [`Error::AcquireCancelled`] if `cancel` fires first.
    /// - [`Error::PoolClosed`] if the pool is or becomes closed.
    /// - The manager's error if a new connection cannot be dialed.
    pub async fn acquire_until(
        &self,
        deadline: Instant,
        cancel: &CancellationToken,
    ) -> Result<PooledConnection<M>> {
        let started = Instant::now();

        let permit = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(Error::AcquireCancelled),
            res = timeout_at(deadline, Arc::clone(&self.shared.slots).acquire_owned()) => match res {
                Ok(Ok(permit)) => permit,
                Ok(Err(_)) => return Err(Error::PoolClosed),
                Err(_) => {
                    tracing::debug!("timed out waiting for a pooled connection");
                    return Err(Error::PoolTimeout { waited: started.elapsed() });
                }
            },
        };

        loop {
            match self.shared.checkout()? {
                Checkout::Idle(mut idle) => {
                    if self.shared.is_expired(&idle) || self.shared.manager.has_broken(&mut idle.conn)
                    {
                        tracing::debug!(conn_id = idle.id, "discarding stale pooled connection");
                        self.shared.inventory.lock().open -= 1;
                        continue;
                    }

                    return Ok(self.checked_out(idle.id, idle.conn, permit));
                }
                Checkout::Dial => {
                    let mut reservation = Reservation {
                        shared: &self.shared,
                        armed: true,
                    };

                    let conn = tokio::select! {
                        biased;
                        () = cancel.cancelled() => return Err(Error::AcquireCancelled),
                        res = timeout_at(deadline, self.shared.manager.connect()) => match res {
                            Ok(res) => res?,
                            Err(_) => return Err(Error::PoolTimeout { waited: started.elapsed() }),
                        },
                    };

                    reservation.armed = false;
                    let id = self.shared.next_id();
                    tracing::debug!(conn_id = id, "opened pooled connection");
                    return Ok(self.checked_out(id, conn, permit));
                }
            }
        }
    }

    /// Returns a connection to the pool.
    ///
    /// Equivalent to dropping `conn`; provided for call sites that prefer an
    /// explicit release.
    pub fn release(&self, conn: PooledConnection<M>) {
        drop(conn);
    }

    /// Closes the pool.
    ///
    /// Pending and future acquisitions fail with [`Error::PoolClosed`], idle
    /// connections are dropped immediately, and checked-out connections are
    /// dropped as they are released.
    pub fn close(&self) {
        self.shared.slots.close();

        let drained: Vec<_> = {
            let mut inventory = self.shared.inventory.lock();
            inventory.closed = true;
            let drained: Vec<_> = inventory.idle.drain(..).collect();
            inventory.open -= drained.len();
            drained
        };

        tracing::debug!(drained = drained.len(), "connection pool closed");
    }

    pub fn is_closed(&self) -> bool {
        self.shared.slots.is_closed()
    }

    pub fn state(&self) -> PoolState {
        let inventory = self.shared.inventory.lock();
        PoolState {
            max_size: self.shared.config.max_size,
            open: inventory.open,
            idle: inventory.idle.len(),
            in_use: self.shared.config.max_size - self.shared.slots.available_permits(),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.shared.config
    }

    pub fn manager(&self) -> &M {
        &self.shared.manager
    }

    fn checked_out(
        &self,
        id: u64,
        conn: M::Connection,
        permit: OwnedSemaphorePermit,
    ) -> PooledConnection<M> {
        PooledConnection::new(Arc::clone(&self.shared), id, conn, permit)
    }
}

impl<M: ManageConnection> Shared<M> {
    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn checkout(&self) -> Result<Checkout<M::Connection>> {
        let mut inventory = self.inventory.lock();

        if inventory.closed {
            return Err(Error::PoolClosed);
        }

        if let Some(idle) = inventory.idle.pop_front() {
            return Ok(Checkout::Idle(idle));
        }

        // Holding a slot with nothing idle implies spare capacity, since
        // released connections reach the idle set before their slot frees up.
        if inventory.open >= self.config.max_size {
            return Err(Error::Connection {
                context: format!(
                    "pool accounting exhausted ({} of {} connections open)",
                    inventory.open, self.config.max_size
                ),
            });
        }

        inventory.open += 1;
        Ok(Checkout::Dial)
    }

    fn is_expired(&self, idle: &IdleConnection<M::Connection>) -> bool {
        self.config
            .idle_timeout
            .is_some_and(|limit| idle.since.elapsed() >= limit)
    }

    /// Takes a connection back from a guard.
    ///
    /// Runs before the guard's slot is released.
    pub(crate) fn put_back(&self, id: u64, conn: M::Connection, broken: bool) {
        let mut inventory = self.inventory.lock();

        if broken || inventory.closed {
            inventory.open -= 1;
            drop(inventory);
            tracing::debug!(conn_id = id, broken, "dropping returned connection");
            drop(conn);
            return;
        }

        inventory.idle.push_back(IdleConnection {
            id,
            conn,
            since: Instant::now(),
        });
    }
}
