use crate::pool::{manager::ManageConnection, shared::Shared};
use core::{
    fmt,
    ops::{Deref, DerefMut},
};
use std::sync::Arc;
use tokio::sync::OwnedSemaphorePermit;

/// A connection checked out of a [`Pool`](crate::pool::Pool).
///
/// The holder has exclusive use of the connection until the guard is
/// dropped, at which point the connection goes back to the idle set and one
/// waiting caller is woken. Call [`mark_broken`](Self::mark_broken) after a
/// transport failure so the connection is discarded instead; the pool dials a
/// replacement the next time it needs one.
pub struct PooledConnection<M: ManageConnection> {
    shared: Arc<Shared<M>>,
    conn: Option<M::Connection>,
    id: u64,
    broken: bool,
    // Dropped after `Drop::drop` has put the connection back, so a woken
    // waiter always finds it in the idle set.
    _permit: OwnedSemaphorePermit,
}

impl<M: ManageConnection> PooledConnection<M> {
    pub(crate) fn new(
        shared: Arc<Shared<M>>,
        id: u64,
        conn: M::Connection,
        permit: OwnedSemaphorePermit,
    ) -> Self {
        Self {
            shared,
            conn: Some(conn),
            id,
            broken: false,
            _permit: permit,
        }
    }

    /// Pool-unique identifier of the underlying connection.
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Discard this connection on release instead of reusing it.
    pub fn mark_broken(&mut self) {
        self.broken = true;
    }

    /// Sets whether the connection is discarded on release.
    ///
    /// Lets a holder mark the connection broken for the duration of a risky
    /// operation and clear the mark once it completes cleanly.
    pub fn set_broken(&mut self, broken: bool) {
        self.broken = broken;
    }

    pub const fn is_broken(&self) -> bool {
        self.broken
    }
}

impl<M: ManageConnection> Deref for PooledConnection<M> {
    type Target = M::Connection;

    fn deref(&self) -> &Self::Target {
        self.conn.as_ref().expect("connection is only taken on drop")
    }
}

impl<M: ManageConnection> DerefMut for PooledConnection<M> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn.as_mut().expect("connection is only taken on drop")
    }
}

impl<M: ManageConnection> Drop for PooledConnection<M> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.shared.put_back(self.id, conn, self.broken);
        }
    }
}

impl<M: ManageConnection> fmt::Debug for PooledConnection<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("id", &self.id)
            .field("broken", &self.broken)
            .finish_non_exhaustive()
    }
}
