//! Bounded connection pool with fair, deadline-aware acquisition.
//!
//! The pool hands out at most `max_size` connections at a time. Capacity is
//! modelled as a fixed set of tokens held in a FIFO-fair
//! [`Semaphore`](tokio::sync::Semaphore): a caller first takes a token, then
//! either reuses an idle connection or dials a new one through its
//! [`ManageConnection`] implementation. Waiters queue on the semaphore in
//! arrival order, never while holding the inventory lock.
//!
//! Checked-out connections are returned through the [`PooledConnection`]
//! guard. Dropping the guard releases the connection, so release happens
//! exactly once on every exit path: success, error, early return, panic
//! unwinding, and task cancellation.
//!
//! ## Structure
//!
//! - [`config`] - [`PoolConfig`] sizing and timeouts.
//! - [`manager`] - [`ManageConnection`], the connection factory seam.
//! - [`shared`] - [`Pool`] itself and its [`PoolState`] snapshot.
//! - [`guard`] - [`PooledConnection`], the scoped checkout.

pub mod config;
pub mod guard;
pub mod manager;
pub mod shared;

#[cfg(test)]
mod tests;

pub use config::PoolConfig;
pub use guard::PooledConnection;
pub use manager::ManageConnection;
pub use shared::{Pool, PoolState};
