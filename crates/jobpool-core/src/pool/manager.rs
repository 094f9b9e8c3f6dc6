use crate::Result;
use core::future::Future;

/// Creates and inspects the connections held by a [`Pool`].
///
/// The pool calls [`connect`](ManageConnection::connect) whenever it needs
/// more capacity, up to its configured maximum, and
/// [`has_broken`](ManageConnection::has_broken) before handing an idle
/// connection back out.
///
/// [`Pool`]: crate::pool::Pool
pub trait ManageConnection: Send + Sync + 'static {
    /// The connection type handed out by the pool.
    type Connection: Send + 'static;

    /// Dials the backend and returns a live connection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`](crate::Error::Connection) if the backend
    /// is unreachable.
    fn connect(&self) -> impl Future<Output = Result<Self::Connection>> + Send;

    /// Returns `true` if `conn` is known to be unusable and must be
    /// discarded instead of being reused.
    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}
