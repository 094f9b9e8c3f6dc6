use crate::{Error, Result};
use core::time::Duration;

/// Sizing and timing parameters for a [`Pool`](crate::pool::Pool).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolConfig {
    /// Hard cap on connections that exist at once, idle or checked out.
    pub max_size: usize,
    /// Connections established eagerly when the pool is created.
    pub min_size: usize,
    /// How long [`acquire`](crate::pool::Pool::acquire) waits on a saturated
    /// pool before failing with [`Error::PoolTimeout`].
    pub acquire_timeout: Duration,
    /// Idle connections older than this are discarded on checkout and
    /// replaced. `None` keeps idle connections forever.
    pub idle_timeout: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 5,
            min_size: 5,
            acquire_timeout: Duration::from_secs(1),
            idle_timeout: None,
        }
    }
}

impl PoolConfig {
    #[must_use]
    pub const fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    #[must_use]
    pub const fn with_min_size(mut self, min_size: usize) -> Self {
        self.min_size = min_size;
        self
    }

    #[must_use]
    pub const fn with_acquire_timeout(mut self, acquire_timeout: Duration) -> Self {
        self.acquire_timeout = acquire_timeout;
        self
    }

    #[must_use]
    pub const fn with_idle_timeout(mut self, idle_timeout: Option<Duration>) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Checks that the sizes describe a usable pool.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `max_size` is zero or smaller than
    /// `min_size`.
    pub fn validate(&self) -> Result<()> {
        if self.max_size == 0 {
            return Err(Error::InvalidInput {
                reason: "pool max_size must be greater than 0".to_string(),
            });
        }

        if self.min_size > self.max_size {
            return Err(Error::InvalidInput {
                reason: format!(
                    "pool min_size ({}) exceeds max_size ({})",
                    self.min_size, self.max_size
                ),
            });
        }

        Ok(())
    }
}
