use anyhow::{Context, bail};
use core::fmt;
use std::sync::Arc;

/// Stable identity a worker attaches to every result it produces.
///
/// Resolved once at startup and shared by every job for the lifetime of the
/// process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkerIdentity(Arc<str>);

impl WorkerIdentity {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    /// Uses `explicit` when given, otherwise the host name.
    ///
    /// # Errors
    ///
    /// Returns an error if the host name cannot be read, is not valid UTF-8,
    /// or the resulting identity is blank.
    pub fn resolve(explicit: Option<&str>) -> anyhow::Result<Self> {
        let id = match explicit {
            Some(id) => id.trim().to_string(),
            None => hostname::get()
                .context("failed to read hostname")?
                .into_string()
                .map_err(|raw| anyhow::anyhow!("hostname is not valid UTF-8: {raw:?}"))?,
        };

        if id.is_empty() {
            bail!("worker identity must not be empty");
        }

        Ok(Self::new(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
