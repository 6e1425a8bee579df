//! Framework connection abstract Trait

use std::sync::Arc;

use crate::error::{FormError, FormResult};

/// Connection Provider Trait
///
/// Models a transactional resource (database session, unit of work) that every
/// externally visible operation holds for its duration. Acquisition may be requested
/// repeatedly while a cascade nests operations; each `acquire` is paired with exactly
/// one `release`.
pub trait ConnectionProvider: Send + Sync {
    fn acquire(&self) -> FormResult<()>;

    fn commit(&self) -> FormResult<()>;

    fn rollback(&self);

    fn release(&self);
}

/// Connection provider for services without transactions
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopConnectionProvider;

impl ConnectionProvider for NoopConnectionProvider {
    fn acquire(&self) -> FormResult<()> {
        Ok(())
    }

    fn commit(&self) -> FormResult<()> {
        Ok(())
    }

    fn rollback(&self) {}

    fn release(&self) {}
}

/// A held framework connection, released when dropped.
pub struct ConnectionScope {
    provider: Arc<dyn ConnectionProvider>,
    operation: &'static str,
}

impl ConnectionScope {
    /// Acquire the connection for one operation
    pub fn acquire(
        provider: Arc<dyn ConnectionProvider>,
        operation: &'static str,
    ) -> FormResult<Self> {
        provider.acquire().map_err(|e| match e {
            FormError::Connection(_) => e,
            other => FormError::Connection(other.to_string()),
        })?;
        Ok(Self {
            provider,
            operation,
        })
    }

    /// Settle the scope with the operation's result: roll back on failure
    pub fn finish<T>(self, result: FormResult<T>) -> FormResult<T> {
        if let Err(e) = &result {
            if e.is_expected() {
                log::warn!("Rolling back {}: {e}", self.operation);
            } else {
                log::error!("Rolling back {}: {e}", self.operation);
            }
            self.provider.rollback();
        }
        result
    }

    /// Commit on success, roll back on failure
    pub fn commit<T>(self, result: FormResult<T>) -> FormResult<T> {
        match result {
            Ok(value) => match self.provider.commit() {
                Ok(()) => Ok(value),
                Err(e) => self.finish(Err(e)),
            },
            Err(e) => self.finish(Err(e)),
        }
    }
}

impl Drop for ConnectionScope {
    fn drop(&mut self) {
        self.provider.release();
    }
}
