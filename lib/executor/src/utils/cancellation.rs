use std::time::{Duration, Instant};

/// Cooperative cancellation shared by every subgraph call of one operation.
///
/// Clones observe the same cancellation state, so a token handed to the
/// execution context can be cancelled from the outside (client disconnect,
/// router shutdown) while fetches are in flight.
#[derive(Debug, Default, Clone)]
pub struct CancellationToken {
    inner: tokio_util::sync::CancellationToken,
    deadline: Option<Instant>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            inner: tokio_util::sync::CancellationToken::new(),
            deadline: None,
        }
    }

    pub fn with_timeout(duration: Duration) -> Self {
        Self {
            inner: tokio_util::sync::CancellationToken::new(),
            deadline: Some(Instant::now() + duration),
        }
    }

    pub fn cancel(&self) {
        self.inner.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    #[inline]
    pub fn bail_if_cancelled(&self) -> Result<(), CancellationError> {
        self.bail_if_timedout()?;

        if self.inner.is_cancelled() {
            return Err(CancellationError::Cancelled);
        }

        Ok(())
    }

    fn bail_if_timedout(&self) -> Result<(), CancellationError> {
        if let Some(deadline) = self.deadline {
            if deadline <= Instant::now() {
                self.cancel();
                return Err(CancellationError::TimedOut);
            }
        }

        Ok(())
    }

    /// Resolves once the token is cancelled or its deadline passes.
    pub async fn cancelled(&self) -> CancellationError {
        match self.deadline {
            Some(deadline) => {
                let deadline = tokio::time::Instant::from_std(deadline);
                tokio::select! {
                    _ = self.inner.cancelled() => CancellationError::Cancelled,
                    _ = tokio::time::sleep_until(deadline) => {
                        self.cancel();
                        CancellationError::TimedOut
                    }
                }
            }
            None => {
                self.inner.cancelled().await;
                CancellationError::Cancelled
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CancellationError {
    #[error("cancelled")]
    Cancelled,
    #[error("timed out")]
    TimedOut,
}
