//! Bounded waits on page state.
//!
//! Everything a scenario waits on -- the generic page-ready signal after navigation, or the
//! map's idle flag after an interaction -- goes through [`Wait`]: a poll with a period and a
//! hard bound. When the bound elapses the wait fails with
//! [`CmdError::WaitTimeout`](crate::error::CmdError::WaitTimeout); it never hangs.

use crate::client::Client;
use crate::error;
use serde_json::Value as Json;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Default timeout for a wait operation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default period between checks of a wait condition.
pub const DEFAULT_PERIOD: Duration = Duration::from_millis(250);

/// Used for setting up a wait operation on the [`Client`].
#[derive(Debug)]
pub struct Wait<'c> {
    client: &'c Client,
    timeout: Option<Duration>,
    period: Duration,
}

impl<'c> Wait<'c> {
    pub(crate) fn new(client: &'c Client) -> Self {
        Self {
            client,
            timeout: Some(DEFAULT_TIMEOUT),
            period: DEFAULT_PERIOD,
        }
    }

    /// Set the timeout until the operation should wait.
    pub fn at_most(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Wait forever.
    pub fn forever(mut self) -> Self {
        self.timeout = None;
        self
    }

    /// Sets the period to delay checks.
    pub fn every(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// Wait until the given condition yields a value.
    ///
    /// The condition will be polled at the configured period, and any error it returns aborts
    /// the wait immediately.
    pub async fn on<F, FF, T>(self, mut condition: F) -> Result<T, error::CmdError>
    where
        F: FnMut(&Client) -> FF,
        FF: Future<Output = Result<Option<T>, error::CmdError>>,
    {
        let client = self.client;
        poll_until(self.timeout, self.period, move || condition(client)).await
    }

    /// Wait until the given JavaScript expression evaluates to a truthy value on the page.
    ///
    /// This is the primitive behind idle-flag waits: the page arms a global boolean, and the
    /// harness polls it until it flips or the bound elapses.
    pub async fn for_script_truthy(self, expr: &str) -> Result<(), error::CmdError> {
        let script = format!("return Boolean({});", expr);
        self.on(move |client| {
            let client = client.clone();
            let script = script.clone();
            async move {
                match client.execute(&script, vec![]).await? {
                    Json::Bool(true) => Ok(Some(())),
                    _ => Ok(None),
                }
            }
        })
        .await
    }

    /// Wait for the document to finish loading.
    ///
    /// This is the generic page-ready signal scenarios block on after navigation, before any
    /// interaction or capture.
    pub async fn for_document_ready(self) -> Result<(), error::CmdError> {
        self.for_script_truthy("document.readyState === \"complete\"")
            .await
    }
}

/// Poll `condition` until it yields a value, or fail with `WaitTimeout` once `timeout` has
/// elapsed. A `timeout` of `None` polls forever.
pub(crate) async fn poll_until<F, FF, T>(
    timeout: Option<Duration>,
    period: Duration,
    mut condition: F,
) -> Result<T, error::CmdError>
where
    F: FnMut() -> FF,
    FF: Future<Output = Result<Option<T>, error::CmdError>>,
{
    let started = Instant::now();

    loop {
        if let Some(value) = condition().await? {
            return Ok(value);
        }

        if let Some(timeout) = timeout {
            if started.elapsed() >= timeout {
                return Err(error::CmdError::WaitTimeout);
            }
        }

        tokio::time::sleep(period).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn poll_fails_at_the_bound_instead_of_hanging() {
        let start = Instant::now();
        let r: Result<(), _> = poll_until(
            Some(Duration::from_secs(5)),
            Duration::from_millis(250),
            || async { Ok(None) },
        )
        .await;

        assert!(matches!(r, Err(error::CmdError::WaitTimeout)));
        let waited = start.elapsed();
        assert!(waited >= Duration::from_secs(5));
        assert!(waited < Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn poll_returns_as_soon_as_the_condition_holds() {
        let polls = AtomicUsize::new(0);
        let r = poll_until(Some(Duration::from_secs(5)), Duration::from_millis(250), || {
            let n = polls.fetch_add(1, Ordering::SeqCst);
            async move { Ok((n >= 3).then_some(n)) }
        })
        .await;

        assert_eq!(r.unwrap(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn unbounded_poll_is_allowed() {
        let polls = AtomicUsize::new(0);
        let r = poll_until(None, Duration::from_millis(250), || {
            let n = polls.fetch_add(1, Ordering::SeqCst);
            async move { Ok((n >= 100).then_some(())) }
        })
        .await;

        assert!(r.is_ok());
    }
}
