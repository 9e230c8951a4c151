//! Auth refresh port
//!
//! The engine never implements token refresh itself. When a remote call
//! fails with an auth-class error, the orchestrator signals this port once
//! and retries the call exactly once. The concrete mechanism (OAuth refresh,
//! re-login prompt, ...) belongs to the host application.

/// External signal to refresh expired credentials.
#[async_trait::async_trait]
pub trait AuthRefresher: Send + Sync {
    /// Asks the auth layer to refresh the session.
    ///
    /// A failure here is logged by the orchestrator; the retry proceeds
    /// regardless and surfaces its own error if the credentials are still
    /// rejected.
    async fn refresh_session(&self) -> anyhow::Result<()>;
}

/// Refresher for hosts without refresh plumbing: logs and does nothing.
///
/// With this refresher an auth failure still gets its single retry, which
/// covers remotes where a token is provisioned out of band.
#[derive(Debug, Default)]
pub struct NoopRefresher;

#[async_trait::async_trait]
impl AuthRefresher for NoopRefresher {
    async fn refresh_session(&self) -> anyhow::Result<()> {
        tracing::debug!("Auth refresh requested, but no refresher is configured");
        Ok(())
    }
}
