//! Bounded calls to third-party collaborators (gateways, messaging, audit sink).

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use campus_core::TenantId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExternalCallError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The collaborator answered and refused (e.g. a payment decline).
    #[error("declined: {0}")]
    Declined(String),

    #[error("failed: {0}")]
    Failed(String),
}

/// Run `call`, giving up with [`ExternalCallError::Timeout`] after `limit`.
pub async fn call_with_timeout<T, F>(limit: Duration, call: F) -> Result<T, ExternalCallError>
where
    F: Future<Output = Result<T, ExternalCallError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(ExternalCallError::Timeout(limit)),
    }
}

/// Outbound notification channel (SMS, email, push).
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, tenant_id: TenantId, recipient: &str, message: &str) -> Result<(), ExternalCallError>;
}

/// Notifier that only logs; used when no delivery channel is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, tenant_id: TenantId, recipient: &str, message: &str) -> Result<(), ExternalCallError> {
        info!(tenant_id = %tenant_id, recipient, message, "notification dispatched");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn slow_calls_time_out() {
        let limit = Duration::from_millis(50);
        let result: Result<(), _> = call_with_timeout(limit, async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(())
        })
        .await;
        assert_eq!(result, Err(ExternalCallError::Timeout(limit)));
    }

    #[tokio::test]
    async fn declines_pass_through_unchanged() {
        let result: Result<(), _> = call_with_timeout(Duration::from_secs(1), async {
            Err(ExternalCallError::Declined("card refused".into()))
        })
        .await;
        assert_eq!(result, Err(ExternalCallError::Declined("card refused".into())));
    }
}
