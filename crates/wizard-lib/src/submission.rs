use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use wizard_spec::ConfigurationSnapshot;

/// Identifier of a resource returned by the create operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Structured cause reported by a failed create operation.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct CreateError {
    pub code: String,
    pub message: String,
}

impl CreateError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// External create call supplied by the embedding application. Timeouts and
/// retries belong to the implementation.
#[async_trait]
pub trait CreateOperation: Send + Sync {
    async fn create(&self, snapshot: &ConfigurationSnapshot) -> Result<ResourceId, CreateError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmissionError {
    #[error("create operation failed: {0}")]
    Create(#[from] CreateError),
    #[error("a submission is already in flight")]
    ConcurrentSubmissionRejected,
}

/// Hands snapshots to the create operation, one at a time.
pub struct SubmissionPipeline {
    operation: Arc<dyn CreateOperation>,
    in_flight: AtomicBool,
}

impl fmt::Debug for SubmissionPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubmissionPipeline")
            .field("in_flight", &self.is_in_flight())
            .finish()
    }
}

impl SubmissionPipeline {
    pub fn new(operation: impl CreateOperation + 'static) -> Self {
        Self::shared(Arc::new(operation))
    }

    pub fn shared(operation: Arc<dyn CreateOperation>) -> Self {
        Self {
            operation,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Invokes the create operation exactly once. A call made while another
    /// one is pending is rejected, never queued.
    pub async fn execute(
        &self,
        snapshot: ConfigurationSnapshot,
    ) -> Result<ResourceId, SubmissionError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!(wizard = %snapshot.wizard_id, "submission rejected: another one is in flight");
            return Err(SubmissionError::ConcurrentSubmissionRejected);
        }
        let _guard = InFlight(&self.in_flight);

        info!(
            wizard = %snapshot.wizard_id,
            version = %snapshot.wizard_version,
            fields = snapshot.fields.len(),
            "invoking create operation"
        );
        match self.operation.create(&snapshot).await {
            Ok(resource_id) => {
                info!(wizard = %snapshot.wizard_id, resource = %resource_id, "resource created");
                Ok(resource_id)
            }
            Err(err) => {
                warn!(wizard = %snapshot.wizard_id, code = %err.code, "create operation failed: {}", err.message);
                Err(SubmissionError::Create(err))
            }
        }
    }
}

// Releases the in-flight flag even if the create future is dropped.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
