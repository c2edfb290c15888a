use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;
use wizard_lib::{ConfigurationSnapshot, CreateError, CreateOperation, ResourceId};

use crate::config::SimulationConfig;

/// Create operation that waits, then mints an id or fails on request.
#[derive(Debug, Clone)]
pub struct SimulatedCreate {
    latency_ms: u64,
    fail_wizards: BTreeSet<String>,
    fail_all: bool,
    id_prefix: String,
}

impl SimulatedCreate {
    pub fn from_config(config: &SimulationConfig) -> Self {
        Self {
            latency_ms: config.latency_ms,
            fail_wizards: config.fail_wizards.iter().cloned().collect(),
            fail_all: false,
            id_prefix: config.id_prefix.clone(),
        }
    }

    pub fn failing(mut self, fail_all: bool) -> Self {
        self.fail_all = fail_all;
        self
    }

    pub fn latency(&self) -> Duration {
        Duration::from_millis(self.latency_ms)
    }
}

#[async_trait]
impl CreateOperation for SimulatedCreate {
    async fn create(&self, snapshot: &ConfigurationSnapshot) -> Result<ResourceId, CreateError> {
        debug!(wizard = %snapshot.wizard_id, latency_ms = self.latency_ms, "simulating create call");
        if self.latency_ms > 0 {
            tokio::time::sleep(self.latency()).await;
        }
        if self.fail_all || self.fail_wizards.contains(&snapshot.wizard_id) {
            return Err(CreateError::new(
                "simulated_failure",
                format!("the simulated API rejected '{}'", snapshot.wizard_id),
            ));
        }
        Ok(ResourceId::new(format!("{}-{}", self.id_prefix, Uuid::new_v4())))
    }
}
