//! Builder for [`RelayService`]

use std::sync::Arc;

use vanish_core::{IdentityRegistry, ManualTimeSource, RelayConfig, RelayResult, TimeSource};

use crate::service::RelayService;

/// Builder for configuring and creating a relay service
pub struct RelayBuilder {
    config: RelayConfig,
    time_source: Option<Arc<dyn TimeSource>>,
}

impl RelayBuilder {
    /// Create a builder with default configuration and the wall clock
    pub fn new() -> Self {
        Self {
            config: RelayConfig::default(),
            time_source: None,
        }
    }

    /// Set the relay configuration
    pub fn config(mut self, config: RelayConfig) -> Self {
        self.config = config;
        self
    }

    /// Inject a clock
    pub fn time_source(mut self, time_source: Arc<dyn TimeSource>) -> Self {
        self.time_source = Some(time_source);
        self
    }

    /// Validate the configuration and build the service
    pub fn build(self) -> RelayResult<RelayService> {
        let registry = match self.time_source {
            Some(time_source) => IdentityRegistry::with_time_source(self.config, time_source)?,
            None => IdentityRegistry::new(self.config)?,
        };
        Ok(RelayService::from_parts(Arc::new(registry)))
    }
}

impl Default for RelayBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a service with test configuration driven by `clock`
pub fn build_test_service(clock: &ManualTimeSource) -> RelayService {
    RelayBuilder::new()
        .config(RelayConfig::testing())
        .time_source(Arc::new(clock.clone()))
        .build()
        .expect("testing config is valid")
}
