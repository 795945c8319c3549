//! Engine configuration: the tunables from the core's external contract,
//! validated rather than asserted (see [`EngineConfig::validate`]).

use std::time::Duration;

use crate::error::{EngineError, EngineResult};

/// Construction-time tunables for [`crate::engine::RenderEngine`].
///
/// `medium` is deliberately absent here: it is a per-request parameter, not
/// an engine-wide setting (see [`crate::request::RenderRequest`]).
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub pool_size: usize,
    pub use_cache: bool,
    pub display_list_admission_threshold: Duration,
    pub page_cache_admission_threshold: Duration,
    pub display_list_cache_capacity: usize,
    pub page_cache_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pool_size: 1,
            use_cache: true,
            display_list_admission_threshold: Duration::from_millis(100),
            page_cache_admission_threshold: Duration::from_millis(100),
            display_list_cache_capacity: 10,
            page_cache_capacity: 10,
        }
    }
}

impl EngineConfig {
    /// Reject configurations the engine cannot run with. A `pool_size` of
    /// zero would leave the coordinator with no worker to fan out to, so it
    /// is refused here rather than producing a degenerate, permanently
    /// stuck engine.
    pub fn validate(&self) -> EngineResult<()> {
        if self.pool_size == 0 {
            return Err(EngineError::InvalidConfig(
                "pool_size must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
