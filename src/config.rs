use clap::Args;
use std::time::Duration;

/// Runtime knobs for the engine.
///
/// Every flag can also be supplied through its `WASHPOS_*` environment variable.
#[derive(Debug, Clone, Args)]
pub struct EngineConfig {
    /// Upper bound, in milliseconds, on any single durable-store call.
    #[arg(long, env = "WASHPOS_STORE_TIMEOUT_MS", default_value_t = 5000)]
    pub store_timeout_ms: u64,

    /// Reference used when creating a customer or vehicle record fails.
    #[arg(long, env = "WASHPOS_PLACEHOLDER_ID", default_value_t = 1)]
    pub placeholder_id: u64,

    /// Abort the booking instead of using a placeholder reference.
    #[arg(long, env = "WASHPOS_NO_PLACEHOLDER")]
    pub no_placeholder: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            store_timeout_ms: 5000,
            placeholder_id: 1,
            no_placeholder: false,
        }
    }
}

impl EngineConfig {
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    /// The placeholder reference, or `None` when auxiliary failures must abort.
    pub fn placeholder(&self) -> Option<u64> {
        (!self.no_placeholder).then_some(self.placeholder_id)
    }
}
