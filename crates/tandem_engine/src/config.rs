//! Configuration for the sync engine.

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Lock owner name used when persisting batches, visible in traces.
    pub lock_owner: String,
    /// How many failed apply attempts a record may accumulate before the
    /// engine stops dispatching changes for it.
    pub max_record_retries: u32,
}

impl EngineConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            lock_owner: "sync-engine".into(),
            max_record_retries: 3,
        }
    }

    /// Sets the lock owner name.
    #[must_use]
    pub fn with_lock_owner(mut self, owner: impl Into<String>) -> Self {
        self.lock_owner = owner.into();
        self
    }

    /// Sets the per-record retry limit.
    #[must_use]
    pub fn with_max_record_retries(mut self, retries: u32) -> Self {
        self.max_record_retries = retries;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let config = EngineConfig::new()
            .with_lock_owner("watcher-loop")
            .with_max_record_retries(5);
        assert_eq!(config.lock_owner, "watcher-loop");
        assert_eq!(config.max_record_retries, 5);
    }
}
