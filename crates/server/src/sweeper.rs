//! Periodic cleanup of expired in-memory state

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use wayfinder_agent::ConversationService;
use wayfinder_core::config::Config;

/// The shorter of the rate-limit and trigger sweep intervals, at least one second
pub fn sweep_interval(config: &Config) -> Duration {
    let secs = config
        .rate_limit
        .sweep_interval_secs
        .min(config.triggers.sweep_interval_secs)
        .max(1);
    Duration::from_secs(secs)
}

/// Sweep on a fixed interval until the handle is aborted
pub fn spawn_sweeper(conversation: Arc<ConversationService>, every: Duration) -> JoinHandle<()> {
    info!(interval_secs = every.as_secs(), "Starting state sweeper");
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        // the first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            let stats = conversation.sweep();
            debug!(
                rate_limit_keys = stats.rate_limit_keys,
                trigger_records = stats.trigger_records,
                cache_entries = stats.cache_entries,
                "Sweep complete"
            );
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_uses_shorter_setting() {
        let mut config = Config::default();
        config.rate_limit.sweep_interval_secs = 60;
        config.triggers.sweep_interval_secs = 300;
        assert_eq!(sweep_interval(&config), Duration::from_secs(60));

        config.triggers.sweep_interval_secs = 0;
        assert_eq!(sweep_interval(&config), Duration::from_secs(1));
    }
}
