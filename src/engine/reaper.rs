use std::sync::Arc;
use std::time::Duration;

use tokio::time::interval;

use crate::routing::InstanceRouter;

const SWEEP_INTERVAL: Duration = Duration::from_secs(10);

/// Periodic TTL sweep over every live engine. Lazy expiry on the access
/// paths keeps correctness between sweeps; this loop only bounds memory
/// held by never-touched expired keys.
pub struct TtlReaper {
    router: Arc<InstanceRouter>,
}

impl TtlReaper {
    pub fn new(router: Arc<InstanceRouter>) -> Self {
        Self { router }
    }

    pub async fn run(self) {
        let mut ticker = interval(SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            self.sweep_once();
        }
    }

    pub fn sweep_once(&self) -> usize {
        let mut swept = 0;
        for engine in self.router.engines() {
            swept += engine.sweep_expired();
        }
        if swept > 0 {
            tracing::debug!("ttl reaper removed {} expired entries", swept);
        }
        swept
    }
}
