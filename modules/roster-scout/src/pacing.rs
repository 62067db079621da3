use std::collections::HashMap;
use std::time::Duration;

use roster_common::media::host_of;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Spaces out request starts against the same host. Shared by every worker
/// in a run, so a small profile pool still honors one delay per host.
pub struct HostPacer {
    min_delay: Duration,
    next_slot: Mutex<HashMap<String, Instant>>,
}

impl HostPacer {
    pub fn new(min_delay: Duration) -> Self {
        Self {
            min_delay,
            next_slot: Mutex::new(HashMap::new()),
        }
    }

    /// Wait until a request to `url`'s host may start. URLs without a host
    /// are not paced.
    pub async fn wait(&self, url: &str) {
        if self.min_delay.is_zero() {
            return;
        }
        let Some(host) = host_of(url) else {
            return;
        };

        // Reserve a slot under the lock, sleep outside it.
        let start_at = {
            let mut slots = self.next_slot.lock().await;
            let now = Instant::now();
            let start_at = slots.get(&host).copied().filter(|t| *t > now).unwrap_or(now);
            slots.insert(host.clone(), start_at + self.min_delay);
            start_at
        };

        let now = Instant::now();
        if start_at > now {
            debug!(host = host.as_str(), wait_ms = (start_at - now).as_millis() as u64, "Pacing request");
            tokio::time::sleep_until(start_at).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn same_host_requests_are_spaced() {
        let pacer = HostPacer::new(Duration::from_millis(500));
        let start = Instant::now();

        pacer.wait("https://gostate.com/roster").await;
        pacer.wait("https://gostate.com/roster/jane").await;
        pacer.wait("https://gostate.com/roster/sam").await;

        assert!(Instant::now() - start >= Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn different_hosts_do_not_wait() {
        let pacer = HostPacer::new(Duration::from_millis(500));
        let start = Instant::now();

        pacer.wait("https://gostate.com/roster").await;
        pacer.wait("https://techathletics.com/roster").await;

        assert!(Instant::now() - start < Duration::from_millis(500));
    }
}
