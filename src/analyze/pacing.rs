//! Call spacing toward the oracle.
//!
//! The policy asks its pacer for a slot before every oracle call. One pacer is shared by
//! every request using the policy, so the spacing holds across concurrent batches.
//! Production uses a randomized delay; tests inject [`NoPacing`].

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::config::PacingConfig;

pub trait Pacer: Send + Sync {
    fn pause(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}

pub type DynPacer = Arc<dyn Pacer>;

/// Hands out call slots at least a uniformly random `[min, max]` apart.
///
/// The first slot is immediate. Each reservation pushes the next slot forward under a
/// lock, so callers racing for the oracle queue up instead of firing together.
#[derive(Debug)]
pub struct JitterPacer {
    min: Duration,
    max: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl JitterPacer {
    pub fn new(min: Duration, max: Duration) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        Self {
            min,
            max,
            next_slot: Mutex::new(None),
        }
    }

    pub fn next_delay(&self) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        let lo = self.min.as_millis() as u64;
        let hi = self.max.as_millis() as u64;
        Duration::from_millis(rand::rng().random_range(lo..=hi))
    }
}

impl Pacer for JitterPacer {
    fn pause(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            let slot = {
                let mut next = self.next_slot.lock().await;
                let now = Instant::now();
                let slot = next.map_or(now, |t| t.max(now));
                *next = Some(slot + self.next_delay());
                slot
            };
            tokio::time::sleep_until(slot).await;
        })
    }
}

/// Returns immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPacing;

impl Pacer for NoPacing {
    fn pause(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async {})
    }
}

pub fn pacer_from_config(cfg: &PacingConfig) -> DynPacer {
    if cfg.enabled {
        Arc::new(JitterPacer::new(
            Duration::from_millis(cfg.min_ms),
            Duration::from_millis(cfg.max_ms),
        ))
    } else {
        Arc::new(NoPacing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jitter_stays_in_bounds() {
        let p = JitterPacer::new(Duration::from_millis(500), Duration::from_millis(1500));
        for _ in 0..200 {
            let d = p.next_delay();
            assert!(d >= Duration::from_millis(500) && d <= Duration::from_millis(1500));
        }
    }

    #[test]
    fn reversed_bounds_are_swapped() {
        let p = JitterPacer::new(Duration::from_millis(30), Duration::from_millis(10));
        let d = p.next_delay();
        assert!(d >= Duration::from_millis(10) && d <= Duration::from_millis(30));
    }

    #[tokio::test(start_paused = true)]
    async fn first_slot_is_immediate_then_spaced() {
        let p = JitterPacer::new(Duration::from_millis(200), Duration::from_millis(200));
        let t0 = Instant::now();
        p.pause().await;
        assert_eq!(t0.elapsed(), Duration::ZERO);
        p.pause().await;
        assert!(t0.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_get_distinct_slots() {
        let p = Arc::new(JitterPacer::new(
            Duration::from_millis(100),
            Duration::from_millis(100),
        ));
        let t0 = Instant::now();
        let mut handles = Vec::new();
        for _ in 0..4 {
            let p = p.clone();
            handles.push(tokio::spawn(async move {
                p.pause().await;
                t0.elapsed()
            }));
        }
        let mut at = Vec::new();
        for h in handles {
            at.push(h.await.unwrap());
        }
        at.sort();
        for pair in at.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(100), "{at:?}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn idle_pacer_does_not_delay() {
        let p = JitterPacer::new(Duration::from_millis(100), Duration::from_millis(100));
        p.pause().await;
        tokio::time::sleep(Duration::from_secs(1)).await;
        let t0 = Instant::now();
        p.pause().await;
        assert_eq!(t0.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn disabled_config_gives_no_pacing() {
        let cfg = PacingConfig {
            enabled: false,
            ..PacingConfig::default()
        };
        let p = pacer_from_config(&cfg);
        let t0 = std::time::Instant::now();
        p.pause().await;
        assert!(t0.elapsed() < Duration::from_millis(100));
    }
}
