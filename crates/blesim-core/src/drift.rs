// ── Value drift ──
//
// Keeps a simulated sensor reading alive: on every tick, a numeric state
// value is nudged by a small random offset and clamped to its range.
// Non-numeric or missing values are left alone.

use std::time::Duration;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::store::StateStore;
use crate::value::{as_finite_number, number_value};

#[derive(Debug, Clone, PartialEq)]
pub struct DriftConfig {
    pub key: String,
    pub interval: Duration,
    /// Peak-to-peak size of a single step.
    pub amplitude: f64,
    pub min: f64,
    pub max: f64,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            key: "temperatureC".into(),
            interval: Duration::from_secs(2),
            amplitude: 0.2,
            min: -40.0,
            max: 125.0,
        }
    }
}

impl DriftConfig {
    /// Next value for `current`, given a uniform sample `unit` in `[0, 1)`.
    pub fn step(&self, current: f64, unit: f64) -> f64 {
        (current + (unit - 0.5) * self.amplitude).clamp(self.min, self.max)
    }

    /// Apply one step to the store. Returns the stored value, if any.
    pub fn apply(&self, store: &StateStore, unit: f64) -> Option<Value> {
        let current = store.get(&self.key)?;
        let current = as_finite_number(&current)?;
        Some(store.set(self.key.clone(), number_value(self.step(current, unit))))
    }
}

pub(crate) async fn drift_task(store: StateStore, config: DriftConfig, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(config.interval);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                let unit: f64 = rand::random();
                if let Some(value) = config.apply(&store, unit) {
                    trace!(key = %config.key, %value, "drift step");
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn step_stays_within_half_amplitude() {
        let config = DriftConfig::default();
        assert!((config.step(20.0, 0.0) - 19.9).abs() < 1e-9);
        assert!((config.step(20.0, 0.999_999) - 20.1).abs() < 1e-5);
        assert_eq!(config.step(20.0, 0.5), 20.0);
    }

    #[test]
    fn step_clamps_to_range() {
        let config = DriftConfig::default();
        assert_eq!(config.step(125.0, 0.99), 125.0);
        assert_eq!(config.step(-40.0, 0.0), -40.0);
    }

    #[test]
    fn apply_ignores_non_numeric_values() {
        let config = DriftConfig::default();
        let store = StateStore::new();
        assert_eq!(config.apply(&store, 0.9), None);

        store.set("temperatureC", json!("warm"));
        assert_eq!(config.apply(&store, 0.9), None);
        assert_eq!(store.get("temperatureC"), Some(json!("warm")));
    }

    #[tokio::test(start_paused = true)]
    async fn task_drifts_on_each_tick_until_cancelled() {
        let store = StateStore::new();
        store.set("temperatureC", json!(21.5));
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(drift_task(
            store.clone(),
            DriftConfig::default(),
            cancel.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(4_100)).await;
        let value = store.get("temperatureC").unwrap().as_f64().unwrap();
        assert!((value - 21.5).abs() <= 0.2 + 1e-9, "{value}");

        cancel.cancel();
        handle.await.unwrap();
    }
}
