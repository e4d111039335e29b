//! Reset-safe rate derivation
//!
//! Process-local and ephemeral: on restart the first cycle emits zero
//! rates until a second sample arrives. Confined to a single aggregator
//! pass keyed by user/bucket id, so the underlying map needs no locking
//! beyond what `DashMap` already gives per-shard.

use std::collections::HashMap;
use std::time::Instant;

use dashmap::DashMap;

use crate::model::ApiOpsMap;

/// One cumulative-counter sample, as observed at a point in time.
#[derive(Debug, Clone, Default)]
pub struct Sample {
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub read_ops: u64,
    pub write_ops: u64,
    pub api_ops: ApiOpsMap,
}

/// Per-second rates derived from two consecutive samples.
#[derive(Debug, Clone, Default)]
pub struct Rates {
    pub bytes_sent_per_sec: f64,
    pub bytes_received_per_sec: f64,
    pub read_ops_per_sec: f64,
    pub write_ops_per_sec: f64,
    pub throughput_per_sec: f64,
    pub ops_per_sec: f64,
    pub api_ops_per_sec: HashMap<String, f64>,
}

struct PriorSample {
    sample: Sample,
    at: Instant,
}

/// Per-key prior-sample table backing rate derivation for either the user
/// pass or the bucket pass. Each aggregator pass owns its own instance.
pub struct RateState {
    priors: DashMap<String, PriorSample>,
}

impl Default for RateState {
    fn default() -> Self {
        Self::new()
    }
}

impl RateState {
    pub fn new() -> Self {
        Self {
            priors: DashMap::new(),
        }
    }

    /// Observe `current` for `key`, returning the rates derived against the
    /// prior sample (zero if this is the first observation, or if the
    /// elapsed time since the prior sample is not positive).
    pub fn observe(&self, key: &str, current: Sample) -> Rates {
        let now = Instant::now();
        let prior = self.priors.get(key).map(|entry| (entry.sample.clone(), entry.at));

        let Some((prior_sample, prior_at)) = prior else {
            self.priors
                .insert(key.to_string(), PriorSample { sample: current, at: now });
            return Rates::default();
        };

        let dt = now.saturating_duration_since(prior_at).as_secs_f64();
        if dt <= 0.0 {
            return Rates::default();
        }

        let delta = |cur: u64, pri: u64| if cur < pri { 0 } else { cur - pri };
        let d_sent = delta(current.bytes_sent, prior_sample.bytes_sent);
        let d_recv = delta(current.bytes_received, prior_sample.bytes_received);
        let d_read = delta(current.read_ops, prior_sample.read_ops);
        let d_write = delta(current.write_ops, prior_sample.write_ops);

        let mut api_ops_per_sec = HashMap::new();
        for (category, &cur_v) in &current.api_ops {
            let pri_v = prior_sample.api_ops.get(category).copied().unwrap_or(0);
            let d = delta(cur_v, pri_v);
            api_ops_per_sec.insert(category.clone(), d as f64 / dt);
        }

        let rates = Rates {
            bytes_sent_per_sec: d_sent as f64 / dt,
            bytes_received_per_sec: d_recv as f64 / dt,
            read_ops_per_sec: d_read as f64 / dt,
            write_ops_per_sec: d_write as f64 / dt,
            throughput_per_sec: (d_sent + d_recv) as f64 / dt,
            ops_per_sec: (d_read + d_write) as f64 / dt,
            api_ops_per_sec,
        };

        self.priors
            .insert(key.to_string(), PriorSample { sample: current, at: now });
        rates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    fn sample(bytes_sent: u64, bytes_received: u64, read_ops: u64, write_ops: u64) -> Sample {
        Sample {
            bytes_sent,
            bytes_received,
            read_ops,
            write_ops,
            api_ops: HashMap::new(),
        }
    }

    #[test]
    fn first_observation_is_always_zero() {
        let state = RateState::new();
        let rates = state.observe("k", sample(1000, 0, 5, 0));
        assert_eq!(rates.bytes_sent_per_sec, 0.0);
        assert_eq!(rates.ops_per_sec, 0.0);
    }

    #[test]
    fn second_observation_derives_a_positive_rate() {
        let state = RateState::new();
        state.observe("k", sample(0, 0, 0, 0));
        sleep(Duration::from_millis(20));
        let rates = state.observe("k", sample(1000, 0, 10, 0));
        assert!(rates.bytes_sent_per_sec > 0.0);
        assert!(rates.read_ops_per_sec > 0.0);
        assert_eq!(rates.write_ops_per_sec, 0.0);
    }

    #[test]
    fn counter_reset_clamps_delta_to_zero_never_negative() {
        let state = RateState::new();
        state.observe("k", sample(1000, 0, 0, 0));
        sleep(Duration::from_millis(20));
        let rates = state.observe("k", sample(300, 0, 0, 0));
        assert_eq!(rates.bytes_sent_per_sec, 0.0);
        assert!(rates.bytes_sent_per_sec >= 0.0);
    }

    #[test]
    fn categories_missing_from_prior_contribute_full_current_value() {
        let state = RateState::new();
        let mut first = sample(0, 0, 0, 0);
        first.api_ops.insert("get_obj".to_string(), 5);
        state.observe("k", first);

        sleep(Duration::from_millis(20));
        let mut second = sample(0, 0, 0, 0);
        second.api_ops.insert("get_obj".to_string(), 10);
        second.api_ops.insert("put_obj".to_string(), 4);
        let rates = state.observe("k", second);

        assert!(rates.api_ops_per_sec["get_obj"] > 0.0);
        assert!(rates.api_ops_per_sec["put_obj"] > 0.0);
    }
}
