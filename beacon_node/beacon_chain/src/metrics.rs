//! Prometheus metrics for the process-wide caches.
//!
//! Metric creation is fallible (name collisions, registry errors); the
//! `Result` is stored and the increment helpers silently no-op on a failed
//! metric, so instrumentation can never take down consensus code.

use lazy_static::lazy_static;
pub use prometheus::Error;
use prometheus::{IntCounter, Opts};

pub type Result<T> = std::result::Result<T, Error>;

/// Attempts to create an `IntCounter`, returning `Err` if the registry does
/// not accept the counter (potentially due to naming conflict).
pub fn try_create_int_counter(name: &str, help: &str) -> Result<IntCounter> {
    let opts = Opts::new(name, help);
    let counter = IntCounter::with_opts(opts)?;
    prometheus::register(Box::new(counter.clone()))?;
    Ok(counter)
}

/// If `counter.is_ok()`, increment it.
pub fn inc_counter(counter: &Result<IntCounter>) {
    if let Ok(counter) = counter {
        counter.inc();
    }
}

lazy_static! {
    pub static ref SKIP_SLOT_CACHE_HITS: Result<IntCounter> = try_create_int_counter(
        "beacon_skip_slot_cache_hits_total",
        "Count of times the skip-slot cache returned an advanced state"
    );
    pub static ref SKIP_SLOT_CACHE_MISSES: Result<IntCounter> = try_create_int_counter(
        "beacon_skip_slot_cache_misses_total",
        "Count of times the skip-slot cache had nothing for a key"
    );
    pub static ref SKIP_SLOT_CACHE_WAITS: Result<IntCounter> = try_create_int_counter(
        "beacon_skip_slot_cache_waits_total",
        "Count of times a caller waited on another in-progress advancement"
    );
    pub static ref SHUFFLING_CACHE_HITS: Result<IntCounter> = try_create_int_counter(
        "beacon_shuffling_cache_hits_total",
        "Count of times the shuffling cache returned a committee cache"
    );
    pub static ref SHUFFLING_CACHE_MISSES: Result<IntCounter> = try_create_int_counter(
        "beacon_shuffling_cache_misses_total",
        "Count of times the shuffling cache had nothing for a seed"
    );
    pub static ref PROPOSER_CACHE_ZERO_DECISION_ROOT: Result<IntCounter> =
        try_create_int_counter(
            "beacon_proposer_cache_zero_decision_root_total",
            "Count of times proposer caching was skipped because the shuffling \
             decision root was unknown (zero)"
        );
}
