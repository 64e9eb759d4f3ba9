use crate::log_stream::DEFAULT_MAX_ENTRIES;

/// Floor for repeating timer intervals.
pub(super) const MIN_INTERVAL_MS: u64 = 100;

pub(super) fn base_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

pub(super) fn poll_ms() -> u64 {
    15_000
}

pub(super) fn log_tick_ms() -> u64 {
    800
}

pub(super) fn carousel_rotate_ms() -> u64 {
    10_000
}

pub(super) fn carousel_swap_ms() -> u64 {
    500
}

pub(super) fn pipeline_tick_ms() -> u64 {
    2_000
}

pub(super) fn earth_initial_delay_ms() -> u64 {
    1_000
}

pub(super) fn max_entries() -> usize {
    DEFAULT_MAX_ENTRIES
}
