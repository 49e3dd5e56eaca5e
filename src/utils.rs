use std::time::Duration;

/// Format a `Duration` as a human-readable string with automatic unit
/// scaling, e.g. `1.94ms`, `2.34s`.
pub fn fmt_duration(d: Duration) -> String {
    format!("{d:.2?}")
}
