//! Formatted output helpers for CLI commands.

/// Formats a CPU time in nanoseconds into a human-readable string.
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn format_cpu_time(ns: u64) -> String {
    const MS: u64 = 1_000_000;
    const SEC: u64 = 1_000 * MS;
    const MIN: u64 = 60 * SEC;

    if ns >= MIN {
        format!("{}m{:02}s", ns / MIN, (ns % MIN) / SEC)
    } else if ns >= SEC {
        format!("{:.1}s", ns as f64 / SEC as f64)
    } else {
        format!("{}ms", ns / MS)
    }
}
