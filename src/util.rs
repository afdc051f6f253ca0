use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Check whether an optional cancellation flag has been raised.
#[must_use]
pub fn cancel_requested(cancel: &Option<Arc<AtomicBool>>) -> bool {
    cancel
        .as_ref()
        .map(|flag| flag.load(Ordering::SeqCst))
        .unwrap_or(false)
}

/// Render a byte count in megabytes with two decimals.
#[must_use]
pub fn format_megabytes(bytes: u64) -> String {
    const MIB: f64 = 1024.0 * 1024.0;
    format!("{:.2} MB", bytes as f64 / MIB)
}

/// Compute download progress as a whole percentage.
#[must_use]
pub fn progress_percent(downloaded: u64, total: Option<u64>) -> u32 {
    match total {
        Some(total) if total > 0 => ((downloaded as f64 / total as f64) * 100.0) as u32,
        _ => 0,
    }
}
