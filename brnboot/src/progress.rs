//! Progress notifications.

/// Advisory progress of a running operation.
///
/// Reported roughly once per received dump line, written chunk or uploaded
/// packet. Callbacks cannot influence the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Progress {
    /// Device address the operation has reached.
    pub current_address: u64,
    /// Bytes read, written or sent so far.
    pub bytes_processed: u64,
    /// Bytes the operation will handle in total.
    pub total_bytes: u64,
}

impl Progress {
    /// Completed fraction in `0.0..=1.0`. An empty operation counts as done.
    pub fn fraction(&self) -> f64 {
        if self.total_bytes == 0 {
            return 1.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let fraction = self.bytes_processed as f64 / self.total_bytes as f64;
        fraction.min(1.0)
    }
}
