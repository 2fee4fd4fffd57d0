//! Time-windowed inertial sensor history.
//!
//! [`MotionWindow`] keeps two independent, timestamp-ordered sequences:
//!
//! - **Gyroscope** – angular-velocity magnitude `sqrt(x² + y² + z²)` (rad/s).
//! - **Accelerometer** – the raw 3-axis reading (m/s²).
//!
//! Samples are appended from the sensor callback thread while the render
//! thread queries them at capture time, so each sequence sits behind its own
//! [`parking_lot::Mutex`].
//!
//! The windowed mean scans newest → oldest and keeps a sample while
//! `|t − reference| ≤ half_width`; the scan stops at the first sample outside
//! the window.  An empty window yields `None`, never a NaN.
//!
//! # Example
//!
//! ```rust
//! use anchorsight_perception::motion::{MotionWindow, SensorEvent};
//!
//! let window = MotionWindow::new();
//! window.record(SensorEvent::gyroscope(1_000, [3.0, 4.0, 0.0]));
//! window.record(SensorEvent::gyroscope(2_000, [0.0, 0.0, 1.0]));
//!
//! // (5 + 1) / 2
//! assert_eq!(window.gyro_mean(1_500), Some(3.0));
//! ```

use std::collections::VecDeque;

use parking_lot::Mutex;
use tracing::trace;

/// Half-width of the capture window on each side of the frame timestamp.
pub const MOTION_WINDOW_HALF_WIDTH_NS: u64 = 300_000_000;

// ────────────────────────────────────────────────────────────────────────────
// Input types
// ────────────────────────────────────────────────────────────────────────────

/// Which physical sensor produced a reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorKind {
    Gyroscope,
    Accelerometer,
}

/// A raw hardware sensor event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorEvent {
    /// Monotonic timestamp in nanoseconds, same clock as frame timestamps.
    pub timestamp_ns: i64,
    pub kind: SensorKind,
    /// X, Y, Z components.
    pub values: [f32; 3],
}

impl SensorEvent {
    pub fn gyroscope(timestamp_ns: i64, values: [f32; 3]) -> Self {
        Self {
            timestamp_ns,
            kind: SensorKind::Gyroscope,
            values,
        }
    }

    pub fn accelerometer(timestamp_ns: i64, values: [f32; 3]) -> Self {
        Self {
            timestamp_ns,
            kind: SensorKind::Accelerometer,
            values,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Sample<T> {
    timestamp_ns: i64,
    value: T,
}

// ────────────────────────────────────────────────────────────────────────────
// MotionWindow
// ────────────────────────────────────────────────────────────────────────────

/// Gyroscope and accelerometer history with a windowed-mean query.
#[derive(Debug)]
pub struct MotionWindow {
    half_width_ns: u64,
    gyro: Mutex<VecDeque<Sample<f64>>>,
    accel: Mutex<VecDeque<Sample<[f64; 3]>>>,
}

impl MotionWindow {
    /// Window with the standard ±300 ms half-width.
    pub fn new() -> Self {
        Self::with_half_width(MOTION_WINDOW_HALF_WIDTH_NS)
    }

    pub fn with_half_width(half_width_ns: u64) -> Self {
        Self {
            half_width_ns,
            gyro: Mutex::new(VecDeque::new()),
            accel: Mutex::new(VecDeque::new()),
        }
    }

    pub fn half_width_ns(&self) -> u64 {
        self.half_width_ns
    }

    /// Append a sensor event to the matching sequence.
    pub fn record(&self, event: SensorEvent) {
        let [x, y, z] = event.values.map(f64::from);
        match event.kind {
            SensorKind::Gyroscope => self.gyro.lock().push_back(Sample {
                timestamp_ns: event.timestamp_ns,
                value: (x * x + y * y + z * z).sqrt(),
            }),
            SensorKind::Accelerometer => self.accel.lock().push_back(Sample {
                timestamp_ns: event.timestamp_ns,
                value: [x, y, z],
            }),
        }
    }

    /// Mean gyroscope magnitude around `reference_ns`.
    pub fn gyro_mean(&self, reference_ns: i64) -> Option<f64> {
        self.gyro_windowed_mean(reference_ns, self.half_width_ns)
    }

    /// Component-wise mean acceleration around `reference_ns`.
    pub fn accel_mean(&self, reference_ns: i64) -> Option<[f64; 3]> {
        self.accel_windowed_mean(reference_ns, self.half_width_ns)
    }

    pub fn gyro_windowed_mean(&self, reference_ns: i64, half_width_ns: u64) -> Option<f64> {
        let samples = self.gyro.lock();
        let mut sum = 0.0;
        let mut count = 0usize;
        for value in in_window(&samples, reference_ns, half_width_ns) {
            sum += value;
            count += 1;
        }
        trace!(count, reference_ns, "gyro window scanned");
        (count > 0).then(|| sum / count as f64)
    }

    pub fn accel_windowed_mean(&self, reference_ns: i64, half_width_ns: u64) -> Option<[f64; 3]> {
        let samples = self.accel.lock();
        let mut sum = [0.0; 3];
        let mut count = 0usize;
        for value in in_window(&samples, reference_ns, half_width_ns) {
            for (acc, v) in sum.iter_mut().zip(value) {
                *acc += v;
            }
            count += 1;
        }
        trace!(count, reference_ns, "accelerometer window scanned");
        (count > 0).then(|| sum.map(|s| s / count as f64))
    }

    /// Number of buffered (gyroscope, accelerometer) samples.
    pub fn len(&self) -> (usize, usize) {
        (self.gyro.lock().len(), self.accel.lock().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == (0, 0)
    }

    /// Drop every buffered sample from both sequences.
    pub fn clear(&self) {
        self.gyro.lock().clear();
        self.accel.lock().clear();
    }
}

impl Default for MotionWindow {
    fn default() -> Self {
        Self::new()
    }
}

/// Newest-first values whose timestamps lie within `half_width_ns` of
/// `reference_ns`, stopping at the first sample outside the window.
fn in_window<T: Copy>(
    samples: &VecDeque<Sample<T>>,
    reference_ns: i64,
    half_width_ns: u64,
) -> impl Iterator<Item = T> + '_ {
    samples
        .iter()
        .rev()
        .take_while(move |s| s.timestamp_ns.abs_diff(reference_ns) <= half_width_ns)
        .map(|s| s.value)
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
