//! Fixed-capacity circular buffer of decoded camera frames.
//!
//! [`FrameRing`] always owns exactly `capacity` slots.  `position` is the
//! next slot to be written and wraps modulo `capacity`; slots stay empty
//! until the ring has been filled once.
//!
//! The ring is single-writer: frames are written from the render loop and
//! read back from the same thread when a capture is triggered, so it carries
//! no lock of its own.
//!
//! # Example
//!
//! ```rust
//! use anchorsight_perception::frame_ring::{Frame, FrameRing, RgbImage};
//!
//! let mut ring = FrameRing::with_capacity(3);
//! for ts in 0..5 {
//!     ring.write(Frame::new(ts, RgbImage::solid(1, 1, [0, 0, 0])));
//! }
//! assert_eq!(ring.position(), 2);
//! assert_eq!(ring.read_latest().unwrap().timestamp_ns, 4);
//! ```

/// Number of frames kept for the "previous frames" capture option.
pub const FRAME_RING_CAPACITY: usize = 100;

/// A decoded RGB24 bitmap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbImage {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Row-major RGB24 pixel data (`width * height * 3` bytes).
    pub data: Vec<u8>,
}

impl RgbImage {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data,
        }
    }

    /// An image filled with a single colour.
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let pixels = width as usize * height as usize;
        let mut data = Vec::with_capacity(pixels * 3);
        for _ in 0..pixels {
            data.extend_from_slice(&rgb);
        }
        Self::new(width, height, data)
    }
}

/// One camera frame: monotonic timestamp plus the decoded image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Capture time in monotonic nanoseconds.
    pub timestamp_ns: i64,
    pub image: RgbImage,
}

impl Frame {
    pub fn new(timestamp_ns: i64, image: RgbImage) -> Self {
        Self {
            timestamp_ns,
            image,
        }
    }
}

/// Overwriting ring buffer of [`Frame`]s.
#[derive(Debug)]
pub struct FrameRing {
    slots: Vec<Option<Frame>>,
    position: usize,
}

impl FrameRing {
    /// Ring with the default capacity of [`FRAME_RING_CAPACITY`].
    pub fn new() -> Self {
        Self::with_capacity(FRAME_RING_CAPACITY)
    }

    /// Ring with `capacity` slots.  A capacity of zero is raised to one.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            position: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Index of the next slot to be written.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Number of slots currently holding a frame.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Store `frame` at `position`, overwriting whatever was there, then
    /// advance `position`.
    pub fn write(&mut self, frame: Frame) {
        let capacity = self.capacity();
        self.slots[self.position] = Some(frame);
        self.position = (self.position + 1) % capacity;
    }

    /// The most recently written frame, i.e. slot `position − 1 (mod capacity)`.
    pub fn read_latest(&self) -> Option<&Frame> {
        let capacity = self.capacity();
        let index = (self.position + capacity - 1) % capacity;
        self.slots[index].as_ref()
    }

    /// Every stored frame, oldest first.
    pub fn read_all(&self) -> Vec<&Frame> {
        let (newer, older) = self.slots.split_at(self.position);
        older
            .iter()
            .chain(newer.iter())
            .filter_map(Option::as_ref)
            .collect()
    }

    /// Stored frames paired with their slot index, in slot order.
    pub fn slots(&self) -> impl Iterator<Item = (usize, &Frame)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(slot, frame)| frame.as_ref().map(|f| (slot, f)))
    }
}

impl Default for FrameRing {
    fn default() -> Self {
        Self::new()
    }
}
