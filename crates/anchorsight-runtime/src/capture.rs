//! [`CaptureAssembler`] – builds the classification upload from the latest
//! frame, the inertial window around it and the visible anchors.
//!
//! # Payload fields
//!
//! | Field | Present when | Value |
//! |---|---|---|
//! | `image_bytes` | always | base64 of the latest frame as PNG |
//! | `anchor_IDs` | `anchors` | `[id1, id2]` |
//! | `gyro_readings` | `gyroscope` and samples in window | mean magnitude |
//! | `accX_readings`, `accY_readings`, `accZ_readings` | `accelerometer` and samples in window | component means |
//! | `frame0` … `frame99` | `previous_frames` | base64 PNG of the frame in ring slot `i` |
//! | `valid_frames` | `previous_frames` | number of `frame{i}` fields |
//! | `multiUser` | always | `multi` or `single` |
//!
//! Assembling a payload clears the [`MotionWindow`], so the next capture
//! never averages samples from this one.
//!
//! # Example
//!
//! ```rust
//! use anchorsight_perception::frame_ring::{Frame, FrameRing, RgbImage};
//! use anchorsight_perception::motion::{MotionWindow, SensorEvent};
//! use anchorsight_runtime::capture::{CaptureAssembler, CaptureConfig};
//!
//! let mut ring = FrameRing::new();
//! ring.write(Frame::new(1_000, RgbImage::solid(2, 2, [0, 0, 0])));
//! let motion = MotionWindow::new();
//! motion.record(SensorEvent::gyroscope(1_000, [0.0, 3.0, 4.0]));
//!
//! let assembler = CaptureAssembler::new(CaptureConfig::default());
//! let payload = assembler.assemble(&ring, &motion, &["ua-1".into()]).unwrap();
//!
//! assert_eq!(payload.get("gyro_readings"), Some("5"));
//! assert_eq!(payload.get("anchor_IDs"), Some("[ua-1]"));
//! assert!(motion.is_empty());
//! ```

use std::collections::BTreeMap;

use anchorsight_perception::frame_ring::{FrameRing, RgbImage};
use anchorsight_perception::motion::MotionWindow;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;
use tracing::{debug, info, warn};

// ────────────────────────────────────────────────────────────────────────────
// Configuration
// ────────────────────────────────────────────────────────────────────────────

/// Which optional fields a capture carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub gyroscope: bool,
    pub accelerometer: bool,
    pub anchors: bool,
    pub previous_frames: bool,
    /// Reported to the classifier as `multiUser`.
    pub multi_user: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            gyroscope: true,
            accelerometer: true,
            anchors: true,
            previous_frames: false,
            multi_user: false,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Image encoding
// ────────────────────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("PNG encoding failed: {0}")]
    Png(#[from] png::EncodingError),
}

/// Turns a decoded frame into the bytes uploaded for it.
pub trait ImageEncoder: Send + Sync {
    fn encode(&self, image: &RgbImage) -> Result<Vec<u8>, EncodeError>;
}

/// 8-bit RGB PNG encoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct PngEncoder;

impl ImageEncoder for PngEncoder {
    fn encode(&self, image: &RgbImage) -> Result<Vec<u8>, EncodeError> {
        let mut out = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut out, image.width, image.height);
            encoder.set_color(png::ColorType::Rgb);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder.write_header()?;
            writer.write_image_data(&image.data)?;
            writer.finish()?;
        }
        Ok(out)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Payload
// ────────────────────────────────────────────────────────────────────────────

/// Named string fields, POSTed form-url-encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturePayload {
    /// Timestamp of the frame the payload was built around.
    pub frame_timestamp_ns: i64,
    fields: BTreeMap<String, String>,
}

impl CapturePayload {
    fn new(frame_timestamp_ns: i64) -> Self {
        Self {
            frame_timestamp_ns,
            fields: BTreeMap::new(),
        }
    }

    fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl Serialize for CapturePayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}

/// `[a, b, c]`
pub fn render_id_list(ids: &[String]) -> String {
    format!("[{}]", ids.join(", "))
}

// ────────────────────────────────────────────────────────────────────────────
// Assembler
// ────────────────────────────────────────────────────────────────────────────

pub struct CaptureAssembler {
    config: CaptureConfig,
    encoder: Box<dyn ImageEncoder>,
}

impl CaptureAssembler {
    /// Assembler using [`PngEncoder`].
    pub fn new(config: CaptureConfig) -> Self {
        Self::with_encoder(config, Box::new(PngEncoder))
    }

    pub fn with_encoder(config: CaptureConfig, encoder: Box<dyn ImageEncoder>) -> Self {
        Self { config, encoder }
    }

    pub fn config(&self) -> CaptureConfig {
        self.config
    }

    pub fn set_config(&mut self, config: CaptureConfig) {
        self.config = config;
    }

    fn encode(&self, image: &RgbImage) -> Result<String, EncodeError> {
        Ok(STANDARD.encode(self.encoder.encode(image)?))
    }

    /// Build a payload around the most recently written frame.
    ///
    /// Returns `None`, leaving `motion` untouched, when no frame has been
    /// written yet or the latest frame cannot be encoded.
    pub fn assemble(
        &self,
        ring: &FrameRing,
        motion: &MotionWindow,
        visible_ids: &[String],
    ) -> Option<CapturePayload> {
        let Some(latest) = ring.read_latest() else {
            debug!("capture skipped: no frame written yet");
            return None;
        };
        let reference = latest.timestamp_ns;
        let image_bytes = match self.encode(&latest.image) {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!(frame_timestamp_ns = reference, error = %e, "capture skipped");
                return None;
            }
        };
        let mut payload = CapturePayload::new(reference);
        payload.insert("image_bytes", image_bytes);

        if self.config.anchors {
            payload.insert("anchor_IDs", render_id_list(visible_ids));
        }

        if self.config.gyroscope {
            if let Some(mean) = motion.gyro_mean(reference) {
                payload.insert("gyro_readings", mean.to_string());
            }
        }

        if self.config.accelerometer {
            if let Some([x, y, z]) = motion.accel_mean(reference) {
                payload.insert("accX_readings", x.to_string());
                payload.insert("accY_readings", y.to_string());
                payload.insert("accZ_readings", z.to_string());
            }
        }

        if self.config.previous_frames {
            let mut valid = 0usize;
            for (slot, frame) in ring.slots() {
                match self.encode(&frame.image) {
                    Ok(encoded) => {
                        payload.insert(format!("frame{slot}"), encoded);
                        valid += 1;
                    }
                    Err(e) => warn!(slot, error = %e, "previous frame dropped"),
                }
            }
            payload.insert("valid_frames", valid.to_string());
        }

        let users = if self.config.multi_user { "multi" } else { "single" };
        payload.insert("multiUser", users);

        motion.clear();
        info!(
            frame_timestamp_ns = reference,
            fields = payload.len(),
            "capture assembled"
        );
        Some(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anchorsight_perception::frame_ring::Frame;
    use anchorsight_perception::motion::SensorEvent;

    const T: i64 = 5_000_000_000;

    fn ring_with(timestamps: &[i64]) -> FrameRing {
        let mut ring = FrameRing::new();
        for &ts in timestamps {
            ring.write(Frame::new(ts, RgbImage::solid(1, 1, [ts as u8, 0, 0])));
        }
        ring
    }

    fn all_on() -> CaptureConfig {
        CaptureConfig {
            gyroscope: true,
            accelerometer: true,
            anchors: true,
            previous_frames: true,
            multi_user: true,
        }
    }

    #[test]
    fn no_frame_means_no_payload_and_motion_kept() {
        let motion = MotionWindow::new();
        motion.record(SensorEvent::gyroscope(T, [1.0, 0.0, 0.0]));
        let assembler = CaptureAssembler::new(all_on());
        assert!(assembler.assemble(&FrameRing::new(), &motion, &[]).is_none());
        assert!(!motion.is_empty());
    }

    /// Decode a base64 PNG field back to `(width, height, rgb bytes)`.
    fn decode_png(field: &str) -> (u32, u32, Vec<u8>) {
        let bytes = STANDARD.decode(field).unwrap();
        let mut reader = png::Decoder::new(&bytes[..]).read_info().unwrap();
        let mut buf = vec![0; reader.output_buffer_size()];
        let info = reader.next_frame(&mut buf).unwrap();
        buf.truncate(info.buffer_size());
        (info.width, info.height, buf)
    }

    struct FailingEncoder;

    impl ImageEncoder for FailingEncoder {
        fn encode(&self, _image: &RgbImage) -> Result<Vec<u8>, EncodeError> {
            Err(EncodeError::Png(png::EncodingError::LimitsExceeded))
        }
    }

    #[test]
    fn image_bytes_are_base64_png() {
        let ring = ring_with(&[T]);
        let payload = CaptureAssembler::new(CaptureConfig::default())
            .assemble(&ring, &MotionWindow::new(), &[])
            .unwrap();
        let raw = STANDARD.decode(payload.get("image_bytes").unwrap()).unwrap();
        assert!(raw.starts_with(b"\x89PNG\r\n\x1a\n"));

        let (w, h, rgb) = decode_png(payload.get("image_bytes").unwrap());
        assert_eq!((w, h), (1, 1));
        assert_eq!(rgb, vec![T as u8, 0, 0]);
    }

    #[test]
    fn png_keeps_dimensions_and_pixels() {
        let bytes = PngEncoder.encode(&RgbImage::solid(2, 1, [1, 2, 3])).unwrap();
        let (w, h, rgb) = decode_png(&STANDARD.encode(bytes));
        assert_eq!((w, h), (2, 1));
        assert_eq!(rgb, vec![1, 2, 3, 1, 2, 3]);
    }

    #[test]
    fn unencodable_frame_skips_capture_and_keeps_motion() {
        let ring = ring_with(&[T]);
        let motion = MotionWindow::new();
        motion.record(SensorEvent::gyroscope(T, [1.0, 0.0, 0.0]));
        let assembler = CaptureAssembler::with_encoder(all_on(), Box::new(FailingEncoder));
        assert!(assembler.assemble(&ring, &motion, &[]).is_none());
        assert!(!motion.is_empty());
    }

    #[test]
    fn uses_latest_frame_and_windows_around_it() {
        let ring = ring_with(&[T - 1_000_000_000, T]);
        let motion = MotionWindow::new();
        motion.record(SensorEvent::gyroscope(T - 1_000_000_000, [50.0, 0.0, 0.0]));
        motion.record(SensorEvent::gyroscope(T - 100, [2.0, 0.0, 0.0]));
        motion.record(SensorEvent::gyroscope(T + 100, [4.0, 0.0, 0.0]));

        let payload = CaptureAssembler::new(CaptureConfig::default())
            .assemble(&ring, &motion, &[])
            .unwrap();
        assert_eq!(payload.frame_timestamp_ns, T);
        assert_eq!(payload.get("gyro_readings"), Some("3"));
    }

    #[test]
    fn accelerometer_components_are_independent() {
        let ring = ring_with(&[T]);
        let motion = MotionWindow::new();
        motion.record(SensorEvent::accelerometer(T, [1.0, 2.0, 3.0]));
        motion.record(SensorEvent::accelerometer(T + 1, [2.0, 4.0, 6.0]));
        let payload = CaptureAssembler::new(CaptureConfig::default())
            .assemble(&ring, &motion, &[])
            .unwrap();
        assert_eq!(payload.get("accX_readings"), Some("1.5"));
        assert_eq!(payload.get("accY_readings"), Some("3"));
        assert_eq!(payload.get("accZ_readings"), Some("4.5"));
    }

    #[test]
    fn empty_sensor_window_omits_fields() {
        let ring = ring_with(&[T]);
        let payload = CaptureAssembler::new(CaptureConfig::default())
            .assemble(&ring, &MotionWindow::new(), &[])
            .unwrap();
        assert!(!payload.contains("gyro_readings"));
        assert!(!payload.contains("accX_readings"));
        assert_eq!(payload.get("anchor_IDs"), Some("[]"));
    }

    #[test]
    fn disabled_toggles_omit_fields() {
        let ring = ring_with(&[T]);
        let motion = MotionWindow::new();
        motion.record(SensorEvent::gyroscope(T, [1.0, 0.0, 0.0]));
        motion.record(SensorEvent::accelerometer(T, [1.0, 0.0, 0.0]));
        let config = CaptureConfig {
            gyroscope: false,
            accelerometer: false,
            anchors: false,
            previous_frames: false,
            multi_user: false,
        };
        let payload = CaptureAssembler::new(config)
            .assemble(&ring, &motion, &["ua-1".into()])
            .unwrap();
        let names: Vec<&str> = payload.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["image_bytes", "multiUser"]);
        assert_eq!(payload.get("multiUser"), Some("single"));
        // Motion is cleared even when its fields were not requested.
        assert!(motion.is_empty());
    }

    fn red_of(payload: &CapturePayload, field: &str) -> u8 {
        decode_png(payload.get(field).unwrap()).2[0]
    }

    #[test]
    fn previous_frames_are_named_by_ring_slot() {
        // 120 writes wrap the 100-slot ring: slots 0..20 hold ts 100..120,
        // slots 20..100 still hold ts 20..100. Red channel carries the ts.
        let timestamps: Vec<i64> = (0..120).collect();
        let ring = ring_with(&timestamps);
        let payload = CaptureAssembler::new(all_on())
            .assemble(&ring, &MotionWindow::new(), &[])
            .unwrap();
        assert_eq!(payload.get("valid_frames"), Some("100"));
        assert!(payload.contains("frame99"));
        assert!(!payload.contains("frame100"));

        assert_eq!(red_of(&payload, "frame0"), 100);
        assert_eq!(red_of(&payload, "frame19"), 119);
        assert_eq!(red_of(&payload, "frame20"), 20);
        assert_eq!(red_of(&payload, "frame99"), 99);
        assert_eq!(payload.get("multiUser"), Some("multi"));
    }

    #[test]
    fn partial_ring_counts_only_filled_slots() {
        let ring = ring_with(&[1, 2, 3]);
        let payload = CaptureAssembler::new(all_on())
            .assemble(&ring, &MotionWindow::new(), &[])
            .unwrap();
        assert_eq!(payload.get("valid_frames"), Some("3"));
        assert_eq!(red_of(&payload, "frame2"), 3);
        assert!(!payload.contains("frame3"));
    }

    #[test]
    fn anchor_ids_render_as_list() {
        assert_eq!(render_id_list(&[]), "[]");
        assert_eq!(
            render_id_list(&["ua-1".to_string(), "ua-2".to_string()]),
            "[ua-1, ua-2]"
        );
    }

    #[test]
    fn payload_serializes_as_form() {
        let ring = ring_with(&[T]);
        let payload = CaptureAssembler::new(CaptureConfig::default())
            .assemble(&ring, &MotionWindow::new(), &["a b".into()])
            .unwrap();
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["anchor_IDs"], "[a b]");
        assert_eq!(json["multiUser"], "single");
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: CaptureConfig = serde_json::from_str(r#"{"previous_frames": true}"#).unwrap();
        assert!(config.previous_frames);
        assert!(config.gyroscope);
        assert!(!config.multi_user);
    }
}
