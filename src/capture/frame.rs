//! Frame type representing a captured image with metadata.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;

/// A single captured grayscale frame.
///
/// Frames are immutable once built. The pixel buffer sits behind an
/// `Arc` so the same image can go to the display queue and the decoder
/// without copying it.
#[derive(Clone)]
pub struct Frame {
    /// Luma pixel data, row-major, one byte per pixel.
    pixels: Arc<[u8]>,
    /// Frame width in pixels.
    width: u32,
    /// Frame height in pixels.
    height: u32,
    /// Monotonic capture instant, used for throttling.
    instant: Instant,
    /// Wall-clock capture time, used for attendance timestamps.
    captured_at: DateTime<Utc>,
    /// Monotonic sequence number assigned by the source.
    sequence: u64,
}

impl Frame {
    /// Creates a new frame stamped with the current time.
    pub fn new(pixels: Vec<u8>, width: u32, height: u32, sequence: u64) -> Self {
        Self::captured_at(pixels, width, height, sequence, Utc::now())
    }

    /// Creates a frame with an explicit wall-clock capture time.
    pub fn captured_at(
        pixels: Vec<u8>,
        width: u32,
        height: u32,
        sequence: u64,
        captured_at: DateTime<Utc>,
    ) -> Self {
        Self {
            pixels: pixels.into(),
            width,
            height,
            instant: Instant::now(),
            captured_at,
            sequence,
        }
    }

    /// Returns a reference to the raw pixel data.
    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Returns the frame width.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Returns the frame height.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Returns the monotonic capture instant.
    #[inline]
    pub fn instant(&self) -> Instant {
        self.instant
    }

    /// Returns the wall-clock capture time.
    #[inline]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// Returns the sequence number.
    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Returns the total number of pixels (width * height).
    #[inline]
    pub fn pixel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    /// Validates that the pixel buffer size matches dimensions.
    pub fn is_valid(&self) -> bool {
        self.pixels.len() == self.pixel_count()
    }

    /// Returns one row of pixels, or `None` if out of range or the
    /// buffer is malformed.
    pub fn row(&self, y: u32) -> Option<&[u8]> {
        if y >= self.height || !self.is_valid() {
            return None;
        }
        let w = self.width as usize;
        let start = y as usize * w;
        Some(&self.pixels[start..start + w])
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("sequence", &self.sequence)
            .field("captured_at", &self.captured_at)
            .field("pixel_bytes", &self.pixels.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_creation() {
        let pixels = vec![0u8; 610 * 400];
        let frame = Frame::new(pixels, 610, 400, 1);

        assert_eq!(frame.width(), 610);
        assert_eq!(frame.height(), 400);
        assert_eq!(frame.sequence(), 1);
        assert!(frame.is_valid());
    }

    #[test]
    fn test_frame_invalid_size() {
        let pixels = vec![0u8; 100];
        let frame = Frame::new(pixels, 640, 480, 1);

        assert!(!frame.is_valid());
        assert!(frame.row(0).is_none());
    }

    #[test]
    fn test_row_access() {
        let pixels: Vec<u8> = (0..12).collect();
        let frame = Frame::new(pixels, 4, 3, 1);

        assert_eq!(frame.row(1), Some(&[4u8, 5, 6, 7][..]));
        assert!(frame.row(3).is_none());
    }

    #[test]
    fn test_clone_shares_pixels() {
        let frame = Frame::new(vec![7u8; 16], 4, 4, 9);
        let copy = frame.clone();
        assert!(std::ptr::eq(frame.pixels().as_ptr(), copy.pixels().as_ptr()));
    }
}
