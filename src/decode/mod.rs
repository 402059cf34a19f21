//! Barcode decoding.
//!
//! Turns a captured frame into at most one scanned string. Most frames
//! show no barcode at all, so "nothing found" is an ordinary `None`, not
//! an error.

pub mod code39;
pub mod scanline;

use crate::capture::Frame;
use chrono::{DateTime, Utc};

/// A raw string read from a barcode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedId {
    /// Symbol payload, exactly as decoded.
    pub text: String,
    /// Capture time of the frame it was read from.
    pub decoded_at: DateTime<Utc>,
    /// Sequence number of that frame.
    pub frame_sequence: u64,
}

/// Stateless frame-to-identifier transform.
///
/// Implementations must not keep mutable state between calls; the
/// capture worker may call `decode` on every frame.
pub trait BarcodeDecoder: Send {
    /// Decodes the frame, returning `None` when no symbol is readable.
    fn decode(&self, frame: &Frame) -> Option<DecodedId>;
}

impl<D: BarcodeDecoder + ?Sized> BarcodeDecoder for Box<D> {
    fn decode(&self, frame: &Frame) -> Option<DecodedId> {
        (**self).decode(frame)
    }
}

/// Scanline Code 39 reader.
///
/// Samples evenly spaced rows and reports a payload once enough rows
/// agree on it.
#[derive(Debug, Clone)]
pub struct Code39Decoder {
    scan_lines: u32,
    min_agreement: usize,
    min_contrast: u8,
}

impl Default for Code39Decoder {
    fn default() -> Self {
        Self {
            scan_lines: 9,
            min_agreement: 2,
            min_contrast: 48,
        }
    }
}

impl Code39Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of sampled rows and how many must agree.
    pub fn with_scan_lines(mut self, scan_lines: u32, min_agreement: usize) -> Self {
        self.scan_lines = scan_lines.max(1);
        self.min_agreement = min_agreement.clamp(1, self.scan_lines as usize);
        self
    }

    /// Rows sampled, center first and moving outward.
    fn sample_rows(&self, height: u32) -> Vec<u32> {
        let n = self.scan_lines.min(height);
        let mut rows: Vec<u32> = (1..=n)
            .map(|i| (u64::from(height) * u64::from(i) / u64::from(n + 1)) as u32)
            .collect();
        let center = height / 2;
        rows.sort_by_key(|&y| y.abs_diff(center));
        rows.dedup();
        rows
    }
}

impl BarcodeDecoder for Code39Decoder {
    fn decode(&self, frame: &Frame) -> Option<DecodedId> {
        if !frame.is_valid() {
            tracing::debug!(?frame, "Skipping malformed frame");
            return None;
        }

        let mut votes: Vec<(String, usize)> = Vec::new();
        for y in self.sample_rows(frame.height()) {
            let Some(row) = frame.row(y) else { continue };
            let Some(text) = code39::decode_runs(&scanline::runs(row, self.min_contrast)) else {
                continue;
            };

            let count = match votes.iter_mut().find(|(t, _)| *t == text) {
                Some((_, count)) => {
                    *count += 1;
                    *count
                }
                None => {
                    votes.push((text.clone(), 1));
                    1
                }
            };

            if count >= self.min_agreement {
                tracing::trace!(sequence = frame.sequence(), %text, row = y, "Decoded barcode");
                return Some(DecodedId {
                    text,
                    decoded_at: frame.timestamp(),
                    frame_sequence: frame.sequence(),
                });
            }
        }
        None
    }
}
