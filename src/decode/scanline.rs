//! Row binarization and run-length extraction.
//!
//! A linear barcode is read one pixel row at a time: the row is split at
//! the midpoint between its darkest and brightest pixel, then collapsed
//! into alternating dark/light runs.

/// A maximal stretch of same-colored pixels along a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Run {
    /// True for a bar (dark), false for a space (light).
    pub dark: bool,
    /// Width in pixels.
    pub len: usize,
}

/// Returns the binarization threshold for a row, or `None` if the row
/// has less than `min_contrast` between its extremes.
pub fn threshold(row: &[u8], min_contrast: u8) -> Option<u8> {
    let (min, max) = row
        .iter()
        .fold((u8::MAX, u8::MIN), |(lo, hi), &p| (lo.min(p), hi.max(p)));
    if row.is_empty() || max - min < min_contrast {
        return None;
    }
    Some(min + (max - min) / 2)
}

/// Collapses a row into dark/light runs.
///
/// Returns an empty vector for flat rows, which is the common case for
/// frames with nothing in front of the camera.
pub fn runs(row: &[u8], min_contrast: u8) -> Vec<Run> {
    let Some(cut) = threshold(row, min_contrast) else {
        return Vec::new();
    };

    let mut out: Vec<Run> = Vec::new();
    for &p in row {
        let dark = p < cut;
        match out.last_mut() {
            Some(run) if run.dark == dark => run.len += 1,
            _ => out.push(Run { dark, len: 1 }),
        }
    }
    out
}
