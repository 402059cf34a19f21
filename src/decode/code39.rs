//! Code 39 symbology.
//!
//! Every character is nine elements (five bars, four spaces), exactly
//! three of them wide. Symbols are framed by `*` start/stop characters
//! and characters are separated by a narrow light gap.

use super::scanline::Run;

/// Characters in table order.
const ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ-. $/+%";

/// Element patterns, first element in the most significant of nine bits,
/// 1 meaning wide.
const ENCODINGS: [u16; 43] = [
    0x034, 0x121, 0x061, 0x160, 0x031, 0x130, 0x070, 0x025, 0x124, 0x064, // 0-9
    0x109, 0x049, 0x148, 0x019, 0x118, 0x058, 0x00D, 0x10C, 0x04C, 0x01C, // A-J
    0x103, 0x043, 0x142, 0x013, 0x112, 0x052, 0x007, 0x106, 0x046, 0x016, // K-T
    0x181, 0x0C1, 0x1C0, 0x091, 0x190, 0x0D0, 0x085, 0x184, 0x0C4, 0x0A8, // U-$
    0x0A2, 0x08A, 0x02A, // /-%
];

const ASTERISK: u16 = 0x094;

/// Elements per character.
const ELEMENTS: usize = 9;

/// Quiet zone, in narrow widths, required on both sides of a symbol.
const QUIET_ZONE: usize = 5;

/// Longest payload accepted.
const MAX_CHARS: usize = 48;

/// Quiet-zone width, in modules, emitted by [`render`].
const RENDER_QUIET: usize = 10;

/// Wide element width, in modules, emitted by [`render`].
const RENDER_WIDE: usize = 3;

fn pattern_for(c: u8) -> Option<u16> {
    if c == b'*' {
        return Some(ASTERISK);
    }
    ALPHABET
        .iter()
        .position(|&a| a == c)
        .map(|i| ENCODINGS[i])
}

fn char_for(pattern: u16) -> Option<u8> {
    if pattern == ASTERISK {
        return Some(b'*');
    }
    ENCODINGS
        .iter()
        .position(|&p| p == pattern)
        .map(|i| ALPHABET[i])
}

/// Classifies nine element widths into a wide/narrow bit pattern.
///
/// The three widest elements are wide. Returns `None` when the split is
/// ambiguous: a tie across the boundary or wide elements under 1.5x the
/// widest narrow one.
fn classify(widths: &[usize]) -> Option<(u16, usize)> {
    debug_assert_eq!(widths.len(), ELEMENTS);

    let mut sorted = [0usize; ELEMENTS];
    sorted.copy_from_slice(widths);
    sorted.sort_unstable();

    let widest_narrow = sorted[ELEMENTS - 4];
    let narrowest_wide = sorted[ELEMENTS - 3];
    if narrowest_wide * 2 <= widest_narrow * 3 {
        return None;
    }

    let pattern = widths.iter().fold(0u16, |acc, &w| {
        (acc << 1) | u16::from(w >= narrowest_wide)
    });
    Some((pattern, sorted[0]))
}

/// Reads one character starting at `runs[at]`, which must be a bar.
fn read_char(runs: &[Run], at: usize) -> Option<(u8, usize)> {
    let elements = runs.get(at..at + ELEMENTS)?;
    if !elements[0].dark {
        return None;
    }
    let widths: Vec<usize> = elements.iter().map(|r| r.len).collect();
    let (pattern, narrow) = classify(&widths)?;
    char_for(pattern).map(|c| (c, narrow))
}

/// Reads a full `*...*` symbol whose start character begins at `runs[at]`.
fn read_symbol(runs: &[Run], at: usize) -> Option<String> {
    let (start, narrow) = read_char(runs, at)?;
    if start != b'*' || at == 0 {
        return None;
    }
    let quiet = runs[at - 1];
    if quiet.dark || quiet.len < narrow * QUIET_ZONE {
        return None;
    }

    let mut payload = Vec::new();
    let mut pos = at + ELEMENTS;
    loop {
        // Inter-character gap: a space no wider than a quiet zone.
        let gap = runs.get(pos)?;
        if gap.dark || gap.len >= narrow * QUIET_ZONE {
            return None;
        }
        pos += 1;

        let (c, _) = read_char(runs, pos)?;
        pos += ELEMENTS;
        if c == b'*' {
            let trailing = runs.get(pos)?;
            if trailing.dark || trailing.len < narrow * QUIET_ZONE {
                return None;
            }
            break;
        }
        if payload.len() == MAX_CHARS {
            return None;
        }
        payload.push(c);
    }

    if payload.is_empty() {
        return None;
    }
    String::from_utf8(payload).ok()
}

/// Decodes the first complete Code 39 symbol found in a row's runs.
pub fn decode_runs(runs: &[Run]) -> Option<String> {
    (1..runs.len()).find_map(|at| read_symbol(runs, at))
}

/// Renders `content` as a row of modules, `true` for dark, each module
/// `module_px` pixels wide. Quiet zones are included on both sides.
///
/// Returns `None` if `content` is empty or has characters outside the
/// Code 39 alphabet.
pub fn render(content: &str, module_px: usize) -> Option<Vec<bool>> {
    if content.is_empty() || content.len() > MAX_CHARS || module_px == 0 {
        return None;
    }
    let mut patterns = vec![ASTERISK];
    for c in content.bytes() {
        if c == b'*' {
            return None;
        }
        patterns.push(pattern_for(c)?);
    }
    patterns.push(ASTERISK);

    let mut modules = vec![false; RENDER_QUIET];
    for (i, pattern) in patterns.iter().enumerate() {
        if i > 0 {
            modules.push(false);
        }
        for e in 0..ELEMENTS {
            let wide = pattern & (1 << (ELEMENTS - 1 - e)) != 0;
            let dark = e % 2 == 0;
            let width = if wide { RENDER_WIDE } else { 1 };
            modules.extend(std::iter::repeat(dark).take(width));
        }
    }
    modules.extend(std::iter::repeat(false).take(RENDER_QUIET));

    Some(
        modules
            .into_iter()
            .flat_map(|m| std::iter::repeat(m).take(module_px))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::scanline;

    fn to_pixels(modules: &[bool]) -> Vec<u8> {
        modules.iter().map(|&d| if d { 15 } else { 240 }).collect()
    }

    fn decode_row(row: &[u8]) -> Option<String> {
        decode_runs(&scanline::runs(row, 40))
    }

    #[test]
    fn test_table_has_three_wide_elements() {
        for pattern in ENCODINGS.iter().chain(std::iter::once(&ASTERISK)) {
            assert_eq!(pattern.count_ones(), 3, "pattern {:#05x}", pattern);
        }
    }

    #[test]
    fn test_decodes_rendered_symbol() {
        let row = to_pixels(&render("20190042", 2).unwrap());
        assert_eq!(decode_row(&row).as_deref(), Some("20190042"));
    }

    #[test]
    fn test_decodes_with_surrounding_clutter() {
        let mut row = vec![240u8; 40];
        // A stray bar well before the symbol.
        row[5..9].fill(15);
        row.extend(to_pixels(&render("A-7", 3).unwrap()));
        row.extend(vec![240u8; 40]);
        assert_eq!(decode_row(&row).as_deref(), Some("A-7"));
    }

    #[test]
    fn test_trailing_clutter_rejected() {
        let mut row = vec![240u8; 40];
        row.extend(to_pixels(&render("A-7", 3).unwrap()));
        // Bars start right after the stop character.
        let len = row.len();
        for (i, px) in row[len - 30..].iter_mut().enumerate() {
            *px = if (i / 3) % 2 == 1 { 15 } else { 240 };
        }
        assert_eq!(decode_row(&row), None);
    }

    #[test]
    fn test_stray_bar_after_quiet_zone_ignored() {
        let mut row = to_pixels(&render("A-7", 3).unwrap());
        row.extend(vec![240u8; 10]);
        row.extend(vec![15u8; 4]);
        row.extend(vec![240u8; 10]);
        assert_eq!(decode_row(&row).as_deref(), Some("A-7"));
    }

    #[test]
    fn test_truncated_symbol_not_decoded() {
        let full = to_pixels(&render("12345", 2).unwrap());
        let cut = &full[..full.len() - 40];
        assert_eq!(decode_row(cut), None);
    }

    #[test]
    fn test_render_rejects_unencodable() {
        assert!(render("", 2).is_none());
        assert!(render("abc", 2).is_none());
        assert!(render("A*B", 2).is_none());
        assert!(render("ABC", 0).is_none());
    }

    #[test]
    fn test_classify_requires_clear_ratio() {
        // Wide only 1.25x narrow.
        assert!(classify(&[4, 4, 4, 5, 5, 4, 5, 4, 4]).is_none());
        let (pattern, narrow) = classify(&[2, 2, 2, 6, 6, 2, 6, 2, 2]).unwrap();
        assert_eq!(pattern, 0x034);
        assert_eq!(narrow, 2);
    }
}
