//! Built-in scanline decoder for EAN-13 (UPC-A as a leading 0) and EAN-8.
//!
//! Each scanned row is binarized around its own mid-level, run-length encoded,
//! and every dark run preceded by a light run is tried as a start guard. Digit
//! widths are normalized to 7 modules and matched against the L and G width
//! tables in both halves, which lets one pass also read mirrored symbols.

use anyhow::Result;

use super::{
    decoder::{Backend, BarcodeDecoder, Detection},
    frame::Frame,
    FrameSource,
};

/// Rows whose luma range is below this carry no usable contrast.
const MIN_CONTRAST: u8 = 32;
/// Summed per-digit width error (in modules) tolerated for a match.
const MAX_DIGIT_ERROR: f32 = 1.5;
/// Guard bars may deviate this much from one module.
const GUARD_TOLERANCE: f32 = 0.6;

/// L-code run widths (space, bar, space, bar). R-code shares these widths
/// starting with a bar; G-code widths are the L widths reversed.
const L_WIDTHS: [[u8; 4]; 10] = [
    [3, 2, 1, 1],
    [2, 2, 2, 1],
    [2, 1, 2, 2],
    [1, 4, 1, 1],
    [1, 1, 3, 2],
    [1, 2, 3, 1],
    [1, 1, 1, 4],
    [1, 3, 1, 2],
    [1, 2, 1, 3],
    [3, 1, 1, 2],
];

/// Left-half parity for each implied first digit, `true` = G.
const FIRST_DIGIT_PARITY: [[bool; 6]; 10] = [
    [false, false, false, false, false, false],
    [false, false, true, false, true, true],
    [false, false, true, true, false, true],
    [false, false, true, true, true, false],
    [false, true, false, false, true, true],
    [false, true, true, false, false, true],
    [false, true, true, true, false, true],
    [false, true, false, true, false, true],
    [false, true, false, true, true, false],
    [false, true, true, false, true, false],
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Symbology {
    Ean13,
    Ean8,
}

impl Symbology {
    fn digits_per_half(self) -> usize {
        match self {
            Symbology::Ean13 => 6,
            Symbology::Ean8 => 4,
        }
    }

    fn modules(self) -> usize {
        // guards 3 + 5 + 3, 7 per digit
        11 + 14 * self.digits_per_half()
    }

    fn run_count(self) -> usize {
        3 + 4 * self.digits_per_half() + 5 + 4 * self.digits_per_half() + 3
    }

    fn format_name(self) -> &'static str {
        match self {
            Symbology::Ean13 => "ean_13",
            Symbology::Ean8 => "ean_8",
        }
    }
}

#[derive(Debug, Default)]
pub struct EanDecoder;

impl BarcodeDecoder for EanDecoder {
    fn backend(&self) -> Backend {
        Backend::SoftwareDecoder
    }

    fn is_available(&self) -> bool {
        true
    }

    fn detect(&self, frame: &Frame, source: FrameSource) -> Result<Vec<Detection>> {
        let mut detections: Vec<Detection> = Vec::new();
        if frame.is_empty() {
            return Ok(detections);
        }

        for y in scan_rows(frame.height(), source) {
            if let Some((symbology, value)) = decode_row(frame.row(y)) {
                if !detections.iter().any(|d| d.raw_value == value) {
                    detections.push(Detection {
                        raw_value: value,
                        format: Some(symbology.format_name().to_string()),
                    });
                }
                if source == FrameSource::Live {
                    break;
                }
            }
        }

        Ok(detections)
    }
}

/// Live frames get a shallow pass around the centre; stills are swept top to bottom.
fn scan_rows(height: u32, source: FrameSource) -> Vec<u32> {
    let centre = height / 2;
    match source {
        FrameSource::Live => {
            let offset = height / 8;
            let mut rows = vec![
                centre,
                centre.saturating_sub(offset),
                (centre + offset).min(height - 1),
            ];
            rows.dedup();
            rows
        }
        FrameSource::Still | FrameSource::Canvas => {
            let step = (height / 16).max(1);
            let mut rows = vec![centre];
            rows.extend((step / 2..height).step_by(step as usize).filter(|&y| y != centre));
            rows
        }
    }
}

fn decode_row(row: &[u8]) -> Option<(Symbology, String)> {
    let runs = binarize_runs(row)?;

    for start in 1..runs.len() {
        // A start guard opens with a bar after a light quiet zone.
        if !runs[start].0 || runs[start - 1].0 {
            continue;
        }
        let widths: Vec<u32> = runs[start..].iter().map(|&(_, w)| w).collect();
        for symbology in [Symbology::Ean13, Symbology::Ean8] {
            if let Some(value) = decode_at(&widths, symbology) {
                return Some((symbology, value));
            }
        }
    }
    None
}

/// Run-length encode a binarized row as `(is_dark, width)`.
fn binarize_runs(row: &[u8]) -> Option<Vec<(bool, u32)>> {
    let min = *row.iter().min()?;
    let max = *row.iter().max()?;
    if max - min < MIN_CONTRAST {
        return None;
    }
    let threshold = ((u16::from(min) + u16::from(max)) / 2) as u8;

    let mut runs: Vec<(bool, u32)> = Vec::new();
    for &value in row {
        let dark = value < threshold;
        match runs.last_mut() {
            Some((color, width)) if *color == dark => *width += 1,
            _ => runs.push((dark, 1)),
        }
    }
    Some(runs)
}

fn decode_at(widths: &[u32], symbology: Symbology) -> Option<String> {
    let run_count = symbology.run_count();
    if widths.len() < run_count {
        return None;
    }
    let widths = &widths[..run_count];

    let total: u32 = widths.iter().sum();
    let module = total as f32 / symbology.modules() as f32;
    if module < 1.0 {
        return None;
    }

    let half = symbology.digits_per_half();
    let middle = 3 + 4 * half;
    let end = middle + 5 + 4 * half;
    let mut guards = widths[..3]
        .iter()
        .chain(&widths[middle..middle + 5])
        .chain(&widths[end..end + 3]);
    if guards.any(|&w| (w as f32 / module - 1.0).abs() > GUARD_TOLERANCE) {
        return None;
    }

    let left = read_half(&widths[3..middle])?;
    let right = read_half(&widths[middle + 5..end])?;

    let digits = resolve(symbology, left, right)?;
    if !checksum_ok(&digits) {
        return None;
    }
    Some(digits.iter().map(|d| char::from(b'0' + *d)).collect())
}

/// Digits of one half with their parity (`true` = G widths).
fn read_half(widths: &[u32]) -> Option<Vec<(u8, bool)>> {
    widths.chunks_exact(4).map(match_digit).collect()
}

fn match_digit(chunk: &[u32]) -> Option<(u8, bool)> {
    let sum: u32 = chunk.iter().sum();
    if sum == 0 {
        return None;
    }
    let scale = 7.0 / sum as f32;
    let normalized: Vec<f32> = chunk.iter().map(|&w| w as f32 * scale).collect();

    let mut best: Option<(f32, u8, bool)> = None;
    for (digit, pattern) in L_WIDTHS.iter().enumerate() {
        for is_g in [false, true] {
            let error: f32 = (0..4)
                .map(|k| {
                    let expected = if is_g { pattern[3 - k] } else { pattern[k] };
                    (normalized[k] - f32::from(expected)).abs()
                })
                .sum();
            if best.map_or(true, |(e, _, _)| error < e) {
                best = Some((error, digit as u8, is_g));
            }
        }
    }

    best.filter(|(error, _, _)| *error < MAX_DIGIT_ERROR)
        .map(|(_, digit, is_g)| (digit, is_g))
}

/// Turn the two halves into the symbol's digits, reading mirrored symbols too.
fn resolve(symbology: Symbology, left: Vec<(u8, bool)>, right: Vec<(u8, bool)>) -> Option<Vec<u8>> {
    // A mirrored symbol shows its right half first with G-shaped widths, and its
    // left half last with every parity flipped.
    let (left, right) = if left.iter().all(|&(_, g)| g) {
        let true_left: Vec<(u8, bool)> = right.iter().rev().map(|&(d, g)| (d, !g)).collect();
        let true_right: Vec<(u8, bool)> = left.iter().rev().map(|&(d, _)| (d, false)).collect();
        (true_left, true_right)
    } else {
        (left, right)
    };

    if right.iter().any(|&(_, g)| g) {
        return None;
    }

    let mut digits = Vec::with_capacity(13);
    match symbology {
        Symbology::Ean13 => {
            let parity: Vec<bool> = left.iter().map(|&(_, g)| g).collect();
            let first = FIRST_DIGIT_PARITY
                .iter()
                .position(|pattern| pattern[..] == parity[..])?;
            digits.push(first as u8);
        }
        Symbology::Ean8 => {
            if left.iter().any(|&(_, g)| g) {
                return None;
            }
        }
    }
    digits.extend(left.iter().map(|&(d, _)| d));
    digits.extend(right.iter().map(|&(d, _)| d));
    Some(digits)
}

/// Standard EAN check: weights 3 and 1 alternate from the right, excluding the check digit.
fn checksum_ok(digits: &[u8]) -> bool {
    let Some((&check, body)) = digits.split_last() else {
        return false;
    };
    let sum: u32 = body
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| u32::from(d) * if i % 2 == 0 { 3 } else { 1 })
        .sum();
    (10 - sum % 10) % 10 == u32::from(check)
}
