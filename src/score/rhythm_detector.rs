//! Heuristic quantization of raw chord durations onto canonical note
//! values. The snapping is deliberately approximate; sustains in the source
//! material rarely land on exact rhythmic boundaries.

use crate::score::song::Bar;

/// Canonical tick values, longest first: straight, dotted and triplet
/// variants from a whole note down to a sixty-fourth.
pub const CANONICAL_TICKS: [u32; 16] = [192, 144, 96, 72, 48, 36, 32, 24, 18, 16, 12, 9, 8, 6, 4, 3];

/// A raw value further than this from every canonical value is left alone.
pub const SNAP_TOLERANCE: u32 = 6;

const MIN_TICKS: u32 = 3;

/// Snap one raw tick count to the nearest canonical value not longer than
/// the bar. Out-of-tolerance values are merely clamped into range.
pub fn snap(raw: u32, bar_ticks: u32) -> u32 {
    let bar_ticks = bar_ticks.max(MIN_TICKS);
    if raw == 0 {
        return MIN_TICKS;
    }
    let best = CANONICAL_TICKS
        .iter()
        .copied()
        .filter(|&c| c <= bar_ticks)
        .min_by_key(|&c| c.abs_diff(raw));
    match best {
        Some(best) if best.abs_diff(raw) <= SNAP_TOLERANCE => best,
        _ => raw.clamp(MIN_TICKS, bar_ticks),
    }
}

/// Quantize every chord of the bar, then clamp the final chord so the bar's
/// rhythmic capacity is not exceeded.
pub fn detect(bar: &mut Bar) {
    let bar_ticks = bar.duration_ticks();
    for chord in bar.chords.iter_mut() {
        chord.duration_ticks = snap(chord.duration_ticks, bar_ticks);
    }
    if let Some((last, rest)) = bar.chords.split_last_mut() {
        let used: u32 = rest.iter().map(|c| c.duration_ticks).sum();
        if used < bar_ticks {
            if last.duration_ticks > bar_ticks - used {
                last.duration_ticks = bar_ticks - used;
            }
        } else {
            last.duration_ticks = MIN_TICKS;
        }
    }
}
