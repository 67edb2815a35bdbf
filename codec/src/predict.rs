//! Multi-baseline linear prediction of entity field values.
//!
//! Both peers run the same prediction over the same acknowledged baselines,
//! so the predicted buffer never crosses the wire. Only numeric,
//! delta-enabled fields are predicted; quantized floats and integers
//! extrapolate linearly in their stored word domain, everything else copies
//! the newest baseline.

use schema::{FieldKind, Schema};

use crate::error::{CodecError, CodecResult};
use crate::types::ChangeBitmap;

/// Maximum baselines the predictor accepts.
pub const MAX_BASELINES: usize = 3;

/// One historical baseline: the tick it captured and its value buffer.
#[derive(Debug, Clone, Copy)]
pub struct Baseline<'a> {
    /// Server tick the buffer was captured at.
    pub tick: u64,
    /// Value buffer in the schema's fixed layout.
    pub buffer: &'a [u32],
}

impl<'a> Baseline<'a> {
    /// Creates a baseline reference.
    #[must_use]
    pub const fn new(tick: u64, buffer: &'a [u32]) -> Self {
        Self { tick, buffer }
    }
}

fn is_predicted(kind: FieldKind, precision: u8, delta: bool) -> bool {
    if !delta {
        return false;
    }
    match kind {
        FieldKind::Int | FieldKind::UInt => true,
        FieldKind::Float | FieldKind::Vector2 | FieldKind::Vector3 | FieldKind::Quaternion => {
            precision > 0
        }
        FieldKind::Bool | FieldKind::String | FieldKind::Bytes => false,
    }
}

fn signed(kind: FieldKind, word: u32) -> i64 {
    if kind == FieldKind::UInt {
        i64::from(word)
    } else {
        i64::from(word as i32)
    }
}

fn stored(kind: FieldKind, value: i128) -> u32 {
    if kind == FieldKind::UInt {
        value.clamp(0, i128::from(u32::MAX)) as u32
    } else {
        value.clamp(i128::from(i32::MIN), i128::from(i32::MAX)) as i32 as u32
    }
}

// Intermediate math runs in i128: tick distances come off the wire and can
// be anywhere in the u64 range, so i64 products could overflow.
fn extrapolate(kind: FieldKind, samples: &[(i64, u32)], dt: i64) -> u32 {
    let v0 = i128::from(signed(kind, samples[0].1));
    let dt = i128::from(dt);
    let predicted = match samples.len() {
        2 => {
            let span = i128::from(samples[0].0) - i128::from(samples[1].0);
            let v1 = i128::from(signed(kind, samples[1].1));
            v0 + (v0 - v1) * dt / span
        }
        3 => {
            let span1 = i128::from(samples[0].0) - i128::from(samples[1].0);
            let span2 = i128::from(samples[1].0) - i128::from(samples[2].0);
            let v1 = i128::from(signed(kind, samples[1].1));
            let v2 = i128::from(signed(kind, samples[2].1));
            let step1 = (v0 - v1) * dt / span1;
            let step2 = (v1 - v2) * dt / span2;
            v0 + (step1 + step2) / 2
        }
        _ => v0,
    };
    stored(kind, predicted)
}

/// Predicts the entity's value buffer at `target_tick` from up to three
/// baselines, writing into `out` and returning the bitmap of fields whose
/// predicted slot differs from the newest baseline.
///
/// Baselines may arrive in any order but must have distinct ticks.
pub fn predict(
    schema: &Schema,
    baselines: &[Baseline<'_>],
    target_tick: u64,
    out: &mut [u32],
) -> CodecResult<ChangeBitmap> {
    if baselines.is_empty() || baselines.len() > MAX_BASELINES {
        return Err(CodecError::TooManyBaselines {
            count: baselines.len(),
            max: MAX_BASELINES,
        });
    }
    let words = schema.word_count();
    if out.len() < words {
        return Err(CodecError::BufferMismatch {
            needed: words,
            available: out.len(),
        });
    }
    for baseline in baselines {
        if baseline.buffer.len() < words {
            return Err(CodecError::BufferMismatch {
                needed: words,
                available: baseline.buffer.len(),
            });
        }
    }

    // Newest first.
    let mut sorted: Vec<Baseline<'_>> = baselines.to_vec();
    sorted.sort_by(|a, b| b.tick.cmp(&a.tick));
    for pair in sorted.windows(2) {
        if pair[0].tick == pair[1].tick {
            return Err(CodecError::DuplicateBaselineTick { tick: pair[0].tick });
        }
    }

    let newest = sorted[0];
    out[..words].copy_from_slice(&newest.buffer[..words]);

    let dt = target_tick.wrapping_sub(newest.tick) as i64;
    let mut predicted_changed = ChangeBitmap::new();
    if dt == 0 || sorted.len() == 1 {
        return Ok(predicted_changed);
    }

    for (index, field) in schema.fields().iter().enumerate() {
        if !is_predicted(field.kind, field.precision, field.delta) {
            continue;
        }
        let offset = schema.layout(index).map_or(0, |l| l.offset);
        let components = field.word_count();
        let mut changed = false;
        for c in 0..components {
            let samples: Vec<(i64, u32)> = sorted
                .iter()
                .map(|b| (b.tick as i64, b.buffer[offset + c]))
                .collect();
            let word = extrapolate(field.kind, &samples, dt);
            if word != newest.buffer[offset + c] {
                changed = true;
            }
            out[offset + c] = word;
        }
        if changed {
            predicted_changed.set(index);
        }
    }
    Ok(predicted_changed)
}
