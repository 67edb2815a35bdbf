//! 16-bit wire sequences widened against a local baseline.
//!
//! Sequences are 32-bit locally and truncated to 16 bits on the wire. The
//! receiver widens them back by picking the 32-bit value closest to its own
//! baseline; this is exact whenever the true value lies within plus or minus
//! 16384 of the baseline.

/// Truncates a local sequence to its wire form.
#[must_use]
pub const fn to_wire(sequence: u32) -> u16 {
    sequence as u16
}

/// Widens a wire sequence against the local baseline.
#[must_use]
pub fn from_wire(wire: u16, baseline: u32) -> u32 {
    let diff = wire.wrapping_sub(baseline as u16) as i16;
    baseline.wrapping_add(i32::from(diff) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widens_forward_and_backward() {
        assert_eq!(from_wire(to_wire(1000), 999), 1000);
        assert_eq!(from_wire(to_wire(1000), 1017), 1000);
        // Across a 16-bit boundary.
        assert_eq!(from_wire(to_wire(65540), 65530), 65540);
        assert_eq!(from_wire(to_wire(65530), 65540), 65530);
    }

    #[test]
    fn widening_window_limits() {
        let baseline = 100_000u32;
        for offset in [-16384i32, -1, 0, 1, 16383] {
            let truth = baseline.wrapping_add(offset as u32);
            assert_eq!(from_wire(to_wire(truth), baseline), truth, "offset {offset}");
        }
    }
}
