//! Splitting oversized packages and reassembling their fragments.
//!
//! Each fragment travels as its own package with its own sequence; the
//! sub-header names the original package's sequence so the receiver can
//! rebuild the exact original bytes and feed them back through normal
//! package processing.

use crate::error::{WireError, WireResult};
use crate::header::FragmentHeader;
use crate::limits::MAX_FRAGMENTS;

/// Splits a package body into at most [`MAX_FRAGMENTS`] chunks of up to
/// `max_fragment_size` bytes.
pub fn split(data: &[u8], max_fragment_size: usize) -> WireResult<Vec<&[u8]>> {
    if data.is_empty() {
        return Err(WireError::EmptyPayload);
    }
    let count = data.len().div_ceil(max_fragment_size.max(1));
    if count > MAX_FRAGMENTS {
        return Err(WireError::TooManyFragments {
            count,
            max: MAX_FRAGMENTS,
        });
    }
    Ok(data.chunks(max_fragment_size.max(1)).collect())
}

/// Builds the sub-header for fragment `index` of a split package.
#[must_use]
pub fn fragment_header(original_sequence: u16, index: usize, fragments: &[&[u8]]) -> FragmentHeader {
    FragmentHeader {
        original_sequence,
        index: index as u8,
        count: fragments.len() as u8,
        size: fragments[index].len() as u16,
    }
}

/// Reassembles one package at a time from its fragments.
///
/// A fragment for a different original sequence abandons the current,
/// incomplete reassembly; only the newest package is ever in flight.
#[derive(Debug)]
pub struct FragmentAssembler {
    original_sequence: Option<u16>,
    count: u8,
    received: u16,
    fragments: Vec<Vec<u8>>,
    duplicates: u64,
    abandoned: u64,
}

impl Default for FragmentAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl FragmentAssembler {
    /// Creates an idle assembler.
    #[must_use]
    pub fn new() -> Self {
        Self {
            original_sequence: None,
            count: 0,
            received: 0,
            fragments: (0..MAX_FRAGMENTS).map(|_| Vec::new()).collect(),
            duplicates: 0,
            abandoned: 0,
        }
    }

    /// Duplicate fragments seen since construction.
    #[must_use]
    pub const fn duplicates(&self) -> u64 {
        self.duplicates
    }

    /// Incomplete reassemblies abandoned for a newer package.
    #[must_use]
    pub const fn abandoned(&self) -> u64 {
        self.abandoned
    }

    fn reset(&mut self) {
        self.original_sequence = None;
        self.count = 0;
        self.received = 0;
    }

    /// Accepts one fragment. Returns the reassembled original package bytes
    /// once the last missing fragment arrives.
    pub fn insert(
        &mut self,
        header: &FragmentHeader,
        payload: &[u8],
    ) -> WireResult<Option<Vec<u8>>> {
        if header.count == 0
            || usize::from(header.count) > MAX_FRAGMENTS
            || header.index >= header.count
        {
            return Err(WireError::InvalidFragmentIndex {
                index: header.index,
                count: header.count,
            });
        }
        if payload.len() != usize::from(header.size) {
            return Err(WireError::FragmentSizeMismatch {
                declared: usize::from(header.size),
                actual: payload.len(),
            });
        }

        match self.original_sequence {
            Some(current) if current == header.original_sequence => {
                if self.count != header.count {
                    return Err(WireError::FragmentMismatch {
                        original_sequence: header.original_sequence,
                    });
                }
            }
            Some(_) => {
                self.abandoned += 1;
                self.reset();
            }
            None => {}
        }
        if self.original_sequence.is_none() {
            self.original_sequence = Some(header.original_sequence);
            self.count = header.count;
            self.received = 0;
        }

        let bit = 1u16 << header.index;
        if self.received & bit != 0 {
            self.duplicates += 1;
            return Ok(None);
        }
        self.received |= bit;
        let slot = &mut self.fragments[usize::from(header.index)];
        slot.clear();
        slot.extend_from_slice(payload);

        let complete = ((1u32 << self.count) - 1) as u16;
        if self.received != complete {
            return Ok(None);
        }

        let total: usize = self.fragments[..usize::from(self.count)]
            .iter()
            .map(Vec::len)
            .sum();
        let mut package = Vec::with_capacity(total);
        for fragment in &self.fragments[..usize::from(self.count)] {
            package.extend_from_slice(fragment);
        }
        self.reset();
        Ok(Some(package))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(len: usize) -> Vec<u8> {
        (0..len).map(|i| i as u8).collect()
    }

    #[test]
    fn split_respects_limits() {
        let data = payload(1000);
        let fragments = split(&data, 400).unwrap();
        assert_eq!(fragments.len(), 3);
        assert_eq!(fragments[0].len(), 400);
        assert_eq!(fragments[2].len(), 200);

        assert!(matches!(
            split(&data, 10),
            Err(WireError::TooManyFragments { count: 100, .. })
        ));
        assert!(matches!(split(&[], 400), Err(WireError::EmptyPayload)));
    }

    #[test]
    fn reassembly_out_of_order_with_duplicate() {
        let data = payload(1000);
        let fragments = split(&data, 400).unwrap();
        let mut assembler = FragmentAssembler::new();

        // Deliver out of order, duplicating the middle fragment.
        for index in [2usize, 0, 2, 1] {
            let header = fragment_header(77, index, &fragments);
            let result = assembler.insert(&header, fragments[index]).unwrap();
            if index == 1 {
                assert_eq!(result.unwrap(), data);
            } else {
                assert!(result.is_none());
            }
        }
        assert_eq!(assembler.duplicates(), 1);
        assert_eq!(assembler.abandoned(), 0);
    }

    #[test]
    fn newer_package_abandons_incomplete_reassembly() {
        let old = payload(800);
        let new = payload(500);
        let old_fragments = split(&old, 400).unwrap();
        let new_fragments = split(&new, 400).unwrap();
        let mut assembler = FragmentAssembler::new();

        let header = fragment_header(10, 0, &old_fragments);
        assert!(assembler.insert(&header, old_fragments[0]).unwrap().is_none());

        let header = fragment_header(11, 0, &new_fragments);
        assert!(assembler.insert(&header, new_fragments[0]).unwrap().is_none());
        let header = fragment_header(11, 1, &new_fragments);
        assert_eq!(assembler.insert(&header, new_fragments[1]).unwrap().unwrap(), new);
        assert_eq!(assembler.abandoned(), 1);
    }

    #[test]
    fn geometry_violations_are_rejected() {
        let mut assembler = FragmentAssembler::new();
        let bad_index = FragmentHeader {
            original_sequence: 1,
            index: 4,
            count: 4,
            size: 1,
        };
        assert!(matches!(
            assembler.insert(&bad_index, &[0]),
            Err(WireError::InvalidFragmentIndex { index: 4, count: 4 })
        ));

        let declared = FragmentHeader {
            original_sequence: 1,
            index: 0,
            count: 2,
            size: 5,
        };
        assert!(matches!(
            assembler.insert(&declared, &[0; 3]),
            Err(WireError::FragmentSizeMismatch { declared: 5, actual: 3 })
        ));

        assembler.insert(&FragmentHeader {
            original_sequence: 1,
            index: 0,
            count: 2,
            size: 1,
        }, &[9]).unwrap();
        assert!(matches!(
            assembler.insert(&FragmentHeader {
                original_sequence: 1,
                index: 1,
                count: 3,
                size: 1,
            }, &[9]),
            Err(WireError::FragmentMismatch { original_sequence: 1 })
        ));
    }
}
