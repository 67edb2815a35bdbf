//! In-memory loopback transport with scripted fault injection.
//!
//! Used by tests and the demo simulation. Both endpoints of a link share
//! one queue pair; loss and duplication are driven by deterministic
//! patterns so every run is reproducible.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::traits::Transport;

#[derive(Debug, Default)]
struct Direction {
    queue: VecDeque<Vec<u8>>,
    sent: u64,
    drop_pattern: Vec<bool>,
    duplicate_pattern: Vec<bool>,
    dropped: u64,
}

impl Direction {
    fn push(&mut self, data: &[u8]) {
        let index = self.sent as usize;
        self.sent += 1;
        let dropped = self
            .drop_pattern
            .get(index % self.drop_pattern.len().max(1))
            .copied()
            .unwrap_or(false);
        if dropped && !self.drop_pattern.is_empty() {
            self.dropped += 1;
            return;
        }
        self.queue.push_back(data.to_vec());
        let duplicated = self
            .duplicate_pattern
            .get(index % self.duplicate_pattern.len().max(1))
            .copied()
            .unwrap_or(false);
        if duplicated && !self.duplicate_pattern.is_empty() {
            self.queue.push_back(data.to_vec());
        }
    }
}

#[derive(Debug, Default)]
struct Shared {
    a_to_b: Direction,
    b_to_a: Direction,
}

/// One bidirectional in-memory link.
#[derive(Debug, Default)]
pub struct LoopbackLink {
    shared: Rc<RefCell<Shared>>,
}

impl LoopbackLink {
    /// Creates a lossless link.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the two endpoints; the first sends a-to-b.
    #[must_use]
    pub fn endpoints(&self) -> (LoopbackEndpoint, LoopbackEndpoint) {
        (
            LoopbackEndpoint {
                shared: Rc::clone(&self.shared),
                a_side: true,
            },
            LoopbackEndpoint {
                shared: Rc::clone(&self.shared),
                a_side: false,
            },
        )
    }

    /// Scripts a repeating drop pattern for a-to-b sends; `true` drops.
    pub fn set_drop_a_to_b(&self, pattern: Vec<bool>) {
        self.shared.borrow_mut().a_to_b.drop_pattern = pattern;
    }

    /// Scripts a repeating drop pattern for b-to-a sends.
    pub fn set_drop_b_to_a(&self, pattern: Vec<bool>) {
        self.shared.borrow_mut().b_to_a.drop_pattern = pattern;
    }

    /// Scripts a repeating duplication pattern for a-to-b sends.
    pub fn set_duplicate_a_to_b(&self, pattern: Vec<bool>) {
        self.shared.borrow_mut().a_to_b.duplicate_pattern = pattern;
    }

    /// Scripts a repeating duplication pattern for b-to-a sends.
    pub fn set_duplicate_b_to_a(&self, pattern: Vec<bool>) {
        self.shared.borrow_mut().b_to_a.duplicate_pattern = pattern;
    }

    /// Datagrams dropped so far in the a-to-b direction.
    #[must_use]
    pub fn dropped_a_to_b(&self) -> u64 {
        self.shared.borrow().a_to_b.dropped
    }

    /// Datagrams dropped so far in the b-to-a direction.
    #[must_use]
    pub fn dropped_b_to_a(&self) -> u64 {
        self.shared.borrow().b_to_a.dropped
    }
}

/// One side of a [`LoopbackLink`].
#[derive(Debug)]
pub struct LoopbackEndpoint {
    shared: Rc<RefCell<Shared>>,
    a_side: bool,
}

impl Transport for LoopbackEndpoint {
    fn send(&mut self, data: &[u8]) {
        let mut shared = self.shared.borrow_mut();
        if self.a_side {
            shared.a_to_b.push(data);
        } else {
            shared.b_to_a.push(data);
        }
    }

    fn recv(&mut self) -> Option<Vec<u8>> {
        let mut shared = self.shared.borrow_mut();
        if self.a_side {
            shared.b_to_a.queue.pop_front()
        } else {
            shared.a_to_b.queue.pop_front()
        }
    }
}
