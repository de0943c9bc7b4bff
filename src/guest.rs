//! Guest handle generator
//!
//! Peers that leave the bracket tag of their first message empty get a
//! synthesized `guestN` handle.

use crate::types::Handle;

/// Source of `guest1`, `guest2`, ... handles
///
/// The counter belongs to one server instance and is never rewound,
/// so a handle is not handed out twice even after its peer disconnects.
#[derive(Debug)]
pub struct GuestNames {
    next: u64,
}

impl GuestNames {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Create a generator whose first handle is `guest{start}`
    pub fn starting_at(start: u64) -> Self {
        Self { next: start }
    }

    /// Take the next guest handle
    pub fn next(&mut self) -> Handle {
        let handle = Handle(format!("guest{}", self.next));
        self.next += 1;
        handle
    }
}

impl Default for GuestNames {
    fn default() -> Self {
        Self::new()
    }
}
