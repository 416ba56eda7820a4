//! Object identifier type
//!
//! An `ObjectId` designates an indirect object by its object number and
//! generation. It is the payload of a reference (`N G R`) and never owns the
//! value it points to.

use std::fmt;

/// Identity of an indirect object: `(object number, generation)`.
///
/// Object number 0 is reserved as the head of the free list and never
/// designates a live object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId {
    /// Object number
    pub number: u32,
    /// Generation number
    pub generation: u16,
}

impl ObjectId {
    /// The reserved free-list head (`0 65535`)
    pub const FREE_HEAD: ObjectId = ObjectId {
        number: 0,
        generation: 65535,
    };

    /// Highest generation a slot may carry; such a slot is never reused.
    pub const MAX_GENERATION: u16 = 65535;

    /// Create a new identifier
    #[inline]
    pub const fn new(number: u32, generation: u16) -> Self {
        ObjectId { number, generation }
    }

    /// Check if this designates the reserved object 0
    #[inline]
    pub const fn is_null(&self) -> bool {
        self.number == 0
    }
}

impl From<(u32, u16)> for ObjectId {
    fn from((number, generation): (u32, u16)) -> Self {
        ObjectId::new(number, generation)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} R", self.number, self.generation)
    }
}
