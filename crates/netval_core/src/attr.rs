//! Field attributes and attribute masks
//!
//! Record fields carry a small set of attributes. The bridge filters what a
//! script may see with an [`AttrMask`]: a field is exposed only when it carries
//! every attribute in the mask.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Attribute bits attached to a record field.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Attrs(u32);

impl Attrs {
    pub const NONE: Attrs = Attrs(0);
    /// Field is written to logs.
    pub const LOG: Attrs = Attrs(1);
    /// Field may be left unset.
    pub const OPTIONAL: Attrs = Attrs(1 << 1);

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Attrs) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_optional(self) -> bool {
        self.contains(Attrs::OPTIONAL)
    }

    pub const fn is_loggable(self) -> bool {
        self.contains(Attrs::LOG)
    }
}

impl BitOr for Attrs {
    type Output = Attrs;

    fn bitor(self, rhs: Attrs) -> Attrs {
        Attrs(self.0 | rhs.0)
    }
}

impl BitOrAssign for Attrs {
    fn bitor_assign(&mut self, rhs: Attrs) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for Attrs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::new();
        if self.is_loggable() {
            names.push("&log");
        }
        if self.is_optional() {
            names.push("&optional");
        }
        write!(f, "{}", names.join(" "))
    }
}

/// Filter applied when wrapping records for a script.
///
/// The empty mask exposes every field.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttrMask(u32);

impl AttrMask {
    pub const ALL: AttrMask = AttrMask(0);
    pub const LOGGABLE: AttrMask = AttrMask(Attrs::LOG.bits());

    pub const fn from_attrs(attrs: Attrs) -> Self {
        AttrMask(attrs.bits())
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Whether a field with `attrs` passes this mask.
    pub const fn exposes(self, attrs: Attrs) -> bool {
        attrs.bits() & self.0 == self.0
    }
}
