//! Netval Core
//!
//! The host value system consumed by the script bridge:
//! - Type descriptors (records, tables, sets, vectors, enums)
//! - Reference-counted values with in-place mutation
//! - Field attributes and attribute masks
//! - Network scalars (addresses, subnets, ports)

pub mod attr;
pub mod error;
pub mod net;
pub mod types;
pub mod val;

pub use attr::{AttrMask, Attrs};
pub use error::ValueError;
pub use net::{Port, Proto, Subnet};
pub use types::{same_type, EnumType, FieldDecl, HostType, RecordType, TableType, TypePtr};
pub use val::{TableEntry, TableKey, Val, ValData, ValPtr};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
