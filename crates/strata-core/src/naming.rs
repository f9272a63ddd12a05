//! Naming rules for storage allocations and their access groups.

use crate::types::AccessKind;

/// Directory group name for an allocation's RW or RO access.
///
/// ```
/// use strata_core::{AccessKind, naming::access_group_name};
///
/// assert_eq!(access_group_name("foo", AccessKind::ReadWrite), "storage-foo-rw");
/// ```
pub fn access_group_name(storage_name: &str, kind: AccessKind) -> String {
    format!("storage-{storage_name}-{}", kind.suffix())
}

/// Scopes a requested sub-allocation name under its parent's name.
///
/// A name that already starts with the parent's name (and is not identical
/// to it) is used unchanged; anything else gets `<parent>-` prepended.
///
/// ```
/// use strata_core::naming::sub_allocation_name;
///
/// assert_eq!(sub_allocation_name("bar", "foo"), "foo-bar");
/// assert_eq!(sub_allocation_name("foo", "foo"), "foo-foo");
/// assert_eq!(sub_allocation_name("foo-blah", "foo"), "foo-blah");
/// ```
pub fn sub_allocation_name(requested: &str, parent: &str) -> String {
    if requested.starts_with(parent) && requested != parent {
        requested.to_string()
    } else {
        format!("{parent}-{requested}")
    }
}
