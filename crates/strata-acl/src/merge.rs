//! ACE deduplication.
//!
//! Two entries collide when they share a normalized trustee, the same
//! flags, and the same type. Colliding entries are folded into one whose
//! rights are the union of both.

use std::collections::{BTreeSet, HashMap};

use strata_core::types::FILE_OWNER;
use strata_core::{AceEntry, AceFlag, AceType, Trustee, TrusteeDomain};

const FILE_OWNER_KEY: &str = "file owner";

type MergeKey = (String, BTreeSet<AceFlag>, AceType);

/// Canonical form of a trustee used for comparison.
///
/// Drops a `DOMAIN\` prefix and an `@realm` suffix, then case-folds. Every
/// spelling of the synthetic file-owner trustee maps to one key.
///
/// ```
/// use strata_acl::merge::normalize_trustee;
/// use strata_core::Trustee;
///
/// assert_eq!(
///     normalize_trustee(&Trustee::group("ACCOUNTS\\Storage-Admins")),
///     normalize_trustee(&Trustee::group("storage-admins@accounts.example")),
/// );
/// ```
pub fn normalize_trustee(trustee: &Trustee) -> String {
    if trustee.domain == Some(TrusteeDomain::ApiCreatorOwner)
        || trustee.name.eq_ignore_ascii_case(FILE_OWNER)
    {
        return FILE_OWNER_KEY.to_string();
    }
    let name = trustee
        .name
        .rsplit_once('\\')
        .map_or(trustee.name.as_str(), |(_, n)| n);
    let name = name.split_once('@').map_or(name, |(n, _)| n);
    name.trim().to_lowercase()
}

fn key(ace: &AceEntry) -> MergeKey {
    (normalize_trustee(&ace.trustee), ace.flags.clone(), ace.ace_type)
}

/// Merges `incoming` into `existing`.
///
/// Order is preserved: the first entry seen for a key keeps its position
/// and trustee spelling, later collisions only add rights. The result has
/// no colliding entries, even if `existing` had some.
pub fn merge(existing: &[AceEntry], incoming: &[AceEntry]) -> Vec<AceEntry> {
    let mut merged: Vec<AceEntry> = Vec::with_capacity(existing.len() + incoming.len());
    let mut index: HashMap<MergeKey, usize> = HashMap::new();

    for ace in existing.iter().chain(incoming) {
        match index.get(&key(ace)) {
            Some(&i) => merged[i].rights.extend(ace.rights.iter().copied()),
            None => {
                index.insert(key(ace), merged.len());
                merged.push(ace.clone());
            }
        }
    }
    merged
}

/// Removes every entry whose trustee normalizes to the same key as
/// `trustee_name`.
pub fn strip_trustee(aces: &[AceEntry], trustee_name: &str) -> Vec<AceEntry> {
    let target = normalize_trustee(&Trustee {
        name: trustee_name.to_string(),
        domain: None,
    });
    aces.iter()
        .filter(|ace| normalize_trustee(&ace.trustee) != target)
        .cloned()
        .collect()
}
