//! Physical key layout of a Flat List. These names are on-disk contract and
//! must stay byte-identical across store implementations.

pub(super) const SEPARATOR: &str = "__";

pub(super) fn end_key(base: &str) -> String {
    format!("{base}{SEPARATOR}end")
}

pub(super) fn count_key(base: &str) -> String {
    format!("{base}{SEPARATOR}count")
}

pub(super) fn free_key(base: &str) -> String {
    format!("{base}{SEPARATOR}free")
}

pub(super) fn slot_key(base: &str, slot: u64) -> String {
    format!("{base}{SEPARATOR}idx{SEPARATOR}{slot}")
}
