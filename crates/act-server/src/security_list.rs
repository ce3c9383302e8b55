//! Flattening of security-list fragments into paged symbol lists.

use std::collections::BTreeMap;

use act_core::Message;

use crate::types::Symbols;

pub const SYMBOLS_PER_PAGE: usize = 100;

/// Symbols of every `NoRelatedSym` entry, fragment order then entry order.
/// Entries without a `Symbol` are skipped.
pub fn collect_symbols(fragments: &[Message]) -> Vec<String> {
    fragments
        .iter()
        .filter_map(|fragment| fragment.field("NoRelatedSym").and_then(|v| v.as_list()))
        .flatten()
        .filter_map(|entry| entry.as_fields())
        .filter_map(|entry| entry.get("Symbol").and_then(|v| v.as_str()))
        .map(str::to_string)
        .collect()
}

/// Split `symbols` into pages of `per_page`, keyed 0, 1, 2, ...
pub fn paginate(symbols: Vec<String>, per_page: usize) -> BTreeMap<usize, Symbols> {
    symbols
        .chunks(per_page.max(1))
        .enumerate()
        .map(|(page, chunk)| (page, Symbols { symbol: chunk.to_vec() }))
        .collect()
}

pub fn security_list_dictionary(fragments: &[Message]) -> BTreeMap<usize, Symbols> {
    paginate(collect_symbols(fragments), SYMBOLS_PER_PAGE)
}
