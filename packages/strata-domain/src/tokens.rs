//! Character-based token estimation.
//!
//! The estimate is intentionally model-agnostic: roughly four characters per token for English
//! prose. It is used for budgeting only and never claims to be exact.

use crate::{Item, SearchResult};

pub const CHARS_PER_TOKEN: usize = 4;

pub fn estimate_tokens(text: &str) -> usize {
	text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// Estimated cost of rendering an item's text fields into a context window.
pub fn estimate_item_tokens(item: &Item) -> usize {
	let mut total = estimate_tokens(&item.summary) + estimate_tokens(&item.content);

	if let Some(rationale) = item.rationale.as_deref() {
		total += estimate_tokens(rationale);
	}

	for text in item.alternatives.iter().chain(item.tags.iter()).chain(item.related_refs.iter()) {
		total += estimate_tokens(text);
	}

	total
}

pub fn estimate_results_tokens(results: &[SearchResult]) -> usize {
	results.iter().map(|result| estimate_item_tokens(&result.item)).sum()
}
