use std::cmp::Ordering;

use crate::{Error, ItemVector, Result, SearchResult};

/// Cosine similarity in `[-1, 1]`. A zero-norm side yields `0.0`.
pub fn cosine_similarity(lhs: &[f32], rhs: &[f32]) -> Result<f32> {
	if lhs.is_empty() || rhs.is_empty() {
		return Err(Error::EmptyVector);
	}
	if lhs.len() != rhs.len() {
		return Err(Error::DimensionMismatch { expected: lhs.len(), actual: rhs.len() });
	}

	let mut dot = 0.0_f32;
	let mut lhs_norm = 0.0_f32;
	let mut rhs_norm = 0.0_f32;

	for (l, r) in lhs.iter().zip(rhs.iter()) {
		dot += l * r;
		lhs_norm += l * l;
		rhs_norm += r * r;
	}

	if lhs_norm <= f32::EPSILON || rhs_norm <= f32::EPSILON {
		return Ok(0.0);
	}

	Ok((dot / (lhs_norm.sqrt() * rhs_norm.sqrt())).clamp(-1.0, 1.0))
}

/// Exhaustive top-k scan.
///
/// Candidates are filtered on the raw cosine against `min_similarity`, then the reported
/// similarity is clamped into `[0, 1]` so downstream score arithmetic never sees negative
/// relevance. Ties keep candidate order.
pub fn top_k_similar(
	query: &[f32],
	candidates: Vec<ItemVector>,
	k: usize,
	min_similarity: f32,
) -> Result<Vec<SearchResult>> {
	if query.is_empty() {
		return Err(Error::EmptyVector);
	}

	let mut scored = Vec::with_capacity(candidates.len());

	for candidate in candidates {
		let similarity = cosine_similarity(query, &candidate.vector)?;

		if similarity < min_similarity {
			continue;
		}

		scored.push(SearchResult::ranked(candidate.item, similarity.clamp(0.0, 1.0)));
	}

	scored.sort_by(|a, b| cmp_f32_desc(a.similarity, b.similarity));
	scored.truncate(k);

	Ok(scored)
}

pub fn cmp_f32_desc(a: f32, b: f32) -> Ordering {
	b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}
