use strata_domain::{Category, ItemVector, SearchResult, similarity};

use crate::{Result, StrataService};

pub(crate) struct SemanticQuery<'a> {
	pub(crate) text: &'a str,
	pub(crate) project: Option<&'a str>,
	pub(crate) category: Option<Category>,
	pub(crate) tags: &'a [String],
	pub(crate) limit: u32,
	pub(crate) min_similarity: f32,
}

/// Ranks stored vectors against the embedded query.
///
/// An empty query, a failed or malformed embedding, a store failure while loading vectors, or an
/// empty vector set all degrade to the most recent items. Dimension mismatches between the query
/// and stored vectors are caller errors and propagate.
pub(crate) async fn semantic_search(
	service: &StrataService,
	query: &SemanticQuery<'_>,
) -> Result<Vec<SearchResult>> {
	let text = query.text.trim();

	if text.is_empty() {
		tracing::debug!("Empty query. Returning recent items.");

		return recency_fallback(service, query).await;
	}

	let Some(query_vec) = embed_query(service, text).await else {
		return recency_fallback(service, query).await;
	};
	let candidates = match service.store.items_with_vectors(query.project, query.category).await {
		Ok(candidates) => candidates,
		Err(err) => {
			tracing::warn!(error = %err, "Failed to load item vectors. Returning recent items.");

			return recency_fallback(service, query).await;
		},
	};

	if candidates.is_empty() {
		tracing::debug!("No stored vectors. Returning recent items.");

		return recency_fallback(service, query).await;
	}

	let candidates: Vec<ItemVector> = if query.tags.is_empty() {
		candidates
	} else {
		candidates.into_iter().filter(|candidate| candidate.item.has_any_tag(query.tags)).collect()
	};
	let results = similarity::top_k_similar(
		&query_vec,
		candidates,
		query.limit as usize,
		query.min_similarity,
	)?;

	tracing::debug!(results = results.len(), "Semantic search finished.");

	Ok(results)
}

async fn embed_query(service: &StrataService, text: &str) -> Option<Vec<f32>> {
	let cfg = &service.cfg.providers.embedding;
	let texts = [text.to_string()];
	let vectors = match service.providers.embedding.embed(cfg, &texts).await {
		Ok(vectors) => vectors,
		Err(err) => {
			tracing::warn!(error = %err, "Query embedding failed. Returning recent items.");

			return None;
		},
	};
	let Some(vector) = vectors.into_iter().next() else {
		tracing::warn!("Embedding provider returned no vectors. Returning recent items.");

		return None;
	};

	if vector.is_empty() || vector.len() != cfg.dimensions as usize {
		tracing::warn!(
			expected = cfg.dimensions,
			actual = vector.len(),
			"Query embedding has the wrong shape. Returning recent items."
		);

		return None;
	}

	Some(vector)
}

/// Newest items first, each marked unranked with similarity 1.0.
async fn recency_fallback(
	service: &StrataService,
	query: &SemanticQuery<'_>,
) -> Result<Vec<SearchResult>> {
	let items = service.store.recent_items(query.project, query.category, query.limit).await?;

	Ok(items
		.into_iter()
		.filter(|item| query.tags.is_empty() || item.has_any_tag(query.tags))
		.map(SearchResult::by_recency)
		.collect())
}
