use strata_domain::tokens;

use super::Tier1Context;
use crate::{RecordStore, Result};

/// Query-independent project context. Store failures propagate.
pub(super) async fn build_context(
	store: &dyn RecordStore,
	project: Option<&str>,
	top_n: u32,
	wins_limit: u32,
) -> Result<Tier1Context> {
	let fingerprint = store.aggregate_fingerprint(project, top_n).await?;
	let recent_wins = store.recent_high_value_items(project, wins_limit).await?;
	let encoded = serde_json::to_string(&fingerprint)?;
	let token_count = tokens::estimate_tokens(&encoded)
		+ recent_wins.iter().map(tokens::estimate_item_tokens).sum::<usize>();

	tracing::debug!(
		total_items = fingerprint.total_items,
		wins = recent_wins.len(),
		token_count,
		"Built project fingerprint."
	);

	Ok(Tier1Context { fingerprint, recent_wins, token_count })
}
