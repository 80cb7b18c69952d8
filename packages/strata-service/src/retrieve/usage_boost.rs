use time::OffsetDateTime;

use strata_domain::{
	UsageBoostedResult,
	usage::{self, UsageBoostParams},
};

use super::semantic::{self, SemanticQuery};
use crate::{Result, StrataService};

pub(super) async fn usage_boosted_search(
	service: &StrataService,
	query: &SemanticQuery<'_>,
	params: &UsageBoostParams,
	now: OffsetDateTime,
) -> Result<Vec<UsageBoostedResult>> {
	let base = semantic::semantic_search(service, query).await?;
	let mut boosted = Vec::with_capacity(base.len());

	for mut result in base {
		let item_id = result.item.id;

		match service.store.item_by_id(item_id).await {
			Ok(Some(current)) => {
				result.item.access_count = current.access_count;
				result.item.first_accessed_at = current.first_accessed_at;
				result.item.last_accessed_at = current.last_accessed_at;
			},
			Ok(None) => {
				tracing::warn!(%item_id, "Usage metadata missing. Using the ranked copy.");
			},
			Err(err) => {
				tracing::warn!(
					error = %err,
					%item_id,
					"Usage metadata lookup failed. Using the ranked copy."
				);
			},
		}

		let access_count = result.item.access_count;
		let last_accessed_at = result.item.last_accessed_at;

		boosted.push(usage::boost_result(result, access_count, last_accessed_at, now, params));
	}

	usage::sort_by_boosted(&mut boosted);

	Ok(boosted)
}
