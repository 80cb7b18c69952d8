use std::collections::HashMap;

use uuid::Uuid;

use crate::SearchResult;

/// One entry per item id, keeping the highest similarity seen. Output follows first-seen order.
pub fn dedup_results(results: Vec<SearchResult>) -> Vec<SearchResult> {
	let mut slot_by_id: HashMap<Uuid, usize> = HashMap::with_capacity(results.len());
	let mut out: Vec<SearchResult> = Vec::with_capacity(results.len());

	for result in results {
		match slot_by_id.get(&result.item.id) {
			Some(&slot) =>
				if result.similarity > out[slot].similarity {
					out[slot] = result;
				},
			None => {
				slot_by_id.insert(result.item.id, out.len());
				out.push(result);
			},
		}
	}

	out
}
