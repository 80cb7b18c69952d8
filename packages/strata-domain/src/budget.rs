use crate::{SearchResult, tokens};

/// Fraction by which the running total may overshoot the nominal budget.
pub const BUDGET_TOLERANCE: f64 = 0.10;

#[derive(Clone, Debug, PartialEq)]
pub struct BudgetOutcome {
	pub kept: Vec<SearchResult>,
	pub total_tokens: usize,
	/// True when at least one input item was dropped.
	pub enforced: bool,
}

pub fn budget_ceiling(budget: usize) -> usize {
	(budget as f64 * (1.0 + BUDGET_TOLERANCE)).floor() as usize
}

/// Keeps the longest prefix whose estimated cost fits `budget * 1.10`. Never reorders.
pub fn enforce_budget(results: Vec<SearchResult>, budget: usize) -> BudgetOutcome {
	if results.is_empty() {
		return BudgetOutcome { kept: Vec::new(), total_tokens: 0, enforced: false };
	}
	if budget == 0 {
		return BudgetOutcome { kept: Vec::new(), total_tokens: 0, enforced: true };
	}

	let ceiling = budget_ceiling(budget);
	let input_len = results.len();
	let mut kept = Vec::with_capacity(input_len);
	let mut total_tokens = 0_usize;

	for result in results {
		let cost = tokens::estimate_item_tokens(&result.item);

		if total_tokens + cost > ceiling {
			break;
		}

		total_tokens += cost;

		kept.push(result);
	}

	let enforced = kept.len() < input_len;

	BudgetOutcome { kept, total_tokens, enforced }
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn ceiling_adds_ten_percent() {
		assert_eq!(budget_ceiling(100), 110);
		assert_eq!(budget_ceiling(8_000), 8_800);
		assert_eq!(budget_ceiling(0), 0);
	}

	#[test]
	fn empty_input_is_never_enforced() {
		let outcome = enforce_budget(Vec::new(), 0);

		assert!(outcome.kept.is_empty());
		assert!(!outcome.enforced);
	}
}
