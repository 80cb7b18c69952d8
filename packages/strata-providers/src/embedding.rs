use std::time::Duration;

use color_eyre::{Result, eyre};
use reqwest::Client;
use serde_json::Value;

/// Calls an OpenAI-compatible `/embeddings` endpoint and returns one vector per input text, in
/// input order.
pub async fn embed(
	cfg: &strata_config::EmbeddingProviderConfig,
	texts: &[String],
) -> Result<Vec<Vec<f32>>> {
	if texts.is_empty() {
		return Ok(Vec::new());
	}

	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"input": texts,
		"dimensions": cfg.dimensions,
	});
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;
	let vectors = parse_embedding_response(json)?;

	check_shape(&vectors, texts.len(), cfg.dimensions as usize)?;

	Ok(vectors)
}

fn parse_embedding_response(json: Value) -> Result<Vec<Vec<f32>>> {
	let data = json
		.get("data")
		.and_then(|v| v.as_array())
		.ok_or_else(|| eyre::eyre!("Embedding response is missing data array."))?;
	let mut indexed: Vec<(usize, Vec<f32>)> = Vec::with_capacity(data.len());

	for (fallback_index, item) in data.iter().enumerate() {
		let index = item
			.get("index")
			.and_then(|v| v.as_u64())
			.map(|v| v as usize)
			.unwrap_or(fallback_index);
		let embedding = item
			.get("embedding")
			.and_then(|v| v.as_array())
			.ok_or_else(|| eyre::eyre!("Embedding item missing embedding array."))?;
		let mut vec = Vec::with_capacity(embedding.len());

		for value in embedding {
			let number =
				value.as_f64().ok_or_else(|| eyre::eyre!("Embedding value must be numeric."))?;

			vec.push(number as f32);
		}

		indexed.push((index, vec));
	}

	indexed.sort_by_key(|(index, _)| *index);

	Ok(indexed.into_iter().map(|(_, vec)| vec).collect())
}

fn check_shape(vectors: &[Vec<f32>], expected_count: usize, expected_dim: usize) -> Result<()> {
	if vectors.len() != expected_count {
		return Err(eyre::eyre!(
			"Embedding provider returned {} vectors for {expected_count} inputs.",
			vectors.len()
		));
	}
	if let Some(vec) = vectors.iter().find(|vec| vec.len() != expected_dim) {
		return Err(eyre::eyre!(
			"Embedding vector dimension mismatch: expected {expected_dim}, got {}.",
			vec.len()
		));
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_embeddings_in_index_order() {
		let json = serde_json::json!({
			"data": [
				{ "index": 1, "embedding": [2.0, 3.0] },
				{ "index": 0, "embedding": [0.5, 1.5] }
			]
		});
		let parsed = parse_embedding_response(json).expect("parse failed");

		assert_eq!(parsed, vec![vec![0.5, 1.5], vec![2.0, 3.0]]);
	}

	#[test]
	fn rejects_missing_data_array() {
		let err = parse_embedding_response(serde_json::json!({ "object": "list" }))
			.expect_err("Expected missing data error.");

		assert!(err.to_string().contains("missing data array"));
	}

	#[test]
	fn shape_check_catches_wrong_dimensions() {
		assert!(check_shape(&[vec![0.0; 3]], 1, 3).is_ok());
		assert!(check_shape(&[vec![0.0; 2]], 1, 3).is_err());
		assert!(check_shape(&[], 1, 3).is_err());
	}
}
