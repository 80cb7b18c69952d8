mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Config, EmbeddingProviderConfig, Postgres, Providers, Retrieval, RetrievalFingerprint,
	RetrievalSemantic, RetrievalUsageBoost, Service, Storage, UsageTracking,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.dsn.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.postgres.dsn must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.api_key.trim().is_empty() {
		return Err(Error::Validation {
			message: "Provider embedding api_key must be non-empty.".to_string(),
		});
	}

	let retrieval = &cfg.retrieval;

	if !retrieval.include_tier1 && !retrieval.include_tier2 && !retrieval.include_tier3 {
		return Err(Error::Validation {
			message: "retrieval must enable at least one of include_tier1, include_tier2, or include_tier3."
				.to_string(),
		});
	}
	if retrieval.semantic.limit == 0 {
		return Err(Error::Validation {
			message: "retrieval.semantic.limit must be greater than zero.".to_string(),
		});
	}
	if !retrieval.semantic.min_similarity.is_finite() {
		return Err(Error::Validation {
			message: "retrieval.semantic.min_similarity must be a finite number.".to_string(),
		});
	}
	if !(-1.0..=1.0).contains(&retrieval.semantic.min_similarity) {
		return Err(Error::Validation {
			message: "retrieval.semantic.min_similarity must be in the range -1.0-1.0.".to_string(),
		});
	}
	if !retrieval.usage_boost.boost_factor.is_finite() {
		return Err(Error::Validation {
			message: "retrieval.usage_boost.boost_factor must be a finite number.".to_string(),
		});
	}
	if retrieval.usage_boost.boost_factor < 0.0 {
		return Err(Error::Validation {
			message: "retrieval.usage_boost.boost_factor must be zero or greater.".to_string(),
		});
	}
	if !retrieval.usage_boost.time_decay_days.is_finite()
		|| retrieval.usage_boost.time_decay_days <= 0.0
	{
		return Err(Error::Validation {
			message: "retrieval.usage_boost.time_decay_days must be greater than zero.".to_string(),
		});
	}
	if retrieval.usage_boost.min_access_count < 0 {
		return Err(Error::Validation {
			message: "retrieval.usage_boost.min_access_count must be zero or greater.".to_string(),
		});
	}
	if cfg.usage_tracking.queue_capacity == 0 {
		return Err(Error::Validation {
			message: "usage_tracking.queue_capacity must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.providers.embedding.api_base.ends_with('/') && cfg.providers.embedding.path.starts_with('/')
	{
		let trimmed = cfg.providers.embedding.api_base.trim_end_matches('/').to_string();

		cfg.providers.embedding.api_base = trimmed;
	}
}
