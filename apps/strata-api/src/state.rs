use std::sync::Arc;

use strata_service::StrataService;
use strata_storage::db::Db;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<StrataService>,
}
impl AppState {
	pub async fn new(config: strata_config::Config) -> color_eyre::Result<Self> {
		let db = Db::connect(&config.storage.postgres).await?;

		db.ensure_schema().await?;

		Ok(Self::from_service(StrataService::new(config, db)))
	}

	pub fn from_service(service: StrataService) -> Self {
		Self { service: Arc::new(service) }
	}
}
