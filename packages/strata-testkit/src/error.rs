pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("STRATA_PG_DSN is not a valid Postgres DSN: {source}.")]
	InvalidDsn { source: sqlx::Error },

	#[error("Failed to {action} on the admin database: {source}.")]
	Admin { action: &'static str, source: sqlx::Error },

	#[error("Cleanup runtime failed: {message}")]
	Runtime { message: String },
}
