mod error;

pub use error::{Error, Result};

use std::{env, str::FromStr, thread};

use sqlx::{
	ConnectOptions, Connection, Executor,
	postgres::{PgConnectOptions, PgConnection},
};
use tokio::runtime::Builder;
use uuid::Uuid;

const DSN_VAR: &str = "STRATA_PG_DSN";
const ADMIN_DB_VAR: &str = "STRATA_PG_ADMIN_DB";
const DEFAULT_ADMIN_DB: &str = "postgres";

/// Returns the DSN integration tests run against, or `None` when the variable is unset or blank.
pub fn env_dsn() -> Option<String> {
	non_blank(env::var(DSN_VAR).ok())
}

/// A scratch database that lives for one test.
///
/// `cleanup` drops it explicitly. A database that is never cleaned up is dropped from `Drop`,
/// so a panicking test does not leak it.
pub struct TestDatabase {
	dsn: String,
	scratch: Option<Scratch>,
}
impl TestDatabase {
	pub async fn new(base_dsn: &str) -> Result<Self> {
		let base = PgConnectOptions::from_str(base_dsn).map_err(|source| Error::InvalidDsn { source })?;
		let admin_db = non_blank(env::var(ADMIN_DB_VAR).ok());
		let scratch = Scratch {
			name: scratch_name(Uuid::new_v4()),
			admin: base.clone().database(admin_db.as_deref().unwrap_or(DEFAULT_ADMIN_DB)),
		};

		scratch.create().await?;

		let dsn = base.database(&scratch.name).to_url_lossy().to_string();

		Ok(Self { dsn, scratch: Some(scratch) })
	}

	pub fn dsn(&self) -> &str {
		&self.dsn
	}

	pub async fn cleanup(mut self) -> Result<()> {
		match self.scratch.take() {
			Some(scratch) => scratch.destroy().await,
			None => Ok(()),
		}
	}
}
impl Drop for TestDatabase {
	fn drop(&mut self) {
		let Some(scratch) = self.scratch.take() else {
			return;
		};
		// Drop usually runs on the test's runtime, which cannot be blocked on from here.
		let outcome = thread::spawn(move || scratch.destroy_blocking()).join();

		match outcome {
			Ok(Ok(())) => {},
			Ok(Err(err)) => eprintln!("Scratch database was not dropped: {err}"),
			Err(_) => eprintln!("Scratch database cleanup thread panicked."),
		}
	}
}

struct Scratch {
	name: String,
	admin: PgConnectOptions,
}
impl Scratch {
	async fn admin_connection(&self) -> Result<PgConnection> {
		PgConnection::connect_with(&self.admin)
			.await
			.map_err(|source| Error::Admin { action: "connect", source })
	}

	async fn create(&self) -> Result<()> {
		let mut conn = self.admin_connection().await?;
		let sql = format!("CREATE DATABASE {}", quote_ident(&self.name));

		conn.execute(sql.as_str())
			.await
			.map_err(|source| Error::Admin { action: "create the scratch database", source })?;

		Ok(())
	}

	async fn destroy(&self) -> Result<()> {
		let mut conn = self.admin_connection().await?;
		let sql = format!("DROP DATABASE IF EXISTS {} WITH (FORCE)", quote_ident(&self.name));

		conn.execute(sql.as_str())
			.await
			.map_err(|source| Error::Admin { action: "drop the scratch database", source })?;

		Ok(())
	}

	fn destroy_blocking(self) -> Result<()> {
		let runtime = Builder::new_current_thread()
			.enable_all()
			.build()
			.map_err(|err| Error::Runtime { message: err.to_string() })?;

		runtime.block_on(self.destroy())
	}
}

fn scratch_name(id: Uuid) -> String {
	format!("strata_test_{}", id.simple())
}

fn quote_ident(name: &str) -> String {
	format!("\"{}\"", name.replace('"', "\"\""))
}

fn non_blank(value: Option<String>) -> Option<String> {
	value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
