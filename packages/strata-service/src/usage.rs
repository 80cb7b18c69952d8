use std::sync::{
	Arc,
	atomic::{AtomicU64, Ordering},
};

use serde::Serialize;
use time::OffsetDateTime;
use tokio::sync::mpsc::{self, Receiver, Sender, error::TrySendError};
use uuid::Uuid;

use crate::RecordStore;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct UsageStats {
	pub enabled: bool,
	pub enqueued: u64,
	pub recorded: u64,
	pub unknown: u64,
	pub failed: u64,
	pub dropped: u64,
}

/// Records item accesses off the request path.
///
/// Retrieval hands ids to a bounded queue and never waits for the store. When the queue is full
/// the id is dropped and counted; store failures are logged and counted. Neither ever reaches the
/// caller.
#[derive(Clone)]
pub struct UsageTracker {
	tx: Option<Sender<Uuid>>,
	counters: Arc<UsageCounters>,
}
impl UsageTracker {
	/// Spawns the background worker on the current Tokio runtime.
	pub fn spawn(store: Arc<dyn RecordStore>, queue_capacity: usize) -> Self {
		let (tx, rx) = mpsc::channel(queue_capacity.max(1));
		let counters = Arc::new(UsageCounters::default());

		tokio::spawn(run_usage_worker(store, rx, counters.clone()));

		Self { tx: Some(tx), counters }
	}

	pub fn disabled() -> Self {
		Self { tx: None, counters: Arc::new(UsageCounters::default()) }
	}

	pub fn is_enabled(&self) -> bool {
		self.tx.is_some()
	}

	pub fn track<I>(&self, item_ids: I)
	where
		I: IntoIterator<Item = Uuid>,
	{
		let Some(tx) = self.tx.as_ref() else {
			return;
		};

		for item_id in item_ids {
			match tx.try_send(item_id) {
				Ok(()) => {
					self.counters.enqueued.fetch_add(1, Ordering::Relaxed);
				},
				Err(TrySendError::Full(item_id)) => {
					self.counters.dropped.fetch_add(1, Ordering::Relaxed);

					tracing::warn!(%item_id, "Usage tracking queue is full. Dropping access update.");
				},
				Err(TrySendError::Closed(item_id)) => {
					self.counters.dropped.fetch_add(1, Ordering::Relaxed);

					tracing::warn!(%item_id, "Usage tracking worker is gone. Dropping access update.");
				},
			}
		}
	}

	pub fn stats(&self) -> UsageStats {
		let counters = &self.counters;

		UsageStats {
			enabled: self.is_enabled(),
			enqueued: counters.enqueued.load(Ordering::Relaxed),
			recorded: counters.recorded.load(Ordering::Relaxed),
			unknown: counters.unknown.load(Ordering::Relaxed),
			failed: counters.failed.load(Ordering::Relaxed),
			dropped: counters.dropped.load(Ordering::Relaxed),
		}
	}
}

#[derive(Default)]
struct UsageCounters {
	enqueued: AtomicU64,
	recorded: AtomicU64,
	unknown: AtomicU64,
	failed: AtomicU64,
	dropped: AtomicU64,
}

async fn run_usage_worker(
	store: Arc<dyn RecordStore>,
	mut rx: Receiver<Uuid>,
	counters: Arc<UsageCounters>,
) {
	while let Some(item_id) = rx.recv().await {
		let now = OffsetDateTime::now_utc();

		match store.record_access(item_id, now).await {
			Ok(true) => {
				counters.recorded.fetch_add(1, Ordering::Relaxed);
			},
			Ok(false) => {
				counters.unknown.fetch_add(1, Ordering::Relaxed);

				tracing::debug!(%item_id, "Usage update skipped for unknown item.");
			},
			Err(err) => {
				counters.failed.fetch_add(1, Ordering::Relaxed);

				tracing::error!(error = %err, %item_id, "Usage tracking update failed.");
			},
		}
	}

	tracing::debug!("Usage tracking worker stopped.");
}
