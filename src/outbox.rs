//! Outbox replay: eventual delivery of stories created while offline.
//!
//! A record is written to the local store first (state Pending) and only
//! removed once the remote authority acknowledges it. `sync_all` walks the
//! outbox one record at a time; a failed record stays queued for the next
//! run and never stops the rest of the batch.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use crate::error::{SyncError, SyncResult};
use crate::remote::{submission_fields, StoryAuthority};
use crate::store::{RecordStore, StoryDraft, StoryRecord};

/// What happened to one record during a sync run.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
  /// Acknowledged and removed from the outbox
  Delivered { remote_id: Option<String> },
  /// Still pending; will be retried on the next run
  Failed(SyncError),
  /// Another delivery of this record was already in flight
  Skipped,
}

/// Per-record outcomes of one `sync_all` run, in attempt order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
  pub outcomes: Vec<(String, SyncOutcome)>,
}

impl SyncReport {
  pub fn delivered(&self) -> usize {
    self
      .outcomes
      .iter()
      .filter(|(_, o)| matches!(o, SyncOutcome::Delivered { .. }))
      .count()
  }

  pub fn failed(&self) -> usize {
    self
      .outcomes
      .iter()
      .filter(|(_, o)| matches!(o, SyncOutcome::Failed(_)))
      .count()
  }

  /// True when any failure was a network problem (worth a "sync now" later).
  pub fn had_transport_failure(&self) -> bool {
    self
      .outcomes
      .iter()
      .any(|(_, o)| matches!(o, SyncOutcome::Failed(e) if e.is_transient()))
  }
}

/// Delivers pending records to the remote authority.
pub struct OutboxReplayer {
  store: Arc<dyn RecordStore>,
  authority: Arc<dyn StoryAuthority>,
  in_flight: Mutex<HashSet<String>>,
}

/// Marks a record as in flight until dropped.
struct InFlight<'a> {
  set: &'a Mutex<HashSet<String>>,
  id: String,
}

impl Drop for InFlight<'_> {
  fn drop(&mut self) {
    if let Ok(mut set) = self.set.lock() {
      set.remove(&self.id);
    }
  }
}

impl OutboxReplayer {
  pub fn new(store: Arc<dyn RecordStore>, authority: Arc<dyn StoryAuthority>) -> Self {
    Self {
      store,
      authority,
      in_flight: Mutex::new(HashSet::new()),
    }
  }

  /// Queue a new story. It is durable once this returns.
  pub fn enqueue(&self, draft: StoryDraft) -> SyncResult<StoryRecord> {
    let record = StoryRecord::pending(draft);
    self.store.put(&record)?;
    info!(id = %record.id, "queued story for delivery");
    Ok(record)
  }

  /// Records still waiting for acknowledgment, oldest first.
  pub fn pending(&self) -> SyncResult<Vec<StoryRecord>> {
    Ok(
      self
        .store
        .get_all()?
        .into_iter()
        .filter(StoryRecord::is_pending)
        .collect(),
    )
  }

  /// Drop a queued record without delivering it.
  pub fn discard(&self, id: &str) -> SyncResult<()> {
    self.store.delete(id)?;
    info!(id, "discarded queued story");
    Ok(())
  }

  /// Attempt delivery of every pending record, sequentially.
  ///
  /// Remote failures are recorded per record and never abort the batch.
  /// A local store failure does abort it and is returned.
  pub async fn sync_all(&self) -> SyncResult<SyncReport> {
    let mut report = SyncReport::default();

    for record in self.pending()? {
      let Some(_guard) = self.claim(&record.id) else {
        report.outcomes.push((record.id, SyncOutcome::Skipped));
        continue;
      };
      // An overlapping run may have delivered it after our snapshot
      if !self.still_pending(&record.id)? {
        report.outcomes.push((record.id, SyncOutcome::Skipped));
        continue;
      }

      let outcome = match self.deliver(&record).await {
        Ok(remote_id) => {
          self.store.delete(&record.id)?;
          info!(id = %record.id, ?remote_id, "story delivered");
          if let Some(story_id) = &remote_id {
            self.notify(story_id).await;
          }
          SyncOutcome::Delivered { remote_id }
        }
        Err(e) => {
          warn!(id = %record.id, error = %e, "story delivery failed, keeping it queued");
          SyncOutcome::Failed(e)
        }
      };
      report.outcomes.push((record.id, outcome));
    }

    info!(
      delivered = report.delivered(),
      failed = report.failed(),
      "outbox sync finished"
    );
    Ok(report)
  }

  async fn deliver(&self, record: &StoryRecord) -> SyncResult<Option<String>> {
    submission_fields(record)?;
    self.authority.submit_story(record).await
  }

  /// The record is already complete; a failed notification is only logged.
  async fn notify(&self, story_id: &str) {
    if let Err(e) = self.authority.notify_created(story_id).await {
      warn!(story_id, error = %e, "new story notification failed");
    }
  }

  fn still_pending(&self, id: &str) -> SyncResult<bool> {
    Ok(
      self
        .store
        .get_all()?
        .iter()
        .any(|r| r.id == id && r.is_pending()),
    )
  }

  fn claim(&self, id: &str) -> Option<InFlight<'_>> {
    let mut set = self.in_flight.lock().ok()?;
    if !set.insert(id.to_string()) {
      return None;
    }
    Some(InFlight {
      set: &self.in_flight,
      id: id.to_string(),
    })
  }
}
