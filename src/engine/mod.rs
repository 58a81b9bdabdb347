mod conflict;
mod dependencies;
mod error;
mod mutations;
mod queries;
mod recommend;
mod resolver;

pub use dependencies::{compute_dependencies, timeline_adjustments};
pub use error::EngineError;
pub use recommend::recommend;
pub use resolver::detect_conflicts;

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{RwLock, mpsc, oneshot};
use ulid::Ulid;

use crate::model::*;
use crate::notify::NotifyHub;
use crate::wal::Wal;

pub type SharedProjectState = Arc<RwLock<ProjectState>>;

// ── Group-commit WAL channel ─────────────────────────────

/// How many queued commands one writer-loop turn drains at most.
const WAL_BATCH_MAX: usize = 256;

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL. Appends arriving close together are
/// buffered and committed with a single fsync; compaction and bookkeeping
/// commands are handled between batches.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    let mut queue = Vec::with_capacity(WAL_BATCH_MAX);
    while rx.recv_many(&mut queue, WAL_BATCH_MAX).await > 0 {
        let mut batch: Vec<(Event, oneshot::Sender<io::Result<()>>)> = Vec::new();
        for cmd in queue.drain(..) {
            match cmd {
                WalCommand::Append { event, response } => batch.push((event, response)),
                other => {
                    // Appends queued ahead of this command must hit disk first.
                    flush_and_respond(&mut wal, &mut batch);
                    handle_non_append(&mut wal, other);
                }
            }
        }
        flush_and_respond(&mut wal, &mut batch);
    }
}

fn flush_and_respond(wal: &mut Wal, batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>) {
    if batch.is_empty() {
        return;
    }
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();

    let mut result: io::Result<()> = Ok(());
    for (event, _) in batch.iter() {
        if let Err(e) = wal.append_buffered(event) {
            result = Err(e);
            break;
        }
    }
    // Always flush, even after an append error, so partially buffered bytes
    // don't leak into the next batch (these callers are told it failed).
    let flush_err = wal.flush_sync().err();
    if result.is_ok()
        && let Some(e) = flush_err {
            result = Err(e);
        }

    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());

    for (_, tx) in batch.drain(..) {
        let r = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!(),
    }
}

// ── Engine ───────────────────────────────────────────────

/// One tenant's booking store: per-project state behind individual RwLocks,
/// a group-commit WAL writer, and the timeline-update broadcast hub.
pub struct Engine {
    pub state: DashMap<String, SharedProjectState>,
    wal_tx: mpsc::Sender<WalCommand>,
    pub notify: Arc<NotifyHub>,
    /// Reverse lookup: booking id → project id.
    booking_to_project: DashMap<Ulid, String>,
}

/// Apply an event to a project's state. No locking — the caller holds the
/// project's write lock (or is the sole owner during replay).
fn apply_to_project(ps: &mut ProjectState, event: &Event, index: &DashMap<Ulid, String>) {
    match event {
        Event::BookingCreated { booking } => {
            index.insert(booking.id, booking.project_id.clone());
            ps.insert_booking(booking.clone());
        }
        Event::BookingStatusChanged {
            id,
            status,
            notes,
            actual_cost,
            ..
        } => {
            if let Some(b) = ps.find_mut(*id) {
                b.status = *status;
                if notes.is_some() {
                    b.completion_notes = notes.clone();
                }
                if actual_cost.is_some() {
                    b.actual_cost = *actual_cost;
                }
            }
        }
        Event::BookingCancelled { id, reason, .. } => {
            if let Some(b) = ps.find_mut(*id) {
                b.status = BookingStatus::Cancelled;
                b.completion_notes = Some(reason.clone());
            }
        }
        Event::BookingReviewed {
            id, rating, review, ..
        } => {
            if let Some(b) = ps.find_mut(*id) {
                b.rating = Some(*rating);
                b.review = Some(review.clone());
            }
        }
    }
}

impl Engine {
    pub fn new(wal_path: PathBuf, notify: Arc<NotifyHub>) -> io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let engine = Self {
            state: DashMap::new(),
            wal_tx,
            notify,
            booking_to_project: DashMap::new(),
        };

        // Replay into plain maps first — nothing else can observe the state
        // yet, so no locks are involved at all.
        let mut projects: HashMap<String, ProjectState> = HashMap::new();
        for event in &events {
            let project_id = event.project_id().to_string();
            let ps = projects
                .entry(project_id.clone())
                .or_insert_with(|| ProjectState::new(project_id));
            apply_to_project(ps, event, &engine.booking_to_project);
        }
        for (id, ps) in projects {
            engine.state.insert(id, Arc::new(RwLock::new(ps)));
        }

        Ok(engine)
    }

    /// Write an event to the WAL via the background group-commit writer.
    async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| {
                tracing::error!("WAL append failed for {}: {e}", event.project_id());
                EngineError::WalError(e.to_string())
            })
    }

    pub fn get_project(&self, project_id: &str) -> Option<SharedProjectState> {
        self.state.get(project_id).map(|e| e.value().clone())
    }

    pub fn project_for_booking(&self, booking_id: &Ulid) -> Option<String> {
        self.booking_to_project
            .get(booking_id)
            .map(|e| e.value().clone())
    }

    /// Project state for a write, created on first booking. Projects are
    /// owned by an external domain; this side only tracks their bookings.
    pub(super) fn get_or_create_project(
        &self,
        project_id: &str,
    ) -> Result<SharedProjectState, EngineError> {
        if let Some(ps) = self.get_project(project_id) {
            return Ok(ps);
        }
        if self.state.len() >= crate::limits::MAX_PROJECTS_PER_TENANT {
            return Err(EngineError::LimitExceeded("too many projects"));
        }
        let entry = self
            .state
            .entry(project_id.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(ProjectState::new(project_id.to_string()))));
        Ok(entry.value().clone())
    }

    /// WAL-append + apply + notify in one call, under the caller's lock.
    pub(super) async fn persist_and_apply(
        &self,
        ps: &mut ProjectState,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        apply_to_project(ps, event, &self.booking_to_project);
        self.notify.send(event.project_id(), event);
        Ok(())
    }

    /// Resolve booking → project and take the project's write lock.
    pub(super) async fn resolve_booking_write(
        &self,
        booking_id: &Ulid,
    ) -> Result<tokio::sync::OwnedRwLockWriteGuard<ProjectState>, EngineError> {
        let project_id = self
            .project_for_booking(booking_id)
            .ok_or(EngineError::NotFound(*booking_id))?;
        let ps = self
            .get_project(&project_id)
            .ok_or(EngineError::NotFound(*booking_id))?;
        Ok(ps.write_owned().await)
    }
}
