use tokio::sync::oneshot;
use ulid::Ulid;

use crate::catalog;
use crate::limits::*;
use crate::model::*;

use super::conflict::{conflicts_on, validate_schedule, validate_text};
use super::{Engine, EngineError, WalCommand};

impl Engine {
    /// Create a booking. The conflict check and the insert run under one
    /// held project write lock, so two concurrent creates for the same
    /// project serialize and the loser sees the winner's booking.
    pub async fn create_booking(&self, req: BookingRequest) -> Result<Booking, EngineError> {
        validate_schedule(
            req.scheduled_date,
            req.start_minute,
            req.duration_min
                .unwrap_or(catalog::profile(req.service).default_duration_min),
        )?;
        if req.project_id.is_empty() || req.project_id.len() > MAX_NAME_LEN {
            return Err(EngineError::LimitExceeded("project id length"));
        }
        if req.provider_id.len() > MAX_NAME_LEN || req.provider_name.len() > MAX_NAME_LEN {
            return Err(EngineError::LimitExceeded("provider field length"));
        }
        validate_text(&req.location, "location too long")?;
        if let Some(ref instructions) = req.instructions {
            validate_text(instructions, "instructions too long")?;
        }
        if let Some(ref details) = req.details {
            validate_text(details, "details too long")?;
        }
        if !req.estimated_cost.is_finite() || req.estimated_cost < 0.0 || req.estimated_cost > MAX_COST
        {
            return Err(EngineError::LimitExceeded("estimated cost out of range"));
        }

        let id = req.id.unwrap_or_else(Ulid::new);
        if self.booking_to_project.contains_key(&id) {
            return Err(EngineError::AlreadyExists(id));
        }
        let duration_min = req
            .duration_min
            .unwrap_or(catalog::profile(req.service).default_duration_min);

        let ps = self.get_or_create_project(&req.project_id)?;
        let mut guard = ps.write().await;
        if guard.bookings.len() >= MAX_BOOKINGS_PER_PROJECT {
            return Err(EngineError::LimitExceeded("too many bookings on project"));
        }

        let span = DaySpan::new(req.start_minute, req.start_minute + duration_min);
        let clashes = conflicts_on(&guard, req.scheduled_date, &span);
        if !clashes.is_empty() {
            metrics::counter!(crate::observability::BOOKING_CONFLICTS_TOTAL).increment(1);
            return Err(EngineError::Conflict(
                clashes.iter().map(|b| b.id).collect(),
            ));
        }

        let booking = Booking {
            id,
            project_id: req.project_id,
            service: req.service,
            provider_id: req.provider_id,
            provider_name: req.provider_name,
            details: req.details,
            scheduled_date: req.scheduled_date,
            start_minute: req.start_minute,
            duration_min,
            location: req.location,
            instructions: req.instructions,
            estimated_cost: req.estimated_cost,
            actual_cost: None,
            status: BookingStatus::Pending,
            completion_notes: None,
            rating: None,
            review: None,
        };
        let event = Event::BookingCreated {
            booking: booking.clone(),
        };
        self.persist_and_apply(&mut guard, &event).await?;
        Ok(booking)
    }

    /// Change a booking's status. `completed` and `cancelled` are terminal:
    /// any transition out of them is rejected. Other transitions are not
    /// restricted. `actual_cost` may be recorded alongside completion.
    pub async fn update_booking_status(
        &self,
        id: Ulid,
        status: BookingStatus,
        notes: Option<String>,
        actual_cost: Option<f64>,
    ) -> Result<(), EngineError> {
        if let Some(ref n) = notes {
            validate_text(n, "notes too long")?;
        }
        if let Some(cost) = actual_cost
            && (!cost.is_finite() || cost < 0.0 || cost > MAX_COST) {
                return Err(EngineError::LimitExceeded("actual cost out of range"));
            }

        let mut guard = self.resolve_booking_write(&id).await?;
        let current = guard.find(id).ok_or(EngineError::NotFound(id))?;
        if current.status.is_terminal() {
            return Err(EngineError::TerminalStatus {
                id,
                status: current.status,
            });
        }

        let event = Event::BookingStatusChanged {
            id,
            project_id: guard.project_id.clone(),
            status,
            notes,
            actual_cost,
        };
        self.persist_and_apply(&mut guard, &event).await
    }

    /// Cancel a booking, recording the reason in its completion notes.
    /// No cascading cleanup of dependent bookings.
    pub async fn cancel_booking(&self, id: Ulid, reason: String) -> Result<(), EngineError> {
        validate_text(&reason, "reason too long")?;

        let mut guard = self.resolve_booking_write(&id).await?;
        let current = guard.find(id).ok_or(EngineError::NotFound(id))?;
        if current.status.is_terminal() {
            return Err(EngineError::TerminalStatus {
                id,
                status: current.status,
            });
        }

        let event = Event::BookingCancelled {
            id,
            project_id: guard.project_id.clone(),
            reason,
        };
        self.persist_and_apply(&mut guard, &event).await
    }

    /// Attach a rating and review. Allowed in any status.
    pub async fn add_booking_review(
        &self,
        id: Ulid,
        rating: u8,
        review: String,
    ) -> Result<(), EngineError> {
        if !(MIN_RATING..=MAX_RATING).contains(&rating) {
            return Err(EngineError::LimitExceeded("rating out of range"));
        }
        validate_text(&review, "review too long")?;

        let mut guard = self.resolve_booking_write(&id).await?;
        if guard.find(id).is_none() {
            return Err(EngineError::NotFound(id));
        }

        let event = Event::BookingReviewed {
            id,
            project_id: guard.project_id.clone(),
            rating,
            review,
        };
        self.persist_and_apply(&mut guard, &event).await
    }

    /// Rewrite the WAL with one `BookingCreated` per booking — each record
    /// carries its full current state, so no other events are needed.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let mut events = Vec::new();
        let project_ids: Vec<String> = self.state.iter().map(|e| e.key().clone()).collect();
        for id in project_ids {
            let Some(ps) = self.get_project(&id) else {
                continue;
            };
            let guard = ps.read().await;
            for booking in &guard.bookings {
                events.push(Event::BookingCreated {
                    booking: booking.clone(),
                });
            }
        }

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact {
                events,
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
