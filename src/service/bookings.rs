use tracing::warn;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::contracts::build_contract;
use super::overlap::{check_no_conflict, now_ms, validate_range};
use super::{Service, ServiceError};

/// Caller-supplied fields for a new booking.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub customer_id: Ulid,
    pub facility_id: Ulid,
    pub start: Ms,
    pub end: Ms,
    pub participants: u32,
    pub notes: Option<String>,
}

impl Service {
    /// Create a Pending booking with availability checking and automatic
    /// Draft-contract generation.
    pub async fn create_booking(&self, req: NewBooking) -> Result<Booking, ServiceError> {
        if let Some(ref n) = req.notes
            && n.len() > MAX_NOTES_LEN {
                return Err(ServiceError::LimitExceeded("notes too long"));
            }
        if req.participants == 0 {
            return Err(ServiceError::Invalid("at least one participant is required"));
        }
        let range = validate_range(req.start, req.end)?;
        let now = now_ms();
        if range.start <= now {
            return Err(ServiceError::Invalid("booking must start in the future"));
        }

        let customer = self
            .get_customer(req.customer_id)
            .await
            .ok_or(ServiceError::NotFound(req.customer_id))?;

        let state = self
            .get_facility_state(&req.facility_id)
            .ok_or(ServiceError::NotFound(req.facility_id))?;
        let mut guard = state.write_owned().await;

        if !guard.facility.is_active {
            return Err(ServiceError::FacilityInactive(req.facility_id));
        }
        if req.participants > guard.facility.max_capacity {
            return Err(ServiceError::OverCapacity {
                requested: req.participants,
                max: guard.facility.max_capacity,
            });
        }
        if guard.bookings.len() >= MAX_BOOKINGS_PER_FACILITY {
            return Err(ServiceError::LimitExceeded("too many bookings on facility"));
        }
        check_no_conflict(&guard, &range, None)?;

        let contract_id = Ulid::new();
        let booking = Booking {
            id: Ulid::new(),
            customer_id: customer.id,
            facility_id: req.facility_id,
            range,
            participants: req.participants,
            notes: req.notes,
            status: BookingStatus::Pending,
            total_price: range.days() * guard.facility.price_per_day,
            created_at: now,
            confirmed_at: None,
            cancelled_at: None,
            cancel_reason: None,
            contract_id: Some(contract_id),
        };
        let contract = build_contract(
            contract_id,
            &booking,
            &customer,
            &guard.facility.name,
            None,
            None,
            now,
        );

        self.wal_append(&Event::BookingPut(booking.clone())).await?;
        guard.insert_booking(booking.clone());
        self.booking_to_facility.insert(booking.id, booking.facility_id);
        drop(guard);

        // A crash between the two appends leaves a booking without its
        // contract; the manual contract-creation endpoint repairs that.
        self.store_contract(contract).await?;

        Ok(booking)
    }

    /// Confirm a Pending booking. Idempotent for already-confirmed bookings.
    pub async fn confirm_booking(&self, id: Ulid) -> Result<Booking, ServiceError> {
        let mut guard = self.resolve_booking_write(&id).await?;
        let booking = guard
            .get_booking(id)
            .cloned()
            .ok_or(ServiceError::NotFound(id))?;

        match booking.status {
            BookingStatus::Cancelled => {
                return Err(ServiceError::InvalidTransition {
                    entity: "booking",
                    from: "Cancelled",
                    action: "confirm",
                });
            }
            BookingStatus::Confirmed => return Ok(booking),
            BookingStatus::Pending => {}
        }
        let now = now_ms();
        if booking.range.end <= now {
            return Err(ServiceError::Invalid(
                "cannot confirm a booking that has already ended",
            ));
        }

        let mut updated = booking;
        updated.status = BookingStatus::Confirmed;
        updated.confirmed_at = Some(now);

        self.wal_append(&Event::BookingPut(updated.clone())).await?;
        guard.upsert_booking(updated.clone());
        drop(guard);

        self.notify_booking_confirmed(&updated).await;
        Ok(updated)
    }

    /// Move a booking to new dates, re-checking availability and re-pricing.
    pub async fn reschedule_booking(
        &self,
        id: Ulid,
        start: Ms,
        end: Ms,
    ) -> Result<Booking, ServiceError> {
        let range = validate_range(start, end)?;
        let now = now_ms();
        if range.start <= now {
            return Err(ServiceError::Invalid("booking must start in the future"));
        }

        let mut guard = self.resolve_booking_write(&id).await?;
        let booking = guard
            .get_booking(id)
            .cloned()
            .ok_or(ServiceError::NotFound(id))?;

        if booking.status == BookingStatus::Cancelled {
            return Err(ServiceError::InvalidTransition {
                entity: "booking",
                from: "Cancelled",
                action: "reschedule",
            });
        }
        check_no_conflict(&guard, &range, Some(id))?;

        let mut updated = booking;
        updated.range = range;
        updated.total_price = range.days() * guard.facility.price_per_day;

        self.wal_append(&Event::BookingPut(updated.clone())).await?;
        guard.upsert_booking(updated.clone());
        drop(guard);

        // Re-priced bookings flow through to a contract that isn't final yet.
        if let Some(contract_id) = updated.contract_id
            && let Err(e) = self
                .refresh_contract_amount(contract_id, updated.total_price)
                .await
        {
            warn!("booking {id}: contract amount refresh failed: {e}");
        }

        Ok(updated)
    }

    /// Cancel a booking. Idempotent; cascades to the linked contract.
    pub async fn cancel_booking(
        &self,
        id: Ulid,
        reason: Option<String>,
    ) -> Result<Booking, ServiceError> {
        if let Some(ref r) = reason
            && r.len() > MAX_REASON_LEN {
                return Err(ServiceError::LimitExceeded("cancel reason too long"));
            }

        let mut guard = self.resolve_booking_write(&id).await?;
        let booking = guard
            .get_booking(id)
            .cloned()
            .ok_or(ServiceError::NotFound(id))?;

        if booking.status == BookingStatus::Cancelled {
            return Ok(booking);
        }

        let mut updated = booking;
        updated.status = BookingStatus::Cancelled;
        updated.cancelled_at = Some(now_ms());
        updated.cancel_reason = reason.clone();

        self.wal_append(&Event::BookingPut(updated.clone())).await?;
        guard.upsert_booking(updated.clone());
        drop(guard);

        // The contract dies with its booking, signed or not.
        if let Some(contract_id) = updated.contract_id
            && let Err(e) = self
                .cascade_cancel_contract(contract_id, reason.clone())
                .await
        {
            warn!("booking {id}: contract cascade cancel failed: {e}");
        }

        self.notify_booking_cancelled(&updated).await;
        Ok(updated)
    }

    // ── Queries ──────────────────────────────────────────────

    pub async fn get_booking(&self, id: Ulid) -> Option<Booking> {
        let facility_id = self.facility_for_booking(&id)?;
        let state = self.get_facility_state(&facility_id)?;
        let guard = state.read().await;
        guard.get_booking(id).cloned()
    }

    /// All bookings, newest first.
    pub async fn list_bookings(&self) -> Vec<Booking> {
        let mut out = self.collect_bookings(|_| true).await;
        out.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        out
    }

    pub async fn bookings_for_customer(&self, customer_id: Ulid) -> Vec<Booking> {
        let mut out = self
            .collect_bookings(|b| b.customer_id == customer_id)
            .await;
        out.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        out
    }

    pub async fn bookings_for_facility(&self, facility_id: Ulid) -> Vec<Booking> {
        let state = match self.get_facility_state(&facility_id) {
            Some(s) => s,
            None => return Vec::new(),
        };
        let guard = state.read().await;
        let mut out = guard.bookings.clone();
        out.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        out
    }

    /// Bookings overlapping `[from, to)` across all facilities, by start date.
    pub async fn bookings_in_range(&self, from: Ms, to: Ms) -> Result<Vec<Booking>, ServiceError> {
        if from >= to {
            return Err(ServiceError::Invalid("query start must be before end"));
        }
        let query = DateRange::new(from, to);
        let states: Vec<_> = self.facilities.iter().map(|e| e.value().clone()).collect();
        let mut out = Vec::new();
        for state in states {
            let guard = state.read().await;
            out.extend(guard.overlapping(&query).cloned());
        }
        out.sort_by_key(|b| (b.range.start, b.id));
        Ok(out)
    }

    async fn collect_bookings(&self, keep: impl Fn(&Booking) -> bool) -> Vec<Booking> {
        let states: Vec<_> = self.facilities.iter().map(|e| e.value().clone()).collect();
        let mut out = Vec::new();
        for state in states {
            let guard = state.read().await;
            out.extend(guard.bookings.iter().filter(|b| keep(b)).cloned());
        }
        out
    }

    // ── Email notifications (fire-and-forget) ────────────────

    async fn notify_booking_confirmed(&self, booking: &Booking) {
        let Some(customer) = self.get_customer(booking.customer_id).await else {
            return;
        };
        if customer.email.trim().is_empty() {
            return;
        }
        let mailer = self.mailer.clone();
        let booking_id = booking.id.to_string();
        let name = customer.full_name();
        tokio::spawn(async move {
            if let Err(e) = mailer
                .booking_confirmed(&customer.email, &name, &booking_id)
                .await
            {
                warn!("confirmation email for booking {booking_id} failed: {e}");
            }
        });
    }

    async fn notify_booking_cancelled(&self, booking: &Booking) {
        let Some(customer) = self.get_customer(booking.customer_id).await else {
            return;
        };
        if customer.email.trim().is_empty() {
            return;
        }
        let mailer = self.mailer.clone();
        let booking_id = booking.id.to_string();
        let name = customer.full_name();
        let reason = booking.cancel_reason.clone();
        tokio::spawn(async move {
            if let Err(e) = mailer
                .booking_cancelled(&customer.email, &name, &booking_id, reason.as_deref())
                .await
            {
                warn!("cancellation email for booking {booking_id} failed: {e}");
            }
        });
    }
}
