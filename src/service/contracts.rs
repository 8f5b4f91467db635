use std::sync::Arc;

use tokio::sync::RwLock;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::overlap::now_ms;
use super::{Service, ServiceError};

pub(super) const DEFAULT_TERMS: &str = "Standard terms: payment due within 30 days of \
signing; cancellation free of charge until 14 days before the booking starts.";

pub(super) const DEFAULT_CURRENCY: &str = "SEK";

/// Optional updates for a Draft or Sent contract.
#[derive(Debug, Clone, Default)]
pub struct ContractPatch {
    pub terms: Option<String>,
    pub total_amount: Option<i64>,
    pub currency: Option<String>,
    pub payment_due: Option<Ms>,
}

pub(super) fn build_contract(
    id: Ulid,
    booking: &Booking,
    customer: &Customer,
    facility_name: &str,
    terms: Option<String>,
    payment_due: Option<Ms>,
    now: Ms,
) -> BookingContract {
    BookingContract {
        id,
        booking_id: booking.id,
        contract_number: format!("KV-{id}"),
        version: 1,
        status: ContractStatus::Draft,
        terms: terms.unwrap_or_else(|| DEFAULT_TERMS.to_string()),
        total_amount: booking.total_price,
        currency: DEFAULT_CURRENCY.to_string(),
        payment_due,
        customer_name: customer.full_name(),
        customer_email: customer.email.clone(),
        facility_name: facility_name.to_string(),
        document_name: None,
        created_at: now,
        updated_at: now,
        signed_at: None,
        cancelled_at: None,
        cancel_reason: None,
    }
}

impl Service {
    pub(super) async fn store_contract(
        &self,
        contract: BookingContract,
    ) -> Result<(), ServiceError> {
        self.wal_append(&Event::ContractPut(contract.clone())).await?;
        self.contract_by_booking
            .insert(contract.booking_id, contract.id);
        self.contracts
            .insert(contract.id, Arc::new(RwLock::new(contract)));
        Ok(())
    }

    /// Manually create a contract for a booking whose auto-creation did not
    /// happen (e.g. a crash between the booking and contract log entries).
    pub async fn create_contract_for_booking(
        &self,
        booking_id: Ulid,
        terms: Option<String>,
        payment_due: Option<Ms>,
    ) -> Result<BookingContract, ServiceError> {
        if let Some(ref t) = terms
            && t.len() > MAX_TERMS_LEN {
                return Err(ServiceError::LimitExceeded("terms too long"));
            }
        let booking = self
            .get_booking(booking_id)
            .await
            .ok_or(ServiceError::NotFound(booking_id))?;
        if booking.status == BookingStatus::Cancelled {
            return Err(ServiceError::Invalid(
                "cannot create a contract for a cancelled booking",
            ));
        }
        if let Some(existing) = self.contract_by_booking.get(&booking_id) {
            return Err(ServiceError::AlreadyExists(*existing.value()));
        }
        let customer = self
            .get_customer(booking.customer_id)
            .await
            .ok_or(ServiceError::NotFound(booking.customer_id))?;
        let facility = self
            .get_facility(booking.facility_id)
            .await
            .ok_or(ServiceError::NotFound(booking.facility_id))?;

        let contract = build_contract(
            Ulid::new(),
            &booking,
            &customer,
            &facility.name,
            terms,
            payment_due,
            now_ms(),
        );
        self.store_contract(contract.clone()).await?;

        // Point the booking at its (possibly repaired) contract.
        if booking.contract_id != Some(contract.id) {
            let mut guard = self.resolve_booking_write(&booking_id).await?;
            if let Some(mut updated) = guard.get_booking(booking_id).cloned() {
                updated.contract_id = Some(contract.id);
                self.wal_append(&Event::BookingPut(updated.clone())).await?;
                guard.upsert_booking(updated);
            }
        }

        Ok(contract)
    }

    /// Update terms, amount, currency, or payment due date. Draft/Sent only.
    pub async fn patch_contract(
        &self,
        id: Ulid,
        patch: ContractPatch,
    ) -> Result<BookingContract, ServiceError> {
        if let Some(ref t) = patch.terms
            && t.len() > MAX_TERMS_LEN {
                return Err(ServiceError::LimitExceeded("terms too long"));
            }
        if let Some(ref c) = patch.currency
            && (c.is_empty() || c.len() > MAX_CURRENCY_LEN) {
                return Err(ServiceError::Invalid("invalid currency code"));
            }
        if let Some(amount) = patch.total_amount
            && amount < 0 {
                return Err(ServiceError::Invalid("amount cannot be negative"));
            }

        let mut guard = self.resolve_contract_write(&id).await?;
        if guard.status.is_terminal() {
            return Err(ServiceError::InvalidTransition {
                entity: "contract",
                from: guard.status.as_str(),
                action: "modify",
            });
        }

        let mut updated = guard.clone();
        if let Some(terms) = patch.terms {
            updated.terms = terms;
        }
        if let Some(amount) = patch.total_amount {
            updated.total_amount = amount;
        }
        if let Some(currency) = patch.currency {
            updated.currency = currency;
        }
        if let Some(due) = patch.payment_due {
            updated.payment_due = Some(due);
        }
        updated.version += 1;
        updated.updated_at = now_ms();

        self.wal_append(&Event::ContractPut(updated.clone())).await?;
        *guard = updated.clone();
        Ok(updated)
    }

    /// Mark a Draft contract as sent to the customer.
    pub async fn send_contract(&self, id: Ulid) -> Result<BookingContract, ServiceError> {
        self.require_confirmed_booking(id).await?;

        let mut guard = self.resolve_contract_write(&id).await?;
        if guard.status != ContractStatus::Draft {
            return Err(ServiceError::InvalidTransition {
                entity: "contract",
                from: guard.status.as_str(),
                action: "send",
            });
        }

        let mut updated = guard.clone();
        updated.status = ContractStatus::Sent;
        updated.updated_at = now_ms();

        self.wal_append(&Event::ContractPut(updated.clone())).await?;
        *guard = updated.clone();
        Ok(updated)
    }

    /// Record the customer's signature on a Draft or Sent contract.
    pub async fn sign_contract(&self, id: Ulid) -> Result<BookingContract, ServiceError> {
        self.require_confirmed_booking(id).await?;

        let mut guard = self.resolve_contract_write(&id).await?;
        if guard.status.is_terminal() {
            return Err(ServiceError::InvalidTransition {
                entity: "contract",
                from: guard.status.as_str(),
                action: "sign",
            });
        }

        let now = now_ms();
        let mut updated = guard.clone();
        updated.status = ContractStatus::Signed;
        updated.signed_at = Some(now);
        updated.updated_at = now;

        self.wal_append(&Event::ContractPut(updated.clone())).await?;
        *guard = updated.clone();
        Ok(updated)
    }

    /// Cancel a contract via the API. Idempotent when already cancelled;
    /// a signed contract can only fall with its booking.
    pub async fn cancel_contract(
        &self,
        id: Ulid,
        reason: Option<String>,
    ) -> Result<BookingContract, ServiceError> {
        if let Some(ref r) = reason
            && r.len() > MAX_REASON_LEN {
                return Err(ServiceError::LimitExceeded("cancel reason too long"));
            }
        let mut guard = self.resolve_contract_write(&id).await?;
        match guard.status {
            ContractStatus::Cancelled => return Ok(guard.clone()),
            ContractStatus::Signed => {
                return Err(ServiceError::InvalidTransition {
                    entity: "contract",
                    from: "Signed",
                    action: "cancel",
                });
            }
            _ => {}
        }
        self.apply_contract_cancel(&mut guard, reason).await
    }

    /// Booking-cancellation cascade: cancels from any status except Cancelled.
    pub(super) async fn cascade_cancel_contract(
        &self,
        id: Ulid,
        reason: Option<String>,
    ) -> Result<(), ServiceError> {
        let mut guard = self.resolve_contract_write(&id).await?;
        if guard.status == ContractStatus::Cancelled {
            return Ok(());
        }
        self.apply_contract_cancel(&mut guard, reason).await?;
        Ok(())
    }

    async fn apply_contract_cancel(
        &self,
        guard: &mut BookingContract,
        reason: Option<String>,
    ) -> Result<BookingContract, ServiceError> {
        let now = now_ms();
        let mut updated = guard.clone();
        updated.status = ContractStatus::Cancelled;
        updated.cancelled_at = Some(now);
        updated.cancel_reason = reason;
        updated.updated_at = now;

        self.wal_append(&Event::ContractPut(updated.clone())).await?;
        *guard = updated.clone();
        Ok(updated)
    }

    /// Reschedule flow: keep a not-yet-final contract priced like its booking.
    pub(super) async fn refresh_contract_amount(
        &self,
        id: Ulid,
        amount: i64,
    ) -> Result<(), ServiceError> {
        let mut guard = self.resolve_contract_write(&id).await?;
        if guard.status.is_terminal() {
            return Ok(());
        }
        let mut updated = guard.clone();
        updated.total_amount = amount;
        updated.version += 1;
        updated.updated_at = now_ms();

        self.wal_append(&Event::ContractPut(updated.clone())).await?;
        *guard = updated;
        Ok(())
    }

    /// Record the filename of an uploaded contract document.
    pub async fn set_contract_document(
        &self,
        id: Ulid,
        document_name: String,
    ) -> Result<BookingContract, ServiceError> {
        let mut guard = self.resolve_contract_write(&id).await?;
        let mut updated = guard.clone();
        updated.document_name = Some(document_name);
        updated.updated_at = now_ms();

        self.wal_append(&Event::ContractPut(updated.clone())).await?;
        *guard = updated.clone();
        Ok(updated)
    }

    async fn require_confirmed_booking(&self, contract_id: Ulid) -> Result<(), ServiceError> {
        let booking_id = {
            let arc = self
                .contracts
                .get(&contract_id)
                .map(|e| e.value().clone())
                .ok_or(ServiceError::NotFound(contract_id))?;
            let guard = arc.read().await;
            guard.booking_id
        };
        let booking = self
            .get_booking(booking_id)
            .await
            .ok_or(ServiceError::NotFound(booking_id))?;
        if booking.status != BookingStatus::Confirmed {
            return Err(ServiceError::BookingNotConfirmed(booking_id));
        }
        Ok(())
    }

    // ── Queries ──────────────────────────────────────────────

    pub async fn get_contract(&self, id: Ulid) -> Option<BookingContract> {
        let arc = self.contracts.get(&id).map(|e| e.value().clone())?;
        let guard = arc.read().await;
        Some(guard.clone())
    }

    pub async fn get_contract_for_booking(&self, booking_id: Ulid) -> Option<BookingContract> {
        let id = *self.contract_by_booking.get(&booking_id)?.value();
        self.get_contract(id).await
    }

    /// All contracts, newest first.
    pub async fn list_contracts(&self) -> Vec<BookingContract> {
        let arcs: Vec<_> = self.contracts.iter().map(|e| e.value().clone()).collect();
        let mut out = Vec::with_capacity(arcs.len());
        for arc in arcs {
            out.push(arc.read().await.clone());
        }
        out.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        out
    }
}
