use std::sync::Arc;

use tokio::sync::RwLock;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::overlap::{free_ranges, now_ms};
use super::{Service, ServiceError};

/// Caller-supplied facility fields, shared by create and update.
#[derive(Debug, Clone)]
pub struct FacilityFields {
    pub name: String,
    pub description: Option<String>,
    pub address: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub max_capacity: u32,
    pub price_per_day: i64,
    pub is_active: bool,
}

fn validate_facility_fields(fields: &FacilityFields) -> Result<(), ServiceError> {
    if fields.name.trim().is_empty() {
        return Err(ServiceError::Invalid("facility name is required"));
    }
    if fields.name.len() > MAX_NAME_LEN {
        return Err(ServiceError::LimitExceeded("facility name too long"));
    }
    if let Some(ref d) = fields.description
        && d.len() > MAX_NOTES_LEN {
            return Err(ServiceError::LimitExceeded("description too long"));
        }
    if let Some(ref a) = fields.address
        && a.len() > MAX_ADDRESS_LEN {
            return Err(ServiceError::LimitExceeded("address too long"));
        }
    if let Some(ref p) = fields.postal_code
        && p.len() > MAX_POSTAL_CODE_LEN {
            return Err(ServiceError::LimitExceeded("postal code too long"));
        }
    if let Some(ref c) = fields.city
        && c.len() > MAX_NAME_LEN {
            return Err(ServiceError::LimitExceeded("city too long"));
        }
    if fields.max_capacity == 0 {
        return Err(ServiceError::Invalid("capacity must be at least 1"));
    }
    if fields.price_per_day < 0 {
        return Err(ServiceError::Invalid("price per day cannot be negative"));
    }
    Ok(())
}

impl Service {
    pub async fn create_facility(
        &self,
        fields: FacilityFields,
    ) -> Result<Facility, ServiceError> {
        if self.facilities.len() >= MAX_FACILITIES {
            return Err(ServiceError::LimitExceeded("too many facilities"));
        }
        validate_facility_fields(&fields)?;

        let facility = Facility {
            id: Ulid::new(),
            name: fields.name.trim().to_string(),
            description: fields.description,
            address: fields.address,
            postal_code: fields.postal_code,
            city: fields.city,
            max_capacity: fields.max_capacity,
            price_per_day: fields.price_per_day,
            is_active: fields.is_active,
            created_at: now_ms(),
        };

        self.wal_append(&Event::FacilityPut(facility.clone())).await?;
        self.facilities.insert(
            facility.id,
            Arc::new(RwLock::new(FacilityState::new(facility.clone()))),
        );
        Ok(facility)
    }

    pub async fn update_facility(
        &self,
        id: Ulid,
        fields: FacilityFields,
    ) -> Result<Facility, ServiceError> {
        validate_facility_fields(&fields)?;
        let state = self
            .get_facility_state(&id)
            .ok_or(ServiceError::NotFound(id))?;
        let mut guard = state.write_owned().await;

        let mut updated = guard.facility.clone();
        updated.name = fields.name.trim().to_string();
        updated.description = fields.description;
        updated.address = fields.address;
        updated.postal_code = fields.postal_code;
        updated.city = fields.city;
        updated.max_capacity = fields.max_capacity;
        updated.price_per_day = fields.price_per_day;
        updated.is_active = fields.is_active;

        self.wal_append(&Event::FacilityPut(updated.clone())).await?;
        guard.facility = updated.clone();
        Ok(updated)
    }

    /// Hard delete. Rejected while any booking references the facility —
    /// use `set_facility_active(false)` to retire one and keep its history.
    pub async fn delete_facility(&self, id: Ulid) -> Result<(), ServiceError> {
        let state = self
            .get_facility_state(&id)
            .ok_or(ServiceError::NotFound(id))?;
        let guard = state.write_owned().await;
        if !guard.bookings.is_empty() {
            return Err(ServiceError::HasBookings(id));
        }

        self.wal_append(&Event::FacilityDeleted { id }).await?;
        self.facilities.remove(&id);
        Ok(())
    }

    pub async fn set_facility_active(
        &self,
        id: Ulid,
        is_active: bool,
    ) -> Result<Facility, ServiceError> {
        let state = self
            .get_facility_state(&id)
            .ok_or(ServiceError::NotFound(id))?;
        let mut guard = state.write_owned().await;

        let mut updated = guard.facility.clone();
        updated.is_active = is_active;

        self.wal_append(&Event::FacilityPut(updated.clone())).await?;
        guard.facility = updated.clone();
        Ok(updated)
    }

    pub async fn get_facility(&self, id: Ulid) -> Option<Facility> {
        let state = self.get_facility_state(&id)?;
        let guard = state.read().await;
        Some(guard.facility.clone())
    }

    pub async fn list_facilities(&self) -> Vec<Facility> {
        let states: Vec<_> = self.facilities.iter().map(|e| e.value().clone()).collect();
        let mut out = Vec::with_capacity(states.len());
        for state in states {
            out.push(state.read().await.facility.clone());
        }
        out.sort_by_key(|f| (f.created_at, f.id));
        out
    }

    pub async fn list_active_facilities(&self) -> Vec<Facility> {
        let mut out = self.list_facilities().await;
        out.retain(|f| f.is_active);
        out
    }

    /// Free sub-ranges of `[from, end)` after subtracting active bookings.
    pub async fn facility_availability(
        &self,
        id: Ulid,
        from: Ms,
        to: Ms,
    ) -> Result<Vec<DateRange>, ServiceError> {
        if from >= to {
            return Err(ServiceError::Invalid("query start must be before end"));
        }
        if to - from > MAX_QUERY_WINDOW_MS {
            return Err(ServiceError::LimitExceeded("query window too wide"));
        }
        let state = self
            .get_facility_state(&id)
            .ok_or(ServiceError::NotFound(id))?;
        let guard = state.read().await;
        Ok(free_ranges(&guard, &DateRange::new(from, to)))
    }
}
