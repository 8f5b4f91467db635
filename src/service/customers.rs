use std::sync::Arc;

use tokio::sync::RwLock;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::overlap::now_ms;
use super::{Service, ServiceError, SharedCustomer};

/// Caller-supplied customer fields, shared by create and update.
#[derive(Debug, Clone)]
pub struct CustomerFields {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company_name: Option<String>,
    pub address: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
}

fn validate_customer_fields(fields: &CustomerFields) -> Result<(), ServiceError> {
    if fields.first_name.trim().is_empty() && fields.last_name.trim().is_empty() {
        return Err(ServiceError::Invalid("customer name is required"));
    }
    if fields.first_name.len() > MAX_NAME_LEN || fields.last_name.len() > MAX_NAME_LEN {
        return Err(ServiceError::LimitExceeded("customer name too long"));
    }
    let email = fields.email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(ServiceError::Invalid("a valid email address is required"));
    }
    if email.len() > MAX_EMAIL_LEN {
        return Err(ServiceError::LimitExceeded("email too long"));
    }
    if let Some(ref p) = fields.phone
        && p.len() > MAX_PHONE_LEN {
            return Err(ServiceError::LimitExceeded("phone number too long"));
        }
    if let Some(ref c) = fields.company_name
        && c.len() > MAX_NAME_LEN {
            return Err(ServiceError::LimitExceeded("company name too long"));
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
    Ok(())
}

impl Service {
    fn customer_arcs(&self) -> Vec<SharedCustomer> {
        self.customers.iter().map(|e| e.value().clone()).collect()
    }

    /// Reject `email` if another customer already uses it (case-insensitive).
    async fn ensure_email_free(
        &self,
        email: &str,
        exclude: Option<Ulid>,
    ) -> Result<(), ServiceError> {
        for arc in self.customer_arcs() {
            let guard = arc.read().await;
            if exclude == Some(guard.id) {
                continue;
            }
            if guard.email.eq_ignore_ascii_case(email) {
                return Err(ServiceError::EmailTaken(guard.email.clone()));
            }
        }
        Ok(())
    }

    pub async fn create_customer(
        &self,
        fields: CustomerFields,
    ) -> Result<Customer, ServiceError> {
        if self.customers.len() >= MAX_CUSTOMERS {
            return Err(ServiceError::LimitExceeded("too many customers"));
        }
        validate_customer_fields(&fields)?;
        let email = fields.email.trim().to_string();
        self.ensure_email_free(&email, None).await?;

        let customer = Customer {
            id: Ulid::new(),
            first_name: fields.first_name.trim().to_string(),
            last_name: fields.last_name.trim().to_string(),
            email,
            phone: fields.phone,
            company_name: fields.company_name,
            address: fields.address,
            postal_code: fields.postal_code,
            city: fields.city,
            created_at: now_ms(),
        };

        self.wal_append(&Event::CustomerPut(customer.clone())).await?;
        self.customers
            .insert(customer.id, Arc::new(RwLock::new(customer.clone())));
        Ok(customer)
    }

    pub async fn update_customer(
        &self,
        id: Ulid,
        fields: CustomerFields,
    ) -> Result<Customer, ServiceError> {
        validate_customer_fields(&fields)?;
        let email = fields.email.trim().to_string();
        self.ensure_email_free(&email, Some(id)).await?;

        let arc = self
            .customers
            .get(&id)
            .map(|e| e.value().clone())
            .ok_or(ServiceError::NotFound(id))?;
        let mut guard = arc.write_owned().await;

        let mut updated = guard.clone();
        updated.first_name = fields.first_name.trim().to_string();
        updated.last_name = fields.last_name.trim().to_string();
        updated.email = email;
        updated.phone = fields.phone;
        updated.company_name = fields.company_name;
        updated.address = fields.address;
        updated.postal_code = fields.postal_code;
        updated.city = fields.city;

        self.wal_append(&Event::CustomerPut(updated.clone())).await?;
        *guard = updated.clone();
        Ok(updated)
    }

    /// Delete a customer. Rejected while active bookings reference them;
    /// historical (cancelled) bookings keep their customer id.
    pub async fn delete_customer(&self, id: Ulid) -> Result<(), ServiceError> {
        if !self.customers.contains_key(&id) {
            return Err(ServiceError::NotFound(id));
        }
        let active = self
            .bookings_for_customer(id)
            .await
            .into_iter()
            .any(|b| b.status.is_active());
        if active {
            return Err(ServiceError::HasActiveBookings(id));
        }

        self.wal_append(&Event::CustomerDeleted { id }).await?;
        self.customers.remove(&id);
        Ok(())
    }

    pub async fn get_customer(&self, id: Ulid) -> Option<Customer> {
        let arc = self.customers.get(&id).map(|e| e.value().clone())?;
        let guard = arc.read().await;
        Some(guard.clone())
    }

    pub async fn list_customers(&self) -> Vec<Customer> {
        let mut out = Vec::with_capacity(self.customers.len());
        for arc in self.customer_arcs() {
            out.push(arc.read().await.clone());
        }
        out.sort_by_key(|c| (c.created_at, c.id));
        out
    }

    pub async fn find_customer_by_email(&self, email: &str) -> Option<Customer> {
        for arc in self.customer_arcs() {
            let guard = arc.read().await;
            if guard.email.eq_ignore_ascii_case(email.trim()) {
                return Some(guard.clone());
            }
        }
        None
    }

    /// (total, active) booking counts for the customer list view.
    pub async fn customer_booking_counts(&self, id: Ulid) -> (usize, usize) {
        let bookings = self.bookings_for_customer(id).await;
        let active = bookings.iter().filter(|b| b.status.is_active()).count();
        (bookings.len(), active)
    }
}
