use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::limits::DAY_MS;

/// Unix milliseconds — the only time type.
pub type Ms = i64;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Ms,
    pub end: Ms,
}

impl DateRange {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start < end, "DateRange start must be before end");
        Self { start, end }
    }

    pub fn duration_ms(&self) -> Ms {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Billable days: every started day counts, minimum one.
    pub fn days(&self) -> i64 {
        ((self.duration_ms() as u64).div_ceil(DAY_MS as u64) as i64).max(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "Pending",
            BookingStatus::Confirmed => "Confirmed",
            BookingStatus::Cancelled => "Cancelled",
        }
    }

    /// Pending and Confirmed bookings occupy their facility's calendar.
    pub fn is_active(&self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Confirmed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractStatus {
    Draft,
    Sent,
    Signed,
    Cancelled,
}

impl ContractStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContractStatus::Draft => "Draft",
            ContractStatus::Sent => "Sent",
            ContractStatus::Signed => "Signed",
            ContractStatus::Cancelled => "Cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ContractStatus::Signed | ContractStatus::Cancelled)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: Ulid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company_name: Option<String>,
    pub address: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub created_at: Ms,
}

impl Customer {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Facility {
    pub id: Ulid,
    pub name: String,
    pub description: Option<String>,
    pub address: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    /// Participant limit, not concurrency — a facility hosts one booking at a time.
    pub max_capacity: u32,
    /// Minor currency units (öre) per started day.
    pub price_per_day: i64,
    pub is_active: bool,
    pub created_at: Ms,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Ulid,
    pub customer_id: Ulid,
    pub facility_id: Ulid,
    pub range: DateRange,
    pub participants: u32,
    pub notes: Option<String>,
    pub status: BookingStatus,
    pub total_price: i64,
    pub created_at: Ms,
    pub confirmed_at: Option<Ms>,
    pub cancelled_at: Option<Ms>,
    pub cancel_reason: Option<String>,
    pub contract_id: Option<Ulid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingContract {
    pub id: Ulid,
    pub booking_id: Ulid,
    pub contract_number: String,
    pub version: u32,
    pub status: ContractStatus,
    pub terms: String,
    pub total_amount: i64,
    pub currency: String,
    pub payment_due: Option<Ms>,
    /// Denormalized at creation so the contract stays readable on its own.
    pub customer_name: String,
    pub customer_email: String,
    pub facility_name: String,
    pub document_name: Option<String>,
    pub created_at: Ms,
    pub updated_at: Ms,
    pub signed_at: Option<Ms>,
    pub cancelled_at: Option<Ms>,
    pub cancel_reason: Option<String>,
}

/// A facility document plus its booking calendar.
#[derive(Debug, Clone)]
pub struct FacilityState {
    pub facility: Facility,
    /// All bookings for this facility, sorted by `range.start`.
    pub bookings: Vec<Booking>,
}

impl FacilityState {
    pub fn new(facility: Facility) -> Self {
        Self {
            facility,
            bookings: Vec::new(),
        }
    }

    /// Insert booking maintaining sort order by range.start.
    pub fn insert_booking(&mut self, booking: Booking) {
        let pos = self
            .bookings
            .binary_search_by_key(&booking.range.start, |b| b.range.start)
            .unwrap_or_else(|e| e);
        self.bookings.insert(pos, booking);
    }

    /// Remove booking by id.
    pub fn remove_booking(&mut self, id: Ulid) -> Option<Booking> {
        if let Some(pos) = self.bookings.iter().position(|b| b.id == id) {
            Some(self.bookings.remove(pos))
        } else {
            None
        }
    }

    /// Replace a booking, restoring sort order (the range may have moved).
    pub fn upsert_booking(&mut self, booking: Booking) {
        self.remove_booking(booking.id);
        self.insert_booking(booking);
    }

    pub fn get_booking(&self, id: Ulid) -> Option<&Booking> {
        self.bookings.iter().find(|b| b.id == id)
    }

    /// Return only bookings whose range overlaps the query window.
    /// Uses binary search to skip bookings starting at or after `query.end`.
    pub fn overlapping(&self, query: &DateRange) -> impl Iterator<Item = &Booking> {
        let right_bound = self
            .bookings
            .partition_point(|b| b.range.start < query.end);
        self.bookings[..right_bound]
            .iter()
            .filter(move |b| b.range.end > query.start)
    }
}

/// The event types — flat, no nesting. This is the WAL record format.
/// Bookings and contracts are never hard-deleted; cancellation is a Put.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    CustomerPut(Customer),
    CustomerDeleted { id: Ulid },
    FacilityPut(Facility),
    FacilityDeleted { id: Ulid },
    BookingPut(Booking),
    ContractPut(BookingContract),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn booking(start: Ms, end: Ms) -> Booking {
        Booking {
            id: Ulid::new(),
            customer_id: Ulid::new(),
            facility_id: Ulid::new(),
            range: DateRange::new(start, end),
            participants: 1,
            notes: None,
            status: BookingStatus::Pending,
            total_price: 0,
            created_at: 0,
            confirmed_at: None,
            cancelled_at: None,
            cancel_reason: None,
            contract_id: None,
        }
    }

    fn facility() -> Facility {
        Facility {
            id: Ulid::new(),
            name: "Stora salen".into(),
            description: None,
            address: None,
            postal_code: None,
            city: None,
            max_capacity: 50,
            price_per_day: 100_000,
            is_active: true,
            created_at: 0,
        }
    }

    #[test]
    fn range_basics() {
        let r = DateRange::new(100, 200);
        assert_eq!(r.duration_ms(), 100);
        assert!(r.overlaps(&DateRange::new(150, 250)));
        assert!(!r.overlaps(&DateRange::new(200, 300))); // adjacent, half-open
    }

    #[test]
    fn billable_days_round_up() {
        assert_eq!(DateRange::new(0, DAY_MS).days(), 1);
        assert_eq!(DateRange::new(0, DAY_MS + 1).days(), 2);
        assert_eq!(DateRange::new(0, 3 * DAY_MS).days(), 3);
        // Sub-day bookings still bill one day
        assert_eq!(DateRange::new(0, 1000).days(), 1);
    }

    #[test]
    fn booking_ordering() {
        let mut fs = FacilityState::new(facility());
        fs.insert_booking(booking(300, 400));
        fs.insert_booking(booking(100, 200));
        fs.insert_booking(booking(200, 300));
        assert_eq!(fs.bookings[0].range.start, 100);
        assert_eq!(fs.bookings[1].range.start, 200);
        assert_eq!(fs.bookings[2].range.start, 300);
    }

    #[test]
    fn booking_remove() {
        let mut fs = FacilityState::new(facility());
        let b = booking(100, 200);
        let id = b.id;
        fs.insert_booking(b);
        assert_eq!(fs.bookings.len(), 1);
        fs.remove_booking(id);
        assert!(fs.bookings.is_empty());
        assert!(fs.remove_booking(id).is_none());
    }

    #[test]
    fn upsert_reorders_moved_booking() {
        let mut fs = FacilityState::new(facility());
        let mut b = booking(100, 200);
        let other = booking(300, 400);
        fs.insert_booking(b.clone());
        fs.insert_booking(other);
        b.range = DateRange::new(500, 600);
        fs.upsert_booking(b.clone());
        assert_eq!(fs.bookings.len(), 2);
        assert_eq!(fs.bookings[1].id, b.id);
        assert_eq!(fs.bookings[1].range.start, 500);
    }

    #[test]
    fn overlapping_skips_past_and_future() {
        let mut fs = FacilityState::new(facility());
        fs.insert_booking(booking(100, 200));
        fs.insert_booking(booking(450, 600));
        fs.insert_booking(booking(1000, 1100));

        let query = DateRange::new(500, 800);
        let hits: Vec<_> = fs.overlapping(&query).collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].range, DateRange::new(450, 600));
    }

    #[test]
    fn overlapping_adjacent_not_included() {
        let mut fs = FacilityState::new(facility());
        fs.insert_booking(booking(100, 200));
        let query = DateRange::new(200, 300);
        assert!(fs.overlapping(&query).next().is_none());
    }

    #[test]
    fn full_name_trims_missing_parts() {
        let c = Customer {
            id: Ulid::new(),
            first_name: "Anna".into(),
            last_name: "".into(),
            email: "anna@example.se".into(),
            phone: None,
            company_name: None,
            address: None,
            postal_code: None,
            city: None,
            created_at: 0,
        };
        assert_eq!(c.full_name(), "Anna");
    }

    #[test]
    fn status_activity() {
        assert!(BookingStatus::Pending.is_active());
        assert!(BookingStatus::Confirmed.is_active());
        assert!(!BookingStatus::Cancelled.is_active());
        assert!(ContractStatus::Signed.is_terminal());
        assert!(!ContractStatus::Sent.is_terminal());
    }

    #[test]
    fn event_serialization_roundtrip() {
        let event = Event::FacilityPut(facility());
        let bytes = bincode::serialize(&event).unwrap();
        let decoded: Event = bincode::deserialize(&bytes).unwrap();
        assert_eq!(event, decoded);
    }
}
