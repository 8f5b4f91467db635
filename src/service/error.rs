use ulid::Ulid;

#[derive(Debug)]
pub enum ServiceError {
    NotFound(Ulid),
    AlreadyExists(Ulid),
    EmailTaken(String),
    /// Overlapping active booking on the same facility.
    Conflict(Ulid),
    HasBookings(Ulid),
    HasActiveBookings(Ulid),
    FacilityInactive(Ulid),
    OverCapacity { requested: u32, max: u32 },
    InvalidTransition {
        entity: &'static str,
        from: &'static str,
        action: &'static str,
    },
    /// Contract operations that require a confirmed booking.
    BookingNotConfirmed(Ulid),
    Invalid(&'static str),
    LimitExceeded(&'static str),
    WalError(String),
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceError::NotFound(id) => write!(f, "not found: {id}"),
            ServiceError::AlreadyExists(id) => write!(f, "already exists: {id}"),
            ServiceError::EmailTaken(email) => {
                write!(f, "a customer with email {email} already exists")
            }
            ServiceError::Conflict(id) => {
                write!(f, "facility is unavailable: overlaps booking {id}")
            }
            ServiceError::HasBookings(id) => {
                write!(f, "cannot delete facility {id}: bookings reference it")
            }
            ServiceError::HasActiveBookings(id) => {
                write!(f, "cannot delete customer {id}: active bookings exist")
            }
            ServiceError::FacilityInactive(id) => {
                write!(f, "facility {id} is not open for booking")
            }
            ServiceError::OverCapacity { requested, max } => {
                write!(f, "{requested} participants exceed facility capacity {max}")
            }
            ServiceError::InvalidTransition { entity, from, action } => {
                write!(f, "cannot {action} a {from} {entity}")
            }
            ServiceError::BookingNotConfirmed(id) => {
                write!(f, "booking {id} must be confirmed first")
            }
            ServiceError::Invalid(msg) => write!(f, "invalid request: {msg}"),
            ServiceError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            ServiceError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for ServiceError {}
