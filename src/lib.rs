//! bokad — booking administration service for a conference centre.
//!
//! HTTP/JSON API over an in-memory document store with WAL durability.
//! Customers, facilities, bookings, and booking contracts; availability
//! checks reject overlapping bookings, contract lifecycle is guarded, and
//! booking confirmation/cancellation triggers transactional email.

pub mod blob;
pub mod compactor;
pub mod email;
pub mod http;
pub mod limits;
pub mod model;
pub mod observability;
pub mod service;
pub mod wal;
