use ulid::Ulid;

use crate::model::*;

use super::ServiceError;

pub(crate) fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as Ms
}

/// Validate raw start/end into a DateRange.
pub(crate) fn validate_range(start: Ms, end: Ms) -> Result<DateRange, ServiceError> {
    use crate::limits::*;
    if start >= end {
        return Err(ServiceError::Invalid("start date must be before end date"));
    }
    if start < MIN_VALID_TIMESTAMP_MS || end > MAX_VALID_TIMESTAMP_MS {
        return Err(ServiceError::LimitExceeded("timestamp out of range"));
    }
    let range = DateRange::new(start, end);
    if range.duration_ms() > MAX_RANGE_DURATION_MS {
        return Err(ServiceError::LimitExceeded("booking range too wide"));
    }
    Ok(range)
}

/// Reject `range` if any active booking on the facility overlaps it.
/// `exclude` skips the booking being rescheduled.
pub(crate) fn check_no_conflict(
    state: &FacilityState,
    range: &DateRange,
    exclude: Option<Ulid>,
) -> Result<(), ServiceError> {
    for booking in state.overlapping(range) {
        if !booking.status.is_active() {
            continue;
        }
        if exclude == Some(booking.id) {
            continue;
        }
        return Err(ServiceError::Conflict(booking.id));
    }
    Ok(())
}

/// Free sub-ranges of `query` after subtracting active bookings.
pub(crate) fn free_ranges(state: &FacilityState, query: &DateRange) -> Vec<DateRange> {
    let mut occupied: Vec<DateRange> = state
        .overlapping(query)
        .filter(|b| b.status.is_active())
        .map(|b| {
            DateRange::new(
                b.range.start.max(query.start),
                b.range.end.min(query.end),
            )
        })
        .collect();
    occupied.sort_by_key(|r| r.start);
    let occupied = merge_overlapping(&occupied);
    subtract_intervals(&[*query], &occupied)
}

/// Merge sorted overlapping/adjacent intervals into disjoint intervals.
pub fn merge_overlapping(sorted: &[DateRange]) -> Vec<DateRange> {
    let mut merged: Vec<DateRange> = Vec::new();
    for &range in sorted {
        if let Some(last) = merged.last_mut()
            && range.start <= last.end {
                last.end = last.end.max(range.end);
                continue;
            }
        merged.push(range);
    }
    merged
}

pub fn subtract_intervals(base: &[DateRange], to_remove: &[DateRange]) -> Vec<DateRange> {
    let mut result = Vec::new();
    let mut ri = 0;

    for &b in base {
        let mut current_start = b.start;
        let current_end = b.end;

        while ri < to_remove.len() && to_remove[ri].end <= current_start {
            ri += 1;
        }

        let mut j = ri;
        while j < to_remove.len() && to_remove[j].start < current_end {
            let r = &to_remove[j];
            if r.start > current_start {
                result.push(DateRange::new(current_start, r.start));
            }
            current_start = current_start.max(r.end);
            j += 1;
        }

        if current_start < current_end {
            result.push(DateRange::new(current_start, current_end));
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::{DAY_MS, MIN_VALID_TIMESTAMP_MS};

    fn facility() -> Facility {
        Facility {
            id: Ulid::new(),
            name: "Utsikten".into(),
            description: None,
            address: None,
            postal_code: None,
            city: None,
            max_capacity: 12,
            price_per_day: 80_000,
            is_active: true,
            created_at: 0,
        }
    }

    fn booking(start: Ms, end: Ms, status: BookingStatus) -> Booking {
        Booking {
            id: Ulid::new(),
            customer_id: Ulid::new(),
            facility_id: Ulid::new(),
            range: DateRange::new(start, end),
            participants: 1,
            notes: None,
            status,
            total_price: 0,
            created_at: 0,
            confirmed_at: None,
            cancelled_at: None,
            cancel_reason: None,
            contract_id: None,
        }
    }

    fn state(bookings: Vec<Booking>) -> FacilityState {
        let mut fs = FacilityState::new(facility());
        for b in bookings {
            fs.insert_booking(b);
        }
        fs
    }

    // ── validate_range ────────────────────────────────────

    #[test]
    fn validate_range_rejects_inverted() {
        let t = MIN_VALID_TIMESTAMP_MS + DAY_MS;
        assert!(matches!(
            validate_range(t, t),
            Err(ServiceError::Invalid(_))
        ));
        assert!(matches!(
            validate_range(t + 1, t),
            Err(ServiceError::Invalid(_))
        ));
    }

    #[test]
    fn validate_range_rejects_out_of_bounds() {
        assert!(matches!(
            validate_range(100, 200),
            Err(ServiceError::LimitExceeded(_))
        ));
    }

    #[test]
    fn validate_range_rejects_too_wide() {
        let t = MIN_VALID_TIMESTAMP_MS;
        assert!(matches!(
            validate_range(t, t + 400 * DAY_MS),
            Err(ServiceError::LimitExceeded(_))
        ));
    }

    // ── check_no_conflict ─────────────────────────────────

    #[test]
    fn conflict_with_pending_booking() {
        let b = booking(1000, 2000, BookingStatus::Pending);
        let id = b.id;
        let fs = state(vec![b]);
        let result = check_no_conflict(&fs, &DateRange::new(1500, 2500), None);
        assert!(matches!(result, Err(ServiceError::Conflict(cid)) if cid == id));
    }

    #[test]
    fn cancelled_booking_does_not_conflict() {
        let fs = state(vec![booking(1000, 2000, BookingStatus::Cancelled)]);
        assert!(check_no_conflict(&fs, &DateRange::new(1500, 2500), None).is_ok());
    }

    #[test]
    fn adjacent_booking_does_not_conflict() {
        let fs = state(vec![booking(1000, 2000, BookingStatus::Confirmed)]);
        assert!(check_no_conflict(&fs, &DateRange::new(2000, 3000), None).is_ok());
    }

    #[test]
    fn exclude_skips_own_booking() {
        let b = booking(1000, 2000, BookingStatus::Confirmed);
        let id = b.id;
        let fs = state(vec![b]);
        assert!(check_no_conflict(&fs, &DateRange::new(1500, 2500), Some(id)).is_ok());
        assert!(check_no_conflict(&fs, &DateRange::new(1500, 2500), Some(Ulid::new())).is_err());
    }

    // ── subtract_intervals ────────────────────────────────

    #[test]
    fn subtract_no_overlap() {
        let base = vec![DateRange::new(100, 200), DateRange::new(300, 400)];
        let remove = vec![DateRange::new(200, 300)];
        let result = subtract_intervals(&base, &remove);
        assert_eq!(result, base);
    }

    #[test]
    fn subtract_full_overlap() {
        let base = vec![DateRange::new(100, 200)];
        let remove = vec![DateRange::new(50, 250)];
        let result = subtract_intervals(&base, &remove);
        assert!(result.is_empty());
    }

    #[test]
    fn subtract_middle_punch() {
        let base = vec![DateRange::new(100, 300)];
        let remove = vec![DateRange::new(150, 200)];
        let result = subtract_intervals(&base, &remove);
        assert_eq!(result, vec![DateRange::new(100, 150), DateRange::new(200, 300)]);
    }

    #[test]
    fn subtract_multiple_punches() {
        let base = vec![DateRange::new(0, 1000)];
        let remove = vec![
            DateRange::new(100, 200),
            DateRange::new(400, 500),
            DateRange::new(800, 900),
        ];
        let result = subtract_intervals(&base, &remove);
        assert_eq!(
            result,
            vec![
                DateRange::new(0, 100),
                DateRange::new(200, 400),
                DateRange::new(500, 800),
                DateRange::new(900, 1000),
            ]
        );
    }

    // ── merge_overlapping ────────────────────────────────

    #[test]
    fn merge_overlapping_basic() {
        let ranges = vec![
            DateRange::new(100, 300),
            DateRange::new(200, 400),
            DateRange::new(500, 600),
        ];
        let merged = merge_overlapping(&ranges);
        assert_eq!(merged, vec![DateRange::new(100, 400), DateRange::new(500, 600)]);
    }

    #[test]
    fn merge_overlapping_adjacent() {
        let ranges = vec![DateRange::new(100, 200), DateRange::new(200, 300)];
        let merged = merge_overlapping(&ranges);
        assert_eq!(merged, vec![DateRange::new(100, 300)]);
    }

    // ── free_ranges ──────────────────────────────────────

    #[test]
    fn free_ranges_basic() {
        let fs = state(vec![
            booking(1000, 2000, BookingStatus::Confirmed),
            booking(3000, 4000, BookingStatus::Pending),
        ]);
        let free = free_ranges(&fs, &DateRange::new(0, 5000));
        assert_eq!(
            free,
            vec![
                DateRange::new(0, 1000),
                DateRange::new(2000, 3000),
                DateRange::new(4000, 5000),
            ]
        );
    }

    #[test]
    fn free_ranges_ignores_cancelled() {
        let fs = state(vec![booking(1000, 2000, BookingStatus::Cancelled)]);
        let free = free_ranges(&fs, &DateRange::new(0, 3000));
        assert_eq!(free, vec![DateRange::new(0, 3000)]);
    }

    #[test]
    fn free_ranges_clamps_to_query() {
        // Booking starts before and ends after the query window
        let fs = state(vec![booking(0, 10_000, BookingStatus::Confirmed)]);
        let free = free_ranges(&fs, &DateRange::new(500, 600));
        assert!(free.is_empty());
    }

    #[test]
    fn free_ranges_fully_free() {
        let fs = state(vec![]);
        let free = free_ranges(&fs, &DateRange::new(0, 1000));
        assert_eq!(free, vec![DateRange::new(0, 1000)]);
    }

    #[test]
    fn free_ranges_merges_back_to_back_bookings() {
        let fs = state(vec![
            booking(1000, 2000, BookingStatus::Confirmed),
            booking(2000, 3000, BookingStatus::Confirmed),
        ]);
        let free = free_ranges(&fs, &DateRange::new(0, 4000));
        assert_eq!(free, vec![DateRange::new(0, 1000), DateRange::new(3000, 4000)]);
    }
}
