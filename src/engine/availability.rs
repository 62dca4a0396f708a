use crate::model::*;

// ── Free-window algebra ───────────────────────────────────────────

/// Date sub-ranges of `window` during which the resource still has a free
/// slot: the window minus its (capacity-saturated) occupied spans.
///
/// Only occupying reservations count; cancelled/no-show/checked-out rows
/// are records, not occupancy.
pub fn free_windows(resource: &ResourceState, window: &Stay) -> Vec<Stay> {
    let mut occupied: Vec<Stay> = resource
        .overlapping(window)
        .filter(|r| r.status.is_occupying())
        .map(|r| {
            Stay::new(
                r.stay.check_in.max(window.check_in),
                r.stay.check_out.min(window.check_out),
            )
        })
        .collect();

    if occupied.is_empty() {
        return vec![*window];
    }
    occupied.sort_by_key(|s| s.check_in);

    let busy = if resource.capacity <= 1 {
        merge_overlapping(&occupied)
    } else {
        saturated_spans(&occupied, resource.capacity)
    };

    if busy.is_empty() {
        return vec![*window];
    }
    subtract_intervals(&[*window], &busy)
}

/// Merge sorted overlapping/adjacent stays into disjoint stays.
pub fn merge_overlapping(sorted: &[Stay]) -> Vec<Stay> {
    let mut merged: Vec<Stay> = Vec::new();
    for &stay in sorted {
        if let Some(last) = merged.last_mut()
            && stay.check_in <= last.check_out {
                last.check_out = last.check_out.max(stay.check_out);
                continue;
            }
        merged.push(stay);
    }
    merged
}

pub fn subtract_intervals(base: &[Stay], to_remove: &[Stay]) -> Vec<Stay> {
    let mut result = Vec::new();
    let mut ri = 0;

    for &b in base {
        let mut current_start = b.check_in;
        let current_end = b.check_out;

        while ri < to_remove.len() && to_remove[ri].check_out <= current_start {
            ri += 1;
        }

        let mut j = ri;
        while j < to_remove.len() && to_remove[j].check_in < current_end {
            let r = &to_remove[j];
            if r.check_in > current_start {
                result.push(Stay::new(current_start, r.check_in));
            }
            current_start = current_start.max(r.check_out);
            j += 1;
        }

        if current_start < current_end {
            result.push(Stay::new(current_start, current_end));
        }
    }

    result
}

/// Sweep-line: date ranges where the occupant count reaches `capacity`.
/// Returns sorted, merged stays representing fully-saturated ranges.
pub fn saturated_spans(stays: &[Stay], capacity: u32) -> Vec<Stay> {
    if stays.is_empty() || capacity == 0 {
        return Vec::new();
    }
    if capacity == 1 {
        return merge_overlapping(stays);
    }

    // +1 at check-in, -1 at checkout
    let mut events: Vec<(chrono::NaiveDate, i32)> = Vec::with_capacity(stays.len() * 2);
    for s in stays {
        events.push((s.check_in, 1));
        events.push((s.check_out, -1));
    }
    events.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));

    let mut result = Vec::new();
    let mut count: u32 = 0;
    let mut saturated_start: Option<chrono::NaiveDate> = None;

    for (day, delta) in &events {
        if *delta > 0 {
            count += *delta as u32;
        } else {
            count -= (-*delta) as u32;
        }

        if count >= capacity && saturated_start.is_none() {
            saturated_start = Some(*day);
        } else if count < capacity
            && let Some(start) = saturated_start.take()
            && *day > start {
                result.push(Stay::new(start, *day));
            }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ulid::Ulid;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, day).unwrap()
    }

    fn stay(a: u32, b: u32) -> Stay {
        Stay::new(d(a), d(b))
    }

    fn make_resource(reservations: Vec<(Stay, ReservationStatus)>) -> ResourceState {
        make_resource_with_capacity(reservations, 1)
    }

    fn make_resource_with_capacity(
        reservations: Vec<(Stay, ReservationStatus)>,
        capacity: u32,
    ) -> ResourceState {
        let mut rs = ResourceState::new(Ulid::new(), ResourceType::Kennel, capacity, true);
        for (s, status) in reservations {
            rs.insert_reservation(Reservation {
                id: Ulid::new(),
                pet_id: Ulid::new(),
                customer_id: Ulid::new(),
                service_id: Ulid::new(),
                stay: s,
                status,
            });
        }
        rs
    }

    // ── subtract_intervals ────────────────────────────────

    #[test]
    fn subtract_no_overlap() {
        let base = vec![stay(1, 5), stay(10, 15)];
        let remove = vec![stay(5, 10)];
        let result = subtract_intervals(&base, &remove);
        assert_eq!(result, base);
    }

    #[test]
    fn subtract_full_overlap() {
        let base = vec![stay(5, 10)];
        let remove = vec![stay(1, 15)];
        let result = subtract_intervals(&base, &remove);
        assert!(result.is_empty());
    }

    #[test]
    fn subtract_partial_left() {
        let base = vec![stay(5, 15)];
        let remove = vec![stay(1, 10)];
        let result = subtract_intervals(&base, &remove);
        assert_eq!(result, vec![stay(10, 15)]);
    }

    #[test]
    fn subtract_partial_right() {
        let base = vec![stay(5, 15)];
        let remove = vec![stay(10, 20)];
        let result = subtract_intervals(&base, &remove);
        assert_eq!(result, vec![stay(5, 10)]);
    }

    #[test]
    fn subtract_middle_punch() {
        let base = vec![stay(1, 20)];
        let remove = vec![stay(8, 12)];
        let result = subtract_intervals(&base, &remove);
        assert_eq!(result, vec![stay(1, 8), stay(12, 20)]);
    }

    #[test]
    fn subtract_multiple_punches() {
        let base = vec![stay(1, 28)];
        let remove = vec![stay(3, 5), stay(10, 12), stay(20, 22)];
        let result = subtract_intervals(&base, &remove);
        assert_eq!(
            result,
            vec![stay(1, 3), stay(5, 10), stay(12, 20), stay(22, 28)]
        );
    }

    // ── merge_overlapping ────────────────────────────────

    #[test]
    fn merge_overlapping_basic() {
        let stays = vec![stay(1, 8), stay(5, 12), stay(15, 18)];
        let merged = merge_overlapping(&stays);
        assert_eq!(merged, vec![stay(1, 12), stay(15, 18)]);
    }

    #[test]
    fn merge_overlapping_adjacent() {
        let stays = vec![stay(1, 5), stay(5, 10)];
        let merged = merge_overlapping(&stays);
        assert_eq!(merged, vec![stay(1, 10)]);
    }

    // ── free_windows ──────────────────────────────────────

    #[test]
    fn free_windows_empty_resource_is_whole_window() {
        let rs = make_resource(vec![]);
        let window = stay(1, 28);
        assert_eq!(free_windows(&rs, &window), vec![window]);
    }

    #[test]
    fn free_windows_punches_out_bookings() {
        let rs = make_resource(vec![
            (stay(5, 8), ReservationStatus::Confirmed),
            (stay(12, 15), ReservationStatus::CheckedIn),
        ]);
        let window = stay(1, 28);
        assert_eq!(
            free_windows(&rs, &window),
            vec![stay(1, 5), stay(8, 12), stay(15, 28)]
        );
    }

    #[test]
    fn free_windows_ignores_non_occupying() {
        let rs = make_resource(vec![
            (stay(5, 8), ReservationStatus::Cancelled),
            (stay(12, 15), ReservationStatus::NoShow),
            (stay(20, 25), ReservationStatus::CheckedOut),
        ]);
        let window = stay(1, 28);
        assert_eq!(free_windows(&rs, &window), vec![window]);
    }

    #[test]
    fn free_windows_back_to_back_stays_leave_no_gap() {
        let rs = make_resource(vec![
            (stay(5, 10), ReservationStatus::Confirmed),
            (stay(10, 15), ReservationStatus::Confirmed),
        ]);
        let window = stay(1, 28);
        assert_eq!(free_windows(&rs, &window), vec![stay(1, 5), stay(15, 28)]);
    }

    #[test]
    fn free_windows_clamps_to_window() {
        let rs = make_resource(vec![(stay(1, 20), ReservationStatus::Confirmed)]);
        let window = stay(10, 28);
        assert_eq!(free_windows(&rs, &window), vec![stay(20, 28)]);
    }

    #[test]
    fn free_windows_capacity_two_needs_two_overlaps() {
        let rs = make_resource_with_capacity(
            vec![
                (stay(5, 15), ReservationStatus::Confirmed),
                (stay(10, 20), ReservationStatus::Confirmed),
            ],
            2,
        );
        let window = stay(1, 28);
        // Only [10, 15) has both occupants at once.
        assert_eq!(
            free_windows(&rs, &window),
            vec![stay(1, 10), stay(15, 28)]
        );
    }

    // ── saturated_spans ───────────────────────────────────

    #[test]
    fn saturated_spans_basic() {
        let stays = vec![stay(1, 10), stay(5, 15)];
        let sat = saturated_spans(&stays, 2);
        assert_eq!(sat, vec![stay(5, 10)]);
    }

    #[test]
    fn saturated_spans_no_overlap() {
        let stays = vec![stay(1, 10), stay(15, 20)];
        let sat = saturated_spans(&stays, 2);
        assert!(sat.is_empty());
    }

    #[test]
    fn saturated_spans_capacity_one() {
        let stays = vec![stay(1, 10), stay(15, 20)];
        let sat = saturated_spans(&stays, 1);
        assert_eq!(sat, vec![stay(1, 10), stay(15, 20)]);
    }

    #[test]
    fn saturated_spans_three_overlap_capacity_three() {
        let stays = vec![stay(1, 20), stay(5, 12), stay(8, 25)];
        let sat = saturated_spans(&stays, 3);
        assert_eq!(sat, vec![stay(8, 12)]);
    }

    #[test]
    fn saturated_spans_empty() {
        let sat = saturated_spans(&[], 5);
        assert!(sat.is_empty());
    }
}
