use chrono::{DateTime, Utc};

use super::event::{AuditEvent, StatusDuration};
use crate::domain::order::{is_backward_move, OrderStatus};

// ============================================================================
// Audit Queries - read-side derivations over one order's history
// ============================================================================
//
// All functions take the events of a single order. Per-order volumes are
// small, so each query is a linear scan over the ordered history.
//
// ============================================================================

/// Sort events ascending by `changed_at`, ties broken by sequence number.
pub fn sort_history(events: &mut [AuditEvent]) {
    events.sort_by(|a, b| {
        a.changed_at
            .cmp(&b.changed_at)
            .then(a.sequence_number.cmp(&b.sequence_number))
    });
}

/// True when every event links to its predecessor.
pub fn is_consistent_chain(history: &[AuditEvent]) -> bool {
    let mut previous: Option<&AuditEvent> = None;
    for event in history {
        if !event.follows(previous) {
            return false;
        }
        previous = Some(event);
    }
    true
}

pub fn backward_transitions(history: &[AuditEvent]) -> Vec<AuditEvent> {
    history
        .iter()
        .filter(|event| match event.previous_status {
            Some(previous) => is_backward_move(previous, event.new_status),
            None => false,
        })
        .cloned()
        .collect()
}

pub fn first_time_reached(history: &[AuditEvent], status: OrderStatus) -> Option<DateTime<Utc>> {
    history
        .iter()
        .filter(|event| event.new_status == status)
        .map(|event| event.changed_at)
        .min()
}

/// Time between the first entry into `status` and the first exit after it.
///
/// Only the first visit counts; an order that re-enters `status` later does
/// not extend the result.
pub fn duration_in_status(history: &[AuditEvent], status: OrderStatus) -> StatusDuration {
    let Some(entry_index) = history.iter().position(|event| event.new_status == status) else {
        return StatusDuration::NeverEntered;
    };
    let entered_at = history[entry_index].changed_at;

    history[entry_index + 1..]
        .iter()
        .find(|event| event.previous_status == Some(status))
        .map(|exit| StatusDuration::Elapsed(exit.changed_at - entered_at))
        .unwrap_or(StatusDuration::NeverExited)
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use uuid::Uuid;

    use crate::domain::order::OrderStatus::*;

    fn at(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    /// Build a consistent history from `(status, minute)` steps, starting
    /// with a creation event at minute 0.
    fn history(order_id: Uuid, steps: &[(OrderStatus, i64)]) -> Vec<AuditEvent> {
        let mut events = vec![AuditEvent::new(order_id, 1, None, Pending, None, at(0))];
        for (status, minute) in steps {
            let last = events.last().unwrap();
            let next = AuditEvent::new(
                order_id,
                last.sequence_number + 1,
                Some(last.new_status),
                *status,
                None,
                at(*minute),
            );
            events.push(next);
        }
        events
    }

    #[test]
    fn test_sort_history_orders_by_time_then_sequence() {
        let order_id = Uuid::new_v4();
        let mut events = history(order_id, &[(Confirmed, 0), (Preparing, 5)]);
        events.reverse();

        sort_history(&mut events);

        let sequence: Vec<_> = events.iter().map(|e| e.sequence_number).collect();
        assert_eq!(sequence, vec![1, 2, 3]);
        assert!(is_consistent_chain(&events));
    }

    #[test]
    fn test_inconsistent_chain_detected() {
        let order_id = Uuid::new_v4();
        let mut events = history(order_id, &[(Confirmed, 1)]);
        events.push(AuditEvent::new(order_id, 3, Some(Ready), Completed, None, at(2)));

        assert!(!is_consistent_chain(&events));
    }

    #[test]
    fn test_backward_transitions_detected() {
        let order_id = Uuid::new_v4();
        let events = history(
            order_id,
            &[(Confirmed, 1), (Preparing, 2), (Confirmed, 3), (Cancelled, 4)],
        );

        let backward = backward_transitions(&events);
        assert_eq!(backward.len(), 1);
        assert_eq!(backward[0].previous_status, Some(Preparing));
        assert_eq!(backward[0].new_status, Confirmed);
    }

    #[test]
    fn test_first_time_reached() {
        let order_id = Uuid::new_v4();
        let events = history(
            order_id,
            &[(Confirmed, 1), (Preparing, 4), (Confirmed, 6), (Preparing, 9)],
        );

        assert_eq!(first_time_reached(&events, Preparing), Some(at(4)));
        assert_eq!(first_time_reached(&events, Pending), Some(at(0)));
        assert_eq!(first_time_reached(&events, Ready), None);
    }

    #[test]
    fn test_duration_in_status_first_visit_only() {
        let order_id = Uuid::new_v4();
        let events = history(
            order_id,
            &[(Confirmed, 1), (Preparing, 4), (Confirmed, 6), (Preparing, 9), (Ready, 30)],
        );

        assert_eq!(
            duration_in_status(&events, Preparing),
            StatusDuration::Elapsed(Duration::minutes(2))
        );
        assert_eq!(
            duration_in_status(&events, Confirmed),
            StatusDuration::Elapsed(Duration::minutes(3))
        );
    }

    #[test]
    fn test_duration_in_status_sentinels() {
        let order_id = Uuid::new_v4();
        let events = history(order_id, &[(Confirmed, 1), (Preparing, 4)]);

        assert_eq!(duration_in_status(&events, Preparing), StatusDuration::NeverExited);
        assert_eq!(duration_in_status(&events, Ready), StatusDuration::NeverEntered);
        assert_eq!(duration_in_status(&[], Pending), StatusDuration::NeverEntered);
    }
}
