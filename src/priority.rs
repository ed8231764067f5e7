//! Eisenhower-quadrant priority ordering.
//!
//! Pure comparators over [`Task`]; the store fetches candidate rows and
//! sorts in memory so the ordering logic stays testable without SQL.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use crate::traits::Task;

/// Quadrant rank, 1 = most pressing.
///
/// A confirmed axis dominates an unknown one: important-but-maybe-not-urgent
/// still schedules, urgent-but-maybe-not-important still delegates. Rank 4 is
/// reserved for fully untriaged tasks, which rank *above* anything with a
/// confirmed false axis: a task nobody has looked at yet should not sink
/// below one already judged ignorable on some axis.
pub fn quadrant_rank(urgent: Option<bool>, important: Option<bool>) -> u8 {
    match (urgent, important) {
        (Some(true), Some(true)) => 1,
        (_, Some(true)) => 2,
        (Some(true), _) => 3,
        (None, None) => 4,
        _ => 5,
    }
}

/// Human label for a rank.
pub fn quadrant_label(rank: u8) -> &'static str {
    match rank {
        1 => "Do Now",
        2 => "Schedule",
        3 => "Delegate",
        5 => "Drop",
        _ => "Unclassified",
    }
}

fn cmp_option_asc_nulls_last<T: Ord>(a: &Option<T>, b: &Option<T>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.cmp(y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn cmp_due(a: &Option<DateTime<Utc>>, b: &Option<DateTime<Utc>>) -> Ordering {
    cmp_option_asc_nulls_last(a, b)
}

/// Quadrant ordering: rank asc, then explicit priority asc (unset last),
/// then due date asc (unset last), then newest-created first.
pub fn quadrant_cmp(a: &Task, b: &Task) -> Ordering {
    quadrant_rank(a.urgent, a.important)
        .cmp(&quadrant_rank(b.urgent, b.important))
        .then_with(|| cmp_option_asc_nulls_last(&a.priority, &b.priority))
        .then_with(|| cmp_due(&a.due_date, &b.due_date))
        .then_with(|| b.created_at.cmp(&a.created_at))
}

/// Legacy ordering: ignores quadrants entirely.
pub fn plain_cmp(a: &Task, b: &Task) -> Ordering {
    cmp_option_asc_nulls_last(&a.priority, &b.priority)
        .then_with(|| cmp_due(&a.due_date, &b.due_date))
        .then_with(|| b.created_at.cmp(&a.created_at))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{TaskStatus, Task};
    use chrono::TimeZone;

    fn task(id: i64, urgent: Option<bool>, important: Option<bool>) -> Task {
        Task {
            id,
            title: format!("task {id}"),
            body: None,
            status: TaskStatus::Open,
            priority: None,
            priority_source: None,
            urgent,
            important,
            source: None,
            due_date: None,
            created_at: Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn rank_covers_all_quadrants() {
        assert_eq!(quadrant_rank(Some(true), Some(true)), 1);
        assert_eq!(quadrant_rank(Some(false), Some(true)), 2);
        assert_eq!(quadrant_rank(Some(true), Some(false)), 3);
        assert_eq!(quadrant_rank(None, None), 4);
        assert_eq!(quadrant_rank(Some(false), Some(false)), 5);
    }

    #[test]
    fn confirmed_axis_dominates_unknown() {
        // Important with urgency unknown still schedules.
        assert_eq!(quadrant_rank(None, Some(true)), 2);
        // Urgent with importance unknown still delegates.
        assert_eq!(quadrant_rank(Some(true), None), 3);
        // A confirmed false axis with the other unknown drops.
        assert_eq!(quadrant_rank(Some(false), None), 5);
        assert_eq!(quadrant_rank(None, Some(false)), 5);
    }

    #[test]
    fn unclassified_outranks_explicit_drop() {
        assert!(quadrant_rank(None, None) < quadrant_rank(Some(false), Some(false)));
    }

    #[test]
    fn half_triaged_schedule_sorts_above_delegate() {
        let mut tasks = vec![
            task(1, Some(true), Some(false)), // Delegate
            task(2, None, Some(true)),        // Schedule, urgency unknown
        ];
        tasks.sort_by(quadrant_cmp);
        assert_eq!(tasks[0].id, 2);
    }

    #[test]
    fn labels_match_ranks() {
        assert_eq!(quadrant_label(1), "Do Now");
        assert_eq!(quadrant_label(2), "Schedule");
        assert_eq!(quadrant_label(3), "Delegate");
        assert_eq!(quadrant_label(4), "Unclassified");
        assert_eq!(quadrant_label(5), "Drop");
    }

    #[test]
    fn quadrant_sort_orders_all_five_ranks() {
        let mut tasks = vec![
            task(1, Some(false), Some(false)), // Q5
            task(2, None, None),               // Q4
            task(3, Some(true), Some(false)),  // Q3
            task(4, Some(false), Some(true)),  // Q2
            task(5, Some(true), Some(true)),   // Q1
        ];
        tasks.sort_by(quadrant_cmp);
        let ids: Vec<i64> = tasks.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![5, 4, 3, 2, 1]);
    }

    #[test]
    fn explicit_priority_breaks_ties_with_unset_last() {
        let mut a = task(1, Some(true), Some(true));
        let mut b = task(2, Some(true), Some(true));
        let c = task(3, Some(true), Some(true));
        a.priority = Some(2);
        b.priority = Some(1);
        // c has no priority and sorts last.
        let mut tasks = vec![a, c, b];
        tasks.sort_by(quadrant_cmp);
        let ids: Vec<i64> = tasks.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![2, 1, 3]);
    }

    #[test]
    fn due_date_breaks_ties_with_unset_last() {
        let mut a = task(1, None, None);
        let mut b = task(2, None, None);
        let c = task(3, None, None);
        a.due_date = Some(Utc.with_ymd_and_hms(2025, 3, 2, 0, 0, 0).unwrap());
        b.due_date = Some(Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap());
        let mut tasks = vec![c.clone(), a, b];
        tasks.sort_by(quadrant_cmp);
        let ids: Vec<i64> = tasks.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![2, 1, 3]);
    }

    #[test]
    fn newest_created_wins_final_tie() {
        let mut a = task(1, None, None);
        let b = task(2, None, None);
        a.created_at = Utc.with_ymd_and_hms(2025, 2, 5, 0, 0, 0).unwrap();
        let mut tasks = vec![b, a];
        tasks.sort_by(quadrant_cmp);
        assert_eq!(tasks[0].id, 1);
    }

    #[test]
    fn plain_mode_ignores_quadrants() {
        let mut q5 = task(1, Some(false), Some(false));
        let q1 = task(2, Some(true), Some(true));
        q5.priority = Some(1);
        let mut tasks = vec![q1, q5];
        tasks.sort_by(plain_cmp);
        // Explicit priority wins even though task 1 is in the Drop quadrant.
        assert_eq!(tasks[0].id, 1);
    }
}
