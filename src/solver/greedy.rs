//! Phase 1: round-robin greedy placement.
//!
//! Each assignment walks the week from its rotating day cursor, one candidate
//! day per attempt, and takes the first period free for both classroom and
//! teacher. A second lesson of the same (classroom, subject) on one day is
//! allowed only through the threshold override, an exempt teacher or the
//! per-triple double budget.

use log::debug;

use crate::data::{Assignment, AssignmentKey, DAYS, Day, PERIODS, Period, Slot, TeacherId};
use crate::rules::Policy;

use super::{Budget, DayCursors, WorkingGrid};

/// Attempt ceiling per assignment.
pub const MAX_ATTEMPTS: usize = 300;

pub fn place_round_robin(
    ordered: &[Assignment],
    policy: &Policy,
    grid: &mut WorkingGrid,
    cursors: &mut DayCursors,
) {
    let mut double_budget: Budget<AssignmentKey> = Budget::new(policy.teacher_double_budget);
    let adjacency_budget: Budget<TeacherId> = Budget::new(policy.teacher_adjacency_budget);

    for a in ordered {
        if a.weekly_count == 0 {
            continue;
        }
        let key = a.key();
        let start = cursors.get(&key) % DAYS.len();
        let via_threshold = policy.allows_unlimited_repeats(a.weekly_count);
        let exempt = policy.is_exempt_teacher(&a.teacher_full_name);

        let mut remaining = a.weekly_count;
        let mut placed = 0;
        let mut attempts = 0;
        while remaining > 0 && attempts < MAX_ATTEMPTS {
            let day = DAYS[(start + attempts) % DAYS.len()];
            attempts += 1;

            let repeat = grid
                .occupancy()
                .same_day_count(a.classroom_id, a.subject_id, day)
                > 0;
            let via_budget = repeat && !via_threshold && !exempt;
            if via_budget && !double_budget.has_remaining(&key) {
                continue;
            }

            let prefer_adjacent = repeat && adjacency_budget.has_remaining(&a.teacher_id);
            let Some(period) = choose_period(grid, a, day, prefer_adjacent) else {
                continue;
            };

            grid.place(a, Slot::new(day, period));
            if via_budget {
                double_budget.consume(key);
            }
            placed += 1;
            remaining -= 1;
        }

        if remaining > 0 {
            debug!(
                "Greedy phase left {} of {} lessons unplaced for classroom {} subject {} teacher {}",
                remaining, a.weekly_count, a.classroom_id, a.subject_id, a.teacher_id
            );
        }
        cursors.set(key, start + placed);
    }
}

/// Picks a period on `day`: next to an existing same-day lesson when
/// `prefer_adjacent`, otherwise the first period free for both parties.
fn choose_period(
    grid: &WorkingGrid,
    a: &Assignment,
    day: Day,
    prefer_adjacent: bool,
) -> Option<Period> {
    let free = |p: Period| grid.can_place(a, Slot::new(day, p));

    if prefer_adjacent {
        let existing = grid
            .occupancy()
            .same_day_periods(a.classroom_id, a.subject_id, day);
        let adjacent = existing
            .iter()
            .flat_map(|&p| [p.checked_sub(1), p.checked_add(1)])
            .flatten()
            .filter(|p| PERIODS.contains(p))
            .find(|&p| free(p));
        if adjacent.is_some() {
            return adjacent;
        }
    }

    PERIODS.into_iter().find(|&p| free(p))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::tests::{assert_no_double_booking, assignment};
    use std::collections::HashSet;

    fn run(assignments: &[Assignment], policy: &Policy, grid: &mut WorkingGrid) {
        let mut cursors = DayCursors::default();
        place_round_robin(assignments, policy, grid, &mut cursors);
    }

    /// Fills every slot of `days` for `classroom` with filler lessons.
    fn block_days(grid: &mut WorkingGrid, classroom: i64, days: &[Day]) {
        let filler = assignment(900 + classroom, classroom, 900, 0);
        for &day in days {
            for period in PERIODS {
                grid.place(&filler, Slot::new(day, period));
            }
        }
    }

    fn entries_for(grid: &WorkingGrid, subject: i64) -> Vec<Slot> {
        grid.entries()
            .iter()
            .filter(|e| e.subject_id == subject)
            .map(|e| e.slot())
            .collect()
    }

    fn entries_of(grid: &WorkingGrid, teacher: i64) -> Vec<Slot> {
        grid.entries()
            .iter()
            .filter(|e| e.teacher_id == teacher)
            .map(|e| e.slot())
            .collect()
    }

    #[test]
    fn test_round_robin_uses_distinct_days_and_first_period() {
        let mut grid = WorkingGrid::new(1);
        run(&[assignment(1, 1, 1, 3)], &Policy::default(), &mut grid);

        let slots = entries_for(&grid, 1);
        assert_eq!(
            slots,
            vec![Slot::new(1, 1), Slot::new(2, 1), Slot::new(3, 1)]
        );
    }

    #[test]
    fn test_threshold_override_stacks_on_single_available_day() {
        let policy = Policy::default();
        let mut grid = WorkingGrid::new(1);
        block_days(&mut grid, 1, &[2, 3, 4, 5]);
        run(&[assignment(1, 1, 1, policy.multi_per_day_threshold + 1)], &policy, &mut grid);

        let slots = entries_for(&grid, 1);
        assert_eq!(slots.len(), 6);
        assert!(slots.iter().all(|s| s.day == 1));
        assert_no_double_booking(grid.entries());
    }

    #[test]
    fn test_under_threshold_repeat_limited_by_double_budget() {
        let policy = Policy::default();
        let mut grid = WorkingGrid::new(1);
        block_days(&mut grid, 1, &[2, 3, 4, 5]);
        run(&[assignment(1, 1, 1, 4)], &policy, &mut grid);

        // One lesson plus a single budgeted double.
        assert_eq!(entries_for(&grid, 1).len(), 2);
    }

    #[test]
    fn test_exempt_teacher_repeats_without_budget() {
        let policy = Policy {
            exempt_teacher_tokens: vec!["teacher 1".into()],
            ..Policy::default()
        };
        let mut grid = WorkingGrid::new(1);
        block_days(&mut grid, 1, &[2, 3, 4, 5]);
        run(&[assignment(1, 1, 1, 4)], &policy, &mut grid);

        assert_eq!(entries_for(&grid, 1).len(), 4);
    }

    #[test]
    fn test_repeat_prefers_period_next_to_existing_lesson() {
        let policy = Policy::default();
        let mut grid = WorkingGrid::new(1);
        block_days(&mut grid, 1, &[2, 3, 4, 5]);
        // Another teacher already gives this classroom the subject at period 5.
        grid.place(&assignment(70, 1, 1, 0), Slot::new(1, 5));
        run(&[assignment(1, 1, 1, 2)], &policy, &mut grid);

        // The budgeted repeat goes next to period 5 rather than to period 1,
        // and the budget is then spent, so the second lesson stays unplaced.
        assert_eq!(entries_of(&grid, 1), vec![Slot::new(1, 4)]);
    }

    #[test]
    fn test_repeat_without_adjacency_budget_takes_first_free_period() {
        let policy = Policy {
            teacher_adjacency_budget: 0,
            ..Policy::default()
        };
        let mut grid = WorkingGrid::new(1);
        block_days(&mut grid, 1, &[2, 3, 4, 5]);
        grid.place(&assignment(70, 1, 1, 0), Slot::new(1, 5));
        run(&[assignment(1, 1, 1, 2)], &policy, &mut grid);

        assert_eq!(entries_of(&grid, 1), vec![Slot::new(1, 1)]);
    }

    #[test]
    fn test_adjacent_candidates_fall_back_when_taken() {
        let policy = Policy::default();
        let mut grid = WorkingGrid::new(1);
        block_days(&mut grid, 1, &[2, 3, 4, 5]);
        grid.place(&assignment(50, 1, 50, 0), Slot::new(1, 1));
        // The teacher is busy at period 3 in another classroom.
        grid.place(&assignment(1, 2, 60, 0), Slot::new(1, 3));
        run(&[assignment(1, 1, 1, 2)], &policy, &mut grid);

        assert_eq!(entries_for(&grid, 1), vec![Slot::new(1, 2), Slot::new(1, 4)]);
    }

    #[test]
    fn test_zero_weekly_count_is_skipped() {
        let mut grid = WorkingGrid::new(1);
        run(&[assignment(1, 1, 1, 0)], &Policy::default(), &mut grid);
        assert!(grid.entries().is_empty());
    }

    #[test]
    fn test_teacher_conflicts_are_respected() {
        let mut grid = WorkingGrid::new(1);
        run(
            &[assignment(1, 1, 1, 5), assignment(1, 2, 2, 5)],
            &Policy::default(),
            &mut grid,
        );
        assert_eq!(grid.entries().len(), 10);
        assert_no_double_booking(grid.entries());
        let days: HashSet<_> = entries_for(&grid, 2).iter().map(|s| s.day).collect();
        assert_eq!(days.len(), 5);
    }
}
