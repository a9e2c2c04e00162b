//! Phase 2: backfill leftover lessons under relaxed same-day caps.

use log::debug;
use std::collections::HashMap;

use crate::data::{Assignment, AssignmentKey, DAYS, PERIODS, Period, Slot, TeacherId};
use crate::rules::Policy;

use super::{Budget, WorkingGrid, remaining_need};

pub fn backfill_relaxed(
    ordered: &[Assignment],
    expected: &HashMap<AssignmentKey, u32>,
    policy: &Policy,
    grid: &mut WorkingGrid,
) {
    let mut double_budget: Budget<TeacherId> = Budget::new(policy.teacher_global_double_budget);

    for a in ordered {
        let deficit = remaining_need(grid, expected, &a.key());
        if deficit == 0 {
            continue;
        }
        let relaxed = policy.is_exempt_teacher(&a.teacher_full_name)
            || policy.is_flexible_subject(&a.subject_name);
        let via_threshold = policy.allows_unlimited_repeats(a.weekly_count);
        let cap = policy.per_day_cap(relaxed);
        let late = policy.is_late_subject(&a.subject_name);

        debug!(
            "Backfilling {} lessons for classroom {} subject {} teacher {} (cap {}, relaxed {})",
            deficit, a.classroom_id, a.subject_id, a.teacher_id, cap, relaxed
        );

        for _ in 0..deficit {
            let mut placement = None;
            for day in DAYS {
                let existing = grid
                    .occupancy()
                    .same_day_periods(a.classroom_id, a.subject_id, day);
                let repeat = !existing.is_empty();
                let budgeted = repeat && !via_threshold && !relaxed;
                if repeat && !via_threshold {
                    if existing.len() >= cap {
                        continue;
                    }
                    if budgeted && !double_budget.has_remaining(&a.teacher_id) {
                        continue;
                    }
                }

                let slot = candidate_periods(existing, late)
                    .into_iter()
                    .map(|p| Slot::new(day, p))
                    .find(|&slot| grid.can_place(a, slot));
                if let Some(slot) = slot {
                    placement = Some((slot, budgeted));
                    break;
                }
            }

            // Nothing changed, so the remaining instances would fail the same way.
            let Some((slot, budgeted)) = placement else {
                break;
            };
            grid.place(a, slot);
            if budgeted {
                double_budget.consume(a.teacher_id);
            }
        }
    }
}

/// Periods to try on a day: neighbours of existing same-day lessons first,
/// then the rest in ascending order. Late subjects run from the last period
/// down instead.
fn candidate_periods(existing: &[Period], late: bool) -> Vec<Period> {
    if late {
        return PERIODS.into_iter().rev().collect();
    }
    let mut order: Vec<Period> = Vec::with_capacity(PERIODS.len());
    let adjacent = existing
        .iter()
        .flat_map(|&p| [p.checked_sub(1), p.checked_add(1)])
        .flatten()
        .filter(|p| PERIODS.contains(p));
    for p in adjacent.chain(PERIODS) {
        if !order.contains(&p) {
            order.push(p);
        }
    }
    order
}
