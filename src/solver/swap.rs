//! Phase 3: bounded local search that moves a blocking entry elsewhere to
//! make room for a lesson still short of its target.

use log::debug;
use std::collections::{BTreeMap, HashMap};

use crate::data::{Assignment, AssignmentKey, DAYS, PERIODS, Slot};

use super::{WorkingGrid, remaining_need};

/// Swap ceiling for the whole phase.
pub const MAX_SWAPS: u32 = 800;

/// Entry indices per slot, kept in step with relocations.
#[derive(Debug)]
struct SlotIndex {
    by_slot: BTreeMap<Slot, Vec<usize>>,
}

impl SlotIndex {
    fn build(grid: &WorkingGrid) -> Self {
        let mut by_slot: BTreeMap<Slot, Vec<usize>> = BTreeMap::new();
        for (i, e) in grid.entries().iter().enumerate() {
            by_slot.entry(e.slot()).or_default().push(i);
        }
        Self { by_slot }
    }

    fn at(&self, slot: Slot) -> &[usize] {
        self.by_slot
            .get(&slot)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn insert(&mut self, slot: Slot, index: usize) {
        self.by_slot.entry(slot).or_default().push(index);
    }

    fn relocate(&mut self, index: usize, from: Slot, to: Slot) {
        if let Some(indices) = self.by_slot.get_mut(&from) {
            indices.retain(|&i| i != index);
        }
        self.insert(to, index);
    }
}

/// Returns the number of swaps performed, at most [`MAX_SWAPS`].
pub fn resolve_with_swaps(
    ordered: &[Assignment],
    expected: &HashMap<AssignmentKey, u32>,
    grid: &mut WorkingGrid,
) -> u32 {
    resolve_with_swaps_bounded(ordered, expected, grid, MAX_SWAPS)
}

/// Like [`resolve_with_swaps`] with an explicit ceiling. Once `max_swaps`
/// swaps have been made the phase ends; later assignments get neither
/// direct placement nor swaps.
pub fn resolve_with_swaps_bounded(
    ordered: &[Assignment],
    expected: &HashMap<AssignmentKey, u32>,
    grid: &mut WorkingGrid,
    max_swaps: u32,
) -> u32 {
    let mut index = SlotIndex::build(grid);
    let mut swaps = 0;

    for a in ordered {
        if swaps >= max_swaps {
            break;
        }
        let need = remaining_need(grid, expected, &a.key());
        if need == 0 {
            continue;
        }
        debug!(
            "Resolving {} missing lessons for classroom {} subject {} teacher {}",
            need, a.classroom_id, a.subject_id, a.teacher_id
        );

        for _ in 0..need {
            if let Some(slot) = Slot::all().find(|&slot| grid.can_place(a, slot)) {
                grid.place(a, slot);
                index.insert(slot, grid.entries().len() - 1);
                continue;
            }
            if swaps >= max_swaps {
                break;
            }
            if !try_swap(a, grid, &mut index) {
                break;
            }
            swaps += 1;
        }
    }

    if swaps >= max_swaps {
        debug!("Swap budget of {max_swaps} exhausted.");
    }
    swaps
}

/// Looks for a slot where a single occupant blocks `a`, moves that occupant
/// to another free slot and places `a` in the vacated one.
fn try_swap(a: &Assignment, grid: &mut WorkingGrid, index: &mut SlotIndex) -> bool {
    let key = a.key();
    for slot in Slot::all() {
        let occupants = index.at(slot).to_vec();
        for i in occupants {
            let occupant = grid.entries()[i].clone();
            if occupant.key() == key {
                continue;
            }
            let shares_class = occupant.classroom_id == a.classroom_id;
            let shares_teacher = occupant.teacher_id == a.teacher_id;
            if !shares_class && !shares_teacher {
                continue;
            }
            // Moving this occupant must leave the slot free for `a`.
            let occ = grid.occupancy();
            if (!shares_class && !occ.is_class_free(a.classroom_id, slot))
                || (!shares_teacher && !occ.is_teacher_free(a.teacher_id, slot))
            {
                continue;
            }

            grid.occupancy
                .release(occupant.classroom_id, occupant.teacher_id, slot);
            let target = relocation_targets(slot).find(|&target| {
                grid.occupancy()
                    .is_free(occupant.classroom_id, occupant.teacher_id, target)
            });
            let Some(target) = target else {
                grid.occupancy
                    .occupy(occupant.classroom_id, occupant.teacher_id, slot);
                continue;
            };

            grid.relocate_released(i, target);
            index.relocate(i, slot, target);
            grid.place(a, slot);
            index.insert(slot, grid.entries().len() - 1);
            debug!(
                "Swapped classroom {} teacher {} from {} to {} to seat classroom {} teacher {}",
                occupant.classroom_id,
                occupant.teacher_id,
                slot,
                target,
                a.classroom_id,
                a.teacher_id
            );
            return true;
        }
    }
    false
}

/// Every slot except `from`, same day first, then the other days.
fn relocation_targets(from: Slot) -> impl Iterator<Item = Slot> {
    std::iter::once(from.day)
        .chain(DAYS.into_iter().filter(move |&d| d != from.day))
        .flat_map(|day| PERIODS.into_iter().map(move |p| Slot::new(day, p)))
        .filter(move |&s| s != from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::tests::{assert_no_double_booking, assignment};
    use crate::solver::{collect_deficits, expected_counts};

    fn resolve(assignments: &[Assignment], grid: &mut WorkingGrid) -> u32 {
        let expected = expected_counts(assignments);
        resolve_with_swaps(assignments, &expected, grid)
    }

    #[test]
    fn test_relocation_targets_skip_origin_and_start_same_day() {
        let targets: Vec<Slot> = relocation_targets(Slot::new(3, 2)).collect();
        assert_eq!(targets.len(), 34);
        assert_eq!(targets[0], Slot::new(3, 1));
        assert_eq!(targets[1], Slot::new(3, 3));
        assert_eq!(targets[6], Slot::new(1, 1));
        assert!(!targets.contains(&Slot::new(3, 2)));
    }

    #[test]
    fn test_direct_placement_needs_no_swap() {
        let mut grid = WorkingGrid::new(1);
        let swaps = resolve(&[assignment(1, 1, 1, 2)], &mut grid);
        assert_eq!(swaps, 0);
        assert_eq!(grid.entries().len(), 2);
    }

    #[test]
    fn test_swap_moves_blocker_and_both_reach_target() {
        // Classroom 1 is free only at (1, 1); teacher 1 is busy there with
        // classroom 2, which could equally sit at (1, 2).
        let mut grid = WorkingGrid::new(1);
        let filler = assignment(99, 1, 99, 0);
        for slot in Slot::all().filter(|&s| s != Slot::new(1, 1)) {
            grid.place(&filler, slot);
        }
        let blocker = assignment(1, 2, 2, 1);
        grid.place(&blocker, Slot::new(1, 1));

        let target = assignment(1, 1, 1, 1);
        let assignments = vec![target.clone(), blocker.clone()];
        let swaps = resolve(&assignments, &mut grid);

        assert_eq!(swaps, 1);
        assert_eq!(grid.placed(&target.key()), 1);
        assert_eq!(grid.placed(&blocker.key()), 1);
        let moved = grid
            .entries()
            .iter()
            .find(|e| e.key() == blocker.key())
            .unwrap();
        assert_eq!(moved.slot(), Slot::new(1, 2));
        let seated = grid
            .entries()
            .iter()
            .find(|e| e.key() == target.key())
            .unwrap();
        assert_eq!(seated.slot(), Slot::new(1, 1));
        assert_no_double_booking(grid.entries());
    }

    #[test]
    fn test_swap_moves_same_day_aggregate_with_entry() {
        let mut grid = WorkingGrid::new(1);
        let filler = assignment(99, 1, 99, 0);
        for slot in Slot::all().filter(|&s| s != Slot::new(1, 1)) {
            grid.place(&filler, slot);
        }
        // Classroom 2 is busy for the rest of day 1, so the blocker has to
        // move to another day.
        let other_filler = assignment(98, 2, 98, 0);
        for period in 2..=7 {
            grid.place(&other_filler, Slot::new(1, period));
        }
        let blocker = assignment(1, 2, 2, 1);
        grid.place(&blocker, Slot::new(1, 1));
        let swaps = resolve(&[assignment(1, 1, 1, 1), blocker], &mut grid);

        assert_eq!(swaps, 1);
        let occ = grid.occupancy();
        assert_eq!(occ.same_day_count(2, 2, 1), 0);
        assert_eq!(occ.same_day_periods(2, 2, 2), &[1]);
        assert!(!occ.is_class_free(2, Slot::new(2, 1)));
        assert_eq!(occ.same_day_periods(1, 1, 1), &[1]);
    }

    #[test]
    fn test_no_swap_when_every_slot_is_full() {
        let mut grid = WorkingGrid::new(1);
        let filler = assignment(99, 1, 99, 0);
        for slot in Slot::all() {
            grid.place(&filler, slot);
        }
        let swaps = resolve(&[assignment(1, 1, 1, 1)], &mut grid);
        assert_eq!(swaps, 0);
        assert_eq!(grid.entries().len(), 35);
    }

    #[test]
    fn test_blocked_on_both_dimensions_is_not_swapped() {
        // Every slot holds one entry for classroom 1 and a different one for
        // teacher 1, so no single relocation frees a slot.
        let mut grid = WorkingGrid::new(1);
        let class_filler = assignment(99, 1, 99, 0);
        let teacher_filler = assignment(1, 2, 98, 0);
        for slot in Slot::all() {
            grid.place(&class_filler, slot);
            grid.place(&teacher_filler, slot);
        }

        let swaps = resolve(&[assignment(1, 1, 1, 1)], &mut grid);
        assert_eq!(swaps, 0);
        assert_eq!(grid.placed(&assignment(1, 1, 1, 0).key()), 0);
        assert_no_double_booking(grid.entries());
    }

    #[test]
    fn test_swap_ceiling_ends_phase_and_leaves_deficits() {
        // Classroom 1 is free only at (1, 1) and (1, 2), and teacher 1 holds
        // both with other classrooms, so each lesson needs its own swap.
        let mut grid = WorkingGrid::new(1);
        let filler = assignment(99, 1, 99, 0);
        for slot in Slot::all().filter(|&s| s.day != 1 || s.period > 2) {
            grid.place(&filler, slot);
        }
        grid.place(&assignment(1, 2, 2, 0), Slot::new(1, 1));
        grid.place(&assignment(1, 3, 3, 0), Slot::new(1, 2));

        let target = assignment(1, 1, 1, 2);
        // Directly placeable, but never reached once the ceiling is hit.
        let later = assignment(5, 4, 4, 1);
        let assignments = vec![target.clone(), later.clone()];
        let expected = expected_counts(&assignments);

        let swaps = resolve_with_swaps_bounded(&assignments, &expected, &mut grid, 1);

        assert_eq!(swaps, 1);
        assert_eq!(grid.placed(&target.key()), 1);
        assert_eq!(grid.placed(&later.key()), 0);
        assert_no_double_booking(grid.entries());

        let deficits = collect_deficits(&assignments, &expected, &grid);
        assert_eq!(deficits.len(), 2);
        assert_eq!((deficits[0].key, deficits[0].expected, deficits[0].placed), (target.key(), 2, 1));
        assert_eq!((deficits[1].key, deficits[1].expected, deficits[1].placed), (later.key(), 1, 0));
    }

    #[test]
    fn test_higher_ceiling_lets_both_swaps_through() {
        let mut grid = WorkingGrid::new(1);
        let filler = assignment(99, 1, 99, 0);
        for slot in Slot::all().filter(|&s| s.day != 1 || s.period > 2) {
            grid.place(&filler, slot);
        }
        grid.place(&assignment(1, 2, 2, 0), Slot::new(1, 1));
        grid.place(&assignment(1, 3, 3, 0), Slot::new(1, 2));

        let target = assignment(1, 1, 1, 2);
        let swaps = resolve(&[target.clone()], &mut grid);

        assert_eq!(swaps, 2);
        assert_eq!(grid.placed(&target.key()), 2);
        assert_no_double_booking(grid.entries());
    }
}
