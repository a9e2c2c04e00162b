//! Three-phase heuristic timetable solver.
//!
//! # Algorithm
//!
//! 1. [`greedy`]: place lessons round-robin across days, heaviest
//!    assignments first.
//! 2. [`backfill`]: retry leftover lessons under relaxed same-day caps.
//! 3. [`swap`]: relocate blocking entries to make room for stubborn deficits.
//!
//! All phases share one [`WorkingGrid`]. The iteration ceilings are fixed, so
//! a run always terminates; targets that cannot be met are reported as
//! [`Deficit`]s rather than raised as errors.

pub mod backfill;
pub mod greedy;
pub mod swap;

use log::{info, trace, warn};
use std::collections::HashMap;
use std::hash::Hash;
use std::time::Instant;

use crate::data::{Assignment, AssignmentKey, Deficit, Entry, Slot, TermId};
use crate::occupancy::OccupancyModel;
use crate::rules::Policy;

/// Per-key counter that starts every key at the same allowance.
#[derive(Debug, Clone)]
pub struct Budget<K> {
    initial: u32,
    spent: HashMap<K, u32>,
}

impl<K: Eq + Hash> Budget<K> {
    pub fn new(initial: u32) -> Self {
        Self {
            initial,
            spent: HashMap::new(),
        }
    }

    pub fn remaining(&self, key: &K) -> u32 {
        self.initial
            .saturating_sub(self.spent.get(key).copied().unwrap_or(0))
    }

    pub fn has_remaining(&self, key: &K) -> bool {
        self.remaining(key) > 0
    }

    /// Spends one unit; returns `false` when nothing was left.
    pub fn consume(&mut self, key: K) -> bool {
        if !self.has_remaining(&key) {
            return false;
        }
        *self.spent.entry(key).or_insert(0) += 1;
        true
    }
}

/// Rotating start day per assignment, kept across runs of one [`Scheduler`].
#[derive(Debug, Clone, Default)]
pub struct DayCursors {
    cursors: HashMap<AssignmentKey, usize>,
}

impl DayCursors {
    pub fn get(&self, key: &AssignmentKey) -> usize {
        self.cursors.get(key).copied().unwrap_or(0)
    }

    pub fn set(&mut self, key: AssignmentKey, cursor: usize) {
        self.cursors.insert(key, cursor);
    }
}

/// Live state of a run: the entries placed so far, their occupancy footprint
/// and the number of lessons placed per assignment.
#[derive(Debug, Clone)]
pub struct WorkingGrid {
    term_id: TermId,
    occupancy: OccupancyModel,
    entries: Vec<Entry>,
    placed: HashMap<AssignmentKey, u32>,
}

impl WorkingGrid {
    pub fn new(term_id: TermId) -> Self {
        Self {
            term_id,
            occupancy: OccupancyModel::new(),
            entries: Vec::new(),
            placed: HashMap::new(),
        }
    }

    pub fn occupancy(&self) -> &OccupancyModel {
        &self.occupancy
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<Entry> {
        self.entries
    }

    pub fn placed(&self, key: &AssignmentKey) -> u32 {
        self.placed.get(key).copied().unwrap_or(0)
    }

    pub fn can_place(&self, assignment: &Assignment, slot: Slot) -> bool {
        self.occupancy
            .is_free(assignment.classroom_id, assignment.teacher_id, slot)
    }

    /// Reserves `slot` and records a new entry for `assignment`.
    pub fn place(&mut self, assignment: &Assignment, slot: Slot) {
        self.occupancy.reserve(
            assignment.classroom_id,
            assignment.teacher_id,
            assignment.subject_id,
            slot,
        );
        self.entries
            .push(Entry::new(assignment, slot, self.term_id));
        *self.placed.entry(assignment.key()).or_insert(0) += 1;
        trace!(
            "Placed classroom {} subject {} teacher {} at {}",
            assignment.classroom_id, assignment.subject_id, assignment.teacher_id, slot
        );
    }

    /// Moves the entry at `index` to `target`, carrying its whole footprint.
    ///
    /// The caller must already have released the entry's current busy
    /// footprint and checked that `target` is free.
    fn relocate_released(&mut self, index: usize, target: Slot) {
        let entry = &self.entries[index];
        let (classroom_id, teacher_id, subject_id, from) =
            (entry.classroom_id, entry.teacher_id, entry.subject_id, entry.slot());
        self.occupancy
            .forget_lesson(classroom_id, subject_id, from);
        self.occupancy
            .reserve(classroom_id, teacher_id, subject_id, target);
        let entry = &mut self.entries[index];
        entry.day = target.day;
        entry.period = target.period;
        trace!("Relocated classroom {classroom_id} teacher {teacher_id} from {from} to {target}");
    }
}

/// Weekly target per assignment key. Repeated triples add up.
pub fn expected_counts(assignments: &[Assignment]) -> HashMap<AssignmentKey, u32> {
    let mut expected = HashMap::new();
    for a in assignments {
        *expected.entry(a.key()).or_insert(0) += a.weekly_count;
    }
    expected
}

/// Outstanding lessons for `key` given what is already placed.
pub(crate) fn remaining_need(
    grid: &WorkingGrid,
    expected: &HashMap<AssignmentKey, u32>,
    key: &AssignmentKey,
) -> u32 {
    expected
        .get(key)
        .copied()
        .unwrap_or(0)
        .saturating_sub(grid.placed(key))
}

/// Heaviest weekly load first; ties keep input order.
pub fn order_by_load(assignments: &[Assignment]) -> Vec<Assignment> {
    let mut ordered = assignments.to_vec();
    ordered.sort_by_key(|a| std::cmp::Reverse(a.weekly_count));
    ordered
}

/// Result of one solver run.
#[derive(Debug, Clone)]
pub struct Schedule {
    pub entries: Vec<Entry>,
    pub deficits: Vec<Deficit>,
    pub swaps: u32,
}

/// Runs the placement pipeline. Day cursors survive between runs so that
/// repeated builds in one process rotate their starting days.
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    cursors: DayCursors,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build(&mut self, term_id: TermId, assignments: &[Assignment], policy: &Policy) -> Schedule {
        let start_time = Instant::now();
        let ordered = order_by_load(assignments);
        let expected = expected_counts(&ordered);
        let mut grid = WorkingGrid::new(term_id);

        info!(
            "Building timetable for term {} with {} assignments ({} lessons)...",
            term_id,
            ordered.len(),
            expected.values().sum::<u32>()
        );

        greedy::place_round_robin(&ordered, policy, &mut grid, &mut self.cursors);
        info!("Greedy phase placed {} lessons.", grid.entries().len());

        backfill::backfill_relaxed(&ordered, &expected, policy, &mut grid);
        info!("Backfill phase brought total to {} lessons.", grid.entries().len());

        let swaps = swap::resolve_with_swaps(&ordered, &expected, &mut grid);
        info!(
            "Swap phase brought total to {} lessons using {} swaps.",
            grid.entries().len(),
            swaps
        );

        let deficits = collect_deficits(&ordered, &expected, &grid);
        for deficit in &deficits {
            warn!("Unmet weekly target: {deficit}");
        }
        info!("Timetable built in {:.2?}", start_time.elapsed());

        Schedule {
            entries: grid.into_entries(),
            deficits,
            swaps,
        }
    }
}

fn collect_deficits(
    ordered: &[Assignment],
    expected: &HashMap<AssignmentKey, u32>,
    grid: &WorkingGrid,
) -> Vec<Deficit> {
    let mut seen = std::collections::HashSet::new();
    ordered
        .iter()
        .filter(|a| seen.insert(a.key()))
        .filter_map(|a| {
            let key = a.key();
            let expected = expected.get(&key).copied().unwrap_or(0);
            let placed = grid.placed(&key);
            (placed < expected).then(|| Deficit {
                key,
                teacher_full_name: a.teacher_full_name.clone(),
                subject_name: a.subject_name.clone(),
                expected,
                placed,
            })
        })
        .collect()
}
