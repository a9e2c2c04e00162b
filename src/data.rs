use serde::{Deserialize, Serialize};
use std::fmt;

use crate::rules::Policy;

// Type aliases for clarity
pub type TermId = i64;
pub type TeacherId = i64;
pub type ClassroomId = i64;
pub type SubjectId = i64;
pub type Day = u8;
pub type Period = u8;

/// Working days of the week, Sunday through Thursday.
pub const DAYS: [Day; 5] = [1, 2, 3, 4, 5];
/// Teaching periods of a single day.
pub const PERIODS: [Period; 7] = [1, 2, 3, 4, 5, 6, 7];

/// An academic term. Only one is current at a time.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Term {
    pub id: TermId,
    pub name: String,
}

/// A (day, period) coordinate in the fixed weekly grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub struct Slot {
    pub day: Day,
    pub period: Period,
}

impl Slot {
    pub fn new(day: Day, period: Period) -> Self {
        Self { day, period }
    }

    /// Every slot of the week, day-major.
    pub fn all() -> impl Iterator<Item = Slot> {
        DAYS.into_iter()
            .flat_map(|day| PERIODS.into_iter().map(move |period| Slot { day, period }))
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "day {} period {}", self.day, self.period)
    }
}

/// Identity of a weekly obligation: one teacher teaching one subject to one classroom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub struct AssignmentKey {
    pub classroom_id: ClassroomId,
    pub subject_id: SubjectId,
    pub teacher_id: TeacherId,
}

/// A weekly teaching obligation read from the assignment repository.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Assignment {
    pub teacher_id: TeacherId,
    pub classroom_id: ClassroomId,
    pub subject_id: SubjectId,
    pub weekly_count: u32,
    #[serde(default)]
    pub teacher_full_name: String,
    #[serde(default)]
    pub subject_name: String,
}

impl Assignment {
    pub fn key(&self) -> AssignmentKey {
        AssignmentKey {
            classroom_id: self.classroom_id,
            subject_id: self.subject_id,
            teacher_id: self.teacher_id,
        }
    }
}

/// One lesson placed into the weekly grid for a term.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct Entry {
    pub classroom_id: ClassroomId,
    pub subject_id: SubjectId,
    pub teacher_id: TeacherId,
    pub day: Day,
    pub period: Period,
    pub term_id: TermId,
}

impl Entry {
    pub fn new(assignment: &Assignment, slot: Slot, term_id: TermId) -> Self {
        Self {
            classroom_id: assignment.classroom_id,
            subject_id: assignment.subject_id,
            teacher_id: assignment.teacher_id,
            day: slot.day,
            period: slot.period,
            term_id,
        }
    }

    pub fn slot(&self) -> Slot {
        Slot::new(self.day, self.period)
    }

    pub fn key(&self) -> AssignmentKey {
        AssignmentKey {
            classroom_id: self.classroom_id,
            subject_id: self.subject_id,
            teacher_id: self.teacher_id,
        }
    }
}

/// Outcome of replacing a term's stored grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct BuildResult {
    pub created: u64,
    pub replaced_existing: u64,
}

impl fmt::Display for BuildResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "created={} replaced_existing={}",
            self.created, self.replaced_existing
        )
    }
}

/// An assignment whose weekly target was not met after all phases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Deficit {
    pub key: AssignmentKey,
    pub teacher_full_name: String,
    pub subject_name: String,
    pub expected: u32,
    pub placed: u32,
}

impl Deficit {
    pub fn missing(&self) -> u32 {
        self.expected.saturating_sub(self.placed)
    }
}

impl fmt::Display for Deficit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{} / {} / classroom {}] placed {} of {}",
            self.teacher_full_name,
            self.subject_name,
            self.key.classroom_id,
            self.placed,
            self.expected
        )
    }
}

/// Request body for an unpersisted solve.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveInput {
    pub term_id: TermId,
    pub assignments: Vec<Assignment>,
    #[serde(default)]
    pub policy: Option<Policy>,
}

/// The final output of the solver.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveOutput {
    pub entries: Vec<Entry>,
    pub deficits: Vec<Deficit>,
    pub swaps: u32,
}
