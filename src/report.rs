//! Expected weekly loads compared with what the stored grid actually holds.

use itertools::Itertools;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

use crate::data::{Assignment, AssignmentKey, ClassroomId, Entry, TeacherId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentRow {
    pub teacher: String,
    pub classroom_id: ClassroomId,
    pub subject: String,
    pub expected: u32,
    pub scheduled: u32,
    pub delta: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub expected: u32,
    pub scheduled: u32,
    pub delta: i64,
}

impl Totals {
    fn new(expected: u32, scheduled: u32) -> Self {
        Self {
            expected,
            scheduled,
            delta: i64::from(scheduled) - i64::from(expected),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonReport {
    pub rows: Vec<AssignmentRow>,
    pub per_teacher: Vec<(String, Totals)>,
    pub per_classroom: Vec<(ClassroomId, Totals)>,
    pub overall: Totals,
}

impl ComparisonReport {
    /// Keeps only assignment rows whose scheduled count differs from the target.
    pub fn only_mismatches(mut self) -> Self {
        self.rows.retain(|r| r.delta != 0);
        self
    }

    pub fn is_balanced(&self) -> bool {
        self.overall.delta == 0 && self.rows.iter().all(|r| r.delta == 0)
    }
}

/// Assignments whose teacher name contains `needle`, ignoring case and
/// surrounding whitespace. A blank needle keeps everything.
pub fn teacher_contains(assignments: &[Assignment], needle: &str) -> Vec<Assignment> {
    let needle = needle.trim().to_lowercase();
    assignments
        .iter()
        .filter(|a| needle.is_empty() || a.teacher_full_name.to_lowercase().contains(&needle))
        .cloned()
        .collect()
}

/// Builds the comparison of `assignments` against stored `entries`.
pub fn compare(assignments: &[Assignment], entries: &[Entry]) -> ComparisonReport {
    let scheduled: HashMap<AssignmentKey, u32> = entries
        .iter()
        .map(|e| e.key())
        .counts()
        .into_iter()
        .map(|(k, n)| (k, n as u32))
        .collect();

    let rows: Vec<AssignmentRow> = assignments
        .iter()
        .map(|a| {
            let scheduled = scheduled.get(&a.key()).copied().unwrap_or(0);
            AssignmentRow {
                teacher: a.teacher_full_name.clone(),
                classroom_id: a.classroom_id,
                subject: a.subject_name.clone(),
                expected: a.weekly_count,
                scheduled,
                delta: i64::from(scheduled) - i64::from(a.weekly_count),
            }
        })
        .sorted_by(|x, y| {
            (&x.teacher, x.classroom_id, &x.subject).cmp(&(&y.teacher, y.classroom_id, &y.subject))
        })
        .collect();

    let teacher_names: HashMap<TeacherId, &str> = assignments
        .iter()
        .map(|a| (a.teacher_id, a.teacher_full_name.as_str()))
        .collect();
    let per_teacher = assignments
        .iter()
        .into_group_map_by(|a| a.teacher_id)
        .into_iter()
        .map(|(teacher_id, group)| {
            let (expected, scheduled) = totals_for(&group, &scheduled);
            (teacher_names[&teacher_id].to_string(), Totals::new(expected, scheduled))
        })
        .sorted_by(|x, y| x.0.cmp(&y.0))
        .collect();
    let per_classroom = assignments
        .iter()
        .into_group_map_by(|a| a.classroom_id)
        .into_iter()
        .map(|(classroom_id, group)| {
            let (expected, scheduled) = totals_for(&group, &scheduled);
            (classroom_id, Totals::new(expected, scheduled))
        })
        .sorted_by_key(|(classroom_id, _)| *classroom_id)
        .collect();

    let expected_total = assignments.iter().map(|a| a.weekly_count).sum();
    let scheduled_total = assignments
        .iter()
        .map(|a| a.key())
        .unique()
        .map(|k| scheduled.get(&k).copied().unwrap_or(0))
        .sum();

    ComparisonReport {
        rows,
        per_teacher,
        per_classroom,
        overall: Totals::new(expected_total, scheduled_total),
    }
}

fn totals_for(group: &[&Assignment], scheduled: &HashMap<AssignmentKey, u32>) -> (u32, u32) {
    group.iter().fold((0, 0), |(exp, sch), a| {
        (
            exp + a.weekly_count,
            sch + scheduled.get(&a.key()).copied().unwrap_or(0),
        )
    })
}

impl fmt::Display for ComparisonReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "teacher | classroom | subject | expected | scheduled | delta")?;
        for r in &self.rows {
            let mark = match r.delta {
                0 => "",
                d if d > 0 => " +",
                _ => " -",
            };
            writeln!(
                f,
                "{} | {} | {} | {:2} | {:2} | {:+}{}",
                r.teacher, r.classroom_id, r.subject, r.expected, r.scheduled, r.delta, mark
            )?;
        }
        writeln!(f)?;
        writeln!(f, "teacher | expected_total | scheduled_total | delta")?;
        for (teacher, t) in &self.per_teacher {
            writeln!(f, "{} | {:3} | {:3} | {:+}", teacher, t.expected, t.scheduled, t.delta)?;
        }
        writeln!(f)?;
        writeln!(f, "classroom | expected_total | scheduled_total | delta")?;
        for (classroom, t) in &self.per_classroom {
            writeln!(f, "{} | {:3} | {:3} | {:+}", classroom, t.expected, t.scheduled, t.delta)?;
        }
        writeln!(f)?;
        write!(
            f,
            "expected={} scheduled={} delta={:+}",
            self.overall.expected, self.overall.scheduled, self.overall.delta
        )
    }
}
