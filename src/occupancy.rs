use std::collections::{HashMap, HashSet};

use crate::data::{ClassroomId, Day, Period, Slot, SubjectId, TeacherId};

/// Which classroom and teacher slots are taken, and which periods each
/// (classroom, subject) pair already holds on each day.
///
/// The busy sets always mirror the live entry list; callers must check
/// freedom before reserving.
#[derive(Debug, Clone, Default)]
pub struct OccupancyModel {
    class_busy: HashSet<(ClassroomId, Day, Period)>,
    teacher_busy: HashSet<(TeacherId, Day, Period)>,
    class_subject_day: HashMap<(ClassroomId, SubjectId, Day), Vec<Period>>,
}

impl OccupancyModel {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_class_free(&self, classroom_id: ClassroomId, slot: Slot) -> bool {
        !self
            .class_busy
            .contains(&(classroom_id, slot.day, slot.period))
    }

    #[inline]
    pub fn is_teacher_free(&self, teacher_id: TeacherId, slot: Slot) -> bool {
        !self
            .teacher_busy
            .contains(&(teacher_id, slot.day, slot.period))
    }

    #[inline]
    pub fn is_free(&self, classroom_id: ClassroomId, teacher_id: TeacherId, slot: Slot) -> bool {
        self.is_class_free(classroom_id, slot) && self.is_teacher_free(teacher_id, slot)
    }

    /// Claims `slot` for the classroom and teacher and records the lesson
    /// against the (classroom, subject, day) aggregate.
    pub fn reserve(
        &mut self,
        classroom_id: ClassroomId,
        teacher_id: TeacherId,
        subject_id: SubjectId,
        slot: Slot,
    ) {
        self.occupy(classroom_id, teacher_id, slot);
        self.class_subject_day
            .entry((classroom_id, subject_id, slot.day))
            .or_default()
            .push(slot.period);
    }

    /// Frees the busy footprint only. The same-day aggregate is untouched.
    pub fn release(&mut self, classroom_id: ClassroomId, teacher_id: TeacherId, slot: Slot) {
        self.class_busy
            .remove(&(classroom_id, slot.day, slot.period));
        self.teacher_busy
            .remove(&(teacher_id, slot.day, slot.period));
    }

    /// Re-claims a footprint previously dropped with [`release`](Self::release).
    pub fn occupy(&mut self, classroom_id: ClassroomId, teacher_id: TeacherId, slot: Slot) {
        let class_inserted = self
            .class_busy
            .insert((classroom_id, slot.day, slot.period));
        let teacher_inserted = self
            .teacher_busy
            .insert((teacher_id, slot.day, slot.period));
        debug_assert!(
            class_inserted,
            "classroom {classroom_id} double-booked at {slot}"
        );
        debug_assert!(
            teacher_inserted,
            "teacher {teacher_id} double-booked at {slot}"
        );
    }

    /// Removes one lesson from the same-day aggregate, used when a lesson
    /// is relocated to another slot.
    pub fn forget_lesson(&mut self, classroom_id: ClassroomId, subject_id: SubjectId, slot: Slot) {
        let key = (classroom_id, subject_id, slot.day);
        if let Some(periods) = self.class_subject_day.get_mut(&key) {
            if let Some(pos) = periods.iter().position(|&p| p == slot.period) {
                periods.remove(pos);
            }
            if periods.is_empty() {
                self.class_subject_day.remove(&key);
            }
        }
    }

    pub fn same_day_count(&self, classroom_id: ClassroomId, subject_id: SubjectId, day: Day) -> usize {
        self.same_day_periods(classroom_id, subject_id, day).len()
    }

    /// Periods already holding this (classroom, subject) on `day`, in placement order.
    pub fn same_day_periods(
        &self,
        classroom_id: ClassroomId,
        subject_id: SubjectId,
        day: Day,
    ) -> &[Period] {
        self.class_subject_day
            .get(&(classroom_id, subject_id, day))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_marks_class_teacher_and_same_day() {
        let mut occ = OccupancyModel::new();
        let slot = Slot::new(2, 3);
        occ.reserve(10, 20, 30, slot);

        assert!(!occ.is_class_free(10, slot));
        assert!(!occ.is_teacher_free(20, slot));
        assert!(occ.is_class_free(11, slot));
        assert!(occ.is_teacher_free(21, slot));
        assert!(occ.is_free(10, 20, Slot::new(2, 4)));
        assert_eq!(occ.same_day_count(10, 30, 2), 1);
        assert_eq!(occ.same_day_count(10, 30, 3), 0);
        assert_eq!(occ.same_day_periods(10, 30, 2), &[3]);
    }

    #[test]
    fn test_release_keeps_same_day_aggregate() {
        let mut occ = OccupancyModel::new();
        let slot = Slot::new(1, 1);
        occ.reserve(1, 2, 3, slot);
        occ.release(1, 2, slot);

        assert!(occ.is_free(1, 2, slot));
        assert_eq!(occ.same_day_count(1, 3, 1), 1);
    }

    #[test]
    fn test_forget_lesson_decrements_same_day_aggregate() {
        let mut occ = OccupancyModel::new();
        occ.reserve(1, 2, 3, Slot::new(1, 1));
        occ.reserve(1, 2, 3, Slot::new(1, 2));
        occ.forget_lesson(1, 3, Slot::new(1, 1));
        assert_eq!(occ.same_day_periods(1, 3, 1), &[2]);
        occ.forget_lesson(1, 3, Slot::new(1, 2));
        assert_eq!(occ.same_day_count(1, 3, 1), 0);
        // Forgetting an unknown lesson is a no-op.
        occ.forget_lesson(1, 3, Slot::new(4, 4));
    }

    #[test]
    #[should_panic(expected = "double-booked")]
    fn test_double_reservation_of_classroom_is_caught() {
        let mut occ = OccupancyModel::new();
        occ.reserve(1, 2, 3, Slot::new(1, 1));
        occ.reserve(1, 9, 3, Slot::new(1, 1));
    }

    #[test]
    #[should_panic(expected = "double-booked")]
    fn test_double_reservation_of_teacher_is_caught() {
        let mut occ = OccupancyModel::new();
        occ.reserve(1, 2, 3, Slot::new(1, 1));
        occ.reserve(7, 2, 3, Slot::new(1, 1));
    }
}
