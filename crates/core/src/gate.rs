//! Sequential lesson unlocking.

use std::collections::HashMap;
use std::fmt;

use crate::model::{Lesson, LessonId, Viewer, sort_by_order};

/// Why a navigation attempt was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockReason {
    /// Target is the next lesson but the current one is not completed.
    CurrentIncomplete,
    /// Target is more than one lesson ahead.
    SkipsAhead,
    /// Target does not belong to this course.
    UnknownLesson,
}

impl LockReason {
    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            LockReason::CurrentIncomplete => {
                "Lesson is locked. Complete the current lesson first."
            }
            LockReason::SkipsAhead => {
                "Lesson is locked. Complete the previous lessons in order first."
            }
            LockReason::UnknownLesson => "Lesson is not part of this course.",
        }
    }
}

impl fmt::Display for LockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Allowed,
    /// Target is the lesson being viewed; nothing to do.
    AlreadyHere,
    Locked(LockReason),
}

impl GateDecision {
    #[must_use]
    pub fn is_allowed(self) -> bool {
        matches!(self, GateDecision::Allowed)
    }
}

/// Navigation gate for one lesson view.
///
/// Holds the course's lessons in ordinal order and the completion flags known
/// to the view. Flags only ever go from `false` to `true`, which keeps
/// accessibility monotonic.
#[derive(Debug, Clone)]
pub struct LessonGate {
    lessons: Vec<Lesson>,
    completion: HashMap<LessonId, bool>,
    current: LessonId,
    current_order: u32,
}

impl LessonGate {
    #[must_use]
    pub fn new(current: &Lesson, mut lessons: Vec<Lesson>) -> Self {
        sort_by_order(&mut lessons);
        Self {
            lessons,
            completion: HashMap::new(),
            current: current.id,
            current_order: current.order,
        }
    }

    #[must_use]
    pub fn lessons(&self) -> &[Lesson] {
        &self.lessons
    }

    #[must_use]
    pub fn current(&self) -> LessonId {
        self.current
    }

    #[must_use]
    pub fn is_completed(&self, lesson: LessonId) -> bool {
        self.completion.get(&lesson).copied().unwrap_or(false)
    }

    /// Record a completion flag. A `false` never overwrites an earlier `true`.
    pub fn record(&mut self, lesson: LessonId, completed: bool) {
        let flag = self.completion.entry(lesson).or_insert(false);
        *flag |= completed;
    }

    pub fn mark_completed(&mut self, lesson: LessonId) {
        self.record(lesson, true);
    }

    /// Decide whether `viewer` may move from the current lesson to `target`.
    #[must_use]
    pub fn check(&self, viewer: &Viewer, target: LessonId) -> GateDecision {
        if !viewer.is_gated() {
            return GateDecision::Allowed;
        }

        let Some(target_order) = self.order_of(target) else {
            return GateDecision::Locked(LockReason::UnknownLesson);
        };

        let current = self.current_order;
        if target_order < current {
            GateDecision::Allowed
        } else if target_order == current {
            GateDecision::AlreadyHere
        } else if target_order == current.saturating_add(1) {
            if self.is_completed(self.current) {
                GateDecision::Allowed
            } else {
                GateDecision::Locked(LockReason::CurrentIncomplete)
            }
        } else {
            GateDecision::Locked(LockReason::SkipsAhead)
        }
    }

    /// Whether the "next lesson" control should be enabled.
    #[must_use]
    pub fn next_enabled(&self, viewer: &Viewer) -> bool {
        !viewer.is_gated() || self.is_completed(self.current)
    }

    #[must_use]
    pub fn next_lesson(&self) -> Option<&Lesson> {
        self.lessons
            .iter()
            .find(|lesson| lesson.order > self.current_order)
    }

    #[must_use]
    pub fn previous_lesson(&self) -> Option<&Lesson> {
        self.lessons
            .iter()
            .rev()
            .find(|lesson| lesson.order < self.current_order)
    }

    fn order_of(&self, lesson: LessonId) -> Option<u32> {
        if lesson == self.current {
            return Some(self.current_order);
        }
        self.lessons
            .iter()
            .find(|candidate| candidate.id == lesson)
            .map(|candidate| candidate.order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CourseId, Identity, Role, UserId};

    fn lessons() -> Vec<Lesson> {
        (1..=3)
            .map(|n| Lesson::new(LessonId::new(n * 10), CourseId::new(1), format!("L{n}"), 60, n as u32))
            .collect()
    }

    fn viewer(role: Role) -> Viewer {
        Viewer::Signed(Identity {
            id: UserId::new(1),
            name: "Kim".into(),
            email: "kim@example.com".into(),
            role,
        })
    }

    fn gate_at(order: usize) -> LessonGate {
        let all = lessons();
        LessonGate::new(&all[order - 1], all.clone())
    }

    #[test]
    fn next_lesson_opens_only_after_completion() {
        let student = viewer(Role::Student);
        let mut gate = gate_at(1);
        assert_eq!(
            gate.check(&student, LessonId::new(20)),
            GateDecision::Locked(LockReason::CurrentIncomplete)
        );
        gate.mark_completed(LessonId::new(10));
        assert_eq!(gate.check(&student, LessonId::new(20)), GateDecision::Allowed);
    }

    #[test]
    fn cannot_skip_ahead_even_if_later_lessons_are_complete() {
        let student = viewer(Role::Student);
        let mut gate = gate_at(1);
        gate.mark_completed(LessonId::new(10));
        gate.mark_completed(LessonId::new(20));
        assert_eq!(
            gate.check(&student, LessonId::new(30)),
            GateDecision::Locked(LockReason::SkipsAhead)
        );
    }

    #[test]
    fn earlier_lessons_are_always_open() {
        let student = viewer(Role::Student);
        let gate = gate_at(3);
        assert_eq!(gate.check(&student, LessonId::new(10)), GateDecision::Allowed);
        assert_eq!(gate.check(&student, LessonId::new(30)), GateDecision::AlreadyHere);
    }

    #[test]
    fn unknown_target_is_locked() {
        let gate = gate_at(1);
        assert_eq!(
            gate.check(&viewer(Role::Student), LessonId::new(99)),
            GateDecision::Locked(LockReason::UnknownLesson)
        );
    }

    #[test]
    fn non_students_always_pass() {
        let gate = gate_at(1);
        for viewer in [viewer(Role::Instructor), viewer(Role::Admin), Viewer::Anonymous] {
            for target in [10, 20, 30, 99] {
                assert!(gate.check(&viewer, LessonId::new(target)).is_allowed());
            }
            assert!(gate.next_enabled(&viewer));
        }
    }

    #[test]
    fn completion_flags_never_revert() {
        let mut gate = gate_at(1);
        gate.record(LessonId::new(10), true);
        gate.record(LessonId::new(10), false);
        assert!(gate.is_completed(LessonId::new(10)));
    }

    #[test]
    fn gap_in_ordinals_keeps_next_lesson_locked() {
        let course = CourseId::new(1);
        let all = vec![
            Lesson::new(LessonId::new(1), course, "a", 60, 2),
            Lesson::new(LessonId::new(2), course, "b", 60, 5),
        ];
        let gate = LessonGate::new(&all[0], all.clone());
        assert_eq!(gate.next_lesson().map(|l| l.id), Some(LessonId::new(2)));
        assert_eq!(
            gate.check(&viewer(Role::Student), LessonId::new(2)),
            GateDecision::Locked(LockReason::SkipsAhead)
        );
    }

    #[test]
    fn neighbours_follow_ordinal_order() {
        let gate = gate_at(2);
        assert_eq!(gate.previous_lesson().map(|l| l.id), Some(LessonId::new(10)));
        assert_eq!(gate.next_lesson().map(|l| l.id), Some(LessonId::new(30)));
        assert!(gate_at(3).next_lesson().is_none());
    }
}
