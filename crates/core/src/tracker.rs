//! Playback-driven lesson progress.
//!
//! [`ProgressTracker`] is a pure state machine: it consumes playback events
//! and returns the commands the caller should send to the backend. It never
//! performs I/O, so the throttling and completion rules can be checked with a
//! fixed clock.

use chrono::{DateTime, Duration, Utc};

use crate::model::{
    Capability, CompletionThreshold, Lesson, LessonId, LessonProgress, Percent, ProgressReport,
    Viewer,
};

/// Minimum wall-clock gap between two durable progress reports.
pub const REPORT_INTERVAL_SECS: i64 = 5;

/// Work the tracker asks its host to send to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressCommand {
    /// Throttled report of the current playback position.
    Report(ProgressReport),
    /// The completion threshold was just crossed; report the full recorded
    /// duration so the backend derives completion from it.
    PersistCompletion(ProgressReport),
    /// Idempotent "mark complete" call.
    MarkComplete(LessonId),
}

/// Result of feeding one event to the tracker.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionUpdate {
    /// Live percentage for the hosting view.
    pub percent: Percent,
    pub completed: bool,
    /// True only on the event that flipped `completed`.
    pub newly_completed: bool,
    pub commands: Vec<ProgressCommand>,
}

/// Per-lesson, per-view progress state.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    lesson_id: LessonId,
    recorded_duration: u32,
    media_duration: Option<f64>,
    position: f64,
    percent: Percent,
    completed: bool,
    tracked: bool,
    last_report_at: Option<DateTime<Utc>>,
    report_interval: Duration,
}

impl ProgressTracker {
    #[must_use]
    pub fn new(lesson: &Lesson, viewer: &Viewer) -> Self {
        Self {
            lesson_id: lesson.id,
            recorded_duration: lesson.video_duration,
            media_duration: None,
            position: 0.0,
            percent: Percent::ZERO,
            completed: false,
            tracked: viewer.can(Capability::TrackProgress),
            last_report_at: None,
            report_interval: Duration::seconds(REPORT_INTERVAL_SECS),
        }
    }

    #[must_use]
    pub fn with_report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = interval;
        self
    }

    #[must_use]
    pub fn lesson_id(&self) -> LessonId {
        self.lesson_id
    }

    #[must_use]
    pub fn percent(&self) -> Percent {
        self.percent
    }

    #[must_use]
    pub fn position(&self) -> f64 {
        self.position
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Whether this viewer produces durable reports at all.
    #[must_use]
    pub fn is_tracked(&self) -> bool {
        self.tracked
    }

    /// Forward navigation is open: the lesson is completed, or the viewer is
    /// not subject to completion gating.
    #[must_use]
    pub fn is_unlocked(&self) -> bool {
        !self.tracked || self.completed
    }

    /// Duration used for percentages and the threshold: the media's own
    /// duration once metadata has loaded, the recorded one before that.
    #[must_use]
    pub fn duration(&self) -> f64 {
        self.media_duration
            .unwrap_or_else(|| f64::from(self.recorded_duration))
    }

    #[must_use]
    pub fn threshold(&self) -> CompletionThreshold {
        CompletionThreshold::for_duration(self.duration())
    }

    /// Apply a progress record read back from the backend.
    ///
    /// Completion only ever latches on; a stale record cannot clear it.
    pub fn restore(&mut self, saved: &LessonProgress) {
        if !self.tracked {
            return;
        }
        self.percent = saved.completion_percentage;
        self.completed |= saved.is_completed;
    }

    /// Media metadata arrived with the real duration.
    pub fn on_metadata(&mut self, duration_secs: f64) {
        if duration_secs.is_finite() && duration_secs > 0.0 {
            self.media_duration = Some(duration_secs);
        }
    }

    /// Playback position changed (regular tick or seek).
    pub fn on_position(&mut self, position_secs: f64, now: DateTime<Utc>) -> PositionUpdate {
        self.position = if position_secs.is_finite() {
            position_secs.max(0.0)
        } else {
            0.0
        };
        self.percent = Percent::of(self.position, self.duration());

        let mut commands = Vec::new();
        if !self.tracked {
            return self.update(false, commands);
        }

        if self.position > 0.0 && self.report_due(now) {
            self.last_report_at = Some(now);
            commands.push(ProgressCommand::Report(ProgressReport {
                lesson_id: self.lesson_id,
                watched_duration: whole_seconds(self.position),
            }));
        }

        let mut newly_completed = false;
        if !self.completed && self.threshold().is_met(self.percent) {
            self.completed = true;
            newly_completed = true;
            commands.push(ProgressCommand::PersistCompletion(ProgressReport {
                lesson_id: self.lesson_id,
                watched_duration: self.full_duration_secs(),
            }));
        }

        self.update(newly_completed, commands)
    }

    /// Playback reached the natural end of the media.
    pub fn on_ended(&mut self) -> PositionUpdate {
        self.force_complete()
    }

    /// Explicit "mark as complete" from the viewer.
    ///
    /// Local state flips immediately; the caller must not roll it back if the
    /// resulting command fails.
    pub fn mark_complete(&mut self) -> PositionUpdate {
        self.force_complete()
    }

    fn force_complete(&mut self) -> PositionUpdate {
        if !self.tracked {
            return self.update(false, Vec::new());
        }
        let newly_completed = !self.completed;
        self.completed = true;
        self.percent = Percent::FULL;
        self.update(
            newly_completed,
            vec![ProgressCommand::MarkComplete(self.lesson_id)],
        )
    }

    fn report_due(&self, now: DateTime<Utc>) -> bool {
        match self.last_report_at {
            None => true,
            Some(last) => now - last >= self.report_interval,
        }
    }

    fn full_duration_secs(&self) -> u32 {
        if self.recorded_duration > 0 {
            self.recorded_duration
        } else {
            whole_seconds(self.duration().ceil())
        }
    }

    fn update(&self, newly_completed: bool, commands: Vec<ProgressCommand>) -> PositionUpdate {
        PositionUpdate {
            percent: self.percent,
            completed: self.completed,
            newly_completed,
            commands,
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn whole_seconds(secs: f64) -> u32 {
    secs.floor().clamp(0.0, f64::from(u32::MAX)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CourseId, Identity, Role, UserId};
    use crate::time::{fixed_clock, fixed_now};

    fn lesson(duration: u32) -> Lesson {
        Lesson::new(LessonId::new(7), CourseId::new(1), "Ownership", duration, 1)
    }

    fn viewer(role: Role) -> Viewer {
        Viewer::Signed(Identity {
            id: UserId::new(3),
            name: "Sam".into(),
            email: "sam@example.com".into(),
            role,
        })
    }

    fn reports(update: &PositionUpdate) -> usize {
        update
            .commands
            .iter()
            .filter(|c| matches!(c, ProgressCommand::Report(_)))
            .count()
    }

    #[test]
    fn long_video_completes_at_half() {
        let mut tracker = ProgressTracker::new(&lesson(30), &viewer(Role::Student));
        let now = fixed_now();

        let before = tracker.on_position(14.9, now);
        assert!(!before.completed);

        let at = tracker.on_position(15.0, now);
        assert!(at.completed);
        assert!(at.newly_completed);
        assert!(at.commands.contains(&ProgressCommand::PersistCompletion(ProgressReport {
            lesson_id: LessonId::new(7),
            watched_duration: 30,
        })));
    }

    #[test]
    fn short_clip_needs_ninety_percent() {
        let mut tracker = ProgressTracker::new(&lesson(10), &viewer(Role::Student));
        let now = fixed_now();
        assert!(!tracker.on_position(8.9, now).completed);
        assert!(tracker.on_position(9.0, now).completed);
    }

    #[test]
    fn metadata_duration_overrides_recorded_one() {
        let mut tracker = ProgressTracker::new(&lesson(10), &viewer(Role::Student));
        tracker.on_metadata(40.0);
        let update = tracker.on_position(20.0, fixed_now());
        assert_eq!(update.percent.value(), 50.0);
        assert!(update.completed);
    }

    #[test]
    fn completion_latches_across_seeks() {
        let mut tracker = ProgressTracker::new(&lesson(30), &viewer(Role::Student));
        let now = fixed_now();
        tracker.on_position(20.0, now);
        let rewound = tracker.on_position(0.0, now);
        assert!(rewound.completed);
        assert!(!rewound.newly_completed);
        assert_eq!(rewound.percent, Percent::ZERO);
        assert!(tracker.is_unlocked());
    }

    #[test]
    fn reports_are_throttled_to_one_per_window() {
        let mut clock = fixed_clock();
        let mut tracker = ProgressTracker::new(&lesson(600), &viewer(Role::Student));

        let first = tracker.on_position(1.0, clock.now());
        clock.advance(Duration::seconds(2));
        let second = tracker.on_position(3.0, clock.now());
        assert_eq!(reports(&first) + reports(&second), 1);

        clock.advance(Duration::seconds(4));
        let third = tracker.on_position(7.6, clock.now());
        assert_eq!(reports(&third), 1);
        assert_eq!(
            third.commands[0],
            ProgressCommand::Report(ProgressReport {
                lesson_id: LessonId::new(7),
                watched_duration: 7,
            })
        );
    }

    #[test]
    fn updates_six_seconds_apart_both_report() {
        let mut clock = fixed_clock();
        let mut tracker = ProgressTracker::new(&lesson(600), &viewer(Role::Student));
        let first = tracker.on_position(1.0, clock.now());
        clock.advance(Duration::seconds(6));
        let second = tracker.on_position(7.0, clock.now());
        assert_eq!(reports(&first), 1);
        assert_eq!(reports(&second), 1);
    }

    #[test]
    fn position_zero_is_never_reported() {
        let mut tracker = ProgressTracker::new(&lesson(600), &viewer(Role::Student));
        let update = tracker.on_position(0.0, fixed_now());
        assert!(update.commands.is_empty());
    }

    #[test]
    fn ended_forces_completion_and_marks_complete() {
        let mut tracker = ProgressTracker::new(&lesson(600), &viewer(Role::Student));
        let update = tracker.on_ended();
        assert!(update.completed);
        assert_eq!(
            update.commands,
            vec![ProgressCommand::MarkComplete(LessonId::new(7))]
        );
        let again = tracker.on_ended();
        assert!(!again.newly_completed);
        assert_eq!(again.commands.len(), 1);
    }

    #[test]
    fn manual_completion_is_optimistic() {
        let mut tracker = ProgressTracker::new(&lesson(600), &viewer(Role::Student));
        tracker.on_position(10.0, fixed_now());
        let update = tracker.mark_complete();
        assert_eq!(update.percent, Percent::FULL);
        assert!(update.completed);
    }

    #[test]
    fn non_students_short_circuit() {
        for viewer in [viewer(Role::Instructor), viewer(Role::Admin), Viewer::Anonymous] {
            let mut tracker = ProgressTracker::new(&lesson(30), &viewer);
            assert!(tracker.is_unlocked());
            let update = tracker.on_position(29.0, fixed_now());
            assert!(update.commands.is_empty());
            assert!(!update.completed);
            assert!(tracker.on_ended().commands.is_empty());
        }
    }

    #[test]
    fn restore_never_clears_completion() {
        let mut tracker = ProgressTracker::new(&lesson(30), &viewer(Role::Student));
        tracker.restore(&LessonProgress {
            watched_duration: 30,
            completion_percentage: Percent::FULL,
            is_completed: true,
        });
        tracker.restore(&LessonProgress::default());
        assert!(tracker.is_completed());
    }
}
