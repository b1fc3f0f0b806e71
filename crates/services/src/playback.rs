//! Playback of one lesson: live progress, durable writes and gating.
//!
//! The tracker decides what to write; this module performs the writes on a
//! single background task per playback so that they reach the backend in the
//! order they were decided. Writes are fire-and-forget: failures are logged
//! and dropped.

use std::sync::Arc;

use chrono::Duration;
use tokio::sync::{mpsc, oneshot};

use lms_core::Clock;
use lms_core::gate::{GateDecision, LessonGate};
use lms_core::model::{Lesson, LessonId, Percent, Viewer};
use lms_core::tracker::{PositionUpdate, ProgressCommand, ProgressTracker};

use api::ProgressApi;

use crate::events::{EventHub, Subscription};
use crate::lesson_view::LessonView;

/// Published to progress listeners after every playback event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressChange {
    pub lesson_id: LessonId,
    pub percent: Percent,
    pub completed: bool,
}

enum Job {
    Send(ProgressCommand),
    Flush(oneshot::Sender<()>),
}

pub struct PlaybackSession {
    tracker: ProgressTracker,
    gate: LessonGate,
    viewer: Viewer,
    clock: Clock,
    writes: mpsc::UnboundedSender<Job>,
    changes: EventHub<ProgressChange>,
}

impl PlaybackSession {
    /// Start playback of a loaded lesson and spawn its progress writer.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn start(
        view: LessonView,
        progress: Arc<dyn ProgressApi>,
        token: Option<String>,
        clock: Clock,
    ) -> Self {
        let mut tracker = ProgressTracker::new(&view.lesson, &view.viewer);
        tracker.restore(&view.saved);

        let (writes, jobs) = mpsc::unbounded_channel();
        tokio::spawn(run_writer(progress, token, jobs));

        Self {
            tracker,
            gate: view.gate,
            viewer: view.viewer,
            clock,
            writes,
            changes: EventHub::new(),
        }
    }

    #[must_use]
    pub fn lesson_id(&self) -> LessonId {
        self.tracker.lesson_id()
    }

    #[must_use]
    pub fn percent(&self) -> Percent {
        self.tracker.percent()
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.tracker.is_completed()
    }

    #[must_use]
    pub fn tracker(&self) -> &ProgressTracker {
        &self.tracker
    }

    #[must_use]
    pub fn gate(&self) -> &LessonGate {
        &self.gate
    }

    /// Move the playback clock forward. Only has an effect on fixed clocks.
    pub fn advance_clock(&mut self, delta: Duration) {
        self.clock.advance(delta);
    }

    pub fn on_metadata(&mut self, duration_secs: f64) {
        self.tracker.on_metadata(duration_secs);
    }

    pub fn on_position(&mut self, position_secs: f64) -> PositionUpdate {
        let update = self.tracker.on_position(position_secs, self.clock.now());
        self.apply(&update);
        update
    }

    pub fn on_ended(&mut self) -> PositionUpdate {
        let update = self.tracker.on_ended();
        self.apply(&update);
        update
    }

    /// Mark the lesson complete right away; the backend call runs in the
    /// background and its outcome does not change local state.
    pub fn mark_complete(&mut self) -> PositionUpdate {
        let update = self.tracker.mark_complete();
        self.apply(&update);
        update
    }

    #[must_use]
    pub fn check_navigation(&self, target: LessonId) -> GateDecision {
        self.gate.check(&self.viewer, target)
    }

    #[must_use]
    pub fn next_enabled(&self) -> bool {
        self.gate.next_enabled(&self.viewer)
    }

    #[must_use]
    pub fn next_lesson(&self) -> Option<&Lesson> {
        self.gate.next_lesson()
    }

    #[must_use]
    pub fn previous_lesson(&self) -> Option<&Lesson> {
        self.gate.previous_lesson()
    }

    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe(
        &self,
        listener: impl Fn(&ProgressChange) + Send + Sync + 'static,
    ) -> Subscription {
        self.changes.subscribe(listener)
    }

    /// Wait until every write decided so far has been attempted.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.writes.send(Job::Flush(done)).is_ok() {
            let _ = wait.await;
        }
    }

    fn apply(&mut self, update: &PositionUpdate) {
        if update.newly_completed {
            tracing::info!(lesson_id = %self.lesson_id(), "lesson completed");
        }
        self.gate.record(self.lesson_id(), update.completed);

        for command in &update.commands {
            if self.writes.send(Job::Send(*command)).is_err() {
                tracing::warn!(lesson_id = %self.lesson_id(), "progress writer stopped, dropping write");
            }
        }

        self.changes.publish(&ProgressChange {
            lesson_id: self.lesson_id(),
            percent: update.percent,
            completed: update.completed,
        });
    }
}

async fn run_writer(
    api: Arc<dyn ProgressApi>,
    token: Option<String>,
    mut jobs: mpsc::UnboundedReceiver<Job>,
) {
    while let Some(job) = jobs.recv().await {
        match job {
            Job::Send(command) => send(api.as_ref(), command, token.as_deref()).await,
            Job::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
}

async fn send(api: &dyn ProgressApi, command: ProgressCommand, auth: Option<&str>) {
    let (lesson_id, result) = match command {
        ProgressCommand::Report(report) | ProgressCommand::PersistCompletion(report) => {
            (report.lesson_id, api.save_progress(&report, auth).await)
        }
        ProgressCommand::MarkComplete(lesson_id) => {
            (lesson_id, api.mark_complete(lesson_id, auth).await)
        }
    };
    if let Err(error) = result {
        tracing::warn!(lesson_id = %lesson_id, %error, ?command, "progress write failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use api::{Endpoint, InMemoryBackend};
    use lms_core::model::{Course, CourseId, Identity, LessonProgress, Role, UserId};
    use lms_core::time::fixed_clock;
    use std::sync::Mutex;

    const TOKEN: &str = "tok";

    fn student() -> Identity {
        Identity {
            id: UserId::new(1),
            name: "Kim".into(),
            email: "kim@example.com".into(),
            role: Role::Student,
        }
    }

    fn lessons() -> Vec<Lesson> {
        (1..=3_u32)
            .map(|n| {
                let id = LessonId::new(u64::from(n));
                Lesson::new(id, CourseId::new(1), format!("L{n}"), 30, n)
            })
            .collect()
    }

    fn backend() -> InMemoryBackend {
        let backend = InMemoryBackend::new();
        backend.add_course(Course::new(CourseId::new(1), "Course"));
        for lesson in lessons() {
            backend.add_lesson(lesson);
        }
        backend.add_user(TOKEN, student());
        backend
    }

    fn view(viewer: Viewer) -> LessonView {
        let all = lessons();
        let lesson = all[0].clone();
        LessonView {
            gate: LessonGate::new(&lesson, all),
            lesson,
            course: None,
            saved: LessonProgress::default(),
            viewer,
        }
    }

    fn start(backend: &InMemoryBackend, viewer: Viewer) -> PlaybackSession {
        PlaybackSession::start(
            view(viewer),
            Arc::new(backend.clone()),
            Some(TOKEN.into()),
            fixed_clock(),
        )
    }

    #[test]
    #[should_panic]
    fn starting_outside_a_runtime_panics() {
        let _ = start(&backend(), Viewer::Signed(student()));
    }

    #[tokio::test]
    async fn crossing_threshold_persists_and_unlocks_next() {
        let backend = backend();
        let mut playback = start(&backend, Viewer::Signed(student()));
        assert!(!playback.next_enabled());

        playback.on_position(14.0);
        playback.advance_clock(Duration::seconds(6));
        let update = playback.on_position(15.0);
        assert!(update.newly_completed);
        playback.flush().await;

        assert!(playback.next_enabled());
        assert_eq!(
            playback.check_navigation(LessonId::new(2)),
            GateDecision::Allowed
        );
        let saved = backend.progress_of(UserId::new(1), LessonId::new(1)).unwrap();
        assert!(saved.is_completed);
        assert_eq!(saved.watched_duration, 30);
    }

    #[tokio::test]
    async fn writes_are_throttled() {
        let backend = backend();
        let mut playback = start(&backend, Viewer::Signed(student()));

        playback.on_position(1.0);
        playback.advance_clock(Duration::seconds(2));
        playback.on_position(3.0);
        playback.flush().await;
        assert_eq!(backend.call_count(Endpoint::SaveProgress), 1);

        playback.advance_clock(Duration::seconds(6));
        playback.on_position(9.0);
        playback.flush().await;
        assert_eq!(backend.call_count(Endpoint::SaveProgress), 2);
    }

    #[tokio::test]
    async fn failed_mark_complete_keeps_local_completion() {
        let backend = backend();
        backend.fail(Endpoint::MarkComplete);
        let mut playback = start(&backend, Viewer::Signed(student()));

        let update = playback.mark_complete();
        playback.flush().await;

        assert!(update.completed);
        assert_eq!(playback.percent(), Percent::FULL);
        assert!(playback.next_enabled());
        assert_eq!(backend.call_count(Endpoint::MarkComplete), 1);
    }

    #[tokio::test]
    async fn instructors_write_nothing_and_pass_the_gate() {
        let backend = backend();
        let instructor = Identity {
            role: Role::Instructor,
            ..student()
        };
        let mut playback = start(&backend, Viewer::Signed(instructor));

        playback.on_position(29.0);
        playback.on_ended();
        playback.flush().await;

        assert!(backend.calls().is_empty());
        assert_eq!(
            playback.check_navigation(LessonId::new(3)),
            GateDecision::Allowed
        );
    }

    #[tokio::test]
    async fn listeners_get_every_update() {
        let backend = backend();
        let mut playback = start(&backend, Viewer::Signed(student()));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = playback.subscribe(move |change| sink.lock().unwrap().push(change.percent));

        playback.on_position(3.0);
        playback.on_position(15.0);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].value(), 50.0);
    }
}
