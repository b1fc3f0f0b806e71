use lms_core::gate::LessonGate;
use lms_core::model::{Capability, Course, Lesson, LessonId, LessonProgress, Viewer};

use api::Remote;

use crate::error::LoadError;
use crate::fallback::{auth_first, public_first};
use crate::session::SessionContext;

/// Everything needed to show one lesson.
#[derive(Debug, Clone)]
pub struct LessonView {
    pub lesson: Lesson,
    /// `None` when the course could not be loaded; the lesson is still shown.
    pub course: Option<Course>,
    pub gate: LessonGate,
    /// Saved progress for the viewer; zero for untracked viewers.
    pub saved: LessonProgress,
    pub viewer: Viewer,
}

impl LessonView {
    #[must_use]
    pub fn course_title(&self) -> Option<&str> {
        self.course.as_ref().map(|course| course.title.as_str())
    }
}

/// Loads lessons together with their course context.
#[derive(Clone)]
pub struct LessonViewService {
    remote: Remote,
    session: SessionContext,
}

impl LessonViewService {
    #[must_use]
    pub fn new(remote: Remote, session: SessionContext) -> Self {
        Self { remote, session }
    }

    /// Load a lesson, its course and sibling lessons, and the viewer's saved
    /// progress.
    ///
    /// Only the lesson itself is required; the course, sibling list and
    /// progress fall back to empty values with a warning.
    ///
    /// # Errors
    ///
    /// Returns `LoadError` if the lesson cannot be fetched or has no course.
    pub async fn open(&self, id: LessonId) -> Result<LessonView, LoadError> {
        let token = self.session.token();
        let viewer = self.session.viewer();
        let lessons = &self.remote.lessons;

        let lesson = public_first(token.as_deref(), move |auth| lessons.lesson(id, auth))
            .await
            .map_err(|error| {
                tracing::warn!(lesson_id = %id, %error, "lesson load failed");
                LoadError::from_api(id, &error)
            })?;
        let course_id = lesson.course_id;

        let course = match public_first(token.as_deref(), move |auth| {
            lessons.course(course_id, auth)
        })
        .await
        {
            Ok(course) => Some(course),
            Err(error) => {
                tracing::warn!(course_id = %course_id, %error, "course load failed");
                None
            }
        };

        let siblings = match public_first(token.as_deref(), move |auth| {
            lessons.course_lessons(course_id, auth)
        })
        .await
        {
            Ok(list) => list,
            Err(error) => {
                tracing::warn!(course_id = %course_id, %error, "lesson list load failed");
                vec![lesson.clone()]
            }
        };

        let saved = if viewer.can(Capability::TrackProgress) {
            self.saved_progress(id, token.as_deref()).await
        } else {
            LessonProgress::default()
        };

        let mut gate = LessonGate::new(&lesson, siblings);
        gate.record(lesson.id, saved.is_completed);

        Ok(LessonView {
            lesson,
            course,
            gate,
            saved,
            viewer,
        })
    }

    async fn saved_progress(&self, id: LessonId, token: Option<&str>) -> LessonProgress {
        let progress = &self.remote.progress;
        match auth_first(token, move |auth| progress.progress(id, auth)).await {
            Ok(saved) => saved,
            Err(error) => {
                tracing::warn!(lesson_id = %id, %error, "progress read-back failed, starting from zero");
                LessonProgress::default()
            }
        }
    }
}
