use std::sync::Arc;

use lms_core::Clock;
use lms_core::model::LessonId;
use storage::sqlite::{SqliteSessionStore, normalize_sqlite_url};

use api::{ApiConfig, Remote};

use crate::certificates::CertificateService;
use crate::course_overview::CourseOverviewService;
use crate::error::{AppServicesError, LoadError};
use crate::lesson_view::{LessonView, LessonViewService};
use crate::notify::{Notifier, TracingNotifier};
use crate::playback::PlaybackSession;
use crate::session::SessionContext;

/// Assembles app-facing services around one session and one backend.
#[derive(Clone)]
pub struct AppServices {
    clock: Clock,
    session: SessionContext,
    remote: Remote,
    lesson_views: Arc<LessonViewService>,
    courses: Arc<CourseOverviewService>,
}

impl AppServices {
    #[must_use]
    pub fn new(
        session: SessionContext,
        remote: Remote,
        notifier: Arc<dyn Notifier>,
        clock: Clock,
    ) -> Self {
        let lesson_views = Arc::new(LessonViewService::new(remote.clone(), session.clone()));
        let courses = Arc::new(CourseOverviewService::new(
            &remote,
            session.clone(),
            notifier,
        ));
        Self {
            clock,
            session,
            remote,
            lesson_views,
            courses,
        }
    }

    /// Build services with the session persisted in `SQLite` and the backend
    /// reached over HTTP. Notices go to the log.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the session store cannot be opened or the
    /// HTTP client cannot be built.
    pub async fn new_sqlite(
        db_url: &str,
        api: ApiConfig,
        clock: Clock,
    ) -> Result<Self, AppServicesError> {
        let store = SqliteSessionStore::open(&normalize_sqlite_url(db_url)).await?;
        let session = SessionContext::load(Arc::new(store)).await?;
        let remote = Remote::http(api)?;
        Ok(Self::new(session, remote, Arc::new(TracingNotifier), clock))
    }

    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock
    }

    #[must_use]
    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    #[must_use]
    pub fn lesson_views(&self) -> Arc<LessonViewService> {
        Arc::clone(&self.lesson_views)
    }

    #[must_use]
    pub fn courses(&self) -> Arc<CourseOverviewService> {
        Arc::clone(&self.courses)
    }

    #[must_use]
    pub fn certificates(&self) -> &CertificateService {
        self.courses.certificates()
    }

    /// Load a lesson and start playing it. Playback writes run on a task of
    /// the calling runtime.
    ///
    /// # Errors
    ///
    /// Returns `LoadError` if the lesson cannot be opened.
    pub async fn play(&self, lesson: LessonId) -> Result<PlaybackSession, LoadError> {
        let view = self.lesson_views.open(lesson).await?;
        Ok(self.start_playback(view))
    }

    fn start_playback(&self, view: LessonView) -> PlaybackSession {
        PlaybackSession::start(
            view,
            Arc::clone(&self.remote.progress),
            self.session.token(),
            self.clock,
        )
    }
}
