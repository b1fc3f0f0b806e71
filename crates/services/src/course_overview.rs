//! Course page: lesson list with accessibility, completion and the
//! certificate claim.

use std::sync::Arc;

use futures::future::join_all;

use lms_core::flow::CertificateFlow;
use lms_core::model::{Certificate, Course, CourseId, Lesson, LessonId, Percent, sort_by_order};

use api::{ApiError, LessonApi, ProgressApi, Remote};

use crate::certificates::CertificateService;
use crate::completion::{CompletionAggregator, CompletionStatus};
use crate::enrollment::{EnrollOutcome, EnrollmentService};
use crate::error::{EnrollError, IssueError};
use crate::fallback::public_first;
use crate::notify::Notifier;
use crate::session::SessionContext;

/// Shown when a locked lesson is picked from the course page.
pub const LOCKED_LESSON_MESSAGE: &str = "Please complete the previous lesson to unlock this lesson.";

#[derive(Debug, Clone, PartialEq)]
pub struct LessonAccess {
    pub lesson: Lesson,
    pub accessible: bool,
    pub completed: bool,
}

#[derive(Debug)]
pub struct CoursePage {
    pub course: Course,
    /// Lessons in ordinal order.
    pub lessons: Vec<LessonAccess>,
    pub completion: CompletionStatus,
    pub certificate: CertificateFlow,
}

impl CoursePage {
    #[must_use]
    pub fn percent(&self) -> Percent {
        self.completion.percent
    }

    /// Whether `lesson` may be opened from this page.
    #[must_use]
    pub fn can_open(&self, lesson: LessonId) -> bool {
        self.lessons
            .iter()
            .any(|entry| entry.lesson.id == lesson && entry.accessible)
    }
}

#[derive(Clone)]
pub struct CourseOverviewService {
    lessons: Arc<dyn LessonApi>,
    progress: Arc<dyn ProgressApi>,
    session: SessionContext,
    completion: CompletionAggregator,
    certificates: CertificateService,
    enrollment: EnrollmentService,
}

impl CourseOverviewService {
    #[must_use]
    pub fn new(remote: &Remote, session: SessionContext, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            lessons: Arc::clone(&remote.lessons),
            progress: Arc::clone(&remote.progress),
            completion: CompletionAggregator::new(
                Arc::clone(&remote.certificates),
                Arc::clone(&notifier),
            ),
            certificates: CertificateService::new(
                Arc::clone(&remote.certificates),
                session.clone(),
                Arc::clone(&notifier),
            ),
            enrollment: EnrollmentService::new(
                Arc::clone(&remote.enrollments),
                session.clone(),
                notifier,
            ),
            session,
        }
    }

    #[must_use]
    pub fn with_completion(mut self, completion: CompletionAggregator) -> Self {
        self.completion = completion;
        self
    }

    /// Load the course page.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the course or its lesson list cannot be loaded.
    pub async fn open(&self, course_id: CourseId) -> Result<CoursePage, ApiError> {
        let token = self.session.token();
        let api = &self.lessons;

        let course =
            public_first(token.as_deref(), move |auth| api.course(course_id, auth)).await?;
        let mut lessons = public_first(token.as_deref(), move |auth| {
            api.course_lessons(course_id, auth)
        })
        .await?;
        sort_by_order(&mut lessons);

        let lessons = self.lesson_access(lessons).await;
        let mut page = CoursePage {
            course,
            lessons,
            completion: CompletionStatus {
                percent: Percent::ZERO,
                celebration: None,
            },
            certificate: CertificateFlow::new(),
        };
        self.refresh(&mut page).await;
        Ok(page)
    }

    /// Accessibility and completion for each lesson.
    ///
    /// Instructors and admins see every lesson open without any lookup.
    /// Everyone else, anonymous viewers included, gets two concurrent lookups
    /// per lesson, and a failed lookup reads as locked or not completed.
    pub async fn lesson_access(&self, lessons: Vec<Lesson>) -> Vec<LessonAccess> {
        if self.session.viewer().is_staff() {
            return lessons
                .into_iter()
                .map(|lesson| LessonAccess {
                    lesson,
                    accessible: true,
                    completed: false,
                })
                .collect();
        }

        let token = self.session.token();
        let lookups = lessons
            .into_iter()
            .map(|lesson| self.lookup(lesson, token.as_deref()));
        join_all(lookups).await
    }

    async fn lookup(&self, lesson: Lesson, token: Option<&str>) -> LessonAccess {
        let (accessible, progress) = tokio::join!(
            self.lessons.accessibility(lesson.id, token),
            self.progress.progress(lesson.id, token),
        );

        let accessible = accessible.unwrap_or_else(|error| {
            tracing::warn!(lesson_id = %lesson.id, %error, "accessibility lookup failed, treating as locked");
            false
        });
        let completed = progress.map(|p| p.is_completed).unwrap_or_else(|error| {
            tracing::warn!(lesson_id = %lesson.id, %error, "progress lookup failed, treating as incomplete");
            false
        });

        LessonAccess {
            lesson,
            accessible,
            completed,
        }
    }

    /// Enroll, then refresh completion and the certificate claim when the
    /// viewer ends up enrolled.
    ///
    /// # Errors
    ///
    /// Returns `EnrollError` as [`EnrollmentService::enroll`] does.
    pub async fn enroll(&self, page: &mut CoursePage) -> Result<EnrollOutcome, EnrollError> {
        let outcome = self.enrollment.enroll(&page.course).await?;
        self.refresh(page).await;
        Ok(outcome)
    }

    /// # Errors
    ///
    /// Returns `IssueError` as [`CertificateService::issue`] does.
    pub async fn claim(&self, page: &mut CoursePage) -> Result<Certificate, IssueError> {
        self.certificates
            .issue(&mut page.certificate, &page.course)
            .await
    }

    /// Re-read completion and certificate state. Nothing is read for
    /// instructors and admins.
    pub async fn refresh(&self, page: &mut CoursePage) {
        if self.session.viewer().is_staff() {
            return;
        }
        let token = self.session.token();
        page.completion = self.completion.refresh(&page.course, token.as_deref()).await;
        self.certificates
            .check(&mut page.certificate, &page.course)
            .await;
    }

    #[must_use]
    pub fn certificates(&self) -> &CertificateService {
        &self.certificates
    }
}
