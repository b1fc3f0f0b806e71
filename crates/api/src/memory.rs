//! In-process stand-in for the REST backend.
//!
//! Implements the same contracts as [`HttpApi`](crate::HttpApi) with the
//! server rules this client depends on (completion thresholds, sequential
//! accessibility, duplicate-certificate refusal) plus failure injection and a
//! call log for tests.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use lms_core::model::{
    Certificate, CertificateEligibility, CertificateId, CompletionThreshold, Course, CourseId,
    Identity, Lesson, LessonId, LessonProgress, Percent, ProgressReport, Role, UserId,
    sort_by_order,
};

use crate::error::ApiError;
use crate::remote::{CertificateApi, EnrollmentApi, LessonApi, ProgressApi};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Lesson,
    Course,
    CourseLessons,
    Accessibility,
    Progress,
    SaveProgress,
    MarkComplete,
    Eligibility,
    Completion,
    Issue,
    MyCertificates,
    Enroll,
}

/// One request as seen by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub endpoint: Endpoint,
    pub authenticated: bool,
}

#[derive(Default)]
struct State {
    courses: HashMap<CourseId, Course>,
    lessons: HashMap<LessonId, Lesson>,
    users: HashMap<String, Identity>,
    progress: HashMap<(UserId, LessonId), LessonProgress>,
    enrollments: HashSet<(UserId, CourseId)>,
    certificates: Vec<Certificate>,
    completion_overrides: HashMap<CourseId, f64>,
    failing: HashSet<Endpoint>,
    private_reads: bool,
    calls: Vec<Call>,
    next_certificate: u64,
}

#[derive(Clone, Default)]
pub struct InMemoryBackend {
    state: Arc<Mutex<State>>,
}

impl InMemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, ApiError> {
        self.state
            .lock()
            .map_err(|e| ApiError::Transport(e.to_string()))
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        let mut guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    // ─── Seeding ─────────────────────────────────────────────────────────────

    pub fn add_course(&self, course: Course) {
        self.with_state(|s| {
            s.courses.insert(course.id, course);
        });
    }

    pub fn add_lesson(&self, lesson: Lesson) {
        self.with_state(|s| {
            s.lessons.insert(lesson.id, lesson);
        });
    }

    /// Register a user reachable with `token`.
    pub fn add_user(&self, token: impl Into<String>, identity: Identity) {
        self.with_state(|s| {
            s.users.insert(token.into(), identity);
        });
    }

    pub fn enroll_user(&self, user: UserId, course: CourseId) {
        self.with_state(|s| {
            s.enrollments.insert((user, course));
        });
    }

    pub fn set_progress(&self, user: UserId, lesson: LessonId, progress: LessonProgress) {
        self.with_state(|s| {
            s.progress.insert((user, lesson), progress);
        });
    }

    pub fn insert_certificate(&self, certificate: Certificate) {
        self.with_state(|s| s.certificates.push(certificate));
    }

    /// Report `raw` as the course completion, unclamped, like a misbehaving
    /// server would.
    pub fn override_completion(&self, course: CourseId, raw: f64) {
        self.with_state(|s| {
            s.completion_overrides.insert(course, raw);
        });
    }

    /// Require a token for lesson and course reads.
    pub fn set_private_reads(&self, private: bool) {
        self.with_state(|s| s.private_reads = private);
    }

    /// Make every call to `endpoint` fail with a transport error.
    pub fn fail(&self, endpoint: Endpoint) {
        self.with_state(|s| {
            s.failing.insert(endpoint);
        });
    }

    // ─── Inspection ──────────────────────────────────────────────────────────

    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.with_state(|s| s.calls.clone())
    }

    #[must_use]
    pub fn call_count(&self, endpoint: Endpoint) -> usize {
        self.with_state(|s| s.calls.iter().filter(|c| c.endpoint == endpoint).count())
    }

    #[must_use]
    pub fn progress_of(&self, user: UserId, lesson: LessonId) -> Option<LessonProgress> {
        self.with_state(|s| s.progress.get(&(user, lesson)).cloned())
    }

    #[must_use]
    pub fn certificates_of(&self, user: UserId) -> Vec<Certificate> {
        self.with_state(|s| {
            s.certificates
                .iter()
                .filter(|c| c.student_id == Some(user))
                .cloned()
                .collect()
        })
    }

    #[must_use]
    pub fn is_enrolled(&self, user: UserId, course: CourseId) -> bool {
        self.with_state(|s| s.enrollments.contains(&(user, course)))
    }
}

// ─── Request plumbing ────────────────────────────────────────────────────────

impl State {
    fn begin(&mut self, endpoint: Endpoint, auth: Option<&str>) -> Result<(), ApiError> {
        self.calls.push(Call {
            endpoint,
            authenticated: auth.is_some(),
        });
        if self.failing.contains(&endpoint) {
            return Err(ApiError::Transport("connection refused".into()));
        }
        Ok(())
    }

    fn viewer(&self, auth: Option<&str>) -> Option<Identity> {
        auth.and_then(|token| self.users.get(token).cloned())
    }

    fn require_viewer(&self, auth: Option<&str>) -> Result<Identity, ApiError> {
        self.viewer(auth)
            .ok_or_else(|| ApiError::status(401, "Unauthorized"))
    }

    fn check_read(&self, auth: Option<&str>) -> Result<(), ApiError> {
        if self.private_reads {
            self.require_viewer(auth)?;
        }
        Ok(())
    }

    fn course_lessons(&self, course: CourseId) -> Vec<Lesson> {
        let mut lessons: Vec<Lesson> = self
            .lessons
            .values()
            .filter(|l| l.course_id == course)
            .cloned()
            .collect();
        sort_by_order(&mut lessons);
        lessons
    }

    fn is_completed(&self, user: UserId, lesson: LessonId) -> bool {
        self.progress
            .get(&(user, lesson))
            .is_some_and(|p| p.is_completed)
    }

    fn completion_raw(&self, user: UserId, course: CourseId) -> f64 {
        if let Some(raw) = self.completion_overrides.get(&course) {
            return *raw;
        }
        let lessons = self.course_lessons(course);
        if lessons.is_empty() {
            return 0.0;
        }
        let done = lessons
            .iter()
            .filter(|l| self.is_completed(user, l.id))
            .count();
        #[allow(clippy::cast_precision_loss)]
        let share = done as f64 / lessons.len() as f64;
        share * 100.0
    }
}

#[async_trait]
impl LessonApi for InMemoryBackend {
    async fn lesson(&self, id: LessonId, auth: Option<&str>) -> Result<Lesson, ApiError> {
        let mut s = self.lock()?;
        s.begin(Endpoint::Lesson, auth)?;
        s.check_read(auth)?;
        s.lessons
            .get(&id)
            .cloned()
            .ok_or_else(|| ApiError::status(404, "Lesson not found"))
    }

    async fn course(&self, id: CourseId, auth: Option<&str>) -> Result<Course, ApiError> {
        let mut s = self.lock()?;
        s.begin(Endpoint::Course, auth)?;
        s.check_read(auth)?;
        s.courses
            .get(&id)
            .cloned()
            .ok_or_else(|| ApiError::status(404, "Course not found"))
    }

    async fn course_lessons(
        &self,
        course: CourseId,
        auth: Option<&str>,
    ) -> Result<Vec<Lesson>, ApiError> {
        let mut s = self.lock()?;
        s.begin(Endpoint::CourseLessons, auth)?;
        s.check_read(auth)?;
        if !s.courses.contains_key(&course) {
            return Err(ApiError::status(404, "Course not found"));
        }
        // Reverse ordinal order so callers must sort for themselves.
        let mut lessons = s.course_lessons(course);
        lessons.reverse();
        Ok(lessons)
    }

    async fn accessibility(
        &self,
        lesson: LessonId,
        auth: Option<&str>,
    ) -> Result<bool, ApiError> {
        let mut s = self.lock()?;
        s.begin(Endpoint::Accessibility, auth)?;
        let viewer = s.require_viewer(auth)?;
        let Some(target) = s.lessons.get(&lesson).cloned() else {
            return Ok(false);
        };
        let lessons = s.course_lessons(target.course_id);
        let previous = lessons.iter().rev().find(|l| l.order < target.order);
        Ok(match previous {
            None => true,
            Some(prev) => s.is_completed(viewer.id, prev.id),
        })
    }
}

#[async_trait]
impl ProgressApi for InMemoryBackend {
    async fn progress(
        &self,
        lesson: LessonId,
        auth: Option<&str>,
    ) -> Result<LessonProgress, ApiError> {
        let mut s = self.lock()?;
        s.begin(Endpoint::Progress, auth)?;
        let viewer = s.require_viewer(auth)?;
        Ok(s.progress
            .get(&(viewer.id, lesson))
            .cloned()
            .unwrap_or_default())
    }

    async fn save_progress(
        &self,
        report: &ProgressReport,
        auth: Option<&str>,
    ) -> Result<(), ApiError> {
        let mut s = self.lock()?;
        s.begin(Endpoint::SaveProgress, auth)?;
        let viewer = s.require_viewer(auth)?;
        let lesson = s
            .lessons
            .get(&report.lesson_id)
            .cloned()
            .ok_or_else(|| ApiError::status(404, "Lesson not found"))?;

        let duration = f64::from(lesson.video_duration);
        let percent = Percent::of(f64::from(report.watched_duration), duration);
        let reached = CompletionThreshold::for_duration(duration).is_met(percent);
        let entry = s.progress.entry((viewer.id, lesson.id)).or_default();
        entry.watched_duration = report.watched_duration;
        entry.completion_percentage = percent;
        entry.is_completed |= reached;
        Ok(())
    }

    async fn mark_complete(&self, lesson: LessonId, auth: Option<&str>) -> Result<(), ApiError> {
        let mut s = self.lock()?;
        s.begin(Endpoint::MarkComplete, auth)?;
        let viewer = s.require_viewer(auth)?;
        let duration = s
            .lessons
            .get(&lesson)
            .map(|l| l.video_duration)
            .ok_or_else(|| ApiError::status(404, "Lesson not found"))?;
        let entry = s.progress.entry((viewer.id, lesson)).or_default();
        entry.watched_duration = duration;
        entry.completion_percentage = Percent::FULL;
        entry.is_completed = true;
        Ok(())
    }
}

#[async_trait]
impl CertificateApi for InMemoryBackend {
    async fn eligibility(
        &self,
        course: CourseId,
        auth: Option<&str>,
    ) -> Result<CertificateEligibility, ApiError> {
        let mut s = self.lock()?;
        s.begin(Endpoint::Eligibility, auth)?;
        let viewer = s.require_viewer(auth)?;
        let completion = Percent::clamped(s.completion_raw(viewer.id, course));
        Ok(CertificateEligibility {
            eligible: completion.is_full(),
            completion: Some(completion),
        })
    }

    async fn completion(&self, course: CourseId, auth: Option<&str>) -> Result<Percent, ApiError> {
        let mut s = self.lock()?;
        s.begin(Endpoint::Completion, auth)?;
        let viewer = s.require_viewer(auth)?;
        Ok(Percent::clamped(s.completion_raw(viewer.id, course)))
    }

    async fn issue(&self, course: CourseId, auth: Option<&str>) -> Result<Certificate, ApiError> {
        let mut s = self.lock()?;
        s.begin(Endpoint::Issue, auth)?;
        let viewer = s.require_viewer(auth)?;
        if viewer.role != Role::Student {
            return Err(ApiError::status(403, "Only students can receive certificates"));
        }
        let title = s
            .courses
            .get(&course)
            .map(|c| c.title.clone())
            .ok_or_else(|| ApiError::status(404, "Course not found"))?;
        if !Percent::clamped(s.completion_raw(viewer.id, course)).is_full() {
            return Err(ApiError::status(400, r#"{"error":"Course not completed yet"}"#));
        }
        let duplicate = s
            .certificates
            .iter()
            .any(|c| c.student_id == Some(viewer.id) && c.course_id == course);
        if duplicate {
            return Err(ApiError::status(
                400,
                r#"{"error":"Certificate already issued for this course"}"#,
            ));
        }

        s.next_certificate += 1;
        let id = s.next_certificate;
        let certificate = Certificate {
            id: CertificateId::new(id),
            student_id: Some(viewer.id),
            student_name: Some(viewer.name.clone()),
            course_id: course,
            course_title: title,
            issued_date: Some(Utc::now().format("%Y-%m-%dT%H:%M:%S").to_string()),
            certificate_number: format!("CERT-{course}-{id:06}"),
            certificate_url: None,
            completion_percentage: Some(Percent::FULL),
        };
        s.certificates.push(certificate.clone());
        Ok(certificate)
    }

    async fn my_certificates(&self, auth: Option<&str>) -> Result<Vec<Certificate>, ApiError> {
        let mut s = self.lock()?;
        s.begin(Endpoint::MyCertificates, auth)?;
        let viewer = s.require_viewer(auth)?;
        Ok(s.certificates
            .iter()
            .filter(|c| c.student_id == Some(viewer.id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl EnrollmentApi for InMemoryBackend {
    async fn enroll(&self, course: CourseId, auth: Option<&str>) -> Result<(), ApiError> {
        let mut s = self.lock()?;
        s.begin(Endpoint::Enroll, auth)?;
        let viewer = s.require_viewer(auth)?;
        if !s.courses.contains_key(&course) {
            return Err(ApiError::status(404, "Course not found"));
        }
        if !s.enrollments.insert((viewer.id, course)) {
            return Err(ApiError::status(400, "Already enrolled in this course"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: &str = "tok-student";

    fn seeded() -> InMemoryBackend {
        let backend = InMemoryBackend::new();
        let course = CourseId::new(1);
        backend.add_course(Course::new(course, "Rust"));
        for n in 1..=2_u32 {
            backend.add_lesson(Lesson::new(
                LessonId::new(u64::from(n)),
                course,
                format!("L{n}"),
                30,
                n,
            ));
        }
        backend.add_user(
            TOKEN,
            Identity {
                id: UserId::new(5),
                name: "Robin".into(),
                email: "robin@example.com".into(),
                role: Role::Student,
            },
        );
        backend
    }

    #[tokio::test]
    async fn save_progress_applies_server_threshold() {
        let backend = seeded();
        let report = ProgressReport {
            lesson_id: LessonId::new(1),
            watched_duration: 15,
        };
        backend.save_progress(&report, Some(TOKEN)).await.unwrap();
        let saved = backend.progress_of(UserId::new(5), LessonId::new(1)).unwrap();
        assert!(saved.is_completed);
        assert_eq!(saved.completion_percentage.value(), 50.0);
    }

    #[tokio::test]
    async fn second_lesson_unlocks_after_first_completes() {
        let backend = seeded();
        assert!(!backend.accessibility(LessonId::new(2), Some(TOKEN)).await.unwrap());
        backend.mark_complete(LessonId::new(1), Some(TOKEN)).await.unwrap();
        assert!(backend.accessibility(LessonId::new(2), Some(TOKEN)).await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_issue_is_rejected() {
        let backend = seeded();
        backend.override_completion(CourseId::new(1), 100.0);
        backend.issue(CourseId::new(1), Some(TOKEN)).await.unwrap();
        let err = backend.issue(CourseId::new(1), Some(TOKEN)).await.unwrap_err();
        assert!(err.is_rejected());
        assert_eq!(
            err.server_message().as_deref(),
            Some("Certificate already issued for this course")
        );
    }

    #[tokio::test]
    async fn injected_failures_are_logged_as_calls() {
        let backend = seeded();
        backend.fail(Endpoint::Lesson);
        assert!(backend.lesson(LessonId::new(1), None).await.is_err());
        assert_eq!(
            backend.calls(),
            vec![Call {
                endpoint: Endpoint::Lesson,
                authenticated: false
            }]
        );
    }
}
