use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use lms_core::model::{Course, Percent};

use api::CertificateApi;

use crate::notify::{Level, Notice, Notifier};

/// Delay between loading a fully completed course and congratulating the
/// viewer.
pub const CELEBRATION_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug)]
pub struct CompletionStatus {
    pub percent: Percent,
    /// Pending "course completed" notice, present when the course is done.
    pub celebration: Option<JoinHandle<()>>,
}

impl CompletionStatus {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.percent.is_full()
    }
}

/// Reads the server's course completion and congratulates on 100 %.
#[derive(Clone)]
pub struct CompletionAggregator {
    certificates: Arc<dyn CertificateApi>,
    notifier: Arc<dyn Notifier>,
    delay: Duration,
}

impl CompletionAggregator {
    #[must_use]
    pub fn new(certificates: Arc<dyn CertificateApi>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            certificates,
            notifier,
            delay: CELEBRATION_DELAY,
        }
    }

    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fetch the completion percentage for `course`.
    ///
    /// A failed lookup reads as 0 % and schedules nothing. Every call that
    /// sees 100 % schedules its own notice.
    pub async fn refresh(&self, course: &Course, token: Option<&str>) -> CompletionStatus {
        let percent = match self.certificates.completion(course.id, token).await {
            Ok(percent) => percent,
            Err(error) => {
                tracing::warn!(course_id = %course.id, %error, "completion lookup failed");
                Percent::ZERO
            }
        };

        let celebration = percent.is_full().then(|| self.celebrate(&course.title));
        CompletionStatus {
            percent,
            celebration,
        }
    }

    fn celebrate(&self, title: &str) -> JoinHandle<()> {
        let notifier = Arc::clone(&self.notifier);
        let delay = self.delay;
        let message = format!("Congratulations! You've completed \"{title}\" course!");
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            notifier.notify(Notice::new(Level::Success, "Course Completed!", message));
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::RecordingNotifier;
    use api::{Endpoint, InMemoryBackend};
    use lms_core::model::{CourseId, Identity, Role, UserId};

    fn setup(raw: f64) -> (InMemoryBackend, RecordingNotifier, CompletionAggregator, Course) {
        let backend = InMemoryBackend::new();
        let course = Course::new(CourseId::new(2), "Async Rust");
        backend.add_course(course.clone());
        backend.add_user(
            "tok",
            Identity {
                id: UserId::new(3),
                name: "Ada".into(),
                email: "ada@example.com".into(),
                role: Role::Student,
            },
        );
        backend.override_completion(course.id, raw);
        let notifier = RecordingNotifier::new();
        let aggregator = CompletionAggregator::new(
            Arc::new(backend.clone()),
            Arc::new(notifier.clone()),
        );
        (backend, notifier, aggregator, course)
    }

    #[tokio::test(start_paused = true)]
    async fn full_completion_notifies_after_delay() {
        let (_backend, notifier, aggregator, course) = setup(137.0);

        let status = aggregator.refresh(&course, Some("tok")).await;
        assert_eq!(status.percent, Percent::FULL);
        assert!(notifier.notices().is_empty());

        status.celebration.unwrap().await.unwrap();
        let notices = notifier.notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].title, "Course Completed!");
        assert_eq!(
            notices[0].message,
            "Congratulations! You've completed \"Async Rust\" course!"
        );
    }

    #[tokio::test]
    async fn partial_completion_schedules_nothing() {
        let (_backend, _notifier, aggregator, course) = setup(40.0);
        let status = aggregator.refresh(&course, Some("tok")).await;
        assert_eq!(status.percent.value(), 40.0);
        assert!(status.celebration.is_none());
    }

    #[tokio::test]
    async fn failed_lookup_reads_as_zero() {
        let (backend, _notifier, aggregator, course) = setup(100.0);
        backend.fail(Endpoint::Completion);
        let status = aggregator.refresh(&course, Some("tok")).await;
        assert_eq!(status.percent, Percent::ZERO);
        assert!(status.celebration.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn each_refresh_notifies_again() {
        let (_backend, notifier, aggregator, course) = setup(100.0);
        for _ in 0..2 {
            let status = aggregator.refresh(&course, Some("tok")).await;
            status.celebration.unwrap().await.unwrap();
        }
        assert_eq!(notifier.notices().len(), 2);
    }
}
