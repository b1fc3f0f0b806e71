#![forbid(unsafe_code)]

pub mod app_services;
pub mod certificates;
pub mod completion;
pub mod course_overview;
pub mod enrollment;
pub mod error;
pub mod events;
pub mod fallback;
pub mod lesson_view;
pub mod notify;
pub mod playback;
pub mod session;

pub use lms_core::Clock;

pub use app_services::AppServices;
pub use certificates::CertificateService;
pub use completion::{CELEBRATION_DELAY, CompletionAggregator, CompletionStatus};
pub use course_overview::{CourseOverviewService, CoursePage, LOCKED_LESSON_MESSAGE, LessonAccess};
pub use enrollment::{EnrollOutcome, EnrollmentService};
pub use error::{AppServicesError, EnrollError, IssueError, LoadError, SessionError};
pub use events::{EventHub, Subscription};
pub use lesson_view::{LessonView, LessonViewService};
pub use notify::{Level, Notice, Notifier, RecordingNotifier, TracingNotifier};
pub use playback::{PlaybackSession, ProgressChange};
pub use session::SessionContext;
