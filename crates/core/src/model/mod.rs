mod certificate;
mod ids;
mod lesson;
mod progress;
mod role;

pub use certificate::{Certificate, CertificateEligibility, has_certificate_titled, latest_per_course};
pub use ids::{CertificateId, CourseId, LessonId, ParseIdError, UserId};
pub use lesson::{Course, Lesson, sort_by_order};
pub use progress::{CompletionThreshold, LONG_VIDEO_SECS, LessonProgress, Percent, ProgressReport};
pub use role::{Capability, Identity, Role, UnknownRoleError, Viewer};
