//! Wire shapes that do not map one-to-one onto domain types.

use serde::{Deserialize, Serialize};

use lms_core::model::{CourseId, Lesson, LessonId, Percent};

use crate::error::ApiError;

/// Lesson as the backend sends it; several fields may be null.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonRecord {
    pub id: LessonId,
    #[serde(default)]
    pub course_id: Option<CourseId>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub video_duration: Option<u32>,
    #[serde(default)]
    pub lesson_order: Option<u32>,
}

impl LessonRecord {
    /// Convert into a domain `Lesson`.
    ///
    /// `course_hint` fills a missing course id when the record came from a
    /// per-course listing.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::MissingField` if no course id is known.
    pub fn into_lesson(self, course_hint: Option<CourseId>) -> Result<Lesson, ApiError> {
        let course_id = self
            .course_id
            .or(course_hint)
            .ok_or(ApiError::MissingField {
                entity: "lesson",
                field: "courseId",
            })?;
        Ok(Lesson::new(
            self.id,
            course_id,
            self.title.unwrap_or_default(),
            self.video_duration.unwrap_or(0),
            self.lesson_order.unwrap_or(0),
        ))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessibilityRecord {
    #[serde(default)]
    pub is_accessible: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CompletionRecord {
    #[serde(default)]
    pub completion: Percent,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollRequest {
    pub course_id: CourseId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_course_id_uses_hint_or_fails() {
        let record: LessonRecord =
            serde_json::from_str(r#"{"id":4,"title":"Intro","videoDuration":null}"#).unwrap();
        let lesson = record.clone().into_lesson(Some(CourseId::new(9))).unwrap();
        assert_eq!(lesson.course_id, CourseId::new(9));
        assert_eq!(lesson.video_duration, 0);

        let err = record.into_lesson(None).unwrap_err();
        assert!(matches!(err, ApiError::MissingField { field: "courseId", .. }));
    }

    #[test]
    fn completion_is_clamped_on_decode() {
        let record: CompletionRecord = serde_json::from_str(r#"{"completion":137}"#).unwrap();
        assert_eq!(record.completion, Percent::FULL);
    }
}
