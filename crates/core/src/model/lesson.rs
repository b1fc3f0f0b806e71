use serde::{Deserialize, Serialize};

use crate::model::{CourseId, LessonId};

/// A single video lesson inside a course.
///
/// `order` is the lesson's ordinal within its course. Ordinals are compared,
/// never used as indexes, so gaps in the numbering are harmless.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    pub id: LessonId,
    pub course_id: CourseId,
    pub title: String,
    /// Recorded video length in whole seconds.
    pub video_duration: u32,
    #[serde(rename = "lessonOrder")]
    pub order: u32,
}

impl Lesson {
    #[must_use]
    pub fn new(
        id: LessonId,
        course_id: CourseId,
        title: impl Into<String>,
        video_duration: u32,
        order: u32,
    ) -> Self {
        Self {
            id,
            course_id,
            title: title.into(),
            video_duration,
            order,
        }
    }
}

/// Sort lessons by ordinal, keeping the backend order for equal ordinals.
pub fn sort_by_order(lessons: &mut [Lesson]) {
    lessons.sort_by_key(|lesson| lesson.order);
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: CourseId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub lesson_count: Option<u32>,
}

impl Course {
    #[must_use]
    pub fn new(id: CourseId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            description: None,
            lesson_count: None,
        }
    }
}
