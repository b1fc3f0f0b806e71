use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;

use lms_core::model::{
    Certificate, CertificateEligibility, Course, CourseId, Lesson, LessonId, LessonProgress,
    Percent, ProgressReport,
};

use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::records::{AccessibilityRecord, CompletionRecord, EnrollRequest, LessonRecord};
use crate::remote::{CertificateApi, EnrollmentApi, LessonApi, ProgressApi};

/// reqwest-backed client for the learning platform REST API.
#[derive(Clone)]
pub struct HttpApi {
    client: Client,
    config: ApiConfig,
}

impl HttpApi {
    /// # Errors
    ///
    /// Returns `ApiError::Transport` if the HTTP client cannot be built.
    pub fn new(config: ApiConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| ApiError::Transport(err.to_string()))?;
        Ok(Self { client, config })
    }

    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    fn request(&self, method: Method, path: &str, auth: Option<&str>) -> RequestBuilder {
        let builder = self.client.request(method, self.config.endpoint(path));
        match auth {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        auth: Option<&str>,
    ) -> Result<T, ApiError> {
        let response = self.request(Method::GET, path, auth).send().await?;
        decode(ensure_success(response).await?).await
    }

    async fn post_json<B, T>(&self, path: &str, body: &B, auth: Option<&str>) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let response = self
            .request(Method::POST, path, auth)
            .json(body)
            .send()
            .await?;
        decode(ensure_success(response).await?).await
    }

    /// POST whose response body is irrelevant to the caller.
    async fn post_ignoring_body<B>(
        &self,
        path: &str,
        body: &B,
        auth: Option<&str>,
    ) -> Result<(), ApiError>
    where
        B: Serialize + ?Sized + Sync,
    {
        let response = self
            .request(Method::POST, path, auth)
            .json(body)
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }
}

async fn ensure_success(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    tracing::debug!(status = status.as_u16(), body = %body, "backend rejected request");
    Err(ApiError::status(status.as_u16(), body))
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|err| ApiError::Decode(err.to_string()))
}

#[async_trait]
impl LessonApi for HttpApi {
    async fn lesson(&self, id: LessonId, auth: Option<&str>) -> Result<Lesson, ApiError> {
        let record: LessonRecord = self.get_json(&format!("/lessons/{id}"), auth).await?;
        record.into_lesson(None)
    }

    async fn course(&self, id: CourseId, auth: Option<&str>) -> Result<Course, ApiError> {
        self.get_json(&format!("/courses/{id}"), auth).await
    }

    async fn course_lessons(
        &self,
        course: CourseId,
        auth: Option<&str>,
    ) -> Result<Vec<Lesson>, ApiError> {
        let records: Vec<LessonRecord> = self
            .get_json(&format!("/courses/{course}/lessons"), auth)
            .await?;
        records
            .into_iter()
            .map(|record| record.into_lesson(Some(course)))
            .collect()
    }

    async fn accessibility(
        &self,
        lesson: LessonId,
        auth: Option<&str>,
    ) -> Result<bool, ApiError> {
        let record: AccessibilityRecord = self
            .get_json(&format!("/lesson/{lesson}/accessibility"), auth)
            .await?;
        Ok(record.is_accessible)
    }
}

#[async_trait]
impl ProgressApi for HttpApi {
    async fn progress(
        &self,
        lesson: LessonId,
        auth: Option<&str>,
    ) -> Result<LessonProgress, ApiError> {
        self.get_json(&format!("/video-progress/{lesson}"), auth)
            .await
    }

    async fn save_progress(
        &self,
        report: &ProgressReport,
        auth: Option<&str>,
    ) -> Result<(), ApiError> {
        self.post_ignoring_body("/video-progress", report, auth)
            .await
    }

    async fn mark_complete(&self, lesson: LessonId, auth: Option<&str>) -> Result<(), ApiError> {
        let empty = serde_json::Map::new();
        self.post_ignoring_body(&format!("/video-progress/{lesson}/complete"), &empty, auth)
            .await
    }
}

#[async_trait]
impl CertificateApi for HttpApi {
    async fn eligibility(
        &self,
        course: CourseId,
        auth: Option<&str>,
    ) -> Result<CertificateEligibility, ApiError> {
        self.get_json(&format!("/certificates/eligibility/{course}"), auth)
            .await
    }

    async fn completion(&self, course: CourseId, auth: Option<&str>) -> Result<Percent, ApiError> {
        let record: CompletionRecord = self
            .get_json(&format!("/certificates/completion/{course}"), auth)
            .await?;
        Ok(record.completion)
    }

    async fn issue(&self, course: CourseId, auth: Option<&str>) -> Result<Certificate, ApiError> {
        let empty = serde_json::Map::new();
        self.post_json(&format!("/certificates/issue/{course}"), &empty, auth)
            .await
    }

    async fn my_certificates(&self, auth: Option<&str>) -> Result<Vec<Certificate>, ApiError> {
        self.get_json("/certificates/my-certificates", auth).await
    }
}

#[async_trait]
impl EnrollmentApi for HttpApi {
    async fn enroll(&self, course: CourseId, auth: Option<&str>) -> Result<(), ApiError> {
        self.post_ignoring_body(
            "/enrollments/enroll",
            &EnrollRequest { course_id: course },
            auth,
        )
        .await
    }
}
