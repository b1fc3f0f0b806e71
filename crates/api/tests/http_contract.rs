use api::{ApiConfig, CertificateApi, EnrollmentApi, HttpApi, LessonApi, ProgressApi};
use lms_core::model::{CourseId, LessonId, Percent, ProgressReport};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

async fn client(server: &MockServer) -> HttpApi {
    let config = ApiConfig::new(&format!("{}/api", server.uri())).unwrap();
    HttpApi::new(config).unwrap()
}

#[tokio::test]
async fn lesson_read_without_token_sends_no_authorization() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/lessons/7"))
        .and(|req: &Request| !req.headers.contains_key("authorization"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 7,
            "courseId": 3,
            "title": "Ownership",
            "videoDuration": 120,
            "lessonOrder": 2
        })))
        .expect(1)
        .mount(&server)
        .await;

    let lesson = client(&server)
        .await
        .lesson(LessonId::new(7), None)
        .await
        .unwrap();
    assert_eq!(lesson.course_id, CourseId::new(3));
    assert_eq!(lesson.order, 2);
    assert_eq!(lesson.video_duration, 120);
}

#[tokio::test]
async fn progress_report_carries_bearer_and_camel_case_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/video-progress"))
        .and(header("authorization", "Bearer tok"))
        .and(body_json(json!({"lessonId": 7, "watchedDuration": 42})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let report = ProgressReport {
        lesson_id: LessonId::new(7),
        watched_duration: 42,
    };
    client(&server)
        .await
        .save_progress(&report, Some("tok"))
        .await
        .unwrap();
}

#[tokio::test]
async fn completion_above_hundred_is_clamped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/certificates/completion/3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"completion": 137})))
        .mount(&server)
        .await;

    let completion = client(&server)
        .await
        .completion(CourseId::new(3), Some("tok"))
        .await
        .unwrap();
    assert_eq!(completion, Percent::FULL);
}

#[tokio::test]
async fn issue_rejection_exposes_server_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/certificates/issue/3"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"error": "Course not completed"})),
        )
        .mount(&server)
        .await;

    let err = client(&server)
        .await
        .issue(CourseId::new(3), Some("tok"))
        .await
        .unwrap_err();
    assert!(err.is_rejected());
    assert_eq!(err.server_message().as_deref(), Some("Course not completed"));
}

#[tokio::test]
async fn enroll_posts_course_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/enrollments/enroll"))
        .and(body_json(json!({"courseId": 3})))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    client(&server)
        .await
        .enroll(CourseId::new(3), Some("tok"))
        .await
        .unwrap();
}

#[tokio::test]
async fn accessibility_reads_flag_and_missing_lesson_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/lesson/8/accessibility"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"isAccessible": true})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/lessons/99"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let api = client(&server).await;
    assert!(api.accessibility(LessonId::new(8), Some("tok")).await.unwrap());
    assert!(api.lesson(LessonId::new(99), None).await.unwrap_err().is_not_found());
}
