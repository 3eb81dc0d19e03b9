use axum::body::Body;
use axum::http::{header::CONTENT_TYPE, Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use super::common::*;
use crate::workflows::admissions::domain::ApplicationStatus;
use crate::workflows::admissions::lifecycle::ReviewDecision;
use crate::workflows::admissions::router::{failure_response, transition_handler};
use crate::workflows::admissions::{AdmissionsError, FieldErrors, STAFF_HEADER, STUDENT_HEADER};

fn submit_pending(portal: &Portal, username: &str) -> (String, String) {
    let student = register_student(&portal.store, username);
    let application = portal
        .service
        .submit(submission(
            student.id,
            &portal.catalog.tud,
            &portal.catalog.data_science,
        ))
        .expect("submitted");
    (student.id.to_string(), application.reference.to_string())
}

#[tokio::test]
async fn requests_without_identity_are_unauthorized() {
    let portal = build_portal();
    let response = portal
        .router()
        .oneshot(
            Request::get("/api/v1/applications")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = portal
        .router()
        .oneshot(
            Request::get("/api/v1/wizard")
                .header(STUDENT_HEADER, "not-a-uuid")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn wizard_is_for_students_only() {
    let portal = build_portal();
    let response = portal
        .router()
        .oneshot(
            Request::get("/api/v1/wizard")
                .header(STAFF_HEADER, "registrar")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn wizard_view_honours_entry_selectors() {
    let portal = build_portal();
    let student = register_student(&portal.store, "amira");
    let response = portal
        .router()
        .oneshot(
            Request::get("/api/v1/wizard?program=bba-business-administration")
                .header(STUDENT_HEADER, student.id.to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let payload = read_json_body(response).await;
    assert_eq!(payload["step"], 1);
    assert_eq!(payload["total_steps"], 2);
    assert_eq!(payload["application_type"], "undergraduate");
    assert_eq!(
        payload["values"]["program"],
        portal.catalog.business.id.to_string()
    );
}

#[tokio::test]
async fn invalid_wizard_step_returns_field_errors() {
    let portal = build_portal();
    let student = register_student(&portal.store, "amira");
    let body = json!({
        "action": "next",
        "form": {
            "step": "personal",
            "university": portal.catalog.tud.id.to_string(),
            "program": portal.catalog.business.id.to_string(),
            "gender": "unknown"
        }
    });

    let response = portal
        .router()
        .oneshot(
            Request::post("/api/v1/wizard")
                .header(STUDENT_HEADER, student.id.to_string())
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let payload = read_json_body(response).await;
    assert_eq!(payload["fields"]["phone"][0], "This field is required.");
    assert!(payload["fields"]["gender"].is_array());
    assert_eq!(payload["view"]["step"], 1);
}

#[tokio::test]
async fn completed_wizard_returns_created_application() {
    let portal = build_portal();
    let student = register_student(&portal.store, "amira");
    let router = portal.router();
    let post = |body: serde_json::Value| {
        Request::post("/api/v1/wizard")
            .header(STUDENT_HEADER, student.id.to_string())
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    };

    let mut personal = serde_json::to_value(personal_form(
        &portal.catalog.ufc,
        &portal.catalog.hospitality,
    ))
    .expect("form json");
    personal["step"] = json!("personal");
    let response = router
        .clone()
        .oneshot(post(json!({ "form": personal })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .oneshot(post(json!({ "form": { "step": "documents" } })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["reference"], "000001");
    assert_eq!(payload["status"], "pending");
    assert_eq!(payload["application_type"], "diploma");
    assert_eq!(payload["lead_quality"], "low");
}

#[tokio::test]
async fn students_cannot_post_status_changes() {
    let portal = build_portal();
    let (student, reference) = submit_pending(&portal, "amira");
    let response = portal
        .router()
        .oneshot(
            Request::post(format!("/api/v1/applications/{reference}/status"))
                .header(STUDENT_HEADER, student)
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(json!({ "status": "accepted" }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn staff_status_change_is_visible_in_detail() {
    let portal = build_portal();
    let (student, reference) = submit_pending(&portal, "amira");

    let response = portal
        .router()
        .oneshot(
            Request::post(format!("/api/v1/applications/{reference}/status"))
                .header(STAFF_HEADER, "registrar")
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({ "status": "under_review", "custom_status_message": "Interview booked" })
                        .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = portal
        .router()
        .oneshot(
            Request::get(format!("/api/v1/applications/{reference}"))
                .header(STUDENT_HEADER, student)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["display_message"], "Interview booked");
    assert_eq!(
        payload["logs"][1]["event"],
        "Status Changed: Pending → Under_Review"
    );
    assert_eq!(payload["logs"][1]["details"], "Interview booked");
}

#[tokio::test]
async fn backward_transition_conflicts() {
    let portal = build_portal();
    let (_, reference) = submit_pending(&portal, "amira");
    let state = portal.state();

    let response = transition_handler(
        axum::extract::State(state.clone()),
        staff_headers(),
        axum::extract::Path(reference.clone()),
        axum::Json(ReviewDecision {
            status: ApplicationStatus::Accepted,
            custom_status_message: None,
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = transition_handler(
        axum::extract::State(state),
        staff_headers(),
        axum::extract::Path(reference),
        axum::Json(ReviewDecision {
            status: ApplicationStatus::UnderReview,
            custom_status_message: None,
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let payload = read_json_body(response).await;
    assert!(payload["error"]
        .as_str()
        .is_some_and(|message| message.contains("accepted")));
}

#[tokio::test]
async fn unknown_or_malformed_references_are_not_found() {
    let portal = build_portal();
    for path in ["/api/v1/applications/999999", "/api/v1/applications/12ab"] {
        let response = portal
            .router()
            .oneshot(
                Request::get(path)
                    .header(STAFF_HEADER, "registrar")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{path}");
    }
}

#[tokio::test]
async fn pending_application_cannot_be_deleted() {
    let portal = build_portal();
    let (student, reference) = submit_pending(&portal, "amira");
    let response = portal
        .router()
        .oneshot(
            Request::delete(format!("/api/v1/applications/{reference}"))
                .header(STUDENT_HEADER, student)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn staff_export_csv_is_an_attachment() {
    let portal = build_portal();
    submit_pending(&portal, "amira");
    let response = portal
        .router()
        .oneshot(
            Request::get("/api/v1/applications/export.csv?status=pending")
                .header(STAFF_HEADER, "registrar")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[CONTENT_TYPE],
        "text/csv; charset=utf-8"
    );
    let body = read_text_body(response).await;
    assert!(body.lines().nth(1).is_some_and(|row| row.starts_with("000001,amira,TUD")));
}

#[tokio::test]
async fn summary_renders_plain_text_sections() {
    let portal = build_portal();
    let (student, reference) = submit_pending(&portal, "amira");

    let response = portal
        .router()
        .oneshot(
            Request::get(format!("/api/v1/applications/{reference}/summary"))
                .header(STUDENT_HEADER, student)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = portal
        .router()
        .oneshot(
            Request::get(format!("/api/v1/applications/{reference}/summary"))
                .header(STAFF_HEADER, "registrar")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let text = read_text_body(response).await;
    for section in [
        "APPLICATION FORM",
        "STUDENT INFORMATION",
        "PROGRAM INFORMATION",
        "DOCUMENTS SUBMITTED",
        "ENGLISH PROFICIENCY",
        "APPLICATION TIMELINE",
    ] {
        assert!(text.contains(section), "missing {section}");
    }
    assert!(text.contains("MSc Data Science"));
    assert!(!text.contains("REMARKS"));
}

#[tokio::test]
async fn purge_endpoint_supports_dry_run() {
    let portal = build_portal();
    let response = portal
        .router()
        .oneshot(
            Request::post("/api/v1/maintenance/expired-scores?dry_run=true")
                .header(STAFF_HEADER, "registrar")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["dry_run"], true);
    assert_eq!(payload["scores"], json!([]));
}

#[test]
fn validation_failures_carry_field_messages() {
    let response = failure_response(AdmissionsError::Validation(FieldErrors::single(
        "program",
        "Select a valid choice.",
    )));
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}
