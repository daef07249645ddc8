mod common;

use anyhow::Result;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use common::{acquire_db_lock, json_body, parse_id, SchoolFixture, StudentFixture, TestApp};
use serde_json::json;
use tower::util::ServiceExt;
use uuid::Uuid;

struct Pipeline {
    company: String,
    listing_id: Uuid,
    application_id: Uuid,
    #[allow(dead_code)]
    school: SchoolFixture,
    #[allow(dead_code)]
    student: StudentFixture,
}

async fn submitted_application(app: &TestApp) -> Result<Pipeline> {
    let school = app.seed_school("bkk@smkn1.sch.id", "20219172").await?;
    let student = app.seed_student("siti@example.com", &school).await?;
    let company = app.seed_company("hr@maju.co.id").await?;
    let listing_id = app.seed_listing(&company, "Magang Jaringan").await?;
    app.verify_student(&school, student.student_id).await?;
    app.set_cv_url(&student.token, "https://cdn.example.com/cv.pdf")
        .await?;

    let response = app
        .post_json(
            "/api/applications",
            &json!({ "listing_id": listing_id }),
            Some(&student.token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let application_id = parse_id(&json_body(response).await?["id"])?;

    Ok(Pipeline {
        company,
        listing_id,
        application_id,
        school,
        student,
    })
}

#[tokio::test]
async fn listing_creation_validates_input() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let company = app.seed_company("hr@maju.co.id").await?;
    let category_id = app.first_category_id().await?;

    let response = app
        .post_json(
            "/api/listings",
            &json!({ "description": "Tanpa judul", "category_id": category_id }),
            Some(&company),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .post_json(
            "/api/listings",
            &json!({
                "title": "Magang",
                "description": "Deskripsi",
                "category_id": Uuid::new_v4(),
            }),
            Some(&company),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .post_json(
            "/api/listings",
            &json!({ "title": "Magang", "description": "Deskripsi", "category_id": category_id }),
            None,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .post_json(
            "/api/listings",
            &json!({
                "title": "  Magang Desain ",
                "description": "Deskripsi",
                "category_id": category_id,
            }),
            Some(&company),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let created = json_body(response).await?;
    assert_eq!(created["title"], "Magang Desain");
    assert_eq!(created["is_active"], true);
    assert_eq!(app.count_rows("listings").await?, 1);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn only_the_owner_edits_and_toggles_a_listing() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let owner = app.seed_company("hr@maju.co.id").await?;
    let rival = app.seed_company("hr@saingan.co.id").await?;
    let listing_id = app.seed_listing(&owner, "Magang Backend").await?;

    let response = app
        .patch_json(
            &format!("/api/listings/{listing_id}"),
            &json!({ "title": "Diambil alih" }),
            Some(&rival),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .patch_json(
            &format!("/api/listings/{listing_id}"),
            &json!({ "title": "Magang Backend Rust", "location": null }),
            Some(&owner),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let updated = json_body(response).await?;
    assert_eq!(updated["title"], "Magang Backend Rust");
    assert_eq!(updated["location"], serde_json::Value::Null);

    let board = json_body(app.get("/api/listings", None).await?).await?;
    assert_eq!(board.as_array().map(Vec::len), Some(1));
    assert_eq!(board[0]["company_name"], "PT hr@maju.co.id");

    let response = app
        .patch_json(
            &format!("/api/listings/{listing_id}/active"),
            &json!({ "is_active": false }),
            Some(&owner),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let board = json_body(app.get("/api/listings", None).await?).await?;
    assert_eq!(board.as_array().map(Vec::len), Some(0));
    let response = app.get(&format!("/api/listings/{listing_id}"), None).await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Inactive listings stay visible to their owner.
    let own = json_body(app.get("/api/company/listings", Some(&owner)).await?).await?;
    assert_eq!(own[0]["is_active"], false);
    assert_eq!(own[0]["applicant_count"], 0);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn opening_an_application_marks_it_viewed() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let flow = submitted_application(&app).await?;

    let applicants = json_body(
        app.get(
            &format!("/api/company/listings/{}/applications", flow.listing_id),
            Some(&flow.company),
        )
        .await?,
    )
    .await?;
    assert_eq!(applicants[0]["student_name"], "Siti Aminah");
    assert_eq!(applicants[0]["school_name"], "SMK Negeri 20219172");
    assert_eq!(applicants[0]["status"], "APPLIED");

    let detail = json_body(
        app.get(
            &format!("/api/company/applications/{}", flow.application_id),
            Some(&flow.company),
        )
        .await?,
    )
    .await?;
    assert_eq!(detail["status"], "VIEWED");
    assert_eq!(detail["cv_url"], "https://cdn.example.com/cv.pdf");

    let own = json_body(app.get("/api/company/listings", Some(&flow.company)).await?).await?;
    assert_eq!(own[0]["applicant_count"], 1);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn pipeline_only_moves_forward() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let flow = submitted_application(&app).await?;
    let path = format!("/api/company/applications/{}/status", flow.application_id);

    let response = app
        .patch_json(&path, &json!({ "status": "INTERVIEW" }), Some(&flow.company))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await?["status"], "INTERVIEW");

    let response = app
        .patch_json(&path, &json!({ "status": "APPLIED" }), Some(&flow.company))
        .await?;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let response = app
        .patch_json(&path, &json!({ "status": "HIRED" }), Some(&flow.company))
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .patch_json(&path, &json!({ "status": "ACCEPTED" }), Some(&flow.company))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .patch_json(&path, &json!({ "status": "ACCEPTED" }), Some(&flow.company))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .patch_json(&path, &json!({ "status": "REJECTED" }), Some(&flow.company))
        .await?;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let rival = app.seed_company("hr@saingan.co.id").await?;
    let response = app
        .patch_json(&path, &json!({ "status": "REJECTED" }), Some(&rival))
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .get(
            &format!("/api/company/listings/{}/applications", flow.listing_id),
            Some(&rival),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    app.cleanup().await?;
    Ok(())
}

fn status_request(path: &str, token: &str, status: &str) -> Result<Request<Body>> {
    Ok(Request::builder()
        .method(Method::PATCH)
        .uri(path)
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {token}"))
        .body(Body::from(json!({ "status": status }).to_string()))?)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_outcomes_leave_a_single_winner() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let school = app.seed_school("bkk@smkn1.sch.id", "20219172").await?;
    let student = app.seed_student("siti@example.com", &school).await?;
    let company = app.seed_company("hr@maju.co.id").await?;
    app.verify_student(&school, student.student_id).await?;
    app.set_cv_url(&student.token, "https://cdn.example.com/cv.pdf")
        .await?;

    for round in 0..10 {
        let listing_id = app
            .seed_listing(&company, &format!("Magang Gelombang {round}"))
            .await?;
        let response = app
            .post_json(
                "/api/applications",
                &json!({ "listing_id": listing_id }),
                Some(&student.token),
            )
            .await?;
        let application_id = parse_id(&json_body(response).await?["id"])?;
        let path = format!("/api/company/applications/{application_id}/status");

        let response = app
            .patch_json(&path, &json!({ "status": "INTERVIEW" }), Some(&company))
            .await?;
        assert_eq!(response.status(), StatusCode::OK);

        let accept = tokio::spawn(
            app.router()
                .oneshot(status_request(&path, &company, "ACCEPTED")?),
        );
        let reject = tokio::spawn(
            app.router()
                .oneshot(status_request(&path, &company, "REJECTED")?),
        );
        let (accept, reject) = tokio::join!(accept, reject);
        let accept = accept?.expect("infallible response");
        let reject = reject?.expect("infallible response");

        let statuses = [accept.status(), reject.status()];
        let winners = statuses.iter().filter(|status| **status == StatusCode::OK).count();
        assert_eq!(winners, 1, "round {round}: {statuses:?}");
        for status in statuses {
            assert!(
                [StatusCode::OK, StatusCode::CONFLICT, StatusCode::UNPROCESSABLE_ENTITY]
                    .contains(&status),
                "round {round}: unexpected {status}"
            );
        }

        let expected = if accept.status() == StatusCode::OK {
            "ACCEPTED"
        } else {
            "REJECTED"
        };
        let stored = json_body(
            app.get(
                &format!("/api/company/applications/{application_id}"),
                Some(&company),
            )
            .await?,
        )
        .await?;
        assert_eq!(stored["status"], expected, "round {round}");
    }

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn company_profile_and_logo() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let company = app.seed_company("hr@maju.co.id").await?;

    let response = app
        .patch_json(
            "/api/company/profile",
            &json!({ "name": "PT Maju Jaya", "address": "Jl. Asia Afrika 8", "website": null }),
            Some(&company),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let profile = json_body(response).await?;
    assert_eq!(profile["name"], "PT Maju Jaya");
    assert_eq!(profile["industry"], "Teknologi Informasi");
    assert_eq!(profile["address"], "Jl. Asia Afrika 8");
    assert_eq!(profile["website"], serde_json::Value::Null);

    let response = app
        .patch_json("/api/company/profile", &json!({ "name": "  " }), Some(&company))
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .upload_file(
            "/api/company/profile/logo",
            "profil.pdf",
            "application/pdf",
            b"%PDF-1.4",
            &company,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .upload_file(
            "/api/company/profile/logo",
            "logo.png",
            "image/png",
            b"\x89PNG\r\n",
            &company,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let profile = json_body(response).await?;
    let logo_url = profile["logo_url"].as_str().unwrap_or_default().to_string();
    assert!(logo_url.starts_with("https://fake-storage/logos/"));
    assert!(logo_url.ends_with("/logo.png"));
    assert_eq!(app.storage().object_count().await, 1);

    let board_card = json_body(app.get("/api/company/profile", Some(&company)).await?).await?;
    assert_eq!(board_card["logo_url"], json!(logo_url));

    app.cleanup().await?;
    Ok(())
}
