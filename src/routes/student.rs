use axum::{
    extract::{Multipart, State},
    Json,
};
use chrono::{NaiveDateTime, Utc};
use diesel::{prelude::*, PgConnection};
use serde::Serialize;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::auth::StudentActor;
use crate::error::{AppError, AppResult};
use crate::models::Student;
use crate::roles::StudentProfile;
use crate::routes::uploads::{ensure_pdf, read_file_field};
use crate::schema::{majors, schools, students};
use crate::state::AppState;
use crate::storage::cv_key;
use crate::utils::json::{optional_text_change, reject_immutable, required_text_change};

#[derive(Serialize)]
pub struct StudentProfileResponse {
    #[serde(flatten)]
    pub profile: StudentProfile,
    pub school_name: String,
    pub major_name: String,
}

fn profile_response(
    conn: &mut PgConnection,
    student: Student,
) -> AppResult<StudentProfileResponse> {
    let school_name: String = schools::table
        .find(student.school_id)
        .select(schools::name)
        .first(conn)?;
    let major_name: String = majors::table
        .find(student.major_id)
        .select(majors::name)
        .first(conn)?;
    Ok(StudentProfileResponse {
        profile: student.into(),
        school_name,
        major_name,
    })
}

pub async fn get_profile(
    State(state): State<AppState>,
    actor: StudentActor,
) -> AppResult<Json<StudentProfileResponse>> {
    let mut conn = state.db()?;
    Ok(Json(profile_response(&mut conn, actor.student)?))
}

#[derive(AsChangeset)]
#[diesel(table_name = students)]
struct StudentChangeset {
    full_name: Option<String>,
    nisn: Option<String>,
    portfolio_url: Option<Option<String>>,
    updated_at: NaiveDateTime,
}

/// School, major and verification status are not editable by the student.
pub async fn update_profile(
    State(state): State<AppState>,
    actor: StudentActor,
    Json(body): Json<Value>,
) -> AppResult<Json<StudentProfileResponse>> {
    reject_immutable(
        &body,
        &["school_id", "major_id", "verification_status", "cv_url"],
    )?;
    let changes = StudentChangeset {
        full_name: required_text_change(&body, "full_name")?,
        nisn: required_text_change(&body, "nisn")?,
        portfolio_url: optional_text_change(&body, "portfolio_url")?,
        updated_at: Utc::now().naive_utc(),
    };

    let mut conn = state.db()?;
    let student: Student = diesel::update(students::table.find(actor.student.id))
        .set(&changes)
        .get_result(&mut conn)?;

    info!(student_id = %student.id, "student profile updated");
    Ok(Json(profile_response(&mut conn, student)?))
}

fn store_cv_url(conn: &mut PgConnection, student_id: Uuid, url: String) -> AppResult<Student> {
    Ok(diesel::update(students::table.find(student_id))
        .set((
            students::cv_url.eq(Some(url)),
            students::updated_at.eq(Utc::now().naive_utc()),
        ))
        .get_result(conn)?)
}

pub async fn upload_cv(
    State(state): State<AppState>,
    actor: StudentActor,
    mut multipart: Multipart,
) -> AppResult<Json<StudentProfileResponse>> {
    let file = read_file_field(&mut multipart, state.config.max_upload_bytes).await?;
    ensure_pdf(&file)?;

    let key = cv_key(actor.user.user_id, &file.file_name);
    let size = file.bytes.len();
    let url = state
        .storage
        .upload(&key, file.bytes, Some(file.content_type))
        .await?;

    let mut conn = state.db()?;
    let student = store_cv_url(&mut conn, actor.student.id, url)?;

    info!(student_id = %student.id, key = %key, size, "cv uploaded");
    Ok(Json(profile_response(&mut conn, student)?))
}

pub async fn set_cv_url(
    State(state): State<AppState>,
    actor: StudentActor,
    Json(body): Json<Value>,
) -> AppResult<Json<StudentProfileResponse>> {
    let url = body
        .get("cv_url")
        .and_then(Value::as_str)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::bad_request("cv_url must be a non-empty string"))?;

    let mut conn = state.db()?;
    let student = store_cv_url(&mut conn, actor.student.id, url)?;

    info!(student_id = %student.id, "cv url updated");
    Ok(Json(profile_response(&mut conn, student)?))
}
