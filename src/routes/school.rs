use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{NaiveDateTime, Utc};
use diesel::{dsl::count_star, prelude::*, PgConnection};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::SchoolActor;
use crate::error::{is_foreign_key_violation, is_unique_violation, AppError, AppResult};
use crate::models::{Major, NewMajor, School, Student};
use crate::roles::{SchoolProfile, StudentProfile};
use crate::routes::uploads::{ensure_image, read_file_field};
use crate::schema::{majors, schools, students};
use crate::state::AppState;
use crate::storage::logo_key;
use crate::utils::json::{optional_text_change, required_text_change};
use crate::utils::time::to_iso;
use crate::verification::VerificationStatus;

pub const ACCREDITATIONS: [&str; 5] = ["A", "B", "C", "PROSES", "BELUM"];
pub const LEVELS: [&str; 2] = ["SMK", "Perguruan Tinggi"];
const MIN_SEARCH_LENGTH: usize = 3;
const SEARCH_LIMIT: i64 = 5;

pub fn validate_npsn(raw: &str) -> AppResult<String> {
    let npsn = raw.trim();
    if npsn.len() == 8 && npsn.chars().all(|ch| ch.is_ascii_digit()) {
        Ok(npsn.to_string())
    } else {
        Err(AppError::bad_request("npsn must be exactly 8 digits"))
    }
}

pub fn validate_accreditation(raw: &str) -> AppResult<String> {
    let value = raw.trim().to_uppercase();
    if ACCREDITATIONS.contains(&value.as_str()) {
        Ok(value)
    } else {
        Err(AppError::bad_request(format!(
            "accreditation must be one of {}",
            ACCREDITATIONS.join(", ")
        )))
    }
}

pub fn validate_level(raw: &str) -> AppResult<String> {
    let value = raw.trim();
    LEVELS
        .iter()
        .find(|level| level.eq_ignore_ascii_case(value))
        .map(|level| level.to_string())
        .ok_or_else(|| {
            AppError::bad_request(format!("level must be one of {}", LEVELS.join(", ")))
        })
}

#[derive(Deserialize)]
pub struct SchoolSearchQuery {
    pub q: Option<String>,
}

#[derive(Serialize)]
pub struct SchoolSearchResult {
    pub id: Uuid,
    pub name: String,
    pub npsn: String,
    pub level: String,
}

/// Registered schools matching a name fragment, for the student sign-up form.
pub async fn search_schools(
    State(state): State<AppState>,
    Query(query): Query<SchoolSearchQuery>,
) -> AppResult<Json<Vec<SchoolSearchResult>>> {
    let term = query.q.unwrap_or_default();
    let term = term.trim();
    if term.chars().count() < MIN_SEARCH_LENGTH {
        return Ok(Json(Vec::new()));
    }

    let mut conn = state.db()?;
    let pattern = format!("%{}%", escape_like(term));
    let rows: Vec<School> = schools::table
        .filter(schools::name.ilike(pattern))
        .order(schools::name.asc())
        .limit(SEARCH_LIMIT)
        .load(&mut conn)?;

    Ok(Json(
        rows.into_iter()
            .map(|school| SchoolSearchResult {
                id: school.id,
                name: school.name,
                npsn: school.npsn,
                level: school.level,
            })
            .collect(),
    ))
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[derive(Serialize)]
pub struct MajorResponse {
    pub id: Uuid,
    pub school_id: Uuid,
    pub name: String,
    pub quota: i32,
    pub created_at: String,
}

impl From<Major> for MajorResponse {
    fn from(major: Major) -> Self {
        Self {
            id: major.id,
            school_id: major.school_id,
            name: major.name,
            quota: major.quota,
            created_at: to_iso(major.created_at),
        }
    }
}

fn load_majors(conn: &mut PgConnection, school_id: Uuid) -> AppResult<Vec<MajorResponse>> {
    let rows: Vec<Major> = majors::table
        .filter(majors::school_id.eq(school_id))
        .order(majors::name.asc())
        .load(conn)?;
    Ok(rows.into_iter().map(MajorResponse::from).collect())
}

pub async fn list_school_majors(
    State(state): State<AppState>,
    Path(school_id): Path<Uuid>,
) -> AppResult<Json<Vec<MajorResponse>>> {
    let mut conn = state.db()?;
    schools::table
        .find(school_id)
        .select(schools::id)
        .first::<Uuid>(&mut conn)?;
    Ok(Json(load_majors(&mut conn, school_id)?))
}

pub async fn get_profile(actor: SchoolActor) -> Json<SchoolProfile> {
    Json(actor.school.into())
}

#[derive(AsChangeset)]
#[diesel(table_name = schools)]
struct SchoolChangeset {
    name: Option<String>,
    npsn: Option<String>,
    address: Option<Option<String>>,
    accreditation: Option<String>,
    level: Option<String>,
    logo_url: Option<Option<String>>,
    updated_at: NaiveDateTime,
}

pub async fn update_profile(
    State(state): State<AppState>,
    actor: SchoolActor,
    Json(body): Json<Value>,
) -> AppResult<Json<SchoolProfile>> {
    let changes = SchoolChangeset {
        name: required_text_change(&body, "name")?,
        npsn: required_text_change(&body, "npsn")?
            .map(|value| validate_npsn(&value))
            .transpose()?,
        address: optional_text_change(&body, "address")?,
        accreditation: required_text_change(&body, "accreditation")?
            .map(|value| validate_accreditation(&value))
            .transpose()?,
        level: required_text_change(&body, "level")?
            .map(|value| validate_level(&value))
            .transpose()?,
        logo_url: optional_text_change(&body, "logo_url")?,
        updated_at: Utc::now().naive_utc(),
    };

    let mut conn = state.db()?;
    let school: School = match diesel::update(schools::table.find(actor.school.id))
        .set(&changes)
        .get_result(&mut conn)
    {
        Ok(school) => school,
        Err(err) if is_unique_violation(&err) => {
            return Err(AppError::conflict("npsn already registered"));
        }
        Err(err) => return Err(AppError::from(err)),
    };

    info!(school_id = %school.id, "school profile updated");
    Ok(Json(school.into()))
}

pub async fn upload_logo(
    State(state): State<AppState>,
    actor: SchoolActor,
    mut multipart: Multipart,
) -> AppResult<Json<SchoolProfile>> {
    let file = read_file_field(&mut multipart, state.config.max_upload_bytes).await?;
    ensure_image(&file)?;

    let key = logo_key(actor.user.user_id, &file.file_name);
    let url = state
        .storage
        .upload(&key, file.bytes, Some(file.content_type))
        .await?;

    let mut conn = state.db()?;
    let school: School = diesel::update(schools::table.find(actor.school.id))
        .set((
            schools::logo_url.eq(Some(url)),
            schools::updated_at.eq(Utc::now().naive_utc()),
        ))
        .get_result(&mut conn)?;

    info!(school_id = %school.id, key = %key, "school logo uploaded");
    Ok(Json(school.into()))
}

pub async fn list_majors(
    State(state): State<AppState>,
    actor: SchoolActor,
) -> AppResult<Json<Vec<MajorResponse>>> {
    let mut conn = state.db()?;
    Ok(Json(load_majors(&mut conn, actor.school.id)?))
}

#[derive(Deserialize)]
pub struct CreateMajorRequest {
    pub name: String,
    pub quota: i32,
}

fn validate_quota(quota: i64) -> AppResult<i32> {
    if quota <= 0 {
        return Err(AppError::bad_request("quota must be greater than zero"));
    }
    i32::try_from(quota).map_err(|_| AppError::bad_request("quota is too large"))
}

pub async fn create_major(
    State(state): State<AppState>,
    actor: SchoolActor,
    Json(payload): Json<CreateMajorRequest>,
) -> AppResult<(StatusCode, Json<MajorResponse>)> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("name must not be empty"));
    }
    let quota = validate_quota(i64::from(payload.quota))?;

    let mut conn = state.db()?;
    let new_major = NewMajor {
        id: Uuid::new_v4(),
        school_id: actor.school.id,
        name: name.to_string(),
        quota,
    };
    let major: Major = match diesel::insert_into(majors::table)
        .values(&new_major)
        .get_result(&mut conn)
    {
        Ok(major) => major,
        Err(err) if is_unique_violation(&err) => {
            return Err(AppError::conflict("major already exists"));
        }
        Err(err) => return Err(AppError::from(err)),
    };

    info!(school_id = %actor.school.id, major_id = %major.id, "major created");
    Ok((StatusCode::CREATED, Json(major.into())))
}

#[derive(AsChangeset)]
#[diesel(table_name = majors)]
struct MajorChangeset {
    name: Option<String>,
    quota: Option<i32>,
    updated_at: NaiveDateTime,
}

fn find_own_major(conn: &mut PgConnection, school_id: Uuid, major_id: Uuid) -> AppResult<Major> {
    majors::table
        .filter(majors::id.eq(major_id))
        .filter(majors::school_id.eq(school_id))
        .first::<Major>(conn)
        .optional()?
        .ok_or_else(|| AppError::not_found_with("major not found"))
}

pub async fn update_major(
    State(state): State<AppState>,
    actor: SchoolActor,
    Path(major_id): Path<Uuid>,
    Json(body): Json<Value>,
) -> AppResult<Json<MajorResponse>> {
    let quota = match body.get("quota") {
        None => None,
        Some(value) => {
            let raw = value
                .as_i64()
                .ok_or_else(|| AppError::bad_request("quota must be an integer"))?;
            Some(validate_quota(raw)?)
        }
    };
    let changes = MajorChangeset {
        name: required_text_change(&body, "name")?,
        quota,
        updated_at: Utc::now().naive_utc(),
    };

    let mut conn = state.db()?;
    find_own_major(&mut conn, actor.school.id, major_id)?;

    let major: Major = match diesel::update(majors::table.find(major_id))
        .set(&changes)
        .get_result(&mut conn)
    {
        Ok(major) => major,
        Err(err) if is_unique_violation(&err) => {
            return Err(AppError::conflict("major already exists"));
        }
        Err(err) => return Err(AppError::from(err)),
    };

    Ok(Json(major.into()))
}

pub async fn delete_major(
    State(state): State<AppState>,
    actor: SchoolActor,
    Path(major_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let mut conn = state.db()?;
    find_own_major(&mut conn, actor.school.id, major_id)?;

    match diesel::delete(majors::table.find(major_id)).execute(&mut conn) {
        Ok(_) => {}
        Err(err) if is_foreign_key_violation(&err) => {
            return Err(AppError::conflict("major still has registered students"));
        }
        Err(err) => return Err(AppError::from(err)),
    }

    info!(school_id = %actor.school.id, major_id = %major_id, "major deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct StudentListQuery {
    pub status: Option<String>,
}

#[derive(Serialize)]
pub struct StudentSummary {
    pub id: Uuid,
    pub full_name: String,
    pub nisn: String,
    pub major_id: Uuid,
    pub major_name: String,
    pub portfolio_url: Option<String>,
    pub cv_url: Option<String>,
    pub verification_status: String,
    pub registered_at: String,
}

/// Students registered under the caller's school, oldest first.
pub async fn list_students(
    State(state): State<AppState>,
    actor: SchoolActor,
    Query(query): Query<StudentListQuery>,
) -> AppResult<Json<Vec<StudentSummary>>> {
    let status = match query.status.as_deref().map(str::trim) {
        None | Some("") => VerificationStatus::Pending,
        Some(raw) => raw
            .parse::<VerificationStatus>()
            .map_err(|err| AppError::bad_request(err.to_string()))?,
    };

    let mut conn = state.db()?;
    let rows: Vec<(Student, String)> = students::table
        .inner_join(majors::table)
        .filter(students::school_id.eq(actor.school.id))
        .filter(students::verification_status.eq(status.as_str()))
        .order(students::created_at.asc())
        .select((students::all_columns, majors::name))
        .load(&mut conn)?;

    Ok(Json(
        rows.into_iter()
            .map(|(student, major_name)| StudentSummary {
                id: student.id,
                full_name: student.full_name,
                nisn: student.nisn,
                major_id: student.major_id,
                major_name,
                portfolio_url: student.portfolio_url,
                cv_url: student.cv_url,
                verification_status: student.verification_status,
                registered_at: to_iso(student.created_at),
            })
            .collect(),
    ))
}

#[derive(Serialize)]
pub struct SchoolStats {
    pub total_majors: i64,
    pub total_quota: i64,
    pub total_students: i64,
    pub verified_students: i64,
}

/// Dashboard counters for the caller's school.
pub async fn school_stats(
    State(state): State<AppState>,
    actor: SchoolActor,
) -> AppResult<Json<SchoolStats>> {
    let mut conn = state.db()?;

    let quotas: Vec<i32> = majors::table
        .filter(majors::school_id.eq(actor.school.id))
        .select(majors::quota)
        .load(&mut conn)?;
    let by_status: Vec<(String, i64)> = students::table
        .filter(students::school_id.eq(actor.school.id))
        .group_by(students::verification_status)
        .select((students::verification_status, count_star()))
        .load(&mut conn)?;

    let verified = VerificationStatus::VerifiedBySchool.as_str();
    Ok(Json(SchoolStats {
        total_majors: quotas.len() as i64,
        total_quota: quotas.iter().map(|quota| i64::from(*quota)).sum(),
        total_students: by_status.iter().map(|(_, count)| count).sum(),
        verified_students: by_status
            .iter()
            .filter(|(status, _)| status == verified)
            .map(|(_, count)| count)
            .sum(),
    }))
}

#[derive(Deserialize)]
pub struct VerificationRequest {
    pub status: String,
}

pub async fn set_verification(
    State(state): State<AppState>,
    actor: SchoolActor,
    Path(student_id): Path<Uuid>,
    Json(payload): Json<VerificationRequest>,
) -> AppResult<Json<StudentProfile>> {
    let target = payload
        .status
        .trim()
        .parse::<VerificationStatus>()
        .map_err(|err| AppError::bad_request(err.to_string()))?;

    let mut conn = state.db()?;
    let student: Student = students::table
        .filter(students::id.eq(student_id))
        .filter(students::school_id.eq(actor.school.id))
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| AppError::not_found_with("student not found"))?;

    let current = student
        .verification_status
        .parse::<VerificationStatus>()
        .map_err(AppError::internal)?;
    let next = current.transition_to(target).map_err(|err| {
        warn!(student_id = %student.id, from = %current, to = %target, "verification rejected");
        AppError::unprocessable(err.to_string())
    })?;

    let updated: Student = diesel::update(
        students::table
            .find(student.id)
            .filter(students::verification_status.eq(current.as_str())),
    )
    .set((
        students::verification_status.eq(next.as_str()),
        students::updated_at.eq(Utc::now().naive_utc()),
    ))
    .get_result(&mut conn)
    .optional()?
    .ok_or_else(|| {
        warn!(student_id = %student.id, to = %next, "verification changed concurrently");
        AppError::conflict("verification status was changed by another request")
    })?;

    info!(
        school_id = %actor.school.id,
        student_id = %updated.id,
        from = %current,
        to = %next,
        "student verification updated"
    );
    Ok(Json(updated.into()))
}
