use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use diesel::{prelude::*, PgConnection};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::{AuthenticatedUser, CompanyActor, StudentActor};
use crate::eligibility;
use crate::error::{AppError, AppResult};
use crate::models::{Application, Listing, Student};
use crate::pipeline::ApplicationStatus;
use crate::schema::{applications, companies, listings, schools, students};
use crate::state::AppState;
use crate::utils::time::to_iso;

#[derive(Deserialize)]
pub struct ApplyRequest {
    pub listing_id: Uuid,
}

#[derive(Serialize)]
pub struct ApplicationResponse {
    pub id: Uuid,
    pub student_id: Uuid,
    pub listing_id: Uuid,
    pub status: String,
    pub applied_at: String,
    pub updated_at: String,
}

impl From<Application> for ApplicationResponse {
    fn from(application: Application) -> Self {
        Self {
            id: application.id,
            student_id: application.student_id,
            listing_id: application.listing_id,
            status: application.status,
            applied_at: to_iso(application.applied_at),
            updated_at: to_iso(application.updated_at),
        }
    }
}

pub async fn submit_application(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<ApplyRequest>,
) -> AppResult<Json<ApplicationResponse>> {
    let mut conn = state.db()?;
    match eligibility::submit_application(&mut conn, user.user_id, payload.listing_id) {
        Ok(application) => {
            info!(
                application_id = %application.id,
                student_id = %application.student_id,
                listing_id = %application.listing_id,
                "application submitted"
            );
            Ok(Json(application.into()))
        }
        Err(err) => {
            warn!(
                user_id = %user.user_id,
                listing_id = %payload.listing_id,
                error = %err,
                "application rejected"
            );
            Err(err)
        }
    }
}

#[derive(Serialize)]
pub struct StudentApplication {
    pub id: Uuid,
    pub listing_id: Uuid,
    pub listing_title: String,
    pub company_name: String,
    pub company_logo_url: Option<String>,
    pub status: String,
    pub applied_at: String,
    pub updated_at: String,
}

/// The caller's own applications, newest first.
pub async fn list_my_applications(
    State(state): State<AppState>,
    actor: StudentActor,
) -> AppResult<Json<Vec<StudentApplication>>> {
    let mut conn = state.db()?;
    let rows: Vec<(Application, String, String, Option<String>)> = applications::table
        .inner_join(listings::table.inner_join(companies::table))
        .filter(applications::student_id.eq(actor.student.id))
        .order(applications::applied_at.desc())
        .select((
            applications::all_columns,
            listings::title,
            companies::name,
            companies::logo_url,
        ))
        .load(&mut conn)?;

    Ok(Json(
        rows.into_iter()
            .map(
                |(application, listing_title, company_name, company_logo_url)| {
                    StudentApplication {
                        id: application.id,
                        listing_id: application.listing_id,
                        listing_title,
                        company_name,
                        company_logo_url,
                        status: application.status,
                        applied_at: to_iso(application.applied_at),
                        updated_at: to_iso(application.updated_at),
                    }
                },
            )
            .collect(),
    ))
}

/// Loads an application only when it targets a listing of `company_id`.
fn load_company_application(
    conn: &mut PgConnection,
    company_id: Uuid,
    application_id: Uuid,
) -> AppResult<(Application, Listing)> {
    applications::table
        .inner_join(listings::table)
        .filter(applications::id.eq(application_id))
        .filter(listings::company_id.eq(company_id))
        .select((applications::all_columns, listings::all_columns))
        .first::<(Application, Listing)>(conn)
        .optional()?
        .ok_or_else(|| AppError::not_found_with("application not found"))
}

/// Writes `next` only while the row still holds `expected`. Returns `None`
/// when another request changed the status first.
fn write_status(
    conn: &mut PgConnection,
    application_id: Uuid,
    expected: ApplicationStatus,
    next: ApplicationStatus,
) -> AppResult<Option<Application>> {
    let updated = diesel::update(
        applications::table
            .find(application_id)
            .filter(applications::status.eq(expected.as_str())),
    )
    .set((
        applications::status.eq(next.as_str()),
        applications::updated_at.eq(Utc::now().naive_utc()),
    ))
    .get_result(conn)
    .optional()?;
    Ok(updated)
}

fn parse_status(application: &Application) -> AppResult<ApplicationStatus> {
    application
        .status
        .parse::<ApplicationStatus>()
        .map_err(AppError::internal)
}

#[derive(Serialize)]
pub struct ApplicationDetail {
    #[serde(flatten)]
    pub application: ApplicationResponse,
    pub listing_title: String,
    pub student_name: String,
    pub nisn: String,
    pub cv_url: Option<String>,
    pub portfolio_url: Option<String>,
    pub school_name: String,
}

/// Opens one application for the owning company. An `APPLIED` application
/// becomes `VIEWED`.
pub async fn get_company_application(
    State(state): State<AppState>,
    actor: CompanyActor,
    Path(application_id): Path<Uuid>,
) -> AppResult<Json<ApplicationDetail>> {
    let mut conn = state.db()?;
    let (mut application, listing) =
        load_company_application(&mut conn, actor.company.id, application_id)?;

    let current = parse_status(&application)?;
    let next = current.on_viewed();
    if next != current {
        match write_status(&mut conn, application.id, current, next)? {
            Some(updated) => {
                application = updated;
                info!(application_id = %application.id, "application marked as viewed");
            }
            // Moved on by a concurrent status change; show what is stored now.
            None => {
                application = applications::table.find(application.id).first(&mut conn)?;
            }
        }
    }

    let (student, school_name): (Student, String) = students::table
        .inner_join(schools::table)
        .filter(students::id.eq(application.student_id))
        .select((students::all_columns, schools::name))
        .first(&mut conn)?;

    Ok(Json(ApplicationDetail {
        application: application.into(),
        listing_title: listing.title,
        student_name: student.full_name,
        nisn: student.nisn,
        cv_url: student.cv_url,
        portfolio_url: student.portfolio_url,
        school_name,
    }))
}

#[derive(Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

pub async fn update_application_status(
    State(state): State<AppState>,
    actor: CompanyActor,
    Path(application_id): Path<Uuid>,
    Json(payload): Json<StatusRequest>,
) -> AppResult<Json<ApplicationResponse>> {
    let target = payload
        .status
        .trim()
        .parse::<ApplicationStatus>()
        .map_err(|err| AppError::bad_request(err.to_string()))?;

    let mut conn = state.db()?;
    let (application, _) = load_company_application(&mut conn, actor.company.id, application_id)?;
    let current = parse_status(&application)?;

    let next = current.transition_to(target).map_err(|err| {
        warn!(
            application_id = %application.id,
            from = %current,
            to = %target,
            "status change rejected"
        );
        AppError::unprocessable(err.to_string())
    })?;

    if next == current {
        return Ok(Json(application.into()));
    }

    let updated = write_status(&mut conn, application.id, current, next)?.ok_or_else(|| {
        warn!(application_id = %application.id, to = %next, "status changed concurrently");
        AppError::conflict("application status was changed by another request")
    })?;

    info!(
        application_id = %updated.id,
        company_id = %actor.company.id,
        from = %current,
        to = %next,
        "application status updated"
    );
    Ok(Json(updated.into()))
}
