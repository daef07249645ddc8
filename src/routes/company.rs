use std::collections::HashMap;

use axum::{
    extract::{Multipart, Path, State},
    Json,
};
use chrono::{NaiveDateTime, Utc};
use diesel::{dsl::count_star, prelude::*};
use serde::Serialize;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::auth::CompanyActor;
use crate::error::AppResult;
use crate::models::{Application, Company, Listing};
use crate::roles::CompanyProfile;
use crate::routes::listings::{load_owned_listing, ListingResponse};
use crate::routes::uploads::{ensure_image, read_file_field};
use crate::schema::{applications, companies, listings, schools, students};
use crate::state::AppState;
use crate::storage::logo_key;
use crate::utils::json::{optional_text_change, required_text_change};
use crate::utils::time::to_iso;

pub async fn get_profile(actor: CompanyActor) -> Json<CompanyProfile> {
    Json(actor.company.into())
}

#[derive(AsChangeset)]
#[diesel(table_name = companies)]
struct CompanyChangeset {
    name: Option<String>,
    industry: Option<String>,
    website: Option<Option<String>>,
    address: Option<Option<String>>,
    logo_url: Option<Option<String>>,
    updated_at: NaiveDateTime,
}

pub async fn update_profile(
    State(state): State<AppState>,
    actor: CompanyActor,
    Json(body): Json<Value>,
) -> AppResult<Json<CompanyProfile>> {
    let changes = CompanyChangeset {
        name: required_text_change(&body, "name")?,
        industry: required_text_change(&body, "industry")?,
        website: optional_text_change(&body, "website")?,
        address: optional_text_change(&body, "address")?,
        logo_url: optional_text_change(&body, "logo_url")?,
        updated_at: Utc::now().naive_utc(),
    };

    let mut conn = state.db()?;
    let company: Company = diesel::update(companies::table.find(actor.company.id))
        .set(&changes)
        .get_result(&mut conn)?;

    info!(company_id = %company.id, "company profile updated");
    Ok(Json(company.into()))
}

pub async fn upload_logo(
    State(state): State<AppState>,
    actor: CompanyActor,
    mut multipart: Multipart,
) -> AppResult<Json<CompanyProfile>> {
    let file = read_file_field(&mut multipart, state.config.max_upload_bytes).await?;
    ensure_image(&file)?;

    let key = logo_key(actor.user.user_id, &file.file_name);
    let url = state
        .storage
        .upload(&key, file.bytes, Some(file.content_type))
        .await?;

    let mut conn = state.db()?;
    let company: Company = diesel::update(companies::table.find(actor.company.id))
        .set((
            companies::logo_url.eq(Some(url)),
            companies::updated_at.eq(Utc::now().naive_utc()),
        ))
        .get_result(&mut conn)?;

    info!(company_id = %company.id, key = %key, "company logo uploaded");
    Ok(Json(company.into()))
}

#[derive(Serialize)]
pub struct CompanyListing {
    #[serde(flatten)]
    pub listing: ListingResponse,
    pub applicant_count: i64,
}

/// All of the caller's listings, active or not, newest first.
pub async fn list_own_listings(
    State(state): State<AppState>,
    actor: CompanyActor,
) -> AppResult<Json<Vec<CompanyListing>>> {
    let mut conn = state.db()?;

    let rows: Vec<Listing> = listings::table
        .filter(listings::company_id.eq(actor.company.id))
        .order(listings::created_at.desc())
        .load(&mut conn)?;

    let ids: Vec<Uuid> = rows.iter().map(|listing| listing.id).collect();
    let counts: HashMap<Uuid, i64> = applications::table
        .filter(applications::listing_id.eq_any(ids))
        .group_by(applications::listing_id)
        .select((applications::listing_id, count_star()))
        .load::<(Uuid, i64)>(&mut conn)?
        .into_iter()
        .collect();

    let response = rows
        .into_iter()
        .map(|listing| {
            let applicant_count = counts.get(&listing.id).copied().unwrap_or(0);
            CompanyListing {
                listing: listing.into(),
                applicant_count,
            }
        })
        .collect();
    Ok(Json(response))
}

#[derive(Serialize)]
pub struct Applicant {
    pub application_id: Uuid,
    pub status: String,
    pub applied_at: String,
    pub student_id: Uuid,
    pub student_name: String,
    pub nisn: String,
    pub cv_url: Option<String>,
    pub portfolio_url: Option<String>,
    pub school_name: String,
}

type ApplicantRow = (
    Application,
    String,
    String,
    Option<String>,
    Option<String>,
    String,
);

/// Applicants to one of the caller's listings, oldest first.
pub async fn list_listing_applicants(
    State(state): State<AppState>,
    actor: CompanyActor,
    Path(listing_id): Path<Uuid>,
) -> AppResult<Json<Vec<Applicant>>> {
    let mut conn = state.db()?;
    load_owned_listing(&mut conn, actor.company.id, listing_id)?;

    let rows: Vec<ApplicantRow> = applications::table
        .inner_join(students::table.inner_join(schools::table))
        .filter(applications::listing_id.eq(listing_id))
        .order(applications::applied_at.asc())
        .select((
            applications::all_columns,
            students::full_name,
            students::nisn,
            students::cv_url,
            students::portfolio_url,
            schools::name,
        ))
        .load(&mut conn)?;

    let applicants = rows
        .into_iter()
        .map(
            |(application, student_name, nisn, cv_url, portfolio_url, school_name)| Applicant {
                application_id: application.id,
                status: application.status,
                applied_at: to_iso(application.applied_at),
                student_id: application.student_id,
                student_name,
                nisn,
                cv_url,
                portfolio_url,
                school_name,
            },
        )
        .collect();
    Ok(Json(applicants))
}
