use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{NaiveDateTime, Utc};
use diesel::{prelude::*, PgConnection};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::{AuthenticatedUser, CompanyActor};
use crate::eligibility::{self, EligibilityReport};
use crate::error::{AppError, AppResult};
use crate::models::{Listing, NewListing};
use crate::schema::{companies, job_categories, listings};
use crate::state::AppState;
use crate::utils::json::{optional_text_change, reject_immutable, required_text_change};
use crate::utils::time::to_iso;

#[derive(Serialize)]
pub struct ListingResponse {
    pub id: Uuid,
    pub company_id: Uuid,
    pub category_id: Uuid,
    pub title: String,
    pub description: String,
    pub location: Option<String>,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Listing> for ListingResponse {
    fn from(listing: Listing) -> Self {
        Self {
            id: listing.id,
            company_id: listing.company_id,
            category_id: listing.category_id,
            title: listing.title,
            description: listing.description,
            location: listing.location,
            is_active: listing.is_active,
            created_at: to_iso(listing.created_at),
            updated_at: to_iso(listing.updated_at),
        }
    }
}

/// A listing as shown on the public board.
#[derive(Serialize)]
pub struct ListingCard {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub location: Option<String>,
    pub category_id: Uuid,
    pub category_name: String,
    pub company_id: Uuid,
    pub company_name: String,
    pub company_logo_url: Option<String>,
    pub company_website: Option<String>,
    pub created_at: String,
}

type ListingCardRow = (Listing, String, String, Option<String>, Option<String>);

impl From<ListingCardRow> for ListingCard {
    fn from((listing, category_name, company_name, logo, website): ListingCardRow) -> Self {
        Self {
            id: listing.id,
            title: listing.title,
            description: listing.description,
            location: listing.location,
            category_id: listing.category_id,
            category_name,
            company_id: listing.company_id,
            company_name,
            company_logo_url: logo,
            company_website: website,
            created_at: to_iso(listing.created_at),
        }
    }
}

#[derive(Deserialize)]
pub struct ListingQuery {
    pub category_id: Option<Uuid>,
}

pub async fn list_listings(
    State(state): State<AppState>,
    Query(query): Query<ListingQuery>,
) -> AppResult<Json<Vec<ListingCard>>> {
    let mut conn = state.db()?;

    let mut statement = listings::table
        .inner_join(companies::table)
        .inner_join(job_categories::table)
        .filter(listings::is_active.eq(true))
        .select((
            listings::all_columns,
            job_categories::name,
            companies::name,
            companies::logo_url,
            companies::website,
        ))
        .order(listings::created_at.desc())
        .into_boxed();

    if let Some(category_id) = query.category_id {
        statement = statement.filter(listings::category_id.eq(category_id));
    }

    let rows: Vec<ListingCardRow> = statement.load(&mut conn)?;
    Ok(Json(rows.into_iter().map(ListingCard::from).collect()))
}

pub async fn get_listing(
    State(state): State<AppState>,
    Path(listing_id): Path<Uuid>,
) -> AppResult<Json<ListingCard>> {
    let mut conn = state.db()?;
    let row: ListingCardRow = listings::table
        .inner_join(companies::table)
        .inner_join(job_categories::table)
        .filter(listings::id.eq(listing_id))
        .filter(listings::is_active.eq(true))
        .select((
            listings::all_columns,
            job_categories::name,
            companies::name,
            companies::logo_url,
            companies::website,
        ))
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| AppError::not_found_with("listing not found"))?;
    Ok(Json(row.into()))
}

fn ensure_category(conn: &mut PgConnection, category_id: Uuid) -> AppResult<()> {
    let exists = job_categories::table
        .find(category_id)
        .select(job_categories::id)
        .first::<Uuid>(conn)
        .optional()?
        .is_some();
    if exists {
        Ok(())
    } else {
        Err(AppError::bad_request("category not found"))
    }
}

/// Loads a listing and checks that `company_id` owns it.
pub(crate) fn load_owned_listing(
    conn: &mut PgConnection,
    company_id: Uuid,
    listing_id: Uuid,
) -> AppResult<Listing> {
    let listing = listings::table
        .find(listing_id)
        .first::<Listing>(conn)
        .optional()?
        .ok_or_else(|| AppError::not_found_with("listing not found"))?;
    if listing.company_id != company_id {
        warn!(
            listing_id = %listing_id,
            company_id = %company_id,
            "listing owned by another company"
        );
        return Err(AppError::forbidden("listing belongs to another company"));
    }
    Ok(listing)
}

#[derive(Deserialize)]
pub struct CreateListingRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub category_id: Option<Uuid>,
}

fn non_blank(value: Option<String>, field: &str) -> AppResult<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::bad_request(format!("{field} is required")))
}

pub async fn create_listing(
    State(state): State<AppState>,
    actor: CompanyActor,
    Json(payload): Json<CreateListingRequest>,
) -> AppResult<Json<ListingResponse>> {
    let title = non_blank(payload.title, "title")?;
    let description = non_blank(payload.description, "description")?;
    let category_id = payload
        .category_id
        .ok_or_else(|| AppError::bad_request("category_id is required"))?;
    let location = payload
        .location
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());

    let mut conn = state.db()?;
    ensure_category(&mut conn, category_id)?;

    let listing: Listing = diesel::insert_into(listings::table)
        .values(&NewListing {
            id: Uuid::new_v4(),
            company_id: actor.company.id,
            category_id,
            title,
            description,
            location,
            is_active: true,
        })
        .get_result(&mut conn)?;

    info!(listing_id = %listing.id, company_id = %actor.company.id, "listing created");
    Ok(Json(listing.into()))
}

#[derive(AsChangeset)]
#[diesel(table_name = listings)]
struct ListingChangeset {
    title: Option<String>,
    description: Option<String>,
    location: Option<Option<String>>,
    category_id: Option<Uuid>,
    updated_at: NaiveDateTime,
}

pub async fn update_listing(
    State(state): State<AppState>,
    actor: CompanyActor,
    Path(listing_id): Path<Uuid>,
    Json(body): Json<Value>,
) -> AppResult<Json<ListingResponse>> {
    reject_immutable(&body, &["company_id"])?;
    let category_id = match body.get("category_id") {
        None => None,
        Some(value) => {
            let raw = value
                .as_str()
                .ok_or_else(|| AppError::bad_request("category_id must be a UUID string"))?;
            let parsed = Uuid::parse_str(raw.trim())
                .map_err(|_| AppError::bad_request("category_id must be a valid UUID"))?;
            Some(parsed)
        }
    };
    let changes = ListingChangeset {
        title: required_text_change(&body, "title")?,
        description: required_text_change(&body, "description")?,
        location: optional_text_change(&body, "location")?,
        category_id,
        updated_at: Utc::now().naive_utc(),
    };

    let mut conn = state.db()?;
    load_owned_listing(&mut conn, actor.company.id, listing_id)?;
    if let Some(category_id) = changes.category_id {
        ensure_category(&mut conn, category_id)?;
    }

    let listing: Listing = diesel::update(listings::table.find(listing_id))
        .set(&changes)
        .get_result(&mut conn)?;

    info!(listing_id = %listing.id, "listing updated");
    Ok(Json(listing.into()))
}

#[derive(Deserialize)]
pub struct ActiveRequest {
    pub is_active: bool,
}

pub async fn set_listing_active(
    State(state): State<AppState>,
    actor: CompanyActor,
    Path(listing_id): Path<Uuid>,
    Json(payload): Json<ActiveRequest>,
) -> AppResult<Json<ListingResponse>> {
    let mut conn = state.db()?;
    load_owned_listing(&mut conn, actor.company.id, listing_id)?;

    let listing: Listing = diesel::update(listings::table.find(listing_id))
        .set((
            listings::is_active.eq(payload.is_active),
            listings::updated_at.eq(Utc::now().naive_utc()),
        ))
        .get_result(&mut conn)?;

    info!(listing_id = %listing.id, is_active = listing.is_active, "listing visibility changed");
    Ok(Json(listing.into()))
}

/// Whether the caller could apply to the listing right now.
pub async fn listing_eligibility(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(listing_id): Path<Uuid>,
) -> AppResult<Json<EligibilityReport>> {
    let mut conn = state.db()?;
    let report = eligibility::assess(&mut conn, user.user_id, listing_id)?;
    Ok(Json(report))
}
