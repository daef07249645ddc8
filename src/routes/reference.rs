use axum::{
    extract::{Query, State},
    Json,
};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::error;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::JobCategory;
use crate::school_lookup::SchoolReference;
use crate::schema::job_categories;
use crate::state::AppState;

#[derive(Serialize)]
pub struct CategoryResponse {
    pub id: Uuid,
    pub name: String,
}

pub async fn list_categories(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<CategoryResponse>>> {
    let mut conn = state.db()?;
    let rows: Vec<JobCategory> = job_categories::table
        .order(job_categories::name.asc())
        .load(&mut conn)?;
    Ok(Json(
        rows.into_iter()
            .map(|category| CategoryResponse {
                id: category.id,
                name: category.name,
            })
            .collect(),
    ))
}

#[derive(Deserialize)]
pub struct DirectoryQuery {
    pub q: Option<String>,
}

/// Proxies a school-name search to the national school directory.
pub async fn search_directory(
    State(state): State<AppState>,
    Query(query): Query<DirectoryQuery>,
) -> AppResult<Json<Vec<SchoolReference>>> {
    let term = query
        .q
        .as_deref()
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .ok_or_else(|| AppError::bad_request("query parameter q is required"))?;

    match state.school_directory.search(term).await {
        Ok(schools) => Ok(Json(schools)),
        Err(err) => {
            error!(error = ?err, query = %term, "school directory lookup failed");
            Err(AppError::internal("failed to search schools"))
        }
    }
}
