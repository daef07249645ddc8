pub mod jwt;
pub mod password;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::headers::{authorization::Bearer, Authorization};
use axum_extra::TypedHeader;
use diesel::{prelude::*, PgConnection};
use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, AppResult},
    models::{Company, School, Student},
    roles::{Role, SessionProfile},
    schema::{companies, schools, students},
    state::AppState,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub user_id: uuid::Uuid,
    pub email: String,
    pub role: Role,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| AppError::unauthorized())?;

        let claims = state
            .jwt
            .verify_token(bearer.token())
            .map_err(|_| AppError::unauthorized())?;

        Ok(AuthenticatedUser {
            user_id: claims.sub,
            email: claims.email,
            role: claims.role,
        })
    }
}

impl AuthenticatedUser {
    /// Loads the role profile belonging to this identity.
    pub fn resolve_profile(&self, conn: &mut PgConnection) -> AppResult<SessionProfile> {
        let profile = match self.role {
            Role::Student => students::table
                .filter(students::user_id.eq(self.user_id))
                .first::<Student>(conn)
                .optional()?
                .map(|row| SessionProfile::Student(row.into())),
            Role::SchoolAdmin => schools::table
                .filter(schools::user_id.eq(self.user_id))
                .first::<School>(conn)
                .optional()?
                .map(|row| SessionProfile::SchoolAdmin(row.into())),
            Role::CompanyAdmin => companies::table
                .filter(companies::user_id.eq(self.user_id))
                .first::<Company>(conn)
                .optional()?
                .map(|row| SessionProfile::CompanyAdmin(row.into())),
        };
        profile.ok_or_else(|| AppError::not_found_with("profile not found"))
    }
}

/// A caller that owns a student profile.
#[derive(Debug, Clone)]
pub struct StudentActor {
    pub user: AuthenticatedUser,
    pub student: Student,
}

/// A caller that administers a school.
#[derive(Debug, Clone)]
pub struct SchoolActor {
    pub user: AuthenticatedUser,
    pub school: School,
}

/// A caller that administers a company.
#[derive(Debug, Clone)]
pub struct CompanyActor {
    pub user: AuthenticatedUser,
    pub company: Company,
}

#[async_trait]
impl FromRequestParts<AppState> for StudentActor {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthenticatedUser::from_request_parts(parts, state).await?;
        let mut conn = state.db()?;
        let student = students::table
            .filter(students::user_id.eq(user.user_id))
            .first::<Student>(&mut conn)
            .optional()?
            .ok_or_else(|| AppError::not_found_with("student profile not found"))?;
        Ok(Self { user, student })
    }
}

#[async_trait]
impl FromRequestParts<AppState> for SchoolActor {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthenticatedUser::from_request_parts(parts, state).await?;
        let mut conn = state.db()?;
        let school = schools::table
            .filter(schools::user_id.eq(user.user_id))
            .first::<School>(&mut conn)
            .optional()?
            .ok_or_else(|| AppError::not_found_with("school profile not found"))?;
        Ok(Self { user, school })
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CompanyActor {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthenticatedUser::from_request_parts(parts, state).await?;
        let mut conn = state.db()?;
        let company = companies::table
            .filter(companies::user_id.eq(user.user_id))
            .first::<Company>(&mut conn)
            .optional()?
            .ok_or_else(|| AppError::not_found_with("company profile not found"))?;
        Ok(Self { user, company })
    }
}
