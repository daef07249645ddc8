use axum::{
    extract::State,
    http::{header::SET_COOKIE, HeaderMap, HeaderValue, StatusCode},
    Json,
};
use axum_extra::{headers::Cookie, typed_header::TypedHeader};
use chrono::{Duration as ChronoDuration, Utc};
use diesel::{prelude::*, PgConnection};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::{password, AuthenticatedUser},
    error::{is_unique_violation, AppError, AppResult},
    models::{NewCompany, NewRefreshToken, NewSchool, NewStudent, NewUser, RefreshToken, User},
    roles::{Role, SessionProfile},
    routes::school::{validate_accreditation, validate_level, validate_npsn},
    schema::{companies, majors, refresh_tokens, schools, students, users::dsl},
    state::AppState,
    verification::VerificationStatus,
};

use crate::schema::refresh_tokens::dsl as refresh_dsl;

const REFRESH_COOKIE_NAME: &str = "refresh_token";

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    #[serde(flatten)]
    pub profile: RegistrationProfile,
}

/// Role-specific registration data, selected by the `role` field.
#[derive(Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum RegistrationProfile {
    Student {
        nisn: String,
        school_id: Uuid,
        major_id: Uuid,
    },
    SchoolAdmin {
        position: String,
        school_name: String,
        npsn: String,
        accreditation: String,
        level: String,
    },
    CompanyAdmin {
        position: String,
        company_name: String,
        industry: String,
        website: Option<String>,
    },
}

impl RegistrationProfile {
    fn role(&self) -> Role {
        match self {
            RegistrationProfile::Student { .. } => Role::Student,
            RegistrationProfile::SchoolAdmin { .. } => Role::SchoolAdmin,
            RegistrationProfile::CompanyAdmin { .. } => Role::CompanyAdmin,
        }
    }
}

#[derive(Serialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub role: Role,
}

#[derive(Serialize)]
pub struct MeResponse {
    pub user_id: Uuid,
    pub email: String,
    #[serde(flatten)]
    pub session: SessionProfile,
}

pub(crate) fn normalize_email(raw: &str) -> AppResult<String> {
    let email = raw.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty() && !domain.contains('@'),
        None => false,
    };
    if !valid {
        return Err(AppError::bad_request("a valid email address is required"));
    }
    Ok(email)
}

fn required(value: &str, field: &str) -> AppResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::bad_request(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<RegisterResponse>)> {
    let email = normalize_email(&payload.email)?;
    if payload.password.chars().count() < password::MIN_PASSWORD_LENGTH {
        return Err(AppError::bad_request(format!(
            "password must be at least {} characters",
            password::MIN_PASSWORD_LENGTH
        )));
    }
    let full_name = required(&payload.full_name, "full_name")?;
    let role = payload.profile.role();
    let password_hash = password::hash_password(&payload.password)?;

    let mut conn = state.db()?;
    let user_id = conn.transaction::<_, AppError, _>(|conn| {
        let new_user = NewUser {
            id: Uuid::new_v4(),
            email: email.clone(),
            password_hash,
            role: role.as_str().to_string(),
        };
        match diesel::insert_into(dsl::users).values(&new_user).execute(conn) {
            Ok(_) => {}
            Err(err) if is_unique_violation(&err) => {
                return Err(AppError::conflict("email already registered"));
            }
            Err(err) => return Err(AppError::from(err)),
        }
        create_profile(conn, new_user.id, &full_name, payload.profile)?;
        Ok(new_user.id)
    });

    let user_id = match user_id {
        Ok(id) => id,
        Err(err) => {
            warn!(email = %email, role = %role, error = %err, "registration rejected");
            return Err(err);
        }
    };

    info!(user_id = %user_id, role = %role, "account registered");
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user_id,
            email,
            role,
        }),
    ))
}

fn create_profile(
    conn: &mut PgConnection,
    user_id: Uuid,
    full_name: &str,
    profile: RegistrationProfile,
) -> AppResult<()> {
    match profile {
        RegistrationProfile::Student {
            nisn,
            school_id,
            major_id,
        } => {
            let nisn = required(&nisn, "nisn")?;
            let school_exists = schools::table
                .find(school_id)
                .select(schools::id)
                .first::<Uuid>(conn)
                .optional()?
                .is_some();
            if !school_exists {
                return Err(AppError::bad_request("school not found"));
            }
            let major_matches = majors::table
                .filter(majors::id.eq(major_id))
                .filter(majors::school_id.eq(school_id))
                .select(majors::id)
                .first::<Uuid>(conn)
                .optional()?
                .is_some();
            if !major_matches {
                return Err(AppError::bad_request("major does not belong to the school"));
            }

            diesel::insert_into(students::table)
                .values(&NewStudent {
                    id: Uuid::new_v4(),
                    user_id,
                    school_id,
                    major_id,
                    full_name: full_name.to_string(),
                    nisn,
                    verification_status: VerificationStatus::Pending.as_str().to_string(),
                })
                .execute(conn)?;
        }
        RegistrationProfile::SchoolAdmin {
            position,
            school_name,
            npsn,
            accreditation,
            level,
        } => {
            let new_school = NewSchool {
                id: Uuid::new_v4(),
                user_id,
                name: required(&school_name, "school_name")?,
                npsn: validate_npsn(&npsn)?,
                accreditation: validate_accreditation(&accreditation)?,
                level: validate_level(&level)?,
                pic_name: full_name.to_string(),
                pic_position: required(&position, "position")?,
            };
            match diesel::insert_into(schools::table)
                .values(&new_school)
                .execute(conn)
            {
                Ok(_) => {}
                Err(err) if is_unique_violation(&err) => {
                    return Err(AppError::conflict("npsn already registered"));
                }
                Err(err) => return Err(AppError::from(err)),
            }
        }
        RegistrationProfile::CompanyAdmin {
            position,
            company_name,
            industry,
            website,
        } => {
            let new_company = NewCompany {
                id: Uuid::new_v4(),
                user_id,
                name: required(&company_name, "company_name")?,
                industry: required(&industry, "industry")?,
                website: website
                    .map(|value| value.trim().to_string())
                    .filter(|value| !value.is_empty()),
                pic_name: full_name.to_string(),
                pic_position: required(&position, "position")?,
            };
            diesel::insert_into(companies::table)
                .values(&new_company)
                .execute(conn)?;
        }
    }
    Ok(())
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<(HeaderMap, Json<LoginResponse>)> {
    let mut conn = state.db()?;
    let email = payload.email.trim().to_lowercase();

    let user: User = dsl::users
        .filter(dsl::email.eq(&email))
        .first(&mut conn)
        .optional()?
        .ok_or_else(AppError::unauthorized)?;

    let valid = password::verify_password(&payload.password, &user.password_hash)
        .map_err(|_| AppError::unauthorized())?;

    if !valid {
        warn!(user_id = %user.id, "login rejected: bad password");
        return Err(AppError::unauthorized());
    }

    let role = parse_role(&user)?;
    let access_token = state.jwt.generate_token(user.id, &user.email, role)?;
    let cookie = issue_refresh_token(&state, &mut conn, user.id)?;

    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, cookie);

    Ok((
        headers,
        Json(LoginResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: state.config.jwt_expiry_minutes * 60,
            role,
        }),
    ))
}

pub async fn refresh(
    State(state): State<AppState>,
    jar: Option<TypedHeader<Cookie>>,
) -> AppResult<(HeaderMap, Json<LoginResponse>)> {
    let cookies = jar.ok_or_else(AppError::unauthorized)?;
    let refresh_value = cookies
        .get(REFRESH_COOKIE_NAME)
        .ok_or_else(AppError::unauthorized)?;

    let hashed = hash_refresh_token(refresh_value);
    let mut conn = state.db()?;
    let now_naive = Utc::now().naive_utc();

    let token = refresh_dsl::refresh_tokens
        .filter(refresh_dsl::token_hash.eq(&hashed))
        .filter(refresh_dsl::revoked_at.is_null())
        .filter(refresh_dsl::expires_at.gt(now_naive))
        .first::<RefreshToken>(&mut conn)
        .optional()?
        .ok_or_else(AppError::unauthorized)?;

    diesel::update(refresh_dsl::refresh_tokens.filter(refresh_dsl::id.eq(token.id)))
        .set((
            refresh_dsl::revoked_at.eq(now_naive),
            refresh_dsl::updated_at.eq(now_naive),
        ))
        .execute(&mut conn)?;

    let user: User = dsl::users.find(token.user_id).first(&mut conn)?;
    let role = parse_role(&user)?;
    let access_token = state.jwt.generate_token(user.id, &user.email, role)?;
    let cookie = issue_refresh_token(&state, &mut conn, user.id)?;

    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, cookie);

    Ok((
        headers,
        Json(LoginResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: state.config.jwt_expiry_minutes * 60,
            role,
        }),
    ))
}

pub async fn logout(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    jar: Option<TypedHeader<Cookie>>,
) -> AppResult<(HeaderMap, StatusCode)> {
    let mut conn = state.db()?;
    let now = Utc::now().naive_utc();
    let mut rows_affected = 0;

    if let Some(cookies) = jar {
        if let Some(value) = cookies.get(REFRESH_COOKIE_NAME) {
            let hashed = hash_refresh_token(value);
            rows_affected = diesel::update(
                refresh_dsl::refresh_tokens
                    .filter(refresh_dsl::token_hash.eq(hashed))
                    .filter(refresh_dsl::user_id.eq(user.user_id))
                    .filter(refresh_dsl::revoked_at.is_null()),
            )
            .set((
                refresh_dsl::revoked_at.eq(now),
                refresh_dsl::updated_at.eq(now),
            ))
            .execute(&mut conn)?;
        }
    }

    if rows_affected == 0 {
        diesel::update(
            refresh_dsl::refresh_tokens
                .filter(refresh_dsl::user_id.eq(user.user_id))
                .filter(refresh_dsl::revoked_at.is_null()),
        )
        .set((
            refresh_dsl::revoked_at.eq(now),
            refresh_dsl::updated_at.eq(now),
        ))
        .execute(&mut conn)?;
    }

    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, build_clear_refresh_cookie(&state)?);
    Ok((headers, StatusCode::NO_CONTENT))
}

pub async fn me(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<MeResponse>> {
    let mut conn = state.db()?;
    let session = user.resolve_profile(&mut conn)?;
    Ok(Json(MeResponse {
        user_id: user.user_id,
        email: user.email,
        session,
    }))
}

fn parse_role(user: &User) -> AppResult<Role> {
    user.role.parse::<Role>().map_err(AppError::internal)
}

fn issue_refresh_token(
    state: &AppState,
    conn: &mut PgConnection,
    user_id: Uuid,
) -> AppResult<HeaderValue> {
    let now = Utc::now();
    let refresh_value = generate_refresh_token();
    let refresh_expires_at = now + ChronoDuration::days(state.config.refresh_token_expiry_days);

    diesel::insert_into(refresh_tokens::table)
        .values(&NewRefreshToken {
            id: Uuid::new_v4(),
            user_id,
            token_hash: hash_refresh_token(&refresh_value),
            issued_at: now.naive_utc(),
            expires_at: refresh_expires_at.naive_utc(),
        })
        .execute(conn)?;

    build_refresh_cookie(state, &refresh_value, refresh_expires_at)
}

fn hash_refresh_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

fn generate_refresh_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn cookie_attributes(state: &AppState, parts: &mut Vec<String>) {
    parts.push("Path=/".into());
    parts.push("HttpOnly".into());
    parts.push("SameSite=Strict".into());
    if state.config.refresh_cookie_secure {
        parts.push("Secure".into());
    }
    if let Some(domain) = &state.config.refresh_cookie_domain {
        parts.push(format!("Domain={}", domain));
    }
}

fn build_refresh_cookie(
    state: &AppState,
    token: &str,
    expires_at: chrono::DateTime<Utc>,
) -> AppResult<HeaderValue> {
    let max_age = ChronoDuration::days(state.config.refresh_token_expiry_days).num_seconds();

    let mut parts = vec![format!("{}={}", REFRESH_COOKIE_NAME, token)];
    cookie_attributes(state, &mut parts);
    parts.push(format!("Max-Age={}", max_age));
    parts.push(format!("Expires={}", expires_at.to_rfc2822()));

    HeaderValue::from_str(&parts.join("; ")).map_err(AppError::internal)
}

fn build_clear_refresh_cookie(state: &AppState) -> AppResult<HeaderValue> {
    let mut parts = vec![format!("{}=", REFRESH_COOKIE_NAME)];
    cookie_attributes(state, &mut parts);
    parts.push("Max-Age=0".into());
    parts.push("Expires=Thu, 01 Jan 1970 00:00:00 GMT".into());

    HeaderValue::from_str(&parts.join("; ")).map_err(AppError::internal)
}
