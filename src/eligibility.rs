//! Authorization of student applications to listings.
//!
//! Every submission is evaluated against freshly loaded rows, in this order:
//! the caller must own a student profile, be verified by their school, have a
//! CV on file, and target an existing active listing. The unique
//! `(student_id, listing_id)` constraint turns a repeated or concurrent
//! submission into `AlreadyApplied`.

use axum::http::StatusCode;
use chrono::Utc;
use diesel::prelude::*;
use diesel::PgConnection;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::error::{is_unique_violation, AppError, AppResult};
use crate::models::{Application, Listing, NewApplication, Student};
use crate::pipeline::ApplicationStatus;
use crate::schema::{applications, listings, students};
use crate::verification::VerificationStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EligibilityError {
    #[error("student profile not found")]
    StudentNotFound,
    #[error("account must be verified by school before applying")]
    NotVerified,
    #[error("CV required before applying")]
    MissingCv,
    #[error("listing not found")]
    ListingNotFound,
    #[error("listing is not accepting applications")]
    ListingInactive,
    #[error("already applied to this listing")]
    AlreadyApplied,
}

impl EligibilityError {
    pub fn status(self) -> StatusCode {
        match self {
            EligibilityError::StudentNotFound | EligibilityError::ListingNotFound => {
                StatusCode::NOT_FOUND
            }
            EligibilityError::NotVerified => StatusCode::FORBIDDEN,
            EligibilityError::MissingCv => StatusCode::BAD_REQUEST,
            EligibilityError::ListingInactive => StatusCode::UNPROCESSABLE_ENTITY,
            EligibilityError::AlreadyApplied => StatusCode::CONFLICT,
        }
    }

    /// Stable machine-readable code, used by the capability query.
    pub fn code(self) -> &'static str {
        match self {
            EligibilityError::StudentNotFound => "student_not_found",
            EligibilityError::NotVerified => "not_verified",
            EligibilityError::MissingCv => "missing_cv",
            EligibilityError::ListingNotFound => "listing_not_found",
            EligibilityError::ListingInactive => "listing_inactive",
            EligibilityError::AlreadyApplied => "already_applied",
        }
    }
}

impl From<EligibilityError> for AppError {
    fn from(value: EligibilityError) -> Self {
        AppError::new(value.status(), value.to_string())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StudentSnapshot<'a> {
    pub verification_status: VerificationStatus,
    pub cv_url: Option<&'a str>,
}

impl<'a> StudentSnapshot<'a> {
    pub fn from_row(student: &'a Student) -> AppResult<Self> {
        let verification_status = student
            .verification_status
            .parse::<VerificationStatus>()
            .map_err(AppError::internal)?;
        Ok(Self {
            verification_status,
            cv_url: student.cv_url.as_deref(),
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ListingSnapshot {
    pub is_active: bool,
}

impl From<&Listing> for ListingSnapshot {
    fn from(listing: &Listing) -> Self {
        Self {
            is_active: listing.is_active,
        }
    }
}

/// Checks the student-side requirements: verification first, then CV.
pub fn evaluate_student(student: &StudentSnapshot<'_>) -> Result<(), EligibilityError> {
    if student.verification_status != VerificationStatus::VerifiedBySchool {
        return Err(EligibilityError::NotVerified);
    }
    let has_cv = student
        .cv_url
        .map(|url| !url.trim().is_empty())
        .unwrap_or(false);
    if !has_cv {
        return Err(EligibilityError::MissingCv);
    }
    Ok(())
}

pub fn evaluate_listing(listing: Option<ListingSnapshot>) -> Result<(), EligibilityError> {
    match listing {
        None => Err(EligibilityError::ListingNotFound),
        Some(listing) if !listing.is_active => Err(EligibilityError::ListingInactive),
        Some(_) => Ok(()),
    }
}

pub fn evaluate(
    student: Option<&StudentSnapshot<'_>>,
    listing: Option<ListingSnapshot>,
) -> Result<(), EligibilityError> {
    let student = student.ok_or(EligibilityError::StudentNotFound)?;
    evaluate_student(student)?;
    evaluate_listing(listing)
}

fn load_student(conn: &mut PgConnection, user_id: Uuid) -> AppResult<Option<Student>> {
    Ok(students::table
        .filter(students::user_id.eq(user_id))
        .first::<Student>(conn)
        .optional()?)
}

fn load_listing(conn: &mut PgConnection, listing_id: Uuid) -> AppResult<Option<Listing>> {
    Ok(listings::table
        .find(listing_id)
        .first::<Listing>(conn)
        .optional()?)
}

/// Creates an application for the student owning `user_id`, or explains why not.
pub fn submit_application(
    conn: &mut PgConnection,
    user_id: Uuid,
    listing_id: Uuid,
) -> AppResult<Application> {
    let student = load_student(conn, user_id)?;
    let snapshot = student.as_ref().map(StudentSnapshot::from_row).transpose()?;
    let listing = load_listing(conn, listing_id)?;
    evaluate(snapshot.as_ref(), listing.as_ref().map(ListingSnapshot::from))?;

    let student = student.ok_or(EligibilityError::StudentNotFound)?;
    let new_application = NewApplication {
        id: Uuid::new_v4(),
        student_id: student.id,
        listing_id,
        status: ApplicationStatus::Applied.as_str().to_string(),
        applied_at: Utc::now().naive_utc(),
    };

    match diesel::insert_into(applications::table)
        .values(&new_application)
        .execute(conn)
    {
        Ok(_) => {}
        Err(err) if is_unique_violation(&err) => {
            return Err(EligibilityError::AlreadyApplied.into());
        }
        Err(err) => return Err(AppError::from(err)),
    }

    let application = applications::table
        .find(new_application.id)
        .first::<Application>(conn)?;
    Ok(application)
}

#[derive(Debug, Serialize)]
pub struct EligibilityReport {
    pub listing_id: Uuid,
    pub eligible: bool,
    pub reason: Option<&'static str>,
    pub message: Option<String>,
    pub already_applied: bool,
}

/// Runs the same checks as [`submit_application`] without writing anything.
///
/// A missing student profile or listing is still an error; every other
/// failed rule is reported in the body.
pub fn assess(
    conn: &mut PgConnection,
    user_id: Uuid,
    listing_id: Uuid,
) -> AppResult<EligibilityReport> {
    let student = load_student(conn, user_id)?.ok_or(EligibilityError::StudentNotFound)?;
    let listing = load_listing(conn, listing_id)?.ok_or(EligibilityError::ListingNotFound)?;
    let snapshot = StudentSnapshot::from_row(&student)?;

    let already_applied = applications::table
        .filter(applications::student_id.eq(student.id))
        .filter(applications::listing_id.eq(listing_id))
        .select(applications::id)
        .first::<Uuid>(conn)
        .optional()?
        .is_some();

    let outcome = evaluate(Some(&snapshot), Some(ListingSnapshot::from(&listing))).and_then(|_| {
        if already_applied {
            Err(EligibilityError::AlreadyApplied)
        } else {
            Ok(())
        }
    });

    Ok(match outcome {
        Ok(()) => EligibilityReport {
            listing_id,
            eligible: true,
            reason: None,
            message: None,
            already_applied,
        },
        Err(err) => EligibilityReport {
            listing_id,
            eligible: false,
            reason: Some(err.code()),
            message: Some(err.to_string()),
            already_applied,
        },
    })
}
