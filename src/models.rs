use chrono::NaiveDateTime;
use diesel::prelude::*;
use uuid::Uuid;

use crate::schema::*;

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub role: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = refresh_tokens)]
#[diesel(belongs_to(User))]
pub struct RefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub issued_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
    pub revoked_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = refresh_tokens)]
pub struct NewRefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub issued_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = schools)]
#[diesel(belongs_to(User))]
pub struct School {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub npsn: String,
    pub address: Option<String>,
    pub accreditation: String,
    pub level: String,
    pub logo_url: Option<String>,
    pub pic_name: String,
    pub pic_position: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = schools)]
pub struct NewSchool {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub npsn: String,
    pub accreditation: String,
    pub level: String,
    pub pic_name: String,
    pub pic_position: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = majors)]
#[diesel(belongs_to(School))]
pub struct Major {
    pub id: Uuid,
    pub school_id: Uuid,
    pub name: String,
    pub quota: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = majors)]
pub struct NewMajor {
    pub id: Uuid,
    pub school_id: Uuid,
    pub name: String,
    pub quota: i32,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = students)]
#[diesel(belongs_to(User))]
#[diesel(belongs_to(School))]
#[diesel(belongs_to(Major))]
pub struct Student {
    pub id: Uuid,
    pub user_id: Uuid,
    pub school_id: Uuid,
    pub major_id: Uuid,
    pub full_name: String,
    pub nisn: String,
    pub portfolio_url: Option<String>,
    pub cv_url: Option<String>,
    pub verification_status: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = students)]
pub struct NewStudent {
    pub id: Uuid,
    pub user_id: Uuid,
    pub school_id: Uuid,
    pub major_id: Uuid,
    pub full_name: String,
    pub nisn: String,
    pub verification_status: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = companies)]
#[diesel(belongs_to(User))]
pub struct Company {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub industry: String,
    pub website: Option<String>,
    pub address: Option<String>,
    pub logo_url: Option<String>,
    pub pic_name: String,
    pub pic_position: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = companies)]
pub struct NewCompany {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub industry: String,
    pub website: Option<String>,
    pub pic_name: String,
    pub pic_position: String,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = job_categories)]
pub struct JobCategory {
    pub id: Uuid,
    pub name: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = listings)]
#[diesel(belongs_to(Company))]
#[diesel(belongs_to(JobCategory, foreign_key = category_id))]
pub struct Listing {
    pub id: Uuid,
    pub company_id: Uuid,
    pub category_id: Uuid,
    pub title: String,
    pub description: String,
    pub location: Option<String>,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = listings)]
pub struct NewListing {
    pub id: Uuid,
    pub company_id: Uuid,
    pub category_id: Uuid,
    pub title: String,
    pub description: String,
    pub location: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = applications)]
#[diesel(belongs_to(Student))]
#[diesel(belongs_to(Listing))]
pub struct Application {
    pub id: Uuid,
    pub student_id: Uuid,
    pub listing_id: Uuid,
    pub status: String,
    pub applied_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = applications)]
pub struct NewApplication {
    pub id: Uuid,
    pub student_id: Uuid,
    pub listing_id: Uuid,
    pub status: String,
    pub applied_at: NaiveDateTime,
}
