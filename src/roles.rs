use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Company, School, Student};
use crate::utils::time::to_iso;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    SchoolAdmin,
    CompanyAdmin,
}

impl Role {
    pub const fn as_str(self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::SchoolAdmin => "school_admin",
            Role::CompanyAdmin => "company_admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "student" => Ok(Role::Student),
            "school_admin" => Ok(Role::SchoolAdmin),
            "company_admin" => Ok(Role::CompanyAdmin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// The caller's role together with its profile, resolved once per session lookup.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "role", content = "profile", rename_all = "snake_case")]
pub enum SessionProfile {
    Student(StudentProfile),
    SchoolAdmin(SchoolProfile),
    CompanyAdmin(CompanyProfile),
}

impl SessionProfile {
    pub fn role(&self) -> Role {
        match self {
            SessionProfile::Student(_) => Role::Student,
            SessionProfile::SchoolAdmin(_) => Role::SchoolAdmin,
            SessionProfile::CompanyAdmin(_) => Role::CompanyAdmin,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentProfile {
    pub id: Uuid,
    pub full_name: String,
    pub nisn: String,
    pub school_id: Uuid,
    pub major_id: Uuid,
    pub portfolio_url: Option<String>,
    pub cv_url: Option<String>,
    pub verification_status: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Student> for StudentProfile {
    fn from(student: Student) -> Self {
        Self {
            id: student.id,
            full_name: student.full_name,
            nisn: student.nisn,
            school_id: student.school_id,
            major_id: student.major_id,
            portfolio_url: student.portfolio_url,
            cv_url: student.cv_url,
            verification_status: student.verification_status,
            created_at: to_iso(student.created_at),
            updated_at: to_iso(student.updated_at),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SchoolProfile {
    pub id: Uuid,
    pub name: String,
    pub npsn: String,
    pub address: Option<String>,
    pub accreditation: String,
    pub level: String,
    pub logo_url: Option<String>,
    pub pic_name: String,
    pub pic_position: String,
    pub updated_at: String,
}

impl From<School> for SchoolProfile {
    fn from(school: School) -> Self {
        Self {
            id: school.id,
            name: school.name,
            npsn: school.npsn,
            address: school.address,
            accreditation: school.accreditation,
            level: school.level,
            logo_url: school.logo_url,
            pic_name: school.pic_name,
            pic_position: school.pic_position,
            updated_at: to_iso(school.updated_at),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CompanyProfile {
    pub id: Uuid,
    pub name: String,
    pub industry: String,
    pub website: Option<String>,
    pub address: Option<String>,
    pub logo_url: Option<String>,
    pub pic_name: String,
    pub pic_position: String,
    pub updated_at: String,
}

impl From<Company> for CompanyProfile {
    fn from(company: Company) -> Self {
        Self {
            id: company.id,
            name: company.name,
            industry: company.industry,
            website: company.website,
            address: company.address,
            logo_url: company.logo_url,
            pic_name: company.pic_name,
            pic_position: company.pic_position,
            updated_at: to_iso(company.updated_at),
        }
    }
}
