pub mod auth;
pub mod config;
pub mod db;
pub mod eligibility;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod roles;
pub mod routes;
pub mod s3;
pub mod schema;
pub mod school_lookup;
pub mod state;
pub mod storage;
pub mod utils;
pub mod verification;
