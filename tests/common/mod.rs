use std::collections::HashMap;
use std::env;
use std::sync::Arc;

use anyhow::{anyhow, bail, ensure, Context, Result};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use diesel::connection::SimpleConnection;
use diesel::PgConnection;
use diesel_migrations::MigrationHarness;
use http_body_util::BodyExt;
use once_cell::sync::Lazy;
use serde::Serialize;
use serde_json::{json, Value};
use talenta_backend::auth::jwt::JwtService;
use talenta_backend::config::{AppConfig, DEFAULT_MAX_UPLOAD_BYTES};
use talenta_backend::db::{self, PgPool};
use talenta_backend::routes;
use talenta_backend::school_lookup::{SchoolDirectory, SchoolReference};
use talenta_backend::state::AppState;
use talenta_backend::storage::{join_public_url, ObjectStorage};
use tokio::sync::Mutex;
use tower::util::ServiceExt;
use uuid::Uuid;

pub const PASSWORD: &str = "rahasia123";

static DB_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

#[allow(dead_code)]
#[derive(Clone)]
pub struct StoredObject {
    pub key: String,
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

#[derive(Default)]
pub struct FakeStorage {
    objects: Mutex<HashMap<String, StoredObject>>,
}

#[async_trait]
impl ObjectStorage for FakeStorage {
    async fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: Option<String>,
    ) -> Result<()> {
        let stored = StoredObject {
            key: key.to_string(),
            bytes,
            content_type,
        };
        let mut guard = self.objects.lock().await;
        guard.insert(stored.key.clone(), stored);
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        join_public_url("https://fake-storage", key)
    }
}

impl FakeStorage {
    #[allow(dead_code)]
    pub async fn get(&self, key: &str) -> Option<StoredObject> {
        let guard = self.objects.lock().await;
        guard.get(key).cloned()
    }

    #[allow(dead_code)]
    pub async fn object_count(&self) -> usize {
        let guard = self.objects.lock().await;
        guard.len()
    }
}

/// Answers every query with a fixed list; the query `fail` simulates an outage.
pub struct FakeSchoolDirectory {
    entries: Vec<SchoolReference>,
}

#[async_trait]
impl SchoolDirectory for FakeSchoolDirectory {
    async fn search(&self, query: &str) -> Result<Vec<SchoolReference>> {
        if query == "fail" {
            bail!("directory unavailable");
        }
        Ok(self.entries.clone())
    }
}

pub struct TestApp {
    pub state: AppState,
    router: Router,
    storage: Arc<FakeStorage>,
}

pub fn test_config(database_url: String) -> AppConfig {
    AppConfig {
        database_url,
        database_max_pool_size: db::DEFAULT_MAX_POOL_SIZE,
        server_host: "127.0.0.1".to_string(),
        server_port: 0,
        jwt_secret: "test-secret".to_string(),
        jwt_issuer: "test-issuer".to_string(),
        jwt_audience: "test-audience".to_string(),
        jwt_expiry_minutes: 60,
        refresh_token_expiry_days: 30,
        refresh_cookie_secure: false,
        refresh_cookie_domain: None,
        cors_allowed_origin: None,
        aws_endpoint_url: None,
        aws_access_key_id: None,
        aws_secret_access_key: None,
        aws_region: "us-east-1".to_string(),
        s3_bucket: "test-bucket".to_string(),
        storage_public_base_url: Some("https://fake-storage".to_string()),
        school_lookup_url: "http://directory.invalid/lookup".to_string(),
        max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
    }
}

/// Accounts created by [`TestApp::seed_school`] and friends.
#[allow(dead_code)]
pub struct SchoolFixture {
    pub token: String,
    pub school_id: Uuid,
    pub major_id: Uuid,
}

#[allow(dead_code)]
pub struct StudentFixture {
    pub token: String,
    pub student_id: Uuid,
}

impl TestApp {
    pub async fn new() -> Result<Self> {
        let database_url = env::var("TEST_DATABASE_URL")
            .context("TEST_DATABASE_URL must be set for integration tests")?;

        let config = test_config(database_url);
        let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
        prepare_database(&pool).await?;

        let storage = Arc::new(FakeStorage::default());
        let storage_for_state: Arc<dyn ObjectStorage> = storage.clone();
        let directory: Arc<dyn SchoolDirectory> = Arc::new(FakeSchoolDirectory {
            entries: vec![
                SchoolReference {
                    nama: "SMK NEGERI 1 BANDUNG".to_string(),
                    npsn: "20219172".to_string(),
                },
                SchoolReference {
                    nama: "SMK NEGERI 2 BANDUNG".to_string(),
                    npsn: "20219171".to_string(),
                },
            ],
        });
        let jwt = JwtService::from_config(&config)?;
        let state = AppState::new(pool.clone(), config, storage_for_state, directory, jwt);
        let router = routes::create_router(state.clone());

        Ok(Self {
            state,
            router,
            storage,
        })
    }

    pub async fn cleanup(&self) -> Result<()> {
        self.with_conn(truncate_all).await
    }

    #[allow(dead_code)]
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    #[allow(dead_code)]
    pub fn storage(&self) -> Arc<FakeStorage> {
        self.storage.clone()
    }

    pub async fn login_token(&self, email: &str, password: &str) -> Result<String> {
        let response = self
            .post_json(
                "/api/auth/login",
                &json!({ "email": email, "password": password }),
                None,
            )
            .await?;

        ensure!(
            response.status() == StatusCode::OK,
            "login failed with status {}",
            response.status()
        );

        let body = json_body(response).await?;
        body["access_token"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("login response without access_token"))
    }

    async fn register(&self, payload: Value) -> Result<()> {
        let response = self.post_json("/api/auth/register", &payload, None).await?;
        let status = response.status();
        ensure!(
            status == StatusCode::CREATED,
            "registration failed with status {status}: {}",
            json_body(response).await?
        );
        Ok(())
    }

    /// Registers a school administrator and creates one major.
    #[allow(dead_code)]
    pub async fn seed_school(&self, email: &str, npsn: &str) -> Result<SchoolFixture> {
        self.register(json!({
            "email": email,
            "password": PASSWORD,
            "full_name": "Bu Ratna",
            "role": "school_admin",
            "position": "Kepala BKK",
            "school_name": format!("SMK Negeri {npsn}"),
            "npsn": npsn,
            "accreditation": "A",
            "level": "SMK",
        }))
        .await?;
        let token = self.login_token(email, PASSWORD).await?;

        let profile = json_body(self.get("/api/school/profile", Some(&token)).await?).await?;
        let school_id = parse_id(&profile["id"])?;

        let response = self
            .post_json(
                "/api/school/majors",
                &json!({ "name": "Rekayasa Perangkat Lunak", "quota": 36 }),
                Some(&token),
            )
            .await?;
        ensure!(response.status() == StatusCode::CREATED, "major creation failed");
        let major_id = parse_id(&json_body(response).await?["id"])?;

        Ok(SchoolFixture {
            token,
            school_id,
            major_id,
        })
    }

    #[allow(dead_code)]
    pub async fn seed_student(
        &self,
        email: &str,
        school: &SchoolFixture,
    ) -> Result<StudentFixture> {
        self.register(json!({
            "email": email,
            "password": PASSWORD,
            "full_name": "Siti Aminah",
            "role": "student",
            "nisn": "0061234567",
            "school_id": school.school_id,
            "major_id": school.major_id,
        }))
        .await?;
        let token = self.login_token(email, PASSWORD).await?;
        let profile = json_body(self.get("/api/student/profile", Some(&token)).await?).await?;
        let student_id = parse_id(&profile["id"])?;
        Ok(StudentFixture { token, student_id })
    }

    /// Registers a company administrator and returns their access token.
    #[allow(dead_code)]
    pub async fn seed_company(&self, email: &str) -> Result<String> {
        self.register(json!({
            "email": email,
            "password": PASSWORD,
            "full_name": "Pak Hendra",
            "role": "company_admin",
            "position": "HR Manager",
            "company_name": format!("PT {email}"),
            "industry": "Teknologi Informasi",
            "website": "https://example.com",
        }))
        .await?;
        self.login_token(email, PASSWORD).await
    }

    #[allow(dead_code)]
    pub async fn first_category_id(&self) -> Result<Uuid> {
        let categories = json_body(self.get("/api/categories", None).await?).await?;
        parse_id(&categories[0]["id"])
    }

    /// Creates an active listing owned by the company behind `token`.
    #[allow(dead_code)]
    pub async fn seed_listing(&self, token: &str, title: &str) -> Result<Uuid> {
        let category_id = self.first_category_id().await?;
        let response = self
            .post_json(
                "/api/listings",
                &json!({
                    "title": title,
                    "description": "Magang selama tiga bulan",
                    "location": "Bandung",
                    "category_id": category_id,
                }),
                Some(token),
            )
            .await?;
        ensure!(
            response.status() == StatusCode::OK,
            "listing creation failed with status {}",
            response.status()
        );
        parse_id(&json_body(response).await?["id"])
    }

    #[allow(dead_code)]
    pub async fn verify_student(&self, school: &SchoolFixture, student_id: Uuid) -> Result<()> {
        let response = self
            .patch_json(
                &format!("/api/school/students/{student_id}/verification"),
                &json!({ "status": "VERIFIED_BY_SCHOOL" }),
                Some(&school.token),
            )
            .await?;
        ensure!(
            response.status() == StatusCode::OK,
            "verification failed with status {}",
            response.status()
        );
        Ok(())
    }

    #[allow(dead_code)]
    pub async fn set_cv_url(&self, token: &str, url: &str) -> Result<()> {
        let response = self
            .put_json("/api/student/profile/cv-url", &json!({ "cv_url": url }), Some(token))
            .await?;
        ensure!(response.status() == StatusCode::OK, "setting cv url failed");
        Ok(())
    }

    #[allow(dead_code)]
    pub async fn count_rows(&self, table: &'static str) -> Result<i64> {
        self.with_conn(move |conn| {
            use diesel::sql_types::BigInt;
            use diesel::RunQueryDsl;

            #[derive(diesel::QueryableByName)]
            struct Count {
                #[diesel(sql_type = BigInt)]
                count: i64,
            }

            let row: Count = diesel::sql_query(format!("SELECT COUNT(*) AS count FROM {table}"))
                .get_result(conn)
                .context("failed to count rows")?;
            Ok(row.count)
        })
        .await
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let mut builder = Request::builder().method(method).uri(path);
        if body.is_some() {
            builder = builder.header("content-type", "application/json");
        }
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(body.map(Body::from).unwrap_or_else(Body::empty))?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    #[allow(dead_code)]
    pub async fn send_raw(&self, request: Request<Body>) -> Result<hyper::Response<Body>> {
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let body = serde_json::to_vec(payload)?;
        self.send(Method::POST, path, Some(body), token).await
    }

    #[allow(dead_code)]
    pub async fn patch_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let body = serde_json::to_vec(payload)?;
        self.send(Method::PATCH, path, Some(body), token).await
    }

    #[allow(dead_code)]
    pub async fn put_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let body = serde_json::to_vec(payload)?;
        self.send(Method::PUT, path, Some(body), token).await
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        self.send(Method::GET, path, None, token).await
    }

    #[allow(dead_code)]
    pub async fn delete(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        self.send(Method::DELETE, path, None, token).await
    }

    #[allow(dead_code)]
    pub async fn upload_file(
        &self,
        path: &str,
        filename: &str,
        content_type: &str,
        data: &[u8],
        token: &str,
    ) -> Result<hyper::Response<Body>> {
        let boundary = format!("boundary-{}", Uuid::new_v4());
        let mut body = Vec::new();
        body.extend(format!("--{boundary}\r\n").as_bytes());
        body.extend(
            format!(
                "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
                filename
            )
            .as_bytes(),
        );
        body.extend(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
        body.extend(data);
        body.extend(b"\r\n");
        body.extend(format!("--{boundary}--\r\n").as_bytes());

        let request = Request::builder()
            .method(Method::POST)
            .uri(path)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={boundary}"),
            )
            .header("authorization", format!("Bearer {token}"))
            .body(Body::from(body))?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut PgConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.state.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|err| anyhow!("failed to get database connection: {err}"))?;
            f(&mut conn)
        })
        .await
        .context("connection task panicked")?
    }
}

pub async fn acquire_db_lock() -> tokio::sync::MutexGuard<'static, ()> {
    DB_LOCK.lock().await
}

pub async fn body_to_vec(body: Body) -> Result<Vec<u8>> {
    let collected = body
        .collect()
        .await
        .map_err(|err| anyhow!("failed to read response body: {err}"))?;
    Ok(collected.to_bytes().to_vec())
}

pub async fn json_body(response: hyper::Response<Body>) -> Result<Value> {
    let bytes = body_to_vec(response.into_body()).await?;
    if bytes.is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_slice(&bytes)?)
}

pub fn parse_id(value: &Value) -> Result<Uuid> {
    let raw = value
        .as_str()
        .ok_or_else(|| anyhow!("expected a string id, got {value}"))?;
    Ok(Uuid::parse_str(raw)?)
}

async fn prepare_database(pool: &PgPool) -> Result<()> {
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || -> Result<()> {
        let mut conn = pool
            .get()
            .map_err(|err| anyhow!("failed to acquire connection: {err}"))?;
        conn.run_pending_migrations(db::MIGRATIONS)
            .map_err(|err| anyhow!("failed to run migrations: {err}"))?;
        truncate_all(&mut conn)?;
        Ok(())
    })
    .await
    .context("migration task panicked")?
}

/// Clears every table except the seeded job categories.
fn truncate_all(conn: &mut PgConnection) -> Result<()> {
    conn.batch_execute(
        "TRUNCATE TABLE applications, listings, companies, students, majors, schools, \
         refresh_tokens, users CASCADE;",
    )
    .context("failed to truncate tables")?;
    Ok(())
}
