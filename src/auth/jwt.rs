use anyhow::Result;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::roles::Role;

#[derive(Clone)]
pub struct JwtService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    expiry: Duration,
}

impl JwtService {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self {
            encoding: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            issuer: config.jwt_issuer.clone(),
            audience: config.jwt_audience.clone(),
            expiry: Duration::minutes(config.jwt_expiry_minutes),
        })
    }

    pub fn generate_token(&self, user_id: Uuid, email: &str, role: Role) -> Result<String> {
        let now = Utc::now();
        let exp = now + self.expiry;
        let claims = Claims {
            sub: user_id,
            email: email.to_owned(),
            role,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: now.timestamp() as usize,
            exp: exp.timestamp() as usize,
        };

        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(&[self.audience.clone()]);
        validation.set_issuer(&[self.issuer.clone()]);
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        Ok(data.claims)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub role: Role,
    pub iss: String,
    pub aud: String,
    pub iat: usize,
    pub exp: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_SCHOOL_LOOKUP_URL};

    fn service(secret: &str, audience: &str) -> JwtService {
        let config = AppConfig {
            database_url: "postgres://localhost/test".to_string(),
            database_max_pool_size: 1,
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            jwt_secret: secret.to_string(),
            jwt_issuer: "talenta-test".to_string(),
            jwt_audience: audience.to_string(),
            jwt_expiry_minutes: 5,
            refresh_token_expiry_days: 1,
            refresh_cookie_secure: false,
            refresh_cookie_domain: None,
            cors_allowed_origin: None,
            aws_endpoint_url: None,
            aws_access_key_id: None,
            aws_secret_access_key: None,
            aws_region: "us-east-1".to_string(),
            s3_bucket: "bucket".to_string(),
            storage_public_base_url: None,
            school_lookup_url: DEFAULT_SCHOOL_LOOKUP_URL.to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        };
        JwtService::from_config(&config).unwrap()
    }

    #[test]
    fn issued_token_carries_role() {
        let jwt = service("secret", "clients");
        let user_id = Uuid::new_v4();
        let token = jwt
            .generate_token(user_id, "siswa@example.com", Role::Student)
            .unwrap();
        let claims = jwt.verify_token(&token).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.email, "siswa@example.com");
        assert_eq!(claims.role, Role::Student);
    }

    #[test]
    fn rejects_token_for_other_audience_or_secret() {
        let token = service("secret", "clients")
            .generate_token(Uuid::new_v4(), "a@example.com", Role::CompanyAdmin)
            .unwrap();
        assert!(service("secret", "other").verify_token(&token).is_err());
        assert!(service("different", "clients").verify_token(&token).is_err());
    }
}
