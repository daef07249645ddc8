use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

/// Characters escaped inside a single object key segment.
const KEY_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

#[async_trait]
pub trait ObjectStorage: Send + Sync + 'static {
    async fn put_object(&self, key: &str, bytes: Vec<u8>, content_type: Option<String>)
        -> Result<()>;

    fn public_url(&self, key: &str) -> String;

    /// Stores the object and returns the URL it is served from.
    async fn upload(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: Option<String>,
    ) -> Result<String> {
        self.put_object(key, bytes, content_type).await?;
        Ok(self.public_url(key))
    }
}

pub struct S3Storage {
    client: S3Client,
    bucket: String,
    public_base_url: String,
}

impl S3Storage {
    pub fn new(
        client: S3Client,
        bucket: impl Into<String>,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            public_base_url: public_base_url.into(),
        }
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: Option<String>,
    ) -> Result<()> {
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes));

        if let Some(content_type) = content_type {
            request = request.content_type(content_type);
        }

        request
            .send()
            .await
            .context("failed to upload object to S3")?;

        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        join_public_url(&self.public_base_url, key)
    }
}

pub fn join_public_url(base: &str, key: &str) -> String {
    let encoded: Vec<String> = key
        .split('/')
        .map(|segment| utf8_percent_encode(segment, KEY_SEGMENT).to_string())
        .collect();
    format!("{}/{}", base.trim_end_matches('/'), encoded.join("/"))
}

/// Object key for a student's CV: `cvs/<user_id>/<file>`.
pub fn cv_key(user_id: uuid::Uuid, file_name: &str) -> String {
    format!("cvs/{}/{}", user_id, sanitize_file_name(file_name))
}

/// Object key for a school or company logo: `logos/<user_id>/<file>`.
pub fn logo_key(user_id: uuid::Uuid, file_name: &str) -> String {
    format!("logos/{}/{}", user_id, sanitize_file_name(file_name))
}

fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name).trim();
    let cleaned: String = base
        .chars()
        .map(|ch| match ch {
            '"' | '\'' | '\\' | '/' => '_',
            ch if ch.is_control() => '_',
            ch => ch,
        })
        .collect();
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}
