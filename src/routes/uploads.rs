use axum::extract::Multipart;
use tracing::error;

use crate::error::{AppError, AppResult};

pub struct UploadedFile {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub content_type: String,
}

/// Reads the `file` field of a multipart body.
///
/// The declared content type wins; otherwise it is guessed from the file name.
pub async fn read_file_field(
    multipart: &mut Multipart,
    max_bytes: usize,
) -> AppResult<UploadedFile> {
    let mut uploaded: Option<UploadedFile> = None;

    while let Some(field) = multipart.next_field().await.map_err(|err| {
        error!(error = %err, "invalid multipart data");
        AppError::bad_request(format!("invalid multipart data: {err}"))
    })? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field
            .file_name()
            .map(|name| name.to_string())
            .unwrap_or_default();
        let declared = field
            .content_type()
            .map(|mime| mime.to_string())
            .filter(|mime| !mime.is_empty() && mime != "application/octet-stream");
        let content_type = declared.unwrap_or_else(|| {
            mime_guess::from_path(&file_name)
                .first_or_octet_stream()
                .essence_str()
                .to_string()
        });
        let data = field.bytes().await.map_err(|err| {
            error!(error = %err, "failed to read file bytes");
            AppError::bad_request(format!("failed to read file bytes: {err}"))
        })?;
        uploaded = Some(UploadedFile {
            bytes: data.to_vec(),
            file_name,
            content_type,
        });
    }

    let uploaded = uploaded.ok_or_else(|| AppError::bad_request("file field is required"))?;
    if uploaded.bytes.is_empty() {
        return Err(AppError::bad_request("file field must not be empty"));
    }
    if uploaded.bytes.len() > max_bytes {
        return Err(AppError::bad_request(format!(
            "file exceeds the {max_bytes} byte upload limit"
        )));
    }
    Ok(uploaded)
}

pub fn ensure_image(file: &UploadedFile) -> AppResult<()> {
    if file.content_type.starts_with("image/") {
        Ok(())
    } else {
        Err(AppError::bad_request("logo must be an image"))
    }
}

pub fn ensure_pdf(file: &UploadedFile) -> AppResult<()> {
    if file.content_type == "application/pdf" {
        Ok(())
    } else {
        Err(AppError::bad_request("CV must be a PDF file"))
    }
}
