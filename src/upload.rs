// ABOUTME: Image upload handler backing the portfolio editor
// ABOUTME: Files land in the configured upload dir and are served back under /static/uploads

use axum::{
    extract::{Multipart, State},
    response::Json,
};
use axum_extra::extract::cookie::CookieJar;
use serde_json::{Value, json};

use crate::AppState;
use crate::error::{AppError, Result};
use crate::session::current_principal;

const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif"];

fn allowed_extension(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .is_some_and(|(_, ext)| ALLOWED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// Keeps alphanumerics, dots, dashes, and underscores; everything else
/// becomes an underscore so the name is safe as a path segment.
fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

pub async fn upload_image(
    State(state): State<AppState>,
    jar: CookieJar,
    mut multipart: Multipart,
) -> Result<Json<Value>> {
    current_principal(&jar, &state).await?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart payload: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or("").to_string();
        if filename.is_empty() {
            return Err(AppError::Validation("No file selected".to_string()));
        }
        if !allowed_extension(&filename) {
            return Err(AppError::Validation("Invalid file type".to_string()));
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Failed to read upload: {}", e)))?;

        // Timestamp prefix avoids collisions between same-named uploads.
        let stored_name = format!(
            "{}_{}",
            chrono::Utc::now().timestamp(),
            sanitize_filename(&filename)
        );

        tokio::fs::create_dir_all(&state.config.upload_dir).await?;
        let path = std::path::Path::new(&state.config.upload_dir).join(&stored_name);
        tokio::fs::write(&path, &bytes).await?;

        tracing::info!("Stored upload {} ({} bytes)", stored_name, bytes.len());

        return Ok(Json(json!({
            "success": true,
            "url": format!("/static/uploads/{}", stored_name),
        })));
    }

    Err(AppError::Validation("No file provided".to_string()))
}
