use std::collections::HashMap;
use std::str::FromStr;

use axum::{
    Json,
    body::Bytes,
    extract::{Multipart, Path, State},
    http::header,
    response::IntoResponse,
};

use super::{ApiError, AuthUser, SharedState};
use crate::errors::HubError;
use crate::hub::models::UploadKind;

const IMAGE_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/jpg", "image/webp"];

/// A `file` part read from a multipart request.
pub(super) struct UploadedFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

/// Drain a multipart body into its `file` part and its text fields.
///
/// A missing content type on the file part is guessed from the file name.
pub(super) async fn read_multipart(
    mut multipart: Multipart,
) -> Result<(Option<UploadedFile>, HashMap<String, String>), ApiError> {
    let mut file = None;
    let mut fields = HashMap::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        if name == "file" {
            let file_name = field.file_name().unwrap_or("upload").to_string();
            let content_type = match field.content_type() {
                Some(ct) => ct.to_string(),
                None => mime_guess::from_path(&file_name)
                    .first_or_octet_stream()
                    .to_string(),
            };
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::bad_request(e.body_text()))?;
            file = Some(UploadedFile {
                file_name,
                content_type,
                bytes,
            });
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| ApiError::bad_request(e.body_text()))?;
            fields.insert(name, value);
        }
    }
    Ok((file, fields))
}

/// `POST /api/upload`: store an image and return its public URL.
pub(super) async fn upload_image(
    State(state): State<SharedState>,
    auth: AuthUser,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let (file, fields) = read_multipart(multipart).await?;
    let file = file.ok_or_else(|| ApiError::bad_request("No file provided"))?;
    if !IMAGE_TYPES.contains(&file.content_type.as_str()) {
        return Err(ApiError::bad_request(
            "Invalid file type. Only images are allowed.",
        ));
    }
    let limit = state.config.uploads.max_image_bytes;
    if file.bytes.len() > limit {
        return Err(HubError::payload_too_large(limit).into());
    }
    let kind = match fields.get("type").map(|t| t.trim()) {
        None | Some("") => UploadKind::Profile,
        Some(t) => UploadKind::from_str(t).map_err(ApiError::BadRequest)?,
    };

    let user_id = auth.user.id;
    let id = state
        .db
        .call(move |db| {
            db.store_file(
                kind.as_str(),
                &file.file_name,
                &file.content_type,
                &file.bytes,
                user_id,
            )
        })
        .await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "url": format!("/api/upload/{id}"),
    })))
}

/// `GET /api/upload/{id}`: public, immutable image bytes.
pub(super) async fn serve_image(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id: i64 = id
        .parse()
        .map_err(|_| ApiError::bad_request("Invalid file ID"))?;
    let file = state
        .db
        .call(move |db| db.get_file(id))
        .await?
        .ok_or_else(|| ApiError::NotFound("File not found".into()))?;
    let length = file.bytes.len().to_string();
    Ok((
        [
            (header::CONTENT_TYPE, file.content_type),
            (header::CONTENT_LENGTH, length),
            (
                header::CACHE_CONTROL,
                "public, max-age=31536000, immutable".to_string(),
            ),
        ],
        file.bytes,
    ))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::config::HubConfig;

    const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 1, 2, 3, 4];

    #[tokio::test]
    async fn test_upload_and_serve_image() {
        let app = test_app();
        let (token, _) = login(&app, "ada@gmail.com", "Ada").await;

        let (status, body) = send_multipart(
            &app,
            "/api/upload",
            Some(&token),
            &[
                ("file", Some("logo.png"), Some("image/png"), PNG),
                ("type", None, None, b"pod-logo".as_slice()),
            ],
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        let url = body["url"].as_str().unwrap().to_string();
        assert!(url.starts_with("/api/upload/"));

        let response = app
            .clone()
            .oneshot(Request::builder().uri(&url).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers["content-type"], "image/png");
        assert_eq!(headers["content-length"], PNG.len().to_string().as_str());
        assert_eq!(headers["cache-control"], "public, max-age=31536000, immutable");
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], PNG);
    }

    #[tokio::test]
    async fn test_upload_rejections() {
        let mut config = HubConfig::default();
        config.uploads.max_image_bytes = 4;
        let app = test_app_with(config);
        let (token, _) = login(&app, "ada@gmail.com", "Ada").await;

        let (status, body) = send_multipart(
            &app,
            "/api/upload",
            Some(&token),
            &[("type", None, None, b"profile".as_slice())],
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No file provided");

        let (status, body) = send_multipart(
            &app,
            "/api/upload",
            Some(&token),
            &[("file", Some("doc.pdf"), Some("application/pdf"), b"%PDF".as_slice())],
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid file type. Only images are allowed.");

        let (status, body) = send_multipart(
            &app,
            "/api/upload",
            Some(&token),
            &[("file", Some("big.png"), Some("image/png"), PNG)],
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "File size too large. Maximum size is 0MB.");

        let (status, _) = send_multipart(
            &app,
            "/api/upload",
            None,
            &[("file", Some("a.png"), Some("image/png"), b"abc".as_slice())],
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_serve_image_errors() {
        let app = test_app();
        let (status, body) = send(&app, "GET", "/api/upload/abc", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid file ID");

        let (status, body) = send(&app, "GET", "/api/upload/42", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "File not found");
    }

    #[tokio::test]
    async fn test_content_type_guessed_from_file_name() {
        let app = test_app();
        let (token, _) = login(&app, "ada@gmail.com", "Ada").await;
        let (status, body) = send_multipart(
            &app,
            "/api/upload",
            Some(&token),
            &[("file", Some("photo.webp"), None, b"RIFF".as_slice())],
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let url = body["url"].as_str().unwrap();
        let response = app
            .clone()
            .oneshot(Request::builder().uri(url).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.headers()["content-type"], "image/webp");
    }
}
