use std::path::Path;

use axum::body::Body;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use veo_core::{ConversionError, ConverterConfig, PlatformTarget, DEFAULT_PADDING, DEFAULT_WIDTH};
use veo_image::convert_bytes_with_telemetry;

use crate::page::{render_page, PageModel};
use crate::AppState;

pub const MSG_INVALID_NUMBER: &str = "Invalid number format.";
pub const MSG_MISSING_FILE: &str = "Please choose an image file.";
pub const MSG_UNRECOGNIZED: &str = "Could not recognize the file contents as an image.";
pub const MSG_NOT_MULTIPART: &str = "Please submit the form with an image file attached.";

/// Raw form fields as they arrived.
#[derive(Debug, Clone, Default)]
pub struct Submission {
    pub file_name: Option<String>,
    pub image: Option<Vec<u8>>,
    pub padding: Option<String>,
    pub width: Option<String>,
}

#[derive(Debug, Clone)]
pub enum Outcome {
    Download { file_name: String, png: Vec<u8> },
    Form(PageModel),
}

/// GET / – Upload form
pub async fn index() -> Html<String> {
    Html(render_page(&PageModel::default()))
}

/// POST / – Convert the upload, or re-render the form with a message
pub async fn convert(State(state): State<AppState>, multipart: Result<Multipart, MultipartRejection>) -> Response {
    let multipart = match multipart {
        Ok(multipart) => multipart,
        Err(rejection) => {
            tracing::warn!("rejecting non-multipart post: {}", rejection.body_text());
            return Html(render_page(&PageModel {
                message: Some(MSG_NOT_MULTIPART.to_string()),
                ..PageModel::default()
            }))
            .into_response();
        }
    };
    let submission = match read_submission(multipart).await {
        Ok(submission) => submission,
        Err(e) => {
            tracing::warn!("rejecting unreadable upload: {e}");
            return Html(render_page(&PageModel {
                message: Some(format!("The upload could not be read: {e}")),
                ..PageModel::default()
            }))
            .into_response();
        }
    };

    match process_submission(&state, submission).await {
        Outcome::Download { file_name, png } => {
            tracing::info!(file = %file_name, bytes = png.len(), "serving converted image");
            Response::builder()
                .header(header::CONTENT_TYPE, "image/png")
                .header(header::CONTENT_DISPOSITION, content_disposition(&file_name))
                .body(Body::from(png))
                .unwrap_or_else(|e| {
                    tracing::error!("failed to build download response: {e}");
                    StatusCode::INTERNAL_SERVER_ERROR.into_response()
                })
        }
        Outcome::Form(model) => Html(render_page(&model)).into_response(),
    }
}

async fn read_submission(mut multipart: Multipart) -> Result<Submission, axum::extract::multipart::MultipartError> {
    let mut submission = Submission::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "image" => {
                submission.file_name = field.file_name().map(str::to_string);
                submission.image = Some(field.bytes().await?.to_vec());
            }
            "padding" => submission.padding = Some(field.text().await?),
            "width" => submission.width = Some(field.text().await?),
            _ => {}
        }
    }
    Ok(submission)
}

pub async fn process_submission(state: &AppState, submission: Submission) -> Outcome {
    let mut model = PageModel {
        message: None,
        padding: echo_value(submission.padding.as_deref(), DEFAULT_PADDING),
        width: echo_value(submission.width.as_deref(), DEFAULT_WIDTH),
    };

    let parsed = parse_int(submission.padding.as_deref(), DEFAULT_PADDING)
        .and_then(|padding| parse_int(submission.width.as_deref(), DEFAULT_WIDTH).map(|width| ConverterConfig { padding, width }));
    let config = match parsed {
        Some(config) => config,
        None => return rejected(model, MSG_INVALID_NUMBER.to_string()),
    };

    let file_name = submission.file_name.unwrap_or_default();
    let image = match submission.image {
        Some(image) if !file_name.is_empty() => image,
        _ => return rejected(model, MSG_MISSING_FILE.to_string()),
    };

    let max_width = state.config().max_width;
    if config.width > max_width {
        return rejected(model, format!("Canvas width cannot exceed {} px.", max_width));
    }

    let telemetry = state.telemetry();
    let converted = tokio::task::spawn_blocking(move || {
        convert_bytes_with_telemetry(&image, &config, PlatformTarget::Web, telemetry.as_deref())
    })
    .await;

    match converted {
        Ok(Ok(converted)) => Outcome::Download {
            file_name: download_name(&file_name),
            png: converted.png,
        },
        Ok(Err(ConversionError::UnrecognizedImage(detail))) => {
            tracing::debug!("undecodable upload {file_name:?}: {detail}");
            rejected(model, MSG_UNRECOGNIZED.to_string())
        }
        Ok(Err(err)) => rejected(model, err.to_string()),
        Err(e) => {
            tracing::error!("conversion task failed: {e}");
            model.message = Some("The conversion failed unexpectedly.".to_string());
            Outcome::Form(model)
        }
    }
}

fn rejected(mut model: PageModel, message: String) -> Outcome {
    tracing::warn!("rejecting submission: {message}");
    model.message = Some(message);
    Outcome::Form(model)
}

/// Blank or missing fields fall back to `default`; anything else must be an integer.
pub fn parse_int(value: Option<&str>, default: i64) -> Option<i64> {
    match value.map(str::trim) {
        None | Some("") => Some(default),
        Some(raw) => raw.parse().ok(),
    }
}

fn echo_value(value: Option<&str>, default: i64) -> String {
    match value.map(str::trim) {
        None | Some("") => default.to_string(),
        Some(raw) => raw.to_string(),
    }
}

pub fn download_name(upload_name: &str) -> String {
    let stem = Path::new(upload_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "image".to_string());
    format!("{}_veo.png", stem)
}

/// `attachment` header value with an ASCII `filename` and, for anything
/// outside plain ASCII, an RFC 5987 `filename*`.
pub fn content_disposition(file_name: &str) -> String {
    let fallback: String = file_name
        .chars()
        .map(|c| if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' { c } else { '_' })
        .collect();
    if fallback == file_name {
        return format!("attachment; filename=\"{}\"", file_name);
    }
    let mut encoded = String::new();
    for byte in file_name.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~') {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{:02X}", byte));
        }
    }
    format!("attachment; filename=\"{}\"; filename*=UTF-8''{}", fallback, encoded)
}
