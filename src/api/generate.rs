use crate::{
    config::AppConfig,
    database::MongoDB,
    models::{StudySet, StudySetSummary},
    services::{
        generation_service::{self, StudyMaterialGenerator, StudySource},
        SessionClaims,
    },
    utils::{envelope, AppError},
};
use actix_multipart::{Field, Multipart};
use actix_web::{web, HttpResponse, ResponseError};
use futures::TryStreamExt;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct GenerateTextRequest {
    /// Notes to study, plain text
    pub text: String,
    #[serde(default)]
    pub is_public: Option<bool>,
}

fn created(study_set: &StudySet) -> HttpResponse {
    envelope::ok(json!({
        "study_set_id": study_set.study_set_id,
        "study_set": StudySetSummary::from(study_set)
    }))
}

#[utoipa::path(
    post,
    path = "/api/generate/text",
    tag = "Generate",
    request_body = GenerateTextRequest,
    responses(
        (status = 200, description = "Id of the new study set, or status 0 when generation failed"),
        (status = 401, description = "No session")
    )
)]
pub async fn generate_from_text(
    db: web::Data<MongoDB>,
    config: web::Data<AppConfig>,
    generator: web::Data<dyn StudyMaterialGenerator>,
    claims: web::ReqData<SessionClaims>,
    request: web::Json<GenerateTextRequest>,
) -> HttpResponse {
    log::info!("🧠 POST /api/generate/text - user: {}, {} chars", claims.sub, request.text.chars().count());

    let result = match generation_service::validate_text(&request.text, config.max_text_chars) {
        Ok(text) => {
            generation_service::generate_study_set(
                &db,
                generator.get_ref(),
                &claims.sub,
                StudySource::Text(text),
                request.is_public.unwrap_or(false),
            )
            .await
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(study_set) => created(&study_set),
        Err(e) => {
            log::warn!("❌ Text generation failed for {}: {}", claims.sub, e);
            e.error_response()
        }
    }
}

#[derive(Debug)]
pub struct PdfUpload {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub is_public: bool,
}

pub fn parse_flag(raw: &str) -> bool {
    matches!(raw.trim().to_lowercase().as_str(), "true" | "1" | "on" | "yes")
}

async fn read_field(field: &mut Field, max_bytes: usize) -> Result<Vec<u8>, AppError> {
    let mut bytes = Vec::new();
    while let Some(chunk) = field.try_next().await? {
        if bytes.len() + chunk.len() > max_bytes {
            let limit = if max_bytes >= 1024 * 1024 {
                format!("{} MB", max_bytes / (1024 * 1024))
            } else {
                format!("{} bytes", max_bytes)
            };
            let field_name = field.name().unwrap_or("upload").to_string();
            return Err(AppError::PayloadTooLarge(format!("Field \"{}\" is too large (max {})", field_name, limit)));
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}

/// Reads the `file` and `is_public` fields, stopping as soon as the file
/// exceeds `max_bytes`.
async fn read_pdf_upload(mut payload: Multipart, max_bytes: usize) -> Result<PdfUpload, AppError> {
    let mut file: Option<(Vec<u8>, String)> = None;
    let mut is_public = false;

    while let Some(mut field) = payload.try_next().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field
                    .content_disposition()
                    .and_then(|cd| cd.get_filename())
                    .unwrap_or("notes.pdf")
                    .to_string();
                let bytes = read_field(&mut field, max_bytes).await?;
                file = Some((bytes, file_name));
            }
            "is_public" => {
                let raw = read_field(&mut field, 16).await?;
                is_public = parse_flag(&String::from_utf8_lossy(&raw));
            }
            _ => {
                while field.try_next().await?.is_some() {}
            }
        }
    }

    let (bytes, file_name) =
        file.ok_or_else(|| AppError::InvalidRequest("Please attach a PDF in the \"file\" field".to_string()))?;
    Ok(PdfUpload { bytes, file_name, is_public })
}

#[utoipa::path(
    post,
    path = "/api/generate/pdf",
    tag = "Generate",
    responses(
        (status = 200, description = "Id of the new study set, or status 0 when generation failed"),
        (status = 400, description = "Malformed multipart body"),
        (status = 401, description = "No session"),
        (status = 413, description = "PDF larger than MAX_PDF_BYTES")
    )
)]
pub async fn generate_from_pdf(
    db: web::Data<MongoDB>,
    config: web::Data<AppConfig>,
    generator: web::Data<dyn StudyMaterialGenerator>,
    claims: web::ReqData<SessionClaims>,
    payload: Multipart,
) -> HttpResponse {
    log::info!("📄 POST /api/generate/pdf - user: {}", claims.sub);

    let upload = match read_pdf_upload(payload, config.max_pdf_bytes).await {
        Ok(upload) => upload,
        Err(e) => {
            log::warn!("❌ PDF upload rejected for {}: {}", claims.sub, e);
            return e.error_response();
        }
    };

    let result = match generation_service::validate_pdf(&upload.bytes, config.max_pdf_bytes) {
        Ok(()) => {
            let source = StudySource::Pdf { bytes: upload.bytes, file_name: upload.file_name };
            generation_service::generate_study_set(&db, generator.get_ref(), &claims.sub, source, upload.is_public)
                .await
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(study_set) => created(&study_set),
        Err(e) => {
            log::warn!("❌ PDF generation failed for {}: {}", claims.sub, e);
            e.error_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test::TestRequest, FromRequest};

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("true"));
        assert!(parse_flag(" ON "));
        assert!(parse_flag("1"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag(""));
    }

    #[test]
    fn test_text_request_defaults_to_private() {
        let request: GenerateTextRequest = serde_json::from_str(r#"{"text":"notes"}"#).unwrap();
        assert_eq!(request.is_public, None);
    }

    const BOUNDARY: &str = "studysetboundary";

    fn part(name: &str, filename: Option<&str>, content_type: &str, body: &[u8]) -> Vec<u8> {
        let disposition = match filename {
            Some(filename) => format!("form-data; name=\"{}\"; filename=\"{}\"", name, filename),
            None => format!("form-data; name=\"{}\"", name),
        };
        let mut bytes = format!(
            "--{}\r\nContent-Disposition: {}\r\nContent-Type: {}\r\n\r\n",
            BOUNDARY, disposition, content_type
        )
        .into_bytes();
        bytes.extend_from_slice(body);
        bytes.extend_from_slice(b"\r\n");
        bytes
    }

    async fn upload(parts: &[Vec<u8>], closed: bool) -> Multipart {
        let mut body = parts.concat();
        if closed {
            body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        }
        let (req, mut payload) = TestRequest::post()
            .insert_header(("content-type", format!("multipart/form-data; boundary={}", BOUNDARY)))
            .set_payload(body)
            .to_http_parts();
        Multipart::from_request(&req, &mut payload).await.unwrap()
    }

    #[actix_web::test]
    async fn test_pdf_upload_reads_file_and_flag() {
        let pdf = b"%PDF-1.4 tiny notes".to_vec();
        let payload = upload(
            &[
                part("is_public", None, "text/plain", b"true"),
                part("note", None, "text/plain", b"ignored"),
                part("file", Some("chem.pdf"), "application/pdf", &pdf),
            ],
            true,
        )
        .await;

        let upload = read_pdf_upload(payload, 1024).await.unwrap();
        assert_eq!(upload.bytes, pdf);
        assert_eq!(upload.file_name, "chem.pdf");
        assert!(upload.is_public);
    }

    #[actix_web::test]
    async fn test_pdf_upload_defaults_to_private() {
        let payload = upload(&[part("file", Some("a.pdf"), "application/pdf", b"%PDF-1.4")], true).await;
        let upload = read_pdf_upload(payload, 1024).await.unwrap();
        assert!(!upload.is_public);
    }

    #[actix_web::test]
    async fn test_oversized_pdf_is_413() {
        let payload = upload(&[part("file", Some("big.pdf"), "application/pdf", &[b'x'; 4096])], true).await;

        let err = read_pdf_upload(payload, 1024).await.unwrap_err();
        assert!(matches!(err, AppError::PayloadTooLarge(ref msg) if msg.contains("\"file\"")));
        assert_eq!(err.status_code(), actix_web::http::StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[actix_web::test]
    async fn test_truncated_body_is_400() {
        let mut cut = part("file", Some("a.pdf"), "application/pdf", b"%PDF-1.4 half a document");
        cut.truncate(cut.len() - 8);
        let payload = upload(&[cut], false).await;

        let err = read_pdf_upload(payload, 1024).await.unwrap_err();
        assert!(matches!(err, AppError::MalformedUpload(_)));
        assert_eq!(err.status_code(), actix_web::http::StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_upload_without_file_is_rejected() {
        let payload = upload(&[part("is_public", None, "text/plain", b"1")], true).await;

        let err = read_pdf_upload(payload, 1024).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(ref msg) if msg.contains("\"file\"")));
    }
}
