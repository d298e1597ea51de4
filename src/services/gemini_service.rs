use crate::{
    config::AppConfig,
    models::Deck,
    services::generation_service::{GeneratedDeck, GeneratedQuiz, StudyMaterialGenerator, StudySource},
    utils::{
        http,
        polling::{poll_until, PollError, PollState},
        AppError,
    },
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

const API_VERSION: &str = "v1beta";

// ==================== WIRE TYPES ====================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file_data: Option<FileData>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part { text: Some(text.into()), file_data: None }
    }

    pub fn file(file: &GeminiFile) -> Self {
        Part {
            text: None,
            file_data: Some(FileData {
                mime_type: file.mime_type.clone(),
                file_uri: file.uri.clone(),
            }),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileData {
    mime_type: String,
    file_uri: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    response_schema: Value,
    temperature: f32,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

/// Files API resource
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeminiFile {
    pub name: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub error: Option<GeminiFileError>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct GeminiFileError {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: GeminiFile,
}

impl GeminiFile {
    fn poll_state(self) -> PollState<GeminiFile> {
        match self.state.as_str() {
            "ACTIVE" => PollState::Ready(self),
            "FAILED" => PollState::Failed(
                self.error
                    .map(|e| e.message)
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| "file processing failed".to_string()),
            ),
            _ => PollState::Pending,
        }
    }
}

// ==================== PROMPTS & SCHEMAS ====================

pub fn flashcard_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "name": { "type": "STRING" },
            "categories": { "type": "ARRAY", "items": { "type": "STRING" } },
            "difficulty": { "type": "STRING", "enum": ["easy", "medium", "hard"] },
            "flashcards": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "question": { "type": "STRING" },
                        "answer": { "type": "STRING" }
                    },
                    "required": ["question", "answer"]
                }
            }
        },
        "required": ["name", "categories", "difficulty", "flashcards"]
    })
}

pub fn quiz_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "questions": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "question": { "type": "STRING" },
                        "options": { "type": "ARRAY", "items": { "type": "STRING" } },
                        "answer": { "type": "STRING", "enum": ["A", "B", "C", "D"] }
                    },
                    "required": ["question", "options", "answer"]
                }
            }
        },
        "required": ["questions"]
    })
}

const FLASHCARD_INSTRUCTIONS: &str = "You are helping a student study. Read the notes and write \
flashcards that cover every important fact, definition and idea. Each flashcard has a short \
question and a concise answer. Also give the material a short descriptive name (at most 60 \
characters), up to five topic categories, and an overall difficulty of easy, medium or hard.";

const QUIZ_INSTRUCTIONS: &str = "Turn these flashcards into a multiple-choice quiz with one \
question per flashcard. Every question has exactly four options, listed in order as A, B, C \
and D, exactly one of which is correct. Wrong options should be plausible. Give the letter of \
the correct option as the answer.";

pub fn flashcard_parts(text: Option<&str>) -> Vec<Part> {
    let mut parts = vec![Part::text(FLASHCARD_INSTRUCTIONS)];
    if let Some(text) = text {
        parts.push(Part::text(format!("Notes:\n{}", text)));
    }
    parts
}

pub fn quiz_prompt(deck: &Deck) -> String {
    let cards = deck
        .flashcards
        .iter()
        .enumerate()
        .map(|(i, card)| format!("{}. Q: {}\n   A: {}", i + 1, card.question, card.answer))
        .collect::<Vec<_>>()
        .join("\n");
    format!("{}\n\nFlashcards:\n{}", QUIZ_INSTRUCTIONS, cards)
}

// ==================== RESPONSE PARSING ====================

/// Text of the first candidate, or the reason there is none.
pub fn candidate_text(response: GenerateContentResponse) -> Result<String, AppError> {
    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(AppError::Generation(format!("Prompt blocked: {}", reason)));
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| AppError::Generation("Model returned no candidates".to_string()))?;

    let finish_reason = candidate.finish_reason.unwrap_or_default();
    let text: String = candidate
        .content
        .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(AppError::Generation(format!(
            "Model returned an empty answer (finish reason: {})",
            if finish_reason.is_empty() { "unknown" } else { &finish_reason }
        )));
    }
    Ok(text)
}

/// Parses the model's JSON answer, tolerating a markdown code fence around it.
pub fn parse_model_json<T: DeserializeOwned>(text: &str) -> Result<T, AppError> {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map(|rest| rest.trim_end().trim_end_matches("```"))
        .unwrap_or(trimmed);

    serde_json::from_str(body.trim())
        .map_err(|e| AppError::Generation(format!("Model answer did not match schema: {}", e)))
}

// ==================== CLIENT ====================

#[derive(Debug, Clone)]
pub struct GeminiClient {
    api_key: String,
    model: String,
    base_url: String,
    poll_interval: Duration,
    poll_max_attempts: u32,
}

impl GeminiClient {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            api_key: config.gemini_api_key.clone(),
            model: config.gemini_model.clone(),
            base_url: config.gemini_api_base.clone(),
            poll_interval: Duration::from_secs(config.gemini_poll_interval_secs),
            poll_max_attempts: config.gemini_poll_max_attempts,
        }
    }

    fn ensure_configured(&self) -> Result<(), AppError> {
        if self.api_key.is_empty() {
            return Err(AppError::Generation("GEMINI_API_KEY not configured".to_string()));
        }
        Ok(())
    }

    async fn check_status(response: reqwest::Response, what: &str) -> Result<reqwest::Response, AppError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(AppError::Generation(format!("{} failed ({}): {}", what, status, body)))
    }

    pub async fn generate_json<T: DeserializeOwned>(&self, parts: Vec<Part>, schema: Value) -> Result<T, AppError> {
        self.ensure_configured()?;

        let url = format!("{}/{}/models/{}:generateContent", self.base_url, API_VERSION, self.model);
        let request = GenerateContentRequest {
            contents: vec![Content { role: Some("user".to_string()), parts }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_schema: schema,
                temperature: 0.4,
            },
        };

        let response = http::client()
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        let body: GenerateContentResponse = Self::check_status(response, "generateContent")
            .await?
            .json()
            .await?;

        parse_model_json(&candidate_text(body)?)
    }

    /// Resumable upload: start the session, then send the bytes in one chunk.
    pub async fn upload_file(&self, bytes: Vec<u8>, mime_type: &str, display_name: &str) -> Result<GeminiFile, AppError> {
        self.ensure_configured()?;

        let start = http::client()
            .post(format!("{}/upload/{}/files", self.base_url, API_VERSION))
            .header("x-goog-api-key", &self.api_key)
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", bytes.len().to_string())
            .header("X-Goog-Upload-Header-Content-Type", mime_type)
            .json(&json!({ "file": { "display_name": display_name } }))
            .send()
            .await?;

        let start = Self::check_status(start, "File upload start").await?;
        let upload_url = start
            .headers()
            .get("x-goog-upload-url")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| AppError::Generation("Upload session returned no upload URL".to_string()))?;

        let length = bytes.len();
        let finish = http::client()
            .post(&upload_url)
            .header("Content-Length", length.to_string())
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(bytes)
            .send()
            .await?;

        let uploaded: UploadResponse = Self::check_status(finish, "File upload").await?.json().await?;
        log::info!("📤 Uploaded {} ({} bytes) as {}", display_name, length, uploaded.file.name);
        Ok(uploaded.file)
    }

    pub async fn get_file(&self, name: &str) -> Result<GeminiFile, AppError> {
        let response = http::client()
            .get(format!("{}/{}/{}", self.base_url, API_VERSION, name))
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await?;
        Ok(Self::check_status(response, "File status").await?.json().await?)
    }

    pub async fn delete_file(&self, name: &str) -> Result<(), AppError> {
        let response = http::client()
            .delete(format!("{}/{}/{}", self.base_url, API_VERSION, name))
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await?;
        Self::check_status(response, "File delete").await?;
        Ok(())
    }

    /// Polls the uploaded file until processing finishes, at most
    /// `poll_max_attempts` times.
    pub async fn wait_until_active(&self, file: GeminiFile) -> Result<GeminiFile, AppError> {
        let name = file.name.clone();
        match file.poll_state() {
            PollState::Ready(file) => return Ok(file),
            PollState::Failed(reason) => {
                return Err(AppError::Generation(format!("File processing failed: {}", reason)))
            }
            PollState::Pending => {}
        }

        log::info!("⏳ Waiting for {} to finish processing", name);
        let client = self;
        let file_name = name.as_str();

        poll_until(self.poll_interval, self.poll_max_attempts, move || async move {
            client.get_file(file_name).await.map(GeminiFile::poll_state)
        })
        .await
        .map_err(|e| match e {
            PollError::Failed(reason) => AppError::Generation(format!("File processing failed: {}", reason)),
            PollError::Exhausted { attempts } => AppError::Generation(format!(
                "File {} still processing after {} checks",
                name, attempts
            )),
            PollError::Check(e) => e,
        })
    }
}

#[async_trait]
impl StudyMaterialGenerator for GeminiClient {
    async fn flashcards(&self, source: &StudySource) -> Result<GeneratedDeck, AppError> {
        match source {
            StudySource::Text(text) => self.generate_json(flashcard_parts(Some(text)), flashcard_schema()).await,
            StudySource::Pdf { bytes, file_name } => {
                let uploaded = self.upload_file(bytes.clone(), "application/pdf", file_name).await?;
                let name = uploaded.name.clone();

                let result = match self.wait_until_active(uploaded).await {
                    Ok(active) => {
                        let mut parts = flashcard_parts(None);
                        parts.push(Part::file(&active));
                        self.generate_json(parts, flashcard_schema()).await
                    }
                    Err(e) => Err(e),
                };

                if let Err(e) = self.delete_file(&name).await {
                    log::warn!("⚠️  Could not delete uploaded file {}: {}", name, e);
                }
                result
            }
        }
    }

    async fn quiz(&self, deck: &Deck) -> Result<GeneratedQuiz, AppError> {
        self.generate_json(vec![Part::text(quiz_prompt(deck))], quiz_schema()).await
    }
}
