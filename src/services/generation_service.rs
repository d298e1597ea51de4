use crate::{
    database::{MongoDB, STUDY_SETS},
    models::{normalize_categories, Deck, Difficulty, Quiz, QuizQuestion, StudySet},
    utils::AppError,
};
use async_trait::async_trait;
use serde::Deserialize;

pub const PDF_MAGIC: &[u8] = b"%PDF-";

/// Uploaded notes to turn into a study set.
#[derive(Debug, Clone)]
pub enum StudySource {
    Text(String),
    Pdf { bytes: Vec<u8>, file_name: String },
}

impl StudySource {
    pub fn kind(&self) -> &'static str {
        match self {
            StudySource::Text(_) => "text",
            StudySource::Pdf { .. } => "pdf",
        }
    }
}

/// First model call: deck plus set metadata.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeneratedDeck {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub difficulty: String,
    #[serde(default)]
    pub flashcards: Vec<GeneratedFlashcard>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeneratedFlashcard {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub answer: String,
}

/// Second model call: quiz built from the deck.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeneratedQuiz {
    #[serde(default)]
    pub questions: Vec<GeneratedQuestion>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeneratedQuestion {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub answer: String,
}

/// The hosted model seen from the orchestration side.
#[async_trait]
pub trait StudyMaterialGenerator: Send + Sync {
    async fn flashcards(&self, source: &StudySource) -> Result<GeneratedDeck, AppError>;

    async fn quiz(&self, deck: &Deck) -> Result<GeneratedQuiz, AppError>;
}

pub fn validate_text(raw: &str, max_chars: usize) -> Result<String, AppError> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(AppError::InvalidRequest("Please provide some notes to study".to_string()));
    }
    if text.chars().count() > max_chars {
        return Err(AppError::InvalidRequest(format!(
            "Notes are too long (max {} characters)",
            max_chars
        )));
    }
    Ok(text.to_string())
}

pub fn validate_pdf(bytes: &[u8], max_bytes: usize) -> Result<(), AppError> {
    if bytes.len() > max_bytes {
        return Err(AppError::PayloadTooLarge(format!(
            "PDF is too large (max {} MB)",
            max_bytes / (1024 * 1024)
        )));
    }
    if !bytes.starts_with(PDF_MAGIC) {
        return Err(AppError::InvalidRequest("Uploaded file is not a PDF".to_string()));
    }
    Ok(())
}

/// Runs both model calls and assembles the set. Nothing is persisted here.
pub async fn assemble_study_set(
    generator: &dyn StudyMaterialGenerator,
    owner_id: &str,
    source: &StudySource,
    is_public: bool,
) -> Result<StudySet, AppError> {
    log::info!("🧠 Generating flashcards from {} source for user {}", source.kind(), owner_id);
    let generated = generator.flashcards(source).await?;

    let deck = Deck::from_pairs(
        generated
            .flashcards
            .into_iter()
            .map(|card| (card.question, card.answer)),
    );
    if deck.is_empty() {
        return Err(AppError::Generation("Model returned no usable flashcards".to_string()));
    }

    log::info!("📝 Generating quiz from {} flashcards", deck.flashcards.len());
    let generated_quiz = generator.quiz(&deck).await?;

    let offered = generated_quiz.questions.len();
    let questions: Vec<QuizQuestion> = generated_quiz
        .questions
        .iter()
        .filter_map(|q| QuizQuestion::checked(&q.question, &q.options, &q.answer))
        .collect();

    if questions.is_empty() {
        return Err(AppError::Generation("Model returned no usable quiz questions".to_string()));
    }
    if questions.len() < offered {
        log::warn!("⚠️  Dropped {} malformed quiz questions", offered - questions.len());
    }

    Ok(StudySet::new(
        owner_id,
        &generated.name,
        normalize_categories(generated.categories),
        Difficulty::parse_loose(&generated.difficulty),
        is_public,
        deck,
        Quiz::new(questions),
    ))
}

/// Generates and stores a study set; deck and quiz land in the same write.
pub async fn generate_study_set(
    db: &MongoDB,
    generator: &dyn StudyMaterialGenerator,
    owner_id: &str,
    source: StudySource,
    is_public: bool,
) -> Result<StudySet, AppError> {
    let study_set = assemble_study_set(generator, owner_id, &source, is_public).await?;

    db.collection::<StudySet>(STUDY_SETS).insert_one(&study_set).await?;

    log::info!(
        "✅ Study set {} created ({} cards, {} questions)",
        study_set.study_set_id,
        study_set.deck.flashcards.len(),
        study_set.quiz.questions.len()
    );
    Ok(study_set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChoiceLabel;
    use std::sync::Mutex;

    struct FakeGenerator {
        deck: GeneratedDeck,
        quiz: GeneratedQuiz,
        seen_deck_sizes: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl StudyMaterialGenerator for FakeGenerator {
        async fn flashcards(&self, _source: &StudySource) -> Result<GeneratedDeck, AppError> {
            Ok(self.deck.clone())
        }

        async fn quiz(&self, deck: &Deck) -> Result<GeneratedQuiz, AppError> {
            self.seen_deck_sizes.lock().unwrap().push(deck.flashcards.len());
            Ok(self.quiz.clone())
        }
    }

    fn card(q: &str, a: &str) -> GeneratedFlashcard {
        GeneratedFlashcard { question: q.into(), answer: a.into() }
    }

    fn question(q: &str, options: &[&str], answer: &str) -> GeneratedQuestion {
        GeneratedQuestion {
            question: q.into(),
            options: options.iter().map(|o| o.to_string()).collect(),
            answer: answer.into(),
        }
    }

    fn generator(deck: GeneratedDeck, quiz: GeneratedQuiz) -> FakeGenerator {
        FakeGenerator { deck, quiz, seen_deck_sizes: Mutex::new(vec![]) }
    }

    #[tokio::test]
    async fn test_assembles_normalized_set() {
        let fake = generator(
            GeneratedDeck {
                name: "  Cell Biology ".into(),
                categories: vec!["Biology".into(), "biology".into(), "Cells".into()],
                difficulty: "Hard".into(),
                flashcards: vec![card("What is a ribosome?", "Protein factory"), card("", "dangling")],
            },
            GeneratedQuiz {
                questions: vec![
                    question("Ribosomes make?", &["Lipids", "Proteins", "DNA", "Sugar"], "B"),
                    question("Broken", &["only", "three", "options"], "A"),
                ],
            },
        );

        let set = assemble_study_set(&fake, "owner-1", &StudySource::Text("notes".into()), true)
            .await
            .unwrap();

        assert_eq!(set.name, "Cell Biology");
        assert_eq!(set.categories, vec!["biology", "cells"]);
        assert_eq!(set.difficulty, Difficulty::Hard);
        assert_eq!(set.deck.flashcards.len(), 1);
        assert_eq!(set.quiz.questions.len(), 1);
        assert_eq!(set.quiz.questions[0].answer, ChoiceLabel::B);
        assert_eq!(set.quiz.high_score, 0);
        assert!(set.is_public);
        assert_eq!(set.owner_id, "owner-1");
        // The quiz call sees the cleaned deck
        assert_eq!(*fake.seen_deck_sizes.lock().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn test_empty_deck_fails_before_quiz_call() {
        let fake = generator(
            GeneratedDeck { flashcards: vec![card(" ", " ")], ..Default::default() },
            GeneratedQuiz::default(),
        );

        let result = assemble_study_set(&fake, "o", &StudySource::Text("x".into()), false).await;
        assert!(matches!(result, Err(AppError::Generation(_))));
        assert!(fake.seen_deck_sizes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_no_valid_questions_fails() {
        let fake = generator(
            GeneratedDeck { flashcards: vec![card("q", "a")], ..Default::default() },
            GeneratedQuiz { questions: vec![question("q", &["a", "b", "c", "d"], "Z")] },
        );

        let result = assemble_study_set(&fake, "o", &StudySource::Text("x".into()), false).await;
        assert!(matches!(result, Err(AppError::Generation(_))));
    }

    #[test]
    fn test_validate_text() {
        assert_eq!(validate_text("  notes  ", 10).unwrap(), "notes");
        assert!(validate_text("   ", 10).is_err());
        assert!(validate_text("12345678901", 10).is_err());
    }

    #[test]
    fn test_validate_pdf() {
        assert!(validate_pdf(b"%PDF-1.7 rest", 1024).is_ok());
        assert!(matches!(validate_pdf(b"PK\x03\x04", 1024), Err(AppError::InvalidRequest(_))));
        let mut big = PDF_MAGIC.to_vec();
        big.extend(vec![0u8; 2048]);
        assert!(matches!(validate_pdf(&big, 1024), Err(AppError::PayloadTooLarge(_))));
    }
}
