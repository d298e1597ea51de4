use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const MAX_CATEGORIES: usize = 5;
pub const MAX_NAME_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    /// Accepts the model's free-form answer ("Medium", " HARD ", "beginner").
    pub fn parse_loose(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "easy" | "beginner" | "simple" => Difficulty::Easy,
            "hard" | "difficult" | "advanced" => Difficulty::Hard,
            _ => Difficulty::Medium,
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Flashcard {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Deck {
    pub flashcards: Vec<Flashcard>,
}

impl Deck {
    /// Builds a deck, dropping cards with a blank side.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let flashcards = pairs
            .into_iter()
            .map(|(q, a)| (q.trim().to_string(), a.trim().to_string()))
            .filter(|(q, a)| !q.is_empty() && !a.is_empty())
            .map(|(question, answer)| Flashcard { question, answer })
            .collect();
        Deck { flashcards }
    }

    pub fn is_empty(&self) -> bool {
        self.flashcards.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub enum ChoiceLabel {
    A,
    B,
    C,
    D,
}

impl ChoiceLabel {
    pub const ALL: [ChoiceLabel; 4] = [ChoiceLabel::A, ChoiceLabel::B, ChoiceLabel::C, ChoiceLabel::D];

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().trim_end_matches([')', '.', ':']).to_uppercase().as_str() {
            "A" => Some(ChoiceLabel::A),
            "B" => Some(ChoiceLabel::B),
            "C" => Some(ChoiceLabel::C),
            "D" => Some(ChoiceLabel::D),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Choice {
    pub label: ChoiceLabel,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct QuizQuestion {
    pub question: String,
    pub choices: Vec<Choice>,
    pub answer: ChoiceLabel,
}

impl QuizQuestion {
    /// Four non-blank, distinct choices labeled A-D in order, and a valid
    /// answer label; anything else is rejected.
    pub fn checked(question: &str, options: &[String], answer: &str) -> Option<Self> {
        let question = question.trim();
        if question.is_empty() || options.len() != ChoiceLabel::ALL.len() {
            return None;
        }

        let texts: Vec<String> = options.iter().map(|o| o.trim().to_string()).collect();
        if texts.iter().any(String::is_empty) {
            return None;
        }
        for (i, text) in texts.iter().enumerate() {
            if texts[..i].iter().any(|other| other.eq_ignore_ascii_case(text)) {
                return None;
            }
        }

        let answer = ChoiceLabel::parse(answer)?;
        let choices = ChoiceLabel::ALL
            .iter()
            .zip(texts)
            .map(|(label, text)| Choice { label: *label, text })
            .collect();

        Some(QuizQuestion {
            question: question.to_string(),
            choices,
            answer,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Quiz {
    pub questions: Vec<QuizQuestion>,
    #[serde(default)]
    pub high_score: u32,
}

impl Quiz {
    pub fn new(questions: Vec<QuizQuestion>) -> Self {
        Quiz { questions, high_score: 0 }
    }

    pub fn total(&self) -> u32 {
        self.questions.len() as u32
    }

    pub fn accepts_score(&self, score: i64) -> bool {
        score >= 0 && score <= i64::from(self.total())
    }

    pub fn is_new_high_score(&self, score: u32) -> bool {
        score > self.high_score
    }
}

/// Document in the "study_sets" collection; deck and quiz live inside it so
/// the set, its deck and its quiz are written together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudySet {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub study_set_id: String,
    pub owner_id: String,
    pub name: String,
    #[serde(default)]
    pub categories: Vec<String>,
    pub difficulty: Difficulty,
    pub is_public: bool,
    pub deck: Deck,
    pub quiz: Quiz,
    #[serde(default)]
    pub favorite_count: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl StudySet {
    pub fn new(
        owner_id: &str,
        name: &str,
        categories: Vec<String>,
        difficulty: Difficulty,
        is_public: bool,
        deck: Deck,
        quiz: Quiz,
    ) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            id: None,
            study_set_id: ObjectId::new().to_hex(),
            owner_id: owner_id.to_string(),
            name: normalize_name(name).unwrap_or_else(|| "Untitled study set".to_string()),
            categories: normalize_categories(categories),
            difficulty,
            is_public,
            deck,
            quiz,
            favorite_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.owner_id == user_id
    }

    /// Public sets are visible to everyone; private ones only to their owner.
    pub fn is_visible_to(&self, viewer: Option<&str>) -> bool {
        self.is_public || viewer.map_or(false, |id| self.is_owned_by(id))
    }
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct StudySetSummary {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub categories: Vec<String>,
    pub difficulty: Difficulty,
    pub is_public: bool,
    pub flashcard_count: usize,
    pub question_count: usize,
    pub high_score: u32,
    pub favorite_count: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<&StudySet> for StudySetSummary {
    fn from(set: &StudySet) -> Self {
        StudySetSummary {
            id: set.study_set_id.clone(),
            owner_id: set.owner_id.clone(),
            name: set.name.clone(),
            categories: set.categories.clone(),
            difficulty: set.difficulty,
            is_public: set.is_public,
            flashcard_count: set.deck.flashcards.len(),
            question_count: set.quiz.questions.len(),
            high_score: set.quiz.high_score,
            favorite_count: set.favorite_count,
            created_at: set.created_at,
            updated_at: set.updated_at,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct StudySetDetail {
    pub id: String,
    pub name: String,
    pub categories: Vec<String>,
    pub difficulty: Difficulty,
    pub is_public: bool,
    pub deck: Deck,
    pub quiz: Quiz,
    pub favorite_count: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<StudySet> for StudySetDetail {
    fn from(set: StudySet) -> Self {
        StudySetDetail {
            id: set.study_set_id,
            name: set.name,
            categories: set.categories,
            difficulty: set.difficulty,
            is_public: set.is_public,
            deck: set.deck,
            quiz: set.quiz,
            favorite_count: set.favorite_count,
            created_at: set.created_at,
            updated_at: set.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, Default, utoipa::ToSchema)]
pub struct UpdateStudySetRequest {
    pub name: Option<String>,
    pub categories: Option<Vec<String>>,
    pub difficulty: Option<Difficulty>,
    pub is_public: Option<bool>,
}

/// Trims and length-checks a study set name.
pub fn normalize_name(raw: &str) -> Option<String> {
    let name = raw.trim();
    if name.is_empty() || name.chars().count() > MAX_NAME_CHARS {
        None
    } else {
        Some(name.to_string())
    }
}

/// Trimmed, lowercased, deduplicated (first occurrence wins), at most five.
pub fn normalize_categories<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut categories: Vec<String> = Vec::new();
    for category in raw {
        let category = category.as_ref().trim().to_lowercase();
        if category.is_empty() || categories.contains(&category) {
            continue;
        }
        categories.push(category);
        if categories.len() == MAX_CATEGORIES {
            break;
        }
    }
    categories
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_difficulty_parse_loose() {
        assert_eq!(Difficulty::parse_loose(" HARD "), Difficulty::Hard);
        assert_eq!(Difficulty::parse_loose("Beginner"), Difficulty::Easy);
        assert_eq!(Difficulty::parse_loose("whatever"), Difficulty::Medium);
    }

    #[test]
    fn test_deck_drops_blank_cards() {
        let deck = Deck::from_pairs(vec![
            ("What is ATP?".to_string(), "Energy currency".to_string()),
            ("   ".to_string(), "orphan answer".to_string()),
            ("Orphan question".to_string(), "".to_string()),
        ]);
        assert_eq!(deck.flashcards.len(), 1);
        assert_eq!(deck.flashcards[0].answer, "Energy currency");
    }

    #[test]
    fn test_question_checked_accepts_valid() {
        let q = QuizQuestion::checked("2 + 2?", &options(&["3", "4", "5", "22"]), "b)").unwrap();
        assert_eq!(q.answer, ChoiceLabel::B);
        assert_eq!(q.choices[3], Choice { label: ChoiceLabel::D, text: "22".into() });
    }

    #[test]
    fn test_question_checked_rejects_malformed() {
        assert!(QuizQuestion::checked("Q", &options(&["a", "b", "c"]), "A").is_none());
        assert!(QuizQuestion::checked("Q", &options(&["a", "b", "c", "d"]), "E").is_none());
        assert!(QuizQuestion::checked("Q", &options(&["a", "B", "b", "d"]), "A").is_none());
        assert!(QuizQuestion::checked(" ", &options(&["a", "b", "c", "d"]), "A").is_none());
        assert!(QuizQuestion::checked("Q", &options(&["a", "", "c", "d"]), "A").is_none());
    }

    #[test]
    fn test_high_score_only_rises() {
        let mut quiz = Quiz::new(vec![]);
        quiz.high_score = 7;
        assert!(quiz.is_new_high_score(8));
        assert!(!quiz.is_new_high_score(7));
        assert!(!quiz.is_new_high_score(3));
    }

    #[test]
    fn test_score_bounds() {
        let q = QuizQuestion::checked("Q", &options(&["a", "b", "c", "d"]), "A").unwrap();
        let quiz = Quiz::new(vec![q.clone(), q]);
        assert!(quiz.accepts_score(0));
        assert!(quiz.accepts_score(2));
        assert!(!quiz.accepts_score(3));
        assert!(!quiz.accepts_score(-1));
    }

    #[test]
    fn test_normalize_categories() {
        let cats = normalize_categories(vec![" Biology ", "biology", "", "Cells", "a", "b", "c", "d"]);
        assert_eq!(cats, vec!["biology", "cells", "a", "b", "c"]);
    }

    #[test]
    fn test_visibility() {
        let mut set = StudySet::new("owner", "Cells", vec![], Difficulty::Easy, false, Deck::default(), Quiz::default());
        assert!(set.is_visible_to(Some("owner")));
        assert!(!set.is_visible_to(Some("someone-else")));
        assert!(!set.is_visible_to(None));
        set.is_public = true;
        assert!(set.is_visible_to(None));
    }

    #[test]
    fn test_name_normalization() {
        assert_eq!(normalize_name("  Cell biology "), Some("Cell biology".to_string()));
        assert_eq!(normalize_name("   "), None);
        assert_eq!(normalize_name(&"x".repeat(101)), None);

        let set = StudySet::new("o", "", vec![], Difficulty::Easy, true, Deck::default(), Quiz::default());
        assert_eq!(set.name, "Untitled study set");
    }
}
