// Question Source: the ordered questions posed in a session.

use crate::errors::InterviewError;

/// Reference question set asked of every candidate.
pub const DEFAULT_QUESTIONS: [&str; 5] = [
    "Tell me about your relevant work experience.",
    "What are your key technical skills?",
    "Describe a challenging project you worked on.",
    "What are your career goals?",
    "Why are you interested in this position?",
];

/// Supplies the question list for a new session.
pub trait QuestionSource: Send + Sync {
    fn questions(&self) -> Vec<String>;
}

#[derive(Debug, Clone)]
pub struct StaticQuestions {
    questions: Vec<String>,
}

impl StaticQuestions {
    pub fn new(questions: Vec<String>) -> Self {
        Self { questions }
    }
}

impl Default for StaticQuestions {
    fn default() -> Self {
        Self::new(DEFAULT_QUESTIONS.iter().map(|q| q.to_string()).collect())
    }
}

impl QuestionSource for StaticQuestions {
    fn questions(&self) -> Vec<String> {
        self.questions.clone()
    }
}

/// Trims caller-supplied questions and rejects empty lists.
/// Blank entries are dropped before the emptiness check.
pub fn normalize_questions(questions: Vec<String>) -> Result<Vec<String>, InterviewError> {
    let questions: Vec<String> = questions
        .into_iter()
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .collect();

    if questions.is_empty() {
        return Err(InterviewError::EmptyQuestionList);
    }
    Ok(questions)
}
