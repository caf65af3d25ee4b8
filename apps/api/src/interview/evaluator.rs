//! Evaluator: pluggable, trait-based policy that turns a finished transcript
//! into a score and a pass/fail decision.
//!
//! Default: `RandomEvaluator` (placeholder scoring, seedable for tests).
//!
//! `AppState` holds an `Arc<dyn Evaluator>`; every conductor shares it.

use std::ops::RangeInclusive;
use std::sync::Mutex;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::errors::InterviewError;
use crate::interview::models::{Decision, EvaluationResult, Turn};

/// Inclusive score range produced by the reference policy.
pub const SCORE_RANGE: RangeInclusive<u32> = 70..=100;
/// Scores at or above this pass.
pub const PASS_THRESHOLD: u32 = 75;

// ────────────────────────────────────────────────────────────────────────────
// Trait definition
// ────────────────────────────────────────────────────────────────────────────

/// Implement this to swap scoring backends without touching the conductor.
#[async_trait]
pub trait Evaluator: Send + Sync {
    async fn evaluate(&self, transcript: &[Turn]) -> Result<EvaluationResult, InterviewError>;
}

// ────────────────────────────────────────────────────────────────────────────
// RandomEvaluator: reference policy
// ────────────────────────────────────────────────────────────────────────────

/// Draws a score uniformly from `SCORE_RANGE`; the transcript content is ignored.
pub struct RandomEvaluator {
    rng: Mutex<StdRng>,
}

impl RandomEvaluator {
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    pub fn from_entropy() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    pub fn with_rng(rng: StdRng) -> Self {
        Self {
            rng: Mutex::new(rng),
        }
    }

    fn draw_score(&self) -> Result<u32, InterviewError> {
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| InterviewError::Evaluation("random source poisoned".to_string()))?;
        Ok(rng.gen_range(SCORE_RANGE))
    }
}

#[async_trait]
impl Evaluator for RandomEvaluator {
    async fn evaluate(&self, _transcript: &[Turn]) -> Result<EvaluationResult, InterviewError> {
        Ok(result_for_score(self.draw_score()?))
    }
}

/// Builds the decision and recommendation text for a score.
pub fn result_for_score(score: u32) -> EvaluationResult {
    let decision = if score >= PASS_THRESHOLD {
        Decision::Pass
    } else {
        Decision::Fail
    };

    EvaluationResult {
        decision,
        score,
        recommendation: build_recommendation(decision, score),
    }
}

fn build_recommendation(decision: Decision, score: u32) -> String {
    match decision {
        Decision::Pass => format!(
            "Strong candidate with relevant experience and skills. Score: {score}/100. Recommended for next interview round."
        ),
        Decision::Fail => format!(
            "Candidate does not meet minimum requirements. Score: {score}/100. Not recommended to proceed."
        ),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
