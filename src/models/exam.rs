//! Exam skeleton, canonical lookup, and answer record types.

use std::collections::HashMap;

use serde::Serialize;

/// Minimal sub-question payload sent to the extraction service.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SkeletonSubQuestion {
    /// Human-authored sub-question text; the service echoes this verbatim.
    pub sub_q_text_content: String,
}

/// Minimal question payload sent to the extraction service.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SkeletonQuestion {
    /// Question number; the service echoes this verbatim.
    pub question_number: i64,
    /// Sub-questions under this number.
    pub sub_questions: Vec<SkeletonSubQuestion>,
}

/// Exam skeleton: question numbers and sub-question texts only.
///
/// Deliberately carries no internal IDs, points, or prior answers — the
/// extraction service needs text keys and nothing else.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ExamSkeleton {
    /// Ordered questions for the exam.
    pub questions: Vec<SkeletonQuestion>,
}

/// Two-level text-keyed map resolving `(question_number, sub_q_text_content)`
/// to the canonical `sub_question_id`.
///
/// Rebuilt from the store immediately before reconciliation so a concurrent
/// exam edit cannot leave stale IDs in play.
#[derive(Debug, Clone, Default)]
pub struct CanonicalLookup {
    by_question: HashMap<i64, HashMap<String, String>>,
}

impl CanonicalLookup {
    /// Register one sub-question under its question number and text key.
    pub fn insert(&mut self, question_number: i64, sub_q_text: String, sub_question_id: String) {
        self.by_question
            .entry(question_number)
            .or_default()
            .insert(sub_q_text, sub_question_id);
    }

    /// Exact-string resolution; no fuzzy matching by design — the service
    /// echoes back exactly the text it was given.
    #[must_use]
    pub fn resolve(&self, question_number: i64, sub_q_text: &str) -> Option<&str> {
        self.by_question
            .get(&question_number)
            .and_then(|subs| subs.get(sub_q_text))
            .map(String::as_str)
    }

    /// Number of registered sub-questions across all questions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_question.values().map(HashMap::len).sum()
    }

    /// Whether the lookup holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_question.is_empty()
    }
}

/// Answer row persisted for one sub-question of one student's exam.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerRecord {
    /// Student-exam the answer belongs to.
    pub student_exam_id: String,
    /// Resolved canonical sub-question; never persisted unresolved.
    pub sub_question_id: String,
    /// Answer text, possibly edited later by a grader.
    pub answer_text: Option<String>,
    /// Extraction text preserved verbatim before any later edits.
    pub orig_answer_text: Option<String>,
    /// Public URL of the uploaded answer visual, if one was found.
    pub answer_visual: Option<String>,
}
