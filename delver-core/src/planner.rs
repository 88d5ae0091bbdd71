//! Query planning — one-shot clarification before the tree starts.
//!
//! Asks the query refiner for clarifying questions about the raw topic.
//! Collecting the answers is the caller's concern (terminal I/O lives
//! outside the core); the answered pairs are folded into the root query
//! text here. A refiner outage degrades to the raw topic.

use crate::collaborators::QueryRefiner;
use crate::error::PlanError;
use std::sync::Arc;
use tracing::{debug, warn};

/// A clarifying question paired with the answer the caller collected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clarification {
    pub question: String,
    pub answer: String,
}

/// One-shot planner wrapping the query-refinement collaborator.
pub struct QueryPlanner {
    refiner: Arc<dyn QueryRefiner>,
    max_questions: usize,
}

impl QueryPlanner {
    pub fn new(refiner: Arc<dyn QueryRefiner>, max_questions: usize) -> Self {
        Self {
            refiner,
            max_questions,
        }
    }

    /// Propose clarifying questions for the topic.
    ///
    /// A refiner failure is recoverable: it is logged and an empty question
    /// list is returned, so research proceeds with the raw topic.
    pub async fn plan(&self, topic: &str) -> Vec<String> {
        match self
            .refiner
            .follow_up_questions(topic, self.max_questions)
            .await
        {
            Ok(questions) => {
                debug!(
                    topic,
                    questions = questions.len(),
                    "Planner proposed clarifying questions"
                );
                questions
            }
            Err(e) => {
                warn!(topic, error = %e, "Planner unavailable, proceeding with raw topic");
                Vec::new()
            }
        }
    }

    /// Like [`plan`](Self::plan) but surfacing the error, for callers that
    /// want to distinguish an outage from an empty proposal.
    pub async fn try_plan(&self, topic: &str) -> Result<Vec<String>, PlanError> {
        self.refiner
            .follow_up_questions(topic, self.max_questions)
            .await
    }
}

/// Fold the topic and answered clarifications into the root query text.
///
/// Unanswered questions (empty answers) are skipped rather than sent as
/// noise to the search provider.
pub fn compose_root_query(topic: &str, clarifications: &[Clarification]) -> String {
    let mut query = format!("Initial query: {topic}");
    let answered: Vec<&Clarification> = clarifications
        .iter()
        .filter(|c| !c.answer.trim().is_empty())
        .collect();
    if !answered.is_empty() {
        query.push_str("\nFollow-up questions and answers:");
        for clarification in answered {
            query.push_str(&format!(
                "\nQ: {}\nA: {}",
                clarification.question, clarification.answer
            ));
        }
    }
    query
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::mock::MockQueryRefiner;

    fn make_clarification(question: &str, answer: &str) -> Clarification {
        Clarification {
            question: question.to_string(),
            answer: answer.to_string(),
        }
    }

    #[tokio::test]
    async fn test_plan_returns_questions() {
        let planner = QueryPlanner::new(
            Arc::new(MockQueryRefiner::new(vec![
                "Which time period?".into(),
                "Which region?".into(),
            ])),
            3,
        );
        let questions = planner.plan("solar adoption").await;
        assert_eq!(questions.len(), 2);
    }

    #[tokio::test]
    async fn test_plan_caps_questions() {
        let planner = QueryPlanner::new(
            Arc::new(MockQueryRefiner::new(vec![
                "Q1?".into(),
                "Q2?".into(),
                "Q3?".into(),
            ])),
            1,
        );
        let questions = planner.plan("topic").await;
        assert_eq!(questions, vec!["Q1?"]);
    }

    #[tokio::test]
    async fn test_planner_outage_degrades_to_no_questions() {
        let planner = QueryPlanner::new(Arc::new(MockQueryRefiner::unavailable()), 3);
        assert!(planner.plan("topic").await.is_empty());
        assert!(planner.try_plan("topic").await.is_err());
    }

    #[test]
    fn test_compose_root_query_with_answers() {
        let query = compose_root_query(
            "solar adoption",
            &[
                make_clarification("Which region?", "Europe"),
                make_clarification("Which time period?", "2020-2025"),
            ],
        );
        assert!(query.starts_with("Initial query: solar adoption"));
        assert!(query.contains("Q: Which region?\nA: Europe"));
        assert!(query.contains("Q: Which time period?\nA: 2020-2025"));
    }

    #[test]
    fn test_compose_root_query_skips_unanswered() {
        let query = compose_root_query(
            "solar adoption",
            &[make_clarification("Which region?", "   ")],
        );
        assert_eq!(query, "Initial query: solar adoption");
    }

    #[test]
    fn test_compose_root_query_without_clarifications() {
        assert_eq!(
            compose_root_query("solar adoption", &[]),
            "Initial query: solar adoption"
        );
    }
}
