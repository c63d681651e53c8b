use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

use super::{preview, round3, ExtractError};
use crate::aggregate::{dominant_label, filter_by_threshold, label_counts};
use crate::llm::{Generate, GenerationOptions};
use crate::normalize::normalize;
use crate::transcript::{patient_turns, ConversationTurn};

/// Intent categories used when none are supplied at construction.
pub const DEFAULT_INTENT_CATEGORIES: [&str; 8] = [
    "seeking reassurance",
    "reporting symptoms",
    "expressing concern",
    "asking questions",
    "providing information",
    "describing timeline",
    "expressing gratitude",
    "describing impact on life",
];

/// Maximum statement length echoed back in results.
const TEXT_PREVIEW_CHARS: usize = 100;

/// Intent classification of a single patient statement
#[derive(Debug, Clone, Serialize)]
pub struct IntentAnalysis {
    pub text: String,
    pub primary_intent: String,
    pub confidence: f64,
    pub reasoning: String,
    pub all_scores: Map<String, Value>,
}

impl IntentAnalysis {
    fn unlabeled(text: &str, label: &str) -> Self {
        Self {
            text: text.to_string(),
            primary_intent: label.to_string(),
            confidence: 0.0,
            reasoning: String::new(),
            all_scores: Map::new(),
        }
    }
}

/// One intent kept by the multi-intent threshold filter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredIntent {
    pub intent: String,
    pub confidence: f64,
}

/// Conversation-level intent summary
#[derive(Debug, Clone, Serialize)]
pub struct IntentSummary {
    pub dominant_intent: String,
    pub distribution: Map<String, Value>,
    pub total_statements: usize,
}

impl Default for IntentSummary {
    fn default() -> Self {
        Self {
            dominant_intent: "unknown".to_string(),
            distribution: Map::new(),
            total_statements: 0,
        }
    }
}

/// Intent classification over a fixed category list. The list is immutable
/// configuration passed at construction so tests can inject alternates.
pub struct IntentDetector {
    categories: Vec<String>,
    options: GenerationOptions,
}

impl Default for IntentDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl IntentDetector {
    pub fn new() -> Self {
        Self::with_categories(
            DEFAULT_INTENT_CATEGORIES
                .iter()
                .map(|c| c.to_string())
                .collect(),
        )
    }

    pub fn with_categories(categories: Vec<String>) -> Self {
        Self {
            categories,
            options: GenerationOptions::default(),
        }
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// Classify a single statement into one of the configured categories.
    /// Empty statements short-circuit to "unknown" without a model call.
    pub async fn detect<G: Generate>(
        &self,
        client: &G,
        text: &str,
    ) -> Result<IntentAnalysis, ExtractError> {
        if text.trim().is_empty() {
            return Ok(IntentAnalysis::unlabeled(text, "unknown"));
        }

        let prompt = build_intent_prompt(text, &self.categories);
        let reply = client.generate(&prompt, &self.options).await?;
        let document = normalize(&reply)?;

        let primary_intent = document
            .get("primary_intent")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        let confidence = document
            .get("confidence")
            .and_then(Value::as_f64)
            .unwrap_or(0.0);
        let reasoning = document
            .get("reasoning")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let all_scores = document
            .get("all_scores")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        Ok(IntentAnalysis {
            text: preview(text, TEXT_PREVIEW_CHARS),
            primary_intent,
            confidence: round3(confidence),
            reasoning,
            all_scores,
        })
    }

    /// All intents scoring at or above `threshold`, descending. Ties keep
    /// the order the model emitted the score map in.
    pub async fn detect_multi<G: Generate>(
        &self,
        client: &G,
        text: &str,
        threshold: f64,
    ) -> Result<Vec<ScoredIntent>, ExtractError> {
        let analysis = self.detect(client, text).await?;
        Ok(filter_scores(&analysis.all_scores, threshold))
    }

    /// Classify every patient statement. Failures degrade to an "error"
    /// label so one statement never blocks the rest.
    pub async fn analyze_conversation<G: Generate>(
        &self,
        client: &G,
        turns: &[ConversationTurn],
    ) -> Vec<IntentAnalysis> {
        let mut results = Vec::new();

        for turn in patient_turns(turns) {
            match self.detect(client, &turn.text).await {
                Ok(analysis) => results.push(analysis),
                Err(err) => {
                    warn!("intent detection failed for a statement: {:#}", anyhow::Error::from(err));
                    results.push(IntentAnalysis::unlabeled(&turn.text, "error"));
                }
            }
        }

        results
    }

    /// Dominant intent over analyzed statements, with a per-label count
    /// distribution.
    pub fn summary(&self, analyses: &[IntentAnalysis]) -> IntentSummary {
        if analyses.is_empty() {
            return IntentSummary::default();
        }

        let records: Vec<(String, f64)> = analyses
            .iter()
            .map(|a| (a.primary_intent.clone(), a.confidence))
            .collect();

        let dominant = dominant_label(&records).unwrap_or_else(|| "unknown".to_string());

        let mut distribution = Map::new();
        for (label, count) in label_counts(&records) {
            distribution.insert(label, Value::from(count));
        }

        IntentSummary {
            dominant_intent: dominant,
            distribution,
            total_statements: analyses.len(),
        }
    }
}

/// Apply the shared threshold filter to a model-emitted score map.
fn filter_scores(all_scores: &Map<String, Value>, threshold: f64) -> Vec<ScoredIntent> {
    let pairs: Vec<(String, f64)> = all_scores
        .iter()
        .filter_map(|(label, score)| score.as_f64().map(|s| (label.clone(), s)))
        .collect();

    filter_by_threshold(&pairs, threshold)
        .into_iter()
        .map(|(intent, confidence)| ScoredIntent {
            intent,
            confidence: round3(confidence),
        })
        .collect()
}

fn build_intent_prompt(text: &str, categories: &[String]) -> String {
    let category_list = categories.join(", ");
    let score_template: String = categories
        .iter()
        .map(|c| format!("    \"{c}\": 0.0"))
        .collect::<Vec<_>>()
        .join(",\n");

    format!(
        r#"You are an expert in analyzing medical conversation intent.

Analyze the intent of this patient statement and classify it into ONE of these categories:
{category_list}

Patient statement: "{text}"

Return ONLY a valid JSON object (no markdown, no code blocks, just pure JSON):
{{
  "primary_intent": "the most appropriate category from the list",
  "confidence": 0.85,
  "reasoning": "brief 1-sentence explanation",
  "all_scores": {{
{score_template}
  }}
}}

IMPORTANT:
- Choose only from the provided categories
- Confidence should be 0.0 to 1.0
- Include scores for all categories in all_scores
- Return ONLY valid JSON
"#
    )
}
