use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use super::{round3, ExtractError};
use crate::aggregate::{dominant_label, label_counts};
use crate::llm::{Generate, GenerationOptions};
use crate::normalize::normalize;
use crate::transcript::{patient_turns, ConversationTurn};

/// Sentiment labels for patient statements, ordered roughly from most
/// positive to most distressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SentimentLabel {
    Reassured,
    Neutral,
    Concerned,
    Anxious,
}

impl SentimentLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Reassured => "Reassured",
            SentimentLabel::Neutral => "Neutral",
            SentimentLabel::Concerned => "Concerned",
            SentimentLabel::Anxious => "Anxious",
        }
    }

    /// Map a model-reported label onto the fixed set. Unrecognized labels
    /// fall back to Neutral rather than failing the statement.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "reassured" => SentimentLabel::Reassured,
            "concerned" => SentimentLabel::Concerned,
            "anxious" => SentimentLabel::Anxious,
            _ => SentimentLabel::Neutral,
        }
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sentiment of a single patient statement
#[derive(Debug, Clone, Serialize)]
pub struct SentimentAnalysis {
    pub text: String,
    pub sentiment: SentimentLabel,
    pub confidence: f64,
    pub reasoning: String,
}

impl SentimentAnalysis {
    fn neutral(text: &str) -> Self {
        Self {
            text: text.to_string(),
            sentiment: SentimentLabel::Neutral,
            confidence: 0.0,
            reasoning: String::new(),
        }
    }
}

/// Conversation-level sentiment summary
#[derive(Debug, Clone, Serialize)]
pub struct OverallSentiment {
    pub overall_sentiment: SentimentLabel,
    pub confidence: f64,
    pub distribution: Map<String, Value>,
}

impl Default for OverallSentiment {
    fn default() -> Self {
        Self {
            overall_sentiment: SentimentLabel::Neutral,
            confidence: 0.0,
            distribution: Map::new(),
        }
    }
}

/// An emotional keyword spotted in a statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmotionalIndicator {
    pub keyword: String,
    pub category: String,
}

/// Keyword lists for the offline emotional-indicator scan, injectable so
/// tests and callers can swap in alternate vocabularies.
#[derive(Debug, Clone)]
pub struct EmotionalKeywords {
    pub categories: Vec<(String, Vec<String>)>,
}

impl Default for EmotionalKeywords {
    fn default() -> Self {
        let categories = [
            (
                "anxious",
                vec!["worried", "anxious", "nervous", "scared", "afraid", "concerned", "stressed"],
            ),
            (
                "positive",
                vec!["better", "good", "great", "relief", "happy", "glad", "thankful", "appreciate"],
            ),
            (
                "negative",
                vec!["bad", "worse", "terrible", "awful", "pain", "hurt", "difficult", "struggle"],
            ),
            ("neutral", vec!["okay", "fine", "normal", "alright", "usual"]),
        ];

        Self {
            categories: categories
                .into_iter()
                .map(|(category, words)| {
                    (
                        category.to_string(),
                        words.into_iter().map(str::to_string).collect(),
                    )
                })
                .collect(),
        }
    }
}

/// Sentiment classification of patient statements.
pub struct SentimentAnalyzer {
    options: GenerationOptions,
    keywords: EmotionalKeywords,
}

impl Default for SentimentAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl SentimentAnalyzer {
    pub fn new() -> Self {
        Self {
            options: GenerationOptions::default(),
            keywords: EmotionalKeywords::default(),
        }
    }

    pub fn with_keywords(keywords: EmotionalKeywords) -> Self {
        Self {
            options: GenerationOptions::default(),
            keywords,
        }
    }

    /// Classify a single statement. Empty statements short-circuit to
    /// Neutral with zero confidence without a model call.
    pub async fn analyze_statement<G: Generate>(
        &self,
        client: &G,
        text: &str,
    ) -> Result<SentimentAnalysis, ExtractError> {
        if text.trim().is_empty() {
            return Ok(SentimentAnalysis::neutral(text));
        }

        let prompt = build_sentiment_prompt(text);
        let reply = client.generate(&prompt, &self.options).await?;
        let document = normalize(&reply)?;

        let label = document
            .get("sentiment")
            .and_then(Value::as_str)
            .unwrap_or("Neutral");
        let confidence = document
            .get("confidence")
            .and_then(Value::as_f64)
            .unwrap_or(0.5);
        let reasoning = document
            .get("reasoning")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        Ok(SentimentAnalysis {
            text: text.to_string(),
            sentiment: SentimentLabel::from_label(label),
            confidence: round3(confidence),
            reasoning,
        })
    }

    /// Classify every patient statement in a conversation. A failed
    /// statement degrades to a labeled Neutral default and never blocks the
    /// remaining statements.
    pub async fn analyze_conversation<G: Generate>(
        &self,
        client: &G,
        turns: &[ConversationTurn],
    ) -> Vec<SentimentAnalysis> {
        let mut results = Vec::new();

        for turn in patient_turns(turns) {
            match self.analyze_statement(client, &turn.text).await {
                Ok(analysis) => results.push(analysis),
                Err(err) => {
                    warn!("sentiment analysis failed for a statement: {:#}", anyhow::Error::from(err));
                    results.push(SentimentAnalysis {
                        text: turn.text.clone(),
                        sentiment: SentimentLabel::Neutral,
                        confidence: 0.5,
                        reasoning: "analysis failed".to_string(),
                    });
                }
            }
        }

        results
    }

    /// Dominant sentiment across analyzed statements: most frequent label,
    /// summed confidence breaking ties. Confidence reported is the average
    /// over all statements.
    pub fn overall_sentiment(&self, analyses: &[SentimentAnalysis]) -> OverallSentiment {
        if analyses.is_empty() {
            return OverallSentiment::default();
        }

        let records: Vec<(String, f64)> = analyses
            .iter()
            .map(|a| (a.sentiment.as_str().to_string(), a.confidence))
            .collect();

        let dominant = dominant_label(&records)
            .map(|label| SentimentLabel::from_label(&label))
            .unwrap_or(SentimentLabel::Neutral);

        let average = analyses.iter().map(|a| a.confidence).sum::<f64>() / analyses.len() as f64;

        let mut distribution = Map::new();
        for (label, count) in label_counts(&records) {
            distribution.insert(label, Value::from(count));
        }

        OverallSentiment {
            overall_sentiment: dominant,
            confidence: round3(average),
            distribution,
        }
    }

    /// Offline keyword scan for emotional indicators in a statement.
    pub fn emotional_indicators(&self, text: &str) -> Vec<EmotionalIndicator> {
        let lowered = text.to_lowercase();
        let mut found = Vec::new();

        for (category, words) in &self.keywords.categories {
            for word in words {
                if lowered.contains(word.as_str()) {
                    found.push(EmotionalIndicator {
                        keyword: word.clone(),
                        category: category.clone(),
                    });
                }
            }
        }

        found
    }
}

fn build_sentiment_prompt(text: &str) -> String {
    format!(
        r#"Analyze the sentiment of the following medical patient statement and classify it into one of these categories:
- Reassured: Patient feels confident, positive, or relieved (high positivity)
- Neutral: Patient is calm, matter-of-fact, or shows mild emotions
- Concerned: Patient shows moderate worry or uncertainty
- Anxious: Patient expresses significant worry, fear, or distress

Patient statement: "{text}"

Respond ONLY with a JSON object in this exact format (no markdown, no code blocks):
{{
    "sentiment": "one of: Reassured, Neutral, Concerned, Anxious",
    "confidence": 0.0 to 1.0,
    "reasoning": "brief explanation"
}}"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::llm::GenerateError;
    use crate::transcript::parse;

    struct CannedGenerator {
        reply: String,
    }

    impl Generate for CannedGenerator {
        async fn generate(
            &self,
            _prompt: &str,
            _options: &GenerationOptions,
        ) -> Result<String, GenerateError> {
            Ok(self.reply.clone())
        }
    }

    struct FailingGenerator;

    impl Generate for FailingGenerator {
        async fn generate(
            &self,
            _prompt: &str,
            _options: &GenerationOptions,
        ) -> Result<String, GenerateError> {
            Err(GenerateError::Empty)
        }
    }

    #[test]
    fn test_label_mapping_falls_back_to_neutral() {
        assert_eq!(SentimentLabel::from_label("Anxious"), SentimentLabel::Anxious);
        assert_eq!(SentimentLabel::from_label("anxious"), SentimentLabel::Anxious);
        assert_eq!(SentimentLabel::from_label("ecstatic"), SentimentLabel::Neutral);
    }

    #[tokio::test]
    async fn test_analyze_statement_maps_reply_fields() {
        let client = CannedGenerator {
            reply: r#"{"sentiment": "Concerned", "confidence": 0.82, "reasoning": "worry about recovery"}"#
                .to_string(),
        };

        let analyzer = SentimentAnalyzer::new();
        let analysis = analyzer
            .analyze_statement(&client, "Will this affect me long term?")
            .await
            .unwrap();

        assert_eq!(analysis.sentiment, SentimentLabel::Concerned);
        assert_eq!(analysis.confidence, 0.82);
        assert_eq!(analysis.reasoning, "worry about recovery");
    }

    #[tokio::test]
    async fn test_empty_statement_short_circuits() {
        // FailingGenerator proves no model call is made.
        let analyzer = SentimentAnalyzer::new();
        let analysis = analyzer
            .analyze_statement(&FailingGenerator, "   ")
            .await
            .unwrap();

        assert_eq!(analysis.sentiment, SentimentLabel::Neutral);
        assert_eq!(analysis.confidence, 0.0);
    }

    #[tokio::test]
    async fn test_missing_reply_fields_use_defaults() {
        let client = CannedGenerator {
            reply: "{}".to_string(),
        };

        let analyzer = SentimentAnalyzer::new();
        let analysis = analyzer.analyze_statement(&client, "Hello.").await.unwrap();

        assert_eq!(analysis.sentiment, SentimentLabel::Neutral);
        assert_eq!(analysis.confidence, 0.5);
        assert!(analysis.reasoning.is_empty());
    }

    #[tokio::test]
    async fn test_conversation_analysis_covers_patient_turns_only() {
        let client = CannedGenerator {
            reply: r#"{"sentiment": "Reassured", "confidence": 0.9, "reasoning": "relief"}"#
                .to_string(),
        };
        let turns = parse(
            "Physician: How are you?\nPatient: Better, thanks.\nPhysician: Good.\nPatient: That's a relief!\n",
        );

        let analyzer = SentimentAnalyzer::new();
        let analyses = analyzer.analyze_conversation(&client, &turns).await;

        assert_eq!(analyses.len(), 2);
        assert!(analyses.iter().all(|a| a.sentiment == SentimentLabel::Reassured));
    }

    #[tokio::test]
    async fn test_failed_statement_degrades_without_blocking() {
        let turns = parse("Patient: One.\nPhysician: Mm.\nPatient: Two.\n");

        let analyzer = SentimentAnalyzer::new();
        let analyses = analyzer.analyze_conversation(&FailingGenerator, &turns).await;

        assert_eq!(analyses.len(), 2);
        assert!(analyses.iter().all(|a| a.sentiment == SentimentLabel::Neutral));
        assert!(analyses.iter().all(|a| a.reasoning == "analysis failed"));
    }

    #[test]
    fn test_overall_sentiment_dominant_by_count() {
        let analyses = vec![
            SentimentAnalysis {
                text: String::new(),
                sentiment: SentimentLabel::Concerned,
                confidence: 0.8,
                reasoning: String::new(),
            },
            SentimentAnalysis {
                text: String::new(),
                sentiment: SentimentLabel::Reassured,
                confidence: 0.95,
                reasoning: String::new(),
            },
            SentimentAnalysis {
                text: String::new(),
                sentiment: SentimentLabel::Concerned,
                confidence: 0.6,
                reasoning: String::new(),
            },
        ];

        let analyzer = SentimentAnalyzer::new();
        let overall = analyzer.overall_sentiment(&analyses);

        assert_eq!(overall.overall_sentiment, SentimentLabel::Concerned);
        assert_eq!(overall.distribution["Concerned"], 2);
        assert_eq!(overall.distribution["Reassured"], 1);
    }

    #[test]
    fn test_overall_sentiment_empty_input() {
        let analyzer = SentimentAnalyzer::new();
        let overall = analyzer.overall_sentiment(&[]);

        assert_eq!(overall.overall_sentiment, SentimentLabel::Neutral);
        assert_eq!(overall.confidence, 0.0);
        assert!(overall.distribution.is_empty());
    }

    #[test]
    fn test_emotional_indicators() {
        let analyzer = SentimentAnalyzer::new();
        let indicators = analyzer.emotional_indicators("I'm worried the pain will get worse");

        let keywords: Vec<&str> = indicators.iter().map(|i| i.keyword.as_str()).collect();
        assert!(keywords.contains(&"worried"));
        assert!(keywords.contains(&"pain"));
        assert!(keywords.contains(&"worse"));
    }
}
