use serde::Serialize;
use serde_json::{Map, Value};
use tracing::info;

use crate::extractors::{
    preview, ExtractError, IntentAnalysis, IntentDetector, IntentSummary, OverallSentiment,
    SentimentAnalysis, SentimentAnalyzer, SentimentLabel,
};
use crate::llm::Generate;
use crate::transcript::{self, Speaker};

/// Maximum statement length echoed back in combined rows.
const STATEMENT_PREVIEW_CHARS: usize = 150;

/// Combined sentiment and intent for one patient statement
#[derive(Debug, Clone, Serialize)]
pub struct StatementAnalysis {
    pub statement: String,
    pub sentiment: SentimentLabel,
    pub sentiment_confidence: f64,
    pub intent: String,
    pub intent_confidence: f64,
    pub emotional_indicators: Vec<String>,
    pub intent_reasoning: String,
}

/// Turn counts for the analyzed conversation
#[derive(Debug, Clone, Serialize)]
pub struct ConversationStats {
    pub total_turns: usize,
    pub patient_statements: usize,
    pub physician_statements: usize,
}

/// Full combined analysis of a conversation
#[derive(Debug, Serialize)]
pub struct ConversationReport {
    pub individual_analyses: Vec<StatementAnalysis>,
    pub overall_sentiment: OverallSentiment,
    pub intent_summary: IntentSummary,
    pub conversation_stats: ConversationStats,
}

/// Assignment format for a single analyzed statement
#[derive(Debug, Clone, Serialize)]
pub struct StatementAssignment {
    #[serde(rename = "Statement")]
    pub statement: String,
    #[serde(rename = "Sentiment")]
    pub sentiment: SentimentLabel,
    #[serde(rename = "Sentiment_Confidence")]
    pub sentiment_confidence: f64,
    #[serde(rename = "Intent")]
    pub intent: String,
    #[serde(rename = "Intent_Confidence")]
    pub intent_confidence: f64,
}

/// Assignment format for a full conversation
#[derive(Debug, Serialize)]
pub struct FullAssignment {
    #[serde(rename = "Overall_Analysis")]
    pub overall_analysis: OverallAssignment,
    #[serde(rename = "All_Patient_Analyses")]
    pub all_patient_analyses: Vec<StatementAnalysis>,
    #[serde(rename = "Example_Analysis", skip_serializing_if = "Option::is_none")]
    pub example_analysis: Option<StatementAssignment>,
}

#[derive(Debug, Serialize)]
pub struct OverallAssignment {
    #[serde(rename = "Dominant_Sentiment")]
    pub dominant_sentiment: SentimentLabel,
    #[serde(rename = "Sentiment_Confidence")]
    pub sentiment_confidence: f64,
    #[serde(rename = "Dominant_Intent")]
    pub dominant_intent: String,
    #[serde(rename = "Sentiment_Distribution")]
    pub sentiment_distribution: Map<String, Value>,
    #[serde(rename = "Intent_Distribution")]
    pub intent_distribution: Map<String, Value>,
}

/// Runs sentiment and intent analysis over a transcript and merges the
/// per-statement results. Statement failures inside either analyzer are
/// already degraded to labeled defaults, so the report itself never fails.
pub struct ConversationAnalyzer {
    sentiment: SentimentAnalyzer,
    intent: IntentDetector,
}

impl Default for ConversationAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationAnalyzer {
    pub fn new() -> Self {
        Self {
            sentiment: SentimentAnalyzer::new(),
            intent: IntentDetector::new(),
        }
    }

    pub fn with_parts(sentiment: SentimentAnalyzer, intent: IntentDetector) -> Self {
        Self { sentiment, intent }
    }

    /// Parse the transcript and analyze every patient statement for both
    /// sentiment and intent.
    pub async fn analyze<G: Generate>(&self, client: &G, raw_transcript: &str) -> ConversationReport {
        let turns = transcript::parse(raw_transcript);
        let patient_count = turns.iter().filter(|t| t.speaker == Speaker::Patient).count();
        info!(
            "Parsed {} conversation turns ({} patient statements)",
            turns.len(),
            patient_count
        );

        info!("Analyzing sentiment");
        let sentiments = self.sentiment.analyze_conversation(client, &turns).await;
        let overall_sentiment = self.sentiment.overall_sentiment(&sentiments);

        info!("Detecting intent");
        let intents = self.intent.analyze_conversation(client, &turns).await;
        let intent_summary = self.intent.summary(&intents);

        let individual_analyses = self.combine(&sentiments, &intents);

        ConversationReport {
            individual_analyses,
            overall_sentiment,
            intent_summary,
            conversation_stats: ConversationStats {
                total_turns: turns.len(),
                patient_statements: patient_count,
                physician_statements: turns.len() - patient_count,
            },
        }
    }

    /// Analyze one standalone statement into the assignment shape.
    pub async fn analyze_statement<G: Generate>(
        &self,
        client: &G,
        statement: &str,
    ) -> Result<StatementAssignment, ExtractError> {
        let sentiment = self.sentiment.analyze_statement(client, statement).await?;
        let intent = self.intent.detect(client, statement).await?;

        Ok(StatementAssignment {
            statement: statement.to_string(),
            sentiment: sentiment.sentiment,
            sentiment_confidence: sentiment.confidence,
            intent: intent.primary_intent,
            intent_confidence: intent.confidence,
        })
    }

    /// Full-conversation assignment format: the overall block, every
    /// per-statement row, and an example statement picked by a concern
    /// heuristic (first anxious/concerned statement, else the first).
    pub async fn assignment_format<G: Generate>(
        &self,
        client: &G,
        raw_transcript: &str,
    ) -> FullAssignment {
        let report = self.analyze(client, raw_transcript).await;

        let example = report
            .individual_analyses
            .iter()
            .find(|row| {
                matches!(row.sentiment, SentimentLabel::Anxious | SentimentLabel::Concerned)
                    || row
                        .emotional_indicators
                        .iter()
                        .any(|k| k == "worried" || k == "concerned")
            })
            .or_else(|| report.individual_analyses.first());

        let example_analysis = example.map(|row| StatementAssignment {
            statement: row.statement.clone(),
            sentiment: row.sentiment,
            sentiment_confidence: row.sentiment_confidence,
            intent: row.intent.clone(),
            intent_confidence: row.intent_confidence,
        });

        FullAssignment {
            overall_analysis: OverallAssignment {
                dominant_sentiment: report.overall_sentiment.overall_sentiment,
                sentiment_confidence: report.overall_sentiment.confidence,
                dominant_intent: report.intent_summary.dominant_intent.clone(),
                sentiment_distribution: report.overall_sentiment.distribution.clone(),
                intent_distribution: report.intent_summary.distribution.clone(),
            },
            all_patient_analyses: report.individual_analyses,
            example_analysis,
        }
    }

    fn combine(
        &self,
        sentiments: &[SentimentAnalysis],
        intents: &[IntentAnalysis],
    ) -> Vec<StatementAnalysis> {
        sentiments
            .iter()
            .enumerate()
            .map(|(i, sentiment)| {
                let intent = intents.get(i);
                let indicators = self
                    .sentiment
                    .emotional_indicators(&sentiment.text)
                    .into_iter()
                    .map(|indicator| indicator.keyword)
                    .collect();

                StatementAnalysis {
                    statement: preview(&sentiment.text, STATEMENT_PREVIEW_CHARS),
                    sentiment: sentiment.sentiment,
                    sentiment_confidence: sentiment.confidence,
                    intent: intent
                        .map(|a| a.primary_intent.clone())
                        .unwrap_or_else(|| "unknown".to_string()),
                    intent_confidence: intent.map(|a| a.confidence).unwrap_or(0.0),
                    emotional_indicators: indicators,
                    intent_reasoning: intent.map(|a| a.reasoning.clone()).unwrap_or_default(),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::llm::{GenerateError, GenerationOptions};

    /// Replies with a sentiment document for sentiment prompts and an
    /// intent document otherwise, keyed on prompt text.
    struct RoutingGenerator;

    impl Generate for RoutingGenerator {
        async fn generate(
            &self,
            prompt: &str,
            _options: &GenerationOptions,
        ) -> Result<String, GenerateError> {
            if prompt.contains("Analyze the sentiment") {
                Ok(r#"{"sentiment": "Concerned", "confidence": 0.8, "reasoning": "worry"}"#
                    .to_string())
            } else {
                Ok(r#"{"primary_intent": "seeking reassurance", "confidence": 0.9, "reasoning": "asks about future", "all_scores": {"seeking reassurance": 0.9}}"#
                    .to_string())
            }
        }
    }

    const TRANSCRIPT: &str = "\
Physician: How are you feeling today?
Patient: I'm worried the pain will come back.
Physician: Let's take a look.
Patient: Do I need to worry about this in the future?
";

    #[tokio::test]
    async fn test_analyze_combines_modules() {
        let analyzer = ConversationAnalyzer::new();
        let report = analyzer.analyze(&RoutingGenerator, TRANSCRIPT).await;

        assert_eq!(report.conversation_stats.total_turns, 4);
        assert_eq!(report.conversation_stats.patient_statements, 2);
        assert_eq!(report.conversation_stats.physician_statements, 2);
        assert_eq!(report.individual_analyses.len(), 2);

        let first = &report.individual_analyses[0];
        assert_eq!(first.sentiment, SentimentLabel::Concerned);
        assert_eq!(first.intent, "seeking reassurance");
        assert!(first.emotional_indicators.contains(&"worried".to_string()));

        assert_eq!(
            report.overall_sentiment.overall_sentiment,
            SentimentLabel::Concerned
        );
        assert_eq!(report.intent_summary.dominant_intent, "seeking reassurance");
    }

    #[tokio::test]
    async fn test_assignment_format_picks_concerned_example() {
        let analyzer = ConversationAnalyzer::new();
        let assignment = analyzer.assignment_format(&RoutingGenerator, TRANSCRIPT).await;

        assert_eq!(
            assignment.overall_analysis.dominant_sentiment,
            SentimentLabel::Concerned
        );
        let example = assignment.example_analysis.as_ref().expect("example statement");
        assert_eq!(example.sentiment, SentimentLabel::Concerned);

        let value = serde_json::to_value(&assignment).unwrap();
        assert!(value.get("Overall_Analysis").is_some());
        assert!(value["Overall_Analysis"].get("Sentiment_Distribution").is_some());
        assert!(value.get("All_Patient_Analyses").is_some());
    }

    #[tokio::test]
    async fn test_analyze_statement_assignment_shape() {
        let analyzer = ConversationAnalyzer::new();
        let assignment = analyzer
            .analyze_statement(&RoutingGenerator, "I'm a bit worried about my back pain.")
            .await
            .unwrap();

        let value = serde_json::to_value(&assignment).unwrap();
        assert_eq!(value["Sentiment"], "Concerned");
        assert_eq!(value["Intent"], "seeking reassurance");
        assert_eq!(value["Sentiment_Confidence"], 0.8);
    }

    #[tokio::test]
    async fn test_empty_transcript_yields_empty_report() {
        let analyzer = ConversationAnalyzer::new();
        let report = analyzer.analyze(&RoutingGenerator, "no speakers here").await;

        assert_eq!(report.conversation_stats.total_turns, 0);
        assert!(report.individual_analyses.is_empty());
        assert_eq!(
            report.overall_sentiment.overall_sentiment,
            SentimentLabel::Neutral
        );
        assert_eq!(report.intent_summary.dominant_intent, "unknown");
    }
}
