use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use super::ExtractError;
use crate::llm::{Generate, GenerationOptions};
use crate::normalize::normalize;

/// Medical entity extraction over a full transcript.
///
/// Three extraction passes are available: the full structured extraction,
/// a confidence-scored variant, and keyword extraction. All of them hand
/// the raw reply to [`normalize`] and leave schema mapping to the caller.
pub struct EntityExtractor {
    options: GenerationOptions,
}

impl Default for EntityExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityExtractor {
    pub fn new() -> Self {
        Self {
            options: GenerationOptions::default(),
        }
    }

    pub fn with_options(options: GenerationOptions) -> Self {
        Self { options }
    }

    /// Full structured extraction: patient name, symptoms, diagnosis,
    /// treatment, status, prognosis, accident details, exam findings,
    /// timeline.
    pub async fn extract<G: Generate>(
        &self,
        client: &G,
        transcript: &str,
    ) -> Result<Value, ExtractError> {
        let prompt = build_entity_prompt(transcript);
        let reply = client.generate(&prompt, &self.options).await?;
        Ok(normalize(&reply)?)
    }

    /// Extraction where every field carries a confidence score and the
    /// transcript evidence supporting it.
    pub async fn extract_with_confidence<G: Generate>(
        &self,
        client: &G,
        transcript: &str,
    ) -> Result<Value, ExtractError> {
        let prompt = build_confidence_prompt(transcript);
        let reply = client.generate(&prompt, &self.options).await?;
        Ok(normalize(&reply)?)
    }

    /// Categorized medical keyword extraction.
    pub async fn extract_keywords<G: Generate>(
        &self,
        client: &G,
        transcript: &str,
    ) -> Result<Value, ExtractError> {
        let prompt = build_keyword_prompt(transcript);
        let reply = client.generate(&prompt, &self.options).await?;
        Ok(normalize(&reply)?)
    }

    /// The assignment-format report: the full extraction flattened into
    /// `{Patient_Name, Symptoms[], Diagnosis, Treatment[], Current_Status,
    /// Prognosis}`.
    pub async fn assignment_report<G: Generate>(
        &self,
        client: &G,
        transcript: &str,
    ) -> Result<MedicalReport, ExtractError> {
        let document = self.extract(client, transcript).await?;
        Ok(MedicalReport::from_document(&document))
    }

    /// All three extraction passes combined, with metadata. Each pass is
    /// failure-isolated: a failed pass becomes null in the summary rather
    /// than aborting the others.
    pub async fn comprehensive_summary<G: Generate>(
        &self,
        client: &G,
        transcript: &str,
        model_label: &str,
    ) -> ComprehensiveSummary {
        info!("Extracting medical entities");
        let basic = self.run_pass(self.extract(client, transcript).await, "entity extraction");

        info!("Extracting with confidence scores");
        let confidence = self.run_pass(
            self.extract_with_confidence(client, transcript).await,
            "confidence extraction",
        );

        info!("Extracting medical keywords");
        let keywords = self.run_pass(
            self.extract_keywords(client, transcript).await,
            "keyword extraction",
        );

        ComprehensiveSummary {
            basic_extraction: basic,
            confidence_scored: confidence,
            keywords,
            metadata: SummaryMetadata {
                extraction_method: "Generative Model".to_string(),
                model_version: model_label.to_string(),
                generated_at: Utc::now().to_rfc3339(),
            },
        }
    }

    fn run_pass(&self, result: Result<Value, ExtractError>, pass: &str) -> Value {
        match result {
            Ok(value) => value,
            Err(err) => {
                warn!("{} failed: {:#}", pass, anyhow::Error::from(err));
                Value::Null
            }
        }
    }
}

/// Assignment-format entity report
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MedicalReport {
    #[serde(rename = "Patient_Name")]
    pub patient_name: String,
    #[serde(rename = "Symptoms")]
    pub symptoms: Vec<String>,
    #[serde(rename = "Diagnosis")]
    pub diagnosis: String,
    #[serde(rename = "Treatment")]
    pub treatment: Vec<String>,
    #[serde(rename = "Current_Status")]
    pub current_status: String,
    #[serde(rename = "Prognosis")]
    pub prognosis: String,
}

impl MedicalReport {
    /// Flatten a normalized extraction document into the assignment shape.
    /// Missing or null fields become empty defaults; structured symptom and
    /// treatment entries are rendered into single-line descriptions.
    pub fn from_document(document: &Value) -> Self {
        let symptoms = document
            .get("Symptoms")
            .and_then(Value::as_array)
            .map(|items| items.iter().map(format_symptom).collect())
            .unwrap_or_default();

        let treatment = document
            .get("Treatment")
            .and_then(Value::as_array)
            .map(|items| items.iter().map(format_treatment).collect())
            .unwrap_or_default();

        Self {
            patient_name: string_field(document, "Patient_Name"),
            symptoms,
            diagnosis: string_field(document, "Diagnosis"),
            treatment,
            current_status: string_field(document, "Current_Status"),
            prognosis: string_field(document, "Prognosis"),
        }
    }
}

/// Render a structured symptom entry as a single line, e.g.
/// `"Severe neck pain in neck (duration: four weeks, status: improving)"`.
pub fn format_symptom(symptom: &Value) -> String {
    if let Some(text) = symptom.as_str() {
        return text.to_string();
    }

    let name = non_null_field(symptom, "symptom").unwrap_or_else(|| "Unknown symptom".to_string());

    let mut description = match non_null_field(symptom, "severity") {
        Some(severity) => format!("{} {}", capitalize(&severity), name.to_lowercase()),
        None => capitalize(&name),
    };

    if let Some(body_part) = non_null_field(symptom, "body_part") {
        description = format!("{} in {}", description, body_part);
    }

    let mut extra = Vec::new();
    if let Some(duration) = non_null_field(symptom, "duration") {
        extra.push(format!("duration: {}", duration));
    }
    if let Some(status) = non_null_field(symptom, "status") {
        if status.to_lowercase() != "current" {
            extra.push(format!("status: {}", status));
        }
    }

    if extra.is_empty() {
        description
    } else {
        format!("{} ({})", description, extra.join(", "))
    }
}

/// Render a structured treatment entry as a single line, e.g.
/// `"Physiotherapy: ten sessions (at Moss Bank A&E)"`.
pub fn format_treatment(treatment: &Value) -> String {
    if let Some(text) = treatment.as_str() {
        return text.to_string();
    }

    let kind = non_null_field(treatment, "treatment_type")
        .unwrap_or_else(|| "Treatment".to_string());
    let mut description = capitalize(&kind);

    if let Some(details) = non_null_field(treatment, "details") {
        description = format!("{}: {}", description, details);
    }
    if let Some(provider) = non_null_field(treatment, "provider") {
        description = format!("{} (at {})", description, provider);
    }

    description
}

fn string_field(document: &Value, key: &str) -> String {
    document
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// A string field, treating `null`, `"none"`, and `"null"` as absent. The
/// model is instructed to use null for missing information but sometimes
/// spells it out instead.
fn non_null_field(entry: &Value, key: &str) -> Option<String> {
    let text = entry.get(key)?.as_str()?.trim();
    if text.is_empty() || text.eq_ignore_ascii_case("none") || text.eq_ignore_ascii_case("null") {
        None
    } else {
        Some(text.to_string())
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Combined output of all three extraction passes
#[derive(Debug, Serialize)]
pub struct ComprehensiveSummary {
    pub basic_extraction: Value,
    pub confidence_scored: Value,
    pub keywords: Value,
    pub metadata: SummaryMetadata,
}

#[derive(Debug, Serialize)]
pub struct SummaryMetadata {
    pub extraction_method: String,
    pub model_version: String,
    pub generated_at: String,
}

fn build_entity_prompt(transcript: &str) -> String {
    format!(
        r#"You are a medical NLP expert. Extract structured medical information from the following physician-patient conversation transcript.

TRANSCRIPT:
{transcript}

Extract the following information and return ONLY a valid JSON object (no markdown, no code blocks, just pure JSON):

{{
  "Patient_Name": "Full name of the patient",
  "Symptoms": [
    {{
      "symptom": "name of symptom",
      "severity": "mild/moderate/severe",
      "duration": "how long",
      "body_part": "affected area",
      "status": "current/resolved/improving"
    }}
  ],
  "Diagnosis": "Primary diagnosis given by physician",
  "Treatment": [
    {{
      "treatment_type": "physiotherapy/medication/procedure",
      "details": "specific details like '10 sessions of physiotherapy'",
      "provider": "where treatment was given (if mentioned)"
    }}
  ],
  "Current_Status": "Patient's current condition description",
  "Prognosis": "Expected outcome or recovery timeline",
  "Accident_Details": {{
    "date": "when accident occurred",
    "location": "where it happened",
    "mechanism": "how injury occurred",
    "immediate_impact": "immediate injuries"
  }},
  "Physical_Examination": {{
    "findings": ["list of examination findings"],
    "mobility": "assessment of range of motion",
    "tenderness": "any tender areas noted"
  }},
  "Timeline": [
    {{
      "event": "description of event",
      "timepoint": "when it occurred",
      "significance": "why it matters"
    }}
  ]
}}

IMPORTANT RULES:
1. Extract ONLY information explicitly stated in the transcript
2. If information is missing, use null
3. Do NOT invent or infer information not in the text
4. Return ONLY valid JSON, nothing else
5. Use exact quotes from transcript where possible
6. For symptoms, identify severity from context (e.g., "really bad" = severe)
"#
    )
}

fn build_confidence_prompt(transcript: &str) -> String {
    format!(
        r#"You are a medical NLP expert. Extract medical information from this transcript and rate your confidence for each extraction.

TRANSCRIPT:
{transcript}

Return a JSON object where each extracted piece of information includes a confidence score (0.0 to 1.0):

{{
  "Patient_Name": {{
    "value": "name",
    "confidence": 0.95,
    "source": "explicitly stated/inferred from context"
  }},
  "Symptoms": [
    {{
      "symptom": "symptom name",
      "confidence": 0.9,
      "evidence": "quote from transcript supporting this"
    }}
  ],
  ... (continue for all fields)
}}

Rate confidence based on:
- 1.0: Explicitly stated, no ambiguity
- 0.8-0.9: Clearly implied with strong context
- 0.6-0.7: Reasonable inference from context
- 0.4-0.5: Weak inference, multiple interpretations possible
- <0.4: Highly uncertain or missing

Return ONLY valid JSON.
"#
    )
}

fn build_keyword_prompt(transcript: &str) -> String {
    format!(
        r#"Extract the most important medical keywords and phrases from this transcript.

TRANSCRIPT:
{transcript}

Return a JSON object of important medical terms with their category:

{{
  "keywords": [
    {{
      "term": "whiplash injury",
      "category": "diagnosis",
      "importance": "high",
      "context": "brief context where it appears"
    }}
  ]
}}

Categories: symptom, diagnosis, treatment, body_part, temporal, severity_indicator, outcome

Return ONLY valid JSON.
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::llm::GenerateError;

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

    #[test]
    fn test_format_symptom_full_entry() {
        let symptom = json!({
            "symptom": "Neck pain",
            "severity": "severe",
            "duration": "four weeks",
            "body_part": "neck",
            "status": "improving"
        });
        assert_eq!(
            format_symptom(&symptom),
            "Severe neck pain in neck (duration: four weeks, status: improving)"
        );
    }

    #[test]
    fn test_format_symptom_plain_string() {
        assert_eq!(format_symptom(&json!("backache")), "backache");
    }

    #[test]
    fn test_format_symptom_null_fields_skipped() {
        let symptom = json!({
            "symptom": "backache",
            "severity": null,
            "duration": "None",
            "status": "current"
        });
        assert_eq!(format_symptom(&symptom), "Backache");
    }

    #[test]
    fn test_format_treatment_full_entry() {
        let treatment = json!({
            "treatment_type": "physiotherapy",
            "details": "ten sessions",
            "provider": "Moss Bank"
        });
        assert_eq!(
            format_treatment(&treatment),
            "Physiotherapy: ten sessions (at Moss Bank)"
        );
    }

    #[test]
    fn test_format_treatment_minimal_entry() {
        assert_eq!(format_treatment(&json!({})), "Treatment");
    }

    #[test]
    fn test_report_from_document() {
        let document = json!({
            "Patient_Name": "Janet Jones",
            "Symptoms": ["neck pain", {"symptom": "backache", "severity": "mild"}],
            "Diagnosis": "Whiplash injury",
            "Treatment": [{"treatment_type": "physiotherapy", "details": "ten sessions"}],
            "Current_Status": "Occasional backache",
            "Prognosis": "Full recovery within six months"
        });

        let report = MedicalReport::from_document(&document);

        assert_eq!(report.patient_name, "Janet Jones");
        assert_eq!(report.symptoms, vec!["neck pain", "Mild backache"]);
        assert_eq!(report.diagnosis, "Whiplash injury");
        assert_eq!(report.treatment, vec!["Physiotherapy: ten sessions"]);
        assert_eq!(report.prognosis, "Full recovery within six months");
    }

    #[test]
    fn test_report_from_empty_document_is_default() {
        let report = MedicalReport::from_document(&json!({}));
        assert!(report.patient_name.is_empty());
        assert!(report.symptoms.is_empty());
        assert!(report.treatment.is_empty());
    }

    #[test]
    fn test_report_serializes_assignment_keys() {
        let report = MedicalReport {
            patient_name: "Janet Jones".to_string(),
            ..Default::default()
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["Patient_Name"], "Janet Jones");
        assert!(value.get("Current_Status").is_some());
    }

    #[tokio::test]
    async fn test_assignment_report_via_canned_reply() {
        let client = CannedGenerator {
            reply: "```json\n{\"Patient_Name\": \"Janet Jones\", \"Diagnosis\": \"Whiplash\"}\n```"
                .to_string(),
        };

        let extractor = EntityExtractor::new();
        let report = extractor
            .assignment_report(&client, "Physician: Hello.")
            .await
            .unwrap();

        assert_eq!(report.patient_name, "Janet Jones");
        assert_eq!(report.diagnosis, "Whiplash");
    }

    #[tokio::test]
    async fn test_extract_with_garbage_reply_is_normalize_error() {
        let client = CannedGenerator {
            reply: "I could not process that transcript.".to_string(),
        };

        let extractor = EntityExtractor::new();
        let err = extractor
            .extract(&client, "Physician: Hello.")
            .await
            .unwrap_err();

        assert!(matches!(err, ExtractError::Normalize(_)));
    }
}
