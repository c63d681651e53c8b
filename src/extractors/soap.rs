use std::fmt::Write as _;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::ExtractError;
use crate::llm::{Generate, GenerationOptions};
use crate::normalize::normalize;

/// SOAP note generation from a full transcript.
pub struct SoapGenerator {
    options: GenerationOptions,
}

impl Default for SoapGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl SoapGenerator {
    pub fn new() -> Self {
        Self {
            options: GenerationOptions::default(),
        }
    }

    pub fn with_options(options: GenerationOptions) -> Self {
        Self { options }
    }

    /// Generate a four-section SOAP note. Callers substitute
    /// `SoapNote::default()` (the empty structure) when this fails.
    pub async fn generate<G: Generate>(
        &self,
        client: &G,
        transcript: &str,
    ) -> Result<SoapNote, ExtractError> {
        let prompt = build_soap_prompt(transcript);
        let reply = client.generate(&prompt, &self.options).await?;
        let document = normalize(&reply)?;
        SoapNote::from_document(document)
    }
}

/// Four-section clinical note. Field names serialize to the assignment's
/// keys (`Chief_Complaint`, `Follow-Up`, ...).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SoapNote {
    #[serde(rename = "Subjective", default)]
    pub subjective: Subjective,
    #[serde(rename = "Objective", default)]
    pub objective: Objective,
    #[serde(rename = "Assessment", default)]
    pub assessment: Assessment,
    #[serde(rename = "Plan", default)]
    pub plan: Plan,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Subjective {
    #[serde(rename = "Chief_Complaint", default, deserialize_with = "lenient_string")]
    pub chief_complaint: String,
    #[serde(
        rename = "History_of_Present_Illness",
        default,
        deserialize_with = "lenient_string"
    )]
    pub history_of_present_illness: String,
    #[serde(rename = "Past_Medical_History", default, deserialize_with = "lenient_string")]
    pub past_medical_history: String,
    #[serde(rename = "Patient_Concerns", default, deserialize_with = "lenient_string")]
    pub patient_concerns: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Objective {
    #[serde(rename = "Physical_Exam", default, deserialize_with = "lenient_string")]
    pub physical_exam: String,
    #[serde(rename = "Observations", default, deserialize_with = "lenient_string")]
    pub observations: String,
    #[serde(rename = "Vital_Signs", default, deserialize_with = "lenient_string")]
    pub vital_signs: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Assessment {
    #[serde(rename = "Diagnosis", default, deserialize_with = "lenient_string")]
    pub diagnosis: String,
    #[serde(rename = "Severity", default, deserialize_with = "lenient_string")]
    pub severity: String,
    #[serde(rename = "Prognosis", default, deserialize_with = "lenient_string")]
    pub prognosis: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Plan {
    #[serde(rename = "Treatment", default, deserialize_with = "lenient_string")]
    pub treatment: String,
    #[serde(rename = "Medications", default, deserialize_with = "lenient_string")]
    pub medications: String,
    #[serde(rename = "Follow-Up", default, deserialize_with = "lenient_string")]
    pub follow_up: String,
    #[serde(rename = "Patient_Education", default, deserialize_with = "lenient_string")]
    pub patient_education: String,
}

impl SoapNote {
    /// Map a normalized reply into the typed note. Missing or null fields
    /// become empty strings; a structurally wrong reply (a section that is
    /// not an object) is a schema error the caller can distinguish.
    pub fn from_document(document: Value) -> Result<Self, ExtractError> {
        serde_json::from_value(document).map_err(ExtractError::Schema)
    }

    /// Plain-text rendering of the note for printing or file output.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let rule = "=".repeat(60);
        let thin_rule = "-".repeat(60);

        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "SOAP NOTE");
        let _ = writeln!(out, "{rule}");

        for (section, fields) in self.sections() {
            let _ = writeln!(out, "\n{}:", section.to_uppercase());
            let _ = writeln!(out, "{thin_rule}");
            for (key, value) in fields {
                if !value.is_empty() {
                    let _ = writeln!(out, "{}: {}", key, value);
                }
            }
        }

        let _ = writeln!(out, "\n{rule}");
        out
    }

    fn sections(&self) -> Vec<(&'static str, Vec<(&'static str, &str)>)> {
        vec![
            (
                "Subjective",
                vec![
                    ("Chief Complaint", self.subjective.chief_complaint.as_str()),
                    (
                        "History Of Present Illness",
                        self.subjective.history_of_present_illness.as_str(),
                    ),
                    (
                        "Past Medical History",
                        self.subjective.past_medical_history.as_str(),
                    ),
                    ("Patient Concerns", self.subjective.patient_concerns.as_str()),
                ],
            ),
            (
                "Objective",
                vec![
                    ("Physical Exam", self.objective.physical_exam.as_str()),
                    ("Observations", self.objective.observations.as_str()),
                    ("Vital Signs", self.objective.vital_signs.as_str()),
                ],
            ),
            (
                "Assessment",
                vec![
                    ("Diagnosis", self.assessment.diagnosis.as_str()),
                    ("Severity", self.assessment.severity.as_str()),
                    ("Prognosis", self.assessment.prognosis.as_str()),
                ],
            ),
            (
                "Plan",
                vec![
                    ("Treatment", self.plan.treatment.as_str()),
                    ("Medications", self.plan.medications.as_str()),
                    ("Follow-Up", self.plan.follow_up.as_str()),
                    ("Patient Education", self.plan.patient_education.as_str()),
                ],
            ),
        ]
    }
}

/// Accept a string, null, or any other JSON value for a note field. The
/// model is told to emit strings but occasionally emits null or a list.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text,
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join("; "),
        Some(other) => other.to_string(),
    })
}

fn build_soap_prompt(transcript: &str) -> String {
    format!(
        r#"You are a medical documentation expert. Convert the following medical conversation transcript into a structured SOAP note format.

SOAP Format Guidelines:
- **Subjective**: Patient's reported symptoms, complaints, and medical history
- **Objective**: Observable findings from physical examination, vital signs, test results
- **Assessment**: Physician's diagnosis and clinical reasoning
- **Plan**: Treatment recommendations, medications, follow-up instructions

Transcript:
{transcript}

Generate a SOAP note in the following JSON format:
{{
  "Subjective": {{
    "Chief_Complaint": "Main reason for visit",
    "History_of_Present_Illness": "Detailed description of current condition",
    "Past_Medical_History": "Relevant past medical events",
    "Patient_Concerns": "Any worries or questions expressed by patient"
  }},
  "Objective": {{
    "Physical_Exam": "Findings from physical examination",
    "Observations": "Visual observations of patient condition",
    "Vital_Signs": "If mentioned in transcript"
  }},
  "Assessment": {{
    "Diagnosis": "Primary diagnosis",
    "Severity": "Condition severity assessment",
    "Prognosis": "Expected outcome"
  }},
  "Plan": {{
    "Treatment": "Recommended treatments and interventions",
    "Medications": "If any medications prescribed or mentioned",
    "Follow-Up": "Follow-up instructions and timeline",
    "Patient_Education": "Any advice or education provided"
  }}
}}

Return ONLY valid JSON without any markdown formatting or explanations."#
    )
}
