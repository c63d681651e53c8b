use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{info, warn};

use crate::extractors::{EntityExtractor, MedicalReport, SoapGenerator, SoapNote};
use crate::io::write_json;
use crate::llm::Generate;
use crate::report::ConversationAnalyzer;

/// Outcome of a full pipeline run. Every module writes a file even when it
/// fails (the module's empty default structure), so downstream consumers
/// always find the expected outputs.
#[derive(Debug)]
pub struct RunSummary {
    /// Files written, in module order
    pub written: Vec<PathBuf>,
    /// Modules that fell back to their default structure, with the reason
    pub failures: Vec<(String, String)>,
}

impl RunSummary {
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Run all three modules over one transcript and write their outputs.
///
/// Modules are failure-isolated: an upstream or decode error in one module
/// is logged, recorded in the summary, and replaced by that module's empty
/// default structure; the remaining modules still run.
pub async fn run_all<G: Generate>(
    client: &G,
    transcript: &str,
    out_dir: &Path,
) -> Result<RunSummary> {
    let mut summary = RunSummary {
        written: Vec::new(),
        failures: Vec::new(),
    };

    // Module 1: medical entity extraction
    info!("Module 1: Medical entity extraction");
    let extractor = EntityExtractor::new();
    let report = match extractor.assignment_report(client, transcript).await {
        Ok(report) => report,
        Err(err) => {
            let reason = format!("{:#}", anyhow::Error::from(err));
            warn!("Entity extraction failed, writing empty report: {reason}");
            summary.failures.push(("entities".to_string(), reason));
            MedicalReport::default()
        }
    };
    summary.written.push(write_json(out_dir, "medical_report.json", &report)?);

    // Module 2: sentiment and intent
    info!("Module 2: Sentiment & intent analysis");
    let analyzer = ConversationAnalyzer::new();
    let assignment = analyzer.assignment_format(client, transcript).await;
    summary
        .written
        .push(write_json(out_dir, "sentiment_full_analysis.json", &assignment)?);

    // Module 3: SOAP note
    info!("Module 3: SOAP note generation");
    let generator = SoapGenerator::new();
    let note = match generator.generate(client, transcript).await {
        Ok(note) => note,
        Err(err) => {
            let reason = format!("{:#}", anyhow::Error::from(err));
            warn!("SOAP generation failed, writing empty note: {reason}");
            summary.failures.push(("soap".to_string(), reason));
            SoapNote::default()
        }
    };
    summary.written.push(write_json(out_dir, "soap_note.json", &note)?);

    Ok(summary)
}
