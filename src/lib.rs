pub mod aggregate;
pub mod extractors;
pub mod io;
pub mod llm;
pub mod normalize;
pub mod pipeline;
pub mod report;
pub mod transcript;

pub use aggregate::{dominant_label, filter_by_threshold, label_counts};
pub use extractors::{
    EntityExtractor, ExtractError, IntentDetector, MedicalReport, SentimentAnalyzer,
    SentimentLabel, SoapGenerator, SoapNote,
};
pub use io::{read_transcript, write_json, write_text};
pub use llm::{Generate, GenerateError, GeminiClient, GeminiConfig, GenerationOptions};
pub use normalize::{normalize, ParseFailure};
pub use pipeline::{run_all, RunSummary};
pub use report::ConversationAnalyzer;
pub use transcript::{parse, ConversationTurn, Speaker};
