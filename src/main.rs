use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use mediscribe::{
    read_transcript, run_all, write_json, write_text, ConversationAnalyzer, EntityExtractor,
    GeminiClient, GeminiConfig, SoapGenerator,
};

#[derive(Parser)]
#[command(name = "mediscribe")]
#[command(author, version, about = "Clinical conversation analysis pipeline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a transcript into speaker-attributed turns without calling the model
    Parse {
        /// Input transcript file
        #[arg(short, long)]
        input: PathBuf,

        /// Print turns as JSON instead of text
        #[arg(long)]
        json: bool,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Extract medical entities into the assignment report format
    Entities {
        /// Input transcript file
        #[arg(short, long)]
        input: PathBuf,

        /// Output directory for JSON results
        #[arg(short, long, default_value = "outputs")]
        output_dir: PathBuf,

        /// Also run the confidence and keyword passes
        #[arg(long)]
        comprehensive: bool,

        /// Model to use
        #[arg(long, default_value = "gemini-2.5-flash-lite")]
        model: String,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Analyze sentiment and intent of patient statements
    Sentiment {
        /// Input transcript file
        #[arg(short, long)]
        input: PathBuf,

        /// Output directory for JSON results
        #[arg(short, long, default_value = "outputs")]
        output_dir: PathBuf,

        /// Analyze a single statement instead of the whole transcript
        #[arg(long)]
        statement: Option<String>,

        /// Model to use
        #[arg(long, default_value = "gemini-2.5-flash-lite")]
        model: String,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Generate a SOAP note from a transcript
    Soap {
        /// Input transcript file
        #[arg(short, long)]
        input: PathBuf,

        /// Output directory for results
        #[arg(short, long, default_value = "outputs")]
        output_dir: PathBuf,

        /// Also write a plain-text rendering of the note
        #[arg(long)]
        text: bool,

        /// Model to use
        #[arg(long, default_value = "gemini-2.5-flash-lite")]
        model: String,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Run all modules over a transcript
    Run {
        /// Input transcript file
        #[arg(short, long)]
        input: PathBuf,

        /// Output directory for results
        #[arg(short, long, default_value = "outputs")]
        output_dir: PathBuf,

        /// Model to use
        #[arg(long, default_value = "gemini-2.5-flash-lite")]
        model: String,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Parse { input, json, verbose } => {
            setup_logging(verbose);
            parse_transcript(input, json)
        }
        Commands::Entities {
            input,
            output_dir,
            comprehensive,
            model,
            verbose,
        } => {
            setup_logging(verbose);
            extract_entities(input, output_dir, comprehensive, model).await
        }
        Commands::Sentiment {
            input,
            output_dir,
            statement,
            model,
            verbose,
        } => {
            setup_logging(verbose);
            analyze_sentiment(input, output_dir, statement, model).await
        }
        Commands::Soap {
            input,
            output_dir,
            text,
            model,
            verbose,
        } => {
            setup_logging(verbose);
            generate_soap(input, output_dir, text, model).await
        }
        Commands::Run {
            input,
            output_dir,
            model,
            verbose,
        } => {
            setup_logging(verbose);
            run_pipeline(input, output_dir, model).await
        }
    }
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

fn build_client(model: String) -> Result<GeminiClient> {
    let mut config = GeminiConfig::from_env()?;
    config.model = model;
    Ok(GeminiClient::new(config))
}

fn parse_transcript(input: PathBuf, json: bool) -> Result<()> {
    let content = read_transcript(&input)?;
    let turns = mediscribe::parse(&content);

    if json {
        println!("{}", serde_json::to_string_pretty(&turns)?);
        return Ok(());
    }

    let patient = turns
        .iter()
        .filter(|t| t.speaker == mediscribe::Speaker::Patient)
        .count();
    println!("Transcript Analysis");
    println!("==================");
    println!("Total turns: {}", turns.len());
    println!("Patient statements: {}", patient);
    println!("Physician statements: {}", turns.len() - patient);
    println!();
    for turn in &turns {
        println!("{}: {}", turn.speaker, turn.text);
    }

    Ok(())
}

async fn extract_entities(
    input: PathBuf,
    output_dir: PathBuf,
    comprehensive: bool,
    model: String,
) -> Result<()> {
    let transcript = read_transcript(&input)?;
    let client = build_client(model.clone())?;
    let extractor = EntityExtractor::new();

    info!("Extracting medical entities from {:?}", input);
    let report = extractor
        .assignment_report(&client, &transcript)
        .await
        .context("Entity extraction failed")?;
    let path = write_json(&output_dir, "medical_report.json", &report)?;
    info!("Medical report written to {:?}", path);

    if comprehensive {
        let summary = extractor
            .comprehensive_summary(&client, &transcript, &model)
            .await;
        let path = write_json(&output_dir, "comprehensive_summary.json", &summary)?;
        info!("Comprehensive summary written to {:?}", path);
    }

    Ok(())
}

async fn analyze_sentiment(
    input: PathBuf,
    output_dir: PathBuf,
    statement: Option<String>,
    model: String,
) -> Result<()> {
    let client = build_client(model)?;
    let analyzer = ConversationAnalyzer::new();

    if let Some(statement) = statement {
        info!("Analyzing single statement");
        let analysis = analyzer
            .analyze_statement(&client, &statement)
            .await
            .context("Statement analysis failed")?;
        println!("{}", serde_json::to_string_pretty(&analysis)?);
        write_json(&output_dir, "sentiment_sample_analysis.json", &analysis)?;
        return Ok(());
    }

    let transcript = read_transcript(&input)?;
    info!("Analyzing full conversation from {:?}", input);
    let assignment = analyzer.assignment_format(&client, &transcript).await;

    println!(
        "Overall sentiment: {}",
        assignment.overall_analysis.dominant_sentiment
    );
    println!(
        "Dominant intent: {}",
        assignment.overall_analysis.dominant_intent
    );
    println!(
        "Patient statements analyzed: {}",
        assignment.all_patient_analyses.len()
    );

    write_json(&output_dir, "sentiment_full_analysis.json", &assignment)?;
    Ok(())
}

async fn generate_soap(
    input: PathBuf,
    output_dir: PathBuf,
    text: bool,
    model: String,
) -> Result<()> {
    let transcript = read_transcript(&input)?;
    let client = build_client(model)?;
    let generator = SoapGenerator::new();

    info!("Generating SOAP note from {:?}", input);
    let note = generator
        .generate(&client, &transcript)
        .await
        .context("SOAP note generation failed")?;

    write_json(&output_dir, "soap_note.json", &note)?;
    if text {
        write_text(&output_dir, "soap_note.txt", &note.render_text())?;
    }
    println!("{}", note.render_text());

    Ok(())
}

async fn run_pipeline(input: PathBuf, output_dir: PathBuf, model: String) -> Result<()> {
    let transcript = read_transcript(&input)?;
    let client = build_client(model)?;

    let summary = run_all(&client, &transcript, &output_dir).await?;

    info!("Wrote {} output files", summary.written.len());
    for (module, reason) in &summary.failures {
        info!("Module {module} fell back to its default structure: {reason}");
    }
    if summary.all_succeeded() {
        info!("All modules completed successfully");
    }

    Ok(())
}
