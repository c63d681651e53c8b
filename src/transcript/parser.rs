use std::fmt;

use serde::{Deserialize, Serialize};

/// Who is speaking in a turn. Only these two roles are ever attributed;
/// lines labeled with any other name are not turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Speaker {
    Physician,
    Patient,
}

impl Speaker {
    pub fn as_str(&self) -> &'static str {
        match self {
            Speaker::Physician => "Physician",
            Speaker::Patient => "Patient",
        }
    }
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One contiguous attributed utterance. Immutable once emitted; ordering in
/// the containing Vec is the chronological order in the transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub speaker: Speaker,
    pub text: String,
}

/// Parse a loosely-formatted physician-patient transcript into ordered turns.
///
/// Handles both observed conventions:
/// - markdown blockquote lines with bold speaker tags (`> **Physician:** ...`)
/// - plain `Physician: ...` / `Patient: ...` lines
///
/// Blank lines and bracketed stage directions (`[Physical Examination
/// Conducted]`) are discarded. Lines that are neither openers nor blank are
/// continuations of the active speaker; continuations before any opener are
/// dropped. Never fails: malformed input degrades to fewer or zero turns.
pub fn parse(transcript: &str) -> Vec<ConversationTurn> {
    let mut turns = Vec::new();
    let mut current_speaker: Option<Speaker> = None;
    let mut fragments: Vec<String> = Vec::new();

    for raw_line in transcript.lines() {
        let mut line = raw_line.trim();

        // Strip a leading blockquote marker.
        if let Some(rest) = line.strip_prefix('>') {
            line = rest.trim();
        }

        // Skip blanks and stage directions.
        if line.is_empty() || line.starts_with('[') {
            continue;
        }

        if let Some((speaker, trailing)) = match_opener(line) {
            flush_turn(&mut turns, current_speaker, &mut fragments);
            current_speaker = Some(speaker);
            let trailing = clean_fragment(trailing);
            if !trailing.is_empty() {
                fragments.push(trailing);
            }
        } else if current_speaker.is_some() {
            let cleaned = clean_fragment(line);
            if !cleaned.is_empty() {
                fragments.push(cleaned);
            }
        }
        // No speaker context yet: discard the line.
    }

    flush_turn(&mut turns, current_speaker, &mut fragments);
    turns
}

/// Check whether a cleaned line opens a new turn, returning the speaker and
/// any text trailing the marker on the same line.
fn match_opener(line: &str) -> Option<(Speaker, &str)> {
    const BOLD_MARKERS: [(&str, Speaker); 2] = [
        ("**Physician:**", Speaker::Physician),
        ("**Patient:**", Speaker::Patient),
    ];
    const PLAIN_MARKERS: [(&str, Speaker); 2] = [
        ("Physician:", Speaker::Physician),
        ("Patient:", Speaker::Patient),
    ];

    // Bold markers may be preceded by residual formatting, so match anywhere
    // in the line. Plain markers only open a turn at the start of the line,
    // otherwise a quoted colon inside an utterance would split the turn.
    for (marker, speaker) in BOLD_MARKERS {
        if let Some(pos) = line.find(marker) {
            return Some((speaker, &line[pos + marker.len()..]));
        }
    }
    for (marker, speaker) in PLAIN_MARKERS {
        if let Some(rest) = line.strip_prefix(marker) {
            return Some((speaker, rest));
        }
    }
    None
}

/// Strip emphasis markers and surrounding whitespace from a text fragment.
fn clean_fragment(fragment: &str) -> String {
    fragment.trim().trim_matches('*').trim().to_string()
}

/// Emit the buffered fragments as a completed turn, if non-empty.
fn flush_turn(
    turns: &mut Vec<ConversationTurn>,
    speaker: Option<Speaker>,
    fragments: &mut Vec<String>,
) {
    if let Some(speaker) = speaker {
        let text = fragments.join(" ").trim().to_string();
        if !text.is_empty() {
            turns.push(ConversationTurn { speaker, text });
        }
    }
    fragments.clear();
}

/// Turns spoken by the patient, in order. Sentiment and intent analysis only
/// looks at patient statements.
pub fn patient_turns(turns: &[ConversationTurn]) -> Vec<&ConversationTurn> {
    turns
        .iter()
        .filter(|t| t.speaker == Speaker::Patient)
        .collect()
}
