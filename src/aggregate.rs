use std::cmp::Ordering;

/// Pick the dominant label from a sequence of `(label, confidence)` records.
///
/// Frequency count wins; ties break on summed confidence, then on first
/// appearance in the input. Deterministic for identical input order. Empty
/// input yields `None`.
pub fn dominant_label<S: AsRef<str>>(records: &[(S, f64)]) -> Option<String> {
    let tallies = tally(records);

    let mut best: Option<&Tally> = None;
    for tally in &tallies {
        let better = match best {
            None => true,
            Some(b) => {
                tally.count > b.count
                    || (tally.count == b.count && tally.confidence_sum > b.confidence_sum)
            }
        };
        if better {
            best = Some(tally);
        }
    }

    best.map(|t| t.label.clone())
}

/// Per-label frequency counts in first-seen order. Backs the distribution
/// objects in the sentiment and intent summaries.
pub fn label_counts<S: AsRef<str>>(records: &[(S, f64)]) -> Vec<(String, usize)> {
    tally(records)
        .into_iter()
        .map(|t| (t.label, t.count))
        .collect()
}

/// Keep labels scoring at or above `threshold`, sorted descending by score.
/// The sort is stable, so ties keep their original input order.
pub fn filter_by_threshold(scores: &[(String, f64)], threshold: f64) -> Vec<(String, f64)> {
    let mut kept: Vec<(String, f64)> = scores
        .iter()
        .filter(|(_, score)| *score >= threshold)
        .cloned()
        .collect();

    kept.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    kept
}

struct Tally {
    label: String,
    count: usize,
    confidence_sum: f64,
}

// A Vec keeps first-seen ordering, which a HashMap would not.
fn tally<S: AsRef<str>>(records: &[(S, f64)]) -> Vec<Tally> {
    let mut tallies: Vec<Tally> = Vec::new();

    for (label, confidence) in records {
        let label = label.as_ref();
        match tallies.iter_mut().find(|t| t.label == label) {
            Some(tally) => {
                tally.count += 1;
                tally.confidence_sum += confidence;
            }
            None => tallies.push(Tally {
                label: label.to_string(),
                count: 1,
                confidence_sum: *confidence,
            }),
        }
    }

    tallies
}
