use log::{debug, warn};

use super::raw::{RawModelOutput, StructuredRecord};
use super::result::{EmotionResult, Score, Scores, INDEX_KEY, RAW_KEY, UNKNOWN_LABEL};
use super::utils::{argmax, softmax};
use crate::EmotionLabelSet;

/// Converts any engine output into the canonical [`EmotionResult`].
///
/// Total over [`RawModelOutput`]: every variant yields a well-formed result,
/// so callers never have to handle a failed normalization.
///
/// | input                         | `top_label`          | `scores`                         |
/// |-------------------------------|----------------------|----------------------------------|
/// | `Logits` (one per label)      | label at arg-max     | softmax over all labels          |
/// | `ClassIndex` in range         | `labels[index]`      | one-hot over all labels          |
/// | `ClassIndex` out of range     | `"unknown"`          | `{"index": <index>}`             |
/// | `LabelString` known           | the label            | one-hot over all labels          |
/// | `LabelString` unknown         | the string verbatim  | `{<string>: 1.0}`                |
/// | `StructuredRecord` w/ label   | as `LabelString`     | as `LabelString`                 |
/// | `StructuredRecord` w/o label  | arg-max key          | the record's entries             |
/// | `Unrecognized`                | `"unknown"`          | `{"raw": <text>}`                |
///
/// Arg-max ties resolve to the first position. Logits that do not line up
/// with the label set, or contain non-finite values, are treated as
/// unrecognized output.
///
/// ```
/// use amygdala::{normalize, EmotionLabelSet, RawModelOutput};
///
/// let labels = EmotionLabelSet::new(["angry", "happy", "sad"]).unwrap();
/// let result = normalize(RawModelOutput::ClassIndex(1), &labels);
/// assert_eq!(result.top_label, "happy");
/// assert_eq!(result.scores.probability("happy"), Some(1.0));
/// ```
pub fn normalize(raw: RawModelOutput, labels: &EmotionLabelSet) -> EmotionResult {
    debug!("Normalizing {} output", raw.kind());
    match raw {
        RawModelOutput::Logits(logits) => from_logits(logits, labels),
        RawModelOutput::ClassIndex(index) => from_index(index, labels),
        RawModelOutput::LabelString(label) => from_label(label, labels),
        RawModelOutput::StructuredRecord(record) => from_record(record, labels),
        RawModelOutput::Unrecognized(raw) => unrecognized(raw),
    }
}

fn from_logits(logits: Vec<f32>, labels: &EmotionLabelSet) -> EmotionResult {
    if logits.len() != labels.len() {
        warn!(
            "Logits do not match the {} configured labels (got {} values)",
            labels.len(),
            logits.len()
        );
        return unrecognized(RawModelOutput::Logits(logits).to_string());
    }
    if let Some(position) = logits.iter().position(|x| !x.is_finite()) {
        warn!("Logits hold a non-finite value at position {}", position);
        return unrecognized(RawModelOutput::Logits(logits).to_string());
    }

    let probs = softmax(&logits);
    let best = argmax(probs.iter().copied()).unwrap_or(0);
    let top_label = labels.get(best).unwrap_or(UNKNOWN_LABEL).to_string();
    let scores = labels
        .iter()
        .zip(probs.iter())
        .map(|(label, &p)| (label.to_string(), Score::Probability(p)))
        .collect();

    EmotionResult { top_label, scores }
}

fn from_index(index: i64, labels: &EmotionLabelSet) -> EmotionResult {
    let label = usize::try_from(index).ok().and_then(|i| labels.get(i));
    match label {
        Some(label) => EmotionResult {
            top_label: label.to_string(),
            scores: Scores::one_hot(labels.iter(), label),
        },
        None => {
            warn!("Class index {} is outside the {} configured labels", index, labels.len());
            EmotionResult {
                top_label: UNKNOWN_LABEL.to_string(),
                scores: Scores::single(INDEX_KEY, Score::Index(index)),
            }
        }
    }
}

fn from_label(label: String, labels: &EmotionLabelSet) -> EmotionResult {
    if labels.contains(&label) {
        let scores = Scores::one_hot(labels.iter(), &label);
        return EmotionResult { top_label: label, scores };
    }

    // Labels outside the configured set are passed through as the decision.
    debug!("Model emitted label {:?} outside the configured set", label);
    EmotionResult {
        scores: Scores::single(label.clone(), Score::Probability(1.0)),
        top_label: label,
    }
}

fn from_record(record: StructuredRecord, labels: &EmotionLabelSet) -> EmotionResult {
    if let Some(label) = record.predicted_label {
        return from_label(label, labels);
    }

    match argmax(record.entries.iter().map(|(_, score)| *score)) {
        Some(best) => {
            let top_label = record.entries[best].0.clone();
            let scores = record
                .entries
                .into_iter()
                .map(|(key, score)| (key, Score::Probability(score)))
                .collect();
            EmotionResult { top_label, scores }
        }
        None => unrecognized(record.to_string()),
    }
}

fn unrecognized(raw: String) -> EmotionResult {
    warn!("Unrecognized model output: {}", raw);
    EmotionResult {
        top_label: UNKNOWN_LABEL.to_string(),
        scores: Scores::single(RAW_KEY, Score::Raw(raw)),
    }
}
