use std::fmt;

use serde_json::Value;

/// Record fields that carry the model's own decision, in lookup order.
pub const PREDICTED_LABEL_FIELDS: [&str; 2] = ["predicted_label", "label"];

/// Every shape an acoustic engine may return for a single audio clip.
///
/// The shape is decided once, where the engine's output is read, and is
/// matched exhaustively by the normalizer afterwards. A newly observed
/// engine behavior gets a new variant here rather than an ad hoc check
/// further down the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum RawModelOutput {
    /// Unnormalized per-class scores, one per trained label.
    Logits(Vec<f32>),
    /// A bare decision as a position in the label set.
    ClassIndex(i64),
    /// A ready-made label string.
    LabelString(String),
    /// A mapping with an optional predicted label and/or label → score entries.
    StructuredRecord(StructuredRecord),
    /// Anything else, kept as its textual representation.
    Unrecognized(String),
}

/// A record-shaped engine result.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StructuredRecord {
    pub predicted_label: Option<String>,
    /// Label → score entries, in the order they were decoded.
    pub entries: Vec<(String, f64)>,
}

impl StructuredRecord {
    pub fn with_predicted_label(label: impl Into<String>) -> Self {
        Self {
            predicted_label: Some(label.into()),
            entries: Vec::new(),
        }
    }

    pub fn with_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self {
            predicted_label: None,
            entries: entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.predicted_label.is_none() && self.entries.is_empty()
    }
}

impl fmt::Display for StructuredRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        let mut first = true;
        if let Some(label) = &self.predicted_label {
            write!(f, "{}: {:?}", PREDICTED_LABEL_FIELDS[0], label)?;
            first = false;
        }
        for (key, score) in &self.entries {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{:?}: {}", key, score)?;
            first = false;
        }
        write!(f, "}}")
    }
}

impl fmt::Display for RawModelOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Logits(values) => write!(f, "logits{:?}", values),
            Self::ClassIndex(index) => write!(f, "index({})", index),
            Self::LabelString(label) => write!(f, "label({:?})", label),
            Self::StructuredRecord(record) => write!(f, "record{}", record),
            Self::Unrecognized(raw) => f.write_str(raw),
        }
    }
}

impl RawModelOutput {
    /// Short name of the variant, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Logits(_) => "logits",
            Self::ClassIndex(_) => "class_index",
            Self::LabelString(_) => "label_string",
            Self::StructuredRecord(_) => "structured_record",
            Self::Unrecognized(_) => "unrecognized",
        }
    }

    /// Decodes a JSON engine reply into its tagged shape.
    ///
    /// - array of numbers → `Logits`
    /// - integer → `ClassIndex`
    /// - string → `LabelString`
    /// - object whose predicted-label field is an integer → `ClassIndex`
    /// - other object → `StructuredRecord`, or `Unrecognized` when it holds
    ///   neither a predicted label nor any numeric entry
    /// - one-element array around a non-number → its element (batch of one)
    /// - anything else → `Unrecognized` with the JSON text
    pub fn from_json(value: Value) -> Self {
        Self::decode_json(value, true)
    }

    fn decode_json(value: Value, unwrap_batch: bool) -> Self {
        match value {
            Value::Number(ref n) => match n.as_i64() {
                Some(index) => Self::ClassIndex(index),
                None => Self::Unrecognized(value.to_string()),
            },
            Value::String(label) => Self::LabelString(label),
            Value::Array(ref items) if !items.is_empty() && items.iter().all(Value::is_number) => {
                Self::Logits(items.iter().filter_map(Value::as_f64).map(|x| x as f32).collect())
            }
            Value::Array(mut items) if unwrap_batch && items.len() == 1 => {
                let item = items.remove(0);
                Self::decode_json(item, false)
            }
            Value::Object(map) => {
                let predicted = PREDICTED_LABEL_FIELDS
                    .iter()
                    .find_map(|field| map.get(*field).filter(|v| v.is_string() || v.is_i64()));
                if let Some(index) = predicted.and_then(Value::as_i64) {
                    return Self::ClassIndex(index);
                }
                let predicted_label = predicted.and_then(Value::as_str).map(str::to_string);
                let entries = map
                    .iter()
                    .filter(|(key, _)| !PREDICTED_LABEL_FIELDS.contains(&key.as_str()))
                    .filter_map(|(key, field)| field.as_f64().map(|score| (key.clone(), score)))
                    .collect();
                let record = StructuredRecord { predicted_label, entries };
                if record.is_empty() {
                    Self::Unrecognized(Value::Object(map).to_string())
                } else {
                    Self::StructuredRecord(record)
                }
            }
            other => Self::Unrecognized(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_number_array_as_logits() {
        let raw = RawModelOutput::from_json(json!([2.0, 1.0, 0.1]));
        assert_eq!(raw, RawModelOutput::Logits(vec![2.0, 1.0, 0.1]));
    }

    #[test]
    fn test_decode_scalars() {
        assert_eq!(RawModelOutput::from_json(json!(1)), RawModelOutput::ClassIndex(1));
        assert_eq!(
            RawModelOutput::from_json(json!("happy")),
            RawModelOutput::LabelString("happy".into())
        );
        assert_eq!(
            RawModelOutput::from_json(json!(0.5)),
            RawModelOutput::Unrecognized("0.5".into())
        );
        assert_eq!(RawModelOutput::from_json(json!(null)), RawModelOutput::Unrecognized("null".into()));
    }

    #[test]
    fn test_decode_batch_of_one() {
        assert_eq!(
            RawModelOutput::from_json(json!(["sad"])),
            RawModelOutput::LabelString("sad".into())
        );
        assert_eq!(
            RawModelOutput::from_json(json!([[0.5, 0.25]])),
            RawModelOutput::Logits(vec![0.5, 0.25])
        );
        // Only one level is unwrapped.
        assert!(matches!(
            RawModelOutput::from_json(json!([["sad"]])),
            RawModelOutput::Unrecognized(_)
        ));
    }

    #[test]
    fn test_decode_record_with_predicted_label() {
        let raw = RawModelOutput::from_json(json!({"label": "sad", "predicted_label": "angry"}));
        match raw {
            RawModelOutput::StructuredRecord(record) => {
                assert_eq!(record.predicted_label.as_deref(), Some("angry"));
                assert!(record.entries.is_empty());
            }
            other => panic!("unexpected shape: {:?}", other),
        }
    }

    #[test]
    fn test_decode_record_with_numeric_predicted_label() {
        let raw = RawModelOutput::from_json(json!({"predicted_label": 2, "confidence": 0.7}));
        assert_eq!(raw, RawModelOutput::ClassIndex(2));

        let raw = RawModelOutput::from_json(json!({"predicted_label": null, "label": -1}));
        assert_eq!(raw, RawModelOutput::ClassIndex(-1));

        // A float is not a class position
        let raw = RawModelOutput::from_json(json!({"predicted_label": 1.5}));
        assert!(matches!(raw, RawModelOutput::Unrecognized(_)));
    }

    #[test]
    fn test_decode_record_with_scores() {
        let raw = RawModelOutput::from_json(json!({"angry": 0.1, "happy": 0.7, "note": "x"}));
        match raw {
            RawModelOutput::StructuredRecord(record) => {
                assert_eq!(record.predicted_label, None);
                assert_eq!(record.entries.len(), 2);
                assert!(record.entries.contains(&("happy".to_string(), 0.7)));
            }
            other => panic!("unexpected shape: {:?}", other),
        }
    }

    #[test]
    fn test_decode_useless_record_is_unrecognized() {
        let raw = RawModelOutput::from_json(json!({"note": "x"}));
        assert_eq!(raw, RawModelOutput::Unrecognized(r#"{"note":"x"}"#.into()));
    }

    #[test]
    fn test_display() {
        assert_eq!(RawModelOutput::ClassIndex(7).to_string(), "index(7)");
        let record = StructuredRecord::with_entries([("happy", 1.0)]);
        assert_eq!(RawModelOutput::StructuredRecord(record).to_string(), r#"record{"happy": 1}"#);
    }
}
