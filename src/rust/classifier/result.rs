use serde::ser::{Serialize, SerializeMap, Serializer};

/// Label reported when no decision can be read from the engine output.
pub const UNKNOWN_LABEL: &str = "unknown";
/// Synthetic score key carrying an out-of-range class index.
pub const INDEX_KEY: &str = "index";
/// Synthetic score key carrying the text of an unrecognized engine output.
pub const RAW_KEY: &str = "raw";

/// A single entry of the score mapping.
///
/// Ordinary entries are probabilities. The synthetic `index` and `raw`
/// entries keep their native type so they serialize as a JSON integer and a
/// JSON string respectively.
#[derive(Debug, Clone, PartialEq)]
pub enum Score {
    Probability(f64),
    Index(i64),
    Raw(String),
}

impl Score {
    pub fn as_probability(&self) -> Option<f64> {
        match self {
            Self::Probability(p) => Some(*p),
            _ => None,
        }
    }
}

impl Serialize for Score {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Probability(p) => serializer.serialize_f64(*p),
            Self::Index(i) => serializer.serialize_i64(*i),
            Self::Raw(raw) => serializer.serialize_str(raw),
        }
    }
}

/// Label → score mapping that keeps insertion order when serialized.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Scores(Vec<(String, Score)>);

impl Scores {
    /// A hard decision: `1.0` at `winner`, `0.0` for every other label.
    pub(crate) fn one_hot<'a>(labels: impl IntoIterator<Item = &'a str>, winner: &str) -> Self {
        Self(
            labels
                .into_iter()
                .map(|label| {
                    let p = if label == winner { 1.0 } else { 0.0 };
                    (label.to_string(), Score::Probability(p))
                })
                .collect(),
        )
    }

    pub(crate) fn single(key: impl Into<String>, score: Score) -> Self {
        Self(vec![(key.into(), score)])
    }

    pub fn get(&self, key: &str) -> Option<&Score> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, score)| score)
    }

    /// Probability stored under `key`, if the entry is a probability.
    pub fn probability(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Score::as_probability)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Score)> {
        self.0.iter().map(|(k, score)| (k.as_str(), score))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sum of all probability entries.
    pub fn total(&self) -> f64 {
        self.0.iter().filter_map(|(_, score)| score.as_probability()).sum()
    }
}

impl FromIterator<(String, Score)> for Scores {
    fn from_iter<T: IntoIterator<Item = (String, Score)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Serialize for Scores {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, score) in &self.0 {
            map.serialize_entry(key, score)?;
        }
        map.end()
    }
}

/// The canonical classification of one audio clip.
#[derive(Debug, Clone, PartialEq)]
pub struct EmotionResult {
    pub top_label: String,
    pub scores: Scores,
}

impl EmotionResult {
    /// True when no usable decision could be read from the engine.
    pub fn is_indeterminate(&self) -> bool {
        self.top_label == UNKNOWN_LABEL
            && (self.scores.get(INDEX_KEY).is_some() || self.scores.get(RAW_KEY).is_some())
    }
}
