use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Errors raised while building an [`EmotionLabelSet`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LabelSetError {
    #[error("Label set cannot be empty")]
    Empty,
    #[error("Label at position {0} is empty")]
    BlankLabel(usize),
    #[error("Duplicate label: {0}")]
    Duplicate(String),
}

/// The ordered class names of the loaded acoustic model.
///
/// Position `i` in this set is the class the model's decoder head emits at
/// index `i`, so the order is never changed after construction. Clones share
/// the same backing storage and can be handed to every request.
///
/// ```
/// use amygdala::EmotionLabelSet;
///
/// let labels: EmotionLabelSet = "angry,happy,sad".parse().unwrap();
/// assert_eq!(labels.len(), 3);
/// assert_eq!(labels.get(1), Some("happy"));
/// assert_eq!(labels.position("sad"), Some(2));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmotionLabelSet {
    labels: Arc<[String]>,
}

impl EmotionLabelSet {
    /// Builds a label set, rejecting empty sets, blank labels and duplicates.
    pub fn new<I, S>(labels: I) -> Result<Self, LabelSetError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        if labels.is_empty() {
            return Err(LabelSetError::Empty);
        }
        for (i, label) in labels.iter().enumerate() {
            if label.trim().is_empty() {
                return Err(LabelSetError::BlankLabel(i));
            }
            if labels[..i].contains(label) {
                return Err(LabelSetError::Duplicate(label.clone()));
            }
        }
        Ok(Self { labels: labels.into() })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Always false; construction rejects empty sets.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Returns the label trained at `index`, if any.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    /// Case-sensitive exact lookup of a label's position.
    pub fn position(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.position(label).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.labels
    }
}

impl FromStr for EmotionLabelSet {
    type Err = LabelSetError;

    /// Parses a comma separated list such as `angry,happy,sad`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.split(',').map(str::trim))
    }
}

impl fmt::Display for EmotionLabelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.labels.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_is_preserved() {
        let labels = EmotionLabelSet::new(["sad", "angry", "happy"]).unwrap();
        let collected: Vec<&str> = labels.iter().collect();
        assert_eq!(collected, vec!["sad", "angry", "happy"]);
        assert_eq!(labels.position("angry"), Some(1));
    }

    #[test]
    fn test_lookup_is_case_sensitive() {
        let labels = EmotionLabelSet::new(["angry", "happy"]).unwrap();
        assert!(labels.contains("happy"));
        assert!(!labels.contains("Happy"));
    }

    #[test]
    fn test_invalid_sets_are_rejected() {
        let empty: Vec<String> = Vec::new();
        assert_eq!(EmotionLabelSet::new(empty), Err(LabelSetError::Empty));
        assert_eq!(
            EmotionLabelSet::new(["angry", " "]),
            Err(LabelSetError::BlankLabel(1))
        );
        assert_eq!(
            EmotionLabelSet::new(["angry", "sad", "angry"]),
            Err(LabelSetError::Duplicate("angry".into()))
        );
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let labels: EmotionLabelSet = " angry , happy,sad ".parse().unwrap();
        assert_eq!(labels.as_slice(), &["angry", "happy", "sad"]);
        assert_eq!(labels.to_string(), "[angry, happy, sad]");
    }

    #[test]
    fn test_clones_share_storage() {
        let labels = EmotionLabelSet::new(["angry"]).unwrap();
        let clone = labels.clone();
        assert!(Arc::ptr_eq(&labels.labels, &clone.labels));
    }
}
