mod error;
mod normalize;
mod raw;
mod result;
pub(crate) mod utils;

pub use error::ClassifierError;
pub use normalize::normalize;
pub use raw::{RawModelOutput, StructuredRecord, PREDICTED_LABEL_FIELDS};
pub use result::{EmotionResult, Score, Scores, INDEX_KEY, RAW_KEY, UNKNOWN_LABEL};
