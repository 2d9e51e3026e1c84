use serde::Serialize;

use crate::{EmotionResult, Scores};

/// The `emotion` object of a prediction response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmotionPayload {
    pub label: String,
    pub scores: Scores,
}

/// Body returned by `POST /predict_emotion`.
///
/// `raw_result` repeats the score mapping for consumers of the older,
/// flat response shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseBody {
    pub emotion: EmotionPayload,
    pub raw_result: Scores,
}

/// Wraps a canonical result into the response structure.
pub fn assemble(result: EmotionResult) -> ResponseBody {
    ResponseBody {
        raw_result: result.scores.clone(),
        emotion: EmotionPayload {
            label: result.top_label,
            scores: result.scores,
        },
    }
}
