use std::sync::Arc;

use log::{debug, info};
use tokio::sync::Mutex;

use crate::engine::{AcousticEngine, EngineError, InvocationMode};
use crate::staging::StagedAudioFile;
use crate::RawModelOutput;

/// Calls the acoustic engine for one staged clip.
///
/// Probability-seeking calls are tried first; an engine that reports a
/// capability mismatch is asked again for a plain decision. Which tier
/// answered is visible only through the variant of the returned
/// [`RawModelOutput`].
pub struct InferenceInvoker {
    engine: Arc<dyn AcousticEngine>,
    gate: Option<Mutex<()>>,
}

impl InferenceInvoker {
    /// Serializes calls only if the engine cannot take concurrent ones.
    pub fn new(engine: Arc<dyn AcousticEngine>) -> Self {
        let gate = if engine.supports_concurrent_calls() {
            None
        } else {
            Some(Mutex::new(()))
        };
        Self { engine, gate }
    }

    /// Forces one inference call at a time, whatever the engine reports.
    pub fn serialized(mut self) -> Self {
        self.gate.get_or_insert_with(|| Mutex::new(()));
        self
    }

    pub fn is_serialized(&self) -> bool {
        self.gate.is_some()
    }

    pub fn engine(&self) -> &Arc<dyn AcousticEngine> {
        &self.engine
    }

    /// Classifies `file`, falling back to a label-only call when the engine
    /// cannot produce scores. With `want_probabilities` false the label-only
    /// call is made directly.
    pub async fn classify(
        &self,
        file: &StagedAudioFile,
        want_probabilities: bool,
    ) -> Result<RawModelOutput, EngineError> {
        let _guard = match &self.gate {
            Some(gate) => Some(gate.lock().await),
            None => None,
        };

        if want_probabilities {
            match self.engine.run(file.path(), InvocationMode::Probabilities).await {
                Ok(raw) => {
                    debug!("{} engine answered with probabilities ({})", self.engine.name(), raw.kind());
                    return Ok(raw);
                }
                Err(EngineError::CapabilityMismatch { reason, .. }) => {
                    info!(
                        "{} engine cannot return probabilities ({}), falling back to label-only",
                        self.engine.name(),
                        reason
                    );
                }
                Err(e) => return Err(e),
            }
        }

        let raw = self.engine.run(file.path(), InvocationMode::LabelOnly).await?;
        debug!("{} engine answered label-only ({})", self.engine.name(), raw.kind());
        Ok(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::staging::AudioStager;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Mutex as StdMutex;

    /// Records the modes it was called with and answers from a fixed script.
    struct ScriptedEngine {
        scores: bool,
        concurrent: bool,
        calls: StdMutex<Vec<InvocationMode>>,
    }

    impl ScriptedEngine {
        fn new(scores: bool) -> Self {
            Self { scores, concurrent: true, calls: StdMutex::new(Vec::new()) }
        }

        fn calls(&self) -> Vec<InvocationMode> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AcousticEngine for ScriptedEngine {
        fn name(&self) -> &str {
            "scripted"
        }

        fn supports_concurrent_calls(&self) -> bool {
            self.concurrent
        }

        async fn run(&self, audio: &Path, mode: InvocationMode) -> Result<RawModelOutput, EngineError> {
            assert!(audio.exists());
            self.calls.lock().unwrap().push(mode);
            match (mode, self.scores) {
                (InvocationMode::Probabilities, true) => Ok(RawModelOutput::Logits(vec![0.1, 0.9])),
                (InvocationMode::Probabilities, false) => Err(EngineError::CapabilityMismatch {
                    mode,
                    reason: "no scores".into(),
                }),
                (InvocationMode::LabelOnly, _) => Ok(RawModelOutput::LabelString("happy".into())),
            }
        }
    }

    fn staged() -> (tempfile::TempDir, StagedAudioFile) {
        let dir = tempfile::tempdir().unwrap();
        let file = AudioStager::new(dir.path()).unwrap().stage(b"audio").unwrap();
        (dir, file)
    }

    #[tokio::test]
    async fn test_probabilities_first() {
        let engine = Arc::new(ScriptedEngine::new(true));
        let invoker = InferenceInvoker::new(engine.clone());
        let (_dir, file) = staged();

        let raw = invoker.classify(&file, true).await.unwrap();
        assert_eq!(raw, RawModelOutput::Logits(vec![0.1, 0.9]));
        assert_eq!(engine.calls(), vec![InvocationMode::Probabilities]);
    }

    #[tokio::test]
    async fn test_capability_mismatch_falls_back() {
        let engine = Arc::new(ScriptedEngine::new(false));
        let invoker = InferenceInvoker::new(engine.clone());
        let (_dir, file) = staged();

        let raw = invoker.classify(&file, true).await.unwrap();
        assert_eq!(raw, RawModelOutput::LabelString("happy".into()));
        assert_eq!(
            engine.calls(),
            vec![InvocationMode::Probabilities, InvocationMode::LabelOnly]
        );
    }

    #[tokio::test]
    async fn test_label_only_skips_probabilities() {
        let engine = Arc::new(ScriptedEngine::new(true));
        let invoker = InferenceInvoker::new(engine.clone());
        let (_dir, file) = staged();

        invoker.classify(&file, false).await.unwrap();
        assert_eq!(engine.calls(), vec![InvocationMode::LabelOnly]);
    }

    #[test]
    fn test_gate_follows_engine_capability() {
        let concurrent = InferenceInvoker::new(Arc::new(ScriptedEngine::new(true)));
        assert!(!concurrent.is_serialized());
        assert!(concurrent.serialized().is_serialized());

        let mut engine = ScriptedEngine::new(true);
        engine.concurrent = false;
        assert!(InferenceInvoker::new(Arc::new(engine)).is_serialized());
    }
}
