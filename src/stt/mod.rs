use crate::config::WhisperConfig;
use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct Transcription {
    pub text: String,
    /// End of the last recognized segment, when the backend reports timing.
    pub duration: Option<f64>,
}

#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    async fn transcribe(&self, audio: &Path, language: &str) -> Result<Transcription>;
}

pub fn create_recognizer(config: &WhisperConfig) -> Box<dyn SpeechRecognizer> {
    Box::new(whisper::WhisperCli::new(config))
}

pub mod whisper;
