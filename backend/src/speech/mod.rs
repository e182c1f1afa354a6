pub mod google_tts;

use base64::{Engine as _, engine::general_purpose};
use futures::future::BoxFuture;
use shared::Language;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    #[error("Nothing to synthesize")]
    EmptyText,
    #[error("Speech request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Speech engine returned status {0}")]
    Status(reqwest::StatusCode),
    #[error("Speech engine returned no audio")]
    EmptyAudio,
}

/// Turns text into encoded audio (MP3 for the production engine).
pub trait SpeechSynthesizer: Send + Sync {
    fn synthesize<'a>(
        &'a self,
        text: &'a str,
        language: Language,
    ) -> BoxFuture<'a, Result<Vec<u8>, SpeechError>>;
}

#[derive(Clone)]
pub struct SpeechService {
    synthesizer: Arc<dyn SpeechSynthesizer>,
}

impl SpeechService {
    pub fn new(synthesizer: Arc<dyn SpeechSynthesizer>) -> Self {
        Self { synthesizer }
    }

    /// Base64 audio for `text`, or `None` when synthesis fails.
    pub async fn speak_base64(&self, text: &str, language: Language) -> Option<String> {
        match self.synthesizer.synthesize(text, language).await {
            Ok(audio) => Some(general_purpose::STANDARD.encode(audio)),
            Err(e) => {
                log::warn!("Error in text-to-speech ({}): {}", language, e);
                None
            }
        }
    }
}
