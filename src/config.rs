use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub parser: ParserConfig,
    #[serde(default)]
    pub speech: SpeechConfig,
    /// Submit partial text on word boundaries instead of waiting for a
    /// final submission.
    #[serde(default)]
    pub incremental: bool,
}

// ============================================================================
// Parser Config
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ParserConfig {
    /// Base URL of the lightparser service
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8080".into()
}

fn default_timeout_secs() -> u64 {
    10
}

// ============================================================================
// Speech Config
// ============================================================================

#[derive(Debug, Deserialize, Clone)]
pub struct SpeechConfig {
    /// Silero VAD model; falls back to energy-based detection when missing
    #[serde(default = "default_vad_model")]
    pub vad_model: String,
    /// Parakeet model directory; speech capture is unsupported without it
    #[serde(default = "default_recognizer_model")]
    pub recognizer_model: String,
    /// Trailing silence that closes an utterance segment
    #[serde(default = "default_silence_ms")]
    pub silence_ms: u32,
    /// Interval between interim transcripts while a segment is open
    #[serde(default = "default_interim_ms")]
    pub interim_ms: u32,
    /// Give up on a listening session that never hears speech
    #[serde(default = "default_no_speech_timeout_secs")]
    pub no_speech_timeout_secs: u64,
    #[serde(default = "default_max_utterance_secs")]
    pub max_utterance_secs: u32,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            vad_model: default_vad_model(),
            recognizer_model: default_recognizer_model(),
            silence_ms: default_silence_ms(),
            interim_ms: default_interim_ms(),
            no_speech_timeout_secs: default_no_speech_timeout_secs(),
            max_utterance_secs: default_max_utterance_secs(),
        }
    }
}

fn default_vad_model() -> String {
    "models/silero_vad_v4.onnx".into()
}

fn default_recognizer_model() -> String {
    "models/parakeet-tdt-0.6b-v3-int8".into()
}

fn default_silence_ms() -> u32 {
    500
}

fn default_interim_ms() -> u32 {
    700
}

fn default_no_speech_timeout_secs() -> u64 {
    8
}

fn default_max_utterance_secs() -> u32 {
    30
}

impl Config {
    pub fn load() -> Self {
        Self::load_from(Path::new("gabble.toml"))
    }

    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            fs::read_to_string(path)
                .ok()
                .and_then(|s| toml::from_str(&s).ok())
                .unwrap_or_default()
        } else {
            Config::default()
        }
    }
}
