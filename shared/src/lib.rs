use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

/// Languages the guidance text and speech can be requested in.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString, EnumIter, IntoStaticStr,
)]
pub enum Language {
    #[default]
    #[strum(serialize = "en")]
    #[serde(rename = "en")]
    English,
    #[strum(serialize = "es")]
    #[serde(rename = "es")]
    Spanish,
    #[strum(serialize = "fr")]
    #[serde(rename = "fr")]
    French,
    #[strum(serialize = "sa")]
    #[serde(rename = "sa")]
    Sanskrit,
    #[strum(serialize = "pa")]
    #[serde(rename = "pa")]
    Punjabi,
    #[strum(serialize = "hi")]
    #[serde(rename = "hi")]
    Hindi,
    #[strum(serialize = "ja")]
    #[serde(rename = "ja")]
    Japanese,
    #[strum(serialize = "zh")]
    #[serde(rename = "zh")]
    Chinese,
    #[strum(serialize = "ta")]
    #[serde(rename = "ta")]
    Tamil,
    #[strum(serialize = "ar")]
    #[serde(rename = "ar")]
    Arabic,
    #[strum(serialize = "kn")]
    #[serde(rename = "kn")]
    Kannada,
}

impl Language {
    /// Parses a request code, coercing anything unsupported to English.
    pub fn from_code_or_default(code: &str) -> Self {
        code.trim().parse().unwrap_or_default()
    }

    pub fn code(&self) -> &'static str {
        (*self).into()
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Spanish => "Spanish",
            Language::French => "French",
            Language::Sanskrit => "Sanskrit",
            Language::Punjabi => "Punjabi",
            Language::Hindi => "Hindi",
            Language::Japanese => "Japanese",
            Language::Chinese => "Chinese",
            Language::Tamil => "Tamil",
            Language::Arabic => "Arabic",
            Language::Kannada => "Kannada",
        }
    }

    pub fn all() -> Vec<Language> {
        Language::iter().collect()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TopPrediction {
    pub class: String,
    pub confidence: f32,
    pub guidance: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct PredictionResponse {
    pub predicted_class: String,
    pub confidence: f32,
    pub guidance: String,
    pub top_predictions: Vec<TopPrediction>,
    pub image_url: String,
    pub image_filename: String,
    pub audio_data: Option<String>,
    pub alert_message: String,
    pub timestamp: String,
    pub language: Language,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SavedImage {
    pub filename: String,
    pub path: String,
    pub upload_time: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ActionResponse {
    pub success: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self { error: error.into() }
    }
}
