use std::path::PathBuf;
use url::Url;

pub const DEFAULT_TTS_ENDPOINT: &str = "https://translate.google.com/translate_tts";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
    #[error("Invalid URL for {key}: {source}")]
    InvalidUrl {
        key: &'static str,
        #[source]
        source: url::ParseError,
    },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub upload_dir: PathBuf,
    pub model_path: PathBuf,
    pub apply_softmax: bool,
    pub tts_endpoint: Url,
}

impl AppConfig {
    /// Reads `.env` (if any) and then the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());

        let port = match lookup("PORT") {
            Some(value) => value
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidValue { key: "PORT", value })?,
            None => 5000,
        };

        let upload_dir = lookup("UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("static/uploads"));
        let model_path = lookup("MODEL_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("model/traffic_sign_model.pt"));

        let apply_softmax = match lookup("MODEL_APPLY_SOFTMAX") {
            Some(value) => parse_bool(&value).ok_or(ConfigError::InvalidValue {
                key: "MODEL_APPLY_SOFTMAX",
                value,
            })?,
            None => false,
        };

        let tts_endpoint = lookup("TTS_ENDPOINT").unwrap_or_else(|| DEFAULT_TTS_ENDPOINT.to_string());
        let tts_endpoint = Url::parse(&tts_endpoint).map_err(|source| ConfigError::InvalidUrl {
            key: "TTS_ENDPOINT",
            source,
        })?;

        Ok(Self {
            host,
            port,
            upload_dir,
            model_path,
            apply_softmax,
            tts_endpoint,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
