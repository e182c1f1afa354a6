use serde::{Deserialize, Serialize};
use shared::Language;
use std::collections::HashMap;

const SIGN_CLASSES_YAML: &str = include_str!("../data/sign_classes.yaml");

#[derive(Debug, thiserror::Error)]
pub enum LabelError {
    #[error("Failed to parse sign classes: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Sign class table is empty")]
    Empty,
    #[error("Sign class at position {position} has id {id}")]
    NonContiguousId { position: usize, id: usize },
    #[error("Sign class {0} has no English guidance")]
    MissingEnglish(usize),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignClass {
    pub id: usize,
    pub name: String,
    pub guidance: HashMap<String, String>,
}

impl SignClass {
    /// Guidance in `language`, or English when that language has no entry.
    pub fn guidance_for(&self, language: Language) -> &str {
        self.guidance
            .get(language.code())
            .or_else(|| self.guidance.get(Language::English.code()))
            .map(String::as_str)
            .unwrap_or_default()
    }

    pub fn english_guidance(&self) -> &str {
        self.guidance_for(Language::English)
    }
}

#[derive(Debug, Deserialize)]
struct SignClassFile {
    classes: Vec<SignClass>,
}

/// Class id to display name and localized guidance, in classifier output order.
#[derive(Debug, Clone)]
pub struct LabelTable {
    classes: Vec<SignClass>,
}

impl LabelTable {
    pub fn load() -> Result<Self, LabelError> {
        Self::from_yaml(SIGN_CLASSES_YAML)
    }

    pub fn from_yaml(source: &str) -> Result<Self, LabelError> {
        let file: SignClassFile = serde_yaml::from_str(source)?;
        Self::new(file.classes)
    }

    pub fn new(classes: Vec<SignClass>) -> Result<Self, LabelError> {
        if classes.is_empty() {
            return Err(LabelError::Empty);
        }
        for (position, class) in classes.iter().enumerate() {
            if class.id != position {
                return Err(LabelError::NonContiguousId {
                    position,
                    id: class.id,
                });
            }
            if !class.guidance.contains_key(Language::English.code()) {
                return Err(LabelError::MissingEnglish(class.id));
            }
        }
        Ok(Self { classes })
    }

    pub fn get(&self, id: usize) -> Option<&SignClass> {
        self.classes.get(id)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }
}
