use chrono::{DateTime, Local};
use image::{ImageFormat, RgbImage};
use shared::SavedImage;
use std::fs::{self, OpenOptions};
use std::io::{Cursor, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

pub const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif"];
pub const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;
pub const UPLOAD_URL_PREFIX: &str = "/static/uploads";

const UPLOAD_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image encoding error: {0}")]
    Encode(#[from] image::ImageError),
    #[error("Invalid file format")]
    InvalidFormat,
    #[error("File too large")]
    FileTooLarge,
}

/// Uploaded images kept as plain files in one directory.
#[derive(Clone, Debug)]
pub struct UploadStore {
    root: PathBuf,
}

impl UploadStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn init(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root)?;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lower-cased extension of `filename` when it is an allowed image type.
    pub fn allowed_extension(filename: &str) -> Option<String> {
        let (_, extension) = filename.rsplit_once('.')?;
        let extension = extension.to_ascii_lowercase();
        ALLOWED_EXTENSIONS
            .contains(&extension.as_str())
            .then_some(extension)
    }

    pub fn validate_image_size(size: usize) -> Result<(), StorageError> {
        if size > MAX_UPLOAD_BYTES {
            return Err(StorageError::FileTooLarge);
        }
        Ok(())
    }

    pub fn url_for(filename: &str) -> String {
        format!("{}/{}", UPLOAD_URL_PREFIX, filename)
    }

    /// Re-encodes `image` to match `extension` and writes it under a fresh
    /// `{stem}_{timestamp}.{extension}` name. Never overwrites an existing file.
    pub fn save(
        &self,
        original_filename: &str,
        extension: &str,
        image: &RgbImage,
    ) -> Result<SavedImage, StorageError> {
        self.save_at(original_filename, extension, image, Local::now())
    }

    pub fn save_at(
        &self,
        original_filename: &str,
        extension: &str,
        image: &RgbImage,
        now: DateTime<Local>,
    ) -> Result<SavedImage, StorageError> {
        let format = ImageFormat::from_extension(extension).ok_or(StorageError::InvalidFormat)?;
        let mut encoded = Vec::new();
        image.write_to(&mut Cursor::new(&mut encoded), format)?;

        let stem = upload_stem(original_filename);
        let timestamp = now.format("%Y%m%d_%H%M%S").to_string();

        let mut attempt = 0usize;
        loop {
            let filename = if attempt == 0 {
                format!("{}_{}.{}", stem, timestamp, extension)
            } else {
                format!("{}_{}_{}.{}", stem, timestamp, attempt, extension)
            };
            let path = self.root.join(&filename);

            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    if let Err(e) = file.write_all(&encoded) {
                        let _ = fs::remove_file(&path);
                        return Err(e.into());
                    }
                    return Ok(SavedImage {
                        path: Self::url_for(&filename),
                        upload_time: now.format(UPLOAD_TIME_FORMAT).to_string(),
                        filename,
                    });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Saved images, newest first.
    pub fn list(&self) -> Result<Vec<SavedImage>, StorageError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut images: Vec<(SystemTime, SavedImage)> = Vec::new();
        for entry in entries {
            let entry = entry?;
            let metadata = entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }
            let Ok(filename) = entry.file_name().into_string() else {
                continue;
            };
            if Self::allowed_extension(&filename).is_none() {
                continue;
            }

            let created = metadata.created().or_else(|_| metadata.modified())?;
            let upload_time = DateTime::<Local>::from(created)
                .format(UPLOAD_TIME_FORMAT)
                .to_string();
            images.push((
                created,
                SavedImage {
                    path: Self::url_for(&filename),
                    filename,
                    upload_time,
                },
            ));
        }

        images.sort_by(|(a_time, a), (b_time, b)| {
            b_time.cmp(a_time).then_with(|| b.filename.cmp(&a.filename))
        });
        Ok(images.into_iter().map(|(_, image)| image).collect())
    }

    /// Removes one image. `Ok(false)` when no such file exists.
    pub fn delete(&self, filename: &str) -> Result<bool, StorageError> {
        let filename = secure_filename(filename);
        if filename.is_empty() {
            return Ok(false);
        }

        let path = self.root.join(filename);
        if !path.is_file() {
            return Ok(false);
        }
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Removes every file in the directory, returning how many were removed.
    pub fn delete_all(&self) -> Result<usize, StorageError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                fs::remove_file(entry.path())?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// Reduces a client-supplied name to `[A-Za-z0-9_.-]` with no leading or
/// trailing dots or underscores, so it can never leave the upload directory.
pub fn secure_filename(filename: &str) -> String {
    let ascii: String = filename
        .chars()
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();

    let joined = ascii.split_whitespace().collect::<Vec<_>>().join("_");
    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();

    kept.trim_matches(|c| c == '.' || c == '_').to_string()
}

fn upload_stem(original_filename: &str) -> String {
    let stem = original_filename
        .rsplit_once('.')
        .map_or(original_filename, |(stem, _)| stem);
    let stem = secure_filename(stem);
    if stem.is_empty() {
        "upload".to_string()
    } else {
        stem
    }
}
