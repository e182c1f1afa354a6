use actix_files::Files;
use actix_multipart::{Multipart, MultipartError};
use actix_web::error::BlockingError;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError, web};
use chrono::Local;
use futures::TryStreamExt;
use log::{error, info, warn};
use shared::{ActionResponse, ErrorResponse, Language, PredictionResponse, SavedImage, TopPrediction};
use std::path::PathBuf;

use crate::inference::model::{InferenceError, Model};
use crate::inference::preprocess::{PreprocessError, decode_image};
use crate::inference::ranking::{Ranking, rank};
use crate::labels::LabelTable;
use crate::pages::GalleryPage;
use crate::speech::SpeechService;
use crate::storage::upload_store::{StorageError, UPLOAD_URL_PREFIX, UploadStore};

const LANGUAGE_FIELD_LIMIT: usize = 64;

pub fn configure_routes(cfg: &mut web::ServiceConfig, upload_dir: PathBuf) {
    cfg.service(web::resource("/").route(web::get().to(index)))
        .service(web::resource("/predict").route(web::post().to(predict)))
        .service(web::resource("/clear").route(web::post().to(clear_images)))
        .service(web::resource("/delete_image/{filename}").route(web::delete().to(delete_image)))
        .service(web::resource("/images").route(web::get().to(list_images)))
        .service(Files::new(UPLOAD_URL_PREFIX, upload_dir));
}

#[derive(Debug, thiserror::Error)]
pub enum PredictError {
    #[error("No file uploaded")]
    NoFile,
    #[error("No file selected")]
    NoFileSelected,
    #[error("Invalid file type")]
    InvalidFileType,
    #[error("File too large")]
    TooLarge,
    #[error("Invalid upload: {0}")]
    Multipart(String),
    #[error("Invalid image file: {0}")]
    Decode(#[from] PreprocessError),
    #[error("Model not available")]
    ModelUnavailable,
    #[error("Error processing image: {0}")]
    Inference(InferenceError),
    #[error("Error processing image: {0}")]
    Storage(#[from] StorageError),
    #[error("Error processing image: {0}")]
    Blocking(#[from] BlockingError),
}

impl From<MultipartError> for PredictError {
    fn from(err: MultipartError) -> Self {
        PredictError::Multipart(err.to_string())
    }
}

impl From<InferenceError> for PredictError {
    fn from(err: InferenceError) -> Self {
        match err {
            InferenceError::Unavailable => PredictError::ModelUnavailable,
            other => PredictError::Inference(other),
        }
    }
}

impl ResponseError for PredictError {
    fn status_code(&self) -> StatusCode {
        match self {
            PredictError::NoFile
            | PredictError::NoFileSelected
            | PredictError::InvalidFileType
            | PredictError::Multipart(_)
            | PredictError::Decode(_) => StatusCode::BAD_REQUEST,
            PredictError::TooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            PredictError::ModelUnavailable
            | PredictError::Inference(_)
            | PredictError::Storage(_)
            | PredictError::Blocking(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Prediction failed: {}", self);
        } else {
            warn!("Rejected prediction request: {}", self);
        }
        HttpResponse::build(status).json(ErrorResponse::new(self.to_string()))
    }
}

struct UploadedFile {
    filename: String,
    bytes: Vec<u8>,
}

#[derive(Default)]
struct PredictForm {
    file: Option<UploadedFile>,
    language: Option<String>,
}

async fn read_predict_form(mut payload: Multipart) -> Result<PredictForm, PredictError> {
    let mut form = PredictForm::default();
    let mut received = 0usize;

    while let Some(mut field) = payload.try_next().await? {
        let name = field.name().unwrap_or_default().to_string();
        let filename = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(str::to_string);

        let mut data = Vec::new();
        while let Some(chunk) = field.try_next().await? {
            received += chunk.len();
            UploadStore::validate_image_size(received).map_err(|_| PredictError::TooLarge)?;
            if name == "language" && data.len() + chunk.len() > LANGUAGE_FIELD_LIMIT {
                continue;
            }
            data.extend_from_slice(&chunk);
        }

        match name.as_str() {
            "file" => {
                if let Some(filename) = filename {
                    form.file = Some(UploadedFile { filename, bytes: data });
                }
            }
            "language" => form.language = Some(String::from_utf8_lossy(&data).into_owned()),
            _ => {}
        }
    }

    Ok(form)
}

/// Decode, persist, then classify. Runs on the blocking pool.
fn classify_upload(
    model: &Model,
    store: &UploadStore,
    labels: &LabelTable,
    file: &UploadedFile,
    extension: &str,
) -> Result<(SavedImage, Ranking), PredictError> {
    let image = decode_image(&file.bytes)?;
    let saved = store.save(&file.filename, extension, &image)?;
    let probabilities = model.inference(&image)?;
    let ranking = rank(&probabilities, labels.len())?;
    Ok((saved, ranking))
}

fn top_predictions(labels: &LabelTable, ranking: &Ranking) -> Vec<TopPrediction> {
    ranking
        .top
        .iter()
        .filter_map(|entry| {
            labels.get(entry.class_id).map(|class| TopPrediction {
                class: class.name.clone(),
                confidence: entry.confidence,
                guidance: class.english_guidance().to_string(),
            })
        })
        .collect()
}

async fn predict(
    labels: web::Data<LabelTable>,
    model: web::Data<Model>,
    speech: web::Data<SpeechService>,
    store: web::Data<UploadStore>,
    payload: Multipart,
) -> Result<HttpResponse, PredictError> {
    let form = read_predict_form(payload).await?;

    let file = form.file.ok_or(PredictError::NoFile)?;
    let language = Language::from_code_or_default(form.language.as_deref().unwrap_or("en"));
    if file.filename.is_empty() {
        return Err(PredictError::NoFileSelected);
    }
    let extension = UploadStore::allowed_extension(&file.filename).ok_or(PredictError::InvalidFileType)?;

    let (saved, ranking) = {
        let labels = labels.clone();
        let model = model.clone();
        let store = store.clone();
        web::block(move || classify_upload(&model, &store, &labels, &file, &extension)).await??
    };

    let best = labels
        .get(ranking.best.class_id)
        .ok_or(InferenceError::UnknownClass {
            index: ranking.best.class_id,
            known: labels.len(),
        })?;
    let guidance = best.guidance_for(language).to_string();
    let alert_message = format!("{}. {}", best.name, guidance);
    let audio_data = speech.speak_base64(&alert_message, language).await;

    info!(
        "Predicted '{}' ({:.3}) for {} [{}], audio: {}",
        best.name,
        ranking.best.confidence,
        saved.filename,
        language,
        audio_data.is_some()
    );

    Ok(HttpResponse::Ok().json(PredictionResponse {
        predicted_class: best.name.clone(),
        confidence: ranking.best.confidence,
        guidance,
        top_predictions: top_predictions(&labels, &ranking),
        image_url: saved.path,
        image_filename: saved.filename,
        audio_data,
        alert_message,
        timestamp: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        language,
    }))
}

async fn index(store: web::Data<UploadStore>, page: web::Data<GalleryPage>) -> HttpResponse {
    let saved_images = match store.list() {
        Ok(images) => images,
        Err(e) => {
            error!("Failed to list saved images: {}", e);
            return HttpResponse::InternalServerError()
                .json(ErrorResponse::new(format!("Error listing images: {}", e)));
        }
    };

    match page.render(&saved_images) {
        Ok(html) => HttpResponse::Ok()
            .content_type("text/html; charset=utf-8")
            .body(html),
        Err(e) => {
            error!("Failed to render index page: {}", e);
            HttpResponse::InternalServerError().json(ErrorResponse::new("Error rendering page"))
        }
    }
}

async fn list_images(store: web::Data<UploadStore>) -> HttpResponse {
    match store.list() {
        Ok(images) => HttpResponse::Ok().json(images),
        Err(e) => {
            error!("Failed to list saved images: {}", e);
            HttpResponse::InternalServerError()
                .json(ErrorResponse::new(format!("Error listing images: {}", e)))
        }
    }
}

async fn clear_images(store: web::Data<UploadStore>) -> HttpResponse {
    match store.delete_all() {
        Ok(removed) => {
            info!("Cleared {} saved image(s)", removed);
            HttpResponse::Ok().json(ActionResponse {
                success: "All predictions cleared".into(),
            })
        }
        Err(e) => {
            error!("Failed to clear saved images: {}", e);
            HttpResponse::InternalServerError()
                .json(ErrorResponse::new(format!("Error clearing predictions: {}", e)))
        }
    }
}

async fn delete_image(store: web::Data<UploadStore>, path: web::Path<String>) -> HttpResponse {
    let filename = path.into_inner();
    match store.delete(&filename) {
        Ok(true) => {
            info!("Deleted saved image {}", filename);
            HttpResponse::Ok().json(ActionResponse {
                success: "Image deleted".into(),
            })
        }
        Ok(false) => HttpResponse::NotFound().json(ErrorResponse::new("Image not found")),
        Err(e) => {
            error!("Failed to delete image {}: {}", filename, e);
            HttpResponse::InternalServerError()
                .json(ErrorResponse::new(format!("Error deleting image: {}", e)))
        }
    }
}
