mod config;
mod inference;
mod labels;
mod pages;
mod routes;
mod speech;
mod storage;

use actix_cors::Cors;
use actix_web::{App, HttpServer, web};
use config::AppConfig;
use inference::model::Model;
use labels::LabelTable;
use pages::GalleryPage;
use routes::configure_routes;
use speech::SpeechService;
use speech::google_tts::GoogleTtsService;
use std::env;
use std::sync::Arc;
use storage::upload_store::UploadStore;

fn startup_error(context: &str, err: impl std::fmt::Display) -> std::io::Error {
    log::error!("{}: {}", context, err);
    std::io::Error::other(format!("{}: {}", context, err))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    if let Ok(current_dir) = env::current_dir() {
        log::info!("Current working directory: {}", current_dir.display());
    } else {
        log::error!("Failed to get the current working directory.");
    }

    let config = AppConfig::from_env().map_err(|e| startup_error("Invalid configuration", e))?;
    log::info!("Configuration: {:?}", config);

    let labels = LabelTable::load().map_err(|e| startup_error("Failed to load sign classes", e))?;
    log::info!("Loaded {} sign classes", labels.len());

    let store = UploadStore::new(&config.upload_dir);
    store
        .init()
        .map_err(|e| startup_error("Failed to create upload directory", e))?;

    let model = Model::load(&config.model_path, config.apply_softmax);
    if !model.is_available() {
        log::warn!("Serving without a classifier; /predict will answer 500");
    }

    let speech = SpeechService::new(Arc::new(GoogleTtsService::new(config.tts_endpoint.clone())));
    let page = GalleryPage::new().map_err(|e| startup_error("Failed to load page template", e))?;

    let upload_dir = store.root().to_path_buf();
    let labels = web::Data::new(labels);
    let model = web::Data::new(model);
    let speech = web::Data::new(speech);
    let store = web::Data::new(store);
    let page = web::Data::new(page);

    let bind_address = config.bind_address();
    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "DELETE", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .max_age(3600),
            )
            .app_data(labels.clone())
            .app_data(model.clone())
            .app_data(speech.clone())
            .app_data(store.clone())
            .app_data(page.clone())
            .configure(|cfg| configure_routes(cfg, upload_dir.clone()))
    })
    .bind(&bind_address)?
    .run()
    .await
}
