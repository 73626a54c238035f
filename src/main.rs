use actix_web::{middleware, web, App, HttpServer};
use anyhow::{Context, Result};
use leafscan::labels::LabelTable;
use leafscan::predict::Predictor;
use leafscan::server::{self, AppState};
use leafscan::settings::{Settings, RUST_LOG};
use leafscan::torch::TorchModel;
use std::sync::Arc;
use std::{env, process};
use tracing::info;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: ./leafscan [config file]";

fn get_args() -> Option<String> {
    let args: Vec<String> = env::args().collect();
    if args.len() > 2 {
        println!("{USAGE}");
        process::exit(1);
    }

    args.get(1).cloned()
}

/// Load the model and labels, and make sure they agree
fn load_predictor(settings: &Settings) -> Result<Predictor> {
    let labels = match &settings.labels_path {
        Some(path) => LabelTable::from_file(path)?,
        None => LabelTable::default(),
    };
    let model = TorchModel::new(&settings.model_path, settings.layout)?;
    let predictor = Predictor::new(Arc::new(model), labels)
        .with_jpeg_quality(settings.jpeg_quality)
        .with_max_pixels(settings.max_pixels);
    info!("using {} class labels", predictor.labels().len());

    if settings.validate_labels {
        predictor
            .validate()
            .context("model and label table disagree")?;
        info!("model output width matches the label table");
    }

    Ok(predictor)
}

#[actix_web::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(RUST_LOG)))
        .init();

    let settings = Settings::load(get_args().as_deref())?;
    info!("starting with {settings:?}");

    let state = web::Data::new(AppState {
        predictor: load_predictor(&settings)?,
        max_upload_bytes: settings.max_upload_bytes,
    });

    // Start the HTTP server
    let mut http = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(server::cors())
            .wrap(middleware::Logger::default())
            .configure(server::configure)
    });
    if let Some(workers) = settings.workers {
        http = http.workers(workers);
    }

    let addr = settings.bind_addr();
    info!("listening on {}:{}", addr.0, addr.1);
    http.bind(addr)
        .with_context(|| format!("failed to bind {}:{}", addr.0, addr.1))?
        .run()
        .await?;

    Ok(())
}
