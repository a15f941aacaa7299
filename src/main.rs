mod config;
mod error;
mod handlers;
mod models;
mod services;
#[cfg(feature = "web-server")]
mod web; // Browser UI and JSON API

use anyhow::Result;
use dotenv::dotenv;
use std::path::Path;
use std::sync::Arc;

use config::Config;
use handlers::Orchestrator;
use models::ImageFile;
use services::OpenRouterService;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logger
    env_logger::init();

    log::info!("🚀 Starting InsightLens...");

    let config = Config::from_env()?;

    let model = Arc::new(OpenRouterService::new(
        config.openrouter_api_key.clone(),
        config.openrouter_model.clone(),
        config.openrouter_base_url.clone(),
        config.model_timeout,
    )?);
    log::info!("✅ OpenRouter service initialized with model: {}", model.model());

    let orchestrator = Arc::new(Orchestrator::new(model, config.max_image_size_mb));
    log::info!(
        "📏 Max image size: {}MB ({} bytes)",
        config.max_image_size_mb,
        config.max_image_bytes
    );

    // One-shot mode: insight-lens <image> [question...]
    let args: Vec<String> = std::env::args().skip(1).collect();
    if let Some((image_path, question)) = args.split_first() {
        return run_once(&orchestrator, image_path, &question.join(" ")).await;
    }

    serve(orchestrator, &config).await
}

async fn run_once(orchestrator: &Orchestrator, image_path: &str, question: &str) -> Result<()> {
    let bytes = tokio::fs::read(image_path).await?;
    let file_name = Path::new(image_path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| image_path.to_string());

    orchestrator.select_image(ImageFile::new(file_name, None, bytes))?;

    let snapshot = orchestrator.request_analysis().await?;
    println!("\n📝 Description:\n{}", snapshot.description.unwrap_or_default());

    if !question.trim().is_empty() {
        let snapshot = orchestrator.submit_question(question).await?;
        println!("\n💬 {}\n{}", question, snapshot.answer.unwrap_or_default());
    }

    Ok(())
}

#[cfg(feature = "web-server")]
async fn serve(orchestrator: Arc<Orchestrator>, config: &Config) -> Result<()> {
    let app = web::server::create_router(orchestrator, config.max_image_size_mb);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    log::info!("🌐 Server listening on {}", config.bind_addr);

    println!("\n🔎 InsightLens is running!");
    println!("🌐 Open http://{} in your browser", config.bind_addr);
    println!("🛑 Press Ctrl+C to stop\n");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            log::info!("🛑 Shutting down...");
        })
        .await?;

    Ok(())
}

#[cfg(not(feature = "web-server"))]
async fn serve(_orchestrator: Arc<Orchestrator>, _config: &Config) -> Result<()> {
    anyhow::bail!("built without the web-server feature; usage: insight-lens <image> [question...]")
}
