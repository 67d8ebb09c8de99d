use anyhow::Result;
use tracing::info;
use trainer_core::{init_tracing, load_config};

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = load_config("training-api")?;
    init_tracing(&cfg.service_name, &cfg.log_level, cfg.json_log)?;
    info!(?cfg, "config_loaded");
    training_api::run(cfg).await
}
