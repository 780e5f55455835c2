use anyhow::Context;
use configs::AppConfig;
use report_desk::{init_tracing, App};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("loading configuration")?;
    init_tracing(&config.telemetry);

    let app = App::build(&config).await?;
    app.serve(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "could not listen for Ctrl-C");
        }
    })
    .await
}
