//! Binary entry point: load configuration, initialize logging, run the
//! orchestrator until a shutdown signal arrives.

use rgw_usage_exporter::config::Config;
use rgw_usage_exporter::observability;
use rgw_usage_exporter::orchestrator::Orchestrator;

#[tokio::main]
async fn main() {
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            std::process::exit(1);
        }
    };

    observability::init_tracing(&config);

    let orchestrator = match Orchestrator::bootstrap(config).await {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            tracing::error!(error = %e, "failed to start");
            std::process::exit(1);
        }
    };

    if let Err(e) = orchestrator.run().await {
        tracing::error!(error = %e, "orchestrator exited with error");
        std::process::exit(1);
    }
}
