use tracing_subscriber::EnvFilter;

use printwatch_agent::{cli, run};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let args = cli::parse();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!(error = %e, "failed to start runtime");
            std::process::exit(1);
        }
    };

    let result = runtime.block_on(async {
        let ctx = run::AgentContext::init(&args.config_path)?;
        run::execute(ctx, args.mode).await
    });

    if let Err(e) = result {
        tracing::error!(error = %e, "agent failed");
        std::process::exit(1);
    }
}
