//! Standalone REST server binary: `wf-serve [--addr ADDR]`.

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "wf-serve")]
#[command(about = "REST server exposing the workflow engine over HTTP")]
struct Args {
    /// Listen address (default 127.0.0.1:8081)
    #[arg(long, value_name = "ADDR")]
    addr: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    wf_config::load_and_apply("wf", None::<&std::path::Path>).ok();
    let settings = wf_config::settings::load_settings("wf").unwrap_or_default();

    let args = Args::parse();
    wf_serve::run_serve(args.addr.as_deref(), settings.session_root).await
}
