use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use webcompat_testapp::AppConfig;

#[derive(Parser, Debug)]
#[command(name = "webcompat-testapp")]
#[command(about = "Sample application serving the webcompat test endpoints")]
struct Args {
    /// Deployed application directory
    #[arg(long)]
    path: PathBuf,

    /// Port to listen on
    #[arg(long)]
    port: u16,

    /// Route prefix of the health endpoint
    #[arg(long, default_value = "")]
    root: String,

    /// Health checks to answer with 503 before reporting ready
    #[arg(long, default_value = "0", env = "WEBCOMPAT_WARMUP_REQUESTS")]
    warmup_requests: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();

    webcompat_testapp::serve(AppConfig {
        path: args.path,
        port: args.port,
        root_path: args.root,
        warmup_requests: args.warmup_requests,
    })
    .await
}
