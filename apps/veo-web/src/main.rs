use clap::Parser;
use tracing_subscriber::EnvFilter;
use veo_web::{start_server, WebConfig, DEFAULT_BIND, DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_MAX_WIDTH};

#[derive(Parser, Debug)]
#[command(name = "veo-web", version, about = "Web form for fitting images onto a 16:9 canvas")]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "VEO_WEB_BIND", default_value = DEFAULT_BIND)]
    bind: String,
    /// Widest canvas a request may ask for.
    #[arg(long, env = "VEO_WEB_MAX_WIDTH", default_value_t = DEFAULT_MAX_WIDTH)]
    max_width: i64,
    /// Largest accepted request body in bytes.
    #[arg(long, env = "VEO_WEB_MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    max_upload_bytes: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    tracing::info!(bind = %args.bind, max_width = args.max_width, "Starting Veo web converter");

    start_server(WebConfig {
        bind: args.bind,
        max_width: args.max_width,
        max_upload_bytes: args.max_upload_bytes,
    })
    .await
}
