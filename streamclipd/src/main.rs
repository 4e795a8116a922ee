use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = streamclipd::Cli::parse();

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,streamclip_core=info,tower_http=info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    if let Err(err) = streamclipd::run(cli).await {
        eprintln!("erro: {err}");
        std::process::exit(1);
    }
}
