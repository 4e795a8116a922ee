pub mod server;

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use streamclip_core::{
    CommandExecutor, ConfigBundle, ManifestExtractor, OverlayAssets, Pipeline,
    SystemCommandExecutor,
};
use thiserror::Error;

pub use server::{create_router, AppContext};

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] streamclip_core::ConfigError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("invalid listen address {0}")]
    Address(String),
    #[error("required resource missing: {0}")]
    MissingResource(String),
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Extração, download e composição de clipes de vídeo", long_about = None)]
pub struct Cli {
    /// Diretório com service.toml, browser.toml e media.toml
    #[arg(long, default_value = "configs")]
    pub config_dir: PathBuf,
    /// Diretório base para caminhos relativos (padrão: diretório atual)
    #[arg(long)]
    pub base_dir: Option<PathBuf>,
    /// Formato de saída
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Inicia o servidor HTTP
    Serve(ServeArgs),
    /// Executa apenas a extração de manifestos para uma URL
    Extract(ExtractArgs),
    /// Verifica ferramentas externas e assets configurados
    Check,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Endereço de escuta (substitui server.host)
    #[arg(long)]
    pub host: Option<String>,
    /// Porta de escuta (substitui server.port)
    #[arg(long)]
    pub port: Option<u16>,
}

#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// URL da página com o player
    pub url: String,
}

pub async fn run(cli: Cli) -> Result<()> {
    let bundle = ConfigBundle::from_directory(&cli.config_dir)?;
    let base = cli.base_dir.clone().unwrap_or_default();

    match &cli.command {
        Commands::Serve(args) => {
            let addr = listen_addr(&bundle, args)?;
            let pipeline = Pipeline::from_config(&bundle, &base);
            server::serve(AppContext::new(pipeline), addr).await?;
        }
        Commands::Extract(args) => {
            let extractor = ManifestExtractor::from_config(&bundle.browser);
            let links = ManifestLinks {
                url: args.url.clone(),
                links: extractor.extract(&args.url).await,
            };
            render(&links, cli.format)?;
            if links.links.is_empty() {
                return Err(AppError::MissingResource(
                    "Nenhum manifesto encontrado".to_string(),
                ));
            }
        }
        Commands::Check => {
            let report = check_environment(&bundle, &base).await;
            render(&report, cli.format)?;
            if report
                .iter()
                .any(|entry| matches!(entry.status, CheckStatus::Error))
            {
                return Err(AppError::MissingResource(
                    "Uma ou mais verificações falharam".to_string(),
                ));
            }
        }
    }

    Ok(())
}

fn listen_addr(bundle: &ConfigBundle, args: &ServeArgs) -> Result<SocketAddr> {
    let host = args
        .host
        .clone()
        .unwrap_or_else(|| bundle.service.server.host.clone());
    let port = args.port.unwrap_or(bundle.service.server.port);
    let ip: IpAddr = host
        .parse()
        .map_err(|_| AppError::Address(format!("{host}:{port}")))?;
    Ok(SocketAddr::new(ip, port))
}

fn render<T>(value: &T, format: OutputFormat) -> Result<()>
where
    T: Serialize + DisplayFallback,
{
    match format {
        OutputFormat::Text => {
            println!("{}", value.display());
            Ok(())
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{}", json);
            Ok(())
        }
    }
}

trait DisplayFallback {
    fn display(&self) -> String;
}

#[derive(Debug, Serialize)]
pub struct ManifestLinks {
    pub url: String,
    pub links: Vec<String>,
}

impl DisplayFallback for ManifestLinks {
    fn display(&self) -> String {
        if self.links.is_empty() {
            return format!("Nenhum manifesto encontrado em {}", self.url);
        }
        self.links.join("\n")
    }
}

async fn check_environment(bundle: &ConfigBundle, base: &Path) -> Vec<HealthEntry> {
    let executor = SystemCommandExecutor;
    let mut results = vec![
        check_tool(&executor, "ffmpeg", &bundle.media.ffmpeg).await,
        check_tool(&executor, "ffprobe", &bundle.media.ffprobe).await,
        check_path(
            "chromium",
            Path::new(&bundle.browser.chromium.executable_path),
        ),
    ];

    let assets = OverlayAssets::from_config(&bundle.media.overlay, base);
    for (name, path) in ["background", "foreground", "font_bold", "font_regular"]
        .into_iter()
        .zip(assets.paths())
    {
        results.push(check_path(name, path));
    }
    results
}

async fn check_tool(executor: &dyn CommandExecutor, name: &str, program: &str) -> HealthEntry {
    match executor
        .run(Path::new(program), &["-version".to_string()])
        .await
    {
        Ok(output) if output.status.success() => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let version = stdout.lines().next().unwrap_or(program).trim().to_string();
            HealthEntry::ok(name, version)
        }
        Ok(output) => HealthEntry::error(
            name,
            format!("{program} saiu com status {:?}", output.status.code()),
        ),
        Err(err) => HealthEntry::error(name, format!("{program} indisponível: {err}")),
    }
}

fn check_path(name: &str, path: &Path) -> HealthEntry {
    if path.is_file() {
        HealthEntry::ok(name, format!("{}", path.display()))
    } else {
        HealthEntry::error(name, format!("{path} ausente", path = path.display()))
    }
}

#[derive(Debug, Serialize)]
pub struct HealthEntry {
    pub name: String,
    pub status: CheckStatus,
    pub detail: String,
}

#[derive(Debug, Serialize)]
pub enum CheckStatus {
    #[serde(rename = "ok")]
    Ok,
    #[serde(rename = "error")]
    Error,
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CheckStatus::Ok => "OK",
            CheckStatus::Error => "ERROR",
        };
        write!(f, "{}", label)
    }
}

impl HealthEntry {
    fn ok(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Ok,
            detail: detail.into(),
        }
    }

    fn error(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Error,
            detail: detail.into(),
        }
    }
}

impl DisplayFallback for HealthEntry {
    fn display(&self) -> String {
        format!(
            "[{status}] {name}: {detail}",
            status = self.status,
            name = self.name,
            detail = self.detail
        )
    }
}

impl DisplayFallback for Vec<HealthEntry> {
    fn display(&self) -> String {
        self.iter()
            .map(DisplayFallback::display)
            .collect::<Vec<_>>()
            .join("\n")
    }
}
