use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::document::DEFAULT_MAX_DEPTH;

#[derive(Parser, Debug)]
#[command(
    name = "partscope",
    version,
    about = "Component reconciliation, similarity scoring and supply-chain risk tooling"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Results(ResultsArgs),
    Risk(RiskArgs),
    Bom(BomArgs),
    DatasheetUrl(DatasheetUrlArgs),
    Download(DownloadArgs),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum ResultSource {
    /// Results evaluated against datasheet-extracted parameters.
    Datasheet,
    /// Results evaluated against catalog parameters.
    Catalog,
}

impl ResultSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Datasheet => "datasheet",
            Self::Catalog => "catalog",
        }
    }

    pub fn default_root(self) -> &'static str {
        match self {
            Self::Datasheet => ".cache/partscope/similarity-results",
            Self::Catalog => ".cache/partscope/similarity-results-api",
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum ResultView {
    /// Stored records with total score and confidence.
    Full,
    /// Score, confidence, difference summary and per-parameter comparability flags.
    Summary,
}

#[derive(Args, Debug, Clone)]
pub struct CatalogCredentials {
    #[arg(long, env = "DIGIKEY_CLIENT_ID", hide_env_values = true)]
    pub client_id: String,

    #[arg(long, env = "DIGIKEY_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: String,
}

#[derive(Args, Debug, Clone)]
pub struct ResultsArgs {
    #[arg(long)]
    pub target_id: String,

    #[arg(long)]
    pub manufacturer: Option<String>,

    #[arg(long, value_enum, default_value_t = ResultSource::Datasheet)]
    pub source: ResultSource,

    #[arg(long)]
    pub results_root: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = ResultView::Full)]
    pub view: ResultView,
}

#[derive(Args, Debug, Clone)]
pub struct RiskArgs {
    #[arg(long)]
    pub part_number: String,

    #[command(flatten)]
    pub credentials: CatalogCredentials,
}

#[derive(Args, Debug, Clone)]
pub struct BomArgs {
    #[arg(long)]
    pub bom_path: PathBuf,

    #[arg(long)]
    pub output_path: Option<PathBuf>,

    #[arg(long, default_value_t = 200)]
    pub delay_ms: u64,

    #[command(flatten)]
    pub credentials: CatalogCredentials,
}

#[derive(Args, Debug, Clone)]
pub struct DatasheetUrlArgs {
    #[arg(long)]
    pub mpn: String,

    #[arg(long)]
    pub manufacturer: Option<String>,

    #[command(flatten)]
    pub credentials: CatalogCredentials,
}

#[derive(Args, Debug, Clone)]
pub struct DownloadArgs {
    #[arg(long)]
    pub url: Option<String>,

    #[arg(long)]
    pub mpn: Option<String>,

    #[arg(long)]
    pub manufacturer: Option<String>,

    #[arg(long)]
    pub id: Option<String>,

    #[arg(long, default_value = ".cache/partscope/datasheets")]
    pub output_root: PathBuf,

    #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
    pub max_depth: u32,

    #[arg(long, env = "DIGIKEY_CLIENT_ID", hide_env_values = true)]
    pub client_id: Option<String>,

    #[arg(long, env = "DIGIKEY_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,
}
