use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "comment-signal",
    version,
    about = "Comment classification and weekly signal metrics"
)]
pub struct Cli {
    #[arg(long, global = true, env = "COMMENT_SIGNAL_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Annotate(AnnotateArgs),
    Metrics(MetricsArgs),
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct LocationArgs {
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    #[arg(long)]
    pub channel: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct AnnotateArgs {
    #[command(flatten)]
    pub location: LocationArgs,

    #[arg(long)]
    pub input: Option<PathBuf>,

    #[arg(long)]
    pub output: Option<PathBuf>,

    #[arg(long)]
    pub debug_dir: Option<PathBuf>,

    #[arg(long)]
    pub model: Option<String>,

    #[arg(long)]
    pub api_base: Option<String>,

    #[arg(long)]
    pub batch_size: Option<usize>,

    #[arg(long)]
    pub max_retries: Option<u32>,

    #[arg(long)]
    pub pause_ms: Option<u64>,

    #[arg(long, default_value_t = false)]
    pub no_repair: bool,

    #[arg(long)]
    pub max_response_tokens: Option<u32>,

    #[arg(long)]
    pub limit: Option<usize>,

    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct MetricsArgs {
    #[command(flatten)]
    pub location: LocationArgs,

    #[arg(long)]
    pub input: Option<PathBuf>,

    #[arg(long)]
    pub output: Option<PathBuf>,

    #[arg(long)]
    pub latest_weeks: Option<usize>,

    #[arg(long)]
    pub top_topics: Option<usize>,

    #[arg(long)]
    pub min_focus_week_comments: Option<usize>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct StatusArgs {
    #[command(flatten)]
    pub location: LocationArgs,
}
