pub mod annotate;
pub mod metrics;
pub mod status;

use crate::cli::LocationArgs;
use crate::config::PipelineConfig;

pub(crate) fn locate(config: &PipelineConfig, location: &LocationArgs) -> PipelineConfig {
    let mut located = config.clone();
    if let Some(data_dir) = &location.data_dir {
        located.data_dir = data_dir.clone();
    }
    if let Some(channel) = &location.channel {
        located.channel = channel.clone();
    }
    located
}

pub(crate) fn render_command() -> String {
    std::env::args().collect::<Vec<_>>().join(" ")
}
