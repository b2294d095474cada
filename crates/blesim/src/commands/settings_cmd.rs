//! `settings`: print the effective settings after all layers are applied.

use crate::cli::{GlobalOpts, OutputFormat};
use crate::config;
use crate::error::CliError;
use crate::output;

pub fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let settings = config::load_settings(global)?;

    let rendered = match global.output {
        OutputFormat::Json => serde_json::to_string_pretty(&settings)?,
        OutputFormat::JsonCompact => serde_json::to_string(&settings)?,
        OutputFormat::Table | OutputFormat::Plain => settings.to_toml()?,
    };
    output::print_output(&rendered, global.quiet);
    Ok(())
}
