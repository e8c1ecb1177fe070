use clap::Args;
use rama::error::{BoxError, ErrorContext as _};

use crate::config::{self, Options};

#[derive(Debug, Clone, Args)]
/// print the options exported by the probe script
pub struct InspectCommand {}

#[allow(clippy::print_stdout)]
pub async fn exec(_args: InspectCommand) -> Result<(), BoxError> {
    println!("{}", render_options(&config::options())?);
    Ok(())
}

fn render_options(options: &Options) -> Result<String, BoxError> {
    let s = serde_json::to_string_pretty(options).context("encode options as json")?;
    Ok(s)
}
