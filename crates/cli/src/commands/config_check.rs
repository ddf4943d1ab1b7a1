//! Loads the resolved configuration and prints it, without touching the
//! exchange or storage. Useful for validating a profile before `run`.

use anyhow::{Context, Result};
use arb_core::ConfigLoader;
use clap::Args;

#[derive(Args, Debug, Clone)]
pub struct ConfigCheckArgs {
    /// Named config overlay to resolve, same as `run --profile`.
    #[arg(long)]
    pub profile: Option<String>,
}

pub async fn run(args: ConfigCheckArgs) -> Result<()> {
    let config = match &args.profile {
        Some(profile) => ConfigLoader::load_with_profile(profile).context("failed to load configuration")?,
        None => ConfigLoader::load().context("failed to load configuration")?,
    };

    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
