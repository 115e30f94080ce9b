use clap::Parser;
use color_eyre::Result;
use env_logger::Env;

mod change;
mod client;
mod config;
mod discover;
mod updater;
mod util;

use crate::client::*;
use crate::config::*;
use crate::discover::*;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    // Log without timestamp
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let args = Args::parse();

    let config = match Config::new(args) {
        Ok(config) => config,
        Err(err) => match err.downcast_ref::<clap::Error>() {
            Some(usage) => usage.exit(),
            None => return Err(err),
        },
    };

    let discoverer = Discoverer::new(config.strategy)?;
    let publisher = Route53Client::new(config.aws_region.clone());

    updater::run(&config, &discoverer, &publisher).await?;

    Ok(())
}
