use color_eyre::eyre::ensure;
use color_eyre::Result;
use log::{info, warn};

use crate::change::*;
use crate::client::Publisher;
use crate::config::Config;
use crate::discover::AddressSource;

/// Discovers every enabled family, then upserts whatever was found in one batch.
/// A family that can't be discovered is skipped; nothing is published if all of them fail.
pub async fn run(
    config: &Config,
    source: &impl AddressSource,
    publisher: &impl Publisher,
) -> Result<usize> {
    let mut batch = ChangeBatch::new(&config.zone_id);

    for &family in &config.families {
        let addr = match source.discover(family).await {
            Ok(addr) => addr,
            Err(err) => {
                warn!("Could not determine an address for the {family} record: {err:#}");
                continue;
            }
        };

        let change = create_change(&config.hostname, &config.domain, family, addr, config.ttl);
        info!(
            "Prepared upsert of {} {} -> {} (ttl {})",
            change.record_type(),
            change.name,
            change.value,
            change.ttl
        );
        batch.push(change);
    }

    ensure!(
        !batch.is_empty(),
        "Couldn't determine a single public IP for this machine. Abort."
    );

    publisher.publish(&batch).await?;
    info!("Pushed {} records to Route 53", batch.len());

    Ok(batch.len())
}
