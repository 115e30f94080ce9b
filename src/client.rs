use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_route53::error::DisplayErrorContext;
use aws_sdk_route53::types::{self, ChangeAction, ResourceRecord, ResourceRecordSet, RrType};
use aws_sdk_route53::Client as AwsClient;
use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use log::debug;
use tokio::sync::OnceCell;

use crate::change::*;
use crate::util::Family;

/// Route 53 is a global service; any region signs requests for it.
const FALLBACK_REGION: &str = "us-east-1";

const BATCH_COMMENT: &str = concat!("Updated by ", env!("CARGO_PKG_NAME"));

/// Submits a whole batch of changes in one request.
#[async_trait]
pub trait Publisher {
    async fn publish(&self, batch: &ChangeBatch) -> Result<()>;
}

pub struct Route53Client {
    region: Option<String>,
    authed_client: OnceCell<AwsClient>,
}

impl Route53Client {
    /// Nothing is resolved until the first publish, so a run that finds no address never
    /// touches the AWS credential or region chain.
    pub fn new(region: Option<String>) -> Self {
        Route53Client {
            region,
            authed_client: OnceCell::new(),
        }
    }

    #[cfg(test)]
    pub fn with_client(client: AwsClient) -> Self {
        Route53Client {
            region: None,
            authed_client: OnceCell::new_with(Some(client)),
        }
    }

    #[cfg(test)]
    pub fn is_bootstrapped(&self) -> bool {
        self.authed_client.initialized()
    }

    /// Credentials come from the default AWS chain (env, profile, IMDS, ...).
    async fn authed_client(&self) -> &AwsClient {
        self.authed_client
            .get_or_init(|| async {
                let region = RegionProviderChain::first_try(self.region.clone().map(Region::new))
                    .or_default_provider()
                    .or_else(Region::from_static(FALLBACK_REGION));
                let sdk_config = aws_config::defaults(BehaviorVersion::latest())
                    .region(region)
                    .load()
                    .await;
                AwsClient::new(&sdk_config)
            })
            .await
    }
}

fn rr_type(family: Family) -> RrType {
    match family {
        Family::A => RrType::A,
        Family::Aaaa => RrType::Aaaa,
    }
}

fn change_action(action: Action) -> ChangeAction {
    match action {
        Action::Upsert => ChangeAction::Upsert,
    }
}

fn to_route53_change(change: &ChangeRecord) -> Result<types::Change> {
    let record_set = ResourceRecordSet::builder()
        .name(&change.name)
        .r#type(rr_type(change.family))
        .ttl(i64::from(change.ttl))
        .resource_records(ResourceRecord::builder().value(&change.value).build()?)
        .build()
        .wrap_err_with(|| format!("Invalid record set for {}", change.name))?;

    Ok(types::Change::builder()
        .action(change_action(change.action))
        .resource_record_set(record_set)
        .build()?)
}

pub fn to_route53_batch(batch: &ChangeBatch) -> Result<types::ChangeBatch> {
    let changes = batch
        .changes
        .iter()
        .map(to_route53_change)
        .collect::<Result<Vec<_>>>()?;

    Ok(types::ChangeBatch::builder()
        .set_changes(Some(changes))
        .comment(BATCH_COMMENT)
        .build()?)
}

#[async_trait]
impl Publisher for Route53Client {
    async fn publish(&self, batch: &ChangeBatch) -> Result<()> {
        let zone_id = &batch.zone_id;
        let change_batch = to_route53_batch(batch)?;

        debug!("Submitting {} changes to zone {zone_id}", batch.len());
        let output = self
            .authed_client()
            .await
            .change_resource_record_sets()
            .hosted_zone_id(zone_id)
            .change_batch(change_batch)
            .send()
            .await
            .map_err(|err| {
                eyre!(
                    "Error pushing changes to Route 53 (zone: {zone_id}): {}",
                    DisplayErrorContext(&err)
                )
            })?;
        debug!("Route 53 response: {output:?}");

        Ok(())
    }
}
