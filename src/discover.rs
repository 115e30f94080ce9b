use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use clap::ValueEnum;
use color_eyre::eyre::{ensure, eyre, WrapErr};
use color_eyre::Result;
use log::debug;
use serde::Deserialize;

use crate::util::*;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Ask several independent services and take the address most of them agree on
    #[default]
    Consensus,
    /// Ask a single JSON endpoint
    Direct,
}

/// Something that can tell us this host's public address in one family.
#[async_trait]
pub trait AddressSource {
    async fn discover(&self, family: Family) -> Result<IpAddr>;
}

/// An IP echo service with one URL per family.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub name: String,
    pub v4_url: String,
    pub v6_url: String,
    pub format: Format,
    pub weight: u32,
}

impl Endpoint {
    pub fn new(name: &str, v4_url: &str, v6_url: &str, format: Format, weight: u32) -> Self {
        Endpoint {
            name: name.to_string(),
            v4_url: v4_url.to_string(),
            v6_url: v6_url.to_string(),
            format,
            weight,
        }
    }

    fn url(&self, family: Family) -> &str {
        match family {
            Family::A => &self.v4_url,
            Family::Aaaa => &self.v6_url,
        }
    }
}

pub fn direct_endpoints() -> Vec<Endpoint> {
    vec![Endpoint::new(
        "ipify",
        "https://api.ipify.org?format=json",
        "https://api6.ipify.org?format=json",
        Format::Json,
        1,
    )]
}

pub fn consensus_endpoints() -> Vec<Endpoint> {
    vec![
        Endpoint::new(
            "ipify",
            "https://api.ipify.org",
            "https://api6.ipify.org",
            Format::Plain,
            3,
        ),
        Endpoint::new(
            "icanhazip",
            "https://ipv4.icanhazip.com",
            "https://ipv6.icanhazip.com",
            Format::Plain,
            3,
        ),
        Endpoint::new(
            "ident.me",
            "https://v4.ident.me",
            "https://v6.ident.me",
            Format::Plain,
            3,
        ),
        Endpoint::new(
            "cloudflare",
            "https://1.1.1.1/cdn-cgi/trace",
            "https://[2606:4700:4700::1111]/cdn-cgi/trace",
            Format::Trace,
            2,
        ),
    ]
}

pub struct Discoverer {
    client: reqwest::Client,
    endpoints: Vec<Endpoint>,
}

impl Discoverer {
    pub fn new(strategy: Strategy) -> Result<Self> {
        Self::with_endpoints(match strategy {
            Strategy::Consensus => consensus_endpoints(),
            Strategy::Direct => direct_endpoints(),
        })
    }

    pub fn with_endpoints(endpoints: Vec<Endpoint>) -> Result<Self> {
        ensure!(!endpoints.is_empty(), "At least one IP echo endpoint is needed");
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .wrap_err("Failed to build HTTP client")?;

        Ok(Discoverer { client, endpoints })
    }

    async fn query(&self, endpoint: &Endpoint, family: Family) -> Result<IpAddr> {
        let url = endpoint.url(family);
        let protocol = family.protocol();

        let response = match self.client.get(url).send().await {
            Ok(r) => r,
            Err(e) => {
                return if e.is_connect() {
                    Err(e).wrap_err_with(|| {
                        format!("Connection error, check {protocol} connectivity")
                    })
                } else {
                    Err(e.into())
                }
            }
        };
        let body = response.ensure_success()?.text().await?;
        let ip = parse_address(endpoint.format, &body)
            .wrap_err_with(|| format!("Unexpected response from {url}"))?;
        ensure!(
            family.matches(&ip),
            "{url} returned {ip}, which is not an {protocol} address"
        );

        Ok(ip)
    }
}

#[async_trait]
impl AddressSource for Discoverer {
    async fn discover(&self, family: Family) -> Result<IpAddr> {
        let mut votes: Vec<(IpAddr, u32)> = Vec::new();
        let mut errors = Vec::new();

        for endpoint in &self.endpoints {
            match self.query(endpoint, family).await {
                Ok(ip) => {
                    debug!("{family}: {} answered {ip}", endpoint.name);
                    match votes.iter_mut().find(|(voted, _)| *voted == ip) {
                        Some((_, weight)) => *weight += endpoint.weight,
                        None => votes.push((ip, endpoint.weight)),
                    }
                }
                Err(err) => {
                    debug!("{family}: {} failed: {err:#}", endpoint.name);
                    errors.push(format!("{}: {err:#}", endpoint.name));
                }
            }
        }

        // Strict comparison keeps the first address seen on a tie.
        let mut winner: Option<(IpAddr, u32)> = None;
        for (ip, weight) in votes {
            if winner.map_or(true, |(_, best)| weight > best) {
                winner = Some((ip, weight));
            }
        }

        winner.map(|(ip, _)| ip).ok_or_else(|| {
            eyre!(
                "No {} address could be discovered ({})",
                family.protocol(),
                errors.join("; ")
            )
        })
    }
}
