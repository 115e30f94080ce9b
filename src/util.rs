use color_eyre::eyre::{ensure, eyre, WrapErr};
use color_eyre::Result;
use reqwest::Response;
use serde::Deserialize;
use std::fmt;
use std::net::IpAddr;

pub trait EnsureSuccess {
    fn ensure_success(self) -> Result<Self>
    where
        Self: Sized;
}

impl EnsureSuccess for Response {
    fn ensure_success(self) -> Result<Self> {
        let status = self.status();
        ensure!(
            status.is_success(),
            "{} returned HTTP status code {}",
            self.url().as_str(),
            status.as_str()
        );
        Ok(self)
    }
}

/// Address family, named after the DNS record type that carries it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    A,
    Aaaa,
}

impl Family {
    pub const ALL: [Family; 2] = [Family::A, Family::Aaaa];

    pub fn record_type(self) -> &'static str {
        match self {
            Family::A => "A",
            Family::Aaaa => "AAAA",
        }
    }

    pub fn protocol(self) -> &'static str {
        match self {
            Family::A => "IPv4",
            Family::Aaaa => "IPv6",
        }
    }

    pub fn matches(self, ip: &IpAddr) -> bool {
        match self {
            Family::A => ip.is_ipv4(),
            Family::Aaaa => ip.is_ipv6(),
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.record_type())
    }
}

/// Body layout of an IP echo endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// The address alone, optionally surrounded by whitespace.
    Plain,
    /// `{"ip": "..."}`
    Json,
    /// Cloudflare `cdn-cgi/trace` key=value lines.
    Trace,
}

#[derive(Deserialize)]
struct IpResponse {
    ip: String,
}

pub fn parse_address(format: Format, body: &str) -> Result<IpAddr> {
    let text = match format {
        Format::Plain => body.trim().to_string(),
        Format::Json => {
            let response: IpResponse = serde_json::from_str(body)
                .wrap_err_with(|| format!("Response is not a JSON ip object: {body}"))?;
            response.ip.trim().to_string()
        }
        Format::Trace => body
            .lines()
            .find_map(|line| line.strip_prefix("ip=").map(String::from))
            .ok_or_else(|| eyre!("Couldn't find ip= in the response\nFull response: {body}"))?,
    };

    text.parse::<IpAddr>().wrap_err_with(|| format!("Invalid IP address: {text}"))
}
