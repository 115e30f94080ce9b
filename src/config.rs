use std::ffi::OsString;
use std::{env, fs::File, io, path::PathBuf};

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use color_eyre::eyre::bail;
use color_eyre::{eyre::WrapErr, Result};
use log::debug;
use serde::Deserialize;

use crate::discover::Strategy;
use crate::util::Family;

pub const DEFAULT_TTL: u32 = 300;

/// Route 53 DDNS updater
#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Hostname of this machine. Use @ for the domain apex.
    /// Defaults to the short hostname reported by the OS
    #[arg(long, env = "DDNS_HOSTNAME")]
    pub hostname: Option<String>,

    /// The ID of your Route 53 hosted zone
    #[arg(long, env = "DDNS_ZONE_ID")]
    pub zone_id: Option<String>,

    /// The domain of your Route 53 hosted zone
    #[arg(long, env = "DDNS_DOMAIN")]
    pub domain: Option<String>,

    /// The TTL value in seconds for the upserted records [default: 300]
    #[arg(short, long, env = "DDNS_TTL")]
    pub ttl: Option<u32>,

    /// Config file path. Default path is ~/.config/route53-ddns/config.toml
    /// (XDG_CONFIG_HOME is used instead of ~/.config/ if set)
    #[arg(short, long = "config", env = "DDNS_CONFIG")]
    pub config_path: Option<PathBuf>,

    /// How the public addresses are discovered [default: consensus]
    #[arg(long, value_enum, env = "DDNS_STRATEGY")]
    pub strategy: Option<Strategy>,

    /// AWS region used to sign requests. Route 53 is global, so any region works
    #[arg(long, env = "AWS_REGION")]
    pub aws_region: Option<String>,

    /// Don't discover or publish an A record
    #[arg(long)]
    pub no_a: bool,

    /// Don't discover or publish an AAAA record
    #[arg(long)]
    pub no_aaaa: bool,
}

#[derive(Deserialize, Debug, Default)]
pub struct TomlConfig {
    pub hostname: Option<String>,
    pub zone_id: Option<String>,
    pub domain: Option<String>,
    pub ttl: Option<u32>,
    pub strategy: Option<Strategy>,
    pub a: Option<bool>,
    pub aaaa: Option<bool>,
}

fn default_config_path() -> Option<PathBuf> {
    env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
        .map(|config_home| config_home.join("route53-ddns").join("config.toml"))
}

pub fn get_toml_config_or_default(args: &Args) -> Result<TomlConfig> {
    let config_file = match (&args.config_path, default_config_path()) {
        (Some(config_path), _) => File::open(config_path),
        (None, Some(default_path)) => File::open(default_path),
        (None, None) => return Ok(TomlConfig::default()),
    };

    match config_file {
        Ok(config_file) => {
            let config_data = io::read_to_string(config_file)?;
            toml::from_str(&config_data).wrap_err("Config file is not valid TOML")
        }
        Err(err) => {
            if args.config_path.is_some() {
                return Err(err).wrap_err("-c supplied but couldn't open file");
            }
            Ok(TomlConfig::default())
        }
    }
}

/// Settings for a single run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub hostname: String,
    pub domain: String,
    pub zone_id: String,
    pub ttl: u32,
    pub strategy: Strategy,
    pub families: Vec<Family>,
    pub aws_region: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn short_hostname(os_hostname: impl FnOnce() -> io::Result<OsString>) -> Result<String> {
    let full = os_hostname()
        .wrap_err("Could not determine your hostname. Please provide the --hostname flag")?;
    let full = full.to_string_lossy();
    match full.split('.').next() {
        Some(short) if !short.is_empty() => Ok(short.to_string()),
        _ => bail!("OS hostname {full:?} is unusable. Please provide the --hostname flag"),
    }
}

fn missing_required(name: &str) -> clap::Error {
    Args::command().error(
        ErrorKind::MissingRequiredArgument,
        format!("--zone-id and --domain are both required ({name} is missing)"),
    )
}

impl Config {
    pub fn new(args: Args) -> Result<Config> {
        let toml = get_toml_config_or_default(&args)?;
        Self::from_parts(args, toml, hostname::get)
    }

    pub fn from_parts(
        args: Args,
        toml: TomlConfig,
        os_hostname: impl FnOnce() -> io::Result<OsString>,
    ) -> Result<Config> {
        let hostname = match non_empty(args.hostname).or(non_empty(toml.hostname)) {
            Some(hostname) => hostname,
            None => short_hostname(os_hostname)?,
        };

        let Some(zone_id) = non_empty(args.zone_id).or(non_empty(toml.zone_id)) else {
            return Err(missing_required("--zone-id").into());
        };
        let Some(domain) = non_empty(args.domain).or(non_empty(toml.domain)) else {
            return Err(missing_required("--domain").into());
        };

        let a = !args.no_a && toml.a.unwrap_or(true);
        let aaaa = !args.no_aaaa && toml.aaaa.unwrap_or(true);
        let families = Family::ALL
            .into_iter()
            .filter(|family| match family {
                Family::A => a,
                Family::Aaaa => aaaa,
            })
            .collect();

        let config = Config {
            hostname,
            domain,
            zone_id,
            ttl: args.ttl.or(toml.ttl).unwrap_or(DEFAULT_TTL),
            strategy: args.strategy.or(toml.strategy).unwrap_or_default(),
            families,
            aws_region: non_empty(args.aws_region),
        };
        debug!("Resolved config: {config:?}");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    // Built by hand: `Args::try_parse_from` reads DDNS_* from the environment.
    fn args(hostname: Option<&str>, zone_id: Option<&str>, domain: Option<&str>) -> Args {
        Args {
            hostname: hostname.map(String::from),
            zone_id: zone_id.map(String::from),
            domain: domain.map(String::from),
            ..Default::default()
        }
    }

    fn no_os_hostname() -> io::Result<OsString> {
        Err(io::Error::other("no hostname"))
    }

    #[test]
    fn explicit_flags_win() {
        let config = Config::from_parts(
            Args {
                ttl: Some(60),
                ..args(Some("home"), Some("Z123"), Some("example.com"))
            },
            TomlConfig {
                hostname: Some("other".into()),
                ttl: Some(900),
                ..Default::default()
            },
            no_os_hostname,
        )
        .unwrap();

        assert_eq!(config.hostname, "home");
        assert_eq!(config.zone_id, "Z123");
        assert_eq!(config.domain, "example.com");
        assert_eq!(config.ttl, 60);
        assert_eq!(config.strategy, Strategy::Consensus);
        assert_eq!(config.families, vec![Family::A, Family::Aaaa]);
    }

    #[test]
    fn ttl_defaults_to_300() {
        let config = Config::from_parts(
            args(Some("@"), Some("Z1"), Some("example.com")),
            TomlConfig::default(),
            no_os_hostname,
        )
        .unwrap();
        assert_eq!(config.ttl, 300);
        assert_eq!(config.hostname, "@");
    }

    #[test]
    fn padded_values_are_trimmed() {
        let config = Config::from_parts(
            args(Some(" home "), Some("\tZ1 "), Some(" example.com\n")),
            TomlConfig::default(),
            no_os_hostname,
        )
        .unwrap();
        assert_eq!(config.hostname, "home");
        assert_eq!(config.zone_id, "Z1");
        assert_eq!(config.domain, "example.com");
    }

    #[test]
    fn falls_back_to_short_os_hostname() {
        for hostname in [None, Some(""), Some("   ")] {
            let config = Config::from_parts(
                args(hostname, Some("Z1"), Some("example.com")),
                TomlConfig::default(),
                || Ok(OsString::from("nas.lan.example")),
            )
            .unwrap();
            assert_eq!(config.hostname, "nas");
        }
    }

    #[test]
    fn unknown_os_hostname_is_fatal() {
        let err = Config::from_parts(
            args(None, Some("Z1"), Some("example.com")),
            TomlConfig::default(),
            no_os_hostname,
        )
        .unwrap_err();
        assert!(err.to_string().contains("--hostname"));
    }

    #[test]
    fn missing_zone_id_or_domain_is_a_usage_error() {
        for incomplete in [
            args(Some("home"), None, Some("example.com")),
            args(Some("home"), Some("Z1"), None),
            args(Some("home"), Some(""), Some("example.com")),
        ] {
            let err = Config::from_parts(incomplete, TomlConfig::default(), no_os_hostname)
                .unwrap_err();
            let clap_err = err.downcast_ref::<clap::Error>().unwrap();
            assert_eq!(clap_err.kind(), ErrorKind::MissingRequiredArgument);
            assert_ne!(clap_err.exit_code(), 0);
        }
    }

    #[test]
    fn families_can_be_disabled() {
        let config = Config::from_parts(
            Args {
                no_a: true,
                ..args(Some("h"), Some("Z1"), Some("d.io"))
            },
            TomlConfig::default(),
            no_os_hostname,
        )
        .unwrap();
        assert_eq!(config.families, vec![Family::Aaaa]);

        let config = Config::from_parts(
            args(Some("h"), Some("Z1"), Some("d.io")),
            TomlConfig {
                aaaa: Some(false),
                ..Default::default()
            },
            no_os_hostname,
        )
        .unwrap();
        assert_eq!(config.families, vec![Family::A]);
    }

    #[test]
    fn reads_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
hostname = "router"
zone_id = "ZFILE"
domain = "example.net"
ttl = 120
strategy = "direct"
aaaa = false
"#
        )
        .unwrap();

        let args = Args {
            config_path: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        let toml = get_toml_config_or_default(&args).unwrap();
        let config = Config::from_parts(args, toml, no_os_hostname).unwrap();

        assert_eq!(config.hostname, "router");
        assert_eq!(config.zone_id, "ZFILE");
        assert_eq!(config.domain, "example.net");
        assert_eq!(config.ttl, 120);
        assert_eq!(config.strategy, Strategy::Direct);
        assert_eq!(config.families, vec![Family::A]);
    }

    #[test]
    fn missing_explicit_config_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let args = Args {
            config_path: Some(dir.path().join("absent.toml")),
            ..Default::default()
        };
        assert!(get_toml_config_or_default(&args).is_err());
    }
}
