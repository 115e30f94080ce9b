use std::net::IpAddr;

use log::info;

use crate::util::Family;

/// Hostname that stands for the zone apex.
pub const APEX: &str = "@";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Upsert,
}

/// A single create-or-replace of one record set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRecord {
    pub action: Action,
    pub name: String,
    pub family: Family,
    pub value: String,
    pub ttl: u32,
}

impl ChangeRecord {
    pub fn record_type(&self) -> &'static str {
        self.family.record_type()
    }
}

/// Changes submitted together against one hosted zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeBatch {
    pub zone_id: String,
    pub changes: Vec<ChangeRecord>,
}

impl ChangeBatch {
    pub fn new(zone_id: &str) -> Self {
        ChangeBatch {
            zone_id: zone_id.to_string(),
            changes: Vec::new(),
        }
    }

    pub fn push(&mut self, change: ChangeRecord) {
        self.changes.push(change);
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

pub fn record_name(hostname: &str, domain: &str) -> String {
    if hostname == APEX {
        domain.to_string()
    } else {
        format!("{hostname}.{domain}")
    }
}

pub fn create_change(
    hostname: &str,
    domain: &str,
    family: Family,
    addr: IpAddr,
    ttl: u32,
) -> ChangeRecord {
    info!("Discovered addr for {family} record: {addr}");

    ChangeRecord {
        action: Action::Upsert,
        name: record_name(hostname, domain),
        family,
        value: addr.to_string(),
        ttl,
    }
}
