use crate::error::Result;
use crate::xray::users::{identities, ClientIdentity};
use crate::xray::{Inbound, Security, XrayConfig};
use serde::Serialize;
use std::net::IpAddr;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct InboundSummary {
    pub index: usize,
    pub protocol: String,
    /// As written in the config; `None` for unix-socket inbounds.
    pub port: Option<serde_json::Value>,
    pub listen: String,
    pub network: String,
    pub security: Security,
    pub reverse_proxy: bool,
    pub users_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub users: Option<Vec<ClientIdentity>>,
}

/// True only when `listen` is set to a loopback address; an absent `listen` binds everywhere.
pub fn is_behind_reverse_proxy(inbound: &Inbound) -> bool {
    match inbound.listen.as_deref() {
        Some(listen) => listen
            .parse::<IpAddr>()
            .map(|ip| ip.is_loopback())
            .unwrap_or(false),
        None => false,
    }
}

pub fn summarize(index: usize, inbound: &Inbound, verbose: bool) -> Result<InboundSummary> {
    // non-proxy inbounds (api, dokodemo-door) have no users to list
    let users = if verbose && inbound.protocol().is_ok() {
        Some(identities(inbound)?.collect::<Result<Vec<_>>>()?)
    } else {
        None
    };

    Ok(InboundSummary {
        index,
        protocol: inbound.protocol.clone(),
        port: inbound.port.clone(),
        listen: inbound.listen_address().to_string(),
        network: inbound.network().to_string(),
        security: inbound.security(),
        reverse_proxy: is_behind_reverse_proxy(inbound),
        users_count: inbound.clients().len(),
        users,
    })
}

pub fn summarize_all(config: &XrayConfig, verbose: bool) -> Result<Vec<InboundSummary>> {
    config
        .inbounds()
        .iter()
        .enumerate()
        .map(|(index, inbound)| summarize(index, inbound, verbose))
        .collect()
}
