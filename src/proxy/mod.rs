use crate::error::{ConvertError, Result};
use crate::xray::users::ClientIdentity;
use crate::xray::{Inbound, Protocol, Transport};
use std::net::IpAddr;

pub mod clash;

pub const VMESS_CIPHER: &str = "chacha20-poly1305";
pub const VMESS_ALTER_ID: u16 = 0;
pub const TROJAN_TCP_ALPN: &str = "http/1.1";
pub const HTTP_HEADER_PATH: &str = "/";

/// Where clients should dial. At least one of ip/domain is always present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAddress {
    kind: AddressKind,
    prefer_domain_for_sni: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum AddressKind {
    Ip(String),
    Domain(String),
    Both { ip: String, domain: String },
}

impl ServerAddress {
    /// Blank strings count as not configured.
    pub fn new(
        ip: Option<String>,
        domain: Option<String>,
        prefer_domain_for_sni: bool,
    ) -> Result<Self> {
        let ip = ip.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        let domain = domain
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        if let Some(ip) = &ip {
            if ip.parse::<IpAddr>().is_err() {
                return Err(ConvertError::InvalidServerIp(ip.clone()));
            }
        }
        let kind = match (ip, domain) {
            (Some(ip), Some(domain)) => AddressKind::Both { ip, domain },
            (Some(ip), None) => AddressKind::Ip(ip),
            (None, Some(domain)) => AddressKind::Domain(domain),
            (None, None) => return Err(ConvertError::NoServerAddress),
        };
        Ok(Self {
            kind,
            prefer_domain_for_sni,
        })
    }

    pub fn domain(&self) -> Option<&str> {
        match &self.kind {
            AddressKind::Domain(domain) | AddressKind::Both { domain, .. } => Some(domain.as_str()),
            AddressKind::Ip(_) => None,
        }
    }

    pub fn ip(&self) -> Option<&str> {
        match &self.kind {
            AddressKind::Ip(ip) | AddressKind::Both { ip, .. } => Some(ip.as_str()),
            AddressKind::Domain(_) => None,
        }
    }

    /// Value for the `server` field. With both configured, the domain wins only when
    /// `needs_hostname` and `prefer_domain_for_sni` are set; otherwise the IP does.
    pub fn server(&self, needs_hostname: bool) -> &str {
        match &self.kind {
            AddressKind::Ip(ip) => ip.as_str(),
            AddressKind::Domain(domain) => domain.as_str(),
            AddressKind::Both { ip, domain } => {
                if needs_hostname && self.prefer_domain_for_sni {
                    domain.as_str()
                } else {
                    ip.as_str()
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    pub name: String,
    pub address: ServerAddress,
    pub skip_cert_verify: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyDescriptor {
    Vmess(StreamProxy),
    Vless(StreamProxy),
    Trojan(TrojanProxy),
}

/// VMess and VLess share a shape; only the output tag and cipher handling differ.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamProxy {
    pub name: String,
    pub server: String,
    pub port: u16,
    pub uuid: String,
    pub cipher: &'static str,
    pub alter_id: u16,
    pub tls: bool,
    pub servername: Option<String>,
    pub skip_cert_verify: bool,
    pub transport: StreamTransport,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamTransport {
    Plain,
    Ws { path: String, host: Option<String> },
    /// TCP with an HTTP header disguise; `host` is the configured domain, if any.
    Http { path: String, host: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrojanProxy {
    pub name: String,
    pub server: String,
    pub port: u16,
    pub password: String,
    pub sni: String,
    pub alpn: Option<Vec<String>>,
    pub skip_cert_verify: bool,
    pub transport: TrojanTransport,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrojanTransport {
    Plain,
    Ws { path: String, host: Option<String> },
    Grpc { service_name: String },
}

impl ProxyDescriptor {
    pub fn protocol(&self) -> Protocol {
        match self {
            ProxyDescriptor::Vmess(_) => Protocol::Vmess,
            ProxyDescriptor::Vless(_) => Protocol::Vless,
            ProxyDescriptor::Trojan(_) => Protocol::Trojan,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ProxyDescriptor::Vmess(p) | ProxyDescriptor::Vless(p) => &p.name,
            ProxyDescriptor::Trojan(p) => &p.name,
        }
    }

    pub fn server(&self) -> &str {
        match self {
            ProxyDescriptor::Vmess(p) | ProxyDescriptor::Vless(p) => &p.server,
            ProxyDescriptor::Trojan(p) => &p.server,
        }
    }

    pub fn port(&self) -> u16 {
        match self {
            ProxyDescriptor::Vmess(p) | ProxyDescriptor::Vless(p) => p.port,
            ProxyDescriptor::Trojan(p) => p.port,
        }
    }
}

pub fn build(
    inbound: &Inbound,
    identity: &ClientIdentity,
    opts: &BuildOptions,
) -> Result<ProxyDescriptor> {
    match inbound.protocol()? {
        Protocol::Vmess => Ok(ProxyDescriptor::Vmess(build_stream(inbound, identity, opts)?)),
        Protocol::Vless => Ok(ProxyDescriptor::Vless(build_stream(inbound, identity, opts)?)),
        Protocol::Trojan => Ok(ProxyDescriptor::Trojan(build_trojan(inbound, identity, opts)?)),
    }
}

fn build_stream(
    inbound: &Inbound,
    identity: &ClientIdentity,
    opts: &BuildOptions,
) -> Result<StreamProxy> {
    let domain = opts.address.domain();
    let tls = inbound.security().is_tls();
    // certificates are never checked against a bare ip
    let servername = if tls {
        Some(domain.ok_or(ConvertError::TlsRequiresDomain)?.to_string())
    } else {
        None
    };

    let transport = match inbound.transport()? {
        Transport::Ws { path, host } => StreamTransport::Ws { path, host },
        Transport::Tcp {
            header_type: Some(header_type),
        } if header_type == "http" => StreamTransport::Http {
            path: HTTP_HEADER_PATH.to_string(),
            host: domain.map(|d| d.to_string()),
        },
        Transport::Tcp { .. } => StreamTransport::Plain,
        Transport::Grpc { .. } => {
            return Err(ConvertError::UnsupportedTransport {
                protocol: inbound.protocol.clone(),
                network: inbound.network().to_string(),
            })
        }
    };

    Ok(StreamProxy {
        name: opts.name.clone(),
        server: opts.address.server(tls).to_string(),
        port: inbound.port()?,
        uuid: identity.secret.clone(),
        cipher: VMESS_CIPHER,
        alter_id: VMESS_ALTER_ID,
        tls,
        servername,
        skip_cert_verify: tls && opts.skip_cert_verify,
        transport,
    })
}

fn build_trojan(
    inbound: &Inbound,
    identity: &ClientIdentity,
    opts: &BuildOptions,
) -> Result<TrojanProxy> {
    let sni = opts
        .address
        .domain()
        .ok_or(ConvertError::DomainRequiredForTrojan)?
        .to_string();

    let (transport, alpn) = match inbound.transport()? {
        Transport::Ws { path, host } => (TrojanTransport::Ws { path, host }, None),
        Transport::Tcp { .. } => (
            TrojanTransport::Plain,
            Some(vec![TROJAN_TCP_ALPN.to_string()]),
        ),
        Transport::Grpc { service_name } => (TrojanTransport::Grpc { service_name }, None),
    };

    Ok(TrojanProxy {
        name: opts.name.clone(),
        server: opts.address.server(true).to_string(),
        port: inbound.port()?,
        password: identity.secret.clone(),
        sni,
        alpn,
        skip_cert_verify: opts.skip_cert_verify,
        transport,
    })
}
