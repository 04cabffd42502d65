use crate::def::LinkEncoder;
use crate::error::{ConvertError, Result};
use crate::link::ShareLink;
use crate::proxy::{ProxyDescriptor, StreamProxy, StreamTransport};
use crate::xray::Protocol;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

pub const SCHEME: &str = "vmess";
/// Port left in server templates; clients are handed 443 instead.
pub const PLACEHOLDER_PORT: u16 = 10000;
pub const PLACEHOLDER_SUBSTITUTE: u16 = 443;

/// The `v: "2"` share-link record. Field order matches what clients emit.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct VmessLink {
    pub add: String,
    pub aid: String,
    pub host: String,
    pub id: String,
    pub net: String,
    pub path: String,
    pub port: u16,
    pub ps: String,
    pub scy: String,
    pub sni: String,
    pub tls: String,
    #[serde(rename = "type")]
    pub header_type: String,
    pub v: String,
}

pub fn link_port(port: u16) -> u16 {
    if port == PLACEHOLDER_PORT {
        PLACEHOLDER_SUBSTITUTE
    } else {
        port
    }
}

impl From<&StreamProxy> for VmessLink {
    fn from(p: &StreamProxy) -> Self {
        let mut link = VmessLink {
            add: p.server.clone(),
            aid: p.alter_id.to_string(),
            host: String::new(),
            id: p.uuid.clone(),
            net: "tcp".to_string(),
            path: String::new(),
            port: link_port(p.port),
            ps: p.name.clone(),
            scy: p.cipher.to_string(),
            sni: p.servername.clone().unwrap_or_default(),
            tls: if p.tls { "tls".to_string() } else { String::new() },
            header_type: String::new(),
            v: "2".to_string(),
        };
        match &p.transport {
            StreamTransport::Plain => {}
            StreamTransport::Ws { path, host } => {
                link.net = "ws".to_string();
                link.path = path.clone();
                link.host = host.clone().unwrap_or_default();
            }
            StreamTransport::Http { path, host } => {
                link.header_type = "http".to_string();
                link.path = path.clone();
                link.host = host.clone().unwrap_or_default();
            }
        }
        link
    }
}

pub struct VmessEncoder;

pub(crate) fn vmess_encoder_factory() -> Box<dyn LinkEncoder> {
    Box::new(VmessEncoder)
}

impl LinkEncoder for VmessEncoder {
    fn scheme(&self) -> &'static str {
        SCHEME
    }

    fn encode(&self, descriptor: &ProxyDescriptor) -> Result<ShareLink> {
        let ProxyDescriptor::Vmess(proxy) = descriptor else {
            return Err(ConvertError::UnsupportedLinkProtocol(descriptor.protocol()));
        };
        let json = serde_json::to_string(&VmessLink::from(proxy))?;
        let payload = STANDARD.encode(json.as_bytes());
        Ok(ShareLink::new(Protocol::Vmess, self.scheme(), &payload))
    }
}
