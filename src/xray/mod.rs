use crate::error::{ConvertError, Result};
use crate::xray::users::ClientIdentity;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

pub mod inspect;
pub mod users;

pub const DEFAULT_LISTEN: &str = "0.0.0.0";
pub const DEFAULT_NETWORK: &str = "tcp";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Vmess,
    Vless,
    Trojan,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Vmess => "vmess",
            Protocol::Vless => "vless",
            Protocol::Trojan => "trojan",
        }
    }

    /// Name of the client record field holding the per-user secret.
    pub fn secret_field(&self) -> &'static str {
        match self {
            Protocol::Vmess | Protocol::Vless => "id",
            Protocol::Trojan => "password",
        }
    }
}

impl FromStr for Protocol {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "vmess" => Ok(Protocol::Vmess),
            "vless" => Ok(Protocol::Vless),
            "trojan" => Ok(Protocol::Trojan),
            _ => Err(ConvertError::UnsupportedProtocol(s.to_string())),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Security {
    Tls,
    Xtls,
    None,
}

impl Security {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("tls") => Security::Tls,
            Some("xtls") => Security::Xtls,
            _ => Security::None,
        }
    }

    pub fn is_tls(&self) -> bool {
        matches!(self, Security::Tls | Security::Xtls)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transport {
    Ws { path: String, host: Option<String> },
    Tcp { header_type: Option<String> },
    Grpc { service_name: String },
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct XrayConfig {
    #[serde(default)]
    pub inbounds: Vec<Inbound>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Inbound {
    pub protocol: String,
    /// Raw value: a number, a numeric string or a range like `"20000-20010"`.
    /// Unix-socket inbounds have none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listen: Option<String>,
    #[serde(rename = "streamSettings", default, skip_serializing_if = "Option::is_none")]
    pub stream_settings: Option<StreamSettings>,
    #[serde(default)]
    pub settings: InboundSettings,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct StreamSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security: Option<String>,
    #[serde(rename = "wsSettings", default, skip_serializing_if = "Option::is_none")]
    pub ws_settings: Option<WsSettings>,
    #[serde(rename = "tcpSettings", default, skip_serializing_if = "Option::is_none")]
    pub tcp_settings: Option<TcpSettings>,
    #[serde(rename = "grpcSettings", default, skip_serializing_if = "Option::is_none")]
    pub grpc_settings: Option<GrpcSettings>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct WsSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<WsHeader>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<Map<String, Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct WsHeader {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct TcpSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<TcpHeader>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct TcpHeader {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub header_type: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct GrpcSettings {
    #[serde(rename = "serviceName", default, skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct InboundSettings {
    #[serde(default)]
    pub clients: Vec<Client>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Client {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Client {
    pub fn from_identity(protocol: Protocol, identity: &ClientIdentity) -> Self {
        let mut client = Client {
            email: identity.label.clone(),
            ..Default::default()
        };
        match protocol {
            Protocol::Vmess | Protocol::Vless => client.id = Some(identity.secret.clone()),
            Protocol::Trojan => client.password = Some(identity.secret.clone()),
        }
        client
    }
}

impl Inbound {
    pub fn protocol(&self) -> Result<Protocol> {
        self.protocol.parse()
    }

    /// The single port clients dial.
    pub fn port(&self) -> Result<u16> {
        let port = match &self.port {
            None => return Err(ConvertError::MissingField("port")),
            Some(Value::Number(n)) => n.as_u64().and_then(|p| u16::try_from(p).ok()),
            Some(Value::String(s)) => s.trim().parse::<u16>().ok(),
            Some(_) => None,
        };
        match port {
            Some(port) if port != 0 => Ok(port),
            _ => Err(ConvertError::InvalidPort(
                self.port.as_ref().map(|v| v.to_string()).unwrap_or_default(),
            )),
        }
    }

    pub fn listen_address(&self) -> &str {
        self.listen.as_deref().unwrap_or(DEFAULT_LISTEN)
    }

    pub fn network(&self) -> &str {
        self.stream_settings
            .as_ref()
            .and_then(|s| s.network.as_deref())
            .unwrap_or(DEFAULT_NETWORK)
    }

    pub fn security(&self) -> Security {
        Security::parse(self.stream_settings.as_ref().and_then(|s| s.security.as_deref()))
    }

    pub fn transport(&self) -> Result<Transport> {
        let stream = self.stream_settings.as_ref();
        match self.network() {
            "ws" => {
                let ws = stream.and_then(|s| s.ws_settings.as_ref());
                let path = ws
                    .and_then(|w| w.path.clone())
                    .ok_or(ConvertError::MissingField("streamSettings.wsSettings.path"))?;
                let host = ws.and_then(ws_host);
                Ok(Transport::Ws { path, host })
            }
            "tcp" => {
                let header_type = stream
                    .and_then(|s| s.tcp_settings.as_ref())
                    .and_then(|t| t.header.as_ref())
                    .and_then(|h| h.header_type.clone());
                Ok(Transport::Tcp { header_type })
            }
            "grpc" => {
                let service_name = stream
                    .and_then(|s| s.grpc_settings.as_ref())
                    .and_then(|g| g.service_name.clone())
                    .ok_or(ConvertError::MissingField(
                        "streamSettings.grpcSettings.serviceName",
                    ))?;
                Ok(Transport::Grpc { service_name })
            }
            other => Err(ConvertError::UnsupportedTransport {
                protocol: self.protocol.clone(),
                network: other.to_string(),
            }),
        }
    }

    pub fn clients(&self) -> &[Client] {
        &self.settings.clients
    }
}

// `header.key` is what older panels write; Xray itself reads `headers.Host`.
fn ws_host(ws: &WsSettings) -> Option<String> {
    if let Some(key) = ws.header.as_ref().and_then(|h| h.key.clone()) {
        return Some(key);
    }
    ws.headers
        .as_ref()
        .and_then(|h| h.get("Host"))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

impl XrayConfig {
    pub fn from_json(contents: &str) -> Result<Self> {
        Ok(serde_json::from_str(contents)?)
    }

    /// Renders the config with four-space indentation, the layout Xray panels write.
    pub fn to_json_pretty(&self) -> Result<String> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut ser)?;
        buf.push(b'\n');
        String::from_utf8(buf)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e).into())
    }

    pub fn inbounds(&self) -> &[Inbound] {
        &self.inbounds
    }

    pub fn inbound_at(&self, index: usize) -> Result<&Inbound> {
        self.inbounds.get(index).ok_or(ConvertError::IndexOutOfRange {
            index,
            len: self.inbounds.len(),
        })
    }

    /// Appends a client record to the inbound. Label uniqueness is the caller's job.
    pub fn append_client(&mut self, index: usize, identity: &ClientIdentity) -> Result<()> {
        let len = self.inbounds.len();
        let inbound = self
            .inbounds
            .get_mut(index)
            .ok_or(ConvertError::IndexOutOfRange { index, len })?;
        let protocol = inbound.protocol()?;
        inbound
            .settings
            .clients
            .push(Client::from_identity(protocol, identity));
        Ok(())
    }
}
