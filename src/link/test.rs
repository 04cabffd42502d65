use crate::error::ConvertError;
use crate::link::vmess::VmessLink;
use crate::link::{encode, get_encoder_factory_fn};
use crate::proxy::{build, BuildOptions, ServerAddress};
use crate::xray::users::ClientIdentity;
use crate::xray::{Protocol, XrayConfig};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

const CONFIG: &str = r#"{"inbounds": [
    {"protocol": "vmess", "port": 443,
     "streamSettings": {"network": "ws", "security": "tls",
                        "wsSettings": {"path": "/ray", "headers": {"Host": "cdn.example.com"}}}},
    {"protocol": "vmess", "port": 10000,
     "streamSettings": {"network": "tcp", "tcpSettings": {"header": {"type": "http"}}}},
    {"protocol": "vmess", "port": 8080, "streamSettings": {"network": "tcp"}},
    {"protocol": "trojan", "port": 443, "streamSettings": {"network": "tcp"}},
    {"protocol": "vless", "port": 443, "streamSettings": {"network": "tcp"}}
]}"#;

fn opts() -> BuildOptions {
    BuildOptions {
        name: "XRAY_VPN".to_string(),
        address: ServerAddress::new(None, Some("example.com".to_string()), true).unwrap(),
        skip_cert_verify: true,
    }
}

fn decode(uri: &str) -> VmessLink {
    let payload = uri.strip_prefix("vmess://").unwrap();
    let json = STANDARD.decode(payload).unwrap();
    serde_json::from_slice(&json).unwrap()
}

fn link_for(index: usize) -> (XrayConfig, String) {
    let cfg = XrayConfig::from_json(CONFIG).unwrap();
    let identity = ClientIdentity::new("abc-123", "bob");
    let d = build(cfg.inbound_at(index).unwrap(), &identity, &opts()).unwrap();
    let link = encode(&d).unwrap();
    assert_eq!(link.protocol(), Protocol::Vmess);
    (cfg, link.uri().to_string())
}

#[test]
fn test_ws_tls_link() {
    let (_, uri) = link_for(0);
    let link = decode(&uri);
    assert_eq!(link.add, "example.com");
    assert_eq!(link.aid, "0");
    assert_eq!(link.host, "cdn.example.com");
    assert_eq!(link.id, "abc-123");
    assert_eq!(link.net, "ws");
    assert_eq!(link.path, "/ray");
    assert_eq!(link.port, 443);
    assert_eq!(link.ps, "XRAY_VPN");
    assert_eq!(link.scy, "chacha20-poly1305");
    assert_eq!(link.sni, "example.com");
    assert_eq!(link.tls, "tls");
    assert_eq!(link.header_type, "");
    assert_eq!(link.v, "2");
}

#[test]
fn test_tcp_http_link_and_placeholder_port() {
    let (cfg, uri) = link_for(1);
    let link = decode(&uri);
    assert_eq!(link.net, "tcp");
    assert_eq!(link.header_type, "http");
    assert_eq!(link.path, "/");
    assert_eq!(link.host, "example.com");
    assert_eq!(link.tls, "");
    assert_eq!(link.port, 443);
    // substitution is link-only
    assert_eq!(cfg.inbound_at(1).unwrap().port().unwrap(), 10000);
}

#[test]
fn test_plain_tcp_link() {
    let (_, uri) = link_for(2);
    let link = decode(&uri);
    assert_eq!(link.net, "tcp");
    assert_eq!(link.path, "");
    assert_eq!(link.host, "");
    assert_eq!(link.port, 8080);
}

#[test]
fn test_link_json_shape() {
    let (_, uri) = link_for(0);
    let json = STANDARD.decode(uri.strip_prefix("vmess://").unwrap()).unwrap();
    let json = String::from_utf8(json).unwrap();
    assert!(json.starts_with(r#"{"add":"example.com","aid":"0","#));
    assert!(json.ends_with(r#""v":"2"}"#));
}

#[test]
fn test_unsupported_link_protocols() {
    let cfg = XrayConfig::from_json(CONFIG).unwrap();
    let identity = ClientIdentity::new("abc-123", "bob");
    for (index, protocol) in [(3, Protocol::Trojan), (4, Protocol::Vless)] {
        let d = build(cfg.inbound_at(index).unwrap(), &identity, &opts()).unwrap();
        match encode(&d) {
            Err(ConvertError::UnsupportedLinkProtocol(p)) => assert_eq!(p, protocol),
            other => panic!("unexpected {:?}", other),
        }
    }
    assert!(get_encoder_factory_fn(Protocol::Vmess).is_some());
    assert!(get_encoder_factory_fn(Protocol::Trojan).is_none());
}

#[test]
fn test_vmess_encoder_rejects_other_descriptors() {
    let cfg = XrayConfig::from_json(CONFIG).unwrap();
    let identity = ClientIdentity::new("pw", "bob");
    let trojan = build(cfg.inbound_at(3).unwrap(), &identity, &opts()).unwrap();
    let encoder = get_encoder_factory_fn(Protocol::Vmess).unwrap()();
    assert_eq!(encoder.scheme(), "vmess");
    assert!(encoder.encode(&trojan).is_err());
}
