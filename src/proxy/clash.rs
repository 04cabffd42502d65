use crate::error::{ConvertError, Result};
use crate::proxy::{ProxyDescriptor, StreamProxy, StreamTransport, TrojanProxy, TrojanTransport};
use crate::xray::Protocol;
use serde::Serialize;
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;

#[derive(Serialize)]
struct ClashStream<'a> {
    name: &'a str,
    port: u16,
    #[serde(rename = "type")]
    kind: &'static str,
    server: &'a str,
    uuid: &'a str,
    #[serde(rename = "alterId", skip_serializing_if = "Option::is_none")]
    alter_id: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cipher: Option<&'a str>,
    udp: bool,
    tls: bool,
    #[serde(rename = "skip-cert-verify", skip_serializing_if = "Option::is_none")]
    skip_cert_verify: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    servername: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    network: Option<&'static str>,
    #[serde(rename = "ws-opts", skip_serializing_if = "Option::is_none")]
    ws_opts: Option<WsOpts<'a>>,
    #[serde(rename = "http-opts", skip_serializing_if = "Option::is_none")]
    http_opts: Option<HttpOpts<'a>>,
}

#[derive(Serialize)]
struct ClashTrojan<'a> {
    name: &'a str,
    port: u16,
    #[serde(rename = "type")]
    kind: &'static str,
    server: &'a str,
    password: &'a str,
    udp: bool,
    sni: &'a str,
    #[serde(rename = "skip-cert-verify")]
    skip_cert_verify: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    alpn: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    network: Option<&'static str>,
    #[serde(rename = "ws-opts", skip_serializing_if = "Option::is_none")]
    ws_opts: Option<WsOpts<'a>>,
    #[serde(rename = "grpc-opts", skip_serializing_if = "Option::is_none")]
    grpc_opts: Option<GrpcOpts<'a>>,
}

#[derive(Serialize)]
struct WsOpts<'a> {
    path: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    headers: Option<BTreeMap<&'static str, &'a str>>,
}

#[derive(Serialize)]
struct HttpOpts<'a> {
    path: Vec<&'a str>,
    headers: BTreeMap<&'static str, Vec<&'static str>>,
}

#[derive(Serialize)]
struct GrpcOpts<'a> {
    #[serde(rename = "grpc-service-name")]
    grpc_service_name: &'a str,
}

fn ws_opts<'a>(path: &'a str, host: Option<&'a str>) -> WsOpts<'a> {
    WsOpts {
        path,
        headers: host.map(|h| BTreeMap::from([("Host", h)])),
    }
}

fn stream_entry(p: &StreamProxy, protocol: Protocol) -> ClashStream<'_> {
    let vmess = protocol == Protocol::Vmess;
    let mut entry = ClashStream {
        name: &p.name,
        port: p.port,
        kind: protocol.as_str(),
        server: &p.server,
        uuid: &p.uuid,
        alter_id: vmess.then_some(p.alter_id),
        cipher: vmess.then_some(p.cipher),
        udp: false,
        tls: p.tls,
        skip_cert_verify: p.skip_cert_verify.then_some(true),
        servername: p.servername.as_deref(),
        network: None,
        ws_opts: None,
        http_opts: None,
    };
    match &p.transport {
        StreamTransport::Plain => {}
        StreamTransport::Ws { path, host } => {
            entry.network = Some("ws");
            entry.ws_opts = Some(ws_opts(path, host.as_deref()));
        }
        StreamTransport::Http { path, .. } => {
            entry.network = Some("http");
            entry.http_opts = Some(HttpOpts {
                path: vec![path],
                headers: BTreeMap::from([("Connection", vec!["keep-alive"])]),
            });
        }
    }
    entry
}

fn trojan_entry(p: &TrojanProxy) -> ClashTrojan<'_> {
    let mut entry = ClashTrojan {
        name: &p.name,
        port: p.port,
        kind: Protocol::Trojan.as_str(),
        server: &p.server,
        password: &p.password,
        udp: false,
        sni: &p.sni,
        skip_cert_verify: p.skip_cert_verify,
        alpn: p.alpn.as_deref(),
        network: None,
        ws_opts: None,
        grpc_opts: None,
    };
    match &p.transport {
        TrojanTransport::Plain => {}
        TrojanTransport::Ws { path, host } => {
            entry.network = Some("ws");
            entry.ws_opts = Some(ws_opts(path, host.as_deref()));
        }
        TrojanTransport::Grpc { service_name } => {
            entry.network = Some("grpc");
            entry.grpc_opts = Some(GrpcOpts {
                grpc_service_name: service_name,
            });
        }
    }
    entry
}

/// One entry of a Clash `proxies` list.
pub fn to_clash(descriptor: &ProxyDescriptor) -> Result<Value> {
    let value = match descriptor {
        ProxyDescriptor::Vmess(p) => serde_yaml::to_value(stream_entry(p, Protocol::Vmess))?,
        ProxyDescriptor::Vless(p) => serde_yaml::to_value(stream_entry(p, Protocol::Vless))?,
        ProxyDescriptor::Trojan(p) => serde_yaml::to_value(trojan_entry(p))?,
    };
    Ok(value)
}

/// Copies `template`, replaces its `proxies` with `descriptors` and points the first
/// proxy group at them.
pub fn render_document(template: &Value, descriptors: &[ProxyDescriptor]) -> Result<Value> {
    let mut doc = template.clone();
    let root = doc
        .as_mapping_mut()
        .ok_or_else(|| ConvertError::InvalidTemplate("top level is not a mapping".to_string()))?;

    let proxies = descriptors
        .iter()
        .map(to_clash)
        .collect::<Result<Vec<_>>>()?;
    let names: Vec<Value> = descriptors
        .iter()
        .map(|d| Value::String(d.name().to_string()))
        .collect();

    let group = root
        .get_mut("proxy-groups")
        .and_then(|g| g.as_sequence_mut())
        .and_then(|g| g.first_mut())
        .and_then(|g| g.as_mapping_mut())
        .ok_or_else(|| {
            ConvertError::InvalidTemplate("proxy-groups needs at least one group".to_string())
        })?;
    group.insert(Value::from("proxies"), Value::Sequence(names));

    root.insert(Value::from("proxies"), Value::Sequence(proxies));
    Ok(doc)
}

/// Template-fill mode: sets the user's secret on every template proxy speaking `protocol`.
pub fn fill_template(template: &Value, protocol: Protocol, secret: &str) -> Result<Value> {
    let mut doc = template.clone();
    let proxies = doc
        .get_mut("proxies")
        .and_then(|p| p.as_sequence_mut())
        .ok_or_else(|| ConvertError::InvalidTemplate("missing proxies list".to_string()))?;

    let field = match protocol {
        Protocol::Vmess | Protocol::Vless => "uuid",
        Protocol::Trojan => "password",
    };
    let mut filled = 0;
    for proxy in proxies.iter_mut() {
        let Some(proxy) = proxy.as_mapping_mut() else {
            continue;
        };
        if proxy.get("type").and_then(|t| t.as_str()) != Some(protocol.as_str()) {
            continue;
        }
        proxy.insert(Value::from(field), Value::from(secret));
        filled += 1;
    }
    if filled == 0 {
        return Err(ConvertError::InvalidTemplate(format!(
            "no {} proxy to fill",
            protocol
        )));
    }
    Ok(doc)
}

pub fn empty_template() -> Value {
    let mut group = Mapping::new();
    group.insert(Value::from("name"), Value::from("PROXY"));
    group.insert(Value::from("type"), Value::from("select"));
    group.insert(Value::from("proxies"), Value::Sequence(vec![]));

    let mut root = Mapping::new();
    root.insert(Value::from("proxies"), Value::Sequence(vec![]));
    root.insert(
        Value::from("proxy-groups"),
        Value::Sequence(vec![Value::Mapping(group)]),
    );
    Value::Mapping(root)
}
