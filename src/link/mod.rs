use crate::def::LinkEncoder;
use crate::error::{ConvertError, Result};
use crate::proxy::ProxyDescriptor;
use crate::xray::Protocol;
use std::fmt;

pub mod vmess;
#[cfg(test)]
mod test;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareLink {
    protocol: Protocol,
    uri: String,
}

impl ShareLink {
    pub fn new(protocol: Protocol, scheme: &str, payload: &str) -> Self {
        Self {
            protocol,
            uri: format!("{}://{}", scheme, payload),
        }
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }
}

impl fmt::Display for ShareLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri)
    }
}

pub type EncoderFactoryFn = fn() -> Box<dyn LinkEncoder>;

/// New link formats register here; callers only go through `encode`.
pub fn get_encoder_factory_fn(protocol: Protocol) -> Option<EncoderFactoryFn> {
    match protocol {
        Protocol::Vmess => Some(vmess::vmess_encoder_factory),
        Protocol::Vless | Protocol::Trojan => None,
    }
}

pub fn encode(descriptor: &ProxyDescriptor) -> Result<ShareLink> {
    let protocol = descriptor.protocol();
    let factory =
        get_encoder_factory_fn(protocol).ok_or(ConvertError::UnsupportedLinkProtocol(protocol))?;
    factory().encode(descriptor)
}
