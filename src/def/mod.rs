use crate::error::Result;
use crate::link::ShareLink;
use crate::proxy::ProxyDescriptor;

pub mod config;

// 分享链接编码器，每种协议一个实现
pub trait LinkEncoder: Send + Sync {
    fn scheme(&self) -> &'static str;

    fn encode(&self, descriptor: &ProxyDescriptor) -> Result<ShareLink>;
}
