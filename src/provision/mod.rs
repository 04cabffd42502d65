use crate::error::{ConvertError, Result};
use crate::xray::users::{has_label, ClientIdentity};
use crate::xray::{Protocol, XrayConfig};
use rand::Rng;
use regex::Regex;
use std::sync::OnceLock;
use uuid::Uuid;

#[cfg(test)]
mod test;

pub const DEFAULT_PASSWORD_LENGTH: usize = 18;
pub const MIN_PASSWORD_LENGTH: usize = 8;

const ALPHANUMERIC: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
const SYMBOLS: &[u8] = b"/~@$&!*#?";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strength {
    #[default]
    Default,
    Strong,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordPolicy {
    pub length: usize,
    pub strength: Strength,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            length: DEFAULT_PASSWORD_LENGTH,
            strength: Strength::Default,
        }
    }
}

impl PasswordPolicy {
    pub fn validate(&self) -> Result<()> {
        if self.length < MIN_PASSWORD_LENGTH {
            return Err(ConvertError::InvalidPasswordLength {
                length: self.length,
                min: MIN_PASSWORD_LENGTH,
            });
        }
        Ok(())
    }
}

pub fn generate_uuid() -> String {
    Uuid::new_v4().to_string()
}

pub fn generate_password(policy: &PasswordPolicy) -> String {
    let mut alphabet = ALPHANUMERIC.to_vec();
    if policy.strength == Strength::Strong {
        alphabet.extend_from_slice(SYMBOLS);
    }
    let mut rng = rand::thread_rng();
    (0..policy.length)
        .map(|_| alphabet[rng.gen_range(0..alphabet.len())] as char)
        .collect()
}

/// Fresh credentials for `label`. Does not look at existing clients.
pub fn provision(protocol: Protocol, label: &str, policy: &PasswordPolicy) -> ClientIdentity {
    let secret = match protocol {
        Protocol::Vmess | Protocol::Vless => generate_uuid(),
        Protocol::Trojan => generate_password(policy),
    };
    ClientIdentity::new(secret, label)
}

fn label_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._@+-]*$").expect("label pattern is valid")
    })
}

// labels end up in output file names
pub fn validate_label(label: &str) -> Result<()> {
    if label_pattern().is_match(label) {
        Ok(())
    } else {
        Err(ConvertError::InvalidLabel(label.to_string()))
    }
}

/// Provisions a new user into inbound `index` and appends it to the in-memory config.
/// Persisting the config is left to the caller.
pub fn add_user(
    cfg: &mut XrayConfig,
    index: usize,
    label: &str,
    policy: &PasswordPolicy,
) -> Result<ClientIdentity> {
    validate_label(label)?;
    let inbound = cfg.inbound_at(index)?;
    let protocol = inbound.protocol()?;
    if has_label(inbound, label) {
        return Err(ConvertError::AlreadyExists(label.to_string()));
    }
    if protocol == Protocol::Trojan {
        policy.validate()?;
    }
    let identity = provision(protocol, label, policy);
    cfg.append_client(index, &identity)?;
    Ok(identity)
}
