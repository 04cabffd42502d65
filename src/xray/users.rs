use crate::error::{ConvertError, Result};
use crate::xray::{Client, Inbound, Protocol};
use serde::Serialize;
use std::slice::Iter;

/// One user of an inbound: the UUID (vmess/vless) or password (trojan) plus its email label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientIdentity {
    pub secret: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl ClientIdentity {
    pub fn new(secret: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            label: Some(label.into()),
        }
    }

    /// Label for flows that name output after the user; `position` only feeds the error.
    pub fn require_label(&self, position: usize) -> Result<&str> {
        self.label
            .as_deref()
            .ok_or(ConvertError::MissingLabel { position })
    }
}

pub struct Identities<'a> {
    protocol: Protocol,
    clients: Iter<'a, Client>,
}

impl Iterator for Identities<'_> {
    type Item = Result<ClientIdentity>;

    fn next(&mut self) -> Option<Self::Item> {
        let client = self.clients.next()?;
        let secret = match self.protocol {
            Protocol::Vmess | Protocol::Vless => client.id.as_ref(),
            Protocol::Trojan => client.password.as_ref(),
        };
        Some(match secret {
            Some(secret) => Ok(ClientIdentity {
                secret: secret.clone(),
                label: client.email.clone(),
            }),
            None => Err(ConvertError::MissingField(self.protocol.secret_field())),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.clients.size_hint()
    }
}

/// Walks the inbound's clients lazily. Calling it again starts over from the first client.
pub fn identities(inbound: &Inbound) -> Result<Identities<'_>> {
    Ok(Identities {
        protocol: inbound.protocol()?,
        clients: inbound.clients().iter(),
    })
}

pub fn labels(inbound: &Inbound) -> impl Iterator<Item = &str> {
    inbound.clients().iter().filter_map(|c| c.email.as_deref())
}

pub fn has_label(inbound: &Inbound, label: &str) -> bool {
    labels(inbound).any(|l| l == label)
}

/// Looks a user up by secret across every supported inbound.
/// Returns the inbound index, the client's position in it and the identity.
pub fn find_by_secret(inbounds: &[Inbound], secret: &str) -> Option<(usize, usize, ClientIdentity)> {
    for (index, inbound) in inbounds.iter().enumerate() {
        let Ok(users) = identities(inbound) else {
            continue;
        };
        for (position, identity) in users.enumerate() {
            match identity {
                Ok(identity) if identity.secret == secret => {
                    return Some((index, position, identity))
                }
                _ => {}
            }
        }
    }
    None
}
