use crate::error::{ConvertError, Result};
use crate::link::{self, ShareLink};
use crate::proxy::clash::{fill_template, render_document};
use crate::proxy::{build, BuildOptions};
use crate::util::{make_dirs, user_file_stem, write_atomic};
use crate::xray::users::{find_by_secret, identities, ClientIdentity};
use crate::xray::{Inbound, XrayConfig};
use log::debug;
use serde_yaml::Value;
use std::path::{Path, PathBuf};


#[derive(Debug)]
pub struct Exported<T> {
    pub position: usize,
    pub identity: ClientIdentity,
    pub output: T,
}

#[derive(Debug)]
pub struct UserFailure {
    pub position: usize,
    pub label: Option<String>,
    pub error: ConvertError,
}

/// Per-user outcome of a batch run. A failed user shows up in `failures`, never silently dropped.
#[derive(Debug)]
pub struct BatchReport<T> {
    pub exported: Vec<Exported<T>>,
    pub failures: Vec<UserFailure>,
}

impl<T> BatchReport<T> {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedFile {
    pub file_name: String,
    pub contents: String,
}

fn for_each_user<T>(
    inbound: &Inbound,
    mut f: impl FnMut(usize, &ClientIdentity) -> Result<T>,
) -> Result<BatchReport<T>> {
    let mut report = BatchReport {
        exported: Vec::new(),
        failures: Vec::new(),
    };
    for (position, item) in identities(inbound)?.enumerate() {
        let identity = match item {
            Ok(identity) => identity,
            Err(error) => {
                report.failures.push(UserFailure {
                    position,
                    label: None,
                    error,
                });
                continue;
            }
        };
        match f(position, &identity) {
            Ok(output) => {
                debug!("exported user #{} {:?}", position, identity.label);
                report.exported.push(Exported {
                    position,
                    identity,
                    output,
                });
            }
            Err(error) => report.failures.push(UserFailure {
                position,
                label: identity.label.clone(),
                error,
            }),
        }
    }
    Ok(report)
}

fn file_name(position: usize, identity: &ClientIdentity, ext: &str) -> Result<String> {
    let label = identity.require_label(position)?;
    Ok(format!("{}.{}", user_file_stem(label, &identity.secret), ext))
}

fn clash_file(
    inbound: &Inbound,
    position: usize,
    identity: &ClientIdentity,
    template: &Value,
    opts: &BuildOptions,
) -> Result<RenderedFile> {
    let file_name = file_name(position, identity, "yaml")?;
    let descriptor = build(inbound, identity, opts)?;
    debug!(
        "{} proxy {} at {}:{}",
        descriptor.protocol(),
        descriptor.name(),
        descriptor.server(),
        descriptor.port()
    );
    let doc = render_document(template, &[descriptor])?;
    Ok(RenderedFile {
        file_name,
        contents: serde_yaml::to_string(&doc)?,
    })
}

pub fn clash_files(
    inbound: &Inbound,
    template: &Value,
    opts: &BuildOptions,
) -> Result<BatchReport<RenderedFile>> {
    for_each_user(inbound, |position, identity| {
        clash_file(inbound, position, identity, template, opts)
    })
}

/// Single-user export: the first client, across all inbounds, whose secret matches.
pub fn clash_file_for_secret(
    cfg: &XrayConfig,
    secret: &str,
    template: &Value,
    opts: &BuildOptions,
) -> Result<RenderedFile> {
    let (index, position, identity) =
        find_by_secret(cfg.inbounds(), secret).ok_or(ConvertError::UnknownUser)?;
    clash_file(cfg.inbound_at(index)?, position, &identity, template, opts)
}

pub fn share_links(inbound: &Inbound, opts: &BuildOptions) -> Result<BatchReport<ShareLink>> {
    for_each_user(inbound, |_, identity| link::encode(&build(inbound, identity, opts)?))
}

pub fn link_files(inbound: &Inbound, opts: &BuildOptions) -> Result<BatchReport<RenderedFile>> {
    for_each_user(inbound, |position, identity| {
        let file_name = file_name(position, identity, "txt")?;
        let link = link::encode(&build(inbound, identity, opts)?)?;
        Ok(RenderedFile {
            file_name,
            contents: format!("{}\n", link),
        })
    })
}

pub fn filled_template_files(
    inbound: &Inbound,
    template: &Value,
) -> Result<BatchReport<RenderedFile>> {
    let protocol = inbound.protocol()?;
    for_each_user(inbound, |position, identity| {
        let file_name = file_name(position, identity, "yaml")?;
        let doc = fill_template(template, protocol, &identity.secret)?;
        Ok(RenderedFile {
            file_name,
            contents: serde_yaml::to_string(&doc)?,
        })
    })
}

pub async fn write_file(dir: &Path, file: &RenderedFile) -> Result<PathBuf> {
    make_dirs(dir).await?;
    let path = dir.join(&file.file_name);
    write_atomic(&path, file.contents.as_bytes()).await?;
    debug!("wrote {}", path.display());
    Ok(path)
}

pub async fn write_files(dir: &Path, report: &BatchReport<RenderedFile>) -> Result<Vec<PathBuf>> {
    make_dirs(dir).await?;
    let mut written = Vec::with_capacity(report.exported.len());
    for exported in &report.exported {
        written.push(write_file(dir, &exported.output).await?);
    }
    Ok(written)
}
