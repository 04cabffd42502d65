use crate::error::{ConvertError, Result};
use regex::Regex;
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tokio::fs;
use tokio::net::UdpSocket;

const IP_PROBE_TARGET: &str = "8.8.8.8:80";

/// `create_dir_all`; an existing directory is fine.
pub async fn make_dirs(path: &Path) -> Result<()> {
    match fs::create_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::PermissionDenied => Err(ConvertError::file(
            path,
            std::io::Error::new(e.kind(), format!("{} (run as root?)", e)),
        )),
        Err(e) => Err(ConvertError::file(path, e)),
    }
}

pub async fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .await
        .map_err(|e| ConvertError::file(path, e))
}

/// Like `read_file`, but a missing file is `None`.
pub async fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path).await {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(ConvertError::file(path, e)),
    }
}

/// First non-empty line of the domain file.
pub async fn read_domain_file(path: &Path) -> Result<Option<String>> {
    let contents = read_optional(path).await?;
    Ok(contents.and_then(|c| {
        c.lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .map(|l| l.to_string())
    }))
}

/// Local address of the default route. Connecting a UDP socket sends nothing.
pub async fn detect_server_ip() -> Result<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    socket.connect(IP_PROBE_TARGET).await?;
    Ok(socket.local_addr()?.ip())
}

fn unsafe_file_chars() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[^\p{L}\p{N}._@+-]").expect("file char pattern is valid"))
}

/// Email labels come from hand-edited configs; anything outside letters, digits and `._@+-`
/// becomes `_`, and a leading `.` or `-` gets a `_` prefix.
pub fn file_label(label: &str) -> String {
    let mut name = unsafe_file_chars().replace_all(label, "_").into_owned();
    if name.is_empty() || name.starts_with('.') || name.starts_with('-') {
        name.insert(0, '_');
    }
    name
}

/// `<label>_<first 5 hex of sha256(secret)>`, stable per user.
pub fn user_file_stem(label: &str, secret: &str) -> String {
    let digest = format!("{:x}", Sha256::digest(secret.as_bytes()));
    format!("{}_{}", file_label(label), &digest[..5])
}

/// Writes through a sibling temp file and renames it over `path`.
pub async fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let tmp = tmp_path(path);
    fs::write(&tmp, contents)
        .await
        .map_err(|e| ConvertError::file(&tmp, e))?;
    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(ConvertError::file(path, e));
    }
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
