use crate::def::config::{Config, DEFAULT_CONFIG_PATH};
use crate::error::Result;
use crate::export::{BatchReport, RenderedFile};
use crate::proxy::{BuildOptions, ServerAddress};
use crate::xray::XrayConfig;
use clap::{Parser, Subcommand};
use log::{debug, error, info, warn};
use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

mod def;
mod error;
mod export;
mod link;
mod provision;
mod proxy;
mod util;
mod xray;

#[derive(Parser, Debug)]
#[command(version, about = "Convert Xray inbounds to Clash configs and share links")]
struct Cli {
    /// Converter settings (TOML)
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// Xray server config.json
    #[arg(long)]
    xray_config: Option<PathBuf>,
    #[arg(long)]
    domain: Option<String>,
    #[arg(long)]
    ip: Option<String>,
    /// Name given to generated proxies
    #[arg(long)]
    proxy_name: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List inbounds
    List {
        #[arg(long)]
        verbose: bool,
    },
    /// Write one Clash config per user
    Clash {
        #[arg(long, default_value_t = 0)]
        index: usize,
        /// Only export the user with this uuid/password, searching all inbounds
        #[arg(long)]
        user: Option<String>,
        #[arg(long)]
        template: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Write one vmess:// link per user
    Links {
        #[arg(long, default_value_t = 0)]
        index: usize,
        #[arg(long)]
        output: Option<PathBuf>,
        /// Print the links instead of writing files
        #[arg(long)]
        stdout: bool,
    },
    /// Fill each user's secret into a ready-made Clash template
    FillTemplate {
        #[arg(long, default_value_t = 0)]
        index: usize,
        #[arg(long)]
        template: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Provision a new user and save the Xray config
    AddUser {
        #[arg(long)]
        index: usize,
        #[arg(long)]
        name: String,
        #[arg(long)]
        strong: bool,
        #[arg(long)]
        length: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info")
    }
    env_logger::init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn load_config(path: &Path) -> Result<Config> {
    match util::read_optional(path).await? {
        Some(contents) => Config::from_toml(&contents),
        None => {
            info!("{} not found, using defaults", path.display());
            Ok(Config::default())
        }
    }
}

async fn load_xray(path: &Path) -> Result<XrayConfig> {
    XrayConfig::from_json(&util::read_file(path).await?)
}

async fn load_template(path: &Path) -> Result<serde_yaml::Value> {
    Ok(serde_yaml::from_str(&util::read_file(path).await?)?)
}

// the clash base template is optional; fall back to a single select group
async fn load_base_template(path: &Path) -> Result<serde_yaml::Value> {
    match util::read_optional(path).await? {
        Some(contents) => Ok(serde_yaml::from_str(&contents)?),
        None => {
            warn!("{} not found, using a minimal template", path.display());
            Ok(proxy::clash::empty_template())
        }
    }
}

async fn build_options(cfg: &Config, cli: &Cli) -> Result<BuildOptions> {
    let ip = cli.ip.clone().or_else(|| cfg.server.ip.clone());
    let mut domain = cli.domain.clone().or_else(|| cfg.server.domain.clone());
    if domain.is_none() {
        domain = util::read_domain_file(&cfg.domain_file).await?;
    }
    let ip = match ip {
        None if domain.is_none() && cfg.server.detect_ip => {
            let detected = util::detect_server_ip().await?;
            info!("using detected server ip {}", detected);
            Some(detected.to_string())
        }
        ip => ip,
    };
    let address = ServerAddress::new(ip, domain, cfg.server.prefer_domain_for_sni)?;
    info!(
        "server address: ip {:?} domain {:?}",
        address.ip(),
        address.domain()
    );
    Ok(BuildOptions {
        name: cli
            .proxy_name
            .clone()
            .unwrap_or_else(|| cfg.server.name.clone()),
        address,
        skip_cert_verify: cfg.server.skip_cert_verify,
    })
}

fn report_failures<T>(report: &BatchReport<T>) -> bool {
    for failure in &report.failures {
        warn!(
            "user #{} ({}) not exported: {}",
            failure.position,
            failure.label.as_deref().unwrap_or("-"),
            failure.error
        );
    }
    report.is_clean()
}

async fn write_report(dir: &Path, report: &BatchReport<RenderedFile>) -> Result<bool> {
    let written = export::write_files(dir, report).await?;
    for (exported, path) in report.exported.iter().zip(&written) {
        info!(
            "user #{} ({}) -> {}",
            exported.position,
            exported.identity.label.as_deref().unwrap_or("-"),
            path.display()
        );
    }
    info!(
        "{} file(s) written to {}, {} failed",
        written.len(),
        dir.display(),
        report.failures.len()
    );
    Ok(report_failures(report))
}

fn inbound_dir(base: &Path, cfg: &XrayConfig, index: usize) -> Result<PathBuf> {
    let inbound = cfg.inbound_at(index)?;
    Ok(base.join(format!("{}{}", inbound.protocol, index)))
}

async fn run(cli: Cli) -> Result<bool> {
    let cfg = load_config(&cli.config).await?;
    let xray_path = cli
        .xray_config
        .clone()
        .unwrap_or_else(|| cfg.xray_config.clone());

    match &cli.command {
        Command::List { verbose } => {
            let xray = load_xray(&xray_path).await?;
            let summaries = xray::inspect::summarize_all(&xray, *verbose)?;
            println!("{}", serde_json::to_string_pretty(&summaries)?);
            Ok(true)
        }
        Command::Clash {
            index,
            user,
            template,
            output,
        } => {
            let xray = load_xray(&xray_path).await?;
            let opts = build_options(&cfg, &cli).await?;
            let template =
                load_base_template(template.as_deref().unwrap_or(cfg.clash_template.as_path()))
                    .await?;
            let base = output.clone().unwrap_or_else(|| cfg.clash_output.clone());
            match user {
                Some(secret) => {
                    let file = export::clash_file_for_secret(&xray, secret, &template, &opts)?;
                    let path = export::write_file(&base, &file).await?;
                    info!("wrote {}", path.display());
                    Ok(true)
                }
                None => {
                    let report =
                        export::clash_files(xray.inbound_at(*index)?, &template, &opts)?;
                    write_report(&inbound_dir(&base, &xray, *index)?, &report).await
                }
            }
        }
        Command::Links {
            index,
            output,
            stdout,
        } => {
            let xray = load_xray(&xray_path).await?;
            let opts = build_options(&cfg, &cli).await?;
            let inbound = xray.inbound_at(*index)?;
            if *stdout {
                let report = export::share_links(inbound, &opts)?;
                for exported in &report.exported {
                    debug!(
                        "user #{} ({})",
                        exported.position,
                        exported.identity.label.as_deref().unwrap_or("-")
                    );
                    println!("{}", exported.output);
                }
                Ok(report_failures(&report))
            } else {
                let report = export::link_files(inbound, &opts)?;
                let base = output.clone().unwrap_or_else(|| cfg.link_output.clone());
                write_report(&inbound_dir(&base, &xray, *index)?, &report).await
            }
        }
        Command::FillTemplate {
            index,
            template,
            output,
        } => {
            let xray = load_xray(&xray_path).await?;
            let template =
                load_template(template.as_deref().unwrap_or(cfg.clash_template.as_path())).await?;
            let report = export::filled_template_files(xray.inbound_at(*index)?, &template)?;
            let base = output.clone().unwrap_or_else(|| cfg.clash_output.clone());
            write_report(&inbound_dir(&base, &xray, *index)?, &report).await
        }
        Command::AddUser {
            index,
            name,
            strong,
            length,
        } => {
            let mut xray = load_xray(&xray_path).await?;
            let mut policy = cfg.password.policy();
            if *strong {
                policy.strength = provision::Strength::Strong;
            }
            if let Some(length) = length {
                policy.length = *length;
            }
            let identity = provision::add_user(&mut xray, *index, name, &policy)?;
            util::write_atomic(&xray_path, xray.to_json_pretty()?.as_bytes()).await?;
            info!("added {} to inbound {} in {}", name, index, xray_path.display());
            println!("{}", serde_json::to_string_pretty(&identity)?);
            Ok(true)
        }
    }
}
