//! Headless browser shim: feeds navigation and settings events from stdin
//! into the bridge and prints tab redirects and sync results on stdout.

use std::{env, fs::File, path::PathBuf};

use anyhow::{Context, Result, bail};
use sentinel_bridge::{
    BridgeConfig, BridgeHandle, BridgeResult, BridgeService, HostManifest, NavigationEvent,
    ProcessConnector, TabController, TabId,
};
use sentinel_settings::{FocusConfig, SettingsResult, SettingsStore, SyncOutcome};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::{
    io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader},
    sync::mpsc,
    task::JoinSet,
};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{
    filter::{EnvFilter, LevelFilter},
    fmt,
};
use url::Url;

#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum ShimEvent {
    Navigate(NavigationEvent),
    SetActive { active: bool },
    AddDomain { domain: String },
    RemoveDomain { domain: String },
}

const USAGE: &str = "usage: sentinel-bridge [--settings <path>] [--host <program> [args...] [--]]";

#[derive(Debug, Default, PartialEq, Eq)]
struct Args {
    host: Option<(PathBuf, Vec<String>)>,
    settings: Option<PathBuf>,
}

/// Host arguments run up to a `--` or the end of the command line.
fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Args> {
    let mut parsed = Args::default();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--settings" => {
                let path = args.next().context("--settings needs a path")?;
                parsed.settings = Some(path.into());
            }
            "--host" => {
                let program = args.next().context("--host needs a program")?;
                let host_args = args.by_ref().take_while(|a| a != "--").collect();
                parsed.host = Some((program.into(), host_args));
            }
            other => bail!("unknown argument {other:?}\n{USAGE}"),
        }
    }
    Ok(parsed)
}

/// Prints redirects instead of driving a real tab.
struct StdoutTabs(mpsc::UnboundedSender<Value>);

impl TabController for StdoutTabs {
    fn redirect(&self, tab: TabId, url: &Url) -> Result<()> {
        self.0
            .send(redirect_line(tab, url))
            .context("output closed")
    }
}

fn apply(config: &mut FocusConfig, event: &ShimEvent) -> SettingsResult<bool> {
    match event {
        ShimEvent::Navigate(_) => Ok(false),
        ShimEvent::SetActive { active } => {
            config.set_active(*active);
            Ok(true)
        }
        ShimEvent::AddDomain { domain } => config.add_domain(domain).map(|_| true),
        ShimEvent::RemoveDomain { domain } => config.remove_domain(domain),
    }
}

fn redirect_line(tab: TabId, url: &Url) -> Value {
    json!({ "redirect": { "tabId": tab, "url": url.as_str() } })
}

fn sync_line(result: BridgeResult<Value>) -> Value {
    match result {
        Ok(ack) => match SyncOutcome::from_ack(ack) {
            SyncOutcome::Synced(ack) => {
                info!("Config synced: {}", ack);
                json!({ "sync": "ok", "ack": ack })
            }
            outcome @ SyncOutcome::HostError(_) => {
                json!({ "sync": "error", "message": outcome.user_message() })
            }
        },
        Err(e) => json!({ "sync": "error", "message": format!("Failed to sync: {e}") }),
    }
}

/// Saves, then pushes the config to the host. The answer is printed by a
/// task in `syncs`.
fn sync_config(
    store: &SettingsStore,
    config: &FocusConfig,
    bridge: &BridgeHandle,
    output: &mpsc::UnboundedSender<Value>,
    syncs: &mut JoinSet<()>,
) {
    if let Err(e) = store.save(config) {
        error!("Failed to save settings: {:#}", anyhow::Error::from(e));
    }

    let reply = bridge.update_config(config.clone());
    let output = output.clone();
    syncs.spawn(async move {
        let _ = output.send(sync_line(reply.await));
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into()) // anything not listed → WARN
        .parse_lossy("sentinel_=trace,tokio=off");

    // stdout carries shim output, so logs go to a file
    fmt()
        .with_env_filter(filter)
        .with_writer(File::create(env::temp_dir().join("sentinel-bridge.log"))?)
        .init();

    let args = parse_args(env::args().skip(1))?;
    let config = BridgeConfig::builder().build()?;

    let connector = match args.host {
        Some((program, host_args)) => ProcessConnector::new(program, host_args, config.max_frame_size),
        None => {
            let manifest = HostManifest::locate(&config.host_name)?;
            ProcessConnector::from_manifest(&manifest, config.max_frame_size)
        }
    };

    let store = match args.settings {
        Some(path) => SettingsStore::new(path),
        None => SettingsStore::at_default_path()?,
    };
    let loaded = store.load_or_seed()?;
    let mut focus = loaded.config;

    let (output_tx, mut output_rx) = mpsc::unbounded_channel::<Value>();
    let writer = tokio::spawn(async move {
        let mut stdout = io::stdout();
        while let Some(line) = output_rx.recv().await {
            let mut bytes = line.to_string().into_bytes();
            bytes.push(b'\n');
            if let Err(e) = stdout.write_all(&bytes).await {
                warn!("Failed to write output: {e}");
                break;
            }
            let _ = stdout.flush().await;
        }
    });

    let (bridge, service) = BridgeService::spawn(connector, StdoutTabs(output_tx.clone()), config);
    let mut syncs = JoinSet::new();

    if loaded.seeded {
        // The host has never seen the seeded defaults.
        sync_config(&store, &focus, &bridge, &output_tx, &mut syncs);
    }

    let mut lines = BufReader::new(io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let event: ShimEvent = match serde_json::from_str(&line) {
            Ok(event) => event,
            Err(e) => {
                let _ = output_tx.send(json!({ "error": format!("invalid event: {e}") }));
                continue;
            }
        };
        debug!("Shim event: {:?}", event);

        if let ShimEvent::Navigate(navigation) = event {
            bridge.navigate(navigation)?;
            continue;
        }

        match apply(&mut focus, &event) {
            Ok(true) => sync_config(&store, &focus, &bridge, &output_tx, &mut syncs),
            Ok(false) => {}
            Err(e) => {
                let _ = output_tx.send(json!({ "error": e.to_string() }));
            }
        }
    }

    info!("stdin closed; waiting for the host to answer");
    if let Err(e) = bridge.drain().await {
        warn!("Bridge stopped before draining: {e}");
    }
    bridge.shutdown();
    service.await?;
    // Syncs orphaned by a disconnect fail with ServiceStopped once the bridge is gone.
    while syncs.join_next().await.is_some() {}
    drop(output_tx);
    let _ = writer.await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_bridge::BridgeError;
    use sentinel_settings::SettingsError;

    fn args(raw: &[&str]) -> Result<Args> {
        parse_args(raw.iter().map(|a| a.to_string()))
    }

    fn event(line: &str) -> ShimEvent {
        serde_json::from_str(line).unwrap()
    }

    #[test]
    fn no_arguments_uses_manifest_and_default_settings() {
        assert_eq!(args(&[]).unwrap(), Args::default());
    }

    #[test]
    fn settings_path_is_parsed() {
        let parsed = args(&["--settings", "/tmp/extension.json"]).unwrap();
        assert_eq!(parsed.settings, Some(PathBuf::from("/tmp/extension.json")));
        assert_eq!(parsed.host, None);
    }

    #[test]
    fn host_takes_the_remaining_arguments() {
        let parsed = args(&["--host", "python3", "host.py", "-v"]).unwrap();
        assert_eq!(
            parsed.host,
            Some((PathBuf::from("python3"), vec!["host.py".into(), "-v".into()]))
        );
    }

    #[test]
    fn double_dash_ends_host_arguments() {
        let parsed = args(&["--host", "sh", "host.sh", "--", "--settings", "s.json"]).unwrap();
        assert_eq!(parsed.host, Some((PathBuf::from("sh"), vec!["host.sh".into()])));
        assert_eq!(parsed.settings, Some(PathBuf::from("s.json")));
    }

    #[test]
    fn bad_arguments_are_rejected() {
        let err = args(&["--verbose"]).unwrap_err();
        assert!(err.to_string().contains("--verbose"));
        assert!(err.to_string().contains("usage:"));
        assert!(args(&["--settings"]).is_err());
        assert!(args(&["--host"]).is_err());
    }

    #[test]
    fn events_parse_from_json_lines() {
        assert!(matches!(
            event(r#"{"event":"navigate","tabId":5,"url":"http://evil.example"}"#),
            ShimEvent::Navigate(ref nav) if nav.tab_id == Some(5) && nav.is_top_level_frame
        ));
        assert!(matches!(
            event(r#"{"event":"set_active","active":true}"#),
            ShimEvent::SetActive { active: true }
        ));
        assert!(serde_json::from_str::<ShimEvent>(r#"{"event":"reload"}"#).is_err());
    }

    #[test]
    fn settings_edits_apply_and_request_a_sync() {
        let mut config = FocusConfig {
            is_active: false,
            whitelist: vec!["a.com".into()],
        };

        assert!(apply(&mut config, &event(r#"{"event":"add_domain","domain":" b.com "}"#)).unwrap());
        assert_eq!(config.whitelist, vec!["a.com", "b.com"]);

        assert!(apply(&mut config, &event(r#"{"event":"remove_domain","domain":"a.com"}"#)).unwrap());
        assert!(!apply(&mut config, &event(r#"{"event":"remove_domain","domain":"a.com"}"#)).unwrap());
        assert_eq!(config.whitelist, vec!["b.com"]);

        assert!(apply(&mut config, &event(r#"{"event":"set_active","active":true}"#)).unwrap());
        assert!(config.is_active);
    }

    #[test]
    fn navigation_is_not_a_settings_edit() {
        let mut config = FocusConfig::default();
        let nav = event(r#"{"event":"navigate","tabId":1,"url":"https://a.com"}"#);
        assert!(!apply(&mut config, &nav).unwrap());
        assert_eq!(config, FocusConfig::default());
    }

    #[test]
    fn locked_and_duplicate_edits_fail() {
        let mut config = FocusConfig::default();
        let dup = apply(&mut config, &event(r#"{"event":"add_domain","domain":"github.com"}"#));
        assert_eq!(dup.unwrap_err().to_string(), "Domain already exists");

        config.set_active(true);
        let locked = apply(&mut config, &event(r#"{"event":"add_domain","domain":"x.com"}"#));
        assert!(matches!(locked, Err(SettingsError::Locked)));
        assert_eq!(config.whitelist, FocusConfig::default().whitelist);
    }

    #[test]
    fn redirect_line_shape() {
        let url = Url::parse("chrome-extension://focussentinel/blocked.html").unwrap();
        assert_eq!(
            redirect_line(TabId::new(5).unwrap(), &url),
            json!({"redirect": {"tabId": 5, "url": "chrome-extension://focussentinel/blocked.html"}})
        );
    }

    #[test]
    fn sync_lines_report_acks_and_failures() {
        assert_eq!(
            sync_line(Ok(json!({"status": "ok"}))),
            json!({"sync": "ok", "ack": {"status": "ok"}})
        );
        assert_eq!(
            sync_line(Ok(json!({"error": "Host disconnected"}))),
            json!({"sync": "error", "message": "Host Error: Host disconnected"})
        );
        assert_eq!(
            sync_line(Err(BridgeError::ServiceStopped)),
            json!({"sync": "error", "message": "Failed to sync: bridge service has stopped"})
        );
    }
}
