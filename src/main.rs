// src/main.rs
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::thread;

use anyhow::{bail, Context, Result};
use lumos::types::PredictionRequest;
use lumos::{DeviceController, LumosConfig, PredictionKind};

// Console commands standing in for the web front end
#[derive(Clone, Debug, PartialEq)]
enum Command {
    Ports,
    Info,
    Connect(String),
    Disconnect,
    StartRecording,
    StopRecording,
    Predict(PredictionKind),
    Cancel,
    Quit,
}

impl Command {
    fn parse(line: &str) -> Result<Option<Self>> {
        let mut words = line.split_whitespace();
        let Some(head) = words.next() else {
            return Ok(None);
        };
        let arg = words.next();
        let cmd = match (head, arg) {
            ("ports", _) => Command::Ports,
            ("info", _) => Command::Info,
            ("connect", Some(port)) => Command::Connect(port.to_string()),
            ("disconnect", _) => Command::Disconnect,
            ("record", Some("start")) => Command::StartRecording,
            ("record", Some("stop")) => Command::StopRecording,
            ("predict", Some(kind)) => Command::Predict(kind.parse()?),
            ("cancel", _) => Command::Cancel,
            ("quit" | "exit", _) => Command::Quit,
            _ => bail!("unknown command: {line}"),
        };
        Ok(Some(cmd))
    }
}

fn load_config() -> Result<LumosConfig> {
    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("LUMOS_CONFIG").ok())
        .map(PathBuf::from);
    match path {
        Some(path) => LumosConfig::load(&path),
        None => Ok(LumosConfig::default()),
    }
}

fn reply(value: serde_json::Value) {
    println!("{value}");
}

fn handle(controller: &DeviceController, cmd: Command) -> Result<()> {
    match cmd {
        Command::Ports => reply(serde_json::json!({ "ports": controller.list_ports()? })),
        Command::Info => reply(serde_json::to_value(controller.device_info())?),
        Command::Connect(port) => match controller.connect(&port) {
            Ok(()) => reply(serde_json::json!({ "status": "connected" })),
            Err(e) => {
                log::error!("Connect error: {e}");
                reply(serde_json::json!({ "status": "failed", "error": e.to_string() }));
            }
        },
        Command::Disconnect => {
            controller.disconnect();
            reply(serde_json::json!({ "status": "disconnected" }));
        }
        Command::StartRecording => {
            let discarded = controller.start_recording();
            reply(serde_json::json!({ "msg": "Recording started", "discarded": discarded }));
        }
        Command::StopRecording => {
            let path = controller.stop_recording()?;
            reply(serde_json::json!({ "msg": "Saved", "path": path }));
        }
        Command::Predict(kind) => {
            let status = match controller.start_prediction(kind) {
                PredictionRequest::Accepted => "accepted",
                PredictionRequest::Rejected => "rejected",
            };
            reply(serde_json::json!({ "prediction": kind, "status": status }));
        }
        Command::Cancel => controller.cancel_prediction(),
        Command::Quit => {}
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let config = load_config().context("loading configuration")?;
    let controller = DeviceController::new(config);

    // Observer: every event becomes one JSON line on stdout.
    let events = controller.subscribe();
    thread::Builder::new()
        .name("events".to_owned())
        .spawn(move || {
            let stdout = io::stdout();
            for event in events {
                match serde_json::to_string(&event) {
                    Ok(json) => {
                        let mut out = stdout.lock();
                        writeln!(out, "{json}").ok();
                    }
                    Err(e) => log::warn!("Failed to encode event: {e}"),
                }
            }
        })
        .context("spawning event printer")?;

    log::info!("Lumos console ready");
    for line in io::stdin().lock().lines() {
        let line = line.context("reading stdin")?;
        let cmd = match Command::parse(&line) {
            Ok(Some(cmd)) => cmd,
            Ok(None) => continue,
            Err(e) => {
                reply(serde_json::json!({ "error": e.to_string() }));
                continue;
            }
        };
        if cmd == Command::Quit {
            break;
        }
        if let Err(e) = handle(&controller, cmd) {
            reply(serde_json::json!({ "error": format!("{e:#}") }));
        }
    }
    Ok(())
}
