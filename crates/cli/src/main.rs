//! open-busylight CLI: command-line busylight control.

use anyhow::Result;
use clap::{Parser, Subcommand};
use open_busylight_core::color::ColorTable;
use open_busylight_core::controller::Controller;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser)]
#[command(
    name = "open-busylight",
    version,
    about = "Open-source Kuando Busylight control"
)]
struct Cli {
    /// JSON file extending the built-in color and emotion tables.
    #[arg(long, global = true, value_name = "FILE")]
    color_table: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List attached busylights without opening them.
    ListDevices,
    /// Show connection and cycling state for each device.
    Status,
    /// Apply a color and hold it until Ctrl-C.
    Set {
        /// Color name or `r,g,b` literal (e.g. red or 255,100,0).
        color: String,
        /// Device path; all devices when omitted.
        #[arg(long)]
        device: Option<String>,
    },
    /// Turn lights off and exit.
    Off {
        /// Device path; all devices when omitted.
        #[arg(long)]
        device: Option<String>,
    },
    /// Apply the color configured for an emotion label, until Ctrl-C.
    Emotion {
        /// Label such as joy, anger, or neutral.
        label: String,
        /// Device path; all devices when omitted.
        #[arg(long)]
        device: Option<String>,
    },
    /// Run the color cycle until Ctrl-C or for a fixed duration.
    Cycle {
        /// Device path; all devices when omitted.
        #[arg(long)]
        device: Option<String>,
        /// Stop after this many seconds instead of waiting for Ctrl-C.
        #[arg(long)]
        duration: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let table = cli.color_table.as_deref();

    match cli.command {
        Commands::ListDevices => list_devices(),
        Commands::Status => show_status(table).await,
        Commands::Set { color, device } => set_color(table, &color, device.as_deref()).await,
        Commands::Off { device } => turn_off(table, device.as_deref()).await,
        Commands::Emotion { label, device } => {
            apply_emotion(table, &label, device.as_deref()).await
        }
        Commands::Cycle { device, duration } => {
            run_cycle(table, device.as_deref(), duration).await
        }
    }
}

fn list_devices() -> Result<()> {
    let devices = open_busylight_core::device::discover_devices(
        open_busylight_core::device::RECOGNIZED_PIDS,
    )?;
    if devices.is_empty() {
        println!("No busylights found.");
        println!("Ensure a Busylight Alpha or Omega is plugged in and accessible.");
    } else {
        for dev in &devices {
            println!(
                "{} (VID: 0x{:04X}, PID: 0x{:04X}, path: {})",
                dev.model, dev.vid, dev.pid, dev.path
            );
            if let Some(serial) = &dev.serial {
                println!("  serial: {serial}");
            }
        }
    }
    Ok(())
}

fn load_colors(table: Option<&Path>) -> Result<ColorTable> {
    Ok(match table {
        Some(path) => ColorTable::from_json_file(path)?,
        None => ColorTable::default(),
    })
}

/// Connect every recognized busylight and start the background loops.
fn start_session(colors: ColorTable) -> Result<Controller> {
    let mut controller = Controller::new(colors);
    let connected = controller.connect_all();
    if connected == 0 {
        anyhow::bail!(
            "No busylights found. Ensure a Busylight Alpha or Omega is plugged in and accessible."
        );
    }
    println!("Connected {connected} busylight(s).");
    controller.start();
    Ok(controller)
}

fn apply(
    controller: &Controller,
    device: Option<&str>,
    color: &str,
) -> open_busylight_core::error::Result<()> {
    match device {
        Some(path) => controller.apply_color(path, color),
        None => controller.apply_color_all(color),
    }
}

async fn hold_until_ctrl_c() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    tracing::info!("Received interrupt, shutting down");
    println!();
    Ok(())
}

async fn show_status(table: Option<&Path>) -> Result<()> {
    let mut controller = start_session(load_colors(table)?)?;
    for status in controller.statuses() {
        println!("{} (path: {})", status.model, status.path);
        if let Some(serial) = &status.serial {
            println!("  serial: {serial}");
        }
        println!(
            "  state: {}, cycling: {}",
            status.state,
            if status.cycling { "on" } else { "off" }
        );
        if let Some(color) = status.last_color {
            println!("  last color: {color}");
        }
    }
    controller.shutdown().await;
    Ok(())
}

async fn set_color(table: Option<&Path>, color: &str, device: Option<&str>) -> Result<()> {
    let colors = load_colors(table)?;
    // Reject bad input before opening any device.
    colors.resolve(color)?;

    let mut controller = start_session(colors)?;
    let result = apply(&controller, device, color);
    if result.is_ok() {
        println!("Applied '{color}'. Press Ctrl-C to turn the lights off and exit.");
        hold_until_ctrl_c().await?;
    }
    controller.shutdown().await;
    result.map_err(Into::into)
}

async fn turn_off(table: Option<&Path>, device: Option<&str>) -> Result<()> {
    let mut controller = start_session(load_colors(table)?)?;
    let result = apply(&controller, device, "off");
    controller.settle().await;
    controller.shutdown().await;
    result?;
    println!("Lights off.");
    Ok(())
}

async fn apply_emotion(table: Option<&Path>, label: &str, device: Option<&str>) -> Result<()> {
    let colors = load_colors(table)?;
    let color = colors.emotion_target(label).map(str::to_string).ok_or_else(|| {
        anyhow::anyhow!(
            "Unknown emotion '{}'. Valid labels: {}",
            label,
            colors.emotion_labels().join(", ")
        )
    })?;

    let mut controller = start_session(colors)?;
    let result = apply(&controller, device, &color);
    if result.is_ok() {
        println!("Emotion '{label}' -> '{color}'. Press Ctrl-C to turn the lights off and exit.");
        hold_until_ctrl_c().await?;
    }
    controller.shutdown().await;
    result.map_err(Into::into)
}

async fn run_cycle(table: Option<&Path>, device: Option<&str>, duration: Option<u64>) -> Result<()> {
    let mut controller = start_session(load_colors(table)?)?;

    let result = match device {
        Some(path) => controller.set_cycling(path, true),
        None => {
            controller.set_cycling_all(true);
            Ok(())
        }
    };
    if result.is_ok() {
        match duration {
            Some(secs) => {
                println!("Cycling for {secs} second(s).");
                tokio::time::sleep(Duration::from_secs(secs)).await;
            }
            None => {
                println!("Cycling. Press Ctrl-C to stop and exit.");
                hold_until_ctrl_c().await?;
            }
        }
        match device {
            Some(path) => controller.set_cycling(path, false)?,
            None => controller.set_cycling_all(false),
        }
        // Let the reset color reach the wire before teardown.
        controller.settle().await;
    }
    controller.shutdown().await;
    result.map_err(Into::into)
}
