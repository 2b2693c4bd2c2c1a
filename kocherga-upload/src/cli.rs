// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Command-line interface definitions.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use kocherga_core::reactor::Command;
use kocherga_core::transfer::NodeId;

use crate::commands;
use crate::transport::SerialTransport;
use crate::Link;

/// The bootloader's own local node id, per `kocherga-bootloader`'s `main.rs`.
const DEFAULT_DEVICE_NODE_ID: u16 = 125;
/// This tool's node id when it acts as the firmware's `File.Read` server.
const DEFAULT_LOCAL_NODE_ID: u16 = 126;
const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Command-line arguments.
#[derive(Parser)]
#[command(name = "kocherga-upload")]
#[command(about = "Firmware upload tool for kocherga-bootloader")]
pub struct Cli {
    /// Serial port (e.g., /dev/ttyACM0)
    #[arg(short, long)]
    pub port: String,

    /// Serial baud rate
    #[arg(long, default_value_t = DEFAULT_BAUD_RATE)]
    pub baud: u32,

    /// Node id the bootloader is listening on
    #[arg(long, default_value_t = DEFAULT_DEVICE_NODE_ID)]
    pub device: u16,

    /// Node id this tool presents itself as
    #[arg(long, default_value_t = DEFAULT_LOCAL_NODE_ID)]
    pub local: u16,

    /// Print machine-readable JSON instead of a human-readable report
    #[arg(long)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Commands {
    /// Query GetInfo
    Status,

    /// Trigger BeginSoftwareUpdate and serve the file over File.Read
    Upload {
        /// Firmware binary file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Path reported to the device as the file to fetch
        #[arg(long, default_value = "fw/image.bin")]
        remote_path: String,
    },

    /// Send EmergencyStop
    Stop,

    /// Send FactoryReset
    FactoryReset,

    /// Send Restart
    Restart,
}

/// Execute the parsed CLI command.
pub fn run(cli: Cli) -> Result<()> {
    let mut transport = SerialTransport::open(&cli.port, cli.baud)?;
    let local = NodeId(cli.local);
    let device = NodeId(cli.device);
    let mut node: Link<'_> = kocherga_core::serial::SerialNode::new(&mut transport, local);

    match cli.command {
        Commands::Status => commands::status(&mut node, device, cli.json),
        Commands::Upload { file, remote_path } => commands::upload(&mut node, device, local, &file, &remote_path),
        Commands::Stop => commands::send_command(&mut node, device, Command::EmergencyStop, "EmergencyStop"),
        Commands::FactoryReset => commands::send_command(&mut node, device, Command::FactoryReset, "FactoryReset"),
        Commands::Restart => commands::send_command(&mut node, device, Command::Restart, "Restart"),
    }
}
