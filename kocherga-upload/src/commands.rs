// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Command implementations: this tool plays both halves of the remote actor
//! described by the node-protocol services — client for `GetInfo` and
//! `ExecuteCommand`, server for `File.Read` once an update is under way.

use std::fs;
use std::io::Write as _;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use kocherga_core::hexdump::HexDump;
use kocherga_core::reactor::{service_id, Command, CommandStatus, FilePath, Node, NodeInfoResponse};
use kocherga_core::transfer::{DataSpec, NodeId};

use crate::Link;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(3);
const FILE_SERVE_STALL_TIMEOUT: Duration = Duration::from_secs(10);

fn next_transfer_id() -> u64 {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    NEXT.fetch_add(1, Ordering::Relaxed)
}

/// Poll `node` until a `Response` transfer matching `expected_service` and
/// `expected_transfer_id` arrives, or `timeout` elapses. The payload is
/// copied out immediately so it can outlive the borrow `poll` returns.
fn await_response(
    node: &mut Link<'_>,
    expected_service: u16,
    expected_transfer_id: u64,
    timeout: Duration,
) -> Result<Vec<u8>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(transfer) = node.poll(0) {
            if let DataSpec::Response { service_id: sid } = transfer.data_spec {
                if sid == expected_service && transfer.transfer_id == expected_transfer_id {
                    return Ok(transfer.payload.to_vec());
                }
            }
        }
        if Instant::now() >= deadline {
            bail!("timed out waiting for a response");
        }
    }
}

#[derive(Serialize)]
struct StatusReport {
    protocol_version: (u8, u8),
    hardware_version: (u8, u8),
    unique_id_hex: String,
    name: String,
    software_version: (u8, u8),
    software_vcs_revision: u32,
    software_image_crc: Option<u64>,
}

impl From<&NodeInfoResponse> for StatusReport {
    fn from(info: &NodeInfoResponse) -> Self {
        Self {
            protocol_version: info.protocol_version,
            hardware_version: info.hardware_version,
            unique_id_hex: info.unique_id.iter().map(|b| format!("{b:02x}")).collect(),
            name: String::from_utf8_lossy(info.name.as_bytes()).into_owned(),
            software_version: info.software_version,
            software_vcs_revision: info.software_vcs_revision,
            software_image_crc: info.software_image_crc,
        }
    }
}

/// Query and display `GetInfo`.
pub fn status(node: &mut Link<'_>, device: NodeId, as_json: bool) -> Result<()> {
    let transfer_id = next_transfer_id();
    if !node.send_request(service_id::GET_INFO, device, transfer_id, &[]) {
        bail!("failed to send GetInfo request");
    }
    let payload = await_response(node, service_id::GET_INFO, transfer_id, REQUEST_TIMEOUT)?;
    let info = NodeInfoResponse::decode(&payload)
        .with_context(|| format!("malformed GetInfo response:\n{}", HexDump::new(&payload)))?;

    if as_json {
        let report = StatusReport::from(&info);
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Node info:");
    println!("  Protocol version:   {}.{}", info.protocol_version.0, info.protocol_version.1);
    println!("  Hardware version:   {}.{}", info.hardware_version.0, info.hardware_version.1);
    println!("  Unique id:\n{}", HexDump::new(&info.unique_id));
    println!("  Name:               {}", String::from_utf8_lossy(info.name.as_bytes()));
    println!("  Software version:   {}.{}", info.software_version.0, info.software_version.1);
    println!("  Software VCS rev:   0x{:08x}", info.software_vcs_revision);
    match info.software_image_crc {
        Some(crc) => println!("  Software image CRC: 0x{crc:016x}"),
        None => println!("  Software image CRC: (no verified image)"),
    }
    Ok(())
}

/// Trigger `BeginSoftwareUpdate` and then serve `File.Read` requests for
/// `file` out of local memory until the device reports a short read (done)
/// or goes quiet for [`FILE_SERVE_STALL_TIMEOUT`] (presumed dead).
pub fn upload(node: &mut Link<'_>, device: NodeId, local: NodeId, file: &Path, remote_path: &str) -> Result<()> {
    let firmware = fs::read(file).with_context(|| format!("failed to read {}", file.display()))?;
    let size = firmware.len() as u64;
    println!("Firmware:    {} ({size} bytes)", file.display());
    println!("Remote path: {remote_path}");
    println!();

    let path = FilePath::from_bytes(remote_path.as_bytes());
    let begin_id = next_transfer_id();
    let command = Command::BeginSoftwareUpdate {
        file_server_node_id: local,
        path,
    };
    let mut buf = [0u8; 80];
    let len = command.encode(&mut buf);
    if !node.send_request(service_id::EXECUTE_COMMAND, device, begin_id, &buf[..len]) {
        bail!("failed to send BeginSoftwareUpdate request");
    }
    let ack = await_response(node, service_id::EXECUTE_COMMAND, begin_id, REQUEST_TIMEOUT)?;
    match ack.first().copied() {
        Some(s) if s == CommandStatus::Success as u8 => {}
        Some(s) => bail!("device rejected BeginSoftwareUpdate (status {s})"),
        None => bail!("empty ack for BeginSoftwareUpdate"),
    }

    let pb = ProgressBar::new(size);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")?
            .progress_chars("#>-"),
    );

    let mut last_activity = Instant::now();
    loop {
        let served = match node.poll(0) {
            Some(transfer) => match transfer.data_spec {
                DataSpec::Request { service_id: sid } if sid == service_id::FILE_READ && transfer.payload.len() >= 8 => {
                    let offset = u32::from_le_bytes(transfer.payload[0..4].try_into().unwrap()) as usize;
                    let want = u32::from_le_bytes(transfer.payload[4..8].try_into().unwrap()) as usize;
                    Some((transfer.source, transfer.transfer_id, offset, want))
                }
                _ => None,
            },
            None => None,
        };

        let Some((source, tid, offset, want)) = served else {
            if last_activity.elapsed() > FILE_SERVE_STALL_TIMEOUT {
                pb.abandon();
                bail!("timed out waiting for the device to request firmware data");
            }
            continue;
        };
        last_activity = Instant::now();

        let start = offset.min(firmware.len());
        let end = (offset + want).min(firmware.len());
        let chunk = &firmware[start..end];
        node.send_response(service_id::FILE_READ, source, tid, chunk);
        pb.set_position(end as u64);

        if chunk.len() < want {
            pb.finish_with_message("upload complete");
            break;
        }
    }

    println!();
    println!("Firmware served successfully.");
    Ok(())
}

/// Send a no-payload-beyond-opcode `ExecuteCommand` (`EmergencyStop`,
/// `FactoryReset`, `Restart`) and report the acknowledgement.
pub fn send_command(node: &mut Link<'_>, device: NodeId, command: Command, label: &str) -> Result<()> {
    print!("Sending {label}... ");
    std::io::stdout().flush()?;

    let transfer_id = next_transfer_id();
    let mut buf = [0u8; 80];
    let len = command.encode(&mut buf);
    if !node.send_request(service_id::EXECUTE_COMMAND, device, transfer_id, &buf[..len]) {
        bail!("failed to send {label} request");
    }
    let ack = await_response(node, service_id::EXECUTE_COMMAND, transfer_id, REQUEST_TIMEOUT)?;
    match ack.first().copied() {
        Some(s) if s == CommandStatus::Success as u8 => {
            println!("OK");
            Ok(())
        }
        Some(s) if s == CommandStatus::BadState as u8 => bail!("device rejected {label}: bad state"),
        Some(s) if s == CommandStatus::BadCommand as u8 => bail!("device rejected {label}: bad command"),
        Some(s) => bail!("device rejected {label}: status {s}"),
        None => bail!("empty ack for {label}"),
    }
}
