// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! The transport-agnostic reactor: presents the standard node-protocol
//! services (`GetInfo`, `ExecuteCommand`, `File.Read`), drives the
//! image-fetch pull loop during an update, and publishes the periodic node
//! heartbeat.
//!
//! Transports are modeled as a capability set — [`Node`] — rather than a
//! concrete type, so the reactor can drive serial, and later CAN, the same
//! way; `poll` iterates registered nodes in registration order and serves
//! whichever produces a transfer first. There is no callback from node back
//! into reactor: `Node::poll` simply *returns* a completed transfer and the
//! reactor acts on it before the next node is polled, which is all
//! "synchronous callback" amounts to in single-threaded cooperative code.
//! Because that returned transfer borrows the node's own receive buffer, it
//! is copied into an owned, bounded buffer immediately — matching the
//! buffer-ownership rule the serial parser documents.

use crate::hal::RomBackend;
use crate::image_writer::ImageWriter;
use crate::transfer::{DataSpec, NodeId, Priority, Transfer};
use crate::AppInfo;
use heapless::Vec;

/// Port/service identifiers. Values are this implementation's choice (the
/// source spec leaves them unstated); a real deployment wires these to
/// whatever port-id registry its node-protocol layer uses.
pub mod service_id {
    pub const GET_INFO: u16 = 430;
    pub const EXECUTE_COMMAND: u16 = 435;
    pub const FILE_READ: u16 = 408;
}

/// Subject on which the periodic heartbeat is published.
pub const HEARTBEAT_SUBJECT_ID: u16 = 7509;

/// Upper bound on a `File.Read` chunk / any request-response payload this
/// reactor handles. Must match the transport's own payload bound.
pub const MAX_CHUNK: usize = crate::serial::DEFAULT_MAX_PAYLOAD;

/// Longest file path this build of the reactor can carry in a
/// `BeginSoftwareUpdate` command.
pub const MAX_PATH_LEN: usize = 64;

/// Longest human-readable node name reported by `GetInfo`.
pub const MAX_NAME_LEN: usize = 32;

const HEARTBEAT_PERIOD_US: u64 = 1_000_000;

/// A bounded-length file path, copied out of a command payload.
#[derive(Debug, Clone, Copy)]
pub struct FilePath {
    bytes: [u8; MAX_PATH_LEN],
    len: usize,
}

impl FilePath {
    pub fn from_bytes(src: &[u8]) -> Self {
        let len = src.len().min(MAX_PATH_LEN);
        let mut bytes = [0u8; MAX_PATH_LEN];
        bytes[..len].copy_from_slice(&src[..len]);
        Self { bytes, len }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

impl PartialEq for FilePath {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}
impl Eq for FilePath {}

/// A bounded-length node name, as reported in `GetInfo` responses.
#[derive(Debug, Clone, Copy)]
pub struct NodeName {
    bytes: [u8; MAX_NAME_LEN],
    len: usize,
}

impl NodeName {
    pub fn from_bytes(src: &[u8]) -> Self {
        let len = src.len().min(MAX_NAME_LEN);
        let mut bytes = [0u8; MAX_NAME_LEN];
        bytes[..len].copy_from_slice(&src[..len]);
        Self { bytes, len }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

/// `GetInfo` response: protocol/hardware identity is supplied by the
/// platform at construction; software identity is filled in once the
/// resident image's `AppInfo` has been located.
#[derive(Debug, Clone, Copy)]
pub struct NodeInfoResponse {
    pub protocol_version: (u8, u8),
    pub hardware_version: (u8, u8),
    pub unique_id: [u8; 16],
    pub name: NodeName,
    pub software_version: (u8, u8),
    pub software_vcs_revision: u32,
    pub software_image_crc: Option<u64>,
}

impl NodeInfoResponse {
    pub fn new(protocol_version: (u8, u8), hardware_version: (u8, u8), unique_id: [u8; 16], name: NodeName) -> Self {
        Self {
            protocol_version,
            hardware_version,
            unique_id,
            name,
            software_version: (0, 0),
            software_vcs_revision: 0,
            software_image_crc: None,
        }
    }

    /// Populate the software-identity fields from a verified resident image.
    pub fn set_software_info(&mut self, app_info: Option<&AppInfo>) {
        match app_info {
            Some(info) => {
                self.software_version = (info.version_major, info.version_minor);
                self.software_vcs_revision = info.vcs_revision;
                self.software_image_crc = Some(info.image_crc);
            }
            None => {
                self.software_version = (0, 0);
                self.software_vcs_revision = 0;
                self.software_image_crc = None;
            }
        }
    }

    pub fn encode(&self, out: &mut [u8]) -> usize {
        out[0] = self.protocol_version.0;
        out[1] = self.protocol_version.1;
        out[2] = self.hardware_version.0;
        out[3] = self.hardware_version.1;
        out[4..20].copy_from_slice(&self.unique_id);
        out[20] = self.software_version.0;
        out[21] = self.software_version.1;
        out[22] = self.software_image_crc.is_some() as u8;
        out[23] = 0;
        out[24..32].copy_from_slice(&self.software_image_crc.unwrap_or(0).to_le_bytes());
        out[32..36].copy_from_slice(&self.software_vcs_revision.to_le_bytes());
        let name = self.name.as_bytes();
        out[36] = name.len() as u8;
        out[37..37 + name.len()].copy_from_slice(name);
        37 + name.len()
    }

    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 37 {
            return None;
        }
        let name_len = bytes[36] as usize;
        if bytes.len() < 37 + name_len {
            return None;
        }
        let mut unique_id = [0u8; 16];
        unique_id.copy_from_slice(&bytes[4..20]);
        let has_crc = bytes[22] != 0;
        let crc = u64::from_le_bytes(bytes[24..32].try_into().unwrap());
        Some(Self {
            protocol_version: (bytes[0], bytes[1]),
            hardware_version: (bytes[2], bytes[3]),
            unique_id,
            name: NodeName::from_bytes(&bytes[37..37 + name_len]),
            software_version: (bytes[20], bytes[21]),
            software_vcs_revision: u32::from_le_bytes(bytes[32..36].try_into().unwrap()),
            software_image_crc: if has_crc { Some(crc) } else { None },
        })
    }
}

mod opcode {
    pub const BEGIN_SOFTWARE_UPDATE: u8 = 0;
    pub const EMERGENCY_STOP: u8 = 1;
    pub const FACTORY_RESET: u8 = 2;
    pub const RESTART: u8 = 3;
}

/// `ExecuteCommand` requests the reactor recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    BeginSoftwareUpdate { file_server_node_id: NodeId, path: FilePath },
    EmergencyStop,
    FactoryReset,
    Restart,
}

impl Command {
    pub fn encode(&self, out: &mut [u8]) -> usize {
        match self {
            Command::BeginSoftwareUpdate { file_server_node_id, path } => {
                out[0] = opcode::BEGIN_SOFTWARE_UPDATE;
                out[1..3].copy_from_slice(&file_server_node_id.0.to_le_bytes());
                let path = path.as_bytes();
                out[3] = path.len() as u8;
                out[4..4 + path.len()].copy_from_slice(path);
                4 + path.len()
            }
            Command::EmergencyStop => {
                out[0] = opcode::EMERGENCY_STOP;
                1
            }
            Command::FactoryReset => {
                out[0] = opcode::FACTORY_RESET;
                1
            }
            Command::Restart => {
                out[0] = opcode::RESTART;
                1
            }
        }
    }

    pub fn decode(bytes: &[u8]) -> Option<Self> {
        match *bytes.first()? {
            opcode::BEGIN_SOFTWARE_UPDATE => {
                if bytes.len() < 4 {
                    return None;
                }
                let node_id = u16::from_le_bytes([bytes[1], bytes[2]]);
                let path_len = bytes[3] as usize;
                if bytes.len() < 4 + path_len {
                    return None;
                }
                Some(Command::BeginSoftwareUpdate {
                    file_server_node_id: NodeId(node_id),
                    path: FilePath::from_bytes(&bytes[4..4 + path_len]),
                })
            }
            opcode::EMERGENCY_STOP => Some(Command::EmergencyStop),
            opcode::FACTORY_RESET => Some(Command::FactoryReset),
            opcode::RESTART => Some(Command::Restart),
            _ => None,
        }
    }
}

/// Outcome reported in an `ExecuteCommand` response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandStatus {
    Success = 0,
    BadState = 1,
    BadCommand = 2,
}

/// Tracks an in-progress image download: spec.md's `ImageSession`.
#[derive(Debug, Clone, Copy)]
pub struct ImageSession {
    pub server: NodeId,
    pub path: FilePath,
    pub read_offset: u32,
    pub last_progress_us: u64,
    pub retries: u8,
}

/// The capability set a transport exposes to the reactor (spec.md §4.4).
///
/// Implementations are expected to be cheap, non-blocking, and to own
/// exactly one pending request slot, which the reactor never double-books
/// (P10).
pub trait Node {
    /// Drain inbound bytes, returning the most recently completed transfer
    /// if one finished during this call. Also flushes any outbound bytes
    /// still pending from a previous `send_request`/`send_response`/
    /// `publish_message` call.
    fn poll(&mut self, uptime_us: u64) -> Option<Transfer<'_>>;

    fn send_request(&mut self, service_id: u16, server: NodeId, transfer_id: u64, payload: &[u8]) -> bool;

    fn send_response(&mut self, service_id: u16, destination: NodeId, transfer_id: u64, payload: &[u8]) -> bool;

    fn publish_message(&mut self, subject_id: u16, transfer_id: u64, payload: &[u8]) -> bool;

    fn cancel_request(&mut self);

    fn has_pending_request(&self) -> bool;
}

/// What happened on a given `Reactor::poll` call that the state machine
/// needs to react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactorEvent {
    None,
    /// An `ExecuteCommand` request arrived; the state machine must decide
    /// and call [`Reactor::acknowledge_command`] before the next poll.
    CommandReceived(Command),
    /// The active update session finished: the last `File.Read` response
    /// was shorter than requested.
    UpdateComplete,
    /// The active update session failed (write error or retries exhausted).
    UpdateFailed,
}

struct PendingCommand {
    node_index: usize,
    source: NodeId,
    transfer_id: u64,
}

/// Drives node-protocol services across a fixed set of registered
/// transports. `MAX_NODES` bounds how many transports can be registered;
/// `chunk_size` controls how many bytes are requested per `File.Read`.
pub struct Reactor<'a, const MAX_NODES: usize> {
    nodes: Vec<&'a mut dyn Node, MAX_NODES>,
    node_info: NodeInfoResponse,
    session: Option<ImageSession>,
    pending_command: Option<PendingCommand>,
    next_transfer_id: u64,
    last_heartbeat_us: u64,
    chunk_size: u32,
    stall_timeout_us: u64,
    max_retries: u8,
}

impl<'a, const MAX_NODES: usize> Reactor<'a, MAX_NODES> {
    pub fn new(node_info: NodeInfoResponse, chunk_size: u32, stall_timeout_us: u64, max_retries: u8) -> Self {
        Self {
            nodes: Vec::new(),
            node_info,
            session: None,
            pending_command: None,
            next_transfer_id: 0,
            last_heartbeat_us: 0,
            chunk_size,
            stall_timeout_us,
            max_retries,
        }
    }

    /// Register a transport. Must be called before polling; registration
    /// order is the priority order nodes are served and driven in.
    pub fn add_node(&mut self, node: &'a mut dyn Node) -> Result<(), ()> {
        self.nodes.push(node).map_err(|_| ())
    }

    pub fn set_software_info(&mut self, app_info: Option<&AppInfo>) {
        self.node_info.set_software_info(app_info);
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// The source and path of the in-progress session, if any — used to
    /// build a [`crate::fsm::ResumeHint`] just before a requested reset.
    pub fn active_session(&self) -> Option<(NodeId, FilePath)> {
        self.session.map(|s| (s.server, s.path))
    }

    /// Start (or restart) an image-fetch session. Called by the state
    /// machine once it accepts a `BeginSoftwareUpdate` command.
    pub fn begin_session(&mut self, server: NodeId, path: FilePath, uptime_us: u64) {
        for node in self.nodes.iter_mut() {
            node.cancel_request();
        }
        self.session = Some(ImageSession {
            server,
            path,
            read_offset: 0,
            last_progress_us: uptime_us,
            retries: 0,
        });
    }

    /// Abandon any in-progress session without judging it success or
    /// failure (used when the state machine leaves `AppUpgradeInProgress`
    /// for a reason other than completion).
    pub fn abort_session(&mut self) {
        for node in self.nodes.iter_mut() {
            node.cancel_request();
        }
        self.session = None;
    }

    /// Answer a previously reported [`ReactorEvent::CommandReceived`] on the
    /// node it actually arrived on.
    pub fn acknowledge_command(&mut self, status: CommandStatus) {
        let Some(pending) = self.pending_command.take() else {
            return;
        };
        if let Some(node) = self.nodes.get_mut(pending.node_index) {
            let _ = node.send_response(
                service_id::EXECUTE_COMMAND,
                pending.source,
                pending.transfer_id,
                core::slice::from_ref(&(status as u8)),
            );
        }
    }

    fn maybe_publish_heartbeat(&mut self, uptime_us: u64) {
        if uptime_us.saturating_sub(self.last_heartbeat_us) < HEARTBEAT_PERIOD_US {
            return;
        }
        self.last_heartbeat_us = uptime_us;
        let payload = uptime_us.to_le_bytes();
        for node in self.nodes.iter_mut() {
            let id = self.next_transfer_id;
            self.next_transfer_id = self.next_transfer_id.wrapping_add(1);
            let _ = node.publish_message(HEARTBEAT_SUBJECT_ID, id, &payload);
        }
    }

    /// Service one poll cycle: heartbeat, inbound transfer handling across
    /// every registered node, and — when a session is active — the
    /// `File.Read` pull loop feeding `writer`.
    pub fn poll<B: RomBackend, const BLOCK: usize>(
        &mut self,
        uptime_us: u64,
        mut writer: Option<&mut ImageWriter<B, BLOCK>>,
    ) -> ReactorEvent {
        self.maybe_publish_heartbeat(uptime_us);

        for index in 0..self.nodes.len() {
            let owned = self.nodes[index].poll(uptime_us).map(|t| OwnedTransfer::copy_from(&t));
            if let Some(transfer) = owned {
                if let Some(event) = self.handle_transfer(index, transfer, uptime_us, writer.as_deref_mut()) {
                    return event;
                }
            }
        }

        self.drive_pull_loop(uptime_us)
    }

    fn handle_transfer<B: RomBackend, const BLOCK: usize>(
        &mut self,
        node_index: usize,
        transfer: OwnedTransfer,
        uptime_us: u64,
        writer: Option<&mut ImageWriter<B, BLOCK>>,
    ) -> Option<ReactorEvent> {
        match transfer.data_spec {
            DataSpec::Request { service_id } if service_id == service_id::GET_INFO => {
                let mut buf = [0u8; 128];
                let len = self.node_info.encode(&mut buf);
                let _ = self.nodes[node_index].send_response(
                    service_id::GET_INFO,
                    transfer.source,
                    transfer.transfer_id,
                    &buf[..len],
                );
                None
            }
            DataSpec::Request { service_id } if service_id == service_id::EXECUTE_COMMAND => {
                let command = Command::decode(&transfer.payload)?;
                self.pending_command = Some(PendingCommand {
                    node_index,
                    source: transfer.source,
                    transfer_id: transfer.transfer_id,
                });
                Some(ReactorEvent::CommandReceived(command))
            }
            DataSpec::Response { service_id } if service_id == service_id::FILE_READ => {
                self.handle_file_read_response(&transfer, uptime_us, writer)
            }
            _ => None,
        }
    }

    fn handle_file_read_response<B: RomBackend, const BLOCK: usize>(
        &mut self,
        transfer: &OwnedTransfer,
        uptime_us: u64,
        writer: Option<&mut ImageWriter<B, BLOCK>>,
    ) -> Option<ReactorEvent> {
        let session = self.session.as_mut()?;
        if transfer.source != session.server {
            return None;
        }

        let chunk = transfer.payload.as_slice();
        let short_read = (chunk.len() as u32) < self.chunk_size;

        if let Some(writer) = writer {
            if writer.write(chunk).is_err() {
                self.session = None;
                return Some(ReactorEvent::UpdateFailed);
            }
        }

        session.read_offset += chunk.len() as u32;
        session.retries = 0;
        session.last_progress_us = uptime_us;

        if short_read {
            self.session = None;
            Some(ReactorEvent::UpdateComplete)
        } else {
            None
        }
    }

    fn drive_pull_loop(&mut self, uptime_us: u64) -> ReactorEvent {
        let Some(session) = self.session else {
            return ReactorEvent::None;
        };

        if self.nodes.iter().any(|n| n.has_pending_request()) {
            if uptime_us.saturating_sub(session.last_progress_us) > self.stall_timeout_us {
                for node in self.nodes.iter_mut() {
                    node.cancel_request();
                }
                let Some(session) = self.session.as_mut() else {
                    return ReactorEvent::None;
                };
                session.retries += 1;
                session.last_progress_us = uptime_us;
                if session.retries > self.max_retries {
                    self.session = None;
                    return ReactorEvent::UpdateFailed;
                }
            }
            return ReactorEvent::None;
        }

        // P10: only issue a new request on a node with no pending request.
        let Some(node) = self.nodes.iter_mut().find(|n| !n.has_pending_request()) else {
            return ReactorEvent::None;
        };

        let mut request = [0u8; 8];
        request[0..4].copy_from_slice(&session.read_offset.to_le_bytes());
        request[4..8].copy_from_slice(&self.chunk_size.to_le_bytes());
        let id = self.next_transfer_id;
        self.next_transfer_id = self.next_transfer_id.wrapping_add(1);

        if node.send_request(service_id::FILE_READ, session.server, id, &request) {
            if let Some(session) = self.session.as_mut() {
                session.last_progress_us = uptime_us;
            }
        }
        ReactorEvent::None
    }
}

/// An owned copy of a [`Transfer`]'s metadata and payload, used to cross the
/// borrow that ties a `Transfer` to the node it came from.
struct OwnedTransfer {
    source: NodeId,
    #[allow(dead_code)]
    priority: Priority,
    data_spec: DataSpec,
    transfer_id: u64,
    payload: Vec<u8, MAX_CHUNK>,
}

impl OwnedTransfer {
    fn copy_from(t: &Transfer<'_>) -> Self {
        let mut payload = Vec::new();
        let n = t.payload.len().min(MAX_CHUNK);
        let _ = payload.extend_from_slice(&t.payload[..n]);
        Self {
            source: t.source,
            priority: t.priority,
            data_spec: t.data_spec,
            transfer_id: t.transfer_id,
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_round_trips() {
        let commands = [
            Command::BeginSoftwareUpdate {
                file_server_node_id: NodeId(9),
                path: FilePath::from_bytes(b"fw/image.bin"),
            },
            Command::EmergencyStop,
            Command::FactoryReset,
            Command::Restart,
        ];
        for cmd in commands {
            let mut buf = [0u8; 80];
            let len = cmd.encode(&mut buf);
            assert_eq!(Command::decode(&buf[..len]), Some(cmd));
        }
    }

    /// A `Node` that never has inbound traffic, only counts what it's asked
    /// to publish — enough to pin down the heartbeat's cadence without a
    /// full serial loopback.
    struct RecordingNode {
        publishes: Vec<(u16, u64), 8>,
        responses: Vec<(u16, u64, u8), 8>,
    }

    impl RecordingNode {
        fn new() -> Self {
            Self { publishes: Vec::new(), responses: Vec::new() }
        }
    }

    impl Node for RecordingNode {
        fn poll(&mut self, _uptime_us: u64) -> Option<Transfer<'_>> {
            None
        }
        fn send_request(&mut self, _service_id: u16, _server: NodeId, _transfer_id: u64, _payload: &[u8]) -> bool {
            false
        }
        fn send_response(&mut self, service_id: u16, _destination: NodeId, transfer_id: u64, payload: &[u8]) -> bool {
            let _ = self.responses.push((service_id, transfer_id, payload.first().copied().unwrap_or(0)));
            true
        }
        fn publish_message(&mut self, subject_id: u16, transfer_id: u64, _payload: &[u8]) -> bool {
            let _ = self.publishes.push((subject_id, transfer_id));
            true
        }
        fn cancel_request(&mut self) {}
        fn has_pending_request(&self) -> bool {
            false
        }
    }

    struct NullRom;
    impl RomBackend for NullRom {
        type WriteError = ();
        fn read(&self, _offset: u32, _dst: &mut [u8]) {}
        fn write(&mut self, _offset: u32, _src: &[u8]) -> Result<(), ()> {
            Ok(())
        }
    }

    #[test]
    fn heartbeat_publishes_at_one_hertz_and_no_faster_on_every_node() {
        let info = NodeInfoResponse::new((1, 0), (0, 0), [0; 16], NodeName::from_bytes(b"node"));
        let mut reactor = Reactor::<2>::new(info, 1024, 500_000, 3);
        let mut node_a = RecordingNode::new();
        let mut node_b = RecordingNode::new();
        reactor.add_node(&mut node_a).unwrap();
        reactor.add_node(&mut node_b).unwrap();

        reactor.poll::<NullRom, 16>(0, None);
        reactor.poll::<NullRom, 16>(400_000, None);
        reactor.poll::<NullRom, 16>(999_999, None);
        assert_eq!(node_a.publishes.len(), 1, "no second heartbeat before the period elapses");
        assert_eq!(node_b.publishes.len(), 1, "broadcast must reach every registered node");

        reactor.poll::<NullRom, 16>(1_000_000, None);
        assert_eq!(node_a.publishes.len(), 2);
        assert_eq!(node_b.publishes.len(), 2);
        assert_eq!(node_a.publishes[0].0, HEARTBEAT_SUBJECT_ID);
        assert_eq!(node_b.publishes[0].0, HEARTBEAT_SUBJECT_ID);
        assert_ne!(node_a.publishes[0].1, node_a.publishes[1].1, "each heartbeat gets a fresh transfer id");
    }

    #[test]
    fn acknowledge_command_replies_only_on_the_node_that_sent_the_request() {
        let info = NodeInfoResponse::new((1, 0), (0, 0), [0; 16], NodeName::from_bytes(b"node"));
        let mut reactor = Reactor::<2>::new(info, 1024, 500_000, 3);
        let mut node_a = RecordingNode::new();
        let mut node_b = RecordingNode::new();
        reactor.add_node(&mut node_a).unwrap();
        reactor.add_node(&mut node_b).unwrap();

        let mut buf = [0u8; 80];
        let len = Command::EmergencyStop.encode(&mut buf);
        let mut payload = Vec::<u8, MAX_CHUNK>::new();
        let _ = payload.extend_from_slice(&buf[..len]);
        let transfer = OwnedTransfer {
            source: NodeId(9),
            priority: Priority::Nominal,
            data_spec: DataSpec::Request { service_id: service_id::EXECUTE_COMMAND },
            transfer_id: 5,
            payload,
        };

        // Delivered on node index 1 (`node_b`), not 0.
        let event = reactor.handle_transfer::<NullRom, 16>(1, transfer, 0, None);
        assert_eq!(event, Some(ReactorEvent::CommandReceived(Command::EmergencyStop)));

        reactor.acknowledge_command(CommandStatus::Success);

        assert!(node_a.responses.is_empty(), "the request arrived on node 1, not node 0");
        assert_eq!(node_b.responses.len(), 1);
        assert_eq!(node_b.responses[0], (service_id::EXECUTE_COMMAND, 5, CommandStatus::Success as u8));
    }

    #[test]
    fn node_info_round_trips() {
        let mut info = NodeInfoResponse::new((1, 0), (2, 1), [0xAB; 16], NodeName::from_bytes(b"kocherga"));
        info.software_version = (3, 4);
        info.software_vcs_revision = 0xCAFEBABE;
        info.software_image_crc = Some(0x0123_4567_89AB_CDEF);

        let mut buf = [0u8; 128];
        let len = info.encode(&mut buf);
        let decoded = NodeInfoResponse::decode(&buf[..len]).unwrap();
        assert_eq!(decoded.software_version, (3, 4));
        assert_eq!(decoded.software_vcs_revision, 0xCAFEBABE);
        assert_eq!(decoded.software_image_crc, Some(0x0123_4567_89AB_CDEF));
        assert_eq!(decoded.name.as_bytes(), b"kocherga");
    }
}
