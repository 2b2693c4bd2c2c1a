// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! The top-level bootloader: owns the ROM backend, the clock, the reset
//! line, and the reactor, and drives the state transitions between "no
//! valid image" and "ready to hand off to the application."
//!
//! This is the one piece of global state in the crate (per the design
//! note that there is no other); everything reachable at runtime hangs off
//! a [`Bootloader`] instance.

use crate::app_info::{self, AppInfo, RomRegion};
use crate::hal::{Clock, ResetRequest, RomBackend};
use crate::image_writer::ImageWriter;
use crate::reactor::{Command, CommandStatus, FilePath, Reactor, ReactorEvent, MAX_PATH_LEN};
use crate::transfer::NodeId;
use crate::volatile::{FlatRecord, VolatileStorage};

/// Node-protocol `Mode`, as reported alongside the heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Initialization,
    SoftwareUpdate,
}

/// Node-protocol `Health`, as reported alongside the heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    Ok,
    Warning,
    Error,
}

/// Bootloader state (spec.md §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// No valid resident image; wait indefinitely for an update.
    NoAppToBoot,
    /// Valid image found; waiting out the boot-delay window.
    BootDelay,
    /// Boot was aborted by request; wait for an update.
    BootCancelled,
    /// Serving a `BeginSoftwareUpdate` session.
    AppUpgradeInProgress,
    /// Verified image, decided to launch; terminal in-bootloader.
    ReadyToBoot,
}

impl State {
    pub fn mode(self) -> Mode {
        match self {
            State::NoAppToBoot | State::BootCancelled | State::AppUpgradeInProgress => Mode::SoftwareUpdate,
            State::BootDelay | State::ReadyToBoot => Mode::Initialization,
        }
    }

    pub fn health(self) -> Health {
        match self {
            State::NoAppToBoot => Health::Error,
            State::BootCancelled => Health::Warning,
            State::BootDelay | State::AppUpgradeInProgress | State::ReadyToBoot => Health::Ok,
        }
    }
}

/// Boot-delay window, stall timeout, retry count, and read-chunk size are
/// not stated by the source and are treated as configuration here (see
/// DESIGN.md, Open Question (c)). Defaults match the scenarios in spec.md
/// §8 (a 2 s boot delay).
#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub boot_delay_us: u64,
    pub stall_timeout_us: u64,
    pub max_retries: u8,
    pub read_chunk_size: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            boot_delay_us: 2_000_000,
            stall_timeout_us: 500_000,
            max_retries: 3,
            read_chunk_size: 1024,
        }
    }
}

/// The cross-reset "resume update from here" record carried in
/// [`VolatileStorage`]. Plain, `repr(C)` data so it can be serialized
/// byte-for-byte — no `FilePath` methods cross that boundary.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ResumeHint {
    server_node_id: u16,
    path_len: u8,
    path: [u8; MAX_PATH_LEN],
}

unsafe impl FlatRecord for ResumeHint {}

impl ResumeHint {
    pub fn new(server: NodeId, path: FilePath) -> Self {
        let bytes = path.as_bytes();
        let mut stored = [0u8; MAX_PATH_LEN];
        stored[..bytes.len()].copy_from_slice(bytes);
        Self {
            server_node_id: server.0,
            path_len: bytes.len() as u8,
            path: stored,
        }
    }

    pub fn server(&self) -> NodeId {
        NodeId(self.server_node_id)
    }

    pub fn path(&self) -> FilePath {
        FilePath::from_bytes(&self.path[..self.path_len as usize])
    }
}

/// Owns the ROM backend: either idle (available for read-only
/// verification) or mid-write (owned by an [`ImageWriter`]). `Empty` only
/// ever exists transiently inside a single method, as the placeholder
/// `core::mem::replace` needs to move a value out and back in.
enum Rom<B: RomBackend, const BLOCK: usize> {
    Idle(B),
    Writing(ImageWriter<B, BLOCK>),
    Empty,
}

/// The top-level bootloader state machine.
///
/// `MAX_NODES` bounds the reactor's registered transports; `BLOCK` is the
/// host's minimum flash program unit.
pub struct Bootloader<'a, B, C, R, const MAX_NODES: usize, const BLOCK: usize>
where
    B: RomBackend,
    C: Clock,
    R: ResetRequest,
{
    rom: Rom<B, BLOCK>,
    region_len: usize,
    clock: C,
    reset: R,
    reactor: Reactor<'a, MAX_NODES>,
    config: Config,
    state: State,
    app_info: Option<AppInfo>,
    app_info_offset: Option<usize>,
    boot_delay_deadline_us: Option<u64>,
    volatile_region: *mut u8,
}

impl<'a, B, C, R, const MAX_NODES: usize, const BLOCK: usize> Bootloader<'a, B, C, R, MAX_NODES, BLOCK>
where
    B: RomBackend,
    C: Clock,
    R: ResetRequest,
{
    /// # Safety
    ///
    /// `volatile_region` must point to at least
    /// `VolatileStorage::<ResumeHint>::STORAGE_SIZE` bytes of RAM that
    /// survive a soft reset and are not aliased by anything else for the
    /// lifetime of this `Bootloader`.
    pub unsafe fn new(
        backend: B,
        region_len: usize,
        clock: C,
        reset: R,
        reactor: Reactor<'a, MAX_NODES>,
        config: Config,
        volatile_region: *mut u8,
    ) -> Self {
        let mut this = Self {
            rom: Rom::Idle(backend),
            region_len,
            clock,
            reset,
            reactor,
            config,
            state: State::NoAppToBoot,
            app_info: None,
            app_info_offset: None,
            boot_delay_deadline_us: None,
            volatile_region,
        };
        this.enter_initial_state();
        this
    }

    pub fn add_node(&mut self, node: &'a mut dyn crate::reactor::Node) -> Result<(), ()> {
        self.reactor.add_node(node)
    }

    pub fn get_state(&self) -> State {
        self.state
    }

    pub fn get_app_info(&self) -> Option<&AppInfo> {
        self.app_info.as_ref()
    }

    fn enter_initial_state(&mut self) {
        self.run_verification();

        let hint = unsafe { VolatileStorage::<ResumeHint>::take(self.volatile_region) };
        if let Some(hint) = hint {
            let uptime_us = self.clock.uptime_us();
            self.invalidate_descriptor();
            self.reactor.begin_session(hint.server(), hint.path(), uptime_us);
            self.state = State::AppUpgradeInProgress;
            return;
        }

        self.state = if self.app_info.is_some() {
            self.boot_delay_deadline_us = Some(self.clock.uptime_us() + self.config.boot_delay_us);
            State::BootDelay
        } else {
            State::NoAppToBoot
        };
    }

    fn run_verification(&mut self) {
        let Rom::Idle(backend) = &self.rom else {
            return;
        };
        let rom = RomRegion::new(backend, self.region_len);
        match app_info::locate_and_verify(&rom) {
            Ok((info, offset)) => {
                self.app_info = Some(info);
                self.app_info_offset = Some(offset);
            }
            Err(_) => {
                self.app_info = None;
                self.app_info_offset = None;
            }
        }
        self.reactor.set_software_info(self.app_info.as_ref());
    }

    /// Zero the resident descriptor's signature so no app is considered
    /// installed, without starting a new write session. Used by
    /// `Command::FactoryReset` outside an active update.
    fn factory_reset(&mut self) {
        if let (Rom::Idle(backend), Some(offset)) = (&mut self.rom, self.app_info_offset) {
            let _ = backend.write(offset as u32, &[0u8; 8]);
        }
        self.app_info = None;
        self.app_info_offset = None;
        self.reactor.set_software_info(None);
    }

    /// Zero the resident descriptor's signature before the first write of
    /// a new image, so a write interrupted partway through can never be
    /// mistaken for a valid (stale) one, then hand the backend to a fresh
    /// [`ImageWriter`].
    fn invalidate_descriptor(&mut self) {
        if let (Rom::Idle(backend), Some(offset)) = (&mut self.rom, self.app_info_offset) {
            let _ = backend.write(offset as u32, &[0u8; 8]);
        }
        self.app_info = None;
        self.app_info_offset = None;

        self.rom = match core::mem::replace(&mut self.rom, Rom::Empty) {
            Rom::Idle(backend) => Rom::Writing(ImageWriter::begin_write(backend)),
            other => other,
        };
    }

    /// Advance the state machine by one cooperative step. The host calls
    /// this from its main loop or a periodic timer; when it returns
    /// `State::ReadyToBoot` the caller performs the platform-specific jump
    /// to the application entry point.
    pub fn poll(&mut self) -> State {
        if self.state == State::ReadyToBoot {
            return self.state;
        }
        let uptime_us = self.clock.uptime_us();

        let event = match &mut self.rom {
            Rom::Writing(writer) => self.reactor.poll::<B, BLOCK>(uptime_us, Some(writer)),
            _ => self.reactor.poll::<B, BLOCK>(uptime_us, None),
        };

        if matches!(event, ReactorEvent::CommandReceived(Command::Restart)) {
            self.reactor.acknowledge_command(CommandStatus::Success);
            self.record_resume_hint();
            self.reset.request_reset();
        }

        match self.state {
            State::NoAppToBoot | State::BootCancelled => self.handle_idle_event(event, uptime_us),
            State::BootDelay => self.handle_boot_delay_event(event, uptime_us),
            State::AppUpgradeInProgress => self.handle_update_event(event, uptime_us),
            State::ReadyToBoot => unreachable!(),
        }

        self.state
    }

    fn handle_idle_event(&mut self, event: ReactorEvent, uptime_us: u64) {
        match event {
            ReactorEvent::CommandReceived(Command::BeginSoftwareUpdate { file_server_node_id, path }) => {
                self.begin_update(file_server_node_id, path, uptime_us);
                self.reactor.acknowledge_command(CommandStatus::Success);
            }
            ReactorEvent::CommandReceived(Command::FactoryReset) => {
                self.factory_reset();
                self.reactor.acknowledge_command(CommandStatus::Success);
            }
            ReactorEvent::CommandReceived(_) => {
                self.reactor.acknowledge_command(CommandStatus::BadCommand);
            }
            ReactorEvent::None | ReactorEvent::UpdateComplete | ReactorEvent::UpdateFailed => {}
        }
    }

    fn handle_boot_delay_event(&mut self, event: ReactorEvent, uptime_us: u64) {
        match event {
            ReactorEvent::CommandReceived(Command::BeginSoftwareUpdate { file_server_node_id, path }) => {
                self.begin_update(file_server_node_id, path, uptime_us);
                self.reactor.acknowledge_command(CommandStatus::Success);
                return;
            }
            ReactorEvent::CommandReceived(Command::EmergencyStop) => {
                self.state = State::BootCancelled;
                self.reactor.acknowledge_command(CommandStatus::Success);
                return;
            }
            ReactorEvent::CommandReceived(Command::FactoryReset) => {
                self.factory_reset();
                self.state = State::NoAppToBoot;
                self.reactor.acknowledge_command(CommandStatus::Success);
                return;
            }
            ReactorEvent::CommandReceived(_) => {
                self.reactor.acknowledge_command(CommandStatus::BadCommand);
            }
            ReactorEvent::None | ReactorEvent::UpdateComplete | ReactorEvent::UpdateFailed => {}
        }
        if let Some(deadline) = self.boot_delay_deadline_us {
            if uptime_us >= deadline {
                self.state = State::ReadyToBoot;
            }
        }
    }

    fn handle_update_event(&mut self, event: ReactorEvent, uptime_us: u64) {
        match event {
            ReactorEvent::CommandReceived(Command::BeginSoftwareUpdate { file_server_node_id, path }) => {
                // A new source pre-empts the running session; the resident
                // descriptor is already invalidated from the first begin.
                self.reactor.begin_session(file_server_node_id, path, uptime_us);
                self.reactor.acknowledge_command(CommandStatus::Success);
            }
            ReactorEvent::CommandReceived(Command::EmergencyStop) => {
                self.abort_update();
                self.reactor.acknowledge_command(CommandStatus::Success);
            }
            ReactorEvent::CommandReceived(Command::FactoryReset) => {
                // The in-flight image's descriptor was already invalidated
                // when the session began, so aborting leaves no app resident.
                self.abort_update();
                self.reactor.acknowledge_command(CommandStatus::Success);
            }
            ReactorEvent::CommandReceived(_) => {
                self.reactor.acknowledge_command(CommandStatus::BadCommand);
            }
            ReactorEvent::UpdateComplete => self.finish_update(uptime_us),
            ReactorEvent::UpdateFailed => self.abort_update(),
            ReactorEvent::None => {}
        }
    }

    /// Per spec.md §4.7 ("Any state: Restart → record intent (optional) →
    /// request platform reset"): if a session is in flight, leave a
    /// [`ResumeHint`] in volatile storage so the next boot resumes it
    /// instead of waiting for the remote actor to notice and re-issue
    /// `BeginSoftwareUpdate`.
    fn record_resume_hint(&mut self) {
        if let Some((server, path)) = self.reactor.active_session() {
            let hint = ResumeHint::new(server, path);
            unsafe {
                VolatileStorage::store(self.volatile_region, &hint);
            }
        }
    }

    fn begin_update(&mut self, server: NodeId, path: FilePath, uptime_us: u64) {
        self.invalidate_descriptor();
        self.reactor.begin_session(server, path, uptime_us);
        self.state = State::AppUpgradeInProgress;
    }

    fn finish_update(&mut self, uptime_us: u64) {
        let backend = match core::mem::replace(&mut self.rom, Rom::Empty) {
            Rom::Writing(writer) => {
                let (result, backend) = writer.end_write();
                if result.is_err() {
                    self.rom = Rom::Idle(backend);
                    self.state = State::NoAppToBoot;
                    return;
                }
                backend
            }
            Rom::Idle(backend) => backend,
            Rom::Empty => {
                self.state = State::NoAppToBoot;
                return;
            }
        };
        self.rom = Rom::Idle(backend);
        self.run_verification();
        self.state = if self.app_info.is_some() {
            // Zero remaining delay: hand off promptly per spec.md §4.7.
            self.boot_delay_deadline_us = Some(uptime_us);
            State::BootDelay
        } else {
            State::NoAppToBoot
        };
    }

    fn abort_update(&mut self) {
        self.reactor.abort_session();
        let backend = match core::mem::replace(&mut self.rom, Rom::Empty) {
            Rom::Writing(writer) => writer.end_write().1,
            Rom::Idle(backend) => backend,
            Rom::Empty => {
                self.state = State::NoAppToBoot;
                return;
            }
        };
        self.rom = Rom::Idle(backend);
        self.app_info = None;
        self.app_info_offset = None;
        self.reactor.set_software_info(None);
        self.state = State::NoAppToBoot;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrity::CRC64;

    const BLOCK: usize = 16;
    const IMAGE_LEN: usize = 64;

    struct FakeRom {
        data: [u8; IMAGE_LEN],
    }

    impl RomBackend for FakeRom {
        type WriteError = ();
        fn read(&self, offset: u32, dst: &mut [u8]) {
            let offset = offset as usize;
            dst.copy_from_slice(&self.data[offset..offset + dst.len()]);
        }
        fn write(&mut self, offset: u32, src: &[u8]) -> Result<(), ()> {
            let offset = offset as usize;
            self.data[offset..offset + src.len()].copy_from_slice(src);
            Ok(())
        }
    }

    struct FakeClock {
        now_us: core::cell::Cell<u64>,
    }
    impl Clock for FakeClock {
        fn uptime_us(&self) -> u64 {
            self.now_us.get()
        }
    }

    struct NeverReset;
    impl ResetRequest for NeverReset {
        fn request_reset(&mut self) -> ! {
            panic!("reset requested in test");
        }
    }

    fn build_valid_image() -> [u8; IMAGE_LEN] {
        use crate::app_info::{flags, SIGNATURE};
        let mut data = [0xFFu8; IMAGE_LEN];
        data[0..8].copy_from_slice(&SIGNATURE);
        data[16..20].copy_from_slice(&(IMAGE_LEN as u32).to_le_bytes());
        data[26] = flags::RELEASE;
        let mut masked = data;
        for b in &mut masked[8..16] {
            *b = 0;
        }
        let mut digest = CRC64.digest();
        digest.update(&masked);
        let crc = digest.finalize();
        data[8..16].copy_from_slice(&crc.to_le_bytes());
        data
    }

    #[test]
    fn boots_straight_to_boot_delay_with_a_valid_image() {
        let rom = FakeRom { data: build_valid_image() };
        let clock = FakeClock { now_us: core::cell::Cell::new(0) };
        let reactor = Reactor::<0>::new(
            crate::reactor::NodeInfoResponse::new(
                (1, 0),
                (0, 0),
                [0; 16],
                crate::reactor::NodeName::from_bytes(b"test"),
            ),
            64,
            500_000,
            3,
        );
        let mut region = [0u8; VolatileStorage::<ResumeHint>::STORAGE_SIZE];
        let mut bl: Bootloader<'_, FakeRom, FakeClock, NeverReset, 0, BLOCK> = unsafe {
            Bootloader::new(rom, IMAGE_LEN, clock, NeverReset, reactor, Config::default(), region.as_mut_ptr())
        };
        assert_eq!(bl.get_state(), State::BootDelay);
        assert!(bl.get_app_info().is_some());
    }

    #[test]
    fn no_valid_image_parks_in_no_app_to_boot() {
        let rom = FakeRom { data: [0xFFu8; IMAGE_LEN] };
        let clock = FakeClock { now_us: core::cell::Cell::new(0) };
        let reactor = Reactor::<0>::new(
            crate::reactor::NodeInfoResponse::new(
                (1, 0),
                (0, 0),
                [0; 16],
                crate::reactor::NodeName::from_bytes(b"test"),
            ),
            64,
            500_000,
            3,
        );
        let mut region = [0u8; VolatileStorage::<ResumeHint>::STORAGE_SIZE];
        let bl: Bootloader<'_, FakeRom, FakeClock, NeverReset, 0, BLOCK> = unsafe {
            Bootloader::new(rom, IMAGE_LEN, clock, NeverReset, reactor, Config::default(), region.as_mut_ptr())
        };
        assert_eq!(bl.get_state(), State::NoAppToBoot);
        assert!(bl.get_app_info().is_none());
    }

    #[test]
    fn boot_delay_expiry_advances_to_ready_to_boot() {
        let rom = FakeRom { data: build_valid_image() };
        let clock = FakeClock { now_us: core::cell::Cell::new(0) };
        let reactor = Reactor::<0>::new(
            crate::reactor::NodeInfoResponse::new(
                (1, 0),
                (0, 0),
                [0; 16],
                crate::reactor::NodeName::from_bytes(b"test"),
            ),
            64,
            500_000,
            3,
        );
        let mut region = [0u8; VolatileStorage::<ResumeHint>::STORAGE_SIZE];
        let config = Config { boot_delay_us: 1_000, ..Config::default() };
        let mut bl: Bootloader<'_, FakeRom, FakeClock, NeverReset, 0, BLOCK> =
            unsafe { Bootloader::new(rom, IMAGE_LEN, clock, NeverReset, reactor, config, region.as_mut_ptr()) };
        assert_eq!(bl.get_state(), State::BootDelay);
        bl.clock.now_us.set(2_000);
        assert_eq!(bl.poll(), State::ReadyToBoot);
    }

    #[test]
    fn restart_during_an_update_leaves_a_resume_hint() {
        let rom = FakeRom { data: [0xFFu8; IMAGE_LEN] };
        let clock = FakeClock { now_us: core::cell::Cell::new(0) };
        let reactor = Reactor::<0>::new(
            crate::reactor::NodeInfoResponse::new(
                (1, 0),
                (0, 0),
                [0; 16],
                crate::reactor::NodeName::from_bytes(b"test"),
            ),
            64,
            500_000,
            3,
        );
        let mut region = [0u8; VolatileStorage::<ResumeHint>::STORAGE_SIZE];
        let mut bl: Bootloader<'_, FakeRom, FakeClock, NeverReset, 0, BLOCK> = unsafe {
            Bootloader::new(rom, IMAGE_LEN, clock, NeverReset, reactor, Config::default(), region.as_mut_ptr())
        };
        bl.begin_update(NodeId(7), FilePath::from_bytes(b"fw/next.bin"), 0);
        bl.record_resume_hint();

        let restored = unsafe { VolatileStorage::<ResumeHint>::take(region.as_mut_ptr()) }.unwrap();
        assert_eq!(restored.server(), NodeId(7));
        assert_eq!(restored.path().as_bytes(), b"fw/next.bin");
    }

    #[test]
    fn factory_reset_during_boot_delay_cancels_the_pending_boot() {
        let rom = FakeRom { data: build_valid_image() };
        let clock = FakeClock { now_us: core::cell::Cell::new(0) };
        let reactor = Reactor::<0>::new(
            crate::reactor::NodeInfoResponse::new(
                (1, 0),
                (0, 0),
                [0; 16],
                crate::reactor::NodeName::from_bytes(b"test"),
            ),
            64,
            500_000,
            3,
        );
        let mut region = [0u8; VolatileStorage::<ResumeHint>::STORAGE_SIZE];
        let config = Config { boot_delay_us: 1_000_000, ..Config::default() };
        let mut bl: Bootloader<'_, FakeRom, FakeClock, NeverReset, 0, BLOCK> =
            unsafe { Bootloader::new(rom, IMAGE_LEN, clock, NeverReset, reactor, config, region.as_mut_ptr()) };
        assert_eq!(bl.get_state(), State::BootDelay);
        assert!(bl.get_app_info().is_some());

        bl.handle_boot_delay_event(ReactorEvent::CommandReceived(Command::FactoryReset), 0);
        assert_eq!(bl.get_state(), State::NoAppToBoot);
        assert!(bl.get_app_info().is_none());
    }

    #[test]
    fn factory_reset_during_an_update_aborts_the_session() {
        let rom = FakeRom { data: [0xFFu8; IMAGE_LEN] };
        let clock = FakeClock { now_us: core::cell::Cell::new(0) };
        let reactor = Reactor::<0>::new(
            crate::reactor::NodeInfoResponse::new(
                (1, 0),
                (0, 0),
                [0; 16],
                crate::reactor::NodeName::from_bytes(b"test"),
            ),
            64,
            500_000,
            3,
        );
        let mut region = [0u8; VolatileStorage::<ResumeHint>::STORAGE_SIZE];
        let mut bl: Bootloader<'_, FakeRom, FakeClock, NeverReset, 0, BLOCK> = unsafe {
            Bootloader::new(rom, IMAGE_LEN, clock, NeverReset, reactor, Config::default(), region.as_mut_ptr())
        };
        bl.begin_update(NodeId(7), FilePath::from_bytes(b"fw/next.bin"), 0);
        assert_eq!(bl.get_state(), State::AppUpgradeInProgress);

        bl.handle_update_event(ReactorEvent::CommandReceived(Command::FactoryReset), 0);
        assert_eq!(bl.get_state(), State::NoAppToBoot);
    }

    #[test]
    fn resume_hint_round_trips_through_volatile_storage() {
        let hint = ResumeHint::new(NodeId(42), FilePath::from_bytes(b"fw/next.bin"));
        let mut region = [0u8; VolatileStorage::<ResumeHint>::STORAGE_SIZE];
        unsafe {
            VolatileStorage::store(region.as_mut_ptr(), &hint);
        }
        let restored = unsafe { VolatileStorage::<ResumeHint>::take(region.as_mut_ptr()) }.unwrap();
        assert_eq!(restored.server(), NodeId(42));
        assert_eq!(restored.path().as_bytes(), b"fw/next.bin");
    }
}
