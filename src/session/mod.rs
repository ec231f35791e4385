//! # Protocol Session Module
//!
//! Stateful protocol operations against one board link.
//!
//! This module handles:
//! - Mode transitions with acknowledgment checks
//! - The two-sample storage growth check
//! - Storage clear commands
//! - Sensor snapshot reads (load cell, shock, IMU, altimeter)
//! - Launch-mode entry
//!
//! Every operation reports a boolean outcome and narrates its progress
//! through an [`OpLog`] sink. Failures stay local to the operation that
//! hit them; nothing here aborts the process or the surrounding run.

use tokio::time::sleep;

use crate::config::{CalibrationConfig, Config, ProtocolConfig};
use crate::error::{BenchError, Result};
use crate::protocol::decoder::{decode_ack, decode_record};
use crate::protocol::encoder::encode_command;
use crate::protocol::wire::{
    AltimeterReading, ImuReading, LoadCellReading, Mode, Opcode, ShockReading, StorageKind,
    StorageUpdate, WireRecord,
};
use crate::transport::{FrameTransport, SerialLink};

/// Sink for an operation's diagnostic log lines
///
/// The orchestrator adapts this onto its progress-event stream; tests
/// pass a plain closure.
pub trait OpLog: Sync {
    fn line(&self, text: &str);
}

impl<F> OpLog for F
where
    F: Fn(&str) + Sync,
{
    fn line(&self, text: &str) {
        self(text)
    }
}

/// Shock accelerometer channels on the digital board
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShockChannel {
    One,
    Two,
}

impl ShockChannel {
    pub const fn opcode(self) -> Opcode {
        match self {
            ShockChannel::One => Opcode::GetShock1Reading,
            ShockChannel::Two => Opcode::GetShock2Reading,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            ShockChannel::One => "shock 1",
            ShockChannel::Two => "shock 2",
        }
    }
}

/// One protocol conversation with the avionics boards
///
/// Owns the link exclusively; operations never interleave.
pub struct ProtocolSession<L: SerialLink> {
    transport: FrameTransport<L>,
    timing: ProtocolConfig,
    calibration: CalibrationConfig,
}

impl<L: SerialLink> ProtocolSession<L> {
    pub fn new(link: L, config: &Config) -> Self {
        Self {
            transport: FrameTransport::new(link, &config.framing),
            timing: config.protocol.clone(),
            calibration: config.calibration.clone(),
        }
    }

    /// Send one encoded command frame
    async fn dispatch(&mut self, opcode: Opcode) -> Result<()> {
        let frame = encode_command(opcode, self.transport.terminator());
        self.transport.write_message(&frame).await
    }

    /// Send a command and decode its framed response
    async fn request<T: WireRecord>(&mut self, opcode: Opcode) -> Result<T> {
        self.dispatch(opcode).await?;
        let body = self
            .transport
            .read_or_timeout(self.timing.read_timeout())
            .await?;
        decode_record(&body)
    }

    /// Send a mode transition and verify the echoed acknowledgment
    async fn transition(&mut self, mode: Mode) -> Result<()> {
        let opcode = mode.opcode();
        self.dispatch(opcode).await?;
        let body = self
            .transport
            .read_or_timeout(self.timing.read_timeout())
            .await?;
        let ack = decode_ack(&body)?;
        if ack != opcode.byte() {
            return Err(BenchError::AckMismatch {
                sent: opcode.byte(),
                got: ack,
            });
        }
        Ok(())
    }

    /// Switch the boards to normal (recording) mode
    pub async fn enter_normal(&mut self, log: &dyn OpLog) -> bool {
        log.line("[enter normal]: sending command to enter normal mode");
        match self.transition(Mode::Normal).await {
            Ok(()) => {
                log.line("[enter normal]: normal mode transition acknowledged");
                true
            }
            Err(e) => {
                log.line(&format!("[enter normal]: {}", e));
                false
            }
        }
    }

    /// Switch the boards to inspect (query) mode
    pub async fn enter_inspect(&mut self, log: &dyn OpLog) -> bool {
        log.line("[enter inspect]: sending command to enter inspect mode");
        match self.transition(Mode::Inspect).await {
            Ok(()) => {
                log.line("[enter inspect]: inspect mode transition acknowledged");
                true
            }
            Err(e) => {
                log.line(&format!("[enter inspect]: {}", e));
                false
            }
        }
    }

    /// Request one storage sample from the given subsystem
    async fn storage_sample(
        &mut self,
        kind: StorageKind,
        log: &dyn OpLog,
    ) -> Option<StorageUpdate> {
        match self.request::<StorageUpdate>(kind.update_opcode()).await {
            Ok(update) => {
                log.line(&format!(
                    "[storage sample]: file size: {}, last update timestamp: {}",
                    update.file_size, update.last_timestamp
                ));
                Some(update)
            }
            Err(e) => {
                log.line(&format!("[storage sample]: {}", e));
                None
            }
        }
    }

    /// Verify that a storage subsystem is recording
    ///
    /// Samples file size and timestamp in inspect mode, lets the boards
    /// record in normal mode for the settle interval, then samples
    /// again. Both fields must strictly increase. Any failed step
    /// short-circuits the whole check.
    pub async fn check_storage(&mut self, kind: StorageKind, log: &dyn OpLog) -> bool {
        let label = format!("check {} sd", kind.label());

        log.line(&format!("[{}]: entering inspect mode", label));
        if !self.enter_inspect(log).await {
            log.line(&format!("[{}]: failed to enter inspect mode", label));
            return false;
        }

        log.line(&format!("[{}]: requesting first storage sample", label));
        let first = match self.storage_sample(kind, log).await {
            Some(update) => update,
            None => return false,
        };

        log.line(&format!("[{}]: entering normal mode", label));
        if !self.enter_normal(log).await {
            log.line(&format!("[{}]: failed to enter normal mode", label));
            return false;
        }

        sleep(self.timing.settle()).await;

        log.line(&format!("[{}]: entering inspect mode", label));
        if !self.enter_inspect(log).await {
            log.line(&format!("[{}]: failed to enter inspect mode", label));
            return false;
        }

        sleep(self.timing.stabilize()).await;

        log.line(&format!("[{}]: requesting second storage sample", label));
        let second = match self.storage_sample(kind, log).await {
            Some(update) => update,
            None => return false,
        };

        let grew = second.file_size > first.file_size
            && second.last_timestamp > first.last_timestamp;

        if grew {
            log.line(&format!(
                "[{}]: storage growing (size {} -> {}, timestamp {} -> {})",
                label, first.file_size, second.file_size,
                first.last_timestamp, second.last_timestamp
            ));
        } else {
            log.line(&format!(
                "[{}]: storage did not grow (size {} -> {}, timestamp {} -> {})",
                label, first.file_size, second.file_size,
                first.last_timestamp, second.last_timestamp
            ));
        }

        grew
    }

    /// Erase a storage subsystem and report the resulting free space
    pub async fn clear_storage(&mut self, kind: StorageKind, log: &dyn OpLog) -> bool {
        let label = format!("clear {} sd", kind.label());

        log.line(&format!("[{}]: entering inspect mode", label));
        if !self.enter_inspect(log).await {
            log.line(&format!("[{}]: failed to enter inspect mode", label));
            return false;
        }

        log.line(&format!("[{}]: sending clear command", label));
        match self.request::<u32>(kind.clear_opcode()).await {
            Ok(free_space) => {
                log.line(&format!(
                    "[{}]: clear command acknowledged, free space is now: {} MB",
                    label, free_space
                ));
                true
            }
            Err(e) => {
                log.line(&format!("[{}]: {}", label, e));
                false
            }
        }
    }

    /// Snapshot the load cell and log raw plus calibrated values
    pub async fn read_load_cell(&mut self, log: &dyn OpLog) -> bool {
        log.line("[read load cell]: entering inspect mode");
        if !self.enter_inspect(log).await {
            log.line("[read load cell]: failed to enter inspect mode");
            return false;
        }

        log.line("[read load cell]: requesting load cell reading");
        match self.request::<LoadCellReading>(Opcode::GetAnalogLcReading).await {
            Ok(reading) => {
                let calibrated = reading.calibrated(
                    self.calibration.load_cell_scale,
                    self.calibration.load_cell_offset,
                );
                log.line(&format!(
                    "[read load cell]: raw reading: {}, calibrated reading: {}",
                    reading.raw, calibrated
                ));
                true
            }
            Err(e) => {
                log.line(&format!("[read load cell]: {}", e));
                false
            }
        }
    }

    /// Snapshot one shock accelerometer channel
    pub async fn read_shock(&mut self, channel: ShockChannel, log: &dyn OpLog) -> bool {
        let label = format!("read {}", channel.label());

        log.line(&format!("[{}]: entering inspect mode", label));
        if !self.enter_inspect(log).await {
            log.line(&format!("[{}]: failed to enter inspect mode", label));
            return false;
        }

        log.line(&format!("[{}]: requesting shock reading", label));
        match self.request::<ShockReading>(channel.opcode()).await {
            Ok(reading) => {
                log.line(&format!(
                    "[{}]: acc x: {}, y: {}, z: {}, timestamp: {}",
                    label, reading.acc_x, reading.acc_y, reading.acc_z, reading.timestamp
                ));
                true
            }
            Err(e) => {
                log.line(&format!("[{}]: {}", label, e));
                false
            }
        }
    }

    /// Snapshot the six-axis IMU
    pub async fn read_imu(&mut self, log: &dyn OpLog) -> bool {
        log.line("[read imu]: entering inspect mode");
        if !self.enter_inspect(log).await {
            log.line("[read imu]: failed to enter inspect mode");
            return false;
        }

        log.line("[read imu]: requesting imu reading");
        match self.request::<ImuReading>(Opcode::GetImuReading).await {
            Ok(reading) => {
                log.line(&format!(
                    "[read imu]: acc x: {}, y: {}, z: {}, gyro x: {}, y: {}, z: {}, timestamp: {}",
                    reading.acc_x, reading.acc_y, reading.acc_z,
                    reading.gyro_x, reading.gyro_y, reading.gyro_z,
                    reading.timestamp
                ));
                true
            }
            Err(e) => {
                log.line(&format!("[read imu]: {}", e));
                false
            }
        }
    }

    /// Snapshot the barometric altimeter
    pub async fn read_altimeter(&mut self, log: &dyn OpLog) -> bool {
        log.line("[read altimeter]: entering inspect mode");
        if !self.enter_inspect(log).await {
            log.line("[read altimeter]: failed to enter inspect mode");
            return false;
        }

        log.line("[read altimeter]: requesting altimeter reading");
        match self.request::<AltimeterReading>(Opcode::GetAltimeterReading).await {
            Ok(reading) => {
                log.line(&format!(
                    "[read altimeter]: temperature: {:.2} C, pressure: {:.2} hPa, timestamp: {}",
                    reading.temp_centi as f64 / 100.0,
                    reading.pressure_centi as f64 / 100.0,
                    reading.timestamp
                ));
                true
            }
            Err(e) => {
                log.line(&format!("[read altimeter]: {}", e));
                false
            }
        }
    }

    /// Put the boards into launch mode
    ///
    /// One-shot and irreversible on the board side. The launch
    /// acknowledgment is best-effort since the radio may already be
    /// saturated; the final transition back to normal mode is the
    /// authoritative confirmation and must succeed.
    pub async fn enter_launch(&mut self, log: &dyn OpLog) -> bool {
        log.line("[enter launch]: requesting inspect mode");
        if !self.enter_inspect(log).await {
            log.line("[enter launch]: failed to enter inspect mode");
            return false;
        }

        log.line("[enter launch]: sending command to remove all send delays");
        let _ = self.dispatch(Opcode::EnterLaunch).await;

        let launch_ack = self
            .transport
            .read_or_timeout(self.timing.read_timeout())
            .await
            .and_then(|body| decode_ack(&body));

        match launch_ack {
            Ok(ack) if ack == Opcode::EnterLaunch.byte() => {
                log.line("[enter launch]: launch mode acknowledged");
            }
            Ok(ack) => {
                log.line(&format!(
                    "[enter launch]: unexpected response 0x{:02X}, continuing",
                    ack
                ));
            }
            Err(e) => {
                log.line(&format!("[enter launch]: {}, continuing", e));
            }
        }

        log.line("[enter launch]: final transition to normal mode");
        if !self.enter_normal(log).await {
            log.line("[enter launch]: failed to enter normal mode");
            return false;
        }

        true
    }
}
