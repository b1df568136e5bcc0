//! AXI4-Lite RAM model.
//!
//! [`AxiLiteRamWrite`] and [`AxiLiteRamRead`] model the two independent halves of a RAM slave.
//! [`AxiLiteRam`] combines both over a single backing store, which is what a complete AXI4-Lite
//! slave looks like.
//!
//! Each half runs its transaction processing loop as its own task. The two loops share nothing
//! but the store, which they access without synchronizing with each other; see [`Memory`] for
//! what that means for a read overlapping a write.

mod read;
mod write;

pub use read::AxiLiteRamRead;
pub use write::AxiLiteRamWrite;

use crate::bus::{AxiLiteBus, Signals};
use crate::config::{ConfigError, Geometry, RamConfig, BYTE_SIZE};
use crate::reset::ResetSignal;
use crate::resources::memory::Memory;
use log::info;
use tokio::task::JoinHandle;

/// Complete AXI4-Lite RAM, answering both reads and writes from the same store.
///
/// Both halves react to the same reset signal, each maintaining its own reset state.
#[derive(Debug)]
pub struct AxiLiteRam {
    write: AxiLiteRamWrite,
    read: AxiLiteRamRead,
    monitor: Option<JoinHandle<()>>,
}

impl AxiLiteRam {
    /// Creates a RAM of `config.size` zero-initialized bytes, attached as slave to `bus`.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a tokio runtime.
    pub fn new(
        bus: AxiLiteBus,
        reset: Option<ResetSignal>,
        config: RamConfig,
    ) -> Result<Self, ConfigError> {
        let memory = Memory::new(config.size).ok_or(ConfigError::EmptyMemory)?;
        Self::with_memory(bus, reset, memory)
    }

    /// Creates a RAM backed by `memory`, e.g. to preload it or to share it with another model.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a tokio runtime.
    pub fn with_memory(
        bus: AxiLiteBus,
        reset: Option<ResetSignal>,
        memory: Memory,
    ) -> Result<Self, ConfigError> {
        let write = AxiLiteRamWrite::with_memory(bus.write, None, memory.clone())?;
        let read = AxiLiteRamRead::with_memory(bus.read, None, memory)?;

        let monitor = reset.map(|mut signal| {
            let write_reset = write.reset_controller().clone();
            let read_reset = read.reset_controller().clone();
            tokio::spawn(async move {
                while let Some(asserted) = signal.next_asserted().await {
                    futures::join!(
                        write_reset.set_external_reset(asserted),
                        read_reset.set_external_reset(asserted),
                    );
                }
            })
        });

        Ok(Self {
            write,
            read,
            monitor,
        })
    }

    pub fn write_if(&self) -> &AxiLiteRamWrite {
        &self.write
    }

    pub fn read_if(&self) -> &AxiLiteRamRead {
        &self.read
    }

    /// The store shared by both halves, for direct (back-door) access.
    pub fn memory(&self) -> &Memory {
        self.write.memory()
    }

    /// Sets the local reset of both halves.
    pub async fn assert_reset(&self, asserted: bool) {
        futures::join!(
            self.write.assert_reset(asserted),
            self.read.assert_reset(asserted),
        );
    }

    /// Returns `true` if either half is held in reset.
    pub async fn in_reset(&self) -> bool {
        self.write.in_reset().await || self.read.in_reset().await
    }

    /// Returns `true` if both halves are processing transactions.
    pub async fn is_running(&self) -> bool {
        self.write.is_running().await && self.read.is_running().await
    }
}

impl Drop for AxiLiteRam {
    fn drop(&mut self) {
        if let Some(monitor) = self.monitor.take() {
            monitor.abort();
        }
    }
}

/// Logs the banner, configuration, and signals of a newly created RAM half.
fn log_configuration(
    name: &str,
    kind: &str,
    memory: &Memory,
    geometry: &Geometry,
    signals: &Signals,
) {
    info!("{name}: AXI lite RAM model ({kind})");
    info!("{name}: axil-ram-core version {}", env!("CARGO_PKG_VERSION"));
    info!("{name}: AXI lite RAM model configuration:");
    info!("{name}:   Memory size: {} bytes", memory.len());
    info!("{name}:   Address width: {} bits", geometry.address_width);
    info!("{name}:   Byte size: {BYTE_SIZE} bits");
    info!(
        "{name}:   Data width: {} bits ({} bytes)",
        geometry.data_width, geometry.byte_lanes
    );
    info!("{name}: AXI lite RAM model signals:");
    for (signal, width) in signals {
        match width {
            Some(width) => info!("{name}:   {signal} width: {width} bits"),
            None => info!("{name}:   {signal}: not present"),
        }
    }
}
