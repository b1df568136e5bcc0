use super::log_configuration;
use crate::bus::{AxiLiteAr, AxiLiteR, AxiLiteReadBus, AxiResp};
use crate::channel::{Sink, Source};
use crate::config::{ConfigError, Geometry, RamConfig, QUEUE_OCCUPANCY_LIMIT};
use crate::reset::{Process, Reset, ResetSignal};
use crate::resources::memory::{hex_bytes, Memory};
use log::debug;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Read side of an AXI4-Lite RAM: answers every AR beat with one R beat, in order.
#[derive(Debug)]
pub struct AxiLiteRamRead {
    bus: AxiLiteReadBus,
    reset: Arc<Reset<ReadEngine>>,
    monitor: Option<JoinHandle<()>>,
}

impl AxiLiteRamRead {
    /// Creates the read side of a RAM of `config.size` zero-initialized bytes, attached as slave
    /// to `bus`.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a tokio runtime.
    pub fn new(
        bus: AxiLiteReadBus,
        reset: Option<ResetSignal>,
        config: RamConfig,
    ) -> Result<Self, ConfigError> {
        let memory = Memory::new(config.size).ok_or(ConfigError::EmptyMemory)?;
        Self::with_memory(bus, reset, memory)
    }

    /// Creates the read side of a RAM reading from `memory`.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a tokio runtime.
    pub fn with_memory(
        bus: AxiLiteReadBus,
        reset: Option<ResetSignal>,
        memory: Memory,
    ) -> Result<Self, ConfigError> {
        let geometry = Geometry::new(&bus.widths, false)?;
        let name = format!("axil_ram.{}", bus.ar.name());

        log_configuration(&name, "read", &memory, &geometry, &bus.signals());

        let engine = ReadEngine {
            name: name.clone().into(),
            ar: Sink::new(bus.ar.clone(), QUEUE_OCCUPANCY_LIMIT),
            r: Source::new(bus.r.clone(), QUEUE_OCCUPANCY_LIMIT),
            memory,
            geometry,
        };
        let reset_controller = Arc::new(Reset::new(name, engine));
        let monitor = reset.map(|signal| reset_controller.monitor(signal));

        Ok(Self {
            bus,
            reset: reset_controller,
            monitor,
        })
    }

    pub fn bus(&self) -> &AxiLiteReadBus {
        &self.bus
    }

    pub fn memory(&self) -> &Memory {
        &self.reset.process().memory
    }

    /// Number of bytes transferred per beat.
    pub fn byte_lanes(&self) -> usize {
        self.reset.process().geometry.byte_lanes
    }

    /// Sets the local reset. See [`Reset::assert_reset`].
    pub async fn assert_reset(&self, asserted: bool) {
        self.reset.assert_reset(asserted).await
    }

    pub async fn in_reset(&self) -> bool {
        self.reset.in_reset().await
    }

    pub async fn is_running(&self) -> bool {
        self.reset.is_running().await
    }

    pub(super) fn reset_controller(&self) -> &Arc<Reset<ReadEngine>> {
        &self.reset
    }
}

impl Drop for AxiLiteRamRead {
    fn drop(&mut self) {
        if let Some(monitor) = self.monitor.take() {
            monitor.abort();
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ReadEngine {
    name: Arc<str>,
    ar: Sink<AxiLiteAr>,
    r: Source<AxiLiteR>,
    memory: Memory,
    geometry: Geometry,
}

impl ReadEngine {
    async fn run(self) {
        loop {
            self.process_read().await;
        }
    }

    /// Processes a single read transaction.
    async fn process_read(&self) {
        let ar = self.ar.recv().await;
        let address = self.geometry.align(ar.addr);

        let mut data = [0; 16];
        let data_lanes = &mut data[..self.geometry.byte_lanes];
        self.memory.read(address, data_lanes);
        let bytes = hex_bytes(data_lanes);

        self.r
            .send(AxiLiteR {
                data: u128::from_le_bytes(data),
                resp: AxiResp::Okay,
            })
            .await;

        debug!(
            "{}: read data araddr: {:#010x} arprot: {} data: {}",
            self.name, address, ar.prot, bytes,
        );
    }
}

impl Process for ReadEngine {
    fn start(&self) -> JoinHandle<()> {
        tokio::spawn(self.clone().run())
    }

    fn hold(&self, held: bool) {
        self.ar.hold(held);
    }

    fn clear(&self) {
        self.ar.clear();
        self.r.clear();
    }
}
