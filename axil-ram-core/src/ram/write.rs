use super::log_configuration;
use crate::bus::{AxiLiteAw, AxiLiteB, AxiLiteW, AxiLiteWriteBus, AxiResp};
use crate::channel::{Sink, Source};
use crate::config::{ConfigError, Geometry, RamConfig, QUEUE_OCCUPANCY_LIMIT};
use crate::reset::{Process, Reset, ResetSignal};
use crate::resources::memory::{hex_bytes, Memory};
use bitvec::order::Lsb0;
use bitvec::view::BitView;
use log::debug;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Write side of an AXI4-Lite RAM: answers AW/W beat pairs with B beats.
///
/// Each AW beat is paired with the W beat that arrived in the same position, i.e. the n-th
/// address goes with the n-th data beat. The address is truncated to the data bus width, the
/// byte lanes enabled by the strobes are stored, and an OKAY response is sent once the store has
/// been updated. Disabled byte lanes leave the store untouched.
#[derive(Debug)]
pub struct AxiLiteRamWrite {
    bus: AxiLiteWriteBus,
    reset: Arc<Reset<WriteEngine>>,
    monitor: Option<JoinHandle<()>>,
}

impl AxiLiteRamWrite {
    /// Creates the write side of a RAM of `config.size` zero-initialized bytes, attached as slave
    /// to `bus`.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a tokio runtime.
    pub fn new(
        bus: AxiLiteWriteBus,
        reset: Option<ResetSignal>,
        config: RamConfig,
    ) -> Result<Self, ConfigError> {
        let memory = Memory::new(config.size).ok_or(ConfigError::EmptyMemory)?;
        Self::with_memory(bus, reset, memory)
    }

    /// Creates the write side of a RAM storing into `memory`.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a tokio runtime.
    pub fn with_memory(
        bus: AxiLiteWriteBus,
        reset: Option<ResetSignal>,
        memory: Memory,
    ) -> Result<Self, ConfigError> {
        let geometry = Geometry::new(&bus.widths, true)?;
        let name = format!("axil_ram.{}", bus.aw.name());

        log_configuration(&name, "write", &memory, &geometry, &bus.signals());

        let engine = WriteEngine {
            name: name.clone().into(),
            aw: Sink::new(bus.aw.clone(), QUEUE_OCCUPANCY_LIMIT),
            w: Sink::new(bus.w.clone(), QUEUE_OCCUPANCY_LIMIT),
            b: Source::new(bus.b.clone(), QUEUE_OCCUPANCY_LIMIT),
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

    pub fn bus(&self) -> &AxiLiteWriteBus {
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

    pub(super) fn reset_controller(&self) -> &Arc<Reset<WriteEngine>> {
        &self.reset
    }
}

impl Drop for AxiLiteRamWrite {
    fn drop(&mut self) {
        if let Some(monitor) = self.monitor.take() {
            monitor.abort();
        }
    }
}

/// The write transaction processing loop, and everything it needs.
#[derive(Debug, Clone)]
pub(crate) struct WriteEngine {
    name: Arc<str>,
    aw: Sink<AxiLiteAw>,
    w: Sink<AxiLiteW>,
    b: Source<AxiLiteB>,
    memory: Memory,
    geometry: Geometry,
}

impl WriteEngine {
    async fn run(self) {
        loop {
            self.process_write().await;
        }
    }

    /// Processes a single write transaction.
    async fn process_write(&self) {
        let aw = self.aw.recv().await;
        let address = self.geometry.align(aw.addr);

        let w = self.w.recv().await;

        let lanes = self.geometry.byte_lanes;
        let data = w.data.to_le_bytes();
        let data = &data[..lanes];
        let strb = u32::from(w.strb) & ((1 << lanes) - 1);

        debug!(
            "{}: write data awaddr: {:#010x} awprot: {} wstrb: {:#04x} data: {}",
            self.name,
            address,
            aw.prot,
            strb,
            hex_bytes(data),
        );

        let offset = self.memory.offset(address);
        for (i, (&byte, enabled)) in data
            .iter()
            .zip(w.strb.view_bits::<Lsb0>().iter().by_vals())
            .enumerate()
        {
            // A disabled lane is skipped, not zeroed.
            if enabled {
                self.memory.write_byte((offset + i) as u64, byte);
            }
        }

        self.b.send(AxiLiteB { resp: AxiResp::Okay }).await;
    }
}

impl Process for WriteEngine {
    fn start(&self) -> JoinHandle<()> {
        tokio::spawn(self.clone().run())
    }

    fn hold(&self, held: bool) {
        self.aw.hold(held);
        self.w.hold(held);
    }

    fn clear(&self) {
        self.aw.clear();
        self.w.clear();
        self.b.clear();
    }
}
