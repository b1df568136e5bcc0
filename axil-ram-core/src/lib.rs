//! Functional model of an AXI4-Lite RAM slave.
//!
//! The model answers the transactions a master issues on an [`AxiLiteBus`] from a byte-addressable
//! [`Memory`]. It enforces the handshake back-pressure of the five channels, byte-lane masking of
//! narrow writes, address wrapping into the store, and reset: asserting reset abandons any
//! transaction in flight and flushes all channels.
//!
//! ```
//! use axil_ram_core::{AxiLiteAr, AxiLiteAw, AxiLiteBus, AxiLiteRam, AxiLiteW, BusWidths, RamConfig};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let bus = AxiLiteBus::new(BusWidths::new(32, 32));
//! let ram = AxiLiteRam::new(bus.clone(), None, RamConfig::default()).unwrap();
//!
//! bus.write.aw.send(AxiLiteAw::new(0x10, None)).await;
//! bus.write.w.send(AxiLiteW::new(0xAABBCCDD, Some(0b0011))).await;
//! bus.write.b.recv().await;
//!
//! bus.read.ar.send(AxiLiteAr::new(0x10, None)).await;
//! assert_eq!(0xCCDD, bus.read.r.recv().await.data);
//! assert_eq!(vec![0xDD, 0xCC, 0x00, 0x00], ram.memory().read_vec(0x10, 4));
//! # });
//! ```

#[macro_use]
extern crate static_assertions;

pub mod bus;
pub mod channel;
pub mod config;
pub mod ram;
pub mod reset;
pub mod resources;

pub use bus::{
    AxiLiteAr, AxiLiteAw, AxiLiteB, AxiLiteBus, AxiLiteR, AxiLiteReadBus, AxiLiteW,
    AxiLiteWriteBus, AxiProt, AxiResp, BusWidths,
};
pub use channel::Channel;
pub use config::{ConfigError, RamConfig};
pub use ram::{AxiLiteRam, AxiLiteRamRead, AxiLiteRamWrite};
pub use reset::ResetSignal;
pub use resources::memory::Memory;
