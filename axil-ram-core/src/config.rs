//! Configuration of the RAM model, and validation of the bus it is attached to.

use crate::bus::BusWidths;
use thiserror::Error;

/// Number of bits in a byte lane.
pub const BYTE_SIZE: u32 = 8;

/// Widest data bus supported, limited by the width of [`crate::bus::AxiLiteW::data`].
pub const MAX_DATA_WIDTH: u32 = u128::BITS;

/// Widest address bus supported, limited by the width of [`crate::bus::AxiLiteAw::addr`].
pub const MAX_ADDR_WIDTH: u32 = u64::BITS;

/// Number of beats each channel endpoint of the RAM model queues before stalling the bus.
pub const QUEUE_OCCUPANCY_LIMIT: usize = 2;

const_assert!(QUEUE_OCCUPANCY_LIMIT > 0);
// Every byte lane needs a strobe bit in `AxiLiteW::strb`.
const_assert!(MAX_DATA_WIDTH / BYTE_SIZE <= u16::BITS);

/// Configuration of a RAM model. The bus widths are taken from the bus itself, and the reset
/// polarity from the [`crate::reset::ResetSignal`].
#[derive(Debug, Clone)]
pub struct RamConfig {
    /// Size of the backing store in bytes. Must be at least one.
    pub size: usize,
}

impl Default for RamConfig {
    fn default() -> Self {
        Self { size: 1024 }
    }
}

/// Construction-time configuration errors. A RAM is never built from an invalid configuration.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum ConfigError {
    #[error("memory size must be at least one byte")]
    EmptyMemory,
    #[error("address width of {0} bits is not in the supported range 1..={max}", max = MAX_ADDR_WIDTH)]
    AddressWidth(u32),
    #[error("data width of {0} bits is not a whole number of bytes")]
    DataWidthNotByteAligned(u32),
    #[error("data width of {0} bits is not in the supported range 8..={max}", max = MAX_DATA_WIDTH)]
    DataWidthOutOfRange(u32),
    #[error("strobe width of {strb_width} bits does not match the {byte_lanes} byte lanes")]
    StrobeWidth { strb_width: u32, byte_lanes: usize },
}

/// Validated geometry of one side of the RAM model.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) struct Geometry {
    pub address_width: u32,
    pub data_width: u32,
    pub byte_lanes: usize,
}

impl Geometry {
    /// Checks the widths of a bus half. `write` selects whether the strobe wire is checked, since
    /// the read channels have none.
    pub fn new(widths: &BusWidths, write: bool) -> Result<Self, ConfigError> {
        if widths.addr_width == 0 || widths.addr_width > MAX_ADDR_WIDTH {
            return Err(ConfigError::AddressWidth(widths.addr_width));
        }
        if widths.data_width % BYTE_SIZE != 0 {
            return Err(ConfigError::DataWidthNotByteAligned(widths.data_width));
        }
        if widths.data_width == 0 || widths.data_width > MAX_DATA_WIDTH {
            return Err(ConfigError::DataWidthOutOfRange(widths.data_width));
        }
        let byte_lanes = (widths.data_width / BYTE_SIZE) as usize;
        if write {
            if let Some(strb_width) = widths.strb_width {
                if strb_width as usize != byte_lanes {
                    return Err(ConfigError::StrobeWidth {
                        strb_width,
                        byte_lanes,
                    });
                }
            }
        }
        Ok(Self {
            address_width: widths.addr_width,
            data_width: widths.data_width,
            byte_lanes,
        })
    }

    /// Keeps the bits of `address` an address bus of `address_width` bits can carry.
    pub fn mask(&self, address: u64) -> u64 {
        address & (u64::MAX >> (u64::BITS - self.address_width))
    }

    /// Masks `address` to the address bus, then truncates it down to the closest multiple of the
    /// data bus width in bytes.
    pub fn align(&self, address: u64) -> u64 {
        let address = self.mask(address);
        address / self.byte_lanes as u64 * self.byte_lanes as u64
    }
}
