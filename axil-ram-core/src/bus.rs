//! Beats and channel bundles of the AXI4-Lite bus, without the wire-level details.
//!
//! Every AXI4-Lite channel transfers one *beat* per handshake. The five channels of an interface
//! are grouped into a write half ([`AxiLiteWriteBus`]: AW, W, B) and a read half
//! ([`AxiLiteReadBus`]: AR, R), and both halves together form an [`AxiLiteBus`].
//!
//! Optional wires (`awprot`/`arprot`, `wstrb`) are resolved when a beat is constructed: a master
//! that does not drive them passes `None`, and the beat stores the protocol default instead. The
//! transaction engines never see an absent field.

use crate::channel::Channel;
use bitvec::order::Lsb0;
use bitvec::view::BitView;
use std::fmt;

/// Protection attributes carried by the address channels (`AxPROT`).
///
/// These are passed through for logging only; no access is ever refused based on them.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct AxiProt(u8);

impl AxiProt {
    /// Privileged access (`AxPROT[0]`).
    pub const PRIVILEGED: Self = Self(0b001);
    /// Non-secure access (`AxPROT[1]`). This is the value assumed when the wire is absent.
    pub const NONSECURE: Self = Self(0b010);
    /// Instruction access (`AxPROT[2]`).
    pub const INSTRUCTION: Self = Self(0b100);

    /// Creates protection attributes from the 3-bit wire value. Higher bits are discarded.
    pub fn from_bits(bits: u8) -> Self {
        Self(bits & 0b111)
    }

    /// Returns the 3-bit wire value.
    pub fn bits(self) -> u8 {
        self.0
    }

    /// Returns `true` if all attributes set in `other` are also set in `self`.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for AxiProt {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Display for AxiProt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [&str; 3] = ["PRIVILEGED", "NONSECURE", "INSTRUCTION"];

        if self.0 == 0 {
            return f.write_str("0");
        }
        let mut first = true;
        for (name, set) in NAMES.iter().zip(self.0.view_bits::<Lsb0>()) {
            if *set {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Response status carried by the B and R channels (`xRESP`).
///
/// This model only ever produces [`AxiResp::Okay`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum AxiResp {
    #[default]
    Okay = 0b00,
    Exokay = 0b01,
    Slverr = 0b10,
    Decerr = 0b11,
}

impl fmt::Display for AxiResp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match *self {
            AxiResp::Okay => "OKAY",
            AxiResp::Exokay => "EXOKAY",
            AxiResp::Slverr => "SLVERR",
            AxiResp::Decerr => "DECERR",
        })
    }
}

macro_rules! address_beat {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
        pub struct $name {
            /// Byte address as driven by the master. Not necessarily aligned.
            pub addr: u64,
            /// Protection attributes, [`AxiProt::NONSECURE`] if the master did not drive them.
            pub prot: AxiProt,
        }

        impl $name {
            /// Creates a beat for `addr`, substituting [`AxiProt::NONSECURE`] if `prot` is absent.
            pub fn new(addr: u64, prot: Option<AxiProt>) -> Self {
                Self {
                    addr,
                    prot: prot.unwrap_or(AxiProt::NONSECURE),
                }
            }
        }
    };
}

address_beat!(
    /// Beat of the write address (AW) channel.
    AxiLiteAw
);

address_beat!(
    /// Beat of the read address (AR) channel.
    AxiLiteAr
);

/// Beat of the write data (W) channel.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct AxiLiteW {
    /// Write data, least significant byte on byte lane 0.
    pub data: u128,
    /// Byte strobes, bit `i` enables byte lane `i`.
    pub strb: u16,
}

impl AxiLiteW {
    /// Strobe value enabling every byte lane, whatever the data width.
    pub const STRB_ALL: u16 = u16::MAX;

    /// Creates a beat for `data`, enabling all byte lanes if `strb` is absent.
    pub fn new(data: u128, strb: Option<u16>) -> Self {
        Self {
            data,
            strb: strb.unwrap_or(Self::STRB_ALL),
        }
    }
}

/// Beat of the write response (B) channel.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct AxiLiteB {
    pub resp: AxiResp,
}

/// Beat of the read data (R) channel.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct AxiLiteR {
    /// Read data, least significant byte on byte lane 0.
    pub data: u128,
    pub resp: AxiResp,
}

/// Widths of the wires of an AXI4-Lite interface, as seen by the slave.
///
/// `strb_width` is `None` if the interface has no `wstrb` wire, and `prot` is `false` if it has no
/// `awprot`/`arprot` wires. Widths are not validated here; see [`crate::config`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct BusWidths {
    pub addr_width: u32,
    pub data_width: u32,
    pub strb_width: Option<u32>,
    pub prot: bool,
}

impl BusWidths {
    /// Creates the widths of a fully connected interface, with one strobe bit per data byte.
    pub fn new(addr_width: u32, data_width: u32) -> Self {
        Self {
            addr_width,
            data_width,
            strb_width: Some(data_width / 8),
            prot: true,
        }
    }

    /// Removes the `wstrb` wire.
    pub fn without_strb(self) -> Self {
        Self {
            strb_width: None,
            ..self
        }
    }

    /// Overrides the width of the `wstrb` wire.
    pub fn with_strb_width(self, strb_width: u32) -> Self {
        Self {
            strb_width: Some(strb_width),
            ..self
        }
    }

    /// Removes the `awprot`/`arprot` wires.
    pub fn without_prot(self) -> Self {
        Self {
            prot: false,
            ..self
        }
    }

    fn prot_width(&self) -> Option<u32> {
        self.prot.then_some(3)
    }
}

/// The (slave-side) list of signals of a bus half, with their width or `None` if not present.
pub type Signals = Vec<(&'static str, Option<u32>)>;

/// Write half of an AXI4-Lite interface.
///
/// Cloning yields another handle to the same channels, which is how a master and a slave get
/// connected.
#[derive(Debug, Clone)]
pub struct AxiLiteWriteBus {
    pub aw: Channel<AxiLiteAw>,
    pub w: Channel<AxiLiteW>,
    pub b: Channel<AxiLiteB>,
    pub widths: BusWidths,
}

impl AxiLiteWriteBus {
    pub fn new(widths: BusWidths) -> Self {
        Self {
            aw: Channel::new("aw"),
            w: Channel::new("w"),
            b: Channel::new("b"),
            widths,
        }
    }

    pub fn signals(&self) -> Signals {
        vec![
            ("awaddr", Some(self.widths.addr_width)),
            ("awprot", self.widths.prot_width()),
            ("wdata", Some(self.widths.data_width)),
            ("wstrb", self.widths.strb_width),
            ("bresp", Some(2)),
        ]
    }
}

/// Read half of an AXI4-Lite interface.
#[derive(Debug, Clone)]
pub struct AxiLiteReadBus {
    pub ar: Channel<AxiLiteAr>,
    pub r: Channel<AxiLiteR>,
    pub widths: BusWidths,
}

impl AxiLiteReadBus {
    pub fn new(widths: BusWidths) -> Self {
        Self {
            ar: Channel::new("ar"),
            r: Channel::new("r"),
            widths,
        }
    }

    pub fn signals(&self) -> Signals {
        vec![
            ("araddr", Some(self.widths.addr_width)),
            ("arprot", self.widths.prot_width()),
            ("rdata", Some(self.widths.data_width)),
            ("rresp", Some(2)),
        ]
    }
}

/// A complete AXI4-Lite interface.
#[derive(Debug, Clone)]
pub struct AxiLiteBus {
    pub write: AxiLiteWriteBus,
    pub read: AxiLiteReadBus,
}

impl AxiLiteBus {
    pub fn new(widths: BusWidths) -> Self {
        Self {
            write: AxiLiteWriteBus::new(widths),
            read: AxiLiteReadBus::new(widths),
        }
    }
}
