use std::fmt::Write;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Byte-addressable backing store of a RAM model.
///
/// All addresses wrap around modulo the size, so every address aliases into the store and no
/// access can be out of range.
///
/// Cloning yields another handle to the same bytes. This is how the write and read sides of a
/// RAM share their store. Bytes are accessed one at a time without any lock, so a read running
/// concurrently with a write to the same address may observe some bytes of the write and not
/// others. AXI4-Lite gives no atomicity guarantee across the read and write channels, so neither
/// does this store.
#[derive(Debug, Clone)]
pub struct Memory {
    data: Arc<[AtomicU8]>,
}

impl Memory {
    /// Create a new zero-initialized store holding `size` bytes.
    ///
    /// Returns `None` if `size` is zero, since nothing could be addressed.
    pub fn new(size: usize) -> Option<Self> {
        (size != 0).then(|| Self {
            data: (0..size).map(|_| AtomicU8::new(0)).collect(),
        })
    }

    /// Create a store initialized with (and sized to) `bytes`.
    ///
    /// Returns `None` if `bytes` is empty.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        (!bytes.is_empty()).then(|| Self {
            data: bytes.iter().copied().map(AtomicU8::new).collect(),
        })
    }

    /// Returns the size expressed in bytes. Guaranteed to be at least one.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns the offset within the store that `address` aliases to.
    pub fn offset(&self, address: u64) -> usize {
        // `len()` fits in a u64 on every supported target, and the remainder fits in a usize.
        (address % self.len() as u64) as usize
    }

    /// Returns `true` if `other` is a handle to the same bytes.
    pub fn shares_storage_with(&self, other: &Memory) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }

    /// Reads a single byte.
    pub fn read_byte(&self, address: u64) -> u8 {
        self.data[self.offset(address)].load(Ordering::Relaxed)
    }

    /// Writes a single byte.
    pub fn write_byte(&self, address: u64, value: u8) {
        self.data[self.offset(address)].store(value, Ordering::Relaxed)
    }

    /// Fills `buf` with the bytes starting at `address`, wrapping around at the end of the store.
    pub fn read(&self, address: u64, buf: &mut [u8]) {
        let mut offset = self.offset(address);
        for byte in buf {
            *byte = self.data[offset].load(Ordering::Relaxed);
            offset = (offset + 1) % self.len();
        }
    }

    /// Returns `len` bytes starting at `address`, wrapping around at the end of the store.
    pub fn read_vec(&self, address: u64, len: usize) -> Vec<u8> {
        let mut buf = vec![0; len];
        self.read(address, &mut buf);
        buf
    }

    /// Writes `buf` starting at `address`, wrapping around at the end of the store.
    pub fn write(&self, address: u64, buf: &[u8]) {
        let mut offset = self.offset(address);
        for byte in buf {
            self.data[offset].store(*byte, Ordering::Relaxed);
            offset = (offset + 1) % self.len();
        }
    }

    /// Formats `len` bytes starting at `address` as a hexdump, 16 bytes per line.
    ///
    /// Each line holds the address of its first byte, the bytes in hexadecimal, and the bytes
    /// as ASCII with non-printable characters replaced by `.`.
    pub fn hexdump_str(&self, address: u64, len: usize) -> String {
        let bytes = self.read_vec(address, len);
        let mut out = String::new();
        for (line, chunk) in bytes.chunks(16).enumerate() {
            let line_address = address.wrapping_add(16 * line as u64);
            let hex = hex_bytes(chunk);
            let ascii: String = chunk
                .iter()
                .map(|&b| {
                    if b.is_ascii_graphic() || b == b' ' {
                        b as char
                    } else {
                        '.'
                    }
                })
                .collect();
            // Writing to a String cannot fail.
            let _ = writeln!(out, "{line_address:08x}: {hex:<47} {ascii}");
        }
        out
    }
}

/// Formats bytes as space-separated hexadecimal pairs.
pub fn hex_bytes(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}
