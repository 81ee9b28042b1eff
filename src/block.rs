//! Fixed-size accumulation buffer for validated packet payloads.
//!
//! A `Block<B>` collects `B` bytes' worth of packet data (`B` is a multiple
//! of the packet size in use) before the decoder hands it to its caller as
//! one firmware-update chunk. Bytes are stored in wire order; [`Block::word`]
//! reassembles them into platform-native `u32`s from an explicit
//! little-endian byte order, so block contents are reproducible regardless
//! of host endianness.

#[derive(Debug, Clone, Copy)]
pub struct Block<const B: usize> {
    bytes: [u8; B],
    filled: usize,
}

impl<const B: usize> Block<B> {
    pub const fn new() -> Self {
        Self {
            bytes: [0; B],
            filled: 0,
        }
    }

    /// Clears the block back to empty.
    pub fn init(&mut self) {
        *self = Self::new();
    }

    /// Clears the block back to empty.
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    /// Whether the block has received `B` bytes' worth of packet data.
    pub fn full(&self) -> bool {
        self.filled >= B
    }

    pub const fn capacity(&self) -> usize {
        B
    }

    pub const fn len(&self) -> usize {
        self.filled
    }

    pub const fn is_empty(&self) -> bool {
        self.filled == 0
    }

    /// Appends a validated packet's data to the block.
    ///
    /// # Panics
    /// Panics if the packet's data would overflow the block's remaining
    /// capacity — the caller is expected to have sized `B` as an exact
    /// multiple of the packet size.
    pub fn append_packet<const P: usize>(&mut self, packet: &crate::packet::Packet<P>) {
        assert!(self.filled + P <= B, "block capacity exceeded");
        self.bytes[self.filled..self.filled + P].copy_from_slice(packet.data());
        self.filled += P;
    }

    /// The block's filled bytes, in wire order.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes[..self.filled]
    }

    /// Number of complete 32-bit words currently in the block.
    pub fn word_count(&self) -> usize {
        self.filled / 4
    }

    /// Reassembles word `i` (`0`-indexed) from 4 little-endian bytes.
    pub fn word(&self, i: usize) -> u32 {
        debug_assert!((i + 1) * 4 <= self.filled);
        let b = &self.bytes[i * 4..i * 4 + 4];
        u32::from_le_bytes([b[0], b[1], b[2], b[3]])
    }
}

impl<const B: usize> Default for Block<B> {
    fn default() -> Self {
        Self::new()
    }
}
