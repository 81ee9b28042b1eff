//! Symbol-filled, Hamming-corrected, CRC-validated packet buffer.
//!
//! A `Packet<P>` is filled two bits at a time by [`Packet::write_symbol`] —
//! the demodulator's native output unit — in the wire order `data (P
//! bytes) || crc32 (4 bytes, big-endian) || hamming parity (2 bytes,
//! little-endian)`. Each byte is assembled most-significant-symbol-first
//! (the first symbol written becomes a byte's top two bits), matching the
//! order [`crate::demodulator::Demodulator`] emits symbols in.
//!
//! Once full, the packet runs Hamming correction over `data || crc`
//! (exactly the span the parity trailer was computed over) before checking
//! the CRC, so a single flipped bit anywhere in the payload or its checksum
//! is transparently repaired before validity is judged.

use crate::consts::{CRC_LEN, HAMMING_LEN};
use crate::crc::Crc32;
use crate::error_correction::HammingDecoder;

#[derive(Debug, Clone, Copy)]
pub struct Packet<const P: usize> {
    data: [u8; P],
    crc_bytes: [u8; CRC_LEN],
    parity_bytes: [u8; HAMMING_LEN],
    written: usize,
    seed: u32,
    calculated_crc: u32,
    valid: bool,
}

impl<const P: usize> Packet<P> {
    const TOTAL_BYTES: usize = P + CRC_LEN + HAMMING_LEN;
    const TOTAL_SYMBOLS: usize = Self::TOTAL_BYTES * 4;

    pub const fn new() -> Self {
        Self {
            data: [0; P],
            crc_bytes: [0; CRC_LEN],
            parity_bytes: [0; HAMMING_LEN],
            written: 0,
            seed: 0,
            calculated_crc: 0,
            valid: false,
        }
    }

    /// Resets the packet and sets the CRC seed used once it fills.
    pub fn init(&mut self, seed: u32) {
        *self = Self::new();
        self.seed = seed;
    }

    /// Clears the packet's contents, keeping the current CRC seed.
    pub fn reset(&mut self) {
        let seed = self.seed;
        *self = Self::new();
        self.seed = seed;
    }

    /// Whether all symbols for this packet size have been written.
    pub fn full(&self) -> bool {
        self.written >= Self::TOTAL_SYMBOLS
    }

    /// Valid only once `full()`; `false` while filling.
    pub fn valid(&self) -> bool {
        self.full() && self.valid
    }

    /// The CRC-32 computed from this packet's (Hamming-corrected) data,
    /// valid only once `full()`.
    pub fn calculated_crc(&self) -> u32 {
        self.calculated_crc
    }

    pub fn data(&self) -> &[u8; P] {
        &self.data
    }

    /// Writes one 2-bit symbol. Symbols beyond `TOTAL_SYMBOLS` are ignored.
    /// Running Hamming correction and CRC validation happens automatically
    /// on the symbol that completes the packet.
    pub fn write_symbol(&mut self, symbol: u8) {
        if self.full() {
            return;
        }

        let byte_index = self.written / 4;
        let sub = self.written % 4;
        let shift = 6 - 2 * sub;
        let bits = (symbol & 0x3) << shift;

        match Self::locate(byte_index) {
            Region::Data(i) => self.data[i] |= bits,
            Region::Crc(i) => self.crc_bytes[i] |= bits,
            Region::Parity(i) => self.parity_bytes[i] |= bits,
        }

        self.written += 1;

        if self.full() {
            self.finalize();
        }
    }

    fn locate(byte_index: usize) -> Region {
        if byte_index < P {
            Region::Data(byte_index)
        } else if byte_index < P + CRC_LEN {
            Region::Crc(byte_index - P)
        } else {
            Region::Parity(byte_index - P - CRC_LEN)
        }
    }

    fn finalize(&mut self) {
        let received_parity =
            self.parity_bytes[0] as u32 | (self.parity_bytes[1] as u32) << 8;

        let mut decoder = HammingDecoder::new();
        decoder.init(received_parity);
        decoder.process_parts(&mut [&mut self.data, &mut self.crc_bytes]);

        let mut crc = Crc32::new(self.seed);
        crc.update_all(&self.data);
        self.calculated_crc = crc.value();

        // Wire format mandates the CRC trailer big-endian.
        let received_crc = u32::from_be_bytes(self.crc_bytes);
        self.valid = self.calculated_crc == received_crc;
    }
}

impl<const P: usize> Default for Packet<P> {
    fn default() -> Self {
        Self::new()
    }
}

enum Region {
    Data(usize),
    Crc(usize),
    Parity(usize),
}
