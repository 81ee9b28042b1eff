//! Single-bit Hamming parity over an arbitrary-length byte buffer.
//!
//! Parity bit numbers are assigned in stream order but skip every power of
//! two (`1, 2, 4, 8, ...`): those numbers are reserved so a corrupted parity
//! word (which XORs in a single power-of-two bit) can never be mistaken for
//! a corrupted data bit. [`HammingEncoder::encode`] XORs the running bit
//! number into the parity accumulator for every set data bit;
//! [`HammingDecoder::process`] recomputes that same accumulator over the
//! received data and XORs it against the received parity — a nonzero
//! syndrome that matches some data bit's assigned number identifies exactly
//! which bit to flip, and a syndrome that is itself a power of two (i.e. the
//! parity word was corrupted, not the data) is left alone.

#[derive(Debug, Clone, Copy)]
pub struct HammingEncoder {
    parity: u32,
    bit_num: u32,
}

impl HammingEncoder {
    pub const fn new() -> Self {
        Self {
            parity: 0,
            bit_num: 1,
        }
    }

    pub fn parity(&self) -> u32 {
        self.parity
    }

    fn next_data_bit_num(bit_num: &mut u32) -> u32 {
        while *bit_num & (*bit_num - 1) == 0 {
            *bit_num += 1;
        }
        let assigned = *bit_num;
        *bit_num += 1;
        assigned
    }

    /// Encodes `bytes`, continuing the bit-number sequence across calls so a
    /// caller can feed a packet's data and its CRC trailer as two separate
    /// slices and still get one parity word over the concatenation.
    pub fn encode(&mut self, bytes: &[u8]) -> u32 {
        for i in 0..(bytes.len() * 8) {
            let bit_num = Self::next_data_bit_num(&mut self.bit_num);
            if bytes[i / 8] & (1 << (i % 8)) != 0 {
                self.parity ^= bit_num;
            }
        }
        self.parity
    }
}

impl Default for HammingEncoder {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct HammingDecoder {
    parity: u32,
}

impl HammingDecoder {
    pub const fn new() -> Self {
        Self { parity: 0 }
    }

    pub fn init(&mut self, parity: u32) {
        self.parity = parity;
    }

    /// Recomputes parity over `bytes` and flips the single bit whose
    /// assigned number matches the syndrome, if any. Leaves `bytes`
    /// untouched when the syndrome is zero (no error) or is itself a power
    /// of two (the parity word was the thing corrupted, not the data).
    pub fn process(&mut self, bytes: &mut [u8]) {
        self.process_parts(&mut [bytes]);
    }

    /// Same correction as [`HammingDecoder::process`], but over several
    /// byte slices treated as one logically concatenated buffer — used to
    /// correct a packet's data and CRC trailer, which are encoded together
    /// but stored as separate fields.
    pub fn process_parts(&mut self, parts: &mut [&mut [u8]]) {
        let mut encoder = HammingEncoder::new();
        for part in parts.iter() {
            let _ = encoder.encode(part);
        }
        let syndrome = encoder.parity() ^ self.parity;

        if syndrome == 0 {
            return;
        }

        let mut bit_num: u32 = 1;
        for part in parts.iter_mut() {
            for i in 0..(part.len() * 8) {
                let assigned = HammingEncoder::next_data_bit_num(&mut bit_num);
                if assigned == syndrome {
                    part[i / 8] ^= 1 << (i % 8);
                    return;
                }
            }
        }
    }
}

impl Default for HammingDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lcg_bytes(seed: u32, len: usize) -> Vec<u8> {
        let mut state = seed;
        (0..len)
            .map(|_| {
                state = state.wrapping_mul(48271).wrapping_add(1);
                (state >> 16) as u8
            })
            .collect()
    }

    fn lengths() -> [usize; 9] {
        [1, 2, 3, 4, 10, 16, 50, 100, 256]
    }

    #[test]
    fn decode_with_no_error_is_a_no_op() {
        for len in lengths() {
            let expected = lcg_bytes(0, len);
            let parity = HammingEncoder::new().encode(&expected);

            let mut data = expected.clone();
            let mut decoder = HammingDecoder::new();
            decoder.init(parity);
            decoder.process(&mut data);

            assert_eq!(data, expected, "len = {len}");
        }
    }

    #[test]
    fn decode_corrects_every_single_bit_data_error() {
        for len in lengths() {
            let expected = lcg_bytes(0, len);
            let parity = HammingEncoder::new().encode(&expected);

            for bit in 0..(len * 8) {
                let mut bad = expected.clone();
                bad[bit / 8] ^= 1 << (bit % 8);
                assert_ne!(bad, expected);

                let mut decoder = HammingDecoder::new();
                decoder.init(parity);
                decoder.process(&mut bad);

                assert_eq!(bad, expected, "len = {len}, bit = {bit}");
            }
        }
    }

    #[test]
    fn process_parts_corrects_a_bit_in_the_second_slice() {
        let data = lcg_bytes(2, 8);
        let mut trailer = lcg_bytes(3, 4);

        let mut encoder = HammingEncoder::new();
        let _ = encoder.encode(&data);
        let parity = encoder.encode(&trailer);

        let expected_trailer = trailer.clone();
        trailer[1] ^= 0x04;

        let mut decoder = HammingDecoder::new();
        decoder.init(parity);
        let mut data_mut = data.clone();
        decoder.process_parts(&mut [&mut data_mut, &mut trailer]);

        assert_eq!(data_mut, data);
        assert_eq!(trailer, expected_trailer);
    }

    #[test]
    fn decode_ignores_a_corrupted_parity_word() {
        for len in [1usize, 16, 100] {
            let expected = lcg_bytes(1, len);
            let parity = HammingEncoder::new().encode(&expected);

            for i in 0..32u32 {
                let bad_parity = parity ^ (1 << i);
                let mut data = expected.clone();

                let mut decoder = HammingDecoder::new();
                decoder.init(bad_parity);
                decoder.process(&mut data);

                assert_eq!(data, expected, "len = {len}, bit = {i}");
            }
        }
    }
}
