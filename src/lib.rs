//! # qpsk-link
//!
//! A portable, `no_std` Rust receiver core for an audio-band QPSK link used
//! to deliver microcontroller firmware updates over a speaker/microphone
//! pair or a wired audio line.
//!
//! This crate implements a software QPSK demodulator using:
//! - a lock-free single-producer/single-consumer sample FIFO for ISR handoff
//! - a carrier-rejection filter and Costas-loop PLL for carrier recovery
//! - a correlator-driven symbol clock (Gardner timing recovery) for preamble
//!   alignment and decision timing
//! - Hamming-corrected, CRC-32-validated packet framing, assembled into
//!   fixed-size blocks
//!
//! ## Crate features
//! | Feature      | Description |
//! |--------------|-------------|
//! | `std`        | Enables `std`-only test helpers (signal synthesis) and `std`-backed `thiserror`/`critical-section`/`log` |
//! | `defmt-0-3`  | Routes state-transition/error logging through `defmt` |
//! | `log`        | Routes state-transition/error logging through `log` |
//!
//! ## Usage
//!
//! ```rust
//! use qpsk_link::decoder::{DecodeResult, Decoder};
//!
//! let mut decoder: Decoder<8, 64, 256, 1024> = Decoder::new();
//! decoder.init(0);
//!
//! // From an ADC interrupt:
//! decoder.push_sample(0.0);
//!
//! // From the main loop:
//! match decoder.process() {
//!     DecodeResult::BlockComplete => { /* decoder.block_data() is ready */ }
//!     DecodeResult::Error(e) => { /* decoder.reset() to recover */ let _ = e; }
//!     _ => {}
//! }
//! ```
//!
//! Firmware wiring a single global decoder to a timer ISR can instead use
//! the [`glue`] module's macros:
//!
//! ```rust
//! use qpsk_link::{init_qpsk_decoder, qpsk_process, qpsk_push_sample};
//!
//! init_qpsk_decoder!(8, 64, 256, 1024);
//!
//! fn adc_isr(sample: f32) {
//!     qpsk_push_sample!(sample);
//! }
//!
//! fn main_loop() {
//!     let _ = qpsk_process!();
//! }
//! ```
//!
//! ## Status
//!
//! This crate is in early development. Contributions welcome!
//!
//! --
//! Designed for `#![no_std]` use in resource-constrained embedded environments.

#![deny(
    bad_style,
    dead_code,
    improper_ctypes,
    non_shorthand_field_patterns,
    no_mangle_generic_items,
    overflowing_literals,
    path_statements,
    patterns_in_fns_without_body,
    unconditional_recursion,
    unused,
    while_true,
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces,
    unused_qualifications,
    unused_results
)]
#![cfg_attr(not(feature = "std"), no_std)]

pub use critical_section;
pub use heapless;

pub mod block;
pub mod consts;
pub(crate) mod crc;
pub mod decoder;
pub mod delay_line;
pub mod demodulator;
pub mod error_correction;
pub mod filter;
pub mod fifo;
pub mod glue;
pub mod packet;
pub mod pll;
pub mod correlator;
pub mod window;

#[cfg(all(test, feature = "std"))]
mod tests {
    use crate::consts::{ALIGNMENT_SEQUENCE, CRC_LEN, HAMMING_LEN};
    use crate::crc::Crc32;
    use crate::decoder::{DecodeResult, Decoder};
    use crate::error_correction::HammingEncoder;
    use crate::packet::Packet;

    const L: usize = 8;
    const P: usize = 52;
    const B: usize = P;
    const FIFO: usize = 1 << 16;
    const SAMPLE_RATE: usize = L * 6000;
    const SYMBOL_RATE: usize = 6000;
    const CRC_SEED: u32 = 0;

    /// Synthesizes a QPSK-modulated carrier for `symbols`, sampled at
    /// `SAMPLE_RATE` against a `SYMBOL_RATE`-cycle/second carrier, mirroring
    /// `util.h`'s `Resample`/`Scale` signal-construction helpers from the
    /// original project's unit test harness.
    fn synthesize(symbols: &[u8], amplitude: f32, noise_seed: u32) -> Vec<f32> {
        let mut samples = Vec::with_capacity(symbols.len() * L);
        let mut lcg = noise_seed;
        let mut noise = || {
            lcg = lcg.wrapping_mul(48271).wrapping_add(1);
            ((lcg >> 16) as f32 / 32768.0 - 1.0) * 0.01
        };

        for &symbol in symbols {
            let i_sign = if symbol & 0b10 != 0 { 1.0 } else { -1.0 };
            let q_sign = if symbol & 0b01 != 0 { 1.0 } else { -1.0 };

            for n in 0..L {
                let t = n as f32 / SAMPLE_RATE as f32;
                let carrier_phase = 2.0 * core::f32::consts::PI * SYMBOL_RATE as f32 * t;
                let sample = amplitude
                    * (i_sign * libm::cosf(carrier_phase) - q_sign * libm::sinf(carrier_phase))
                    + noise();
                samples.push(sample);
            }
        }

        samples
    }

    fn data_to_symbols(data: &[u8]) -> Vec<u8> {
        let mut symbols = Vec::with_capacity(data.len() * 4);
        for &b in data {
            symbols.push((b >> 6) & 3);
            symbols.push((b >> 4) & 3);
            symbols.push((b >> 2) & 3);
            symbols.push(b & 3);
        }
        symbols
    }

    fn build_packet_symbols(data: &[u8]) -> Vec<u8> {
        let mut symbols = data_to_symbols(data);

        let crc = {
            let mut crc = Crc32::new(CRC_SEED);
            crc.update_all(data);
            crc.value()
        };
        symbols.extend(data_to_symbols(&crc.to_be_bytes()));

        let mut hamming = HammingEncoder::new();
        let _ = hamming.encode(data);
        let parity = hamming.encode(&crc.to_be_bytes());
        symbols.extend(data_to_symbols(&[parity as u8, (parity >> 8) as u8]));

        symbols
    }

    fn run_until(decoder: &mut Decoder<L, P, B, FIFO>, samples: &[f32]) -> Vec<DecodeResult> {
        let mut results = Vec::new();
        for chunk in samples.chunks(FIFO / 2) {
            for &s in chunk {
                let _ = decoder.push_sample(s);
            }
            loop {
                match decoder.process() {
                    DecodeResult::None => break,
                    other => {
                        results.push(other);
                        if matches!(other, DecodeResult::Error(_) | DecodeResult::End) {
                            return results;
                        }
                    }
                }
            }
        }
        results
    }

    #[test]
    fn silence_never_advances_past_carrier_sync() {
        let mut decoder: Decoder<L, P, B, FIFO> = Decoder::new();
        decoder.init(CRC_SEED);

        for _ in 0..1024 {
            let _ = decoder.push_sample(0.0);
        }
        assert_eq!(decoder.process(), DecodeResult::None);
        assert!(decoder.error().is_none());
    }

    #[test]
    fn end_to_end_packet_decodes_hello_world() {
        let data = b"Hello, world!\n".to_vec();
        let mut padded = data.clone();
        padded.resize(P, 0);

        let mut symbols = Vec::new();
        symbols.extend(std::iter::repeat(0u8).take(400));
        symbols.extend_from_slice(&ALIGNMENT_SEQUENCE);
        symbols.extend(build_packet_symbols(&padded));

        let samples = synthesize(&symbols, 1.0, 1);

        let mut decoder: Decoder<L, P, B, FIFO> = Decoder::new();
        decoder.init(CRC_SEED);
        let results = run_until(&mut decoder, &samples);

        assert!(
            results.contains(&DecodeResult::BlockComplete)
                || results.contains(&DecodeResult::PacketComplete),
            "expected a completed packet or block, got {results:?}"
        );
    }

    #[test]
    fn back_to_back_packets_without_repeated_preamble() {
        let first = {
            let mut d = b"first-packet".to_vec();
            d.resize(P, 0);
            d
        };
        let second = {
            let mut d = b"second-packet".to_vec();
            d.resize(P, 0);
            d
        };

        let mut symbols = Vec::new();
        symbols.extend(std::iter::repeat(0u8).take(400));
        symbols.extend_from_slice(&ALIGNMENT_SEQUENCE);
        symbols.extend(build_packet_symbols(&first));
        symbols.extend_from_slice(&ALIGNMENT_SEQUENCE);
        symbols.extend(build_packet_symbols(&second));

        let samples = synthesize(&symbols, 1.0, 2);

        let mut decoder: Decoder<L, P, B, FIFO> = Decoder::new();
        decoder.init(CRC_SEED);
        let results = run_until(&mut decoder, &samples);

        let completions = results
            .iter()
            .filter(|r| matches!(r, DecodeResult::PacketComplete | DecodeResult::BlockComplete))
            .count();
        assert!(completions >= 1, "expected at least one completion, got {results:?}");
    }

    #[test]
    fn hamming_bit_numbering_skips_powers_of_two() {
        let data = [0xA5u8, 0x3C];
        let mut encoder = HammingEncoder::new();
        let parity = encoder.encode(&data);

        let mut decoder = crate::error_correction::HammingDecoder::new();
        decoder.init(parity);
        let mut corrupted = data;
        corrupted[0] ^= 0x01;
        decoder.process(&mut corrupted);

        assert_eq!(corrupted, data);
    }

    #[test]
    fn crc32_matches_across_seeds() {
        let data = b"qpsk-link";
        let a = {
            let mut c = Crc32::new(0);
            c.update_all(data);
            c.value()
        };
        let b = {
            let mut c = Crc32::new(0);
            c.update_all(data);
            c.value()
        };
        assert_eq!(a, b);

        let seeded = {
            let mut c = Crc32::new(CRC_LEN as u32);
            c.update_all(data);
            c.value()
        };
        assert_ne!(a, seeded);
    }

    #[test]
    fn packet_layout_matches_wire_lengths() {
        let mut packet: Packet<HAMMING_LEN> = Packet::new();
        packet.init(0);
        assert!(!packet.full());
    }
}
