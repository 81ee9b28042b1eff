//! Protocol-wide constants for the QPSK wire format.
//!
//! These values describe the *authoritative* wire format: a 16-byte
//! cold-start preamble, a 2-symbol alignment sequence at the start of every
//! packet, and a big-endian CRC-32 trailed by 16 bits of Hamming parity.
//! Older framings (see the project history) are not supported — there is no
//! version negotiation, so a stream in an older format must be rejected
//! rather than half-accepted.

/// Number of bits carried by one QPSK symbol (I-sign, Q-sign).
pub const BITS_PER_SYMBOL: u32 = 2;

/// Number of QPSK symbols needed to assemble one byte.
pub const SYMBOLS_PER_BYTE: u32 = 8 / BITS_PER_SYMBOL;

/// Length, in bytes, of the CRC-32 trailer appended to every packet.
pub const CRC_LEN: usize = 4;

/// Length, in bytes, of the Hamming parity trailer appended to every packet.
pub const HAMMING_LEN: usize = 2;

/// Cold-start preamble: a strong DC-stabilizing run followed by symbol
/// transitions, used only to train the PLL and AGC before the first packet.
pub const PREAMBLE: [u8; 16] = [
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x99, 0x99, 0x99, 0x99, 0xCC, 0xCC, 0xCC, 0xCC,
];

/// The two-symbol sequence marking the start of every packet (including the
/// first, immediately after the preamble).
pub const ALIGNMENT_SEQUENCE: [u8; 2] = [2, 1];

/// Number of symbols in [`ALIGNMENT_SEQUENCE`].
pub const ALIGNMENT_LENGTH: usize = ALIGNMENT_SEQUENCE.len();

/// Sentinel `Symbol` value meaning "no symbol decided yet", used by
/// diagnostic accessors and the alignment-search state.
pub const SYMBOL_NONE: u8 = 4;

/// Number of Window writes between full recomputation of the running sum,
/// bounding float drift in [`crate::window::Window`] / [`crate::window::Bay`].
pub const WINDOW_RESYNC_INTERVAL: u32 = 4096;
