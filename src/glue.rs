//! ISR/main-loop wiring for a global [`Decoder`] instance.
//!
//! Firmware typically wants exactly one decoder, reachable both from a
//! sample-rate interrupt (pushing ADC samples) and from the main loop
//! (draining it). This module provides the `critical-section`-guarded
//! global-static pattern plus three macros (`init_qpsk_decoder!`,
//! `qpsk_push_sample!`, `qpsk_process!`) so firmware code reads the same way
//! regardless of target, instead of every project hand-rolling its own
//! `Mutex<RefCell<Option<Decoder<...>>>>`.

use core::cell::RefCell;
use critical_section::Mutex;

use crate::decoder::{DecodeResult, Decoder};

/// Used to initialize the global static [`Decoder`] for use with
/// `critical_section`.
///
/// # Example
/// ```rust
/// use core::cell::RefCell;
/// use critical_section::Mutex;
/// use qpsk_link::decoder::Decoder;
/// use qpsk_link::glue::global_decoder_init;
///
/// static DECODER: Mutex<RefCell<Option<Decoder<8, 16, 64, 1024>>>> =
///     global_decoder_init::<8, 16, 64, 1024>();
/// ```
pub const fn global_decoder_init<
    const L: usize,
    const P: usize,
    const B: usize,
    const FIFO: usize,
>() -> Mutex<RefCell<Option<Decoder<L, P, B, FIFO>>>> {
    Mutex::new(RefCell::new(None))
}

/// Constructs a fresh `Decoder` and stores it in the global static, armed
/// with `crc_seed`. Must be called before any other `global_*` function.
pub fn global_decoder_setup<const L: usize, const P: usize, const B: usize, const FIFO: usize>(
    global_decoder: &'static Mutex<RefCell<Option<Decoder<L, P, B, FIFO>>>>,
    crc_seed: u32,
) {
    critical_section::with(|cs| {
        let mut decoder = Decoder::new();
        decoder.init(crc_seed);
        let _ = global_decoder.borrow(cs).replace(Some(decoder));
    });
}

/// Pushes one sample into the global decoder's FIFO. Safe to call from an
/// interrupt handler — this only reaches `Decoder::push_sample`, which
/// touches lock-free atomics, never the decoder/demodulator state machine.
///
/// Returns `false` if the driver has not been set up yet, or if the FIFO
/// was full.
pub fn global_push_sample<const L: usize, const P: usize, const B: usize, const FIFO: usize>(
    global_decoder: &'static Mutex<RefCell<Option<Decoder<L, P, B, FIFO>>>>,
    sample: f32,
) -> bool {
    critical_section::with(|cs| {
        match global_decoder.borrow(cs).borrow().as_ref() {
            Some(decoder) => decoder.push_sample(sample),
            None => false,
        }
    })
}

/// Drains the global decoder's FIFO via `Decoder::process`, returning
/// `DecodeResult::None` if the driver has not been set up yet.
pub fn global_process<const L: usize, const P: usize, const B: usize, const FIFO: usize>(
    global_decoder: &'static Mutex<RefCell<Option<Decoder<L, P, B, FIFO>>>>,
) -> DecodeResult {
    critical_section::with(|cs| {
        match global_decoder.borrow(cs).borrow_mut().as_mut() {
            Some(decoder) => decoder.process(),
            None => DecodeResult::None,
        }
    })
}

/// Declares a static global `QPSK_DECODER` instance protected by a
/// `critical_section` mutex.
///
/// # Arguments
/// `$l, $p, $b, $fifo`: the `Decoder`'s four const generic parameters
/// (samples/symbol, packet bytes, block bytes, FIFO capacity).
///
/// # Example
/// ```rust
/// qpsk_link::init_qpsk_decoder!(8, 16, 64, 1024);
/// ```
#[macro_export]
macro_rules! init_qpsk_decoder {
    ( $l:literal, $p:literal, $b:literal, $fifo:literal ) => {
        pub static QPSK_DECODER: $crate::critical_section::Mutex<
            core::cell::RefCell<Option<$crate::decoder::Decoder<$l, $p, $b, $fifo>>>,
        > = $crate::glue::global_decoder_init::<$l, $p, $b, $fifo>();
    };
}

/// Pushes one sample into the `QPSK_DECODER` singleton declared by
/// [`init_qpsk_decoder!`]. ISR-safe.
#[macro_export]
macro_rules! qpsk_push_sample {
    ( $sample:expr ) => {
        $crate::glue::global_push_sample(&QPSK_DECODER, $sample)
    };
}

/// Drains the `QPSK_DECODER` singleton declared by [`init_qpsk_decoder!`].
/// Intended for the main loop, not the ISR.
#[macro_export]
macro_rules! qpsk_process {
    () => {
        $crate::glue::global_process(&QPSK_DECODER)
    };
}
