//! Shared test utilities for building program images.
//!
//! Images follow the binary format the loader reads: a flat word sequence
//! with word 0 reserved and the entry point at word 1. The builders here
//! encode instructions through the ISA module so tests never hand-roll
//! instruction words.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use crate::isa::{OpI, OpR, encode_i, encode_r};

/// Prefix a program body with the reserved word 0, producing a loadable
/// image whose first instruction sits at the entry vaddr.
pub fn image(body: &[u16]) -> Vec<u16> {
    let mut words = vec![0u16];
    words.extend_from_slice(body);
    words
}

/// Image that computes 5 + 7 into r0, then moves the halt number into r0
/// and calls the kernel.
pub fn add_and_halt_image() -> Vec<u16> {
    image(&[
        encode_i(OpI::Mov, 1, 5),
        encode_i(OpI::Mov, 2, 7),
        encode_r(OpR::Add, 0, 1, 2),
        encode_i(OpI::Mov, 0, 0),
        encode_r(OpR::Syscall, 0, 0, 0),
    ])
}

/// Image that prints the zero-terminated string stored at vaddr `0x10`
/// and halts. The string payload is "hi".
pub fn print_hi_image() -> Vec<u16> {
    let mut words = image(&[
        encode_i(OpI::Mov, 0, 1),    // r0 = puts
        encode_i(OpI::Mov, 1, 0x10), // r1 = string vaddr
        encode_r(OpR::Syscall, 0, 0, 0),
        encode_i(OpI::Mov, 0, 0), // r0 = halt
        encode_r(OpR::Syscall, 0, 0, 0),
    ]);
    words.resize(0x10, 0);
    words.extend_from_slice(&[u16::from(b'h'), u16::from(b'i'), 0]);
    words
}

/// Image whose second instruction reads far outside its own window.
pub fn wild_load_image() -> Vec<u16> {
    image(&[
        encode_i(OpI::Mov, 1, 0x3FF),
        encode_r(OpR::Load, 0, 1, 0),
    ])
}

/// Image that spins forever at the entry point.
pub fn tight_loop_image() -> Vec<u16> {
    image(&[encode_i(OpI::Jump, 0, 1)])
}

/// Write an image as little-endian bytes to `dir/<name>.bin`, the layout
/// `/load <name>` expects. Returns the file path.
pub fn install_program(dir: &Path, name: &str, words: &[u16]) -> PathBuf {
    let path = dir.join(format!("{name}.bin"));
    let mut bytes = Vec::with_capacity(words.len() * 2);
    for w in words {
        bytes.extend_from_slice(&w.to_le_bytes());
    }
    std::fs::write(&path, bytes).expect("write test program");
    path
}
