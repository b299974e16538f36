/*!
Host-fatal error type for the simulator.

Simulated faults (general protection faults) never appear here: they travel
through the CPU interrupt latch and are handled by the kernel. `SimError`
covers the conditions that indicate a malformed simulator, image, or host
environment; they propagate with `?` up to the binary, which tears down the
terminal and prints a post-mortem.
*/

use thiserror::Error;

use crate::loader::LoadError;

#[derive(Debug, Error)]
pub enum SimError {
    /// Physical access outside the memory array. Always a host bug or a
    /// corrupted kernel window, never a simulated fault.
    #[error("physical address {paddr:#06x} out of range ({mem_words:#06x} words of memory)")]
    MemoryOutOfRange { paddr: u32, mem_words: u32 },

    #[error("unknown R-format opcode {opcode} at pc {pc:#06x}")]
    UnknownOpcodeR { opcode: u16, pc: u16 },

    #[error("unknown I-format opcode {opcode} at pc {pc:#06x}")]
    UnknownOpcodeI { opcode: u16, pc: u16 },

    #[error("division by zero at pc {pc:#06x}")]
    DivisionByZero { pc: u16 },

    /// An image copy that does not fit its destination window.
    #[error("image of {words} words does not fit at {paddr:#06x}")]
    ImageDoesNotFit { paddr: u16, words: usize },

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("terminal I/O: {0}")]
    Io(#[from] std::io::Error),

    /// Host-side interrupt (Ctrl-C). Clean teardown, non-zero exit.
    #[error("interrupted by the host")]
    Interrupted,
}
