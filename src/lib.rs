#![doc = r#"
arch16 library crate.

A cycle-driven simulator of a 16-bit word machine and the toy operating
system running on it.

Modules:
- config: architecture constants and runtime configuration
- cpu: register file, interrupt latch, base/limit translation, execution step
- errors: host-fatal error type
- isa: instruction formats, decode/encode, disassembly
- kernel: process table, scheduler, interrupt/syscall dispatch, shell
- loader: little-endian word image files
- machine: owner of all components and the tick loop
- memory: word-addressed physical memory
- terminal: four scrolling panes and the keystroke latch
- timer: periodic interrupt source
- tui (feature `tui`): crossterm/ratatui frontend for the panes

In tests, shared image builders are available under `crate::test_utils`.
"#]

pub mod config;
pub mod cpu;
pub mod errors;
pub mod isa;
pub mod kernel;
pub mod loader;
pub mod machine;
pub mod memory;
pub mod terminal;
pub mod timer;

#[cfg(feature = "tui")]
pub mod tui;

// Re-export commonly used types at the crate root for convenience.
pub use config::Config;
pub use cpu::{Cpu, CpuEvent, InterruptCode};
pub use errors::SimError;
pub use machine::Machine;
pub use memory::Memory;
pub use terminal::{PaneId, Terminal};

// Shared test utilities (only compiled for tests)
#[cfg(test)]
pub mod test_utils;
