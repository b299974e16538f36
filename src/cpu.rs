/*!
CPU core: register file, interrupt latch, base/limit translation, and the
one-instruction execution step.

Interrupt model:
- The latch holds at most one pending interrupt (`Option<InterruptCode>`).
  `raise` fails (returns false) while the latch is occupied; devices that
  must not lose events retry on a later cycle.
- `step` services a pending interrupt *before* fetching, so a tight loop
  cannot starve the keyboard or timer. Faults raised by the fetch or by the
  executing instruction are serviced at the end of the same step, with `pc`
  already one past the faulting word.

Virtual memory is a flat offset with bounds, half-open: the window registers
hold `[vmem_base, vmem_limit)` in physical words, `paddr = vaddr + vmem_base`,
and any `paddr >= vmem_limit` raises a general protection fault. Faulting
reads return 0, faulting writes are dropped.

The CPU never calls into the kernel. A step reports what happened as a
`CpuEvent` (pending interrupt taken, or a syscall instruction) and the
machine loop dispatches it; this keeps the core free of kernel types and
directly testable.
*/

use std::fmt::Write as _;

use crate::config::{MEM_WORDS, NREGS};
use crate::errors::SimError;
use crate::isa::{self, DecodeError, Instr, OpI, OpR};
use crate::memory::Memory;

/// The closed set of interrupt causes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InterruptCode {
    Keyboard,
    Timer,
    GeneralProtectionFault,
}

impl InterruptCode {
    pub fn as_str(self) -> &'static str {
        match self {
            InterruptCode::Keyboard => "keyboard",
            InterruptCode::Timer => "timer",
            InterruptCode::GeneralProtectionFault => "general protection fault",
        }
    }
}

impl std::fmt::Display for InterruptCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a step asks the kernel to do.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CpuEvent {
    /// A latched interrupt was taken; the latch is clear on delivery.
    Interrupt(InterruptCode),
    /// The instruction was `syscall`.
    Syscall,
}

/// The instruction a step fetched and executed, for tracing.
#[derive(Copy, Clone, Debug)]
pub struct Exec {
    /// pc the word was fetched from (before the increment).
    pub pc: u16,
    pub word: u16,
    pub instr: Instr,
}

/// Outcome of one CPU step. `exec` is `None` when the step serviced a
/// pending interrupt instead of running an instruction.
#[derive(Copy, Clone, Debug, Default)]
pub struct Step {
    pub event: Option<CpuEvent>,
    pub exec: Option<Exec>,
}

pub struct Cpu {
    gprs: [u16; NREGS],
    pc: u16,
    latch: Option<InterruptCode>,
    vmem_base: u16,
    vmem_limit: u16,
    off: bool,
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl Cpu {
    /// Power-on state: zeroed registers, pc 0, flat window over all of
    /// physical memory.
    pub fn new() -> Self {
        Self {
            gprs: [0; NREGS],
            pc: 0,
            latch: None,
            vmem_base: 0,
            vmem_limit: MEM_WORDS as u16,
            off: false,
        }
    }

    // ---------------------------------------------------------------------
    // Register file
    // ---------------------------------------------------------------------

    #[inline]
    pub fn gpr(&self, code: u8) -> u16 {
        self.gprs[(code & 0x7) as usize]
    }

    #[inline]
    pub fn set_gpr(&mut self, code: u8, value: u16) {
        self.gprs[(code & 0x7) as usize] = value;
    }

    #[inline]
    pub fn gprs(&self) -> &[u16; NREGS] {
        &self.gprs
    }

    #[inline]
    pub fn set_gprs(&mut self, gprs: [u16; NREGS]) {
        self.gprs = gprs;
    }

    #[inline]
    pub fn pc(&self) -> u16 {
        self.pc
    }

    #[inline]
    pub fn set_pc(&mut self, pc: u16) {
        self.pc = pc;
    }

    // ---------------------------------------------------------------------
    // Virtual memory window
    // ---------------------------------------------------------------------

    #[inline]
    pub fn vmem_base(&self) -> u16 {
        self.vmem_base
    }

    #[inline]
    pub fn vmem_limit(&self) -> u16 {
        self.vmem_limit
    }

    /// Install the translation window `[base, limit)` for the process about
    /// to run. Called by the kernel on context switch.
    pub fn set_vmem_window(&mut self, base: u16, limit: u16) {
        debug_assert!(base <= limit && limit as usize <= MEM_WORDS);
        self.vmem_base = base;
        self.vmem_limit = limit;
    }

    /// Translate a virtual address, or `None` when it falls outside the
    /// window. Does not touch the latch; the kernel uses this to validate
    /// syscall pointers through the same window arithmetic as the hardware.
    #[inline]
    pub fn translate(&self, vaddr: u16) -> Option<u16> {
        let paddr = u32::from(vaddr) + u32::from(self.vmem_base);
        if paddr >= u32::from(self.vmem_limit) {
            None
        } else {
            Some(paddr as u16)
        }
    }

    // ---------------------------------------------------------------------
    // Interrupt latch
    // ---------------------------------------------------------------------

    /// Latch an interrupt. Returns false (event dropped) when one is
    /// already pending; devices decide whether to retry.
    pub fn raise(&mut self, code: InterruptCode) -> bool {
        if self.latch.is_some() {
            return false;
        }
        self.latch = Some(code);
        true
    }

    /// Latch a fault from inside the executing instruction. The caller
    /// guarantees the latch is clear: a step drains it before fetching and
    /// at most one fault can arise per instruction.
    fn force_interrupt(&mut self, code: InterruptCode) {
        debug_assert!(self.latch.is_none());
        self.latch = Some(code);
    }

    /// Currently latched interrupt, if any.
    pub fn pending(&self) -> Option<InterruptCode> {
        self.latch
    }

    /// Take the latched interrupt, clearing the latch.
    pub fn take_pending(&mut self) -> Option<InterruptCode> {
        self.latch.take()
    }

    // ---------------------------------------------------------------------
    // Power
    // ---------------------------------------------------------------------

    /// Sticky power-off flag, checked at the top of the machine loop.
    pub fn turn_off(&mut self) {
        self.off = true;
    }

    pub fn is_off(&self) -> bool {
        self.off
    }

    // ---------------------------------------------------------------------
    // Execution
    // ---------------------------------------------------------------------

    /// Run exactly one step: service a pending interrupt, or fetch, decode
    /// and execute one instruction (servicing any fault it raised).
    pub fn step(&mut self, mem: &mut Memory) -> Result<Step, SimError> {
        // External interrupts are checked before the fetch.
        if let Some(code) = self.latch.take() {
            return Ok(Step {
                event: Some(CpuEvent::Interrupt(code)),
                exec: None,
            });
        }

        let fetch_pc = self.pc;
        let word = self.vmem_read(mem, fetch_pc)?;
        if let Some(code) = self.latch.take() {
            // The fetch itself faulted; no instruction ran.
            return Ok(Step {
                event: Some(CpuEvent::Interrupt(code)),
                exec: None,
            });
        }

        self.pc = self.pc.wrapping_add(1);

        let instr = isa::decode(word).map_err(|e| match e {
            DecodeError::UnknownR(opcode) => SimError::UnknownOpcodeR {
                opcode,
                pc: fetch_pc,
            },
            DecodeError::UnknownI(opcode) => SimError::UnknownOpcodeI {
                opcode,
                pc: fetch_pc,
            },
        })?;

        let mut event = None;
        match instr {
            Instr::R { op, dest, op1, op2 } => {
                let a = self.gpr(op1);
                let b = self.gpr(op2);
                match op {
                    OpR::Add => self.set_gpr(dest, a.wrapping_add(b)),
                    OpR::Sub => self.set_gpr(dest, a.wrapping_sub(b)),
                    OpR::Mul => self.set_gpr(dest, a.wrapping_mul(b)),
                    OpR::Div => {
                        if b == 0 {
                            return Err(SimError::DivisionByZero { pc: fetch_pc });
                        }
                        self.set_gpr(dest, a / b);
                    }
                    OpR::CmpEqual => self.set_gpr(dest, (a == b) as u16),
                    OpR::CmpNotEqual => self.set_gpr(dest, (a != b) as u16),
                    OpR::Load => {
                        let value = self.vmem_read(mem, a)?;
                        self.set_gpr(dest, value);
                    }
                    OpR::Store => self.vmem_write(mem, a, b)?,
                    OpR::Syscall => event = Some(CpuEvent::Syscall),
                }
            }
            Instr::I { op, reg, imm } => match op {
                OpI::Jump => self.pc = imm,
                OpI::JumpCond => {
                    if self.gpr(reg) == 1 {
                        self.pc = imm;
                    }
                }
                OpI::Mov => self.set_gpr(reg, imm),
            },
        }

        // Service a fault the instruction raised (load/store out of window).
        if let Some(code) = self.latch.take() {
            event = Some(CpuEvent::Interrupt(code));
        }

        Ok(Step {
            event,
            exec: Some(Exec {
                pc: fetch_pc,
                word,
                instr,
            }),
        })
    }

    fn vmem_read(&mut self, mem: &Memory, vaddr: u16) -> Result<u16, SimError> {
        match self.translate(vaddr) {
            Some(paddr) => mem.read(paddr),
            None => {
                self.force_interrupt(InterruptCode::GeneralProtectionFault);
                Ok(0)
            }
        }
    }

    fn vmem_write(&mut self, mem: &mut Memory, vaddr: u16, value: u16) -> Result<(), SimError> {
        match self.translate(vaddr) {
            Some(paddr) => mem.write(paddr, value),
            None => {
                self.force_interrupt(InterruptCode::GeneralProtectionFault);
                Ok(())
            }
        }
    }

    /// Register summary for the Arch trace and post-mortem dumps.
    pub fn dump(&self) -> String {
        let mut out = format!("pc={:#06x} gprs:", self.pc);
        for v in &self.gprs {
            let _ = write!(out, " {v}");
        }
        out
    }
}
