/*!
The machine: single owner of the CPU, memory, timer, terminal and kernel,
and the tick loop that advances them.

A tick runs the devices in a fixed order with no interleaving:
1. terminal (deliver a held keystroke as a Keyboard interrupt),
2. timer (raise Timer on period overflow, retrying a busy latch),
3. CPU (service one interrupt or execute one instruction).

Interrupts raised during tick N are therefore serviced at the top of the
CPU's step in tick N+1, and context switches only ever happen between
instructions.

The machine also feeds the Arch pane with the per-step trace (fetched word,
disassembly, register file); that pane is the architecture-level log of the
simulated hardware.
*/

use crate::config::Config;
use crate::cpu::{Cpu, CpuEvent};
use crate::errors::SimError;
use crate::kernel::Kernel;
use crate::memory::Memory;
use crate::terminal::{PaneId, Terminal};
use crate::timer::Timer;

pub struct Machine {
    cpu: Cpu,
    mem: Memory,
    timer: Timer,
    term: Terminal,
    kernel: Kernel,
    cycle: u64,
}

impl Machine {
    /// Build and boot a machine: zeroed memory, idle process installed and
    /// running, pane banners printed.
    pub fn new(cfg: Config) -> Result<Self, SimError> {
        let mut machine = Self {
            cpu: Cpu::new(),
            mem: Memory::new(),
            timer: Timer::new(cfg.timer_period),
            term: Terminal::new(cfg.term_cols, cfg.term_rows),
            kernel: Kernel::new(&cfg),
            cycle: 0,
        };
        machine
            .kernel
            .boot(&mut machine.cpu, &mut machine.mem, &mut machine.term)?;
        Ok(machine)
    }

    // ---------------------------------------------------------------------
    // Accessors
    // ---------------------------------------------------------------------

    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn memory(&self) -> &Memory {
        &self.mem
    }

    pub fn terminal(&self) -> &Terminal {
        &self.term
    }

    pub fn terminal_mut(&mut self) -> &mut Terminal {
        &mut self.term
    }

    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Create and queue a process from an in-memory image, bypassing the
    /// shell. Used by tests and tooling; `/load` goes through the same path
    /// after reading the file.
    pub fn spawn(&mut self, name: &str, image: &[u16]) -> Result<Option<u16>, SimError> {
        self.kernel.spawn(name, image, &mut self.mem, &mut self.term)
    }

    // ---------------------------------------------------------------------
    // Execution
    // ---------------------------------------------------------------------

    /// Advance the machine by one tick.
    pub fn tick(&mut self) -> Result<(), SimError> {
        self.term.run_cycle(&mut self.cpu);
        self.timer.run_cycle(&mut self.cpu);
        self.step_cpu()?;
        self.cycle += 1;
        Ok(())
    }

    fn step_cpu(&mut self) -> Result<(), SimError> {
        let step = self.cpu.step(&mut self.mem)?;

        if let Some(exec) = step.exec {
            self.term.println(
                PaneId::Arch,
                &format!(
                    "c={} pc={:#06x} {:#06x}  {}",
                    self.cycle, exec.pc, exec.word, exec.instr
                ),
            );
            self.term.println(PaneId::Arch, &self.cpu.dump());
        }

        match step.event {
            Some(CpuEvent::Interrupt(code)) => {
                self.kernel
                    .on_interrupt(code, &mut self.cpu, &mut self.mem, &mut self.term)?
            }
            Some(CpuEvent::Syscall) => {
                self.kernel
                    .on_syscall(&mut self.cpu, &mut self.mem, &mut self.term)?
            }
            None => {}
        }
        Ok(())
    }

    /// Run until the CPU powers off.
    pub fn run(&mut self) -> Result<(), SimError> {
        while !self.cpu.is_off() {
            self.tick()?;
        }
        Ok(())
    }

    /// Run at most `n` ticks, stopping early if the CPU powers off.
    /// Returns the number of ticks actually run.
    pub fn run_ticks(&mut self, n: u64) -> Result<u64, SimError> {
        let mut done = 0;
        while done < n && !self.cpu.is_off() {
            self.tick()?;
            done += 1;
        }
        Ok(done)
    }
}
