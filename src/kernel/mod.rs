/*!
The kernel: boot, interrupt and syscall dispatch, process management, and
the shell sitting on the Command pane.

The CPU never calls in here directly; the machine loop converts `CpuEvent`s
into `on_interrupt`/`on_syscall`. Both entry points run synchronously inside
the simulator tick and receive explicit `&mut` access to the CPU, memory and
terminal; there is no global state.

Fault policy: a general protection fault (from the translator or from a
syscall pointer check) is diagnosed on the Kernel pane and the offending
process is destroyed. The kernel never reflects faults back into user code.
*/

use std::path::PathBuf;
use std::time::Duration;

use crate::config::{Config, ENTRY_VADDR, FRAME_WORDS, IDLE_BASE};
use crate::cpu::{Cpu, InterruptCode};
use crate::errors::SimError;
use crate::isa::{OpI, encode_i};
use crate::loader;
use crate::memory::Memory;
use crate::terminal::{PaneId, Terminal};

mod process;
mod shell;

pub use process::{CreateError, Process, ProcessStatus, ProcessTable};
pub use shell::{LineEditor, ShellCommand};

/// Built-in idle process image: a reserved word followed by a self-loop.
pub const IDLE_IMAGE: [u16; 2] = [0, encode_i(OpI::Jump, 0, 1)];

/// Printed to the Kernel pane by the halt syscall.
pub const HALT_BANNER: &str = "halt service called";

pub struct Kernel {
    procs: ProcessTable,
    editor: LineEditor,
    programs_dir: PathBuf,
    halt_delay: Duration,
}

impl Kernel {
    pub fn new(cfg: &Config) -> Self {
        Self {
            procs: ProcessTable::new(IDLE_IMAGE.len()),
            editor: LineEditor::new(),
            programs_dir: cfg.programs_dir.clone(),
            halt_delay: cfg.halt_delay,
        }
    }

    /// Install the idle process and greet the panes.
    pub fn boot(
        &mut self,
        cpu: &mut Cpu,
        mem: &mut Memory,
        term: &mut Terminal,
    ) -> Result<(), SimError> {
        term.println(PaneId::Kernel, "kernel output here");
        term.println(PaneId::Command, "type commands here");
        term.println(PaneId::App, "apps output here");

        mem.load_image(IDLE_BASE, &IDLE_IMAGE)?;
        self.procs.restore(cpu);
        log::debug!("kernel booted, idle process installed");
        Ok(())
    }

    pub fn processes(&self) -> &ProcessTable {
        &self.procs
    }

    // ---------------------------------------------------------------------
    // Interrupt dispatch
    // ---------------------------------------------------------------------

    pub fn on_interrupt(
        &mut self,
        code: InterruptCode,
        cpu: &mut Cpu,
        mem: &mut Memory,
        term: &mut Terminal,
    ) -> Result<(), SimError> {
        match code {
            InterruptCode::Keyboard => self.on_keyboard(cpu, mem, term),
            InterruptCode::Timer => {
                if let Some((from, to)) = self.procs.schedule(cpu) {
                    log::trace!("timer: switched pid {from} -> pid {to}");
                }
                Ok(())
            }
            InterruptCode::GeneralProtectionFault => {
                self.fault_current(cpu, term);
                Ok(())
            }
        }
    }

    fn on_keyboard(
        &mut self,
        cpu: &mut Cpu,
        mem: &mut Memory,
        term: &mut Terminal,
    ) -> Result<(), SimError> {
        let Some(c) = term.take_key() else {
            return Ok(());
        };
        if let Some(line) = self.editor.input(c, term) {
            let cmd = shell::parse(&line);
            self.run_command(cmd, cpu, mem, term)?;
        }
        Ok(())
    }

    /// Kill the current process with a Kernel-pane diagnostic. Idle cannot
    /// die; a fault charged to it is only logged.
    fn fault_current(&mut self, cpu: &mut Cpu, term: &mut Terminal) {
        let victim = self.procs.current();
        if victim.id == 0 {
            term.println(PaneId::Kernel, "general protection fault in idle, ignored");
            return;
        }
        term.println(
            PaneId::Kernel,
            &format!(
                "general protection fault: killing pid {} ({})",
                victim.id, victim.name
            ),
        );
        self.procs.destroy_current(cpu);
    }

    // ---------------------------------------------------------------------
    // Syscalls
    // ---------------------------------------------------------------------

    /// Syscall entry point. The number is in r0, arguments from r1.
    pub fn on_syscall(
        &mut self,
        cpu: &mut Cpu,
        mem: &mut Memory,
        term: &mut Terminal,
    ) -> Result<(), SimError> {
        match cpu.gpr(0) {
            0 => {
                term.println(PaneId::Kernel, HALT_BANNER);
                std::thread::sleep(self.halt_delay);
                cpu.turn_off();
            }
            1 => {
                if let Some(text) = self.read_user_string(cpu, mem, term)? {
                    term.print(PaneId::App, &text);
                }
            }
            2 => term.print(PaneId::App, "\n"),
            3 => term.print(PaneId::App, &format!("{}", cpu.gpr(1))),
            n => {
                let current = self.procs.current();
                if current.id == 0 {
                    term.println(
                        PaneId::Kernel,
                        &format!("unknown service {n} called from idle, ignored"),
                    );
                } else {
                    term.println(
                        PaneId::Kernel,
                        &format!(
                            "unknown service {n} called by pid {} ({}), killing it",
                            current.id, current.name
                        ),
                    );
                    self.procs.destroy_current(cpu);
                }
            }
        }
        Ok(())
    }

    /// Read the zero-terminated string at vaddr r1, one character per word
    /// (low byte). Every word goes through the current window; a pointer
    /// outside it takes the same path as a hardware fault and the caller
    /// dies. Returns `None` in that case.
    fn read_user_string(
        &mut self,
        cpu: &mut Cpu,
        mem: &Memory,
        term: &mut Terminal,
    ) -> Result<Option<String>, SimError> {
        let mut text = String::new();
        let mut vaddr = cpu.gpr(1);
        loop {
            let Some(paddr) = cpu.translate(vaddr) else {
                self.fault_current(cpu, term);
                return Ok(None);
            };
            let byte = (mem.read(paddr)? & 0xFF) as u8;
            if byte == 0 {
                return Ok(Some(text));
            }
            text.push(byte as char);
            // The window is bounded, so the walk always reaches either a
            // terminator or the limit before vaddr can wrap.
            vaddr = vaddr.wrapping_add(1);
        }
    }

    // ---------------------------------------------------------------------
    // Shell commands
    // ---------------------------------------------------------------------

    fn run_command(
        &mut self,
        cmd: ShellCommand,
        cpu: &mut Cpu,
        mem: &mut Memory,
        term: &mut Terminal,
    ) -> Result<(), SimError> {
        match cmd {
            ShellCommand::Load(name) => {
                let path = self.programs_dir.join(format!("{name}.bin"));
                let image = loader::read_image_bounded(&path, FRAME_WORDS as usize)?;
                self.spawn(&name, &image, mem, term)?;
            }
            ShellCommand::Kill => {
                let current = self.procs.current();
                if current.id == 0 {
                    term.println(PaneId::Kernel, "kill: no user process running");
                } else {
                    term.println(
                        PaneId::Kernel,
                        &format!("killing pid {} ({})", current.id, current.name),
                    );
                    self.procs.destroy_current(cpu);
                }
            }
            ShellCommand::Status => {
                for p in self.procs.iter_ring() {
                    let marker = if p.status == ProcessStatus::Executing {
                        "*"
                    } else {
                        " "
                    };
                    term.println(
                        PaneId::Kernel,
                        &format!(
                            "{marker} pid {} {} [{:#06x},{:#06x}) {}",
                            p.id,
                            p.name,
                            p.base_addr,
                            p.limit_addr,
                            p.status.as_str()
                        ),
                    );
                }
            }
            ShellCommand::Syscall(n) => {
                cpu.set_gpr(0, n);
                self.on_syscall(cpu, mem, term)?;
            }
            ShellCommand::Exit => {
                term.println(PaneId::Kernel, "shutting down");
                std::thread::sleep(self.halt_delay);
                cpu.turn_off();
            }
            ShellCommand::Empty => {}
            ShellCommand::Unknown(line) => {
                term.println(PaneId::App, &format!("Unknown command: {line}"));
            }
        }
        Ok(())
    }

    /// Create a process from an in-memory image and load it into its frame.
    /// Kernel-level refusals (no frame, image too big) are reported on the
    /// Kernel pane; only host-level failures propagate.
    pub fn spawn(
        &mut self,
        name: &str,
        image: &[u16],
        mem: &mut Memory,
        term: &mut Terminal,
    ) -> Result<Option<u16>, SimError> {
        match self.procs.create(name, image.len(), ENTRY_VADDR) {
            Ok(id) => {
                let (base, limit) = {
                    let p = self
                        .procs
                        .get(id)
                        .unwrap_or_else(|| unreachable!("freshly created pid exists"));
                    (p.base_addr, p.limit_addr)
                };
                mem.load_image(base, image)?;
                term.println(
                    PaneId::Kernel,
                    &format!("loaded {name}: pid {id} at [{base:#06x},{limit:#06x})"),
                );
                log::debug!("spawned {name} as pid {id}");
                Ok(Some(id))
            }
            Err(e) => {
                term.println(PaneId::Kernel, &format!("cannot load {name}: {e}"));
                Ok(None)
            }
        }
    }
}
