/*!
arch16 binary: interactive four-pane simulator, or a bare-CPU flat run.

Normal mode takes over the host terminal, runs the machine until it powers
off, restores the screen and prints the Kernel pane to stdout. `--flat <BIN>`
runs one binary on the bare CPU with a flat address space and no kernel,
for debugging images.

Exit status is 0 on clean shutdown and non-zero on host-fatal errors or
Ctrl-C; host-fatal paths dump the CPU and the first words of memory to
stderr for post-mortem.
*/

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;

use arch16::config::{ENTRY_VADDR, MEM_WORDS};
use arch16::cpu::{Cpu, CpuEvent};
use arch16::loader;
use arch16::memory::Memory;

#[derive(Parser, Debug)]
#[command(name = "arch16", about = "16-bit machine simulator with a toy OS")]
struct Cli {
    /// Run one binary on the bare CPU: flat address space, no kernel.
    #[arg(long, value_name = "BIN")]
    flat: Option<PathBuf>,

    /// Directory searched by /load for <name>.bin program images.
    #[arg(long, value_name = "DIR", default_value = "programs")]
    programs_dir: PathBuf,

    /// Delay before power-off on halt or /exit, in milliseconds.
    #[arg(long, value_name = "MS", default_value_t = 2000)]
    halt_delay_ms: u64,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let result = match &cli.flat {
        Some(path) => run_flat(path),
        None => run_interactive(&cli),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("arch16: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Bare-CPU debug run: the image is loaded at physical 0, the window spans
/// all of memory, and syscalls get a stand-in handler instead of a kernel.
fn run_flat(path: &Path) -> anyhow::Result<()> {
    let image = loader::read_image_bounded(path, MEM_WORDS)?;
    let mut mem = Memory::new();
    mem.load_image(0, &image)?;

    let mut cpu = Cpu::new();
    cpu.set_pc(ENTRY_VADDR);

    while !cpu.is_off() {
        let step = cpu.step(&mut mem)?;
        if let Some(exec) = step.exec {
            log::trace!("pc={:#06x} {}", exec.pc, exec.instr);
        }
        match step.event {
            Some(CpuEvent::Syscall) => match cpu.gpr(0) {
                0 => {
                    println!("halt service called");
                    cpu.turn_off();
                }
                n => println!("unknown service {n} called"),
            },
            Some(CpuEvent::Interrupt(code)) => {
                anyhow::bail!("unhandled {code} interrupt on the bare CPU")
            }
            None => {}
        }
    }

    println!("{}", cpu.dump());
    print!("{}", mem.dump_range(0, 256));
    Ok(())
}

#[cfg(feature = "tui")]
fn run_interactive(cli: &Cli) -> anyhow::Result<()> {
    use std::time::Duration;

    use anyhow::Context as _;

    use arch16::config::Config;
    use arch16::machine::Machine;
    use arch16::terminal::PaneId;
    use arch16::tui::Session;

    let (cols, rows) = Session::size().context("query terminal size")?;
    let cfg = Config {
        halt_delay: Duration::from_millis(cli.halt_delay_ms),
        programs_dir: cli.programs_dir.clone(),
        term_cols: cols,
        term_rows: rows,
        ..Config::default()
    };

    let mut machine = Machine::new(cfg)?;
    let mut session = Session::new().context("take over the terminal")?;
    let result = drive(&mut machine, &mut session);
    drop(session); // restore the host terminal before printing anything

    match result {
        Ok(()) => {
            // Post-run kernel log, like reading the console after power-off.
            print!("{}", machine.terminal().dump(PaneId::Kernel));
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", machine.cpu().dump());
            eprint!("{}", machine.memory().dump_range(0, 256));
            Err(e.into())
        }
    }
}

#[cfg(feature = "tui")]
fn drive(
    machine: &mut arch16::machine::Machine,
    session: &mut arch16::tui::Session,
) -> Result<(), arch16::SimError> {
    use std::time::{Duration, Instant};

    use arch16::SimError;
    use arch16::tui::KeyPress;

    const FRAME_INTERVAL: Duration = Duration::from_millis(33);

    session.draw(machine.terminal())?;
    let mut last_frame = Instant::now();

    while !machine.cpu().is_off() {
        match session.poll_key()? {
            Some(KeyPress::Char(c)) => machine.terminal_mut().push_key(c),
            Some(KeyPress::Interrupt) => return Err(SimError::Interrupted),
            None => {}
        }
        machine.tick()?;
        if last_frame.elapsed() >= FRAME_INTERVAL && machine.terminal_mut().take_dirty() {
            session.draw(machine.terminal())?;
            last_frame = Instant::now();
        }
    }
    session.draw(machine.terminal())?;
    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_interactive(_cli: &Cli) -> anyhow::Result<()> {
    anyhow::bail!("built without the `tui` feature; use --flat <BIN>")
}
