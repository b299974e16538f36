/*!
Process records, the process ring, and the round-robin scheduler.

Processes live in a slab: a vector of optional records plus a free list, with
ring membership expressed as a `next` slab index. This keeps removal O(1) and
avoids intrusive pointers entirely; identity is the small integer id.

Slot 0 always holds the idle process. It owns the window starting at
`IDLE_BASE`, is created at boot, and is never destroyed: the ring is never
empty and the scheduler always has somewhere to go.

User processes get fixed-size frames carved out of `[USER_BASE, MEM_WORDS)`,
handed out from a free-frame list and returned on destroy.

Context rules: exactly one process is `Executing` at any instant, and its
saved pc/gprs are stale while it runs; `save` refreshes them from the CPU
and `restore` writes the saved context (plus the translation window) back.
Context switches happen only between instructions, from the timer interrupt
handler.
*/

use thiserror::Error;

use crate::config::{FRAME_WORDS, IDLE_BASE, NREGS, USER_BASE, USER_FRAMES};
use crate::cpu::Cpu;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ProcessStatus {
    Executing,
    Ready,
}

impl ProcessStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ProcessStatus::Executing => "executing",
            ProcessStatus::Ready => "ready",
        }
    }
}

#[derive(Clone, Debug)]
pub struct Process {
    pub id: u16,
    pub name: String,
    pub status: ProcessStatus,
    pub pc: u16,
    pub gprs: [u16; NREGS],
    pub base_addr: u16,
    pub limit_addr: u16,
    next: usize,
}

/// Why a process could not be created. These are kernel-level conditions,
/// reported on the Kernel pane; they never tear down the host.
#[derive(Debug, Error)]
pub enum CreateError {
    #[error("no free process frame")]
    NoFreeFrame,
    #[error("image of {words} words exceeds the {capacity}-word frame")]
    TooLarge { words: usize, capacity: usize },
}

const IDLE_SLOT: usize = 0;

pub struct ProcessTable {
    slots: Vec<Option<Process>>,
    free_slots: Vec<usize>,
    /// Free user frame bases, kept sorted descending so pop() hands out the
    /// lowest address first.
    free_frames: Vec<u16>,
    current: usize,
    ring_len: usize,
    next_id: u16,
}

impl ProcessTable {
    /// Build the table with the idle process installed as current. The
    /// caller is responsible for loading the idle image at `IDLE_BASE` and
    /// restoring idle's context into the CPU.
    pub fn new(idle_image_words: usize) -> Self {
        let idle = Process {
            id: 0,
            name: "idle".to_string(),
            status: ProcessStatus::Executing,
            pc: 0,
            gprs: [0; NREGS],
            base_addr: IDLE_BASE,
            limit_addr: IDLE_BASE + idle_image_words as u16,
            next: IDLE_SLOT,
        };
        let mut free_frames: Vec<u16> = (0..USER_FRAMES)
            .map(|k| USER_BASE + k as u16 * FRAME_WORDS)
            .collect();
        free_frames.reverse();
        Self {
            slots: vec![Some(idle)],
            free_slots: Vec::new(),
            free_frames,
            current: IDLE_SLOT,
            ring_len: 1,
            next_id: 1,
        }
    }

    // ---------------------------------------------------------------------
    // Accessors
    // ---------------------------------------------------------------------

    pub fn current(&self) -> &Process {
        self.slot(self.current)
    }

    pub fn current_mut(&mut self) -> &mut Process {
        self.slot_mut(self.current)
    }

    pub fn len(&self) -> usize {
        self.ring_len
    }

    pub fn is_empty(&self) -> bool {
        false // the idle process never goes away
    }

    pub fn get(&self, id: u16) -> Option<&Process> {
        self.slots
            .iter()
            .flatten()
            .find(|p| p.id == id)
    }

    /// Walk the ring once, starting at the current process.
    pub fn iter_ring(&self) -> impl Iterator<Item = &Process> {
        let mut idx = self.current;
        let mut remaining = self.ring_len;
        std::iter::from_fn(move || {
            if remaining == 0 {
                return None;
            }
            remaining -= 1;
            let p = self.slot(idx);
            idx = p.next;
            Some(p)
        })
    }

    fn slot(&self, idx: usize) -> &Process {
        self.slots[idx]
            .as_ref()
            .unwrap_or_else(|| unreachable!("ring points at an empty slot"))
    }

    fn slot_mut(&mut self, idx: usize) -> &mut Process {
        self.slots[idx]
            .as_mut()
            .unwrap_or_else(|| unreachable!("ring points at an empty slot"))
    }

    // ---------------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------------

    /// Allocate a record for a new Ready process and append it to the ring.
    /// Returns the fresh id; the caller loads the image into the window of
    /// `get(id)`. Creation only queues: the new process first runs when the
    /// scheduler reaches it.
    pub fn create(&mut self, name: &str, image_words: usize, entry_pc: u16) -> Result<u16, CreateError> {
        if image_words > FRAME_WORDS as usize {
            return Err(CreateError::TooLarge {
                words: image_words,
                capacity: FRAME_WORDS as usize,
            });
        }
        let base = self.free_frames.pop().ok_or(CreateError::NoFreeFrame)?;

        let id = self.next_id;
        self.next_id += 1;

        // Splice behind current: the new process becomes the last stop of a
        // full round, which keeps round-robin order equal to creation order.
        let pred = self.pred_of(self.current);
        let proc = Process {
            id,
            name: name.to_string(),
            status: ProcessStatus::Ready,
            pc: entry_pc,
            gprs: [0; NREGS],
            base_addr: base,
            limit_addr: base + image_words as u16,
            next: self.current,
        };

        let idx = match self.free_slots.pop() {
            Some(idx) => {
                self.slots[idx] = Some(proc);
                idx
            }
            None => {
                self.slots.push(Some(proc));
                self.slots.len() - 1
            }
        };
        self.slot_mut(pred).next = idx;
        self.ring_len += 1;
        Ok(id)
    }

    /// Destroy the current process: unlink it, free its frame and slot, and
    /// make its successor current (context restored, marked Executing).
    /// Destroying idle is a no-op.
    pub fn destroy_current(&mut self, cpu: &mut Cpu) {
        if self.current == IDLE_SLOT {
            return;
        }
        let victim = self.current;
        let next = self.slot(victim).next;
        let pred = self.pred_of(victim);
        self.slot_mut(pred).next = next;

        let record = self.slots[victim]
            .take()
            .unwrap_or_else(|| unreachable!("current slot is occupied"));
        self.free_frames.push(record.base_addr);
        self.free_slots.push(victim);
        self.ring_len -= 1;

        self.current = next;
        self.current_mut().status = ProcessStatus::Executing;
        self.restore(cpu);
    }

    // ---------------------------------------------------------------------
    // Context switch
    // ---------------------------------------------------------------------

    /// Copy live CPU context into the current record.
    pub fn save(&mut self, cpu: &Cpu) {
        let proc = self.slot_mut(self.current);
        proc.pc = cpu.pc();
        proc.gprs = *cpu.gprs();
    }

    /// Write the current record's context and window into the CPU.
    pub fn restore(&self, cpu: &mut Cpu) {
        let proc = self.current();
        cpu.set_pc(proc.pc);
        cpu.set_gprs(proc.gprs);
        cpu.set_vmem_window(proc.base_addr, proc.limit_addr);
    }

    /// Round-robin step, called from the timer interrupt handler. Advances
    /// one position along the ring (a single pass, never recursive).
    /// Returns `(from, to)` ids when a switch actually happened.
    pub fn schedule(&mut self, cpu: &mut Cpu) -> Option<(u16, u16)> {
        if self.ring_len <= 1 {
            return None;
        }
        self.save(cpu);
        let from = {
            let proc = self.current_mut();
            proc.status = ProcessStatus::Ready;
            proc.id
        };
        self.current = self.slot(self.current).next;
        let to = {
            let proc = self.current_mut();
            proc.status = ProcessStatus::Executing;
            proc.id
        };
        self.restore(cpu);
        Some((from, to))
    }

    fn pred_of(&self, idx: usize) -> usize {
        let mut cursor = idx;
        loop {
            let next = self.slot(cursor).next;
            if next == idx {
                return cursor;
            }
            cursor = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MEM_WORDS;

    fn table() -> ProcessTable {
        ProcessTable::new(2)
    }

    fn exactly_one_executing(t: &ProcessTable) {
        let n = t
            .iter_ring()
            .filter(|p| p.status == ProcessStatus::Executing)
            .count();
        assert_eq!(n, 1);
    }

    #[test]
    fn boot_state() {
        let t = table();
        assert_eq!(t.len(), 1);
        let idle = t.current();
        assert_eq!(idle.id, 0);
        assert_eq!(idle.base_addr, IDLE_BASE);
        assert_eq!(idle.limit_addr, IDLE_BASE + 2);
        assert_eq!(idle.status, ProcessStatus::Executing);
        exactly_one_executing(&t);
    }

    #[test]
    fn create_queues_in_ring_order() {
        let mut t = table();
        let a = t.create("a", 8, 1).unwrap();
        let b = t.create("b", 8, 1).unwrap();
        assert_eq!((a, b), (1, 2));

        let ids: Vec<u16> = t.iter_ring().map(|p| p.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        exactly_one_executing(&t);

        // Windows are distinct frames inside the user region.
        let pa = t.get(a).unwrap();
        let pb = t.get(b).unwrap();
        assert_eq!(pa.base_addr, USER_BASE);
        assert_eq!(pb.base_addr, USER_BASE + FRAME_WORDS);
        for p in [pa, pb] {
            assert!(p.base_addr <= p.limit_addr);
            assert!((p.limit_addr as usize) <= MEM_WORDS);
            assert_eq!(p.status, ProcessStatus::Ready);
            assert_eq!(p.pc, 1);
        }
    }

    #[test]
    fn create_rejects_oversized_and_exhaustion() {
        let mut t = table();
        assert!(matches!(
            t.create("big", FRAME_WORDS as usize + 1, 1),
            Err(CreateError::TooLarge { .. })
        ));
        for i in 0..USER_FRAMES {
            t.create(&format!("p{i}"), 4, 1).unwrap();
        }
        assert!(matches!(
            t.create("extra", 4, 1),
            Err(CreateError::NoFreeFrame)
        ));
    }

    #[test]
    fn save_restore_round_trip() {
        let mut t = table();
        let mut cpu = Cpu::new();
        cpu.set_pc(0x42);
        cpu.set_gpr(3, 1234);
        t.save(&cpu);

        let saved = t.current().clone();
        let mut other = Cpu::new();
        t.restore(&mut other);
        assert_eq!(other.pc(), 0x42);
        assert_eq!(other.gpr(3), 1234);
        assert_eq!(other.vmem_base(), saved.base_addr);
        assert_eq!(other.vmem_limit(), saved.limit_addr);

        // restore() did not disturb the record.
        t.save(&other);
        assert_eq!(t.current().pc, saved.pc);
        assert_eq!(t.current().gprs, saved.gprs);
    }

    #[test]
    fn schedule_is_round_robin() {
        let mut t = table();
        let mut cpu = Cpu::new();
        t.restore(&mut cpu);
        t.create("a", 8, 1).unwrap();
        t.create("b", 8, 1).unwrap();

        let mut order = vec![t.current().id];
        for _ in 0..6 {
            let switch = t.schedule(&mut cpu);
            assert!(switch.is_some());
            exactly_one_executing(&t);
            order.push(t.current().id);
        }
        assert_eq!(order, vec![0, 1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn schedule_noops_alone() {
        let mut t = table();
        let mut cpu = Cpu::new();
        t.restore(&mut cpu);
        assert_eq!(t.schedule(&mut cpu), None);
        assert_eq!(t.current().id, 0);
    }

    #[test]
    fn schedule_installs_window() {
        let mut t = table();
        let mut cpu = Cpu::new();
        t.restore(&mut cpu);
        t.create("a", 16, 1).unwrap();

        t.schedule(&mut cpu);
        assert_eq!(cpu.vmem_base(), USER_BASE);
        assert_eq!(cpu.vmem_limit(), USER_BASE + 16);
        assert_eq!(cpu.pc(), 1);

        t.schedule(&mut cpu);
        assert_eq!(cpu.vmem_base(), IDLE_BASE);
    }

    #[test]
    fn destroy_unlinks_and_falls_back() {
        let mut t = table();
        let mut cpu = Cpu::new();
        t.restore(&mut cpu);
        t.create("a", 8, 1).unwrap();
        t.create("b", 8, 1).unwrap();

        // Run to process a, then kill it.
        t.schedule(&mut cpu);
        assert_eq!(t.current().id, 1);
        t.destroy_current(&mut cpu);

        assert_eq!(t.len(), 2);
        assert_eq!(t.current().id, 2, "successor becomes current");
        assert_eq!(t.current().status, ProcessStatus::Executing);
        exactly_one_executing(&t);
        let ids: Vec<u16> = t.iter_ring().map(|p| p.id).collect();
        assert_eq!(ids, vec![2, 0]);

        // The freed frame is reused by the next create.
        let c = t.create("c", 8, 1).unwrap();
        assert_eq!(t.get(c).unwrap().base_addr, USER_BASE);
    }

    #[test]
    fn destroy_idle_is_noop() {
        let mut t = table();
        let mut cpu = Cpu::new();
        t.restore(&mut cpu);
        t.create("a", 8, 1).unwrap();

        assert_eq!(t.current().id, 0);
        t.destroy_current(&mut cpu);
        assert_eq!(t.len(), 2);
        assert_eq!(t.current().id, 0);
    }
}
