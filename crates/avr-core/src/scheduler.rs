//! Scheduler (spec §4.F): the `run_many` entry point, the cycle-timer
//! pool, and sleep-state handling.
//!
//! Cycle timers live in a min-heap ordered by due cycle (see
//! [`crate::state::CycleTimer`]'s `Ord` impl); `run_many` drains whichever
//! are due before running the next instruction, the usual "process timers,
//! then dispatch" tick-then-run ordering for a cycle-driven master clock.

use crate::state::{Machine, RunState};

impl Machine {
    /// Resume from [`RunState::Stopped`] or [`RunState::StepDone`]; a
    /// no-op from any other state.
    pub fn resume(&mut self) {
        if matches!(self.run_state, RunState::Stopped | RunState::StepDone) {
            self.run_state = RunState::Running;
        }
    }

    /// Request a stop at the next instruction boundary. Takes effect on
    /// the *next* call to `run_many`, not immediately.
    pub fn request_stop(&mut self) {
        if matches!(self.run_state, RunState::Running) {
            self.run_state = RunState::Stopped;
        }
    }

    /// Run at most `budget_cycles` worth of instructions, processing due
    /// cycle timers and interrupts along the way. Returns the run state at
    /// the point execution stopped: a budget exhaustion leaves the machine
    /// [`RunState::Running`] (call again to continue); any other returned
    /// state needs host intervention ([`Machine::resume`], a debug-stub
    /// wake, or the terminal states).
    pub fn run_many(&mut self, budget_cycles: u64) -> RunState {
        let deadline = self.cycle.saturating_add(budget_cycles);
        loop {
            self.process_due_timers();

            match self.run_state {
                RunState::Crashed | RunState::Done | RunState::Stopped | RunState::StepDone => {
                    return self.run_state;
                }
                RunState::Sleeping => {
                    if !self.tick_sleep(deadline) {
                        return self.run_state;
                    }
                    continue;
                }
                RunState::Running => {}
            }

            if self.cycle >= deadline {
                return self.run_state;
            }
            self.step_once();
        }
    }

    /// Fire every timer whose `due` has arrived.
    fn process_due_timers(&mut self) {
        while let Some(due) = self.timers.peek().map(|t| t.due) {
            if due > self.cycle {
                break;
            }
            let Some(timer) = self.timers.pop() else { break };
            let mut callback = timer.callback;
            callback(self, due);
        }
    }

    /// Advance `cycle` one tick while sleeping. Returns `true` if the
    /// caller should loop again (either a timer fired and is now due, or
    /// an interrupt woke the machine); `false` if `run_many` should return
    /// control to the host (budget exhausted, or no path to ever wake —
    /// the [`RunState::Done`] transition of spec §7).
    fn tick_sleep(&mut self, deadline: u64) -> bool {
        if let Some(next_due) = self.timers.peek().map(|t| t.due) {
            if self.cycle >= deadline {
                return false;
            }
            self.cycle = next_due.min(deadline).max(self.cycle + 1);
            self.process_due_timers();
            if self.has_pending_interrupt() && self.sreg[crate::flags::SregBit::I as usize] {
                self.run_state = RunState::Running;
            }
            return true;
        }

        if !self.sreg[crate::flags::SregBit::I as usize] {
            if !self.reported_sleep_forever {
                log::warn!("sleeping with interrupts disabled and no pending timers; halting");
                self.reported_sleep_forever = true;
            }
            self.run_state = RunState::Done;
        }
        false
    }
}
