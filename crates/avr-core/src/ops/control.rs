//! Control instructions with no data-path effect (spec §4.C "control"):
//! `NOP`, `SLEEP`, `WDR`, `BREAK`. Whether a sleep can ever wake up again
//! is the scheduler's call (spec §4.F), not this module's; `sleep` only
//! records the intent.

use crate::state::{Machine, RunState};

pub fn nop() -> u32 {
    1
}

pub fn sleep(m: &mut Machine) -> u32 {
    log::trace!("sleep: pc={:#06x} cycle={}", m.pc, m.cycle);
    m.run_state = RunState::Sleeping;
    1
}

pub fn wdr() -> u32 {
    // The watchdog itself is a peripheral's concern (spec §1); this is
    // the delegation point a registered watchdog I/O handler observes via
    // its own counter reset, not something the core tracks.
    log::trace!("wdr");
    1
}

pub fn brk() -> u32 {
    log::trace!("break");
    1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MachineConfig;

    #[test]
    fn sleep_transitions_run_state() {
        let mut m = Machine::new(MachineConfig::atmega328p());
        sleep(&mut m);
        assert_eq!(m.run_state(), RunState::Sleeping);
    }
}
