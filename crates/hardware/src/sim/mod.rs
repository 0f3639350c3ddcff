//! Top-level simulation driver: owns every processor core and the shared
//! program image, and advances them one cycle at a time (spec §5 "iterating
//! `AllProcessors` in ascending id order").

pub mod cache_port;
pub mod syscall;

use crate::config::SimConfig;
use crate::core::processor::Processor;
use crate::isa::StaticInstruction;

/// A multi-processor simulation: a shared, read-only program image and one
/// [`Processor`] per core.
#[derive(Debug)]
pub struct Simulator {
    program: Vec<StaticInstruction>,
    processors: Vec<Processor>,
    config: SimConfig,
    next_id: u32,
}

impl Simulator {
    /// Creates a simulator with `num_processors` cores, each starting
    /// fetch at `start_pc`, all sharing `program`.
    #[must_use]
    pub fn new(program: Vec<StaticInstruction>, num_processors: u32, start_pc: u32, config: SimConfig) -> Self {
        let processors = (0..num_processors)
            .map(|id| Processor::new(id, start_pc, config))
            .collect();
        Self {
            program,
            processors,
            config,
            next_id: num_processors,
        }
    }

    /// Advances every processor by one cycle, in ascending id order, then
    /// spawns a new core for any `fork` syscall that retired this cycle
    /// (spec §6 "fork spawns a new processor core").
    pub fn tick(&mut self) {
        for proc in &mut self.processors {
            proc.tick(&self.program);
        }
        let mut spawned = Vec::new();
        for proc in &mut self.processors {
            if let Some(resume_pc) = proc.take_fork_request() {
                spawned.push(Processor::new(self.next_id, resume_pc, self.config));
                self.next_id += 1;
            }
        }
        self.processors.extend(spawned);
    }

    /// Runs `cycles` cycles.
    pub fn run(&mut self, cycles: u64) {
        for _ in 0..cycles {
            self.tick();
        }
    }

    /// Read-only access to the processor cores, for inspecting final state
    /// and statistics.
    #[must_use]
    pub fn processors(&self) -> &[Processor] {
        &self.processors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::Opcode;

    #[test]
    fn simulator_advances_every_processor_each_cycle() {
        let program: Vec<StaticInstruction> = (0..16)
            .map(|_| StaticInstruction::simple(Opcode::Nop, None, None, None))
            .collect();
        let mut sim = Simulator::new(program, 2, 0, SimConfig::default());
        sim.run(10);
        for proc in sim.processors() {
            assert_eq!(proc.cycle, 10);
        }
    }
}
