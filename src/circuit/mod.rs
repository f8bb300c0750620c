pub mod hooks;
pub mod shared_memory;
pub mod wasm;

use crate::error::Result;
use shared_memory::WordChannel;

/// The capability set of an instantiated circom witness module.
pub trait CircuitRuntime: WordChannel {
    fn version(&mut self) -> Result<u32>;
    /// Stages the prime characteristic into the shared window.
    fn stage_raw_prime(&mut self) -> Result<()>;
    fn witness_size(&mut self) -> Result<u32>;
    /// Resets the module for a new witness; faults raised here are fatal to the caller.
    fn init(&mut self, sanity_check: bool) -> Result<()>;
}
