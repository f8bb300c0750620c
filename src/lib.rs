//! Witness export for compiled circom circuits.
//!
//! This library instantiates a circom WASM witness calculator, reads the field
//! parameters it exposes through its shared memory window, and packs an already
//! computed witness vector into the binary `wtns` container used by snarkjs-style
//! provers.

pub mod circuit;
pub mod error;
pub mod extractor;
pub mod storage;
pub mod utils;
pub mod wtns;

// Re-export commonly used types and functions
pub use circuit::{
    hooks::{CircuitFault, DiagnosticBuffer, FaultKind, HostHooks},
    shared_memory::WordChannel,
    wasm::{CompiledModule, ModuleBridge},
    CircuitRuntime,
};
pub use error::{Result, WitnessError};
pub use extractor::{WitnessExtractor, WitnessOptions};
pub use storage::{load_module_bytes, load_witness_json, load_wtns, save_witness};
pub use utils::parse_field_elements;
pub use wtns::{WtnsEncoder, WtnsFile, WtnsSummary};

pub use num_bigint::{BigInt, BigUint};
