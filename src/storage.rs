use std::{
    fs::{create_dir_all, File},
    io::{BufReader, Write},
    path::Path,
};

use memmap2::{Mmap, MmapOptions};
use num_bigint::BigInt;
use serde_json::Value;
use tracing::info;

use crate::{error::Result, utils::parse_field_elements, wtns::WtnsFile};

/// Map a compiled circuit module into memory.
pub fn load_module_bytes<P: AsRef<Path>>(wasm_path: P) -> Result<Mmap> {
    let wasm_path = wasm_path.as_ref();
    let wasm_file = File::open(wasm_path)?;
    // the mapping is only read while the module compiles
    let wasm_mmap = unsafe { MmapOptions::new().map(&wasm_file)? };
    info!(
        "Loaded circuit module from: {} ({} bytes)",
        wasm_path.display(),
        wasm_mmap.len()
    );
    Ok(wasm_mmap)
}

pub fn load_witness_json<P: AsRef<Path>>(json_path: P) -> Result<Vec<BigInt>> {
    let json_path = json_path.as_ref();
    let json_file = File::open(json_path)?;
    let json_value: Value = serde_json::from_reader(BufReader::new(json_file))?;
    let elements = parse_field_elements(&json_value)?;
    info!(
        "Loaded {} witness elements from: {}",
        elements.len(),
        json_path.display()
    );
    Ok(elements)
}

pub fn save_witness<P: AsRef<Path>>(wtns_path: P, bytes: &[u8]) -> Result<()> {
    let wtns_path = wtns_path.as_ref();
    if let Some(parent) = wtns_path.parent() {
        create_dir_all(parent)?;
    }

    let mut wtns_file = File::create(wtns_path)?;
    wtns_file.write_all(bytes)?;
    info!("Saved wtns witness to: {}", wtns_path.display());

    Ok(())
}

pub fn load_wtns<P: AsRef<Path>>(wtns_path: P) -> Result<WtnsFile> {
    let wtns_path = wtns_path.as_ref();
    let bytes = std::fs::read(wtns_path)?;
    let wtns = WtnsFile::from_bytes(&bytes)?;
    info!("Loaded wtns witness from: {}", wtns_path.display());
    Ok(wtns)
}
