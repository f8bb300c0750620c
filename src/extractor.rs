//! Packs an externally computed witness into a `wtns` container using the field
//! parameters reported by the circuit module.

use std::time::Instant;

use num_bigint::{BigInt, BigUint};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{
    circuit::{
        hooks::HostHooks,
        shared_memory::{read_field_element, read_raw_words},
        wasm::ModuleBridge,
        CircuitRuntime,
    },
    error::{Result, WitnessError},
    utils::parse_field_elements,
    wtns::WtnsEncoder,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WitnessOptions {
    /// Ask the module to run its sanity checks during `init`.
    #[serde(default)]
    pub sanity_check: bool,
}

/// Bound to one instantiated module; the module must not be shared between extractors.
pub struct WitnessExtractor<R: CircuitRuntime> {
    runtime: R,
    version: u32,
    n32: u32,
    prime: BigUint,
    witness_size: u32,
    sanity_check: bool,
}

impl WitnessExtractor<ModuleBridge> {
    pub fn from_module_bytes(bytes: &[u8], options: &WitnessOptions) -> Result<Self> {
        Self::new(ModuleBridge::from_bytes(bytes)?, options)
    }
}

impl<H: HostHooks> WitnessExtractor<ModuleBridge<H>> {
    pub fn with_hooks(bytes: &[u8], hooks: H, options: &WitnessOptions) -> Result<Self> {
        let compiled = ModuleBridge::<H>::compile(bytes)?;
        Self::new(ModuleBridge::instantiate(compiled, hooks)?, options)
    }
}

impl<R: CircuitRuntime> WitnessExtractor<R> {
    /// Reads version, field width, prime and witness size from the module, in that order.
    pub fn new(mut runtime: R, options: &WitnessOptions) -> Result<Self> {
        let version = runtime.version()?;
        let n32 = runtime.field_num_len32()?;
        // n8 is written as a single u32 header word
        if n32.checked_mul(4).is_none() {
            return Err(WitnessError::UnexpectedReturn("getFieldNumLen32"));
        }
        runtime.stage_raw_prime()?;
        let prime = read_field_element(&mut runtime, n32)?;
        let witness_size = runtime.witness_size()?;

        info!(
            version,
            n32,
            witness_size,
            %prime,
            "Loaded circuit field parameters"
        );

        Ok(Self {
            runtime,
            version,
            n32,
            prime,
            witness_size,
            sanity_check: options.sanity_check,
        })
    }

    pub fn circom_version(&self) -> u32 {
        self.version
    }

    pub fn n32(&self) -> u32 {
        self.n32
    }

    pub fn field_size_bytes(&self) -> u32 {
        self.n32 * 4
    }

    pub fn prime(&self) -> &BigUint {
        &self.prime
    }

    pub fn witness_size(&self) -> u32 {
        self.witness_size
    }

    pub fn sanity_check(&self) -> bool {
        self.sanity_check
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn runtime_mut(&mut self) -> &mut R {
        &mut self.runtime
    }

    /// Encode `elements` as a `wtns` container.
    ///
    /// The module is re-initialised first; a fault during `init` aborts without output.
    pub fn to_binary(&mut self, elements: &[BigInt], sanity_check: bool) -> Result<Vec<u8>> {
        let expected = self.witness_size as usize;
        if elements.len() != expected {
            return Err(WitnessError::ShapeMismatch {
                expected,
                actual: elements.len(),
            });
        }

        let t0 = Instant::now();
        self.runtime.init(self.sanity_check || sanity_check)?;

        self.runtime.stage_raw_prime()?;
        let prime_words = read_raw_words(&mut self.runtime, self.n32)?;
        debug!(?prime_words, "Copied prime from shared window");

        for (index, element) in elements.iter().enumerate() {
            if element.magnitude() >= &self.prime {
                warn!(index, %element, "Witness element is not reduced modulo the field prime");
            }
        }

        let encoder = WtnsEncoder::new(self.n32 as usize, expected);
        let bytes = encoder.encode(&prime_words, elements)?;
        info!(
            elapsed_ms = t0.elapsed().as_millis(),
            bytes = bytes.len(),
            "Encoded wtns container"
        );
        Ok(bytes)
    }

    /// Parse a JSON array of field elements and encode it.
    pub fn json_to_binary(&mut self, input: &Value, sanity_check: bool) -> Result<Vec<u8>> {
        let elements = parse_field_elements(input)?;
        self.to_binary(&elements, sanity_check)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::{
        hooks::{DiagnosticBuffer, FaultKind},
        shared_memory::WordChannel,
    };
    use crate::wtns::WtnsFile;
    use serde_json::json;

    const PRIME_WORDS: [u32; 2] = [0xffff_fffb, 0x0000_0001]; // 2^33 - 5

    #[derive(Default)]
    struct FakeCircuit {
        n32: Option<u32>,
        window: Vec<u32>,
        witness_size: u32,
        fault_on_init: Option<u32>,
        init_flags: Vec<bool>,
        calls: Vec<&'static str>,
        diagnostics: DiagnosticBuffer,
    }

    impl WordChannel for FakeCircuit {
        fn field_num_len32(&mut self) -> Result<u32> {
            self.calls.push("getFieldNumLen32");
            Ok(self.n32.unwrap_or(PRIME_WORDS.len() as u32))
        }

        fn read_shared_rw_memory(&mut self, index: u32) -> Result<u32> {
            Ok(self.window[index as usize])
        }

        fn message_char(&mut self) -> Result<u32> {
            Ok(0)
        }
    }

    impl CircuitRuntime for FakeCircuit {
        fn version(&mut self) -> Result<u32> {
            self.calls.push("getVersion");
            Ok(2)
        }

        fn stage_raw_prime(&mut self) -> Result<()> {
            self.calls.push("getRawPrime");
            self.window = PRIME_WORDS.to_vec();
            Ok(())
        }

        fn witness_size(&mut self) -> Result<u32> {
            self.calls.push("getWitnessSize");
            Ok(self.witness_size)
        }

        fn init(&mut self, sanity_check: bool) -> Result<()> {
            self.calls.push("init");
            self.init_flags.push(sanity_check);
            // clobber the window so a missing re-stage shows up
            self.window = vec![0xdead_beef; PRIME_WORDS.len()];
            if let Some(code) = self.fault_on_init {
                self.diagnostics.on_drain_error("line 12");
                return Err(self.diagnostics.on_fault(code).into());
            }
            Ok(())
        }
    }

    fn extractor(witness_size: u32, options: WitnessOptions) -> WitnessExtractor<FakeCircuit> {
        let circuit = FakeCircuit {
            witness_size,
            ..Default::default()
        };
        WitnessExtractor::new(circuit, &options).unwrap()
    }

    #[test]
    fn construction_reads_metadata_in_order() {
        let extractor = extractor(3, WitnessOptions::default());
        assert_eq!(
            extractor.runtime().calls,
            vec!["getVersion", "getFieldNumLen32", "getRawPrime", "getWitnessSize"]
        );
        assert_eq!(extractor.circom_version(), 2);
        assert_eq!(extractor.n32(), 2);
        assert_eq!(extractor.field_size_bytes(), 8);
        assert_eq!(extractor.prime(), &BigUint::from((1u64 << 33) - 5));
        assert_eq!(extractor.witness_size(), 3);
    }

    #[test]
    fn conversion_restages_prime_after_init() {
        let mut extractor = extractor(2, WitnessOptions::default());
        let bytes = extractor
            .json_to_binary(&json!(["1", "8589934585"]), false)
            .unwrap();

        let file = WtnsFile::from_bytes(&bytes).unwrap();
        assert_eq!(&file.prime, extractor.prime());
        assert_eq!(
            file.witness,
            vec![BigUint::from(1u8), BigUint::from(8589934585u64)]
        );
        assert_eq!(bytes.len(), (2 * 2 + 2 + 11) * 4);
    }

    #[test]
    fn sanity_flag_is_or_of_option_and_override() {
        let mut plain = extractor(1, WitnessOptions::default());
        plain.to_binary(&[BigInt::from(1)], false).unwrap();
        plain.to_binary(&[BigInt::from(1)], true).unwrap();
        assert_eq!(plain.runtime().init_flags, vec![false, true]);

        let mut checked = extractor(1, WitnessOptions { sanity_check: true });
        checked.to_binary(&[BigInt::from(1)], false).unwrap();
        assert_eq!(checked.runtime().init_flags, vec![true]);
    }

    #[test]
    fn shape_mismatch_is_reported_before_init() {
        let mut extractor = extractor(3, WitnessOptions::default());
        let err = extractor
            .to_binary(&[BigInt::from(1), BigInt::from(2)], false)
            .unwrap_err();
        assert!(matches!(
            err,
            WitnessError::ShapeMismatch {
                expected: 3,
                actual: 2
            }
        ));
        assert!(extractor.runtime().init_flags.is_empty());
    }

    #[test]
    fn init_fault_aborts_conversion() {
        let mut extractor = extractor(1, WitnessOptions::default());
        extractor.runtime_mut().fault_on_init = Some(4);

        match extractor.to_binary(&[BigInt::from(0)], false) {
            Err(WitnessError::Fault(fault)) => {
                assert_eq!(fault.kind(), FaultKind::AssertionFailed);
                assert_eq!(fault.message(), "Assert Failed.\nline 12\n");
            }
            other => panic!("expected fault, got {:?}", other.map(|b| b.len())),
        }
    }

    #[test]
    fn oversized_field_width_is_rejected_before_reading_prime() {
        let circuit = FakeCircuit {
            n32: Some(1 << 30),
            ..Default::default()
        };
        let err = WitnessExtractor::new(circuit, &WitnessOptions::default())
            .err()
            .unwrap();
        assert!(matches!(
            err,
            WitnessError::UnexpectedReturn("getFieldNumLen32")
        ));
    }
}
