//! Binary `wtns` witness container.
//!
//! Layout (little-endian 32-bit words):
//!
//! ```text
//! "wtns" | version=2 | n_sections=2
//! 1 | len1 (u64) | n8 | prime (n32 words) | witness_count
//! 2 | len2 (u64) | witness_count * n32 words
//! ```

use num_bigint::{BigInt, BigUint};
use serde::Serialize;

use crate::error::{Result, WitnessError};

pub const WTNS_MAGIC: [u8; 4] = *b"wtns";
pub const WTNS_VERSION: u32 = 2;
pub const WTNS_SECTION_COUNT: u32 = 2;
pub const HEADER_SECTION_ID: u32 = 1;
pub const WITNESS_SECTION_ID: u32 = 2;

/// Limb count every element is padded to before truncation to `n32`.
const PADDED_LIMBS: usize = 8;

/// Splits a section length into `(low, high)` 32-bit words.
pub fn encode_section_length(len: u64) -> [u32; 2] {
    [(len & 0xFFFF_FFFF) as u32, (len >> 32) as u32]
}

pub fn decode_section_length(low: u32, high: u32) -> u64 {
    u64::from(low) | (u64::from(high) << 32)
}

/// Base-2^32 limbs of `|value|`, least significant first, padded with zeros to
/// eight limbs and then cut to `n32`.
pub fn element_limbs(value: &BigInt, n32: usize) -> Vec<u32> {
    let mut limbs = value.magnitude().to_u32_digits();
    if limbs.len() < PADDED_LIMBS {
        limbs.resize(PADDED_LIMBS, 0);
    }
    limbs.resize(n32, 0);
    limbs
}

fn header_word(value: usize, what: &str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| WitnessError::Malformed(format!("{what} {value} does not fit a header word")))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WtnsEncoder {
    n32: usize,
    witness_size: usize,
}

impl WtnsEncoder {
    pub fn new(n32: usize, witness_size: usize) -> Self {
        Self { n32, witness_size }
    }

    pub fn field_size_bytes(&self) -> usize {
        self.n32.saturating_mul(4)
    }

    /// Size of the container in 32-bit words.
    pub fn len_words(&self) -> usize {
        self.witness_size * self.n32 + self.n32 + 11
    }

    pub fn header_section_len(&self) -> u64 {
        8 + self.field_size_bytes() as u64
    }

    pub fn witness_section_len(&self) -> u64 {
        self.field_size_bytes() as u64 * self.witness_size as u64
    }

    /// Assembles the container from the raw prime words (module order) and the witness.
    pub fn encode(&self, prime_words: &[u32], elements: &[BigInt]) -> Result<Vec<u8>> {
        let n8 = header_word(self.field_size_bytes(), "field size")?;
        let witness_count = header_word(self.witness_size, "witness count")?;
        if prime_words.len() != self.n32 {
            return Err(WitnessError::Malformed(format!(
                "prime has {} words, field width is {}",
                prime_words.len(),
                self.n32
            )));
        }
        if elements.len() != self.witness_size {
            return Err(WitnessError::ShapeMismatch {
                expected: self.witness_size,
                actual: elements.len(),
            });
        }

        let mut words = Vec::with_capacity(self.len_words());
        words.push(u32::from_le_bytes(WTNS_MAGIC));
        words.push(WTNS_VERSION);
        words.push(WTNS_SECTION_COUNT);

        words.push(HEADER_SECTION_ID);
        words.extend(encode_section_length(self.header_section_len()));
        words.push(n8);
        words.extend_from_slice(prime_words);
        words.push(witness_count);

        words.push(WITNESS_SECTION_ID);
        words.extend(encode_section_length(self.witness_section_len()));
        for element in elements {
            words.extend(element_limbs(element, self.n32));
        }

        debug_assert_eq!(words.len(), self.len_words());
        Ok(words.into_iter().flat_map(u32::to_le_bytes).collect())
    }
}

/// A decoded `wtns` container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WtnsFile {
    pub version: u32,
    pub field_size_bytes: u32,
    pub prime: BigUint,
    pub witness: Vec<BigUint>,
}

/// Printable overview of a container.
#[derive(Debug, Clone, Serialize)]
pub struct WtnsSummary {
    pub version: u32,
    pub field_size_bytes: u32,
    pub prime: String,
    pub witness_count: usize,
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| {
                WitnessError::Malformed(format!(
                    "need {len} bytes at offset {}, file has {}",
                    self.pos,
                    self.bytes.len()
                ))
            })?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u32(&mut self) -> Result<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn u64(&mut self) -> Result<u64> {
        let low = self.u32()?;
        let high = self.u32()?;
        Ok(decode_section_length(low, high))
    }
}

fn section_len(len: u64) -> Result<usize> {
    usize::try_from(len).map_err(|_| WitnessError::Malformed(format!("section of {len} bytes")))
}

impl WtnsFile {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut cursor = Cursor { bytes, pos: 0 };

        if cursor.take(4)? != &WTNS_MAGIC[..] {
            return Err(WitnessError::Malformed("missing wtns magic".into()));
        }
        let version = cursor.u32()?;
        if version != WTNS_VERSION {
            return Err(WitnessError::Malformed(format!(
                "unsupported version {version}"
            )));
        }

        let n_sections = cursor.u32()?;
        let mut header: Option<(u32, BigUint, u32)> = None;
        let mut witness_payload: Option<&[u8]> = None;

        for _ in 0..n_sections {
            let id = cursor.u32()?;
            let len = section_len(cursor.u64()?)?;
            let payload = cursor.take(len)?;
            match id {
                HEADER_SECTION_ID => {
                    let mut section = Cursor {
                        bytes: payload,
                        pos: 0,
                    };
                    let n8 = section.u32()?;
                    if n8 == 0 || n8 % 4 != 0 {
                        return Err(WitnessError::Malformed(format!("field width {n8}")));
                    }
                    let prime = BigUint::from_bytes_le(section.take(n8 as usize)?);
                    let count = section.u32()?;
                    header = Some((n8, prime, count));
                }
                WITNESS_SECTION_ID => witness_payload = Some(payload),
                // unknown sections are skipped
                _ => {}
            }
        }

        let (n8, prime, count) =
            header.ok_or_else(|| WitnessError::Malformed("missing header section".into()))?;
        let payload = witness_payload
            .ok_or_else(|| WitnessError::Malformed("missing witness section".into()))?;

        let expected = n8 as usize * count as usize;
        if payload.len() != expected {
            return Err(WitnessError::Malformed(format!(
                "witness section has {} bytes, expected {expected}",
                payload.len()
            )));
        }

        let witness = payload
            .chunks_exact(n8 as usize)
            .map(BigUint::from_bytes_le)
            .collect();

        Ok(Self {
            version,
            field_size_bytes: n8,
            prime,
            witness,
        })
    }

    pub fn summary(&self) -> WtnsSummary {
        WtnsSummary {
            version: self.version,
            field_size_bytes: self.field_size_bytes,
            prime: self.prime.to_string(),
            witness_count: self.witness.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    const BN254_WORDS: [u32; 8] = [
        0xf0000001, 0x43e1f593, 0x79b97091, 0x2833e848, 0x8181585d, 0xb85045b6, 0xe131a029,
        0x30644e72,
    ];

    fn words(bytes: &[u8]) -> Vec<u32> {
        bytes
            .chunks_exact(4)
            .map(|w| u32::from_le_bytes([w[0], w[1], w[2], w[3]]))
            .collect()
    }

    /// The hexadecimal slicing the JavaScript witness builder used.
    fn hex_split(len: u64) -> [u32; 2] {
        let hex = format!("{len:x}");
        let part = |s: &str| {
            if s.is_empty() {
                0
            } else {
                u32::from_str_radix(s, 16).unwrap()
            }
        };
        let low = &hex[..hex.len().min(8)];
        let high = &hex[hex.len().min(8)..hex.len().min(16)];
        [part(low), part(high)]
    }

    #[test]
    fn header_layout() {
        let encoder = WtnsEncoder::new(8, 3);
        let elements = vec![
            BigInt::from(0u8),
            BigInt::from(1u8),
            BigInt::from(1u128 << 64),
        ];
        let bytes = encoder.encode(&BN254_WORDS, &elements).unwrap();
        assert_eq!(bytes.len(), (3 * 8 + 8 + 11) * 4);
        assert_eq!(&bytes[0..4], b"wtns");

        let w = words(&bytes);
        assert_eq!(w[1], 2);
        assert_eq!(w[2], 2);
        assert_eq!(w[3], 1);
        assert_eq!((w[4], w[5]), (40, 0));
        assert_eq!(w[6], 32);
        assert_eq!(&w[7..15], &BN254_WORDS);
        assert_eq!(w[15], 3);
        assert_eq!(w[16], 2);
        assert_eq!((w[17], w[18]), (96, 0));

        let witness = &w[19..];
        assert_eq!(witness.len(), 24);
        assert!(witness[0..8].iter().all(|w| *w == 0));
        assert_eq!(&witness[8..16], &[1, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(&witness[16..24], &[0, 0, 1, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn prime_round_trips_through_header() {
        let encoder = WtnsEncoder::new(8, 1);
        let bytes = encoder.encode(&BN254_WORDS, &[BigInt::from(5u8)]).unwrap();
        let file = WtnsFile::from_bytes(&bytes).unwrap();
        assert_eq!(
            file.prime,
            BigUint::from_str(
                "21888242871839275222246405745257275088548364400416034343698204186575808495617"
            )
            .unwrap()
        );
        assert_eq!(file.field_size_bytes, 32);
        assert_eq!(file.witness, vec![BigUint::from(5u8)]);
    }

    #[test]
    fn negative_elements_encode_their_magnitude() {
        assert_eq!(
            element_limbs(&BigInt::from(-7), 2),
            element_limbs(&BigInt::from(7), 2)
        );
    }

    #[test]
    fn wide_elements_are_cut_to_field_width() {
        let value = (BigInt::from(3u8) << 64) + 9;
        assert_eq!(element_limbs(&value, 2), vec![9, 0]);
        // fields wider than the eight-limb padding are zero extended
        assert_eq!(element_limbs(&BigInt::from(1u8), 10), vec![1, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn section_length_matches_hex_split_below_4gib() {
        for len in [0u64, 1, 40, 0xff, 0x1_0000, 0x0fff_ffff, 0xffff_ffff] {
            let [low, high] = encode_section_length(len);
            assert_eq!([low, high], hex_split(len), "len {len:#x}");
            assert_eq!(high, 0);
            assert_eq!(decode_section_length(low, high), len);
        }
    }

    #[test]
    fn section_length_above_4gib_uses_high_word() {
        let len = (5u64 << 32) | 7;
        assert_eq!(encode_section_length(len), [7, 5]);
        assert_eq!(decode_section_length(7, 5), len);
        // the hex slicing put the leading digits in the low word
        assert_ne!(hex_split(len), [7, 5]);
    }

    #[test]
    fn encoder_rejects_wrong_witness_length() {
        let encoder = WtnsEncoder::new(8, 2);
        let err = encoder
            .encode(&BN254_WORDS, &[BigInt::from(1u8)])
            .unwrap_err();
        assert!(matches!(
            err,
            WitnessError::ShapeMismatch {
                expected: 2,
                actual: 1
            }
        ));
    }

    #[test]
    fn encoder_rejects_header_words_wider_than_u32() {
        let err = WtnsEncoder::new(1 << 30, 0).encode(&[], &[]).unwrap_err();
        assert!(matches!(err, WitnessError::Malformed(ref m) if m.contains("field size")));
    }

    #[test]
    fn reader_rejects_bad_magic_and_truncation() {
        let encoder = WtnsEncoder::new(1, 1);
        let mut bytes = encoder.encode(&[13], &[BigInt::from(2u8)]).unwrap();

        let truncated = &bytes[..bytes.len() - 1];
        assert!(matches!(
            WtnsFile::from_bytes(truncated),
            Err(WitnessError::Malformed(_))
        ));

        bytes[0] = b'x';
        assert!(matches!(
            WtnsFile::from_bytes(&bytes),
            Err(WitnessError::Malformed(_))
        ));
    }

    #[test]
    fn reader_accepts_sections_in_any_order() {
        let mut w: Vec<u32> = vec![u32::from_le_bytes(WTNS_MAGIC), 2, 2];
        w.extend([2, 8, 0, 4, 5]);
        w.extend([1, 12, 0, 4, 13, 2]);
        let bytes: Vec<u8> = w.into_iter().flat_map(u32::to_le_bytes).collect();

        let file = WtnsFile::from_bytes(&bytes).unwrap();
        assert_eq!(file.prime, BigUint::from(13u8));
        assert_eq!(file.witness, vec![BigUint::from(4u8), BigUint::from(5u8)]);
        assert_eq!(file.summary().witness_count, 2);
    }
}
