//! Reconstruction of field-sized integers from the module's 32-bit shared window.

use num_bigint::BigUint;

use crate::error::Result;

/// The word and text channel a circuit module exposes to its host.
pub trait WordChannel {
    /// Number of 32-bit words per field element.
    fn field_num_len32(&mut self) -> Result<u32>;
    fn read_shared_rw_memory(&mut self, index: u32) -> Result<u32>;
    /// Next code point of pending diagnostic text, 0 once drained.
    fn message_char(&mut self) -> Result<u32>;
}

/// Reads the window in module index order (least significant word first).
pub fn read_raw_words<C: WordChannel + ?Sized>(channel: &mut C, n32: u32) -> Result<Vec<u32>> {
    (0..n32)
        .map(|index| channel.read_shared_rw_memory(index))
        .collect()
}

/// Reads `n32` words into a most-significant-first array and folds it into one integer.
pub fn read_field_element<C: WordChannel + ?Sized>(channel: &mut C, n32: u32) -> Result<BigUint> {
    let len = n32 as usize;
    let mut arr = vec![0u32; len];
    for i in 0..len {
        arr[len - 1 - i] = channel.read_shared_rw_memory(i as u32)?;
    }
    Ok(from_array32(&arr))
}

/// Reconstructs whatever is currently staged in the window.
pub fn read_window_value<C: WordChannel + ?Sized>(channel: &mut C) -> Result<BigUint> {
    let n32 = channel.field_num_len32()?;
    read_field_element(channel, n32)
}

/// Folds big-endian 32-bit limbs: `result = result * 2^32 + limb`.
pub fn from_array32(limbs: &[u32]) -> BigUint {
    limbs
        .iter()
        .fold(BigUint::from(0u32), |acc, &limb| (acc << 32u32) + limb)
}

/// Drains one message from the text channel.
pub fn read_message<C: WordChannel + ?Sized>(channel: &mut C) -> Result<String> {
    let mut message = String::new();
    loop {
        let c = channel.message_char()?;
        if c == 0 {
            break;
        }
        message.push(char::from_u32(c).unwrap_or(char::REPLACEMENT_CHARACTER));
    }
    Ok(message)
}
