//! AES-256 primitives for the two Rocksmith container ciphers.
//!
//! The PSARC table of contents uses AES-256 in CFB mode with a one-byte
//! feedback register. SNG assets use a non-standard mode: each 16-byte block
//! is XORed with the ECB encryption of an IV that is incremented as a
//! 128-bit big-endian counter between blocks. Both are built here on raw
//! single-block encryptions.

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockEncrypt, KeyInit};
use aes::Aes256;

/// Key for the PSARC table of contents (zero IV)
pub const PSARC_TOC_KEY: [u8; 32] = [
    0xC5, 0x3D, 0xB2, 0x38, 0x70, 0xA1, 0xA2, 0xF7, 0x1C, 0xAE, 0x64, 0x06, 0x1F, 0xDD, 0x0E,
    0x11, 0x57, 0x30, 0x9D, 0xC8, 0x52, 0x04, 0xD4, 0xC5, 0xBF, 0xDF, 0x25, 0x09, 0x0D, 0xF2,
    0x57, 0x2C,
];

/// SNG key for PC releases
pub const SNG_PC_KEY: [u8; 32] = [
    0xCB, 0x64, 0x8D, 0xF3, 0xD1, 0x2A, 0x16, 0xBF, 0x71, 0x70, 0x14, 0x14, 0xE6, 0x96, 0x19,
    0xEC, 0x17, 0x1C, 0xCA, 0x5D, 0x2A, 0x14, 0x2E, 0x3E, 0x59, 0xDE, 0x7A, 0xDD, 0xA1, 0x8A,
    0x3A, 0x30,
];

/// SNG key for Mac releases
pub const SNG_MAC_KEY: [u8; 32] = [
    0x98, 0x21, 0x33, 0x0E, 0x34, 0xB9, 0x1F, 0x70, 0xD0, 0xA4, 0x8C, 0xBD, 0x62, 0x59, 0x93,
    0x12, 0x69, 0x70, 0xCE, 0xA0, 0x91, 0x92, 0xC0, 0xE6, 0xCD, 0xA6, 0x76, 0xCC, 0x98, 0x38,
    0x28, 0x9D,
];

/// Decrypt `data` in place with AES-256 in CFB mode, one byte of feedback
/// per block encryption.
pub fn cfb8_decrypt(key: &[u8; 32], iv: &[u8; 16], data: &mut [u8]) {
    let cipher = Aes256::new(GenericArray::from_slice(key));
    let mut shift = *iv;
    for byte in data.iter_mut() {
        let mut block = GenericArray::clone_from_slice(&shift);
        cipher.encrypt_block(&mut block);
        let cipher_byte = *byte;
        *byte ^= block[0];
        shift.copy_within(1.., 0);
        shift[15] = cipher_byte;
    }
}

/// Apply the counter-stepped keystream used by SNG assets to `data` in
/// place. The operation XORs each 16-byte chunk with `AES_ECB(iv + k)`, so
/// applying it twice restores the original bytes.
pub fn counter_keystream_apply(key: &[u8; 32], iv: &[u8; 16], data: &mut [u8]) {
    let cipher = Aes256::new(GenericArray::from_slice(key));
    let mut counter = *iv;
    for chunk in data.chunks_mut(16) {
        let mut block = GenericArray::clone_from_slice(&counter);
        cipher.encrypt_block(&mut block);
        for (byte, key_byte) in chunk.iter_mut().zip(block.iter()) {
            *byte ^= key_byte;
        }
        increment_counter(&mut counter);
    }
}

/// Add 1 to a 128-bit big-endian integer, carry propagating right to left.
fn increment_counter(counter: &mut [u8; 16]) {
    for byte in counter.iter_mut().rev() {
        let (value, carry) = byte.overflowing_add(1);
        *byte = value;
        if !carry {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// CFB-8 encryption, the inverse of [`cfb8_decrypt`].
    fn cfb8_encrypt(key: &[u8; 32], iv: &[u8; 16], data: &mut [u8]) {
        let cipher = Aes256::new(GenericArray::from_slice(key));
        let mut shift = *iv;
        for byte in data.iter_mut() {
            let mut block = GenericArray::clone_from_slice(&shift);
            cipher.encrypt_block(&mut block);
            *byte ^= block[0];
            shift.copy_within(1.., 0);
            shift[15] = *byte;
        }
    }

    #[test]
    fn test_cfb8_round_trip() {
        let plain: Vec<u8> = (0..100u8).collect();
        let mut buffer = plain.clone();
        cfb8_encrypt(&PSARC_TOC_KEY, &[0u8; 16], &mut buffer);
        assert_ne!(buffer, plain);
        cfb8_decrypt(&PSARC_TOC_KEY, &[0u8; 16], &mut buffer);
        assert_eq!(buffer, plain);
    }

    #[test]
    fn test_counter_keystream_involution() {
        let iv = [0x42u8; 16];
        let plain: Vec<u8> = (0..77u8).collect(); // deliberately not a block multiple
        let mut buffer = plain.clone();
        counter_keystream_apply(&SNG_PC_KEY, &iv, &mut buffer);
        assert_ne!(buffer, plain);
        counter_keystream_apply(&SNG_PC_KEY, &iv, &mut buffer);
        assert_eq!(buffer, plain);
    }

    #[test]
    fn test_counter_steps_big_endian() {
        let mut counter = [0u8; 16];
        for _ in 0..300 {
            increment_counter(&mut counter);
        }
        // 300 = 0x012C
        let mut expected = [0u8; 16];
        expected[14] = 0x01;
        expected[15] = 0x2C;
        assert_eq!(counter, expected);

        // carry across a full byte boundary
        let mut counter = [0xFFu8; 16];
        increment_counter(&mut counter);
        assert_eq!(counter, [0u8; 16]);
    }

    #[test]
    fn test_keys_differ_per_platform() {
        let iv = [7u8; 16];
        let mut pc = vec![0u8; 16];
        let mut mac = vec![0u8; 16];
        counter_keystream_apply(&SNG_PC_KEY, &iv, &mut pc);
        counter_keystream_apply(&SNG_MAC_KEY, &iv, &mut mac);
        assert_ne!(pc, mac);
    }
}
