//! Block cipher engine: AES composed with a confidentiality mode and,
//! for CBC, a final-block padding scheme.
//!
//! Design notes:
//! - One call processes exactly one operation (the 16-byte AES block);
//!   the mode state lives in the engine so the stream layer stays dumb.
//! - CBC decryption holds one plaintext block back: the final block can
//!   only be released once end-of-stream is known, because its padding
//!   must be stripped. `process` therefore emits the previous block and
//!   `process_final` unpads the held one.
//! - CTS (CBC with ciphertext stealing) holds one block back in both
//!   directions. A partial final block steals its missing tail from the
//!   previous ciphertext block and the two are emitted swapped, keeping
//!   ciphertext length equal to plaintext length; block-aligned input
//!   degenerates to plain CBC. Input shorter than one block cannot be
//!   processed and surfaces as `IncompleteBlock`.
//! - AEAD modes are not handled here; see `crypto::aead`.

use aes::cipher::{generic_array::GenericArray, BlockDecrypt, BlockEncrypt, KeyInit};
use aes::{Aes128, Aes192, Aes256};
use zeroize::Zeroize;

use crate::config::{BlockMode, CipherAlgorithm, CipherConfig, PaddingScheme};
use crate::types::{PackageError, Result};

pub const BLOCK_SIZE: usize = 16;

enum AesKind {
    Aes128(Aes128),
    Aes192(Aes192),
    Aes256(Aes256),
}

impl AesKind {
    fn new(alg: CipherAlgorithm, key: &[u8]) -> Result<Self> {
        let bad_key = |_| PackageError::ConfigInvalid("AES key length rejected".into());
        Ok(match alg {
            CipherAlgorithm::Aes128 => AesKind::Aes128(Aes128::new_from_slice(key).map_err(bad_key)?),
            CipherAlgorithm::Aes192 => AesKind::Aes192(Aes192::new_from_slice(key).map_err(bad_key)?),
            CipherAlgorithm::Aes256 => AesKind::Aes256(Aes256::new_from_slice(key).map_err(bad_key)?),
            _ => {
                return Err(PackageError::ConfigInvalid(
                    "not a block cipher".into(),
                ))
            }
        })
    }

    fn encrypt_block(&self, block: &mut [u8; BLOCK_SIZE]) {
        let ga = GenericArray::from_mut_slice(block);
        match self {
            AesKind::Aes128(c) => c.encrypt_block(ga),
            AesKind::Aes192(c) => c.encrypt_block(ga),
            AesKind::Aes256(c) => c.encrypt_block(ga),
        }
    }

    fn decrypt_block(&self, block: &mut [u8; BLOCK_SIZE]) {
        let ga = GenericArray::from_mut_slice(block);
        match self {
            AesKind::Aes128(c) => c.decrypt_block(ga),
            AesKind::Aes192(c) => c.decrypt_block(ga),
            AesKind::Aes256(c) => c.decrypt_block(ga),
        }
    }
}

pub struct BlockEngine {
    encrypt: bool,
    mode: BlockMode,
    padding: PaddingScheme,
    cipher: AesKind,
    iv: [u8; BLOCK_SIZE],
    /// CTR counter block, OFB keystream register, or CBC/CFB/CTS chaining
    /// value, depending on the mode.
    state: [u8; BLOCK_SIZE],
    /// Block pending release: decrypted plaintext for padded CBC, the
    /// last ciphertext block (encrypt) or undecrypted input block
    /// (decrypt) for CTS.
    held: Option<[u8; BLOCK_SIZE]>,
}

impl BlockEngine {
    pub fn new(encrypt: bool, cfg: &CipherConfig, key: &[u8]) -> Result<Self> {
        let alg = CipherAlgorithm::verify(cfg.cipher)?;
        let mode = BlockMode::verify(cfg.mode)?;
        if mode.is_aead() {
            return Err(PackageError::ConfigInvalid(
                "AEAD modes are constructed through the AEAD engine".into(),
            ));
        }
        let padding = PaddingScheme::verify(cfg.padding)?;
        let cipher = AesKind::new(alg, key)?;
        let mut iv = [0u8; BLOCK_SIZE];
        if cfg.iv.len() != BLOCK_SIZE {
            return Err(PackageError::ConfigInvalid(
                "block mode IV must be one block".into(),
            ));
        }
        iv.copy_from_slice(&cfg.iv);
        Ok(BlockEngine {
            encrypt,
            mode,
            padding,
            cipher,
            iv,
            state: iv,
            held: None,
        })
    }

    pub fn operation_size(&self) -> usize {
        BLOCK_SIZE
    }

    pub fn reset(&mut self) {
        self.state = self.iv;
        self.held = None;
    }

    /// Process exactly one operation; appends output and returns its length.
    pub fn process(&mut self, input: &[u8], out: &mut Vec<u8>) -> Result<usize> {
        debug_assert_eq!(input.len(), BLOCK_SIZE);
        let mut block = [0u8; BLOCK_SIZE];
        block.copy_from_slice(input);
        match self.mode {
            BlockMode::Ctr => {
                let mut ks = self.state;
                self.cipher.encrypt_block(&mut ks);
                increment_be(&mut self.state);
                xor_into(&mut block, &ks);
                out.extend_from_slice(&block);
                ks.zeroize();
                Ok(BLOCK_SIZE)
            }
            BlockMode::Ofb => {
                self.cipher.encrypt_block(&mut self.state);
                xor_into(&mut block, &self.state);
                out.extend_from_slice(&block);
                Ok(BLOCK_SIZE)
            }
            BlockMode::Cfb => {
                let mut ks = self.state;
                self.cipher.encrypt_block(&mut ks);
                xor_into(&mut block, &ks);
                // Feedback is the ciphertext, whichever side produced it.
                self.state = if self.encrypt { block } else { *array_ref(input) };
                out.extend_from_slice(&block);
                ks.zeroize();
                Ok(BLOCK_SIZE)
            }
            BlockMode::Cbc if self.encrypt => {
                xor_into(&mut block, &self.state);
                self.cipher.encrypt_block(&mut block);
                self.state = block;
                out.extend_from_slice(&block);
                Ok(BLOCK_SIZE)
            }
            BlockMode::Cbc => {
                let released = self.held.take();
                let mut plain = block;
                self.cipher.decrypt_block(&mut plain);
                xor_into(&mut plain, &self.state);
                self.state = *array_ref(input);
                self.held = Some(plain);
                if let Some(prev) = released {
                    out.extend_from_slice(&prev);
                    Ok(BLOCK_SIZE)
                } else {
                    Ok(0)
                }
            }
            BlockMode::Cts if self.encrypt => {
                // Ordinary CBC, but the newest ciphertext block stays held
                // in case the final partial needs to steal from it.
                xor_into(&mut block, &self.state);
                self.cipher.encrypt_block(&mut block);
                self.state = block;
                let released = self.held.replace(block);
                if let Some(prev) = released {
                    out.extend_from_slice(&prev);
                    Ok(BLOCK_SIZE)
                } else {
                    Ok(0)
                }
            }
            BlockMode::Cts => {
                // Hold the newest ciphertext block undecrypted; the one it
                // displaces is ordinary CBC.
                let released = self.held.replace(*array_ref(input));
                if let Some(cipher_block) = released {
                    let mut plain = cipher_block;
                    self.cipher.decrypt_block(&mut plain);
                    xor_into(&mut plain, &self.state);
                    self.state = cipher_block;
                    out.extend_from_slice(&plain);
                    plain.zeroize();
                    Ok(BLOCK_SIZE)
                } else {
                    Ok(0)
                }
            }
            _ => unreachable!("AEAD modes rejected at construction"),
        }
    }

    /// Process the trailing partial operation and finalize the mode.
    pub fn process_final(&mut self, input: &[u8], out: &mut Vec<u8>) -> Result<usize> {
        debug_assert!(input.len() < BLOCK_SIZE || self.mode != BlockMode::Cbc);
        match self.mode {
            BlockMode::Ctr | BlockMode::Ofb | BlockMode::Cfb => {
                if input.is_empty() {
                    return Ok(0);
                }
                let mut ks = self.state;
                self.cipher.encrypt_block(&mut ks);
                let start = out.len();
                out.extend_from_slice(input);
                for (o, k) in out[start..].iter_mut().zip(ks.iter()) {
                    *o ^= k;
                }
                ks.zeroize();
                Ok(input.len())
            }
            BlockMode::Cbc if self.encrypt => {
                let mut block = pad_block(self.padding, input)?;
                xor_into(&mut block, &self.state);
                self.cipher.encrypt_block(&mut block);
                self.state = block;
                out.extend_from_slice(&block);
                Ok(BLOCK_SIZE)
            }
            BlockMode::Cbc => {
                if !input.is_empty() {
                    return Err(PackageError::IncompleteBlock);
                }
                let mut held = self.held.take().ok_or(PackageError::PaddingCorrupt)?;
                let kept = unpad_block(self.padding, &held)?;
                out.extend_from_slice(&held[..kept]);
                held.zeroize();
                Ok(kept)
            }
            BlockMode::Cts if self.encrypt => {
                // Block-aligned input is plain CBC; a partial final block
                // steals from the held block and the pair swaps.
                let prev = self.held.take().ok_or(PackageError::IncompleteBlock)?;
                if input.is_empty() {
                    out.extend_from_slice(&prev);
                    return Ok(BLOCK_SIZE);
                }
                let mut stolen = [0u8; BLOCK_SIZE];
                stolen[..input.len()].copy_from_slice(input);
                xor_into(&mut stolen, &prev);
                self.cipher.encrypt_block(&mut stolen);
                out.extend_from_slice(&stolen);
                out.extend_from_slice(&prev[..input.len()]);
                Ok(BLOCK_SIZE + input.len())
            }
            BlockMode::Cts => {
                let last = self.held.take().ok_or(PackageError::IncompleteBlock)?;
                if input.is_empty() {
                    let mut plain = last;
                    self.cipher.decrypt_block(&mut plain);
                    xor_into(&mut plain, &self.state);
                    out.extend_from_slice(&plain);
                    plain.zeroize();
                    return Ok(BLOCK_SIZE);
                }
                // `last` is the swapped-forward final block; `input` is the
                // truncated block it stole from. Rebuild the stolen block
                // from the decryption's tail, then undo both blocks.
                let mut decrypted = last;
                self.cipher.decrypt_block(&mut decrypted);
                let mut stolen_from = decrypted;
                stolen_from[..input.len()].copy_from_slice(input);
                let mut last_plain = [0u8; BLOCK_SIZE];
                for i in 0..input.len() {
                    last_plain[i] = decrypted[i] ^ stolen_from[i];
                }
                let mut first_plain = stolen_from;
                self.cipher.decrypt_block(&mut first_plain);
                xor_into(&mut first_plain, &self.state);
                out.extend_from_slice(&first_plain);
                out.extend_from_slice(&last_plain[..input.len()]);
                first_plain.zeroize();
                decrypted.zeroize();
                last_plain.zeroize();
                Ok(BLOCK_SIZE + input.len())
            }
            _ => unreachable!("AEAD modes rejected at construction"),
        }
    }
}

#[inline]
fn xor_into(dst: &mut [u8; BLOCK_SIZE], src: &[u8; BLOCK_SIZE]) {
    for (d, s) in dst.iter_mut().zip(src.iter()) {
        *d ^= s;
    }
}

#[inline]
fn increment_be(counter: &mut [u8; BLOCK_SIZE]) {
    for byte in counter.iter_mut().rev() {
        *byte = byte.wrapping_add(1);
        if *byte != 0 {
            break;
        }
    }
}

#[inline]
fn array_ref(slice: &[u8]) -> &[u8; BLOCK_SIZE] {
    slice.try_into().expect("operation-sized input")
}

/// Pad a partial block (possibly empty) out to a full block.
fn pad_block(scheme: PaddingScheme, input: &[u8]) -> Result<[u8; BLOCK_SIZE]> {
    let mut block = [0u8; BLOCK_SIZE];
    block[..input.len()].copy_from_slice(input);
    let fill = (BLOCK_SIZE - input.len()) as u8;
    match scheme {
        PaddingScheme::Pkcs7 => {
            for b in block[input.len()..].iter_mut() {
                *b = fill;
            }
        }
        PaddingScheme::Iso7816 => {
            block[input.len()] = 0x80;
        }
        PaddingScheme::X923 => {
            block[BLOCK_SIZE - 1] = fill;
        }
        PaddingScheme::None => {
            return Err(PackageError::ConfigInvalid(
                "CBC without padding cannot finalize a partial block".into(),
            ))
        }
    }
    Ok(block)
}

/// Parse final-block padding; returns the count of payload bytes kept.
fn unpad_block(scheme: PaddingScheme, block: &[u8; BLOCK_SIZE]) -> Result<usize> {
    match scheme {
        PaddingScheme::Pkcs7 => {
            let fill = block[BLOCK_SIZE - 1] as usize;
            if fill == 0 || fill > BLOCK_SIZE {
                return Err(PackageError::PaddingCorrupt);
            }
            if block[BLOCK_SIZE - fill..].iter().any(|&b| b as usize != fill) {
                return Err(PackageError::PaddingCorrupt);
            }
            Ok(BLOCK_SIZE - fill)
        }
        PaddingScheme::Iso7816 => {
            let marker = block
                .iter()
                .rposition(|&b| b != 0)
                .ok_or(PackageError::PaddingCorrupt)?;
            if block[marker] != 0x80 {
                return Err(PackageError::PaddingCorrupt);
            }
            Ok(marker)
        }
        PaddingScheme::X923 => {
            let fill = block[BLOCK_SIZE - 1] as usize;
            if fill == 0 || fill > BLOCK_SIZE {
                return Err(PackageError::PaddingCorrupt);
            }
            if block[BLOCK_SIZE - fill..BLOCK_SIZE - 1].iter().any(|&b| b != 0) {
                return Err(PackageError::PaddingCorrupt);
            }
            Ok(BLOCK_SIZE - fill)
        }
        PaddingScheme::None => Err(PackageError::PaddingCorrupt),
    }
}
