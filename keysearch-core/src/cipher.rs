// SPDX-License-Identifier: MIT
//
// Keysearch: Constrained Keystream Key Recovery
// Copyright (c) 2025 Keysearch Contributors

//! Keystream cipher primitive
//!
//! The search engine treats the cipher as a pure function of `(key, ciphertext)`.
//! Mutable state (the permutation table) lives in a caller-owned scratch value so
//! that every worker keeps its own copy and the primitive itself can be shared.

use crate::{Error, Result};

/// A symmetric keystream cipher usable by the search engine
pub trait KeystreamCipher: Send + Sync + 'static {
    /// Per-worker mutable state, rebuilt on every call
    type Scratch: Send;

    /// Human-readable algorithm name
    fn name(&self) -> &'static str;

    /// Allocate scratch state for one worker
    fn new_scratch(&self) -> Self::Scratch;

    /// Reject key lengths or ciphertexts the primitive cannot process.
    ///
    /// Called once at startup, never per candidate.
    fn check(&self, key_len: usize, ciphertext_len: usize) -> Result<()>;

    /// Length of the plaintext recovered from a ciphertext of the given length
    fn plaintext_len(&self, ciphertext_len: usize) -> usize;

    /// Decrypt the first `out.len()` plaintext bytes into `out`.
    ///
    /// `out.len()` must not exceed `plaintext_len(ciphertext.len())`.
    fn decrypt_into(
        &self,
        key: &[u8],
        ciphertext: &[u8],
        scratch: &mut Self::Scratch,
        out: &mut [u8],
    );

    /// Encrypt a plaintext, producing a ciphertext this cipher can decrypt
    fn encrypt(&self, key: &[u8], plaintext: &[u8]) -> Vec<u8>;

    /// Decrypt a whole ciphertext with fresh scratch state
    fn decrypt(&self, key: &[u8], ciphertext: &[u8]) -> Vec<u8> {
        let mut scratch = self.new_scratch();
        let mut out = vec![0u8; self.plaintext_len(ciphertext.len())];
        self.decrypt_into(key, ciphertext, &mut scratch, &mut out);
        out
    }
}

/// RC4 permutation table
#[derive(Clone)]
pub struct Rc4State {
    s: [u8; 256],
}

impl Default for Rc4State {
    fn default() -> Self {
        Self { s: [0u8; 256] }
    }
}

impl Rc4State {
    /// Key-scheduling algorithm: reset the table and mix in the key.
    ///
    /// An empty key leaves the identity permutation; `check` rejects it for searches.
    #[inline]
    fn schedule(&mut self, key: &[u8]) {
        for (i, v) in self.s.iter_mut().enumerate() {
            *v = i as u8;
        }
        if key.is_empty() {
            return;
        }

        let mut j: u8 = 0;
        let mut k = 0usize;
        for i in 0..256usize {
            let si = self.s[i];
            j = j.wrapping_add(si).wrapping_add(key[k]);
            self.s.swap(i, j as usize);

            k += 1;
            if k == key.len() {
                k = 0;
            }
        }
    }

    /// Pseudo-random generation: XOR the keystream over `input` into `out`
    #[inline]
    fn apply(&mut self, input: &[u8], out: &mut [u8]) {
        let mut i: u8 = 0;
        let mut j: u8 = 0;
        for (dst, &src) in out.iter_mut().zip(input) {
            i = i.wrapping_add(1);
            let si = self.s[i as usize];
            j = j.wrapping_add(si);
            let sj = self.s[j as usize];
            self.s[i as usize] = sj;
            self.s[j as usize] = si;
            *dst = src ^ self.s[si.wrapping_add(sj) as usize];
        }
    }
}

/// RC4 with an optional cleartext trailer.
///
/// Payloads recovered from binaries often carry a fixed framing byte (a NUL
/// terminator) after the encrypted body. The trailer is excluded from
/// decryption and re-appended as zero bytes by `encrypt`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rc4 {
    trailer_len: usize,
}

impl Rc4 {
    /// Longest key the key schedule consumes
    pub const MAX_KEY_LEN: usize = 256;

    /// Plain RC4, every ciphertext byte is decrypted
    pub fn new() -> Self {
        Self { trailer_len: 0 }
    }

    /// RC4 over all but the last `trailer_len` bytes
    pub fn with_trailer(trailer_len: usize) -> Self {
        Self { trailer_len }
    }

    pub fn trailer_len(&self) -> usize {
        self.trailer_len
    }
}

impl KeystreamCipher for Rc4 {
    type Scratch = Rc4State;

    fn name(&self) -> &'static str {
        "rc4"
    }

    fn new_scratch(&self) -> Rc4State {
        Rc4State::default()
    }

    fn check(&self, key_len: usize, ciphertext_len: usize) -> Result<()> {
        if key_len == 0 || key_len > Self::MAX_KEY_LEN {
            return Err(Error::Cipher(format!(
                "RC4 key length must be between 1 and {}, got {}",
                Self::MAX_KEY_LEN,
                key_len
            )));
        }

        if ciphertext_len <= self.trailer_len {
            return Err(Error::Cipher(format!(
                "Ciphertext of {} bytes leaves nothing to decrypt after a {}-byte trailer",
                ciphertext_len, self.trailer_len
            )));
        }

        Ok(())
    }

    fn plaintext_len(&self, ciphertext_len: usize) -> usize {
        ciphertext_len.saturating_sub(self.trailer_len)
    }

    fn decrypt_into(
        &self,
        key: &[u8],
        ciphertext: &[u8],
        scratch: &mut Rc4State,
        out: &mut [u8],
    ) {
        debug_assert!(out.len() <= self.plaintext_len(ciphertext.len()));
        scratch.schedule(key);
        scratch.apply(ciphertext, out);
    }

    fn encrypt(&self, key: &[u8], plaintext: &[u8]) -> Vec<u8> {
        let mut scratch = self.new_scratch();
        let mut out = vec![0u8; plaintext.len() + self.trailer_len];
        scratch.schedule(key);
        scratch.apply(plaintext, &mut out[..plaintext.len()]);
        out
    }
}
