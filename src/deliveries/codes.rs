//! Code generation behind an injected capability so callers never reach for
//! an ad hoc RNG: production uses the process thread RNG (cryptographically
//! sound), tests use a seeded generator for reproducible codes.

use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const ENTRY_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
pub const ENTRY_CODE_LEN: usize = 6;

pub const ACCESS_PASSWORD_ALPHABET: &[u8] = b"0123456789";
pub const ACCESS_PASSWORD_LEN: usize = 4;

pub const VALIDATION_TOKEN_LEN: usize = 16;

fn draw(rng: &mut impl Rng, alphabet: &[u8], len: usize) -> String {
    (0..len)
        .map(|_| alphabet[rng.gen_range(0..alphabet.len())] as char)
        .collect()
}

/// Source for every generated secret in the delivery flow.
pub trait CodeIssuer: Send + Sync {
    /// Human-facing tracking code: uppercase alphanumeric, fixed length.
    fn entry_code(&self) -> String;

    /// Locker-opening secret: digits only, fixed length.
    fn access_password(&self) -> String;

    /// One-time token proving a successful recipient validation.
    fn validation_token(&self) -> String;
}

/// Thread-RNG backed issuer used by the running service.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCodeIssuer;

impl CodeIssuer for SystemCodeIssuer {
    fn entry_code(&self) -> String {
        draw(&mut rand::thread_rng(), ENTRY_CODE_ALPHABET, ENTRY_CODE_LEN)
    }

    fn access_password(&self) -> String {
        draw(
            &mut rand::thread_rng(),
            ACCESS_PASSWORD_ALPHABET,
            ACCESS_PASSWORD_LEN,
        )
    }

    fn validation_token(&self) -> String {
        draw(
            &mut rand::thread_rng(),
            ENTRY_CODE_ALPHABET,
            VALIDATION_TOKEN_LEN,
        )
    }
}

/// Deterministic issuer for tests and the demo transcript.
pub struct SeededCodeIssuer {
    rng: Mutex<StdRng>,
}

impl SeededCodeIssuer {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl CodeIssuer for SeededCodeIssuer {
    fn entry_code(&self) -> String {
        let mut rng = self.rng.lock().expect("code rng mutex poisoned");
        draw(&mut *rng, ENTRY_CODE_ALPHABET, ENTRY_CODE_LEN)
    }

    fn access_password(&self) -> String {
        let mut rng = self.rng.lock().expect("code rng mutex poisoned");
        draw(&mut *rng, ACCESS_PASSWORD_ALPHABET, ACCESS_PASSWORD_LEN)
    }

    fn validation_token(&self) -> String {
        let mut rng = self.rng.lock().expect("code rng mutex poisoned");
        draw(&mut *rng, ENTRY_CODE_ALPHABET, VALIDATION_TOKEN_LEN)
    }
}
