//! # Identifier Generation
//!
//! Collision-checked random identifiers: receipt numbers and generated UPCs.
//!
//! ## Allocation Loop
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       allocate_unique                                   │
//! │                                                                         │
//! │   attempt 1..=10                                                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │   generate(length, alphabet)     RNG bytes → byte % alphabet.len()     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │   probe.exists(candidate)        caller's query, inside its transaction│
//! │       │                                                                 │
//! │       ├── false → return candidate                                     │
//! │       └── true  → next attempt                                         │
//! │                                                                         │
//! │   all attempts taken → GenerationExhausted                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Both the randomness source and the probe are injected, so the loop runs
//! against a seeded `StdRng` and an in-memory probe in tests.

use std::future::Future;

use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;

use crate::error::{CoreError, ValidationError};

/// Lowercase, uppercase and digits. Used for receipt numbers.
pub const ALPHANUMERIC: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Decimal digits. Used for generated UPCs.
pub const NUMERIC: &[u8] = b"0123456789";

/// Candidates tried before giving up.
pub const MAX_ALLOCATION_ATTEMPTS: usize = 10;

// =============================================================================
// Existence Probe
// =============================================================================

/// Answers whether a candidate identifier is already taken.
///
/// Implemented by the database layer over a transaction connection and by
/// in-memory sets in tests.
pub trait ExistenceCheck {
    type Error;

    fn exists(&mut self, candidate: &str) -> impl Future<Output = Result<bool, Self::Error>> + Send;
}

/// Failure of [`IdGenerator::allocate_unique`].
#[derive(Debug, Error)]
pub enum AllocationError<E> {
    /// Generation failed or every attempt collided.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The probe itself failed.
    #[error("existence check failed: {0}")]
    Probe(E),
}

// =============================================================================
// Generator
// =============================================================================

/// Random identifier generator over an injectable RNG.
#[derive(Debug, Clone)]
pub struct IdGenerator<R = OsRng> {
    rng: R,
}

impl IdGenerator<OsRng> {
    /// Generator backed by the operating system CSPRNG.
    pub fn os() -> Self {
        IdGenerator { rng: OsRng }
    }
}

impl Default for IdGenerator<OsRng> {
    fn default() -> Self {
        IdGenerator::os()
    }
}

impl<R: RngCore> IdGenerator<R> {
    pub fn with_rng(rng: R) -> Self {
        IdGenerator { rng }
    }

    /// Draws `length` random bytes and maps each onto `alphabet` by modulo.
    ///
    /// ## Example
    /// ```rust
    /// use rand::{rngs::StdRng, SeedableRng};
    /// use stockroom_core::ids::{IdGenerator, NUMERIC};
    ///
    /// let mut ids = IdGenerator::with_rng(StdRng::seed_from_u64(7));
    /// let upc = ids.generate(12, NUMERIC).unwrap();
    /// assert_eq!(upc.len(), 12);
    /// assert!(upc.bytes().all(|b| b.is_ascii_digit()));
    /// ```
    pub fn generate(&mut self, length: usize, alphabet: &[u8]) -> Result<String, CoreError> {
        if alphabet.is_empty() {
            return Err(ValidationError::Required {
                field: "alphabet".to_string(),
            }
            .into());
        }

        let mut bytes = vec![0u8; length];
        self.rng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| CoreError::RandomSource(e.to_string()))?;

        Ok(bytes
            .iter()
            .map(|b| alphabet[*b as usize % alphabet.len()] as char)
            .collect())
    }

    /// Generates candidates until `probe` reports one as unused.
    pub async fn allocate_unique<P>(
        &mut self,
        length: usize,
        alphabet: &[u8],
        probe: &mut P,
    ) -> Result<String, AllocationError<P::Error>>
    where
        P: ExistenceCheck,
    {
        for attempt in 1..=MAX_ALLOCATION_ATTEMPTS {
            let candidate = self.generate(length, alphabet)?;
            if !probe.exists(&candidate).await.map_err(AllocationError::Probe)? {
                return Ok(candidate);
            }
            tracing::debug!(attempt, "identifier collision, retrying");
        }

        Err(CoreError::GenerationExhausted {
            attempts: MAX_ALLOCATION_ATTEMPTS,
        }
        .into())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
