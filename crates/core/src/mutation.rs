//! Mutation engine: one reading in, `clone_count` perturbed readings out.
//!
//! Each derived reading advances the timestamp by its 1-based position and
//! scales temperature and humidity by an independently drawn variance:
//! `value + value * variance`, with `variance` drawn uniformly from
//! `[min_variance, max_variance)`.

use std::sync::{Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use validator::{Validate, ValidationError};

use crate::config::{env_parse, ConfigError};
use crate::error::CoreError;
use crate::reading::Reading;

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

pub const DEFAULT_MIN_VARIANCE: f64 = -0.2;
pub const DEFAULT_MAX_VARIANCE: f64 = 0.2;
pub const DEFAULT_CLONE_COUNT: u32 = 300;

// ---------------------------------------------------------------------------
// MutationPolicy
// ---------------------------------------------------------------------------

/// Bounds and fan-out of the mutation engine.
///
/// Loaded once at startup and shared read-only afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Validate)]
#[validate(schema(function = "validate_variance_bounds"))]
pub struct MutationPolicy {
    /// Lower bound of the signed fractional variance (e.g. `-0.2`).
    pub min_variance: f64,
    /// Upper bound of the signed fractional variance (e.g. `0.2`).
    pub max_variance: f64,
    /// Number of derived readings per input reading. Zero is valid.
    pub clone_count: u32,
}

impl Default for MutationPolicy {
    fn default() -> Self {
        Self {
            min_variance: DEFAULT_MIN_VARIANCE,
            max_variance: DEFAULT_MAX_VARIANCE,
            clone_count: DEFAULT_CLONE_COUNT,
        }
    }
}

impl MutationPolicy {
    /// Load the policy from environment variables with defaults.
    ///
    /// | Env Var        | Default |
    /// |----------------|---------|
    /// | `MIN_VARIANCE` | `-0.2`  |
    /// | `MAX_VARIANCE` | `0.2`   |
    /// | `CLONE_NUM`    | `300`   |
    pub fn from_env() -> Result<Self, ConfigError> {
        let policy = Self {
            min_variance: env_parse("MIN_VARIANCE", DEFAULT_MIN_VARIANCE)?,
            max_variance: env_parse("MAX_VARIANCE", DEFAULT_MAX_VARIANCE)?,
            clone_count: env_parse("CLONE_NUM", DEFAULT_CLONE_COUNT)?,
        };
        policy.validate()?;
        Ok(policy)
    }
}

fn validate_variance_bounds(policy: &MutationPolicy) -> Result<(), ValidationError> {
    if !policy.min_variance.is_finite() || !policy.max_variance.is_finite() {
        return Err(ValidationError::new("variance_not_finite")
            .with_message("variance bounds must be finite numbers".into()));
    }
    if policy.min_variance > policy.max_variance {
        return Err(ValidationError::new("variance_bounds_inverted")
            .with_message("MIN_VARIANCE must not exceed MAX_VARIANCE".into()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Multiplier
// ---------------------------------------------------------------------------

/// The mutation engine.
///
/// Owns its random source behind a mutex so concurrent adapters can call
/// [`multiply`](Self::multiply) through a shared reference. The lock is held
/// only for the draws of a single call.
pub struct Multiplier {
    policy: MutationPolicy,
    rng: Mutex<StdRng>,
}

impl Multiplier {
    /// Create an engine seeded from the operating system.
    pub fn new(policy: MutationPolicy) -> Self {
        Self::with_rng(policy, StdRng::from_os_rng())
    }

    /// Create an engine with a fixed seed; identical seeds give identical output.
    pub fn seeded(policy: MutationPolicy, seed: u64) -> Self {
        Self::with_rng(policy, StdRng::seed_from_u64(seed))
    }

    fn with_rng(policy: MutationPolicy, rng: StdRng) -> Self {
        Self {
            policy,
            rng: Mutex::new(rng),
        }
    }

    pub fn policy(&self) -> &MutationPolicy {
        &self.policy
    }

    /// Derive `clone_count` readings from `reading`.
    ///
    /// The `i`-th result (1-based) carries `reading.timestamp + i` and the
    /// original device id. Fails when the last timestamp would overflow or a
    /// mutated value leaves the finite `f64` range.
    pub fn multiply(&self, reading: &Reading) -> Result<Vec<Reading>, CoreError> {
        let clone_count = self.policy.clone_count;

        if reading
            .timestamp
            .checked_add(i64::from(clone_count))
            .is_none()
        {
            return Err(CoreError::TimestampOverflow {
                timestamp: reading.timestamp,
                clone_count,
            });
        }

        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);

        let mut derived = Vec::with_capacity(clone_count as usize);
        for offset in 1..=i64::from(clone_count) {
            let timestamp = reading.timestamp + offset;
            let temperature = self.mutate(&mut rng, reading.temperature);
            let humidity = self.mutate(&mut rng, reading.humidity);
            ensure_finite("temperature", temperature, timestamp)?;
            ensure_finite("humidity", humidity, timestamp)?;

            derived.push(Reading {
                device_id: reading.device_id.clone(),
                timestamp,
                temperature,
                humidity,
            });
        }

        Ok(derived)
    }

    fn mutate(&self, rng: &mut StdRng, value: f64) -> f64 {
        let variance = draw_variance(rng, self.policy.min_variance, self.policy.max_variance);
        value + value * variance
    }
}

fn ensure_finite(field: &'static str, value: f64, timestamp: i64) -> Result<(), CoreError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(CoreError::NonFiniteValue { field, timestamp })
    }
}

/// Uniform draw in `[min, max)`.
///
/// Never panics: inverted bounds yield a value in `(max, min]`.
fn draw_variance(rng: &mut impl Rng, min: f64, max: f64) -> f64 {
    min + rng.random::<f64>() * (max - min)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
