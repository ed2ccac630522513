//! Sampling policies deciding whether a new trace gets recorded at all.
use lazy_static::lazy_static;
use rand::Rng;
use std::sync::{Arc, RwLock};
use thiserror::Error;

/// Decides, at the root of an operation, whether the whole trace should
/// be recorded. Consulted once per root; descendants inherit the
/// decision. Implementations must be pure enough to call from any number
/// of threads without coordination.
pub trait Sampler: Send + Sync {
    fn should_sample(&self) -> bool;
}

/// Samples every trace. Deterministic, for tests and debugging.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysSampler;

impl Sampler for AlwaysSampler {
    fn should_sample(&self) -> bool {
        true
    }
}

/// Samples nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverSampler;

impl Sampler for NeverSampler {
    fn should_sample(&self) -> bool {
        false
    }
}

#[derive(Debug, Error)]
pub enum SamplerError {
    #[error("sampling rate {0} is outside [0.0, 1.0]")]
    InvalidRate(f64),
}

/// Samples each trace independently with fixed probability.
#[derive(Debug, Clone, Copy)]
pub struct ProbabilitySampler {
    rate: f64,
}

impl ProbabilitySampler {
    pub fn new(rate: f64) -> Result<Self, SamplerError> {
        if !(0.0..=1.0).contains(&rate) {
            return Err(SamplerError::InvalidRate(rate));
        }
        Ok(ProbabilitySampler { rate })
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }
}

impl Sampler for ProbabilitySampler {
    fn should_sample(&self) -> bool {
        // gen() yields [0, 1), so rate 0.0 never fires and 1.0 always does
        rand::thread_rng().gen::<f64>() < self.rate
    }
}

lazy_static! {
    static ref DEFAULT_SAMPLER: RwLock<Arc<dyn Sampler>> =
        RwLock::new(Arc::new(NeverSampler) as Arc<dyn Sampler>);
}

/// Replace the process-wide default sampler. Tracing starts out disabled
/// ([`NeverSampler`]) until the host application opts in.
pub fn set_default_sampler(sampler: Arc<dyn Sampler>) {
    *DEFAULT_SAMPLER.write().unwrap() = sampler;
}

/// The process-wide default sampler, for call sites that do not carry an
/// explicit policy.
pub fn default_sampler() -> Arc<dyn Sampler> {
    DEFAULT_SAMPLER.read().unwrap().clone()
}
