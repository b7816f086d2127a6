pub mod formula;

pub use formula::{Formula, FormulaError};

use rand::Rng;
use rand::distributions::Distribution;
use statrs::distribution::Normal;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// Energy resolution `sigma(eta, energy)` of one calorimeter.
pub trait ResolutionFunction: Send + Sync {
    fn sigma(&self, eta: f64, energy: f64) -> f64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroResolution;

impl ResolutionFunction for ZeroResolution {
    fn sigma(&self, _eta: f64, _energy: f64) -> f64 {
        0.0
    }
}

impl<F> ResolutionFunction for F
where
    F: Fn(f64, f64) -> f64 + Send + Sync,
{
    fn sigma(&self, eta: f64, energy: f64) -> f64 {
        self(eta, energy)
    }
}

/// ECal and HCal resolution functions.
#[derive(Clone)]
pub struct ResolutionModel {
    ecal: Arc<dyn ResolutionFunction>,
    hcal: Arc<dyn ResolutionFunction>,
}

impl Default for ResolutionModel {
    fn default() -> Self {
        Self::new(Arc::new(ZeroResolution), Arc::new(ZeroResolution))
    }
}

impl Debug for ResolutionModel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolutionModel").finish_non_exhaustive()
    }
}

impl ResolutionModel {
    pub fn new(ecal: Arc<dyn ResolutionFunction>, hcal: Arc<dyn ResolutionFunction>) -> Self {
        Self { ecal, hcal }
    }

    pub fn from_formulas(ecal: &str, hcal: &str) -> Result<Self, FormulaError> {
        Ok(Self::new(
            Arc::new(Formula::compile(ecal)?),
            Arc::new(Formula::compile(hcal)?),
        ))
    }

    pub fn ecal_sigma(&self, eta: f64, energy: f64) -> f64 {
        self.ecal.sigma(eta, energy)
    }

    pub fn hcal_sigma(&self, eta: f64, energy: f64) -> f64 {
        self.hcal.sigma(eta, energy)
    }
}

/// Log-normal draw whose linear-space mean and standard deviation are `mean`
/// and `sigma`. Non-positive means give `0` without touching `rng`.
pub fn smear_log_normal<R: Rng + ?Sized>(mean: f64, sigma: f64, rng: &mut R) -> f64 {
    if mean <= 0.0 {
        return 0.0;
    }

    let b = (1.0 + (sigma * sigma) / (mean * mean)).ln().sqrt();
    let a = mean.ln() - 0.5 * b * b;
    let z = Normal::standard().sample(rng);

    (a + b * z).exp()
}
