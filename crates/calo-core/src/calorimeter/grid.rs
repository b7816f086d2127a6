//! Angular tower grid.
//!
//! The grid is a sorted list of eta boundaries; every eta boundary carries its
//! own sorted list of phi boundaries, which are used for the bin that ends at
//! that boundary. Bin numbers run over `1..len`, `0` never names a bin.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::f64::consts::PI;

const MAX_BOUNDARIES: usize = u16::MAX as usize;

/// One configuration entry: every eta value listed gets every phi value.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EtaPhiBinSpec {
    pub eta: Vec<f64>,
    #[serde(default)]
    pub phi: Vec<f64>,
    /// Adds `n + 1` uniform phi boundaries spanning `[-pi, pi]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phi_divisions: Option<usize>,
}

impl EtaPhiBinSpec {
    pub fn new(eta: Vec<f64>, phi: Vec<f64>) -> Self {
        Self {
            eta,
            phi,
            phi_divisions: None,
        }
    }

    pub fn with_uniform_phi(eta: Vec<f64>, divisions: usize) -> Self {
        Self {
            eta,
            phi: Vec::new(),
            phi_divisions: Some(divisions),
        }
    }

    fn phi_values(&self) -> Result<Vec<f64>, GridError> {
        let mut values = self.phi.clone();
        if let Some(divisions) = self.phi_divisions {
            if divisions == 0 {
                return Err(GridError::InvalidPhiDivisions { divisions });
            }
            let step = 2.0 * PI / divisions as f64;
            values.extend((0..=divisions).map(|index| {
                if index == divisions {
                    PI
                } else {
                    -PI + step * index as f64
                }
            }));
        }
        Ok(values)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GridError {
    #[error("tower grid needs at least 2 eta boundaries, got {actual}")]
    TooFewEtaBoundaries { actual: usize },
    #[error(
        "eta bin {eta_bin} ({lo}, {hi}] needs at least 2 phi boundaries, got {actual}"
    )]
    TooFewPhiBoundaries {
        eta_bin: usize,
        lo: f64,
        hi: f64,
        actual: usize,
    },
    #[error("{axis} boundary must be finite, got {value}")]
    NonFiniteBoundary { axis: &'static str, value: f64 },
    #[error("{axis} axis has {actual} boundaries, at most {max} are supported")]
    TooManyBoundaries {
        axis: &'static str,
        actual: usize,
        max: usize,
    },
    #[error("phi divisions must be positive, got {divisions}")]
    InvalidPhiDivisions { divisions: usize },
    #[error("{axis} bin ({lo}, {hi}] has a width that overflows f64")]
    UnboundedBinWidth {
        axis: &'static str,
        lo: f64,
        hi: f64,
    },
}

/// Eta/phi bin pair; `1`-based on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TowerCell {
    pub eta_bin: u16,
    pub phi_bin: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GridIndex {
    eta_bins: Vec<f64>,
    phi_bins: Vec<Vec<f64>>,
}

impl GridIndex {
    pub fn from_specs(specs: &[EtaPhiBinSpec]) -> Result<Self, GridError> {
        let mut merged: BTreeMap<OrderedFloat<f64>, BTreeSet<OrderedFloat<f64>>> =
            BTreeMap::new();

        for spec in specs {
            let phi_values = spec.phi_values()?;
            for &phi in &phi_values {
                check_finite("phi", phi)?;
            }
            for &eta in &spec.eta {
                check_finite("eta", eta)?;
                let phi_set = merged.entry(OrderedFloat(eta)).or_default();
                phi_set.extend(phi_values.iter().map(|&phi| OrderedFloat(phi)));
            }
        }

        let eta_bins = merged.keys().map(|eta| eta.0).collect::<Vec<_>>();
        let phi_bins = merged
            .values()
            .map(|phi_set| phi_set.iter().map(|phi| phi.0).collect::<Vec<_>>())
            .collect::<Vec<_>>();

        Self::from_boundaries(eta_bins, phi_bins)
    }

    /// Rectangular grid: the same phi boundaries for every eta bin.
    pub fn uniform(eta: &[f64], phi: &[f64]) -> Result<Self, GridError> {
        Self::from_specs(&[EtaPhiBinSpec::new(eta.to_vec(), phi.to_vec())])
    }

    fn from_boundaries(eta_bins: Vec<f64>, phi_bins: Vec<Vec<f64>>) -> Result<Self, GridError> {
        if eta_bins.len() < 2 {
            return Err(GridError::TooFewEtaBoundaries {
                actual: eta_bins.len(),
            });
        }
        if eta_bins.len() > MAX_BOUNDARIES {
            return Err(GridError::TooManyBoundaries {
                axis: "eta",
                actual: eta_bins.len(),
                max: MAX_BOUNDARIES,
            });
        }

        check_bin_widths("eta", &eta_bins)?;
        for eta_bin in 1..eta_bins.len() {
            let phi = &phi_bins[eta_bin];
            if phi.len() < 2 {
                return Err(GridError::TooFewPhiBoundaries {
                    eta_bin,
                    lo: eta_bins[eta_bin - 1],
                    hi: eta_bins[eta_bin],
                    actual: phi.len(),
                });
            }
            if phi.len() > MAX_BOUNDARIES {
                return Err(GridError::TooManyBoundaries {
                    axis: "phi",
                    actual: phi.len(),
                    max: MAX_BOUNDARIES,
                });
            }
            check_bin_widths("phi", phi)?;
        }

        Ok(Self { eta_bins, phi_bins })
    }

    pub fn eta_boundaries(&self) -> &[f64] {
        &self.eta_bins
    }

    pub fn phi_boundaries(&self, eta_bin: u16) -> Option<&[f64]> {
        let eta_bin = usize::from(eta_bin);
        if eta_bin == 0 || eta_bin >= self.eta_bins.len() {
            return None;
        }
        Some(&self.phi_bins[eta_bin])
    }

    pub fn eta_bin_count(&self) -> usize {
        self.eta_bins.len() - 1
    }

    pub fn tower_count(&self) -> usize {
        (1..self.eta_bins.len())
            .map(|eta_bin| self.phi_bins[eta_bin].len() - 1)
            .sum()
    }

    pub fn locate_eta(&self, eta: f64) -> Option<u16> {
        find_bin(&self.eta_bins, eta)
    }

    pub fn locate_phi(&self, eta_bin: u16, phi: f64) -> Option<u16> {
        find_bin(self.phi_boundaries(eta_bin)?, phi)
    }

    pub fn locate(&self, eta: f64, phi: f64) -> Option<TowerCell> {
        let eta_bin = self.locate_eta(eta)?;
        let phi_bin = self.locate_phi(eta_bin, phi)?;
        Some(TowerCell { eta_bin, phi_bin })
    }

    /// `[eta_lo, eta_hi, phi_lo, phi_hi]`, or `None` for a cell outside the grid.
    pub fn edges(&self, cell: TowerCell) -> Option<[f64; 4]> {
        let phi = self.phi_boundaries(cell.eta_bin)?;
        let eta_bin = usize::from(cell.eta_bin);
        let phi_bin = usize::from(cell.phi_bin);
        if phi_bin == 0 || phi_bin >= phi.len() {
            return None;
        }
        Some([
            self.eta_bins[eta_bin - 1],
            self.eta_bins[eta_bin],
            phi[phi_bin - 1],
            phi[phi_bin],
        ])
    }

    pub fn center(&self, cell: TowerCell) -> Option<(f64, f64)> {
        let [eta_lo, eta_hi, phi_lo, phi_hi] = self.edges(cell)?;
        Some((0.5 * (eta_lo + eta_hi), 0.5 * (phi_lo + phi_hi)))
    }
}

fn check_finite(axis: &'static str, value: f64) -> Result<(), GridError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(GridError::NonFiniteBoundary { axis, value })
    }
}

/// Tower directions are drawn uniformly inside a bin; its width must be finite.
fn check_bin_widths(axis: &'static str, boundaries: &[f64]) -> Result<(), GridError> {
    match boundaries
        .windows(2)
        .find(|pair| !(pair[1] - pair[0]).is_finite())
    {
        Some(pair) => Err(GridError::UnboundedBinWidth {
            axis,
            lo: pair[0],
            hi: pair[1],
        }),
        None => Ok(()),
    }
}

/// Index of the first boundary not below `value`, for values strictly inside
/// the outer boundaries. Values on or beyond either outer boundary, and NaN,
/// are out of range.
fn find_bin(boundaries: &[f64], value: f64) -> Option<u16> {
    let first = *boundaries.first()?;
    let last = *boundaries.last()?;
    if !(value > first && value < last) {
        return None;
    }
    let index = boundaries.partition_point(|&boundary| boundary < value);
    u16::try_from(index).ok()
}
