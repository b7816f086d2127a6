use serde::{Deserialize, Serialize};

const ETA_AT_POLE: f64 = 1.0e10;

/// Four-vector stored as cartesian components `(x, y, z, t)`.
///
/// Used both for positions (`t` is time) and momenta (`t` is energy).
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize, Serialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct LorentzVector {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub t: f64,
}

impl LorentzVector {
    pub const fn new(x: f64, y: f64, z: f64, t: f64) -> Self {
        Self { x, y, z, t }
    }

    pub fn from_pt_eta_phi_e(pt: f64, eta: f64, phi: f64, e: f64) -> Self {
        let mut vector = Self::default();
        vector.set_pt_eta_phi_e(pt, eta, phi, e);
        vector
    }

    pub fn set_pt_eta_phi_e(&mut self, pt: f64, eta: f64, phi: f64, e: f64) {
        let pt = pt.abs();
        self.x = pt * phi.cos();
        self.y = pt * phi.sin();
        self.z = pt * eta.sinh();
        self.t = e;
    }

    pub fn pt(&self) -> f64 {
        self.x.hypot(self.y)
    }

    /// Pseudorapidity of the spatial part. Vectors along the beam axis report
    /// `±1e10`, the null vector reports `0`.
    pub fn eta(&self) -> f64 {
        let pt = self.pt();
        if pt > 0.0 {
            return (self.z / pt).asinh();
        }
        if self.z == 0.0 {
            0.0
        } else {
            ETA_AT_POLE.copysign(self.z)
        }
    }

    pub fn phi(&self) -> f64 {
        if self.x == 0.0 && self.y == 0.0 {
            0.0
        } else {
            self.y.atan2(self.x)
        }
    }

    pub fn energy(&self) -> f64 {
        self.t
    }

    pub fn time(&self) -> f64 {
        self.t
    }
}

impl From<[f64; 4]> for LorentzVector {
    fn from(value: [f64; 4]) -> Self {
        Self::new(value[0], value[1], value[2], value[3])
    }
}

impl From<LorentzVector> for [f64; 4] {
    fn from(value: LorentzVector) -> Self {
        [value.x, value.y, value.z, value.t]
    }
}
