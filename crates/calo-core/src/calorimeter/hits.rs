//! Tower hit encoding.
//!
//! Every particle and track that reaches the grid becomes one `u64`:
//! 16 bits eta bin, 16 bits phi bin, 8 bits flags, 24 bits source index.
//! Sorting the keys groups hits by tower, tracks first within a tower.

use super::fractions::{EnergyFraction, EnergyFractionTable};
use super::grid::{GridIndex, TowerCell};
use crate::domain::{Candidate, CandidateOrigin};
use std::sync::Arc;

pub const TRACK_FLAG: u8 = 0b01;
pub const PHOTON_FLAG: u8 = 0b10;

const NUMBER_MASK: u64 = 0x00FF_FFFF;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HitEncodingError {
    #[error("{origin} index {index} does not fit the 24-bit hit key (max {max})")]
    SourceIndexOverflow {
        origin: CandidateOrigin,
        index: usize,
        max: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TowerHit(u64);

impl TowerHit {
    pub const MAX_NUMBER: usize = NUMBER_MASK as usize;

    /// Packs a hit; `None` when `number` needs more than 24 bits.
    pub fn pack(cell: TowerCell, flags: u8, number: usize) -> Option<Self> {
        if number > Self::MAX_NUMBER {
            return None;
        }
        Some(Self(
            (u64::from(cell.eta_bin) << 48)
                | (u64::from(cell.phi_bin) << 32)
                | (u64::from(flags) << 24)
                | number as u64,
        ))
    }

    pub const fn raw(self) -> u64 {
        self.0
    }

    pub const fn eta_bin(self) -> u16 {
        (self.0 >> 48) as u16
    }

    pub const fn phi_bin(self) -> u16 {
        (self.0 >> 32) as u16
    }

    pub const fn cell(self) -> TowerCell {
        TowerCell {
            eta_bin: self.eta_bin(),
            phi_bin: self.phi_bin(),
        }
    }

    /// Eta and phi bins combined; equal for hits in the same tower.
    pub const fn tower_id(self) -> u32 {
        (self.0 >> 32) as u32
    }

    pub const fn flags(self) -> u8 {
        (self.0 >> 24) as u8
    }

    pub const fn number(self) -> usize {
        (self.0 & NUMBER_MASK) as usize
    }

    pub const fn is_track(self) -> bool {
        self.flags() & TRACK_FLAG != 0
    }

    pub const fn is_photon_like(self) -> bool {
        self.flags() & PHOTON_FLAG != 0
    }
}

pub fn is_photon_like_pid(pid: i32) -> bool {
    matches!(pid.abs(), 11 | 22)
}

/// Fractions of every input object, indexed by source position, including
/// objects that produced no hit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HitFractions {
    pub particles: Vec<EnergyFraction>,
    pub tracks: Vec<EnergyFraction>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncodingStats {
    pub encoded: usize,
    pub skipped_negligible: usize,
    pub skipped_out_of_range: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EncodedHits {
    /// Ascending, so each tower is one contiguous run.
    pub hits: Vec<TowerHit>,
    pub fractions: HitFractions,
    pub stats: EncodingStats,
}

pub struct HitEncoder<'a> {
    grid: &'a GridIndex,
    fractions: &'a EnergyFractionTable,
}

impl<'a> HitEncoder<'a> {
    pub fn new(grid: &'a GridIndex, fractions: &'a EnergyFractionTable) -> Self {
        Self { grid, fractions }
    }

    pub fn encode(
        &self,
        particles: &[Arc<Candidate>],
        tracks: &[Arc<Candidate>],
    ) -> Result<EncodedHits, HitEncodingError> {
        let mut encoded = EncodedHits {
            hits: Vec::with_capacity(particles.len() + tracks.len()),
            fractions: HitFractions {
                particles: Vec::with_capacity(particles.len()),
                tracks: Vec::with_capacity(tracks.len()),
            },
            stats: EncodingStats::default(),
        };

        for (number, particle) in particles.iter().enumerate() {
            let fraction = self.fractions.lookup(particle.pid);
            encoded.fractions.particles.push(fraction);

            if fraction.is_negligible() {
                encoded.stats.skipped_negligible += 1;
                continue;
            }

            let flags = if is_photon_like_pid(particle.pid) {
                PHOTON_FLAG
            } else {
                0
            };
            self.push_hit(&mut encoded, particle, flags, number, CandidateOrigin::Particle)?;
        }

        for (number, track) in tracks.iter().enumerate() {
            encoded.fractions.tracks.push(self.fractions.lookup(track.pid));
            self.push_hit(&mut encoded, track, TRACK_FLAG, number, CandidateOrigin::Track)?;
        }

        encoded.hits.sort_unstable();
        Ok(encoded)
    }

    fn push_hit(
        &self,
        encoded: &mut EncodedHits,
        candidate: &Candidate,
        flags: u8,
        number: usize,
        origin: CandidateOrigin,
    ) -> Result<(), HitEncodingError> {
        let position = &candidate.position;
        let Some(cell) = self.grid.locate(position.eta(), position.phi()) else {
            encoded.stats.skipped_out_of_range += 1;
            return Ok(());
        };

        let hit = TowerHit::pack(cell, flags, number).ok_or(
            HitEncodingError::SourceIndexOverflow {
                origin,
                index: number,
                max: TowerHit::MAX_NUMBER,
            },
        )?;
        encoded.hits.push(hit);
        encoded.stats.encoded += 1;
        Ok(())
    }
}
