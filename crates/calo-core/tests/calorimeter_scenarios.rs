use calo_core::calorimeter::{Calorimeter, EnergyFractionEntry, EnergyFractionTable, GridIndex};
use calo_core::config::CalorimeterConfig;
use calo_core::domain::{Candidate, CandidateOrigin, ExecutionMode, LorentzVector};
use calo_core::event::{EventStore, run_events};
use calo_core::resolution::ResolutionModel;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

fn square_grid() -> GridIndex {
    GridIndex::uniform(&[-1.0, 0.0, 1.0], &[-1.0, 0.0, 1.0]).expect("grid should build")
}

fn position(eta: f64, phi: f64, time: f64) -> LorentzVector {
    LorentzVector::from_pt_eta_phi_e(1.0, eta, phi, time)
}

fn momentum(eta: f64, phi: f64, energy: f64) -> LorentzVector {
    LorentzVector::from_pt_eta_phi_e(energy / eta.cosh(), eta, phi, energy)
}

fn particle(pid: i32, eta: f64, phi: f64, energy: f64) -> Arc<Candidate> {
    Arc::new(Candidate::particle(
        pid,
        position(eta, phi, 0.0),
        momentum(eta, phi, energy),
    ))
}

fn track(pid: i32, eta: f64, phi: f64, energy: f64) -> Arc<Candidate> {
    Arc::new(Candidate::track(
        pid,
        position(eta, phi, 0.0),
        momentum(eta, phi, energy),
    ))
}

fn fractions(entries: &[(i32, f64, f64)]) -> EnergyFractionTable {
    let entries = entries
        .iter()
        .map(|&(pid, ecal, hcal)| EnergyFractionEntry::new(pid, ecal, hcal))
        .collect::<Vec<_>>();
    EnergyFractionTable::from_entries(&entries).expect("fractions should be valid")
}

#[test]
fn single_hadron_forms_one_tower_with_its_full_energy() {
    let calorimeter = Calorimeter::new(
        square_grid(),
        EnergyFractionTable::default(),
        ResolutionModel::default(),
    );
    let particles = vec![particle(211, 0.5, 0.5, 10.0)];

    let output = calorimeter
        .reconstruct(&particles, &[], &mut StdRng::seed_from_u64(1))
        .expect("reconstruction should succeed");

    assert_eq!(output.towers.len(), 1);
    let tower = &output.towers[0];
    assert!((tower.eem + tower.ehad - 10.0).abs() < 1e-9);
    assert!((tower.momentum.energy() - 10.0).abs() < 1e-9);
    assert_eq!(tower.edges, [0.0, 1.0, 0.0, 1.0]);
    assert!(tower.momentum.eta() > 0.0 && tower.momentum.eta() < 1.0);
    assert!(tower.momentum.phi() > 0.0 && tower.momentum.phi() < 1.0);
    assert!(output.photons.is_empty(), "hadrons are not photon-like");

    let constituents = tower.constituents().collect::<Vec<_>>();
    assert_eq!(constituents.len(), 1);
    assert!(Arc::ptr_eq(&constituents[0], &particles[0]));
}

#[test]
fn photon_towers_alias_the_tower_stream() {
    let calorimeter = Calorimeter::new(
        square_grid(),
        fractions(&[(11, 1.0, 0.0), (22, 1.0, 0.0)]),
        ResolutionModel::default(),
    );
    let particles = vec![
        particle(22, 0.5, 0.5, 10.0),
        particle(-11, -0.5, 0.5, 4.0),
        particle(211, 0.5, -0.5, 6.0),
    ];

    let output = calorimeter
        .reconstruct(&particles, &[], &mut StdRng::seed_from_u64(1))
        .expect("reconstruction should succeed");

    assert_eq!(output.towers.len(), 3);
    assert_eq!(output.photons.len(), 2);
    for photon in &output.photons {
        assert!(output.towers.iter().any(|tower| Arc::ptr_eq(tower, photon)));
        assert_eq!(photon.origin, CandidateOrigin::Tower);
        assert_eq!(photon.ehad, 0.0);
    }
}

#[test]
fn tracks_are_forwarded_and_subtracted_from_smeared_ecal() {
    let resolution = ResolutionModel::from_formulas("0.1 * energy", "0")
        .expect("formulas should compile");
    let calorimeter = Calorimeter::new(square_grid(), fractions(&[(11, 1.0, 0.0)]), resolution);
    let particles = vec![particle(11, 0.4, 0.6, 25.0)];
    let tracks = vec![track(11, 0.5, 0.5, 5.0), track(-11, 0.6, 0.4, 5.0)];

    for seed in 0..20 {
        let output = calorimeter
            .reconstruct(&particles, &tracks, &mut StdRng::seed_from_u64(seed))
            .expect("reconstruction should succeed");

        assert_eq!(output.eflow_tracks.len(), 2);
        assert!(Arc::ptr_eq(&output.eflow_tracks[0], &tracks[0]));
        assert!(Arc::ptr_eq(&output.eflow_tracks[1], &tracks[1]));
        assert!(output.photons.is_empty(), "towers with tracks are not photons");

        let tower = &output.towers[0];
        let expected = (tower.eem - 10.0).max(0.0);
        if expected > 0.0 {
            let eflow = &output.eflow_towers[0];
            assert_eq!(eflow.origin, CandidateOrigin::EFlowTower);
            assert!((eflow.eem - expected).abs() < 1e-9);
            assert_eq!(eflow.ehad, 0.0);
            assert!((eflow.momentum.energy() - expected).abs() < 1e-9);
            assert_eq!(eflow.position, tower.position);
        } else {
            assert!(output.eflow_towers.is_empty());
        }
    }
}

#[test]
fn objects_on_the_outer_boundary_are_excluded_and_inner_boundaries_close_the_lower_bin() {
    let calorimeter = Calorimeter::new(
        GridIndex::uniform(&[-1.0, 0.0, 1.0], &[-1.0, 1.0]).expect("grid should build"),
        EnergyFractionTable::default(),
        ResolutionModel::default(),
    );
    let at = |x: f64, y: f64, z: f64| {
        Arc::new(Candidate::particle(
            211,
            LorentzVector::new(x, y, z, 0.0),
            LorentzVector::new(0.0, 0.0, 0.0, 1.0),
        ))
    };

    // eta = 0, phi = 0: on the inner eta boundary
    let inner = calorimeter
        .reconstruct(&[at(1.0, 0.0, 0.0)], &[], &mut StdRng::seed_from_u64(1))
        .expect("reconstruction should succeed");
    assert_eq!(inner.towers.len(), 1);
    assert_eq!(inner.towers[0].edges, [-1.0, 0.0, -1.0, 1.0]);

    // phi = pi lies beyond the outer phi boundary
    let outside = calorimeter
        .reconstruct(&[at(-1.0, 0.0, 0.0)], &[], &mut StdRng::seed_from_u64(1))
        .expect("reconstruction should succeed");
    assert!(outside.towers.is_empty());

    let edge_grid = Calorimeter::new(
        GridIndex::uniform(&[0.0, 1.0], &[-1.0, 1.0]).expect("grid should build"),
        EnergyFractionTable::default(),
        ResolutionModel::default(),
    );
    let on_edge = edge_grid
        .reconstruct(&[at(1.0, 0.0, 0.0)], &[], &mut StdRng::seed_from_u64(1))
        .expect("reconstruction should succeed");
    assert!(on_edge.towers.is_empty());
    assert!(on_edge.eflow_towers.is_empty());
}

type Event = (Vec<Arc<Candidate>>, Vec<Arc<Candidate>>);

fn random_event(rng: &mut StdRng, particles: usize, tracks: usize) -> Event {
    const PIDS: [i32; 6] = [22, 11, -11, 211, -211, 2112];
    let draw = |rng: &mut StdRng| {
        (
            PIDS[rng.gen_range(0..PIDS.len())],
            rng.gen_range(-0.95..0.95),
            rng.gen_range(-0.95..0.95),
            rng.gen_range(0.5..50.0),
        )
    };
    let particles = (0..particles)
        .map(|_| {
            let (pid, eta, phi, energy) = draw(rng);
            particle(pid, eta, phi, energy)
        })
        .collect();
    let tracks = (0..tracks)
        .map(|_| {
            let (pid, eta, phi, energy) = draw(rng);
            track(pid, eta, phi, energy)
        })
        .collect();
    (particles, tracks)
}

#[test]
fn unsmeared_towers_conserve_deposited_energy() {
    let table = fractions(&[
        (22, 1.0, 0.0),
        (11, 1.0, 0.0),
        (211, 0.3, 0.7),
        (2112, 0.0, 1.0),
    ]);
    let calorimeter = Calorimeter::new(square_grid(), table.clone(), ResolutionModel::default());
    let mut rng = StdRng::seed_from_u64(2024);

    for _ in 0..20 {
        let (particles, tracks) = random_event(&mut rng, 40, 10);
        let output = calorimeter
            .reconstruct(&particles, &tracks, &mut rng)
            .expect("reconstruction should succeed");

        let deposited = particles
            .iter()
            .map(|particle| {
                let fraction = table.lookup(particle.pid);
                particle.momentum.energy() * (fraction.ecal + fraction.hcal)
            })
            .sum::<f64>();
        let measured = output
            .towers
            .iter()
            .map(|tower| tower.momentum.energy())
            .sum::<f64>();
        assert!((deposited - measured).abs() < 1e-9 * deposited.max(1.0));

        for tower in &output.eflow_towers {
            assert!(tower.eem >= 0.0 && tower.ehad >= 0.0);
        }
        assert_eq!(output.eflow_tracks.len(), tracks.len());
    }
}

#[test]
fn residuals_never_exceed_tower_energy() {
    let resolution = ResolutionModel::from_formulas(
        "sqrt(0.007^2 * energy^2 + 0.07^2 * energy + 0.35^2)",
        "sqrt(0.05^2 * energy^2 + 1.0 * energy)",
    )
    .expect("formulas should compile");
    let calorimeter = Calorimeter::new(
        square_grid(),
        fractions(&[(22, 1.0, 0.0), (11, 1.0, 0.0)]),
        resolution,
    );
    let mut rng = StdRng::seed_from_u64(77);

    for _ in 0..50 {
        let (particles, tracks) = random_event(&mut rng, 20, 8);
        let output = calorimeter
            .reconstruct(&particles, &tracks, &mut rng)
            .expect("reconstruction should succeed");

        for eflow in &output.eflow_towers {
            let tower = output
                .towers
                .iter()
                .find(|tower| tower.edges == eflow.edges)
                .expect("every eflow tower has a tower in the same cell");
            assert!(eflow.total_energy() <= tower.total_energy() + 1e-12);
        }
    }
}

#[test]
fn smeared_energy_is_unbiased_over_seeds() {
    let resolution = ResolutionModel::new(
        Arc::new(|_eta: f64, energy: f64| 0.2 * energy),
        Arc::new(|_eta: f64, _energy: f64| 0.0),
    );
    let calorimeter = Calorimeter::new(square_grid(), fractions(&[(22, 1.0, 0.0)]), resolution);
    let particles = vec![particle(22, 0.5, 0.5, 10.0)];

    let runs = 4000;
    let mean = (0..runs)
        .map(|seed| {
            calorimeter
                .reconstruct(&particles, &[], &mut StdRng::seed_from_u64(seed))
                .expect("reconstruction should succeed")
                .towers
                .first()
                .map_or(0.0, |tower| tower.momentum.energy())
        })
        .sum::<f64>()
        / runs as f64;

    assert!((mean - 10.0).abs() < 0.15, "mean {mean}");
}

#[test]
fn serial_and_parallel_runs_match() {
    let config: CalorimeterConfig = serde_json::from_str(
        r#"{
            "etaPhiBins": [{"eta": [-1.0, -0.5, 0.0, 0.5, 1.0], "phiDivisions": 8}],
            "energyFractions": [{"pid": 22, "ecal": 1.0, "hcal": 0.0}],
            "ecalResolutionFormula": "0.05 * energy",
            "hcalResolutionFormula": "0.5 * sqrt(energy)"
        }"#,
    )
    .expect("config should parse");
    let calorimeter = Calorimeter::from_config(&config).expect("calorimeter should build");
    let arrays = calorimeter.arrays().clone();

    let mut rng = StdRng::seed_from_u64(5);
    let events = (0..32)
        .map(|_| {
            let (particles, tracks) = random_event(&mut rng, 30, 5);
            let mut store = EventStore::new();
            store.export(&arrays.particle_input, particles);
            store.export(&arrays.track_input, tracks);
            store
        })
        .collect::<Vec<_>>();

    let energies = |mode| {
        run_events(&calorimeter, events.clone(), 99, mode)
            .expect("run should succeed")
            .iter()
            .map(|store| {
                store
                    .array(&arrays.tower_output)
                    .expect("towers exported")
                    .iter()
                    .map(|tower| (tower.eem, tower.ehad, tower.position.time()))
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>()
    };

    assert_eq!(energies(ExecutionMode::Serial), energies(ExecutionMode::Parallel));
}
