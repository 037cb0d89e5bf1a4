//! Integration tests — does the full turn cycle hold together?
//!
//! Each test drives a fabric the way the owning simulation would:
//! step → correct → learn, across turns, with persistence and baselines.

use std::collections::HashMap;

use gravity_fabric::{
    FabricConfig, FabricSnapshot, GravityFabric, InteractionSpec, PillarUpdate,
};

fn signals(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

fn plain_config() -> FabricConfig {
    FabricConfig {
        lambda: 1.0,
        learning_rate: 0.1,
        momentum: 0.0,
        regularization: 0.0,
        decay_rate: 0.1,
        enable_adaptive_lambda: false,
        enable_weight_pruning: false,
        ..Default::default()
    }
}

/// I1: The canonical worked scenario — one pillar, one variable, one residual
#[test]
fn integration_worked_scenario() {
    let mut fabric = GravityFabric::new(plain_config()).unwrap();
    fabric.register_variable("price");

    // Turn 1: hope fires at 0.8
    let summary = fabric.step(&signals(&[("hope", 0.8)]));
    assert_eq!(summary.turn, 1);
    assert!((summary.basis_support - 0.8).abs() < 1e-12);

    // No learned weight yet: correction is zero
    assert_eq!(fabric.apply_correction("price", 100.0), 100.0);

    // Residual +5.0 → weight 0.1 * (5.0 * 0.8) = 0.4
    fabric.update_weights(&signals(&[("price", 5.0)]));
    assert!((fabric.engine().weight("hope").unwrap() - 0.4).abs() < 1e-12);

    // gravity = 0.4 * 0.8 = 0.32 → 100.32, no breaker trip
    let corrected = fabric.apply_correction("price", 100.0);
    assert!((corrected - 100.32).abs() < 1e-12);
    assert_eq!(fabric.engine().trip_count(), 0);
}

/// I2: Two identically configured fabrics fed identical sequences stay
/// bit-identical across many turns
#[test]
fn integration_determinism() {
    let config = FabricConfig {
        interactions: vec![InteractionSpec {
            source: "hope".to_string(),
            target: "despair".to_string(),
            strength: -0.3,
        }],
        opposing: vec![("hope".to_string(), "despair".to_string())],
        ..Default::default()
    };

    let mut a = GravityFabric::new(config.clone()).unwrap();
    let mut b = GravityFabric::new(config).unwrap();
    for fabric in [&mut a, &mut b] {
        fabric.register_variable("price");
        fabric.register_variable("volume");
    }

    for turn in 0..200u64 {
        let t = turn as f64;
        let sig = signals(&[
            ("hope", (t * 0.37).sin().abs()),
            ("despair", (t * 0.11).cos().abs()),
            ("rage", ((t * 7.0) % 13.0) / 13.0),
        ]);
        a.step(&sig);
        b.step(&sig);

        let pa = a.bulk_apply_correction(&signals(&[("price", 100.0 + t), ("volume", 50.0)]));
        let pb = b.bulk_apply_correction(&signals(&[("price", 100.0 + t), ("volume", 50.0)]));
        assert_eq!(pa["price"].to_bits(), pb["price"].to_bits());
        assert_eq!(pa["volume"].to_bits(), pb["volume"].to_bits());

        let residuals = signals(&[("price", (t * 0.5).sin() * 3.0), ("volume", -1.0)]);
        a.update_weights(&residuals);
        b.update_weights(&residuals);
    }

    for (name, weight) in a.engine().weights() {
        assert_eq!(
            weight.to_bits(),
            b.engine().weights()[name].to_bits(),
            "weight trajectories diverged for {}",
            name
        );
    }
    assert_eq!(a.engine().trip_count(), b.engine().trip_count());
}

/// I3: Disabled fabric produces the causal-only baseline while an enabled
/// twin corrects — and the disabled one's weights stay frozen
#[test]
fn integration_disable_flag_baseline() {
    let mut corrected_run = GravityFabric::new(plain_config()).unwrap();
    let mut baseline_run = GravityFabric::new(plain_config()).unwrap();
    corrected_run.register_variable("price");
    baseline_run.register_variable("price");
    baseline_run.set_enabled(false);

    for _ in 0..10 {
        let sig = signals(&[("hope", 0.9)]);
        corrected_run.step(&sig);
        baseline_run.step(&sig);

        let corrected = corrected_run.apply_correction("price", 100.0);
        let baseline = baseline_run.apply_correction("price", 100.0);
        assert_eq!(baseline, 100.0);

        corrected_run.update_weights(&signals(&[("price", 4.0)]));
        baseline_run.update_weights(&signals(&[("price", 4.0)]));
        let _ = corrected;
    }

    assert!(corrected_run.apply_correction("price", 100.0) > 100.0);
    assert!(baseline_run.engine().weights().is_empty());
    // Pillars advanced in both runs regardless of the flag
    assert_eq!(baseline_run.turn_count(), corrected_run.turn_count());
    assert!(baseline_run.pillars().contains("hope"));
}

/// I4: Save to disk, load into a fresh fabric, resume learning
#[test]
fn integration_persistence_resume() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fabric_state.json");

    let mut original = GravityFabric::new(plain_config()).unwrap();
    original.register_variable("price");
    original.step(&signals(&[("hope", 0.8)]));
    original.update_weights(&signals(&[("price", 5.0)]));
    original.save_to(&path).unwrap();

    let mut resumed = GravityFabric::new(plain_config()).unwrap();
    resumed.load_from(&path).unwrap();

    // Same correction as the original would produce
    let corrected = resumed.apply_correction("price", 100.0);
    assert!((corrected - 100.32).abs() < 1e-12);

    // Learning continues from the restored weights
    resumed.update_weights(&signals(&[("price", 5.0)]));
    assert!(resumed.engine().weight("hope").unwrap() > 0.4);

    // A corrupt file is a recoverable failure
    std::fs::write(&path, "{not json").unwrap();
    let mut untouched = GravityFabric::new(plain_config()).unwrap();
    assert!(untouched.load_from(&path).is_err());
    assert!(untouched.engine().weights().is_empty());
}

/// I5: Interactions and tension feed through the full cycle
#[test]
fn integration_interacting_pillars() {
    let config = FabricConfig {
        decay_rate: 0.0,
        interactions: vec![InteractionSpec {
            source: "rage".to_string(),
            target: "fatigue".to_string(),
            strength: 0.5,
        }],
        opposing: vec![("hope".to_string(), "despair".to_string())],
        ..plain_config()
    };
    let mut fabric = GravityFabric::new(config).unwrap();
    fabric.register_variable("output");

    let summary = fabric.step(&signals(&[
        ("rage", 0.8),
        ("fatigue", 0.1),
        ("hope", 0.6),
        ("despair", 0.5),
    ]));

    // fatigue nudged: 0.1 + 0.5 * 0.8 = 0.5
    assert!((fabric.captured_basis()["fatigue"] - 0.5).abs() < 1e-12);
    // tension = min(hope, despair) = 0.5
    assert!((summary.tension - 0.5).abs() < 1e-12);

    // Learning attributes across the whole interacted basis
    fabric.update_weights(&signals(&[("output", 2.0)]));
    assert!(fabric.engine().weight("fatigue").is_some());
    assert!(fabric.engine().weight("rage").is_some());
}

/// I6: Explainability — top contributors reflect the last correction
#[test]
fn integration_top_contributors() {
    let mut fabric = GravityFabric::new(plain_config()).unwrap();
    fabric.register_variable("price");
    fabric.step(&signals(&[("hope", 1.0), ("rage", 0.2)]));

    // Train hope much harder than rage
    for _ in 0..5 {
        fabric.update_weights(&signals(&[("price", 3.0)]));
    }
    fabric.apply_correction("price", 10.0);

    let top = fabric.engine().top_contributors(1);
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].0, "hope");
    assert!(top[0].1 > 0.0);
}

/// I7: Mid-turn pillar mutation does not leak into this turn's attribution
#[test]
fn integration_basis_consistency_within_turn() {
    let mut fabric = GravityFabric::new(plain_config()).unwrap();
    fabric.register_variable("price");
    fabric.step(&signals(&[("hope", 0.8)]));

    let before = fabric.apply_correction("price", 100.0);
    fabric
        .pillars_mut()
        .update_pillar("hope", PillarUpdate::Set(0.0));
    let after = fabric.apply_correction("price", 100.0);
    assert_eq!(before.to_bits(), after.to_bits());

    // Learning this turn still sees the captured 0.8, not the mutated 0.0
    fabric.update_weights(&signals(&[("price", 5.0)]));
    assert!((fabric.engine().weight("hope").unwrap() - 0.4).abs() < 1e-12);
}
