use std::time::Duration;

use rtbench_core::{
    DEFAULT_GRACEFUL_STOP, RunConfig, ScenarioExecutor, ScenarioOptions, ScenarioStage,
    scenarios_from_options,
};

#[test]
fn cli_overrides_convert_ramping_vus_to_constant_vus() {
    let opts = vec![ScenarioOptions {
        name: "ramp".to_string(),
        executor: Some("ramping-vus".to_string()),
        // Missing ramping fields are ignored when CLI overrides are present.
        stages: vec![],
        start_vus: None,
        ..ScenarioOptions::default()
    }];

    let cfg = RunConfig {
        iterations: Some(1),
        vus: Some(1),
        duration: None,
    };

    let scenarios = scenarios_from_options(opts, cfg)
        .unwrap_or_else(|e| panic!("expected scenarios to be valid: {e}"));
    assert_eq!(scenarios.len(), 1);

    let s = &scenarios[0];
    assert_eq!(s.name, "ramp");
    assert_eq!(s.iterations, Some(1));
    assert_eq!(s.duration, None);

    match s.executor {
        ScenarioExecutor::ConstantVus { vus } => assert_eq!(vus, 1),
        _ => panic!("expected constant-vus executor"),
    }
}

#[test]
fn ramping_vus_still_validates_when_no_cli_overrides() {
    let opts = vec![ScenarioOptions {
        name: "ramp".to_string(),
        executor: Some("ramping-vus".to_string()),
        stages: vec![ScenarioStage::new(Duration::from_secs(1), 2)],
        start_vus: Some(1),
        ..ScenarioOptions::default()
    }];

    let scenarios = scenarios_from_options(opts, RunConfig::default())
        .unwrap_or_else(|e| panic!("expected scenarios to be valid: {e}"));
    assert_eq!(scenarios.len(), 1);

    match &scenarios[0].executor {
        ScenarioExecutor::RampingVus { start_vus, stages } => {
            assert_eq!(*start_vus, 1);
            assert_eq!(stages.len(), 1);
        }
        _ => panic!("expected ramping-vus executor"),
    }
    assert_eq!(scenarios[0].duration, Some(Duration::from_secs(1)));
    assert_eq!(scenarios[0].graceful_stop, DEFAULT_GRACEFUL_STOP);
}

#[test]
fn ramping_vus_without_stages_is_rejected() {
    let opts = vec![ScenarioOptions {
        name: "ramp".to_string(),
        executor: Some("ramping-vus".to_string()),
        ..ScenarioOptions::default()
    }];

    let err = scenarios_from_options(opts, RunConfig::default())
        .err()
        .unwrap_or_else(|| panic!("expected invalid stages"));
    assert!(err.is_configuration());
}

#[test]
fn duration_override_keeps_scenario_vus() {
    let opts = vec![ScenarioOptions {
        name: "steady".to_string(),
        vus: Some(8),
        iterations: Some(100),
        ..ScenarioOptions::default()
    }];

    let cfg = RunConfig {
        duration: Some(Duration::from_secs(5)),
        ..RunConfig::default()
    };

    let scenarios =
        scenarios_from_options(opts, cfg).unwrap_or_else(|e| panic!("expected valid: {e}"));
    let s = &scenarios[0];
    assert_eq!(s.executor, ScenarioExecutor::ConstantVus { vus: 8 });
    assert_eq!(s.duration, Some(Duration::from_secs(5)));
    assert_eq!(s.iterations, Some(100));
}
