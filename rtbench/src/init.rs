use std::collections::BTreeMap;
use std::time::Duration;

use crate::bench_yaml::{
    BenchDocYaml, PacingSectionYaml, PacingYaml, PreflightYaml, ScenarioYaml, TargetYaml,
    ThresholdExprYaml, WorkloadYaml, YamlDuration, write_yaml_file,
};
use crate::cli::InitArgs;

pub const CONFIG_FILE_NAME: &str = "rtbench.yaml";

const RUNTIMES: [(&str, &str); 3] = [
    ("swoole", "http://localhost:8001"),
    ("phpfpm", "http://localhost:8002"),
    ("frankenphp", "http://localhost:8003"),
];

// (path, category, weight)
const ENDPOINTS: [(&str, &str, u32); 8] = [
    ("/api/", "basic", 25),
    ("/api/health", "basic", 20),
    ("/api/static", "basic", 20),
    ("/api/cpu-intensive", "cpu", 10),
    ("/api/memory-test", "cpu", 8),
    ("/api/json-encode", "json", 8),
    ("/api/json-decode", "json", 8),
    ("/api/runtime-info", "info", 1),
];

// (name, vus, duration)
const LOAD_LEVELS: [(&str, u64, Duration); 4] = [
    ("light_load", 5, Duration::from_secs(180)),
    ("medium_load", 10, Duration::from_secs(180)),
    ("heavy_load", 20, Duration::from_secs(120)),
    ("spike_test", 30, Duration::from_secs(60)),
];

pub(crate) fn starter_config() -> BenchDocYaml {
    let targets = RUNTIMES
        .iter()
        .map(|(name, url)| TargetYaml {
            name: (*name).to_string(),
            url: (*url).to_string(),
        })
        .collect();

    let workloads = ENDPOINTS
        .iter()
        .map(|(path, category, weight)| WorkloadYaml {
            path: (*path).to_string(),
            name: None,
            category: (*category).to_string(),
            weight: *weight,
            timeout: Some(YamlDuration::from(Duration::from_secs(10))),
            method: None,
            body: None,
        })
        .collect();

    let scenarios = LOAD_LEVELS
        .iter()
        .map(|(name, vus, duration)| ScenarioYaml {
            name: Some((*name).to_string()),
            executor: Some("constant-vus".to_string()),
            vus: Some(*vus),
            duration: Some(YamlDuration::from(*duration)),
            ..ScenarioYaml::default()
        })
        .collect();

    let thresholds = BTreeMap::from([
        (
            "http_req_duration".to_string(),
            ThresholdExprYaml::Many(vec!["p(95)<800".to_string(), "p(99)<1500".to_string()]),
        ),
        (
            "http_req_failed".to_string(),
            ThresholdExprYaml::One("rate<0.10".to_string()),
        ),
        (
            "http_reqs".to_string(),
            ThresholdExprYaml::One("rate>50".to_string()),
        ),
    ]);

    BenchDocYaml {
        seed: None,
        target_selection: Some("round-robin".to_string()),
        targets,
        workloads,
        pacing: Some(PacingSectionYaml {
            default: Some(PacingYaml::Uniform {
                min: YamlDuration::from(Duration::ZERO),
                max: YamlDuration::from(Duration::from_millis(100)),
            }),
            categories: BTreeMap::new(),
        }),
        preflight: Some(PreflightYaml {
            enabled: true,
            path: Some(rtbench_core::DEFAULT_PREFLIGHT_PATH.to_string()),
            timeout: Some(YamlDuration::from(rtbench_core::DEFAULT_PREFLIGHT_TIMEOUT)),
            required: Some(true),
        }),
        scenarios,
        thresholds,
    }
}

pub async fn init(args: InitArgs) -> anyhow::Result<()> {
    let path = args.dir.join(CONFIG_FILE_NAME);
    write_yaml_file(&path, &starter_config(), args.force).await?;
    tracing::info!(path = %path.display(), "wrote starter config");
    println!("created {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bench_yaml::load_bench_config;

    #[tokio::test]
    async fn starter_config_loads_back() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("{e}"));
        init(InitArgs {
            dir: dir.path().to_path_buf(),
            force: false,
        })
        .await
        .unwrap_or_else(|e| panic!("{e:#}"));

        let cfg = load_bench_config(&dir.path().join(CONFIG_FILE_NAME))
            .await
            .unwrap_or_else(|e| panic!("{e:#}"));

        assert_eq!(cfg.targets.len(), 3);
        assert_eq!(cfg.catalog.len(), ENDPOINTS.len());
        assert_eq!(cfg.catalog.total_weight(), 100);
        assert_eq!(cfg.scenarios.len(), 4);
        assert_eq!(cfg.scenarios[3].name, "spike_test");
        assert_eq!(cfg.scenarios[3].duration, Some(Duration::from_secs(60)));
        assert_eq!(cfg.thresholds.len(), 3);
    }

    #[tokio::test]
    async fn refuses_to_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("{e}"));
        let args = || InitArgs {
            dir: dir.path().to_path_buf(),
            force: false,
        };

        init(args()).await.unwrap_or_else(|e| panic!("{e:#}"));
        assert!(init(args()).await.is_err());

        init(InitArgs {
            force: true,
            ..args()
        })
        .await
        .unwrap_or_else(|e| panic!("{e:#}"));
    }
}
