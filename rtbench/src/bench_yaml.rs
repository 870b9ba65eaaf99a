use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use rtbench_core::{
    Pacing, PacingPolicy, Preflight, ScenarioOptions, ScenarioStage, TargetRegistry,
    TargetSelection, ThresholdSet, WorkloadCatalog, WorkloadDefinition, WorkloadMethod,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BenchDocYaml {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub seed: Option<u64>,

    /// round-robin | random
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub target_selection: Option<String>,

    pub targets: Vec<TargetYaml>,

    pub workloads: Vec<WorkloadYaml>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub pacing: Option<PacingSectionYaml>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub preflight: Option<PreflightYaml>,

    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub scenarios: Vec<ScenarioYaml>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub thresholds: BTreeMap<String, ThresholdExprYaml>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TargetYaml {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WorkloadYaml {
    pub path: String,

    /// Endpoint label in reports (defaults to `path`).
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub name: Option<String>,

    pub category: String,

    #[serde(default = "default_weight")]
    pub weight: u32,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub timeout: Option<YamlDuration>,

    /// GET | POST
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub method: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub body: Option<String>,
}

fn default_weight() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PacingSectionYaml {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub default: Option<PacingYaml>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub categories: BTreeMap<String, PacingYaml>,
}

/// Either a fixed think time (`100ms`) or a `{ min, max }` range.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub(crate) enum PacingYaml {
    Uniform { min: YamlDuration, max: YamlDuration },
    Fixed(YamlDuration),
}

impl PacingYaml {
    fn into_pacing(self) -> Pacing {
        match self {
            Self::Uniform { min, max } => Pacing::Uniform {
                min: min.into_inner(),
                max: max.into_inner(),
            },
            Self::Fixed(d) if d.into_inner().is_zero() => Pacing::None,
            Self::Fixed(d) => Pacing::Fixed(d.into_inner()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PreflightYaml {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub path: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub timeout: Option<YamlDuration>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub required: Option<bool>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ScenarioYaml {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Executor kind: constant-vus | ramping-vus
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executor: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub vus: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iterations: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub duration: Option<YamlDuration>,

    // ramping-vus
    #[serde(rename = "startVUs")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_vus: Option<u64>,

    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub stages: Vec<StageYaml>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub graceful_stop: Option<YamlDuration>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub max_duration: Option<YamlDuration>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StageYaml {
    pub target: u64,

    #[serde(default)]
    pub duration: YamlDuration,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct YamlDuration(Duration);

impl YamlDuration {
    fn into_inner(self) -> Duration {
        self.0
    }
}

impl From<Duration> for YamlDuration {
    fn from(value: Duration) -> Self {
        Self(value)
    }
}

impl Serialize for YamlDuration {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(self.0).to_string())
    }
}

impl<'de> Deserialize<'de> for YamlDuration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct V;

        impl<'de> serde::de::Visitor<'de> for V {
            type Value = YamlDuration;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("duration as string (e.g. 10s), integer seconds, or float seconds")
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(YamlDuration(Duration::from_secs(v)))
            }

            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                if v < 0 {
                    return Err(E::custom("duration must not be negative"));
                }
                Ok(YamlDuration(Duration::from_secs(v as u64)))
            }

            fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                if !v.is_finite() || v < 0.0 {
                    return Err(E::custom("duration must be a non-negative, finite number"));
                }
                Ok(YamlDuration(Duration::from_secs_f64(v)))
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                let d = humantime::parse_duration(v).map_err(E::custom)?;
                Ok(YamlDuration(d))
            }

            fn visit_string<E>(self, v: String) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                self.visit_str(&v)
            }
        }

        deserializer.deserialize_any(V)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub(crate) enum ThresholdExprYaml {
    One(String),
    Many(Vec<String>),
}

/// Config file resolved into core types.
#[derive(Debug)]
pub(crate) struct BenchConfig {
    pub seed: Option<u64>,
    pub target_selection: TargetSelection,
    pub targets: TargetRegistry,
    pub catalog: WorkloadCatalog,
    pub pacing: PacingPolicy,
    pub preflight: Option<Preflight>,
    pub scenarios: Vec<ScenarioOptions>,
    pub thresholds: Vec<ThresholdSet>,
}

pub(crate) async fn load_bench_config(path: &Path) -> anyhow::Result<BenchConfig> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read config: {}", path.display()))?;

    let doc: BenchDocYaml = serde_yaml::from_slice(&bytes)
        .with_context(|| format!("failed to parse YAML: {}", path.display()))?;

    let default_name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("main")
        .to_string();

    resolve(doc, &default_name)
}

pub(crate) fn resolve(doc: BenchDocYaml, default_name: &str) -> anyhow::Result<BenchConfig> {
    let BenchDocYaml {
        seed,
        target_selection,
        targets,
        workloads,
        pacing,
        preflight,
        scenarios,
        thresholds,
    } = doc;

    let target_selection = match target_selection.as_deref() {
        None => TargetSelection::default(),
        Some(raw) => raw.parse().map_err(|_| {
            anyhow::anyhow!("invalid targetSelection `{raw}` (expected round-robin or random)")
        })?,
    };

    let mut registry = TargetRegistry::new();
    for t in targets {
        registry
            .register(&t.name, &t.url)
            .with_context(|| format!("invalid target `{}`", t.name))?;
    }

    let mut catalog = WorkloadCatalog::new();
    for w in workloads {
        let label = w.name.clone().unwrap_or_else(|| w.path.clone());
        let workload = workload_from_yaml(w).with_context(|| format!("invalid workload `{label}`"))?;
        catalog.register(workload)?;
    }

    let pacing = pacing.map_or_else(PacingPolicy::default, |p| PacingPolicy {
        default: p.default.map(PacingYaml::into_pacing).unwrap_or_default(),
        per_category: p
            .categories
            .into_iter()
            .map(|(k, v)| (k, v.into_pacing()))
            .collect(),
    });

    let preflight = match preflight {
        Some(p) if !p.enabled => None,
        Some(p) => {
            let defaults = Preflight::default();
            Some(Preflight {
                path: p.path.unwrap_or(defaults.path),
                timeout: p.timeout.map_or(defaults.timeout, YamlDuration::into_inner),
                required: p.required.unwrap_or(defaults.required),
            })
        }
        None => Some(Preflight::default()),
    };

    let total = scenarios.len();
    let scenarios = scenarios
        .into_iter()
        .enumerate()
        .map(|(idx, s)| {
            let name = match (&s.name, total) {
                (Some(n), _) => n.clone(),
                (None, 1) => default_name.to_string(),
                (None, _) => format!("scenario_{}", idx + 1),
            };
            scenario_yaml_into_options(s, name)
        })
        .collect();

    let thresholds = parse_thresholds_map(thresholds)?;

    Ok(BenchConfig {
        seed,
        target_selection,
        targets: registry,
        catalog,
        pacing,
        preflight,
        scenarios,
        thresholds,
    })
}

fn workload_from_yaml(w: WorkloadYaml) -> anyhow::Result<WorkloadDefinition> {
    let mut out = WorkloadDefinition::get(&w.path, &w.category, w.weight);
    if let Some(name) = &w.name {
        out = out.with_name(name);
    }
    if let Some(timeout) = w.timeout {
        out = out.with_timeout(timeout.into_inner());
    }
    if let Some(raw) = &w.method {
        let method: WorkloadMethod = raw
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid method `{raw}` (expected GET or POST)"))?;
        out = out.with_method(method);
    }
    if let Some(body) = w.body {
        out = out.with_body(body);
    }
    Ok(out)
}

fn scenario_yaml_into_options(scenario: ScenarioYaml, name: String) -> ScenarioOptions {
    let ScenarioYaml {
        name: _,
        executor,
        vus,
        iterations,
        duration,
        start_vus,
        stages,
        graceful_stop,
        max_duration,
    } = scenario;

    ScenarioOptions {
        name,
        executor,
        vus,
        iterations,
        duration: duration.map(YamlDuration::into_inner),
        start_vus,
        stages: stages
            .into_iter()
            .map(|s| ScenarioStage::new(s.duration.into_inner(), s.target))
            .collect(),
        graceful_stop: graceful_stop.map(YamlDuration::into_inner),
        max_duration: max_duration.map(YamlDuration::into_inner),
    }
}

fn parse_thresholds_map(
    raw: BTreeMap<String, ThresholdExprYaml>,
) -> anyhow::Result<Vec<ThresholdSet>> {
    let mut out = Vec::new();

    for (metric, v) in raw {
        let expressions: Vec<String> = match v {
            ThresholdExprYaml::One(s) => vec![s],
            ThresholdExprYaml::Many(v) => v,
        };

        if expressions.is_empty() {
            anyhow::bail!("invalid thresholds for `{metric}`: empty list");
        }

        out.push(ThresholdSet {
            metric,
            expressions,
        });
    }

    rtbench_core::validate_thresholds(&out)?;
    Ok(out)
}

pub(crate) async fn write_yaml_file<T: Serialize>(
    path: &Path,
    doc: &T,
    force: bool,
) -> anyhow::Result<()> {
    let s = serde_yaml::to_string(doc).context("failed to serialize YAML")?;

    if !force
        && tokio::fs::try_exists(path)
            .await
            .with_context(|| format!("failed to check file existence: {}", path.display()))?
    {
        anyhow::bail!(
            "refusing to overwrite existing file (use --force): {}",
            path.display()
        );
    }

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create directory: {}", parent.display()))?;
    }

    tokio::fs::write(path, s)
        .await
        .with_context(|| format!("failed to write file: {}", path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn fixture_path(name: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures")
            .join(name)
    }

    #[tokio::test]
    async fn loads_full_config() {
        let cfg = load_bench_config(&fixture_path("full.yaml"))
            .await
            .unwrap_or_else(|e| panic!("{e:#}"));

        assert_eq!(cfg.seed, Some(1234));
        assert_eq!(cfg.target_selection, TargetSelection::Random);

        let names: Vec<&str> = cfg.targets.all().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["swoole", "phpfpm", "frankenphp"]);

        assert_eq!(cfg.catalog.len(), 4);
        assert_eq!(cfg.catalog.total_weight(), 20 + 10 + 8 + 2);
        let echo = &cfg.catalog.all()[3];
        assert_eq!(echo.method, WorkloadMethod::Post);
        assert_eq!(echo.name, "echo");
        assert_eq!(echo.timeout, Duration::from_secs(2));
        assert_eq!(echo.body.as_deref(), Some(&b"{\"ping\":true}"[..]));

        assert_eq!(
            cfg.pacing.default,
            Pacing::Uniform {
                min: Duration::ZERO,
                max: Duration::from_millis(100)
            }
        );
        assert_eq!(
            cfg.pacing.per_category.get("cpu"),
            Some(&Pacing::Fixed(Duration::from_millis(50)))
        );

        let preflight = cfg
            .preflight
            .as_ref()
            .unwrap_or_else(|| panic!("expected preflight"));
        assert_eq!(preflight.path, "/api/health-check");
        assert!(!preflight.required);

        assert_eq!(cfg.scenarios.len(), 2);
        assert_eq!(cfg.scenarios[0].name, "light_load");
        assert_eq!(cfg.scenarios[0].vus, Some(5));
        assert_eq!(cfg.scenarios[1].name, "scenario_2");
        assert_eq!(cfg.scenarios[1].start_vus, Some(0));
        assert_eq!(cfg.scenarios[1].stages.len(), 2);
        assert_eq!(
            cfg.scenarios[1].graceful_stop,
            Some(Duration::from_secs(5))
        );

        assert_eq!(cfg.thresholds.len(), 2);
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let doc: BenchDocYaml = serde_yaml::from_str(
            r#"
targets:
  - name: swoole
    url: http://localhost:8001
workloads:
  - path: /api/static
    category: basic
"#,
        )
        .unwrap_or_else(|e| panic!("{e:#}"));

        let cfg = resolve(doc, "bench").unwrap_or_else(|e| panic!("{e:#}"));
        assert_eq!(cfg.target_selection, TargetSelection::RoundRobin);
        assert_eq!(cfg.catalog.all()[0].weight, 1);
        assert_eq!(cfg.pacing, PacingPolicy::default());
        assert_eq!(cfg.preflight, Some(Preflight::default()));
        assert!(cfg.scenarios.is_empty());
    }

    #[test]
    fn disabled_preflight_is_skipped() {
        let doc: BenchDocYaml = serde_yaml::from_str(
            r#"
targets: [{ name: a, url: "http://127.0.0.1:1" }]
workloads: [{ path: /x, category: c }]
preflight: { enabled: false }
"#,
        )
        .unwrap_or_else(|e| panic!("{e:#}"));

        let cfg = resolve(doc, "bench").unwrap_or_else(|e| panic!("{e:#}"));
        assert_eq!(cfg.preflight, None);
    }

    #[test]
    fn invalid_threshold_is_rejected() {
        let doc: BenchDocYaml = serde_yaml::from_str(
            r#"
targets: [{ name: a, url: "http://127.0.0.1:1" }]
workloads: [{ path: /x, category: c }]
thresholds:
  http_req_duration: "p(42)<10"
"#,
        )
        .unwrap_or_else(|e| panic!("{e:#}"));

        assert!(resolve(doc, "bench").is_err());
    }

    #[test]
    fn duplicate_target_is_rejected() {
        let doc: BenchDocYaml = serde_yaml::from_str(
            r#"
targets:
  - { name: a, url: "http://127.0.0.1:1" }
  - { name: a, url: "http://127.0.0.1:2" }
workloads: [{ path: /x, category: c }]
"#,
        )
        .unwrap_or_else(|e| panic!("{e:#}"));

        let err = resolve(doc, "bench")
            .err()
            .unwrap_or_else(|| panic!("expected duplicate target error"));
        assert!(format!("{err:#}").contains("already registered"));
    }

    #[test]
    fn yaml_duration_accepts_strings_and_numbers() {
        let d: YamlDuration = serde_yaml::from_str("\"250ms\"").unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(d.into_inner(), Duration::from_millis(250));
        let d: YamlDuration = serde_yaml::from_str("3").unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(d.into_inner(), Duration::from_secs(3));
        let d: YamlDuration = serde_yaml::from_str("0.5").unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(d.into_inner(), Duration::from_millis(500));
        assert!(serde_yaml::from_str::<YamlDuration>("\"soon\"").is_err());
    }
}
