//! Configuration types deserialized from `keel.toml`.

use keel_common::{ContentHash, KEEL_VERSION};
use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::PathBuf;

/// The top-level project configuration parsed from `keel.toml`.
///
/// Top-level keys are camelCase. Keys this crate does not know are ignored.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    /// Whether production builds emit a pruned standalone tree.
    #[serde(default)]
    pub output_mode: OutputMode,
    /// Which development bundler drives `keel dev`.
    #[serde(default)]
    pub dev_bundler: DevBundlerMode,
    /// Entry specifiers from which the module graph is built.
    ///
    /// Accepts a single string or a list of strings.
    #[serde(default, deserialize_with = "deserialize_string_or_vec")]
    pub entries: Vec<String>,
    /// Project metadata.
    pub project: ProjectMeta,
    /// Build settings shared by production and development.
    #[serde(default)]
    pub build: BuildSettings,
    /// Development loop settings.
    #[serde(default)]
    pub dev: DevSettings,
}

/// Core project metadata.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProjectMeta {
    /// The project name.
    pub name: String,
    /// The project version string.
    #[serde(default = "default_version")]
    pub version: String,
}

/// Selects whether the artifact assembler's pruning-and-copy pipeline runs.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Prune the graph and copy only reachable files plus an entrypoint.
    Standalone,
    /// Emit internal module outputs only; dependencies are installed at deploy time.
    #[default]
    Default,
}

/// Selects the development bundler.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DevBundlerMode {
    /// Cache-backed engine that recompiles only invalidated modules.
    Incremental,
    /// Rebuild the whole graph on every change batch.
    #[default]
    Default,
}

/// Build settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BuildSettings {
    /// Directory (relative to the project root) that entry specifiers resolve in.
    pub source_dir: PathBuf,
    /// Directory holding third-party packages; modules resolved here are external.
    pub packages_dir: PathBuf,
    /// Output directory of the standalone tree.
    pub out_dir: PathBuf,
    /// Directory of the persisted incremental cache.
    pub cache_dir: PathBuf,
    /// File name of the generated entrypoint script inside the output tree.
    pub entrypoint: String,
    /// Extensions tried, in order, when a specifier has no exact match.
    pub extensions: Vec<String>,
    /// Maximum number of modules compiled concurrently.
    pub concurrency: usize,
    /// Policy for conditional and dynamic imports.
    pub dynamic_imports: DynamicImportPolicy,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("src"),
            packages_dir: PathBuf::from("node_modules"),
            out_dir: PathBuf::from(".keel/standalone"),
            cache_dir: PathBuf::from(".keel/cache"),
            entrypoint: "server.js".to_string(),
            extensions: ["js", "mjs", "cjs", "json"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            concurrency: default_concurrency(),
            dynamic_imports: DynamicImportPolicy::Conservative,
        }
    }
}

/// Development loop settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DevSettings {
    /// Quiet period after the last file event before a pass starts.
    pub debounce_ms: u64,
}

impl Default for DevSettings {
    fn default() -> Self {
        Self { debounce_ms: 50 }
    }
}

/// How conditional and dynamic imports take part in reachability.
///
/// Written as `dynamicImports = "conservative"` or
/// `dynamicImports = { allow = ["./locale/", "optional-dep"] }`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DynamicImportPolicy {
    /// Every conditional or dynamic import is treated as reachable.
    #[default]
    Conservative,
    /// Only conditional or dynamic imports whose specifier (or pattern)
    /// starts with one of these prefixes are followed.
    AllowList(Vec<String>),
}

impl DynamicImportPolicy {
    /// Returns `true` if a non-static import with this specifier and optional
    /// pattern prefix should be followed.
    pub fn permits(&self, specifier: &str, pattern: Option<&str>) -> bool {
        match self {
            DynamicImportPolicy::Conservative => true,
            DynamicImportPolicy::AllowList(allow) => allow.iter().any(|prefix| {
                specifier.starts_with(prefix.as_str())
                    || pattern.is_some_and(|p| p.starts_with(prefix.as_str()))
            }),
        }
    }
}

impl Serialize for DynamicImportPolicy {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            DynamicImportPolicy::Conservative => serializer.serialize_str("conservative"),
            DynamicImportPolicy::AllowList(allow) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("allow", allow)?;
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for DynamicImportPolicy {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PolicyVisitor;

        impl<'de> Visitor<'de> for PolicyVisitor {
            type Value = DynamicImportPolicy;

            fn expecting(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                formatter.write_str("\"conservative\" or a table with an `allow` list")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                match v {
                    "conservative" => Ok(DynamicImportPolicy::Conservative),
                    other => Err(E::invalid_value(de::Unexpected::Str(other), &self)),
                }
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut allow = None;
                while let Some(key) = map.next_key::<String>()? {
                    if key == "allow" {
                        allow = Some(map.next_value::<Vec<String>>()?);
                    } else {
                        map.next_value::<de::IgnoredAny>()?;
                    }
                }
                allow
                    .map(DynamicImportPolicy::AllowList)
                    .ok_or_else(|| de::Error::missing_field("allow"))
            }
        }

        deserializer.deserialize_any(PolicyVisitor)
    }
}

/// The subset of settings that can change resolution or compiled output.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FingerprintInput<'a> {
    source_dir: &'a PathBuf,
    packages_dir: &'a PathBuf,
    extensions: &'a [String],
    dynamic_imports: &'a DynamicImportPolicy,
}

impl ProjectConfig {
    /// Computes the build-configuration fingerprint that keys the persisted cache.
    ///
    /// Covers the keel version and every setting that affects resolution or
    /// compiled output. Output paths, concurrency and dev timing are excluded.
    pub fn fingerprint(&self) -> ContentHash {
        let input = FingerprintInput {
            source_dir: &self.build.source_dir,
            packages_dir: &self.build.packages_dir,
            extensions: &self.build.extensions,
            dynamic_imports: &self.build.dynamic_imports,
        };
        let encoded = serde_json::to_vec(&input).unwrap_or_default();
        ContentHash::from_parts([KEEL_VERSION.as_bytes(), encoded.as_slice()])
    }
}

fn default_version() -> String {
    "0.1.0".to_string()
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get().min(8))
        .unwrap_or(4)
}

/// Deserializes a field that can be either a single string or a list of strings.
///
/// Allows `entries = "app"` as well as `entries = ["app", "worker"]`.
fn deserialize_string_or_vec<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    struct StringOrVec;

    impl<'de> Visitor<'de> for StringOrVec {
        type Value = Vec<String>;

        fn expecting(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            formatter.write_str("a string or a list of strings")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            Ok(vec![v.to_string()])
        }

        fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            let mut vec = Vec::new();
            while let Some(val) = seq.next_element::<String>()? {
                vec.push(val);
            }
            Ok(vec)
        }
    }

    deserializer.deserialize_any(StringOrVec)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_src: &str) -> ProjectConfig {
        toml::from_str(toml_src).unwrap()
    }

    const MINIMAL: &str = r#"
entries = ["app"]

[project]
name = "web"
"#;

    #[test]
    fn modes_default_to_default() {
        let config = parse(MINIMAL);
        assert_eq!(config.output_mode, OutputMode::Default);
        assert_eq!(config.dev_bundler, DevBundlerMode::Default);
        assert_eq!(config.project.version, "0.1.0");
    }

    #[test]
    fn camel_case_switches() {
        let config = parse(
            r#"
outputMode = "standalone"
devBundler = "incremental"
entries = "app"

[project]
name = "web"
"#,
        );
        assert_eq!(config.output_mode, OutputMode::Standalone);
        assert_eq!(config.dev_bundler, DevBundlerMode::Incremental);
        assert_eq!(config.entries, vec!["app"]);
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let config = parse(
            r#"
entries = ["app"]
experimentalFlag = true

[project]
name = "web"

[images]
domains = ["example.com"]
"#,
        );
        assert_eq!(config.project.name, "web");
    }

    #[test]
    fn build_defaults() {
        let config = parse(MINIMAL);
        assert_eq!(config.build.source_dir, PathBuf::from("src"));
        assert_eq!(config.build.packages_dir, PathBuf::from("node_modules"));
        assert_eq!(config.build.entrypoint, "server.js");
        assert_eq!(config.build.extensions[0], "js");
        assert!(config.build.concurrency >= 1);
        assert_eq!(
            config.build.dynamic_imports,
            DynamicImportPolicy::Conservative
        );
        assert_eq!(config.dev.debounce_ms, 50);
    }

    #[test]
    fn allow_list_policy() {
        let config = parse(
            r#"
entries = ["app"]

[project]
name = "web"

[build]
dynamicImports = { allow = ["./locale/", "optional-dep"] }
"#,
        );
        let policy = &config.build.dynamic_imports;
        assert!(policy.permits("./locale/en.js", Some("./locale/")));
        assert!(policy.permits("optional-dep", None));
        assert!(!policy.permits("./plugins/a.js", None));
    }

    #[test]
    fn conservative_permits_everything() {
        assert!(DynamicImportPolicy::Conservative.permits("anything", None));
    }

    #[test]
    fn unknown_policy_name_rejected() {
        let result: Result<ProjectConfig, _> = toml::from_str(
            r#"
entries = ["app"]

[project]
name = "web"

[build]
dynamicImports = "aggressive"
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn fingerprint_tracks_resolution_settings() {
        let a = parse(MINIMAL);
        let mut b = parse(MINIMAL);
        assert_eq!(a.fingerprint(), b.fingerprint());

        b.build.concurrency = 1;
        b.build.out_dir = PathBuf::from("dist");
        assert_eq!(a.fingerprint(), b.fingerprint());

        b.build.extensions.push("ts".to_string());
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn fingerprint_tracks_policy() {
        let a = parse(MINIMAL);
        let mut b = parse(MINIMAL);
        b.build.dynamic_imports = DynamicImportPolicy::AllowList(vec!["./x/".to_string()]);
        assert_ne!(a.fingerprint(), b.fingerprint());
    }
}
