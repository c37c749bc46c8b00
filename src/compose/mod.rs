//! Typed model of a docker-compose descriptor and the checks run against it.
//!
//! Only the keys the checks look at are modelled; everything else in the
//! file is ignored by serde.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub mod duration;
pub mod interpolate;
pub mod ports;
pub mod validate;

pub use validate::{Check, Finding, Severity, ValidationContext, ValidationReport};

/// Default data directory of the official postgres image.
pub const POSTGRES_DATA_DIR: &str = "/var/lib/postgresql/data";

#[derive(Error, Debug)]
pub enum ComposeError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse compose file: {0}")]
    Parse(#[from] serde_yaml::Error),
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ComposeFile {
    #[serde(default)]
    pub services: BTreeMap<String, Service>,
    #[serde(default)]
    pub volumes: BTreeMap<String, Option<serde_yaml::Value>>,
}

impl ComposeFile {
    pub fn from_yaml(yaml: &str) -> Result<Self, ComposeError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ComposeError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| ComposeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&yaml)
    }

    pub fn service(&self, name: &str) -> Option<&Service> {
        self.services.get(name)
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct Service {
    pub image: Option<String>,
    pub build: Option<serde_yaml::Value>,
    pub container_name: Option<String>,
    pub restart: Option<String>,
    #[serde(default)]
    pub env_file: Option<OneOrMany<EnvFileEntry>>,
    #[serde(default)]
    pub environment: Option<EnvironmentBlock>,
    #[serde(default)]
    pub ports: Vec<PortEntry>,
    #[serde(default)]
    pub depends_on: Option<DependsOn>,
    pub healthcheck: Option<HealthCheck>,
    #[serde(default)]
    pub volumes: Vec<VolumeMount>,
}

impl Service {
    pub fn env_files(&self) -> Vec<EnvFileEntry> {
        self.env_file.clone().map(OneOrMany::into_vec).unwrap_or_default()
    }

    /// Dependencies with their start condition, short syntax meaning
    /// `service_started`.
    pub fn dependencies(&self) -> Vec<(String, String)> {
        match &self.depends_on {
            None => Vec::new(),
            Some(DependsOn::List(names)) => names
                .iter()
                .map(|n| (n.clone(), CONDITION_STARTED.to_string()))
                .collect(),
            Some(DependsOn::Map(map)) => map
                .iter()
                .map(|(n, spec)| (n.clone(), spec.condition.clone()))
                .collect(),
        }
    }

    /// Inline `environment:` entries. Keys listed without a value are
    /// passed through from the host and map to `None`.
    pub fn inline_environment(&self) -> BTreeMap<String, Option<String>> {
        match &self.environment {
            None => BTreeMap::new(),
            Some(EnvironmentBlock::List(items)) => items
                .iter()
                .map(|item| match item.split_once('=') {
                    Some((k, v)) => (k.to_string(), Some(v.to_string())),
                    None => (item.clone(), None),
                })
                .collect(),
            Some(EnvironmentBlock::Map(map)) => map
                .iter()
                .map(|(k, v)| (k.clone(), v.as_ref().and_then(scalar_to_string)))
                .collect(),
        }
    }

    /// A health check that is declared and not disabled.
    pub fn active_healthcheck(&self) -> Option<&HealthCheck> {
        self.healthcheck.as_ref().filter(|hc| !hc.is_disabled())
    }

    pub fn is_postgres(&self) -> bool {
        self.image.as_deref().is_some_and(|image| {
            let name = image.rsplit('/').next().unwrap_or(image);
            name == "postgres" || name.starts_with("postgres:") || name.starts_with("postgres@")
        })
    }
}

pub const CONDITION_STARTED: &str = "service_started";
pub const CONDITION_HEALTHY: &str = "service_healthy";
pub const CONDITION_COMPLETED: &str = "service_completed_successfully";

#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items,
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum EnvFileEntry {
    Path(String),
    Long {
        path: String,
        #[serde(default = "default_required")]
        required: bool,
    },
}

fn default_required() -> bool {
    true
}

impl EnvFileEntry {
    pub fn path(&self) -> &str {
        match self {
            EnvFileEntry::Path(path) => path,
            EnvFileEntry::Long { path, .. } => path,
        }
    }

    pub fn required(&self) -> bool {
        match self {
            EnvFileEntry::Path(_) => true,
            EnvFileEntry::Long { required, .. } => *required,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum EnvironmentBlock {
    List(Vec<String>),
    Map(BTreeMap<String, Option<serde_yaml::Value>>),
}

#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum DependsOn {
    List(Vec<String>),
    Map(BTreeMap<String, DependencySpec>),
}

#[derive(Deserialize, Debug, Clone)]
pub struct DependencySpec {
    #[serde(default = "default_condition")]
    pub condition: String,
    pub restart: Option<bool>,
    pub required: Option<bool>,
}

fn default_condition() -> String {
    CONDITION_STARTED.to_string()
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct HealthCheck {
    pub test: Option<HealthTest>,
    pub interval: Option<String>,
    pub timeout: Option<String>,
    pub retries: Option<u32>,
    pub start_period: Option<String>,
    pub start_interval: Option<String>,
    #[serde(default)]
    pub disable: bool,
}

impl HealthCheck {
    pub fn is_disabled(&self) -> bool {
        self.disable
            || matches!(&self.test, Some(HealthTest::List(items)) if items.first().map(String::as_str) == Some("NONE"))
    }

    /// The command text the probe runs, without the `CMD`/`CMD-SHELL` marker.
    pub fn command(&self) -> Option<String> {
        match self.test.as_ref()? {
            HealthTest::Shell(cmd) => Some(cmd.clone()),
            HealthTest::List(items) => match items.split_first() {
                Some((_, rest)) if !rest.is_empty() => Some(rest.join(" ")),
                _ => None,
            },
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum HealthTest {
    Shell(String),
    List(Vec<String>),
}

#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum PortEntry {
    Number(u32),
    Short(String),
    Long {
        target: u32,
        published: Option<serde_yaml::Value>,
        host_ip: Option<String>,
        protocol: Option<String>,
    },
}

#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum VolumeMount {
    Short(String),
    Long {
        #[serde(rename = "type")]
        kind: Option<String>,
        source: Option<String>,
        target: String,
    },
}

impl VolumeMount {
    /// `(source, target)` of the mount; anonymous volumes have no source.
    pub fn source_and_target(&self) -> (Option<String>, String) {
        match self {
            VolumeMount::Short(spec) => {
                let mut parts = spec.splitn(3, ':');
                let first = parts.next().unwrap_or_default().to_string();
                match parts.next() {
                    Some(target) => (Some(first), target.to_string()),
                    None => (None, first),
                }
            }
            VolumeMount::Long { source, target, .. } => (source.clone(), target.clone()),
        }
    }

    /// Name of the named volume this mount uses, if it uses one.
    pub fn named_volume(&self) -> Option<String> {
        if let VolumeMount::Long { kind: Some(kind), .. } = self {
            if kind != "volume" {
                return None;
            }
        }
        let (source, _) = self.source_and_target();
        source.filter(|s| !is_host_path(s))
    }
}

fn is_host_path(source: &str) -> bool {
    source.starts_with('.') || source.starts_with('/') || source.starts_with('~') || source.contains('/')
}

pub(crate) fn scalar_to_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DESCRIPTOR: &str = r#"
services:
  api:
    build: .
    restart: always
    env_file: .env
    environment:
      - RUST_LOG=info
      - PASSTHROUGH
    ports:
      - "8000:8000"
      - 9000
    depends_on:
      db:
        condition: service_healthy
  db:
    image: docker.io/library/postgres:16
    env_file:
      - path: .env.db
        required: false
    healthcheck:
      test: ["CMD-SHELL", "pg_isready -U ${POSTGRES_USER}"]
      interval: 10s
    volumes:
      - postgres_data:/var/lib/postgresql/data
      - ./init:/docker-entrypoint-initdb.d
  worker:
    image: busybox
    depends_on: [db]
    healthcheck:
      test: ["NONE"]
volumes:
  postgres_data:
"#;

    #[test]
    fn parses_short_and_long_syntaxes() {
        let compose = ComposeFile::from_yaml(DESCRIPTOR).unwrap();
        assert_eq!(compose.services.len(), 3);
        assert!(compose.volumes.contains_key("postgres_data"));

        let api = compose.service("api").unwrap();
        assert_eq!(api.env_files(), vec![EnvFileEntry::Path(".env".to_string())]);
        assert_eq!(
            api.dependencies(),
            vec![("db".to_string(), CONDITION_HEALTHY.to_string())]
        );
        assert_eq!(api.ports.len(), 2);
        let env = api.inline_environment();
        assert_eq!(env.get("RUST_LOG"), Some(&Some("info".to_string())));
        assert_eq!(env.get("PASSTHROUGH"), Some(&None));

        let db = compose.service("db").unwrap();
        assert!(!db.env_files()[0].required());
        assert!(db.is_postgres());
        assert_eq!(
            db.active_healthcheck().and_then(HealthCheck::command).as_deref(),
            Some("pg_isready -U ${POSTGRES_USER}")
        );
    }

    #[test]
    fn short_depends_on_means_started() {
        let compose = ComposeFile::from_yaml(DESCRIPTOR).unwrap();
        let worker = compose.service("worker").unwrap();
        assert_eq!(
            worker.dependencies(),
            vec![("db".to_string(), CONDITION_STARTED.to_string())]
        );
        assert!(worker.active_healthcheck().is_none());
    }

    #[test]
    fn named_volumes_are_told_apart_from_bind_mounts() {
        let compose = ComposeFile::from_yaml(DESCRIPTOR).unwrap();
        let named: Vec<_> = compose.service("db").unwrap().volumes.iter().filter_map(VolumeMount::named_volume).collect();
        assert_eq!(named, vec!["postgres_data".to_string()]);
    }

    #[test]
    fn invalid_yaml_is_a_parse_error() {
        assert!(matches!(
            ComposeFile::from_yaml("services: [unclosed"),
            Err(ComposeError::Parse(_))
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        assert!(matches!(
            ComposeFile::load("/definitely/not/here.yml"),
            Err(ComposeError::Io { .. })
        ));
    }
}
