use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::duration::parse_duration;
use super::interpolate::{interpolate, referenced_variables};
use super::ports::{check_port_number, PortMapping};
use super::{
    scalar_to_string, ComposeError, ComposeFile, HealthTest, PortEntry, Service,
    CONDITION_COMPLETED, CONDITION_HEALTHY, CONDITION_STARTED, POSTGRES_DATA_DIR,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Check {
    Structure,
    EnvFile,
    Dependency,
    HealthCheck,
    Volume,
    Port,
    Restart,
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Check::Structure => "structure",
            Check::EnvFile => "env_file",
            Check::Dependency => "depends_on",
            Check::HealthCheck => "healthcheck",
            Check::Volume => "volumes",
            Check::Port => "ports",
            Check::Restart => "restart",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub severity: Severity,
    pub service: Option<String>,
    pub check: Check,
    pub message: String,
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        match &self.service {
            Some(service) => write!(f, "{} [{}] {}: {}", severity, service, self.check, self.message),
            None => write!(f, "{} {}: {}", severity, self.check, self.message),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub findings: Vec<Finding>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.errors().next().is_none()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.severity == Severity::Warning)
    }

    /// Findings reported for `service` under `check`.
    pub fn find(&self, service: &str, check: Check) -> Vec<&Finding> {
        self.findings
            .iter()
            .filter(|f| f.check == check && f.service.as_deref() == Some(service))
            .collect()
    }

    fn push(&mut self, severity: Severity, service: Option<&str>, check: Check, message: impl Into<String>) {
        self.findings.push(Finding {
            severity,
            service: service.map(str::to_string),
            check,
            message: message.into(),
        });
    }

    fn error(&mut self, service: &str, check: Check, message: impl Into<String>) {
        self.push(Severity::Error, Some(service), check, message);
    }

    fn warning(&mut self, service: &str, check: Check, message: impl Into<String>) {
        self.push(Severity::Warning, Some(service), check, message);
    }
}

/// Where relative env files resolve from, and the variables compose itself
/// would see when interpolating the file.
#[derive(Debug, Clone)]
pub struct ValidationContext {
    pub project_dir: PathBuf,
    pub process_env: HashMap<String, String>,
}

impl ValidationContext {
    pub fn new<P: Into<PathBuf>>(project_dir: P) -> Self {
        ValidationContext {
            project_dir: project_dir.into(),
            process_env: std::env::vars().collect(),
        }
    }

    pub fn with_process_env(mut self, env: HashMap<String, String>) -> Self {
        self.process_env = env;
        self
    }

    /// Loads `compose_path` and validates it against this context.
    pub fn validate_file<P: AsRef<Path>>(&self, compose_path: P) -> Result<ValidationReport, ComposeError> {
        let compose = ComposeFile::load(compose_path)?;
        Ok(self.validate(&compose))
    }

    pub fn validate(&self, compose: &ComposeFile) -> ValidationReport {
        let mut report = ValidationReport::default();
        if compose.services.is_empty() {
            report.push(Severity::Error, None, Check::Structure, "no services are declared");
            return report;
        }

        let project_env = self.project_dotenv(&mut report);
        let mut used_volumes = BTreeSet::new();

        for (name, service) in &compose.services {
            debug!(service = %name, "Validating service");
            let service_env = self.service_env(name, service, &mut report);

            // Compose precedence: process env, then the project .env file.
            // The service's own env files fill in what neither defines.
            let mut vars = service_env.clone();
            vars.extend(project_env.clone());
            vars.extend(self.process_env.clone());

            check_structure(name, service, &mut report);
            check_restart(name, service, &mut report);
            check_ports(name, service, &vars, &mut report);
            check_healthcheck(name, service, &service_env, &mut report);
            check_dependencies(name, service, compose, &mut report);
            check_volumes(name, service, compose, &service_env, &mut used_volumes, &mut report);
        }

        for volume in compose.volumes.keys() {
            if !used_volumes.contains(volume) {
                report.push(
                    Severity::Warning,
                    None,
                    Check::Volume,
                    format!("volume {} is declared but not mounted by any service", volume),
                );
            }
        }

        report
    }

    fn project_dotenv(&self, report: &mut ValidationReport) -> HashMap<String, String> {
        let path = self.project_dir.join(".env");
        if !path.is_file() {
            return HashMap::new();
        }
        match read_env_file(&path) {
            Ok(vars) => vars,
            Err(e) => {
                report.push(
                    Severity::Error,
                    None,
                    Check::EnvFile,
                    format!("failed to read {}: {}", path.display(), e),
                );
                HashMap::new()
            }
        }
    }

    /// Variables a service's container is started with: its env files, then
    /// inline `environment:` entries on top.
    fn service_env(&self, name: &str, service: &Service, report: &mut ValidationReport) -> HashMap<String, String> {
        let mut vars = HashMap::new();

        for entry in service.env_files() {
            let path = self.project_dir.join(entry.path());
            if !path.is_file() {
                if entry.required() {
                    report.error(name, Check::EnvFile, format!("env file {} does not exist", entry.path()));
                }
                continue;
            }
            match read_env_file(&path) {
                Ok(file_vars) => vars.extend(file_vars),
                Err(e) => report.error(
                    name,
                    Check::EnvFile,
                    format!("failed to read env file {}: {}", entry.path(), e),
                ),
            }
        }

        for (key, value) in service.inline_environment() {
            let value = value.or_else(|| self.process_env.get(&key).cloned()).unwrap_or_default();
            vars.insert(key, value);
        }
        vars
    }
}

fn read_env_file(path: &Path) -> Result<HashMap<String, String>, dotenvy::Error> {
    dotenvy::from_path_iter(path)?.collect()
}

fn check_structure(name: &str, service: &Service, report: &mut ValidationReport) {
    if service.image.is_none() && service.build.is_none() {
        report.error(name, Check::Structure, "service has neither an image nor a build section");
    }
}

fn check_restart(name: &str, service: &Service, report: &mut ValidationReport) {
    let Some(policy) = service.restart.as_deref() else {
        return;
    };
    let valid = match policy {
        "no" | "always" | "unless-stopped" | "on-failure" => true,
        other => other
            .strip_prefix("on-failure:")
            .is_some_and(|n| n.parse::<u32>().is_ok()),
    };
    if !valid {
        report.error(name, Check::Restart, format!("unknown restart policy {:?}", policy));
    }
}

fn check_ports(name: &str, service: &Service, vars: &HashMap<String, String>, report: &mut ValidationReport) {
    for entry in &service.ports {
        match entry {
            PortEntry::Number(port) => {
                if let Err(e) = check_port_number(*port) {
                    report.error(name, Check::Port, e.to_string());
                }
            }
            PortEntry::Short(raw) => match interpolate(raw, vars) {
                Ok(expanded) => {
                    if let Err(e) = PortMapping::parse(&expanded) {
                        report.error(name, Check::Port, e.to_string());
                    }
                }
                Err(e) => report.error(name, Check::Port, format!("cannot resolve {:?}: {}", raw, e)),
            },
            PortEntry::Long { target, published, protocol, .. } => {
                if let Err(e) = check_port_number(*target) {
                    report.error(name, Check::Port, e.to_string());
                }
                if let Some(published) = published.as_ref().and_then(scalar_to_string) {
                    let spec = format!("{}:{}", published, target);
                    match interpolate(&spec, vars) {
                        Ok(expanded) => {
                            if let Err(e) = PortMapping::parse(&expanded) {
                                report.error(name, Check::Port, e.to_string());
                            }
                        }
                        Err(e) => report.error(name, Check::Port, format!("cannot resolve {:?}: {}", published, e)),
                    }
                }
                if let Some(protocol) = protocol {
                    if !matches!(protocol.as_str(), "tcp" | "udp" | "sctp") {
                        report.error(name, Check::Port, format!("unknown protocol {:?}", protocol));
                    }
                }
            }
        }
    }
}

fn check_healthcheck(name: &str, service: &Service, service_env: &HashMap<String, String>, report: &mut ValidationReport) {
    let Some(hc) = service.active_healthcheck() else {
        return;
    };

    match &hc.test {
        None => report.error(name, Check::HealthCheck, "health check has no test command"),
        Some(HealthTest::List(items)) => match items.first().map(String::as_str) {
            Some("CMD") | Some("CMD-SHELL") if items.len() > 1 => {}
            Some("CMD") | Some("CMD-SHELL") => {
                report.error(name, Check::HealthCheck, "health check test has no command after its marker")
            }
            _ => report.error(
                name,
                Check::HealthCheck,
                "health check test list must start with CMD, CMD-SHELL or NONE",
            ),
        },
        Some(HealthTest::Shell(cmd)) if cmd.trim().is_empty() => {
            report.error(name, Check::HealthCheck, "health check test is empty")
        }
        Some(HealthTest::Shell(_)) => {}
    }

    if let Some(command) = hc.command() {
        for var in referenced_variables(&command) {
            if !service_env.contains_key(&var) {
                report.error(
                    name,
                    Check::HealthCheck,
                    format!("health check references {} which is not declared for this service", var),
                );
            }
        }
    }

    let mut timings = Vec::new();
    for (field, value) in [
        ("interval", &hc.interval),
        ("timeout", &hc.timeout),
        ("start_period", &hc.start_period),
        ("start_interval", &hc.start_interval),
    ] {
        if let Some(value) = value {
            match parse_duration(value) {
                Ok(d) => timings.push((field, d)),
                Err(e) => report.error(name, Check::HealthCheck, format!("{}: {}", field, e)),
            }
        }
    }

    let timing = |field: &str| timings.iter().find(|(f, _)| *f == field).map(|(_, d)| *d);
    if let (Some(interval), Some(timeout)) = (timing("interval"), timing("timeout")) {
        if timeout > interval {
            report.warning(
                name,
                Check::HealthCheck,
                format!("timeout {:?} is longer than interval {:?}", timeout, interval),
            );
        }
    }

    if hc.retries == Some(0) {
        report.error(name, Check::HealthCheck, "retries must be at least 1");
    }
}

fn check_dependencies(name: &str, service: &Service, compose: &ComposeFile, report: &mut ValidationReport) {
    for (dependency, condition) in service.dependencies() {
        if dependency == name {
            report.error(name, Check::Dependency, "service depends on itself");
            continue;
        }
        let Some(target) = compose.service(&dependency) else {
            report.error(name, Check::Dependency, format!("depends on undefined service {}", dependency));
            continue;
        };

        let has_healthcheck = target.active_healthcheck().is_some();
        match condition.as_str() {
            CONDITION_HEALTHY if !has_healthcheck => report.error(
                name,
                Check::Dependency,
                format!("waits for {} to be healthy but {} has no health check", dependency, dependency),
            ),
            CONDITION_STARTED if has_healthcheck => report.warning(
                name,
                Check::Dependency,
                format!(
                    "starts as soon as {} starts; use condition {} to wait for its health check",
                    dependency, CONDITION_HEALTHY
                ),
            ),
            CONDITION_HEALTHY | CONDITION_STARTED | CONDITION_COMPLETED => {}
            other => report.error(
                name,
                Check::Dependency,
                format!("unknown condition {:?} for {}", other, dependency),
            ),
        }
    }
}

fn check_volumes(
    name: &str,
    service: &Service,
    compose: &ComposeFile,
    service_env: &HashMap<String, String>,
    used: &mut BTreeSet<String>,
    report: &mut ValidationReport,
) {
    for mount in &service.volumes {
        if let Some(volume) = mount.named_volume() {
            if !compose.volumes.contains_key(&volume) {
                report.error(
                    name,
                    Check::Volume,
                    format!("named volume {} is not declared under top-level volumes", volume),
                );
            }
            used.insert(volume);
        }
    }

    if service.is_postgres() {
        // PGDATA may point below the mount, as the image docs suggest.
        let data_dir = service_env
            .get("PGDATA")
            .cloned()
            .unwrap_or_else(|| POSTGRES_DATA_DIR.to_string());
        let persisted = service.volumes.iter().any(|mount| {
            let (source, target) = mount.source_and_target();
            let target = target.trim_end_matches('/');
            source.is_some() && (data_dir == target || data_dir.starts_with(&format!("{}/", target)))
        });
        if !persisted {
            report.error(
                name,
                Check::Volume,
                format!("postgres data directory {} is not backed by a volume", data_dir),
            );
        }
    }
}
