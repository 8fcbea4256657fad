use debugkit_types::{Handler, HandlerCore, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use semver::Version;
use std::any::Any;
use std::collections::BTreeMap;
use std::ffi::OsString;

pub const TYPE: &str = "runtime";

/// Snapshot of the process and its host environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeInfo {
    pub os: String,
    pub family: String,
    pub arch: String,
    pub pid: u32,
    pub exe: Option<String>,
    pub cwd: Option<String>,
    pub args: Vec<String>,
    pub app_name: Option<String>,
    pub app_version: Option<String>,
    pub env: BTreeMap<String, String>,
}

impl RuntimeInfo {
    pub fn capture(include_env: bool) -> Self {
        let env = if include_env {
            lossy_env(std::env::vars_os())
        } else {
            BTreeMap::new()
        };

        Self {
            os: std::env::consts::OS.to_string(),
            family: std::env::consts::FAMILY.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            pid: std::process::id(),
            exe: std::env::current_exe()
                .ok()
                .map(|p| p.display().to_string()),
            cwd: std::env::current_dir()
                .ok()
                .map(|p| p.display().to_string()),
            args: std::env::args_os()
                .map(|arg| arg.to_string_lossy().into_owned())
                .collect(),
            app_name: None,
            app_version: None,
            env,
        }
    }
}

/// Captures runtime environment details at construction.
///
/// Logging checks two optional requirements: `version` (minimum application
/// version) and `extensions` (environment variables that must be set).
#[derive(Debug)]
pub struct RuntimeHandler {
    core: HandlerCore,
    info: RuntimeInfo,
}

impl Default for RuntimeHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeHandler {
    pub fn new() -> Self {
        Self {
            core: HandlerCore::new(),
            info: RuntimeInfo::capture(false),
        }
    }

    pub fn with_env(mut self) -> Self {
        self.info.env = lossy_env(std::env::vars_os());
        self
    }

    /// Identify the host application (typically `env!("CARGO_PKG_NAME")`
    /// and `env!("CARGO_PKG_VERSION")`).
    pub fn with_app(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.info.app_name = Some(name.into());
        self.info.app_version = Some(version.into());
        self
    }

    pub fn info(&self) -> &RuntimeInfo {
        &self.info
    }

    fn missing_env_vars(&self, required: &[String]) -> Vec<String> {
        required
            .iter()
            .filter(|name| std::env::var_os(name).is_none())
            .cloned()
            .collect()
    }
}

/// Non-UTF-8 names and values are kept with replacement characters.
fn lossy_env(vars: impl IntoIterator<Item = (OsString, OsString)>) -> BTreeMap<String, String> {
    vars.into_iter()
        .map(|(key, value)| {
            (
                key.to_string_lossy().into_owned(),
                value.to_string_lossy().into_owned(),
            )
        })
        .collect()
}

/// Whether `actual` is strictly below `required` in semver order. A leading
/// `v` is accepted on either side.
fn version_below(actual: &str, required: &str) -> std::result::Result<bool, semver::Error> {
    let parse = |v: &str| Version::parse(v.trim().trim_start_matches('v'));
    Ok(parse(actual)? < parse(required)?)
}

impl Handler for RuntimeHandler {
    fn handler_type(&self) -> &'static str {
        TYPE
    }

    fn core(&self) -> &HandlerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut HandlerCore {
        &mut self.core
    }

    fn prepare(&mut self) -> Value {
        json!({
            "os": self.info.os,
            "family": self.info.family,
            "arch": self.info.arch,
            "pid": self.info.pid,
            "exe": self.info.exe,
            "cwd": self.info.cwd,
            "args": self.info.args,
            "app_name": self.info.app_name,
            "app_version": self.info.app_version,
            "env": self.info.env,
        })
    }

    fn prepare_as_string(&mut self) -> String {
        let info = &self.info;
        let or_dash = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());

        let mut out = format!(
            "OS:\t\t{} ({})\nArch:\t\t{}\nPID:\t\t{}\nExecutable:\t{}\nDirectory:\t{}\nArguments:\t{}\n",
            info.os,
            info.family,
            info.arch,
            info.pid,
            or_dash(&info.exe),
            or_dash(&info.cwd),
            info.args.join(" ")
        );

        if let Some(name) = &info.app_name {
            out.push_str(&format!(
                "Application:\t{} {}\n",
                name,
                or_dash(&info.app_version)
            ));
        }

        if !info.env.is_empty() {
            out.push_str("\nEnvironment:\n");
            for (key, value) in &info.env {
                out.push_str(&format!("\t{}={}\n", key, value));
            }
        }

        out.push('\n');
        out
    }

    fn log(&mut self) -> Result<()> {
        let Some(target) = self.core.log_target(TYPE)? else {
            return Ok(());
        };

        let mut messages = Vec::new();

        if let Some(required) = &target.params.version {
            match &self.info.app_version {
                Some(actual) => match version_below(actual, required) {
                    Ok(true) => messages.push(format!(
                        "Application version {} is below the required version {}",
                        actual, required
                    )),
                    Ok(false) => {}
                    Err(e) => messages.push(format!(
                        "Application version {} cannot be checked against the required version {}: {}",
                        actual, required, e
                    )),
                },
                None => messages.push(format!(
                    "Application version is unknown; version {} is required",
                    required
                )),
            }
        }

        let missing = self.missing_env_vars(&target.params.extensions);
        if !missing.is_empty() {
            messages.push(format!(
                "Missing required environment variables: {}",
                missing.join(", ")
            ));
        }

        if target.params.version.is_none() && target.params.extensions.is_empty() {
            messages.push(format!(
                "Runtime: {}/{} pid {}",
                self.info.os, self.info.arch, self.info.pid
            ));
        }

        if messages.is_empty() {
            return Ok(());
        }

        let context = self.log_context(target.params.context);
        for message in &messages {
            target.emit(message, &context);
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use debugkit_testing::RecordingLogger;
    use debugkit_types::{Level, LoggingParams};

    #[test]
    fn test_version_below_follows_semver() {
        assert!(version_below("1.2.0", "1.10.0").unwrap());
        assert!(!version_below("v2.0.0", "2.0.0").unwrap());
        assert!(!version_below("3.1.4", "3.1.0").unwrap());
        assert!(version_below("1.0.0-rc.2", "1.0.0").unwrap());
        assert!(version_below("1.0.0-alpha", "1.0.0").unwrap());
        assert!(version_below("1.0.0-alpha", "1.0.0-beta").unwrap());
        assert!(version_below("3.1", "3.1.0").is_err());
    }

    #[test]
    fn test_prerelease_fails_release_requirement() {
        let logger = RecordingLogger::new();
        let mut handler = RuntimeHandler::new()
            .with_app("demo", "1.0.0-rc.2")
            .with_logger(logger.shared(), LoggingParams::new(Level::Warning).with_version("1.0.0"));

        handler.log().unwrap();

        assert_eq!(
            logger.messages(),
            vec!["Application version 1.0.0-rc.2 is below the required version 1.0.0"]
        );
    }

    #[test]
    fn test_unparseable_version_is_reported() {
        let logger = RecordingLogger::new();
        let mut handler = RuntimeHandler::new()
            .with_app("demo", "nightly")
            .with_logger(logger.shared(), LoggingParams::new(Level::Warning).with_version("1.0.0"));

        handler.log().unwrap();

        let messages = logger.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with(
            "Application version nightly cannot be checked against the required version 1.0.0"
        ));
    }

    #[test]
    fn test_satisfied_version_is_silent() {
        let logger = RecordingLogger::new();
        let mut handler = RuntimeHandler::new()
            .with_app("demo", "1.4.0")
            .with_logger(logger.shared(), LoggingParams::new(Level::Warning).with_version("1.0.0"));

        handler.log().unwrap();

        assert!(logger.messages().is_empty());
    }

    #[test]
    #[cfg(unix)]
    fn test_env_tolerates_invalid_utf8() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let env = lossy_env([
            (OsString::from("DEBUGKIT_OK"), OsString::from("plain")),
            (
                OsString::from("DEBUGKIT_RAW"),
                OsStr::from_bytes(b"\xff\xfe").to_os_string(),
            ),
        ]);

        assert_eq!(env["DEBUGKIT_OK"], "plain");
        assert_eq!(env["DEBUGKIT_RAW"], "\u{FFFD}\u{FFFD}");
    }

    #[test]
    fn test_capture_without_env() {
        let mut handler = RuntimeHandler::new().with_app("demo", "0.1.0");
        let prepared = handler.prepare();

        assert_eq!(prepared["os"], std::env::consts::OS);
        assert_eq!(prepared["pid"], std::process::id());
        assert_eq!(prepared["app_version"], "0.1.0");
        assert_eq!(prepared["env"], json!({}));
        assert!(handler.prepare_as_string().contains("Application:\tdemo 0.1.0"));
    }
}
