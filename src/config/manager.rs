use std::ffi::OsString;
use std::path::{Path, PathBuf};

use clap::{ArgMatches, Command};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::file;
use super::flags::FlagSet;
use super::schema::Configurable;
use super::walker::generate_flags;
use super::ConfigError;

/// Name of the flag holding the configuration file path.
pub const CONFIG_FLAG: &str = "config";

/// Configuration file read when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "./config.yml";

/// Binds a configuration struct to command-line flags and a YAML file.
///
/// Values are layered with the file as the base and explicitly set flags on
/// top. The target is borrowed for the manager's lifetime and every flag
/// writes straight into it.
///
/// ## Example
///
/// ```no_run
/// use bindery::config::Manager;
/// use serde::{Deserialize, Serialize};
///
/// bindery::configurable! {
///     #[derive(Debug, Default, Serialize, Deserialize)]
///     pub struct Settings {
///         pub name [name: "name", short: "n", description: "Service name"]: String,
///         pub port [name: "port", short: "p"]: u16,
///     }
/// }
///
/// let mut settings = Settings::default();
/// let mut manager = Manager::new(&mut settings)?;
/// manager.parse_args(std::env::args_os())?;
/// manager.parse_configuration()?;
/// # Ok::<(), bindery::Error>(())
/// ```
#[derive(Debug)]
pub struct Manager<'a, T> {
    flags: FlagSet<T>,
    target: &'a mut T,
}

impl<'a, T> Manager<'a, T>
where
    T: Configurable + Serialize + DeserializeOwned,
{
    /// Creates a manager reading flag names from the `name` annotation.
    pub fn new(target: &'a mut T) -> Result<Self, ConfigError> {
        Self::with_name_tag(target, "")
    }

    /// Creates a manager reading flag names from the `name_tag` annotation.
    ///
    /// An empty `name_tag` falls back to `name`.
    pub fn with_name_tag(target: &'a mut T, name_tag: &str) -> Result<Self, ConfigError> {
        let mut flags = FlagSet::new(CONFIG_FLAG);
        flags.add_owned(
            CONFIG_FLAG,
            Some("c"),
            DEFAULT_CONFIG_FILE,
            "location of the configuration file",
        )?;
        generate_flags(name_tag, &mut flags, target, "")?;
        tracing::debug!(flags = flags.len(), "generated flags");

        Ok(Self { flags, target })
    }

    /// The live flag registry.
    pub fn flag_set(&self) -> &FlagSet<T> {
        &self.flags
    }

    pub fn flag_set_mut(&mut self) -> &mut FlagSet<T> {
        &mut self.flags
    }

    /// The configuration file that [`parse_configuration`](Self::parse_configuration) reads.
    pub fn config_file(&self) -> PathBuf {
        let path = self
            .flags
            .lookup(CONFIG_FLAG)
            .and_then(|f| f.owned_value())
            .unwrap_or(DEFAULT_CONFIG_FILE);
        PathBuf::from(path)
    }

    /// Points the manager at another configuration file, as `--config` would.
    pub fn set_config_file(&mut self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref().to_string_lossy();
        self.flags.set(self.target, CONFIG_FLAG, &path)?;
        Ok(())
    }

    /// A command carrying every flag, `--config` included.
    pub fn command(&self) -> Command {
        self.flags.command()
    }

    /// Parses `args` (program name first) and applies the explicitly set flags.
    pub fn parse_args<I, S>(&mut self, args: I) -> Result<ArgMatches, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString> + Clone,
    {
        Ok(self.flags.parse_from(self.target, args)?)
    }

    /// Applies matches from a command augmented with [`FlagSet::augment`].
    pub fn apply_matches(&mut self, matches: &ArgMatches) -> Result<(), ConfigError> {
        self.flags.apply_matches(self.target, matches)?;
        Ok(())
    }

    /// Loads the configuration file and re-applies explicitly set flags on top.
    pub fn parse_configuration(&mut self) -> Result<(), ConfigError> {
        let target = &*self.target;
        let overrides: Vec<(String, String)> = self
            .flags
            .changed()
            .filter(|f| f.name() != CONFIG_FLAG)
            .map(|f| (f.name().to_string(), f.value(target)))
            .collect();

        let path = self.config_file();
        file::load_into(&path, self.target)?;

        for (name, value) in overrides {
            tracing::trace!(flag = %name, %value, "re-applying flag over config file");
            self.flags
                .set(self.target, &name, &value)
                .map_err(|source| ConfigError::SetFlag { name, source })?;
        }
        Ok(())
    }

    /// The bound configuration.
    pub fn target(&self) -> &T {
        &*self.target
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FlagError, FlagKind};
    use serde::Deserialize;
    use std::collections::HashMap;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    crate::configurable! {
        #[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
        struct Basic {
            pub name [name: "name", description: "Basic name"]: String,
            pub version [name: "version", description: "Basic version"]: String,
        }
    }

    crate::configurable! {
        #[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
        struct Server {
            pub host [name: "host", description: "Server host"]: String,
            pub port [name: "port", short: "p", description: "Server port"]: i64,
            #[serde(with = "crate::config::duration")]
            pub timeout [name: "timeout", description: "Request timeout"]: Duration,
        }
    }

    crate::configurable! {
        #[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
        struct Settings {
            pub name [name: "name", short: "n", description: "The name"]: String,
            pub debug [name: "debug", short: "d", description: "Enable debug mode"]: bool,
            pub rate [name: "rate"]: f64,
            pub basic [name: "basic"]: Basic,
            pub server [name: "server"]: Server,
            #[serde(default)]
            pub tags [name: "tags", description: "List of tags"]: Vec<String>,
            #[serde(default)]
            pub ports [name: "ports"]: Vec<i64>,
            #[serde(default)]
            pub metadata [name: "metadata"]: HashMap<String, String>,
        }
    }

    crate::configurable! {
        #[derive(Debug, Default, Serialize, Deserialize)]
        struct Clashing {
            pub config [name: "config"]: String,
        }
    }

    crate::configurable! {
        #[derive(Debug, Default, Serialize, Deserialize)]
        struct Proxy {
            pub host [name: "host", short: "h", description: "Upstream host"]: String,
            #[serde(default)]
            pub headers [name: "headers"]: HashMap<String, Vec<String>>,
        }
    }

    fn config_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{contents}").unwrap();
        file
    }

    fn args(file: &NamedTempFile, rest: &[&str]) -> Vec<String> {
        let mut args = vec![
            "app".to_string(),
            "--config".to_string(),
            file.path().to_string_lossy().into_owned(),
        ];
        args.extend(rest.iter().map(|s| s.to_string()));
        args
    }

    const FULL_CONFIG: &str = "\
name: from-file
debug: false
rate: 0.5
basic:
  name: basic-from-file
  version: v1.2.3
server:
  host: example.com
  port: 8080
  timeout: 30s
tags: [a, b]
ports: [80, 443]
metadata:
  env: prod
";

    #[test]
    fn test_config_flag_is_registered_first() {
        let mut settings = Settings::default();
        let manager = Manager::new(&mut settings).unwrap();
        let flags = manager.flag_set();

        let config = flags.iter().next().unwrap();
        assert_eq!(config.name(), CONFIG_FLAG);
        assert_eq!(config.short(), Some('c'));
        assert_eq!(config.default_value(), DEFAULT_CONFIG_FILE);
        assert_eq!(manager.config_file(), PathBuf::from(DEFAULT_CONFIG_FILE));
        assert!(flags.lookup("server.timeout").is_some());
        assert_eq!(flags.lookup("metadata").unwrap().kind(), FlagKind::StringMap);
    }

    #[test]
    fn test_file_only() {
        let file = config_file(FULL_CONFIG);
        let mut settings = Settings::default();
        let mut manager = Manager::new(&mut settings).unwrap();

        manager.parse_args(args(&file, &[])).unwrap();
        manager.parse_configuration().unwrap();

        assert_eq!(settings.name, "from-file");
        assert!(!settings.debug);
        assert_eq!(settings.rate, 0.5);
        assert_eq!(settings.basic.version, "v1.2.3");
        assert_eq!(settings.server.host, "example.com");
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.server.timeout, Duration::from_secs(30));
        assert_eq!(settings.tags, ["a", "b"]);
        assert_eq!(settings.ports, [80, 443]);
        assert_eq!(settings.metadata["env"], "prod");
    }

    #[test]
    fn test_explicit_flags_win_over_file() {
        let file = config_file(FULL_CONFIG);
        let mut settings = Settings::default();
        let mut manager = Manager::new(&mut settings).unwrap();

        manager
            .parse_args(args(
                &file,
                &["--name", "from-flag", "--debug", "-p", "9090", "--server.timeout=1m30s"],
            ))
            .unwrap();
        manager.parse_configuration().unwrap();

        assert_eq!(settings.name, "from-flag");
        assert!(settings.debug);
        assert_eq!(settings.server.port, 9090);
        assert_eq!(settings.server.timeout, Duration::from_secs(90));
        // untouched flags keep the file values
        assert_eq!(settings.server.host, "example.com");
        assert_eq!(settings.basic.name, "basic-from-file");
    }

    #[test]
    fn test_explicit_collections_win_over_file() {
        let file = config_file(FULL_CONFIG);
        let mut settings = Settings::default();
        let mut manager = Manager::new(&mut settings).unwrap();

        manager
            .parse_args(args(
                &file,
                &["--tags", "x", "--tags", "y,z", "--ports=8080", "--metadata", "env=dev,zone=eu"],
            ))
            .unwrap();
        manager.parse_configuration().unwrap();

        assert_eq!(settings.tags, ["x", "y", "z"]);
        assert_eq!(settings.ports, [8080]);
        assert_eq!(settings.metadata.len(), 2);
        assert_eq!(settings.metadata["env"], "dev");
        assert_eq!(settings.metadata["zone"], "eu");
    }

    #[test]
    fn test_short_flags() {
        let file = config_file("name: from-file\n");
        let mut settings = Settings::default();
        let mut manager = Manager::new(&mut settings).unwrap();

        manager.parse_args(args(&file, &["-n", "short", "-d"])).unwrap();
        manager.parse_configuration().unwrap();

        assert_eq!(settings.name, "short");
        assert!(settings.debug);
    }

    #[test]
    fn test_bool_flag_can_be_set_false_explicitly() {
        let file = config_file("debug: true\n");
        let mut settings = Settings::default();
        let mut manager = Manager::new(&mut settings).unwrap();

        manager.parse_args(args(&file, &["--debug=false"])).unwrap();
        manager.parse_configuration().unwrap();

        assert!(!settings.debug);
    }

    #[test]
    fn test_defaults_survive_when_file_is_silent() {
        let file = config_file("name: from-file\n");
        let mut settings = Settings {
            rate: 1.25,
            tags: vec!["default".to_string()],
            ..Default::default()
        };
        let mut manager = Manager::new(&mut settings).unwrap();

        manager.parse_args(args(&file, &[])).unwrap();
        manager.parse_configuration().unwrap();

        assert_eq!(settings.name, "from-file");
        assert_eq!(settings.rate, 1.25);
        assert_eq!(settings.tags, ["default"]);
    }

    #[test]
    fn test_flags_without_file_values() {
        let file = config_file("{}\n");
        let mut settings = Settings::default();
        let mut manager = Manager::new(&mut settings).unwrap();

        manager.parse_args(args(&file, &["--basic.name", "only-flag"])).unwrap();
        manager.parse_configuration().unwrap();

        assert_eq!(settings.basic.name, "only-flag");
    }

    #[test]
    fn test_missing_config_file() {
        let mut settings = Settings::default();
        let mut manager = Manager::new(&mut settings).unwrap();
        manager.set_config_file("/nonexistent/path/config.yml").unwrap();

        let err = manager.parse_configuration().unwrap_err();
        assert!(matches!(err, ConfigError::ReadConfig { .. }));
        assert!(err.to_string().contains("could not read config file"));
    }

    #[test]
    fn test_invalid_yaml() {
        let file = config_file("name: [unclosed\n  debug: {\n");
        let mut settings = Settings::default();
        let mut manager = Manager::new(&mut settings).unwrap();
        manager.set_config_file(file.path()).unwrap();

        let err = manager.parse_configuration().unwrap_err();
        assert!(matches!(err, ConfigError::ParseConfig { .. }));
        assert!(err.to_string().contains("could not parse config file"));
    }

    #[test]
    fn test_set_config_file() {
        let file = config_file("name: elsewhere\n");
        let mut settings = Settings::default();
        let mut manager = Manager::new(&mut settings).unwrap();

        manager.set_config_file(file.path()).unwrap();
        assert_eq!(manager.config_file(), file.path());
        manager.parse_configuration().unwrap();

        assert_eq!(manager.target().name, "elsewhere");
    }

    #[test]
    fn test_config_flag_is_not_reapplied() {
        let file = config_file("name: from-file\n");
        let mut settings = Settings::default();
        let mut manager = Manager::new(&mut settings).unwrap();

        manager.parse_args(args(&file, &[])).unwrap();
        let changed: Vec<&str> = manager.flag_set().changed().map(|f| f.name()).collect();
        assert_eq!(changed, [CONFIG_FLAG]);

        manager.parse_configuration().unwrap();
        assert_eq!(manager.config_file(), file.path());
    }

    #[test]
    fn test_apply_matches_from_caller_command() {
        let file = config_file(FULL_CONFIG);
        let mut settings = Settings::default();
        let mut manager = Manager::new(&mut settings).unwrap();

        let command = manager
            .flag_set()
            .augment(Command::new("serve").about("Runs the server"));
        let matches = command
            .try_get_matches_from(args(&file, &["--server.host", "cli.example.com"]))
            .unwrap();
        manager.apply_matches(&matches).unwrap();
        manager.parse_configuration().unwrap();

        assert_eq!(settings.server.host, "cli.example.com");
        assert_eq!(settings.server.port, 8080);
    }

    #[test]
    fn test_deterministic_for_identical_inputs() {
        let file = config_file(FULL_CONFIG);
        let run = || {
            let mut settings = Settings::default();
            let mut manager = Manager::new(&mut settings).unwrap();
            manager
                .parse_args(args(&file, &["--name", "flag", "--tags", "t1"]))
                .unwrap();
            manager.parse_configuration().unwrap();
            settings
        };

        assert_eq!(run(), run());
    }

    #[test]
    fn test_custom_name_tag_leaves_only_config_flag() {
        let mut settings = Settings::default();
        let manager = Manager::with_name_tag(&mut settings, "yaml").unwrap();

        let names: Vec<&str> = manager.flag_set().iter().map(|f| f.name()).collect();
        assert_eq!(names, [CONFIG_FLAG]);
    }

    #[test]
    fn test_field_named_config_is_rejected() {
        let mut target = Clashing::default();
        let err = Manager::new(&mut target).unwrap_err();
        assert!(matches!(err, ConfigError::Flag(FlagError::Redefined(name)) if name == "config"));
    }

    #[test]
    fn test_field_may_take_short_h() {
        let file = config_file("host: from-file\n");
        let mut proxy = Proxy::default();
        let mut manager = Manager::new(&mut proxy).unwrap();

        manager.parse_args(args(&file, &["-h", "example.com"])).unwrap();
        manager.parse_configuration().unwrap();

        assert_eq!(proxy.host, "example.com");
    }

    #[test]
    fn test_multi_valued_map_is_filled_from_file() {
        let file = config_file("host: from-file\nheaders:\n  Accept: [a, b]\n  X-Trace: [trace]\n");
        let mut proxy = Proxy::default();
        let mut manager = Manager::new(&mut proxy).unwrap();
        assert!(manager.flag_set().lookup("headers").is_none());

        manager.parse_args(args(&file, &["--host", "from-flag"])).unwrap();
        manager.parse_configuration().unwrap();

        assert_eq!(proxy.host, "from-flag");
        assert_eq!(proxy.headers.len(), 2);
        assert_eq!(proxy.headers["Accept"], ["a", "b"]);
        assert_eq!(proxy.headers["X-Trace"], ["trace"]);
    }

    #[test]
    fn test_invalid_flag_value() {
        let mut settings = Settings::default();
        let mut manager = Manager::new(&mut settings).unwrap();

        let err = manager.parse_args(["app", "--server.port", "eighty"]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Flag(FlagError::InvalidValue { ref name, .. }) if name == "server.port"
        ));
    }
}
