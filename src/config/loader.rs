//! Configuration loading for a fleet node
//!
//! Every node of a project reads the same shared layers, so anything that
//! must differ per instance belongs in `local.toml`, a single file, a
//! `FLEET_*` variable or the command line.

use std::path::{Path, PathBuf};

use config::{Config, ConfigBuilder, File, FileFormat, builder::DefaultState};

use crate::config::environment::Environment;
use crate::config::error::ConfigError;
use crate::config::settings::Settings;

const CONFIG_DIR_ENV: &str = "FLEET_CONFIG_DIR";
const CONFIG_FILE_ENV: &str = "FLEET_CONFIG_FILE";
const DEFAULT_CONFIG_DIR: &str = "config";

/// `FLEET_STORE__REDIS__URL` maps to `store.redis.url`
const ENV_PREFIX: &str = "FLEET";
const ENV_SEPARATOR: &str = "__";

/// Per-instance key that may not come from a shared layer
const INSTANCE_ID_KEY: &str = "coordination.instance_id";

/// Where file based settings come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// `default.toml`, then `{environment}.toml`, then `local.toml`
    Layered { dir: PathBuf },
    /// One file replacing all layers
    SingleFile(PathBuf),
}

impl ConfigSource {
    fn from_env() -> Result<Self, ConfigError> {
        let dir = non_empty_var(CONFIG_DIR_ENV).map(PathBuf::from);
        let file = non_empty_var(CONFIG_FILE_ENV).map(PathBuf::from);

        match (dir, file) {
            (Some(dir), Some(file)) => Err(ConfigError::ConflictingSources { dir, file }),
            (_, Some(file)) => Ok(ConfigSource::SingleFile(file)),
            (dir, None) => Ok(ConfigSource::Layered {
                dir: dir.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_DIR)),
            }),
        }
    }
}

/// One file in the load order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layer {
    pub path: PathBuf,
    pub required: bool,
    /// Read by every instance of the project
    pub shared: bool,
}

/// Resolves the configuration source and environment, then loads and
/// validates [`Settings`].
#[derive(Debug)]
pub struct ConfigLoader {
    source: ConfigSource,
    environment: Environment,
}

impl ConfigLoader {
    /// Resolve `FLEET_CONFIG_DIR`, `FLEET_CONFIG_FILE` and `FLEET_APP_ENV`
    ///
    /// # Errors
    /// Fails when both source variables are set or the environment is unknown.
    pub fn new() -> Result<Self, ConfigError> {
        Self::with_overrides(None, None)
    }

    /// Like [`ConfigLoader::new`], with `--config` and `--env` taking
    /// precedence over their variables.
    pub fn with_overrides(
        config_file: Option<PathBuf>,
        environment: Option<Environment>,
    ) -> Result<Self, ConfigError> {
        let source = match config_file {
            Some(file) => ConfigSource::SingleFile(file),
            None => ConfigSource::from_env()?,
        };
        let environment = match environment {
            Some(environment) => environment,
            None => Environment::from_env()?,
        };

        Ok(Self {
            source,
            environment,
        })
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn source(&self) -> &ConfigSource {
        &self.source
    }

    /// Files to read, lowest precedence first
    pub fn layers(&self) -> Vec<Layer> {
        match &self.source {
            ConfigSource::SingleFile(path) => vec![Layer {
                path: path.clone(),
                required: true,
                shared: false,
            }],
            ConfigSource::Layered { dir } => vec![
                Layer {
                    path: dir.join("default.toml"),
                    required: true,
                    shared: true,
                },
                Layer {
                    path: dir.join(format!("{}.toml", self.environment.as_str())),
                    required: false,
                    shared: true,
                },
                Layer {
                    path: dir.join("local.toml"),
                    required: false,
                    shared: false,
                },
            ],
        }
    }

    /// Read every layer and the `FLEET_*` variables, then validate
    ///
    /// # Errors
    /// - a required layer is missing
    /// - a shared layer pins `coordination.instance_id`
    /// - a source fails to parse or deserialize
    /// - the merged settings fail [`Settings::validate`]
    pub fn load(&self) -> Result<Settings, ConfigError> {
        let mut builder = Config::builder();

        for layer in self.layers() {
            if !layer.path.exists() {
                if layer.required {
                    return Err(ConfigError::MissingFile(layer.path));
                }
                tracing::debug!(path = %layer.path.display(), "Optional configuration layer absent");
                continue;
            }
            if layer.shared {
                reject_pinned_instance_id(&layer.path)?;
            }
            tracing::debug!(path = %layer.path.display(), "Adding configuration layer");
            builder = builder.add_source(toml_file(&layer.path));
        }

        let settings: Settings = with_env_source(builder).build()?.try_deserialize()?;
        settings.validate()?;

        Ok(settings)
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn toml_file(path: &Path) -> File<config::FileSourceFile, FileFormat> {
    File::from(path).format(FileFormat::Toml)
}

/// A shared layer naming an instance id would give the whole fleet one id,
/// and every node would then believe it is the sole live instance.
fn reject_pinned_instance_id(path: &Path) -> Result<(), ConfigError> {
    let layer = Config::builder().add_source(toml_file(path)).build()?;
    if layer.get_string(INSTANCE_ID_KEY).is_ok() {
        return Err(ConfigError::invalid(
            INSTANCE_ID_KEY,
            format!(
                "{} is shared by every instance; set the instance id in local.toml, \
                 FLEET_COORDINATION__INSTANCE_ID or --instance-id instead",
                path.display()
            ),
        ));
    }
    Ok(())
}

fn with_env_source(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
    builder.add_source(
        config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator(ENV_SEPARATOR)
            .ignore_empty(true)
            .try_parsing(true),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    // Global mutex to ensure tests run sequentially to avoid env var conflicts
    static TEST_MUTEX: Mutex<()> = Mutex::new(());

    const DEFAULT_CONFIG: &str = r#"
[application]
name = "test-node"
project = "shop"

[logger]
level = "info"

[logger.console]
enabled = true
colored = false

[store]
backend = "redis"

[store.redis]
host = "127.0.0.1"
port = 6379

[coordination]
key_expiry_secs = 120
min_heartbeat_secs = 30
max_heartbeat_secs = 60
default_lock_ttl_ms = 120000
"#;

    /// Helper to create a temporary config directory with files
    fn setup_config_dir(files: &[(&str, &str)]) -> TempDir {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        for (name, content) in files {
            let path = temp_dir.path().join(name);
            fs::write(&path, content).expect("Failed to write config file");
        }
        temp_dir
    }

    /// Helper to safely set environment variables for a test
    struct EnvGuard {
        vars_to_restore: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        fn new() -> Self {
            Self {
                vars_to_restore: Vec::new(),
            }
        }

        fn set(&mut self, key: &str, value: &str) {
            let original = std::env::var(key).ok();
            self.vars_to_restore.push((key.to_string(), original));
            unsafe {
                std::env::set_var(key, value);
            }
        }

        fn remove(&mut self, key: &str) {
            let original = std::env::var(key).ok();
            self.vars_to_restore.push((key.to_string(), original));
            unsafe {
                std::env::remove_var(key);
            }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (key, original_value) in self.vars_to_restore.iter().rev() {
                unsafe {
                    match original_value {
                        Some(value) => std::env::set_var(key, value),
                        None => std::env::remove_var(key),
                    }
                }
            }
        }
    }

    /// Point the loader at `dir` in layered mode with a given environment.
    fn layered(env: &mut EnvGuard, dir: &TempDir, app_env: Option<&str>) {
        env.set("FLEET_CONFIG_DIR", dir.path().to_str().unwrap());
        env.remove("FLEET_CONFIG_FILE");
        match app_env {
            Some(value) => env.set("FLEET_APP_ENV", value),
            None => env.remove("FLEET_APP_ENV"),
        }
    }

    #[test]
    fn test_config_loader_new_default() {
        let _guard = TEST_MUTEX.lock().unwrap();
        let mut env = EnvGuard::new();

        env.remove("FLEET_CONFIG_DIR");
        env.remove("FLEET_CONFIG_FILE");
        env.remove("FLEET_APP_ENV");

        let loader = ConfigLoader::new().expect("Should create loader");
        assert_eq!(
            loader.source(),
            &ConfigSource::Layered {
                dir: PathBuf::from("config")
            }
        );
        assert_eq!(loader.environment(), Environment::Development);

        let layers = loader.layers();
        let names: Vec<_> = layers
            .iter()
            .map(|layer| layer.path.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, ["default.toml", "development.toml", "local.toml"]);
        assert!(layers[0].required && layers[0].shared);
        assert!(!layers[2].required && !layers[2].shared);
    }

    #[test]
    fn test_config_loader_mutual_exclusivity_error() {
        let _guard = TEST_MUTEX.lock().unwrap();
        let mut env = EnvGuard::new();

        env.set("FLEET_CONFIG_DIR", "/custom/config");
        env.set("FLEET_CONFIG_FILE", "/path/to/config.toml");

        match ConfigLoader::new() {
            Err(ConfigError::ConflictingSources { dir, file }) => {
                assert_eq!(dir, PathBuf::from("/custom/config"));
                assert_eq!(file, PathBuf::from("/path/to/config.toml"));
            }
            other => panic!("Expected ConflictingSources, got {other:?}"),
        }
    }

    #[test]
    fn test_config_loader_unknown_environment() {
        let _guard = TEST_MUTEX.lock().unwrap();
        let mut env = EnvGuard::new();

        env.remove("FLEET_CONFIG_DIR");
        env.remove("FLEET_CONFIG_FILE");
        env.set("FLEET_APP_ENV", "prodution");

        assert!(matches!(
            ConfigLoader::new(),
            Err(ConfigError::UnknownEnvironment(_))
        ));

        // --env wins over a bad variable
        let loader = ConfigLoader::with_overrides(None, Some(Environment::Staging)).unwrap();
        assert_eq!(loader.environment(), Environment::Staging);
    }

    #[test]
    fn test_load_missing_default_toml() {
        let _guard = TEST_MUTEX.lock().unwrap();
        let mut env = EnvGuard::new();

        let temp_dir = setup_config_dir(&[]);
        layered(&mut env, &temp_dir, None);

        let loader = ConfigLoader::new().expect("Should create loader");
        match loader.load() {
            Err(ConfigError::MissingFile(path)) => assert!(path.ends_with("default.toml")),
            other => panic!("Expected MissingFile error, got {other:?}"),
        }
    }

    #[test]
    fn test_load_default_toml_only() {
        let _guard = TEST_MUTEX.lock().unwrap();
        let mut env = EnvGuard::new();

        let temp_dir = setup_config_dir(&[("default.toml", DEFAULT_CONFIG)]);
        layered(&mut env, &temp_dir, None);

        let settings = ConfigLoader::new().unwrap().load().expect("Should load settings");

        assert_eq!(settings.application.name, "test-node");
        assert_eq!(settings.application.project, "shop");
        assert_eq!(settings.coordination.key_expiry_secs, 120);
        assert_eq!(settings.store.redis.connection_url(), "redis://127.0.0.1:6379");
        assert!(!settings.jobs.enabled);
    }

    #[test]
    fn test_load_with_environment_and_local_override() {
        let _guard = TEST_MUTEX.lock().unwrap();
        let mut env = EnvGuard::new();

        let production_config = r#"
[store.redis]
host = "cache.prod"

[coordination]
default_lock_ttl_ms = 60000
"#;
        let local_config = r#"
[coordination]
default_lock_ttl_ms = 5000
"#;

        let temp_dir = setup_config_dir(&[
            ("default.toml", DEFAULT_CONFIG),
            ("production.toml", production_config),
            ("local.toml", local_config),
        ]);
        layered(&mut env, &temp_dir, Some("production"));

        let settings = ConfigLoader::new().unwrap().load().expect("Should load settings");

        assert_eq!(settings.store.redis.host, "cache.prod");
        // local.toml beats production.toml
        assert_eq!(settings.coordination.default_lock_ttl_ms, 5000);
        assert_eq!(settings.application.project, "shop");
    }

    #[test]
    fn test_load_with_env_var_override() {
        let _guard = TEST_MUTEX.lock().unwrap();
        let mut env = EnvGuard::new();

        let temp_dir = setup_config_dir(&[("default.toml", DEFAULT_CONFIG)]);
        layered(&mut env, &temp_dir, None);

        env.set("FLEET_APPLICATION__PROJECT", "billing");
        env.set("FLEET_COORDINATION__KEY_EXPIRY_SECS", "180");

        let settings = ConfigLoader::new().unwrap().load().expect("Should load settings");

        assert_eq!(settings.application.project, "billing");
        assert_eq!(settings.coordination.key_expiry_secs, 180);
        assert_eq!(settings.application.name, "test-node");
    }

    #[test]
    fn test_load_rejects_invalid_heartbeat_window() {
        let _guard = TEST_MUTEX.lock().unwrap();
        let mut env = EnvGuard::new();

        let temp_dir = setup_config_dir(&[("default.toml", DEFAULT_CONFIG)]);
        layered(&mut env, &temp_dir, None);
        env.set("FLEET_COORDINATION__KEY_EXPIRY_SECS", "60");

        let result = ConfigLoader::new().unwrap().load();
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_shared_layer_may_not_pin_instance_id() {
        let _guard = TEST_MUTEX.lock().unwrap();
        let mut env = EnvGuard::new();

        let pinned = r#"
[coordination]
instance_id = "node-1"
"#;
        let temp_dir = setup_config_dir(&[
            ("default.toml", DEFAULT_CONFIG),
            ("production.toml", pinned),
        ]);
        layered(&mut env, &temp_dir, Some("production"));

        let err = ConfigLoader::new().unwrap().load().unwrap_err();
        assert_eq!(err.field(), Some("coordination.instance_id"));
        assert!(err.to_string().contains("production.toml"));
    }

    #[test]
    fn test_local_layer_may_pin_instance_id() {
        let _guard = TEST_MUTEX.lock().unwrap();
        let mut env = EnvGuard::new();

        let pinned = r#"
[coordination]
instance_id = "node-1"
"#;
        let temp_dir = setup_config_dir(&[
            ("default.toml", DEFAULT_CONFIG),
            ("local.toml", pinned),
        ]);
        layered(&mut env, &temp_dir, None);

        let settings = ConfigLoader::new().unwrap().load().expect("Should load settings");
        assert_eq!(settings.coordination.instance_id.as_deref(), Some("node-1"));
    }

    #[test]
    fn test_load_single_file_mode_with_jobs() {
        let _guard = TEST_MUTEX.lock().unwrap();
        let mut env = EnvGuard::new();

        let single_config = r#"
[application]
project = "single"

[store]
backend = "memory"

[jobs]
enabled = true
lock_per_fire_time = true

[[jobs.definitions]]
name = "fleet-report"
schedule = "0 */5 * * * *"
task_type = "instance_report"
leader_only = true
"#;

        let temp_dir = setup_config_dir(&[("single.toml", single_config)]);
        let config_file_path = temp_dir.path().join("single.toml");

        env.remove("FLEET_CONFIG_DIR");
        env.set("FLEET_CONFIG_FILE", config_file_path.to_str().unwrap());
        env.remove("FLEET_APP_ENV");

        let settings = ConfigLoader::new().unwrap().load().expect("Should load settings");

        assert_eq!(settings.application.project, "single");
        assert!(settings.jobs.enabled);
        assert!(settings.jobs.lock_per_fire_time);
        assert_eq!(settings.jobs.definitions.len(), 1);
        assert!(settings.jobs.definitions[0].leader_only);
        assert_eq!(settings.jobs.definitions[0].task_type, "instance_report");
    }

    #[test]
    fn test_optional_files_not_required() {
        let _guard = TEST_MUTEX.lock().unwrap();
        let mut env = EnvGuard::new();

        let temp_dir = setup_config_dir(&[("default.toml", DEFAULT_CONFIG)]);
        layered(&mut env, &temp_dir, Some("staging"));

        let settings = ConfigLoader::new().unwrap().load().expect("Should load settings");
        assert_eq!(settings.application.name, "test-node");
    }

    #[test]
    fn test_with_overrides_prefers_command_line() {
        let _guard = TEST_MUTEX.lock().unwrap();
        let mut env = EnvGuard::new();

        let override_config = r#"
[application]
project = "from-cli"

[store]
backend = "memory"
"#;
        let temp_dir = setup_config_dir(&[
            ("default.toml", DEFAULT_CONFIG),
            ("cli.toml", override_config),
        ]);
        layered(&mut env, &temp_dir, Some("development"));

        let loader = ConfigLoader::with_overrides(
            Some(temp_dir.path().join("cli.toml")),
            Some(Environment::Production),
        )
        .unwrap();
        assert_eq!(loader.environment(), Environment::Production);
        assert!(matches!(loader.source(), ConfigSource::SingleFile(_)));

        let settings = loader.load().expect("Should load settings");
        assert_eq!(settings.application.project, "from-cli");
    }
}
