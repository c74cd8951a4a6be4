use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::remote::PollConfig;

/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "JENX_CONFIG";

/// Lower bound for configured poll intervals, in milliseconds.
pub const MIN_POLL_INTERVAL_MS: u64 = 100;

/// Where a target's API token is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialKind {
    Keyring,
    Env,
}

impl CredentialKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CredentialKind::Keyring => "keyring",
            CredentialKind::Env => "env",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    #[serde(rename = "type")]
    pub kind: CredentialKind,
    /// Keyring account name or environment variable name.
    #[serde(rename = "ref")]
    pub reference: String,
}

/// One Jenkins server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub id: String,
    /// Display name; defaults to `id`.
    #[serde(default)]
    pub name: String,
    pub host: String,
    pub username: String,
    #[serde(default)]
    pub insecure_skip_tls_verify: bool,
    pub credential: Credential,
}

/// Polling intervals (optional `[poll]` section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollSettings {
    /// Delay between queue item lookups, in milliseconds.
    pub queue_interval_ms: u64,
    /// Delay between build status lookups, in milliseconds.
    pub build_interval_ms: u64,
}

/// Global configuration loaded from `~/.config/jenx/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JenxConfig {
    /// Builds in flight at once per run.
    pub concurrency: usize,
    /// Hard ceiling on generated permutations.
    pub max_permutations: usize,
    /// Per-request HTTP timeout in seconds.
    pub request_timeout_secs: u64,
    /// Optional polling intervals; built-in defaults when missing.
    pub poll: Option<PollSettings>,
    pub targets: Vec<Target>,
}

impl Default for JenxConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            max_permutations: 20,
            request_timeout_secs: 60,
            poll: None,
            targets: Vec::new(),
        }
    }
}

impl JenxConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn poll_config(&self) -> PollConfig {
        match &self.poll {
            Some(p) => PollConfig {
                queue_interval: Duration::from_millis(p.queue_interval_ms.max(MIN_POLL_INTERVAL_MS)),
                build_interval: Duration::from_millis(p.build_interval_ms.max(MIN_POLL_INTERVAL_MS)),
            },
            None => PollConfig::default(),
        }
    }

    pub fn target(&self, id: &str) -> Option<&Target> {
        self.targets.iter().find(|t| t.id == id.trim())
    }

    /// Check required fields and normalize whitespace, trailing slashes and names.
    pub fn validate(&mut self) -> Result<()> {
        let mut seen = HashSet::new();
        for (i, t) in self.targets.iter_mut().enumerate() {
            t.id = t.id.trim().to_string();
            if t.id.is_empty() {
                bail!("targets[{i}].id is required");
            }
            if !seen.insert(t.id.clone()) {
                bail!("targets[{i}].id {:?} is duplicated", t.id);
            }
            t.host = t.host.trim().trim_end_matches('/').to_string();
            if t.host.is_empty() {
                bail!("targets[{i}].host is required");
            }
            url::Url::parse(&t.host).with_context(|| format!("targets[{i}].host {:?} is not a URL", t.host))?;
            t.username = t.username.trim().to_string();
            if t.username.is_empty() {
                bail!("targets[{i}].username is required");
            }
            t.credential.reference = t.credential.reference.trim().to_string();
            if t.credential.reference.is_empty() {
                bail!("targets[{i}].credential.ref is required");
            }
            if t.name.trim().is_empty() {
                t.name = t.id.clone();
            }
        }
        Ok(())
    }
}

/// Resolve the config path: explicit flag, then `$JENX_CONFIG`, then XDG.
/// Explicit paths must be absolute.
pub fn resolve_path(flag: Option<&Path>) -> Result<PathBuf> {
    let explicit = match flag {
        Some(p) => Some(p.to_path_buf()),
        None => std::env::var_os(CONFIG_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from),
    };
    if let Some(path) = explicit {
        if !path.is_absolute() {
            bail!("config path must be absolute: {}", path.display());
        }
        return Ok(path);
    }
    default_path()
}

pub fn default_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("jenx")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Parse and validate the config at `path`.
pub fn load(path: &Path) -> Result<JenxConfig> {
    let data = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let mut cfg: JenxConfig = toml::from_str(&data).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init(path: &Path) -> Result<JenxConfig> {
    if !path.exists() {
        let default_cfg = JenxConfig::default();
        save(path, &default_cfg)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load(path)
}

/// Write the config atomically (temp file in the same dir, then rename),
/// readable only by the owner since it names credential references.
pub fn save(path: &Path, cfg: &JenxConfig) -> Result<()> {
    let dir = match path.parent() {
        Some(d) if !d.as_os_str().is_empty() => d,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).with_context(|| format!("create config dir {}", dir.display()))?;
    let payload = toml::to_string_pretty(cfg).context("serialize config")?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".jenx-config-")
        .suffix(".toml")
        .tempfile_in(dir)
        .context("create temp config")?;
    tmp.write_all(payload.as_bytes()).context("write temp config")?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(tmp.path(), fs::Permissions::from_mode(0o600)).context("chmod temp config")?;
    }
    tmp.persist(path)
        .with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
        [[targets]]
        id = "prod"
        host = "https://jenkins.example.com/"
        username = "ci-user"
        credential = { type = "keyring", ref = "jenx/prod" }
    "#;

    #[test]
    fn default_config_values() {
        let cfg = JenxConfig::default();
        assert_eq!(cfg.concurrency, 4);
        assert_eq!(cfg.max_permutations, 20);
        assert_eq!(cfg.request_timeout(), Duration::from_secs(60));
        assert_eq!(cfg.poll_config(), PollConfig::default());
        assert!(cfg.targets.is_empty());
    }

    #[test]
    fn targets_only_file_uses_defaults_and_normalizes() {
        let mut cfg: JenxConfig = toml::from_str(VALID).unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.concurrency, 4);
        let t = cfg.target("prod").unwrap();
        assert_eq!(t.name, "prod");
        assert_eq!(t.host, "https://jenkins.example.com");
        assert_eq!(t.credential.kind, CredentialKind::Keyring);
        assert!(!t.insecure_skip_tls_verify);
    }

    #[test]
    fn custom_values_and_poll_section() {
        let toml = r#"
            concurrency = 2
            max_permutations = 50
            request_timeout_secs = 10

            [poll]
            queue_interval_ms = 100
            build_interval_ms = 250
        "#;
        let cfg: JenxConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.concurrency, 2);
        assert_eq!(cfg.max_permutations, 50);
        assert_eq!(cfg.request_timeout(), Duration::from_secs(10));
        let poll = cfg.poll_config();
        assert_eq!(poll.queue_interval, Duration::from_millis(100));
        assert_eq!(poll.build_interval, Duration::from_millis(250));
    }

    #[test]
    fn zero_poll_intervals_are_raised_to_floor() {
        let toml = r#"
            [poll]
            queue_interval_ms = 0
            build_interval_ms = 20
        "#;
        let cfg: JenxConfig = toml::from_str(toml).unwrap();
        let poll = cfg.poll_config();
        assert_eq!(poll.queue_interval, Duration::from_millis(MIN_POLL_INTERVAL_MS));
        assert_eq!(poll.build_interval, Duration::from_millis(MIN_POLL_INTERVAL_MS));
    }

    #[test]
    fn rejects_unknown_credential_type() {
        let toml = r#"
            [[targets]]
            id = "prod"
            host = "https://jenkins.example.com"
            username = "ci-user"
            credential = { type = "file", ref = "x" }
        "#;
        let err = toml::from_str::<JenxConfig>(toml).unwrap_err();
        assert!(err.to_string().contains("unknown variant"), "{err}");
    }

    #[test]
    fn rejects_missing_and_duplicate_fields() {
        let mut cfg: JenxConfig = toml::from_str(VALID).unwrap();
        cfg.targets[0].username = "  ".into();
        let err = cfg.validate().unwrap_err();
        assert_eq!(err.to_string(), "targets[0].username is required");

        let mut cfg: JenxConfig = toml::from_str(VALID).unwrap();
        let dup = cfg.targets[0].clone();
        cfg.targets.push(dup);
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("duplicated"), "{err}");

        let mut cfg: JenxConfig = toml::from_str(VALID).unwrap();
        cfg.targets[0].host = "not a url".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn resolve_path_prefers_flag_and_rejects_relative() {
        let got = resolve_path(Some(Path::new("/tmp/from-flag.toml"))).unwrap();
        assert_eq!(got, PathBuf::from("/tmp/from-flag.toml"));
        assert!(resolve_path(Some(Path::new("relative.toml"))).is_err());
    }

    #[test]
    fn save_then_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut cfg: JenxConfig = toml::from_str(VALID).unwrap();
        cfg.validate().unwrap();
        cfg.concurrency = 3;
        save(&path, &cfg).unwrap();
        let loaded = load(&path).unwrap();
        assert_eq!(loaded.concurrency, 3);
        assert_eq!(loaded.targets, cfg.targets);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn load_or_init_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = load_or_init(&path).unwrap();
        assert!(path.exists());
        assert_eq!(cfg.max_permutations, 20);
        assert_eq!(load(&path).unwrap().concurrency, 4);
    }
}
