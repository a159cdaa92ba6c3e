//! Run configuration
//!
//! Configuration is layered: an optional `configs/_global.toml` is
//! overlaid by the named (or explicitly pathed) config, local values
//! winning per field. An optional portal JSON file can fill in the
//! connection details. Validation collects every problem before failing
//! so an operator fixes the config in one round trip.
//!
//! The rewrite callback, post-issue hook, and legacy-id function are code
//! rather than data; library consumers set them on the controller options
//! directly, and the stock binary runs without them.

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use reissue_core::remap::IncomingLinks;
use reissue_importer::ImporterCommand;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

static CONNECTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^local:(.*),(.*)").expect("connection string pattern is valid"));

/// One config file as written on disk; every field optional so partial
/// layers merge.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub master_log: Option<PathBuf>,
    pub username: Option<String>,
    pub portal_class: Option<String>,
    pub importer_bin: Option<String>,
    pub autoload: Option<String>,
    pub db_home: Option<PathBuf>,
    pub password: Option<String>,
    pub id_map_file: Option<PathBuf>,
    pub id_offsetting: Option<bool>,
    pub refresh: Option<bool>,
    pub old_secret: Option<String>,
    pub mapping_exclude: Option<Vec<String>>,
    pub portal_config_file: Option<PathBuf>,
    pub env: Option<BTreeMap<String, String>>,
    pub incoming_links: Option<IncomingLinks>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        let parsed = toml::from_str(&content)
            .with_context(|| format!("failed to parse config at {}", path.display()))?;
        tracing::debug!("loaded config layer from {}", path.display());
        Ok(parsed)
    }

    /// Overlay another layer on top of this one; the other layer wins
    /// wherever it has a value.
    fn overlay(self, over: ConfigFile) -> ConfigFile {
        ConfigFile {
            master_log: over.master_log.or(self.master_log),
            username: over.username.or(self.username),
            portal_class: over.portal_class.or(self.portal_class),
            importer_bin: over.importer_bin.or(self.importer_bin),
            autoload: over.autoload.or(self.autoload),
            db_home: over.db_home.or(self.db_home),
            password: over.password.or(self.password),
            id_map_file: over.id_map_file.or(self.id_map_file),
            id_offsetting: over.id_offsetting.or(self.id_offsetting),
            refresh: over.refresh.or(self.refresh),
            old_secret: over.old_secret.or(self.old_secret),
            mapping_exclude: over.mapping_exclude.or(self.mapping_exclude),
            portal_config_file: over.portal_config_file.or(self.portal_config_file),
            env: over.env.or(self.env),
            incoming_links: over.incoming_links.or(self.incoming_links),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PortalConfig {
    connection_string: Option<String>,
    autoload: Option<String>,
    username: Option<String>,
}

/// Fully validated run configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub master_log: PathBuf,
    pub username: String,
    pub portal_class: String,
    pub importer_bin: String,
    pub autoload: String,
    pub db_home: PathBuf,
    pub password: Option<String>,
    pub id_map_file: Option<PathBuf>,
    pub id_offsetting: bool,
    pub refresh: bool,
    pub old_secret: Option<String>,
    pub mapping_exclude: HashSet<String>,
    pub env: BTreeMap<String, String>,
    pub incoming_links: IncomingLinks,
}

impl Config {
    /// Assemble the importer command line from this configuration.
    pub fn importer_command(&self, password: &str) -> ImporterCommand {
        ImporterCommand {
            bin: self.importer_bin.clone(),
            autoload: self.autoload.clone(),
            portal_class: self.portal_class.clone(),
            store_home: self.db_home.to_string_lossy().into_owned(),
            username: self.username.clone(),
            password: password.to_string(),
            env: self.env.clone(),
        }
    }
}

/// Load, layer, overlay, and validate the configuration.
///
/// `name_or_path` is either a name under `configs_dir` or, when it
/// contains a path separator or a `.toml` suffix, a literal path.
pub fn load(name_or_path: Option<&str>, configs_dir: &Path) -> Result<Config> {
    let mut merged = ConfigFile::default();

    let global_path = configs_dir.join("_global.toml");
    if global_path.exists() {
        merged = ConfigFile::load(&global_path)?;
    }

    if let Some(arg) = name_or_path {
        let local_path = resolve_config_path(arg, configs_dir);
        if !local_path.exists() {
            anyhow::bail!("config file {} does not exist", local_path.display());
        }
        merged = merged.overlay(ConfigFile::load(&local_path)?);
    }

    apply_portal_overlay(&mut merged)?;
    validate(merged)
}

fn resolve_config_path(arg: &str, configs_dir: &Path) -> PathBuf {
    if arg.contains(std::path::MAIN_SEPARATOR) || arg.ends_with(".toml") {
        PathBuf::from(arg)
    } else {
        configs_dir.join(format!("{}.toml", arg))
    }
}

/// Fill connection details in from the portal's own config file. The
/// connection string only applies when neither the portal class nor the
/// store home was given; autoload and username are plain fill-ins.
fn apply_portal_overlay(config: &mut ConfigFile) -> Result<()> {
    let Some(path) = config.portal_config_file.clone() else {
        return Ok(());
    };

    let content = fs::read_to_string(&path)
        .with_context(|| format!("portal config file {} does not exist", path.display()))?;
    let portal: PortalConfig = serde_json::from_str(&content)
        .context("portal config is expected to be a JSON object")?;

    if let Some(connection) = &portal.connection_string {
        let captures = CONNECTION_RE.captures(connection).context(
            "portal config connection_string should be a valid local connection string",
        )?;
        if config.portal_class.is_none() && config.db_home.is_none() {
            config.portal_class = Some(captures[1].to_string());
            config.db_home = Some(PathBuf::from(&captures[2]));
        }
    }

    if config.autoload.is_none() {
        config.autoload = portal.autoload;
    }
    if config.username.is_none() {
        config.username = portal.username;
    }

    Ok(())
}

fn validate(file: ConfigFile) -> Result<Config> {
    let mut problems = Vec::new();

    match &file.master_log {
        None => problems.push("no master_log given".to_string()),
        Some(path) if !path.exists() => {
            problems.push(format!("master log file {} does not exist", path.display()));
        }
        Some(_) => {}
    }
    if file.username.is_none() {
        problems.push("please specify username in the config".to_string());
    }
    if file.portal_class.is_none() {
        problems.push("please specify portal_class in the config".to_string());
    }
    if file.importer_bin.is_none() {
        problems.push("please specify importer_bin in the config".to_string());
    }
    if file.autoload.is_none() {
        problems.push("please specify autoload in the config".to_string());
    }

    if !problems.is_empty() {
        anyhow::bail!("invalid config:\n  - {}", problems.join("\n  - "));
    }

    Ok(Config {
        master_log: file.master_log.unwrap_or_default(),
        username: file.username.unwrap_or_default(),
        portal_class: file.portal_class.unwrap_or_default(),
        importer_bin: file.importer_bin.unwrap_or_default(),
        autoload: file.autoload.unwrap_or_default(),
        db_home: file.db_home.unwrap_or_else(|| PathBuf::from("out")),
        password: file.password,
        id_map_file: file.id_map_file,
        id_offsetting: file.id_offsetting.unwrap_or(false),
        refresh: file.refresh.unwrap_or(true),
        old_secret: file.old_secret,
        mapping_exclude: file
            .mapping_exclude
            .unwrap_or_default()
            .into_iter()
            .collect(),
        env: file.env.unwrap_or_default(),
        incoming_links: file.incoming_links.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, content: &str) -> Result<PathBuf> {
        let path = dir.join(name);
        let mut f = fs::File::create(&path)?;
        f.write_all(content.as_bytes())?;
        Ok(path)
    }

    fn minimal_config(dir: &Path, log_path: &Path) -> String {
        format!(
            "master_log = {:?}\nusername = \"admin\"\nportal_class = \"Portal\"\n\
             importer_bin = \"/usr/bin/jars\"\nautoload = \"/srv/autoload.php\"\n\
             db_home = {:?}\n",
            log_path,
            dir.join("out")
        )
    }

    #[test]
    fn test_load_minimal_named_config() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let log = write_file(dir.path(), "master.log", "")?;
        write_file(dir.path(), "prod.toml", &minimal_config(dir.path(), &log))?;

        let config = load(Some("prod"), dir.path())?;
        assert_eq!(config.username, "admin");
        assert!(config.refresh);
        assert!(!config.id_offsetting);
        assert!(config.mapping_exclude.is_empty());
        Ok(())
    }

    #[test]
    fn test_local_overrides_global_per_field() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let log = write_file(dir.path(), "master.log", "")?;
        write_file(
            dir.path(),
            "_global.toml",
            &format!("{}old_secret = \"global\"\n", minimal_config(dir.path(), &log)),
        )?;
        write_file(dir.path(), "prod.toml", "username = \"prod-user\"\n")?;

        let config = load(Some("prod"), dir.path())?;
        assert_eq!(config.username, "prod-user");
        // Untouched fields come through from the global layer.
        assert_eq!(config.old_secret.as_deref(), Some("global"));
        assert_eq!(config.portal_class, "Portal");
        Ok(())
    }

    #[test]
    fn test_global_alone_is_enough() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let log = write_file(dir.path(), "master.log", "")?;
        write_file(dir.path(), "_global.toml", &minimal_config(dir.path(), &log))?;

        let config = load(None, dir.path())?;
        assert_eq!(config.portal_class, "Portal");
        Ok(())
    }

    #[test]
    fn test_missing_named_config_fails() -> Result<()> {
        let dir = tempfile::tempdir()?;
        assert!(load(Some("nope"), dir.path()).is_err());
        Ok(())
    }

    #[test]
    fn test_validation_collects_every_problem() -> Result<()> {
        let dir = tempfile::tempdir()?;
        write_file(dir.path(), "empty.toml", "")?;

        let err = load(Some("empty"), dir.path()).unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.contains("master_log"));
        assert!(message.contains("username"));
        assert!(message.contains("portal_class"));
        assert!(message.contains("importer_bin"));
        assert!(message.contains("autoload"));
        Ok(())
    }

    #[test]
    fn test_portal_overlay_fills_gaps_only() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let log = write_file(dir.path(), "master.log", "")?;
        let portal = write_file(
            dir.path(),
            "portal.json",
            "{\"connection_string\": \"local:PortalFromJson,/srv/data\",\
              \"autoload\": \"/srv/auto.php\", \"username\": \"json-user\"}",
        )?;
        write_file(
            dir.path(),
            "prod.toml",
            &format!(
                "master_log = {:?}\nimporter_bin = \"/usr/bin/jars\"\n\
                 username = \"config-user\"\nportal_config_file = {:?}\n",
                log, portal
            ),
        )?;

        let config = load(Some("prod"), dir.path())?;
        // Connection string supplies class and home since neither was set.
        assert_eq!(config.portal_class, "PortalFromJson");
        assert_eq!(config.db_home, PathBuf::from("/srv/data"));
        assert_eq!(config.autoload, "/srv/auto.php");
        // Explicit config wins over the portal fill-in.
        assert_eq!(config.username, "config-user");
        Ok(())
    }

    #[test]
    fn test_portal_overlay_rejects_bad_connection_string() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let log = write_file(dir.path(), "master.log", "")?;
        let portal = write_file(
            dir.path(),
            "portal.json",
            "{\"connection_string\": \"remote:host\"}",
        )?;
        write_file(
            dir.path(),
            "prod.toml",
            &format!(
                "{}portal_config_file = {:?}\n",
                minimal_config(dir.path(), &log),
                portal
            ),
        )?;

        let err = load(Some("prod"), dir.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("connection_string"));
        Ok(())
    }

    #[test]
    fn test_incoming_links_and_exclusions_deserialize() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let log = write_file(dir.path(), "master.log", "")?;
        write_file(
            dir.path(),
            "prod.toml",
            &format!(
                "{}mapping_exclude = [\"vendor_id\"]\n\n[incoming_links.note]\nfolder = \"folder_ref\"\n",
                minimal_config(dir.path(), &log)
            ),
        )?;

        let config = load(Some("prod"), dir.path())?;
        assert!(config.mapping_exclude.contains("vendor_id"));
        assert_eq!(
            config.incoming_links["note"]["folder"],
            "folder_ref".to_string()
        );
        Ok(())
    }

    #[test]
    fn test_explicit_path_argument() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let log = write_file(dir.path(), "master.log", "")?;
        let config_path = write_file(dir.path(), "anywhere.toml", &minimal_config(dir.path(), &log))?;

        // A path argument bypasses the configs directory entirely.
        let config = load(
            Some(&config_path.to_string_lossy()),
            Path::new("/nonexistent"),
        )?;
        assert_eq!(config.username, "admin");
        Ok(())
    }
}
