//! Configuration for scribe, loaded from `config.toml` files.
//!
//! Configuration is layered. The embedded `config.toml` supplies every key,
//! then each file found by [`discover`] is laid over it, system config first
//! and the project config nearest the working directory last. A later layer
//! only replaces the keys it sets. An explicit `--config` file replaces
//! discovery but is still laid over the embedded defaults.
//!
//! Each file is checked on its own before merging, so an unknown key or a bad
//! value is reported against the file that holds it.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use toml::{Table, Value};

const EMBEDDED: &str = include_str!("../config.toml");

/// Bullets CommonMark accepts for unordered list items.
const BULLETS: &[char] = &['-', '*', '+'];

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub editor: EditorConfig,
    pub search: SearchConfig,
    pub markdown: MarkdownConfig,
}

/// Markup the editor inserts for keys it handles itself.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EditorConfig {
    pub tab: String,
    pub enter: String,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            tab: "&nbsp;&nbsp;&nbsp;&nbsp;".to_string(),
            enter: "</p><p>&nbsp;".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchConfig {
    /// Default for queries that don't say otherwise
    pub case_insensitive: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            case_insensitive: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MarkdownConfig {
    /// Bullet written for unordered list items.
    pub bullet: char,
}

impl Default for MarkdownConfig {
    fn default() -> Self {
        Self { bullet: '-' }
    }
}

impl Config {
    /// A single file laid over the embedded defaults.
    pub fn load(path: &Path) -> Result<Self> {
        Self::from_layers(&[Layer::read(path)?])
    }

    /// `cli_override` if given, else every discovered file in order, laid
    /// over the embedded defaults.
    pub fn load_with_overrides(
        cli_override: Option<&Path>,
        discovered: &[PathBuf],
    ) -> Result<Self> {
        let layers = match cli_override {
            Some(path) => vec![Layer::read(path)?],
            None => discovered
                .iter()
                .map(|path| Layer::read(path))
                .collect::<Result<Vec<_>>>()?,
        };
        Self::from_layers(&layers)
    }

    /// Parse TOML source as a single layer. `origin` names it in errors.
    pub fn from_toml(source: &str, origin: &str) -> Result<Self> {
        Self::from_layers(&[Layer::parse(source, origin)?])
    }

    fn from_layers(layers: &[Layer]) -> Result<Self> {
        let mut merged = Layer::parse(EMBEDDED, "embedded config.toml")?.table;
        for layer in layers {
            tracing::debug!(origin = %layer.origin, "applying config layer");
            merge(&mut merged, layer.table.clone());
        }
        let config: Config = Value::Table(merged)
            .try_into()
            .context("Failed to combine config files")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that parse but that the editor or markdown writer
    /// cannot use.
    fn validate(&self) -> Result<()> {
        for (key, value) in [("editor.tab", &self.editor.tab), ("editor.enter", &self.editor.enter)] {
            if value.is_empty() {
                bail!("Invalid config value `{key}`: must not be empty");
            }
        }
        if !BULLETS.contains(&self.markdown.bullet) {
            bail!(
                "Invalid config value `markdown.bullet`: `{}` is not one of `-`, `*`, `+`",
                self.markdown.bullet
            );
        }
        Ok(())
    }
}

/// One config file, parsed and checked but not yet merged.
#[derive(Debug)]
struct Layer {
    origin: String,
    table: Table,
}

impl Layer {
    fn read(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&contents, &path.display().to_string())
    }

    fn parse(source: &str, origin: &str) -> Result<Self> {
        let table: Table = source
            .parse()
            .with_context(|| format!("Failed to parse config file: {origin}"))?;
        let config: Config = Value::Table(table.clone())
            .try_into()
            .with_context(|| format!("Failed to parse config file: {origin}"))?;
        config
            .validate()
            .with_context(|| format!("Invalid config file: {origin}"))?;
        Ok(Self {
            origin: origin.to_string(),
            table,
        })
    }
}

/// Lay `overlay` over `base`. Tables merge key by key, anything else is
/// replaced.
fn merge(base: &mut Table, overlay: Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(Value::Table(existing)), Value::Table(incoming)) => merge(existing, incoming),
            (_, value) => {
                base.insert(key, value);
            },
        }
    }
}

/// Config files that apply in `start_dir`, lowest priority first: the system
/// `scribe/config.toml`, then every `.scribe/config.toml` from the outermost
/// ancestor down to `start_dir` itself.
pub fn discover(start_dir: &Path) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = dirs::config_dir()
        .map(|dir| dir.join("scribe").join("config.toml"))
        .filter(|path| path.is_file())
        .into_iter()
        .collect();

    let mut project: Vec<PathBuf> = start_dir
        .ancestors()
        .map(|dir| dir.join(".scribe").join("config.toml"))
        .filter(|path| path.is_file())
        .collect();
    project.reverse();
    found.extend(project);

    for path in &found {
        tracing::info!("found config: {}", path.display());
    }
    if found.is_empty() {
        tracing::debug!("no config file found");
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn loads_empty_config() {
        let tmp_dir = tempdir().unwrap();
        let path = write(tmp_dir.path(), "config.toml", "");

        let config = Config::load(&path).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn loads_partial_sections() {
        let tmp_dir = tempdir().unwrap();
        let path = write(
            tmp_dir.path(),
            "config.toml",
            "[editor]\ntab = \"\\t\"\n\n[markdown]\nbullet = \"*\"\n",
        );

        let config = Config::load(&path).unwrap();
        assert_eq!(config.editor.tab, "\t");
        assert_eq!(config.editor.enter, "</p><p>&nbsp;");
        assert_eq!(config.markdown.bullet, '*');
        assert!(config.search.case_insensitive);
    }

    #[test]
    fn errors_on_invalid_toml() {
        let tmp_dir = tempdir().unwrap();
        let path = write(tmp_dir.path(), "config.toml", "invalid toml {{{{");

        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }

    #[test]
    fn unknown_key_names_the_file() {
        let tmp_dir = tempdir().unwrap();
        let path = write(tmp_dir.path(), "typo.toml", "[search]\nfuzzy = true\n");

        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("typo.toml"));
        assert!(format!("{err:#}").contains("fuzzy"));
    }

    #[test]
    fn errors_on_nonexistent_file() {
        let tmp_dir = tempdir().unwrap();
        let path = tmp_dir.path().join("nonexistent.toml");

        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }

    #[test]
    fn rejects_unusable_values() {
        let err = Config::from_toml("[markdown]\nbullet = \"#\"\n", "bullets.toml").unwrap_err();
        assert_eq!(err.to_string(), "Invalid config file: bullets.toml");
        assert!(format!("{err:#}").contains("`markdown.bullet`: `#` is not one of"));

        let err = Config::from_toml("[editor]\nenter = \"\"\n", "enter.toml").unwrap_err();
        assert!(format!("{err:#}").contains("`editor.enter`: must not be empty"));
    }

    #[test]
    fn later_layers_override_single_keys() {
        let tmp_dir = tempdir().unwrap();
        let system = write(
            tmp_dir.path(),
            "system.toml",
            "[editor]\ntab = \"\\t\"\nenter = \"<br>\"\n[markdown]\nbullet = \"+\"\n",
        );
        let project = write(tmp_dir.path(), "project.toml", "[editor]\nenter = \"</p><p>\"\n");

        let config = Config::load_with_overrides(None, &[system, project]).unwrap();
        assert_eq!(config.editor.tab, "\t");
        assert_eq!(config.editor.enter, "</p><p>");
        assert_eq!(config.markdown.bullet, '+');
        assert!(config.search.case_insensitive);
    }

    #[test]
    fn cli_override_replaces_discovered_files() {
        let tmp_dir = tempdir().unwrap();
        let cli = write(tmp_dir.path(), "cli.toml", "[search]\ncase_insensitive = false");
        let discovered = write(tmp_dir.path(), "discovered.toml", "[markdown]\nbullet = \"+\"");

        let config = Config::load_with_overrides(Some(&cli), &[discovered]).unwrap();
        assert!(!config.search.case_insensitive);
        assert_eq!(config.markdown.bullet, '-');
    }

    #[test]
    fn bad_discovered_file_is_an_error() {
        let tmp_dir = tempdir().unwrap();
        let good = write(tmp_dir.path(), "good.toml", "");
        let bad = write(tmp_dir.path(), "bad.toml", "[markdown]\nbullet = \"x\"");

        let err = Config::load_with_overrides(None, &[good, bad]).unwrap_err();
        assert!(err.to_string().contains("bad.toml"));
    }

    #[test]
    fn embedded_defaults_match_default() {
        let config = Config::load_with_overrides(None, &[]).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn discovers_project_configs_outermost_first() {
        let tmp_dir = tempdir().unwrap();
        let nested = tmp_dir.path().join("notes").join("drafts");
        let outer = tmp_dir.path().join(".scribe");
        let inner = tmp_dir.path().join("notes").join(".scribe");
        for dir in [&nested, &outer, &inner] {
            std::fs::create_dir_all(dir).unwrap();
        }
        std::fs::write(outer.join("config.toml"), "").unwrap();
        std::fs::write(inner.join("config.toml"), "").unwrap();

        let found = discover(&nested);
        let project: Vec<_> = found
            .iter()
            .filter(|path| path.starts_with(tmp_dir.path()))
            .cloned()
            .collect();
        assert_eq!(project, vec![outer.join("config.toml"), inner.join("config.toml")]);
    }
}
