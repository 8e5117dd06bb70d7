use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, info};
use serde::Deserialize;

use crate::shortcuts::{ShortcutAction, ShortcutMapping};

// ---------------------------------------------------------------------------
// ConfigFile: deserialized from TOML (all fields optional)
// ---------------------------------------------------------------------------

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub leader_key: Option<String>,
    pub chord_timeout_ms: Option<u64>,
    pub wait_timeout_ms: Option<u64>,
    #[serde(default)]
    pub shortcuts: ShortcutsFile,
}

/// `[shortcuts]` table: action name → key identifier.
#[derive(Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ShortcutsFile {
    pub next_post: Option<String>,
    pub previous_post: Option<String>,
    pub like_post: Option<String>,
    pub reply_to_post: Option<String>,
    pub cycle_feed: Option<String>,
    pub open_post: Option<String>,
    pub focus_search: Option<String>,
    pub expand_photo: Option<String>,
    pub load_more: Option<String>,
    pub show_shortcuts: Option<String>,
}

impl ShortcutsFile {
    fn get(&self, action: ShortcutAction) -> Option<&String> {
        match action {
            ShortcutAction::NextPost => self.next_post.as_ref(),
            ShortcutAction::PreviousPost => self.previous_post.as_ref(),
            ShortcutAction::LikePost => self.like_post.as_ref(),
            ShortcutAction::ReplyToPost => self.reply_to_post.as_ref(),
            ShortcutAction::CycleFeed => self.cycle_feed.as_ref(),
            ShortcutAction::OpenPost => self.open_post.as_ref(),
            ShortcutAction::FocusSearch => self.focus_search.as_ref(),
            ShortcutAction::ExpandPhoto => self.expand_photo.as_ref(),
            ShortcutAction::LoadMore => self.load_more.as_ref(),
            ShortcutAction::ShowShortcuts => self.show_shortcuts.as_ref(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config: resolved (all fields concrete)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub leader_key: String,
    pub chord_timeout: Duration,
    pub wait_timeout: Duration,
    /// Every action with its key, in declaration order.
    pub shortcuts: Vec<(ShortcutAction, String)>,
}

impl Default for Config {
    fn default() -> Self {
        ConfigFile::default().resolve()
    }
}

impl Config {
    pub fn mapping(&self) -> ShortcutMapping {
        ShortcutMapping::from_keys(self.shortcuts.iter().map(|(a, k)| (*a, k.as_str())))
    }
}

pub fn default_key(action: ShortcutAction) -> &'static str {
    match action {
        ShortcutAction::NextPost => "j",
        ShortcutAction::PreviousPost => "k",
        ShortcutAction::LikePost => "l",
        ShortcutAction::ReplyToPost => "r",
        ShortcutAction::CycleFeed => "f",
        ShortcutAction::OpenPost => "o",
        ShortcutAction::FocusSearch => "/",
        ShortcutAction::ExpandPhoto => "p",
        ShortcutAction::LoadMore => "gn",
        ShortcutAction::ShowShortcuts => "?",
    }
}

impl ConfigFile {
    /// Merge CLI values (overwrites non-None fields).
    pub fn merge_cli(&mut self, leader_key: Option<String>, chord_timeout_ms: Option<u64>) {
        if let Some(ref v) = leader_key {
            debug!("config: CLI override leader_key={v}");
            self.leader_key = leader_key;
        }
        if let Some(v) = chord_timeout_ms {
            debug!("config: CLI override chord_timeout_ms={v}");
            self.chord_timeout_ms = chord_timeout_ms;
        }
    }

    /// Resolve to a Config by applying defaults to missing fields.
    pub fn resolve(self) -> Config {
        let shortcuts = ShortcutAction::ALL
            .iter()
            .map(|&action| {
                let key = self
                    .shortcuts
                    .get(action)
                    .cloned()
                    .unwrap_or_else(|| default_key(action).to_string());
                (action, key)
            })
            .collect();
        let config = Config {
            leader_key: self.leader_key.unwrap_or_else(|| "g".into()),
            chord_timeout: Duration::from_millis(self.chord_timeout_ms.unwrap_or(500)),
            wait_timeout: Duration::from_millis(self.wait_timeout_ms.unwrap_or(5000)),
            shortcuts,
        };
        info!(
            "config: resolved leader_key={}, chord_timeout={}ms, wait_timeout={}ms, {} shortcut(s)",
            config.leader_key,
            config.chord_timeout.as_millis(),
            config.wait_timeout.as_millis(),
            config.shortcuts.len(),
        );
        config
    }
}

/// Resolve the XDG config path for feedkeys.
fn config_path() -> Option<PathBuf> {
    let config_dir = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
    Some(config_dir.join("feedkeys").join("config.toml"))
}

/// Load the config file from its XDG location. Returns
/// `ConfigFile::default()` if no file exists; an error if it exists but
/// cannot be parsed.
pub fn load_config() -> anyhow::Result<ConfigFile> {
    match config_path() {
        Some(p) => load_config_from(&p, false),
        None => {
            info!("config: no HOME or XDG_CONFIG_HOME set, using defaults");
            Ok(ConfigFile::default())
        }
    }
}

/// Load a config file from `path`. With `required`, a missing file is an
/// error instead of meaning defaults.
pub fn load_config_from(path: &Path, required: bool) -> anyhow::Result<ConfigFile> {
    debug!("config: looking for {}", path.display());
    match std::fs::read_to_string(path) {
        Ok(text) => {
            info!("config: loaded from {}", path.display());
            let cfg: ConfigFile = toml::from_str(&text)
                .map_err(|e| anyhow::anyhow!("failed to parse {}: {e}", path.display()))?;
            Ok(cfg)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => {
            info!("config: {} not found, using defaults", path.display());
            Ok(ConfigFile::default())
        }
        Err(e) => Err(anyhow::anyhow!("failed to read {}: {e}", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml() {
        let cfg: ConfigFile = toml::from_str("").unwrap();
        let resolved = cfg.resolve();
        assert_eq!(resolved.leader_key, "g");
        assert_eq!(resolved.chord_timeout, Duration::from_millis(500));
        assert_eq!(resolved.wait_timeout, Duration::from_millis(5000));
        assert_eq!(resolved.shortcuts.len(), ShortcutAction::ALL.len());
        assert_eq!(
            resolved.shortcuts[0],
            (ShortcutAction::NextPost, "j".to_string())
        );
    }

    #[test]
    fn partial_toml() {
        let text = r#"
            wait_timeout_ms = 2000
            [shortcuts]
            nextPost = "n"
            loadMore = "gl"
        "#;
        let cfg: ConfigFile = toml::from_str(text).unwrap();
        let resolved = cfg.resolve();
        assert_eq!(resolved.wait_timeout, Duration::from_millis(2000));
        let mapping = resolved.mapping();
        assert_eq!(mapping.get("n").unwrap().action, ShortcutAction::NextPost);
        assert_eq!(mapping.get("gl").unwrap().action, ShortcutAction::LoadMore);
        assert!(mapping.get("j").is_none());
        // Defaults for unspecified fields
        assert_eq!(mapping.get("k").unwrap().action, ShortcutAction::PreviousPost);
        assert_eq!(resolved.leader_key, "g");
    }

    #[test]
    fn unknown_shortcut_names_are_ignored() {
        let text = r#"
            [shortcuts]
            newPost = "c"
        "#;
        let cfg: ConfigFile = toml::from_str(text).unwrap();
        assert!(cfg.resolve().mapping().get("c").is_none());
    }

    #[test]
    fn invalid_toml() {
        let text = "this is not valid toml [[[";
        let result = toml::from_str::<ConfigFile>(text);
        assert!(result.is_err());
    }

    #[test]
    fn cli_overrides() {
        let mut cfg: ConfigFile = toml::from_str("chord_timeout_ms = 300").unwrap();
        cfg.merge_cli(Some("z".into()), Some(800));
        let resolved = cfg.resolve();
        assert_eq!(resolved.leader_key, "z");
        assert_eq!(resolved.chord_timeout, Duration::from_millis(800)); // CLI wins
        assert_eq!(resolved.wait_timeout, Duration::from_millis(5000)); // default
    }

    #[test]
    fn default_mapping_covers_every_action() {
        let mapping = Config::default().mapping();
        assert_eq!(mapping.len(), ShortcutAction::ALL.len());
        for action in ShortcutAction::ALL {
            assert_eq!(mapping.get(default_key(action)).unwrap().action, action);
        }
    }

    #[test]
    fn missing_explicit_file() {
        let path = Path::new("/nonexistent/feedkeys/config.toml");
        assert!(load_config_from(path, false).is_ok());
        assert!(load_config_from(path, true).is_err());
    }
}
