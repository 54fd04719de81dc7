// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::debug;

use crate::Config;

/// Environment variable naming an explicit config file.
const CONFIG_ENV: &str = "FREJA_CONFIG";

/// Candidate config locations, highest priority first.  The engine reads a
/// single file; it does not merge layers — the host embedding it supplies
/// at most one config.
fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = vec![
        PathBuf::from(".freja/config.yaml"),
        PathBuf::from("freja.yaml"),
    ];
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("freja/config.yaml"));
    }
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".config/freja/config.yaml"));
    }
    paths.push(PathBuf::from("/etc/freja/config.yaml"));
    paths
}

/// Load configuration.
///
/// Resolution order: the `explicit` path when given (a missing file is an
/// error — the caller asked for that file specifically), then a file named
/// by `FREJA_CONFIG`, then the first existing candidate location.  When
/// nothing is found the defaults apply; a host does not need a config file
/// at all.
pub fn load(explicit: Option<&Path>) -> anyhow::Result<Config> {
    if let Some(path) = explicit {
        return read_config(path);
    }
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return read_config(Path::new(&path));
    }
    match candidate_paths().into_iter().find(|p| p.is_file()) {
        Some(path) => read_config(&path),
        None => {
            debug!("no config file found, using defaults");
            Ok(Config::default())
        }
    }
}

fn read_config(path: &Path) -> anyhow::Result<Config> {
    debug!(path = %path.display(), "loading config");
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    if text.trim().is_empty() {
        return Ok(Config::default());
    }
    let config =
        serde_yaml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    Ok(config)
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, "{contents}").unwrap();
        f
    }

    #[test]
    fn explicit_missing_path_is_an_error() {
        let result = load(Some(Path::new("/tmp/freja_nonexistent_config_xyz.yaml")));
        assert!(result.is_err());
    }

    #[test]
    fn explicit_file_overrides_defaults() {
        let f = write_config("model:\n  provider: ollama\n  name: test-model\n");
        let cfg = load(Some(f.path())).unwrap();
        assert_eq!(cfg.model.provider, "ollama");
        assert_eq!(cfg.model.name, "test-model");
    }

    #[test]
    fn unset_sections_keep_their_defaults() {
        let f = write_config("session:\n  timeout_secs: 60\n");
        let cfg = load(Some(f.path())).unwrap();
        assert_eq!(cfg.session.timeout_secs, 60);
        assert_eq!(cfg.engine.max_llm_attempts, 4);
        assert_eq!(cfg.model.request_timeout_secs, 300);
    }

    #[test]
    fn empty_file_yields_defaults() {
        let f = write_config("");
        let cfg = load(Some(f.path())).unwrap();
        assert_eq!(cfg.model.provider, "openai");
    }

    #[test]
    fn unparseable_yaml_is_an_error() {
        let f = write_config("{ unclosed");
        assert!(load(Some(f.path())).is_err());
    }

    #[test]
    fn wrong_section_shape_is_an_error() {
        let f = write_config("model: [not, a, mapping]\n");
        let err = load(Some(f.path())).unwrap_err();
        assert!(format!("{err:#}").contains("parsing"));
    }
}
