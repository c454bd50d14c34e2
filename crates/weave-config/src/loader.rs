// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::debug;

use crate::{Config, ProviderCreds};

/// The single config file location, searched in priority order. The first
/// path that exists wins outright — there is no merging across locations.
fn candidate_paths(explicit: Option<&Path>) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(p) = explicit {
        paths.push(p.to_path_buf());
    }
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
        paths.push(PathBuf::from(xdg).join("weave/config.json"));
    } else if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".config/weave/config.json"));
    }
    paths.push(PathBuf::from("config.json"));
    paths
}

/// Load the config document.
///
/// Search order: an explicit `--config` path, then
/// `$XDG_CONFIG_HOME/weave/config.json` (or `~/.config/weave/config.json`),
/// then `./config.json`. The first file that exists is loaded; no other
/// location is consulted. If none exist, defaults are used. An explicit path
/// that does not exist is an error — the caller asked for that file by name.
pub fn load(explicit: Option<&Path>) -> anyhow::Result<Config> {
    if let Some(p) = explicit {
        if !p.is_file() {
            anyhow::bail!("config file not found: {}", p.display());
        }
    }

    let mut config = None;
    for path in candidate_paths(explicit) {
        if path.is_file() {
            debug!(path = %path.display(), "loading config");
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            let parsed: Config = serde_json::from_str(&text)
                .with_context(|| format!("parsing {}", path.display()))?;
            config = Some(parsed);
            break;
        }
    }

    let mut config = config.unwrap_or_default();
    apply_env_fallback(&mut config);
    Ok(config)
}

/// Fill in provider API keys from the environment when the config document
/// did not set them. Config values always take precedence over environment
/// variables; the environment is only consulted for providers whose key is
/// entirely absent from the file.
fn apply_env_fallback(config: &mut Config) {
    fill_from_env(&mut config.providers.openrouter, "OPENROUTER_API_KEY");
    fill_from_env(&mut config.providers.anthropic, "ANTHROPIC_API_KEY");
    fill_from_env(&mut config.providers.openai, "OPENAI_API_KEY");
    fill_from_env(&mut config.providers.groq, "GROQ_API_KEY");
}

fn fill_from_env(slot: &mut Option<ProviderCreds>, var: &str) {
    let has_key = slot.as_ref().is_some_and(|c| c.api_key.is_some());
    if has_key {
        return;
    }
    let Ok(value) = std::env::var(var) else {
        return;
    };
    match slot {
        Some(creds) => creds.api_key = Some(value),
        None => {
            *slot = Some(ProviderCreds {
                api_key: Some(value),
                api_base: None,
            })
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
