// src/ingest/config.rs
use anyhow::{anyhow, Context, Result};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::ingest::types::IndicatorSource;

pub const ENV_INDICATORS_PATH: &str = "INGEST_INDICATORS_PATH";

/// Load the indicator list from an explicit path. Supports TOML or JSON formats.
pub fn load_indicators_from(path: &Path) -> Result<Vec<IndicatorSource>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading indicators from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_indicators(&content, ext.as_str())
        .with_context(|| format!("parsing indicators in {}", path.display()))
}

/// Load the indicator list using env var + fallbacks:
/// 1) $INGEST_INDICATORS_PATH
/// 2) config/indicators.toml
/// 3) config/indicators.json
pub fn load_indicators_default() -> Result<Vec<IndicatorSource>> {
    if let Ok(p) = std::env::var(ENV_INDICATORS_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_indicators_from(&pb);
        } else {
            return Err(anyhow!("{ENV_INDICATORS_PATH} points to non-existent path"));
        }
    }
    let toml_p = PathBuf::from("config/indicators.toml");
    if toml_p.exists() {
        return load_indicators_from(&toml_p);
    }
    let json_p = PathBuf::from("config/indicators.json");
    if json_p.exists() {
        return load_indicators_from(&json_p);
    }
    tracing::warn!("no indicator list found, indicator dataset will be empty");
    Ok(Vec::new())
}

/// A known extension picks the parser and its error is reported as is; otherwise both
/// formats are tried.
fn parse_indicators(s: &str, hint_ext: &str) -> Result<Vec<IndicatorSource>> {
    match hint_ext {
        "toml" => return parse_toml(s).context("invalid TOML indicator list"),
        "json" => return parse_json(s).context("invalid JSON indicator list"),
        _ => {}
    }
    let parsed = if s.contains("[[indicators]]") {
        parse_toml(s).or_else(|_| parse_json(s))
    } else {
        parse_json(s).or_else(|_| parse_toml(s))
    };
    parsed.map_err(|_| anyhow!("unsupported indicator list format"))
}

fn parse_toml(s: &str) -> Result<Vec<IndicatorSource>> {
    #[derive(serde::Deserialize)]
    struct TomlIndicators {
        indicators: Vec<IndicatorSource>,
    }
    let v: TomlIndicators = toml::from_str(s)?;
    Ok(clean_list(v.indicators))
}

fn parse_json(s: &str) -> Result<Vec<IndicatorSource>> {
    let v: Vec<IndicatorSource> = serde_json::from_str(s)?;
    Ok(clean_list(v))
}

/// Trim, drop blanks, keep the first entry per ticker. Order is preserved because it is
/// the order rows land in the table.
fn clean_list(items: Vec<IndicatorSource>) -> Vec<IndicatorSource> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(items.len());
    for it in items {
        let ticker = it.ticker.trim();
        let url = it.url.trim();
        if ticker.is_empty() || url.is_empty() {
            continue;
        }
        if !seen.insert(ticker.to_string()) {
            tracing::warn!(ticker, "duplicate indicator ignored");
            continue;
        }
        out.push(IndicatorSource {
            ticker: ticker.to_string(),
            url: url.to_string(),
        });
    }
    out
}
