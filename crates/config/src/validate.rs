//! Configuration validation.
//!
//! Detects unknown or misspelled fields, type errors, and settings that would
//! make the relay misbehave at runtime.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use serde_json::Value;

use crate::schema::ChanlinkConfig;

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Category: "syntax", "unknown-field", "type-error", "relay", "discord",
    /// "file-ref"
    pub category: &'static str,
    /// Dotted path, e.g. "relay.reverse_capacity"
    pub path: String,
    pub message: String,
}

impl Diagnostic {
    fn new(
        severity: Severity,
        category: &'static str,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category,
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result of validating a configuration file.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<PathBuf>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

// ── Schema tree for unknown-field detection ─────────────────────────────────

enum KnownKeys {
    Struct(HashMap<&'static str, KnownKeys>),
    /// Dynamic keys with scalar values (metric labels).
    Map,
    Leaf,
}

fn build_schema_map() -> KnownKeys {
    use KnownKeys::{Leaf, Map, Struct};

    Struct(HashMap::from([
        (
            "relay",
            Struct(HashMap::from([
                ("correlation_capacity", Leaf),
                ("reverse_capacity", Leaf),
                ("identity_name", Leaf),
                ("reply_embed_colour", Leaf),
            ])),
        ),
        ("database", Struct(HashMap::from([("url", Leaf)]))),
        ("discord", Struct(HashMap::from([("token", Leaf)]))),
        (
            "metrics",
            Struct(HashMap::from([
                ("enabled", Leaf),
                ("prometheus_listen", Leaf),
                ("labels", Map),
            ])),
        ),
    ]))
}

/// Levenshtein edit distance between two strings.
fn levenshtein(a: &str, b: &str) -> usize {
    let b_len = b.chars().count();
    let mut prev: Vec<usize> = (0..=b_len).collect();
    let mut curr = vec![0; b_len + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.chars().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b_len]
}

/// Closest candidate within `max_distance` edits, if any.
fn suggest<'a>(needle: &str, candidates: &[&'a str], max_distance: usize) -> Option<&'a str> {
    candidates
        .iter()
        .map(|&c| (c, levenshtein(needle, c)))
        .filter(|&(_, d)| d > 0 && d <= max_distance)
        .min_by_key(|&(_, d)| d)
        .map(|(c, _)| c)
}

// ── Core validation ─────────────────────────────────────────────────────────

/// Validate a config file at the given path, or the discovered config file
/// when `path` is `None`.
#[must_use]
pub fn validate(path: Option<&Path>) -> ValidationResult {
    let Some(config_path) = path
        .map(Path::to_path_buf)
        .or_else(crate::loader::find_config_file)
    else {
        return ValidationResult {
            diagnostics: vec![Diagnostic::new(
                Severity::Info,
                "file-ref",
                "",
                "no config file found; using defaults",
            )],
            config_path: None,
        };
    };

    let ext = config_path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("toml")
        .to_string();
    let mut result = match std::fs::read_to_string(&config_path) {
        Ok(raw) => validate_str(&crate::env_subst::substitute_env(&raw), &ext),
        Err(e) => ValidationResult {
            diagnostics: vec![Diagnostic::new(
                Severity::Error,
                "syntax",
                "",
                format!("failed to read config file: {e}"),
            )],
            config_path: None,
        },
    };
    result.config_path = Some(config_path);
    result
}

/// Validate raw config text in the format named by `ext`.
#[must_use]
pub fn validate_str(raw: &str, ext: &str) -> ValidationResult {
    let mut diagnostics = Vec::new();

    let value = match parse_value(raw, ext) {
        Ok(v) => v,
        Err(message) => {
            diagnostics.push(Diagnostic::new(Severity::Error, "syntax", "", message));
            return ValidationResult {
                diagnostics,
                config_path: None,
            };
        },
    };

    check_unknown_fields(&value, &build_schema_map(), "", &mut diagnostics);

    match serde_json::from_value::<ChanlinkConfig>(value) {
        Ok(config) => check_semantics(&config, &mut diagnostics),
        Err(e) => diagnostics.push(Diagnostic::new(
            Severity::Error,
            "type-error",
            "",
            format!("type error: {e}"),
        )),
    }

    ValidationResult {
        diagnostics,
        config_path: None,
    }
}

/// Checks that only matter when the relay is about to connect.
#[must_use]
pub fn validate_for_run(config: &ChanlinkConfig) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    check_semantics(config, &mut diagnostics);
    if config.discord.token().is_none() {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "discord",
            "discord.token",
            "no bot token configured (set discord.token or DISCORD_TOKEN)",
        ));
    }
    diagnostics
}

fn parse_value(raw: &str, ext: &str) -> Result<Value, String> {
    match ext {
        "toml" => {
            let v: toml::Value = toml::from_str(raw).map_err(|e| format!("TOML syntax error: {e}"))?;
            serde_json::to_value(v).map_err(|e| e.to_string())
        },
        "yaml" | "yml" => {
            let v: serde_yaml::Value =
                serde_yaml::from_str(raw).map_err(|e| format!("YAML syntax error: {e}"))?;
            // An empty YAML document parses as null.
            if v.is_null() {
                return Ok(Value::Object(Default::default()));
            }
            serde_json::to_value(v).map_err(|e| e.to_string())
        },
        "json" => serde_json::from_str(raw).map_err(|e| format!("JSON syntax error: {e}")),
        other => Err(format!("unsupported config format: .{other}")),
    }
}

fn check_unknown_fields(
    value: &Value,
    schema: &KnownKeys,
    prefix: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let (Value::Object(table), KnownKeys::Struct(fields)) = (value, schema) else {
        return;
    };
    let known: Vec<&str> = fields.keys().copied().collect();
    for (key, child) in table {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match fields.get(key.as_str()) {
            Some(child_schema) => check_unknown_fields(child, child_schema, &path, diagnostics),
            None => {
                let message = match suggest(key, &known, 3) {
                    Some(s) => format!("unknown field (did you mean \"{s}\"?)"),
                    None => "unknown field".to_string(),
                };
                diagnostics.push(Diagnostic::new(
                    Severity::Error,
                    "unknown-field",
                    path,
                    message,
                ));
            },
        }
    }
}

fn check_semantics(config: &ChanlinkConfig, diagnostics: &mut Vec<Diagnostic>) {
    let relay = &config.relay;
    if relay.correlation_capacity == 0 {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "relay",
            "relay.correlation_capacity",
            "must be greater than zero",
        ));
    }
    if relay.reverse_capacity == 0 {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "relay",
            "relay.reverse_capacity",
            "must be greater than zero",
        ));
    } else if relay.reverse_capacity < relay.correlation_capacity {
        diagnostics.push(Diagnostic::new(
            Severity::Warning,
            "relay",
            "relay.reverse_capacity",
            format!(
                "smaller than correlation_capacity ({}); copies will lose their origin before the origin is evicted",
                relay.correlation_capacity
            ),
        ));
    }
    if relay.identity_name.trim().is_empty() {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "relay",
            "relay.identity_name",
            "must not be empty",
        ));
    }
    if relay.reply_embed_colour > 0xFF_FF_FF {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "relay",
            "relay.reply_embed_colour",
            "must be a 24-bit RGB value",
        ));
    }
    if config.metrics.prometheus_listen.is_some() && !config.metrics.enabled {
        diagnostics.push(Diagnostic::new(
            Severity::Info,
            "metrics",
            "metrics.prometheus_listen",
            "ignored while metrics.enabled is false",
        ));
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    fn toml(raw: &str) -> ValidationResult {
        validate_str(raw, "toml")
    }

    #[test]
    fn levenshtein_basics() {
        assert_eq!(levenshtein("relay", "relay"), 0);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("relya", "relay"), 2);
    }

    #[rstest]
    #[case::toml("", "toml")]
    #[case::yaml("", "yaml")]
    #[case::json("{}", "json")]
    fn empty_config_is_valid(#[case] raw: &str, #[case] ext: &str) {
        let result = validate_str(raw, ext);
        assert!(!result.has_errors(), "{:?}", result.diagnostics);
    }

    #[test]
    fn unknown_field_with_suggestion() {
        let result = toml("[relay]\ncorelation_capacity = 10\n");
        let d = result
            .diagnostics
            .iter()
            .find(|d| d.category == "unknown-field")
            .unwrap();
        assert_eq!(d.path, "relay.corelation_capacity");
        assert!(d.message.contains("correlation_capacity"));
    }

    #[test]
    fn metric_labels_accept_any_key() {
        let result = toml("[metrics.labels]\nregion = \"eu\"\n");
        assert!(!result.has_errors(), "{:?}", result.diagnostics);
    }

    #[test]
    fn syntax_and_type_errors() {
        assert!(toml("[relay").has_errors());
        let result = toml("[relay]\ncorrelation_capacity = \"many\"\n");
        assert!(
            result
                .diagnostics
                .iter()
                .any(|d| d.category == "type-error")
        );
    }

    #[rstest]
    #[case("[relay]\ncorrelation_capacity = 0\n", Severity::Error)]
    #[case("[relay]\nreverse_capacity = 0\n", Severity::Error)]
    #[case("[relay]\nreverse_capacity = 100\n", Severity::Warning)]
    #[case("[relay]\nidentity_name = \"  \"\n", Severity::Error)]
    #[case("[relay]\nreply_embed_colour = 16777216\n", Severity::Error)]
    fn relay_settings_checked(#[case] raw: &str, #[case] expected: Severity) {
        let result = toml(raw);
        assert!(
            result
                .diagnostics
                .iter()
                .any(|d| d.category == "relay" && d.severity == expected),
            "{:?}",
            result.diagnostics
        );
    }

    #[test]
    fn run_requires_a_token() {
        let mut config = ChanlinkConfig::default();
        let diagnostics = validate_for_run(&config);
        assert!(diagnostics.iter().any(|d| d.path == "discord.token"));

        config.discord.token = Some(secrecy::Secret::new("abc".into()));
        assert!(validate_for_run(&config).is_empty());
    }

    #[test]
    fn validate_reads_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chanlink.json");
        std::fs::write(&path, r#"{"relay": {"reverse_capacity": 10}}"#).unwrap();
        let result = validate(Some(&path));
        assert_eq!(result.config_path.as_deref(), Some(path.as_path()));
        assert_eq!(result.count(Severity::Warning), 1);
    }
}
