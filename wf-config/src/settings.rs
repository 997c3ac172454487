//! Typed, non-secret workflow-engine settings loaded from TOML.
//!
//! Grounded in SPEC_FULL.md §B "Config": session store root, default
//! `max_parallel`, default session-lock timeout, default budget warn ratio,
//! and the spec-hash mismatch policy (SPEC_FULL.md §C, spec.md §9 Open
//! Questions). These are read from the `[workflow]` table of the same
//! `config.toml` [`crate::load_and_apply`] locates via XDG; any field absent
//! from the file falls back to the documented default.

use std::path::PathBuf;

use serde::Deserialize;

use crate::LoadError;

/// Spec-hash mismatch handling on resume (spec.md §9 Open Questions,
/// resolved in DESIGN.md): default is "warn and continue"; `Refuse` is
/// available for operators who want resume to fail closed on drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SpecHashPolicy {
    #[default]
    Warn,
    Refuse,
}

/// Non-secret workflow-engine settings (session root, concurrency and
/// budget defaults, spec-hash policy).
#[derive(Debug, Clone, PartialEq)]
pub struct WfSettings {
    /// Root directory under which `FileSessionStore` creates
    /// `session_<uuid>` directories. Defaults to `~/.wf/sessions`.
    pub session_root: PathBuf,
    /// Default fan-out width for parallel/DAG/orchestrator patterns when a
    /// spec's `runtime.max_parallel` is absent.
    pub default_max_parallel: usize,
    /// Default bound on session-lock acquisition, in seconds
    /// (spec.md §4.3: "bounded timeout, default 10 s").
    pub default_lock_timeout_secs: u64,
    /// Default budget warn ratio (spec.md §4.4: default 0.8).
    pub default_warn_ratio: f64,
    /// Behavior when a resumed session's recorded spec hash no longer
    /// matches the spec being resumed with.
    pub spec_hash_policy: SpecHashPolicy,
    /// Sessions last updated before this many days ago are eligible for
    /// cleanup (spec.md §3 Lifecycle).
    pub default_cleanup_max_age_days: i64,
    /// Whether cleanup preserves completed sessions regardless of age.
    pub default_cleanup_keep_completed: bool,
}

impl Default for WfSettings {
    fn default() -> Self {
        Self {
            session_root: default_session_root(),
            default_max_parallel: 4,
            default_lock_timeout_secs: 10,
            default_warn_ratio: 0.8,
            spec_hash_policy: SpecHashPolicy::Warn,
            default_cleanup_max_age_days: 7,
            default_cleanup_keep_completed: true,
        }
    }
}

fn default_session_root() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".wf")
        .join("sessions")
}

#[derive(Deserialize, Default)]
struct SettingsFile {
    #[serde(default)]
    workflow: WorkflowTable,
}

#[derive(Deserialize, Default)]
struct WorkflowTable {
    session_root: Option<PathBuf>,
    default_max_parallel: Option<usize>,
    default_lock_timeout_secs: Option<u64>,
    default_warn_ratio: Option<f64>,
    spec_hash_policy: Option<SpecHashPolicy>,
    default_cleanup_max_age_days: Option<i64>,
    default_cleanup_keep_completed: Option<bool>,
}

/// Loads `[workflow]` settings from `$XDG_CONFIG_HOME/<app_name>/config.toml`,
/// falling back to [`WfSettings::default`] field-by-field when the file or
/// individual keys are absent.
pub fn load_settings(app_name: &str) -> Result<WfSettings, LoadError> {
    let defaults = WfSettings::default();
    let Some(path) = crate::xdg_toml::xdg_config_path(app_name)? else {
        return Ok(defaults);
    };
    let content = std::fs::read_to_string(&path).map_err(LoadError::XdgRead)?;
    let file: SettingsFile = toml::from_str(&content)?;
    let w = file.workflow;
    Ok(WfSettings {
        session_root: w.session_root.unwrap_or(defaults.session_root),
        default_max_parallel: w.default_max_parallel.unwrap_or(defaults.default_max_parallel),
        default_lock_timeout_secs: w
            .default_lock_timeout_secs
            .unwrap_or(defaults.default_lock_timeout_secs),
        default_warn_ratio: w.default_warn_ratio.unwrap_or(defaults.default_warn_ratio),
        spec_hash_policy: w.spec_hash_policy.unwrap_or(defaults.spec_hash_policy),
        default_cleanup_max_age_days: w
            .default_cleanup_max_age_days
            .unwrap_or(defaults.default_cleanup_max_age_days),
        default_cleanup_keep_completed: w
            .default_cleanup_keep_completed
            .unwrap_or(defaults.default_cleanup_keep_completed),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn defaults_when_no_config_file() {
        let settings = load_settings("config-crate-nonexistent-app-settings").unwrap();
        assert_eq!(settings, WfSettings::default());
    }

    #[test]
    fn reads_workflow_table_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let app_dir = dir.path().join("wfsettingstest");
        std::fs::create_dir_all(&app_dir).unwrap();
        std::fs::write(
            app_dir.join("config.toml"),
            r#"
[workflow]
default_max_parallel = 8
default_warn_ratio = 0.9
spec_hash_policy = "refuse"
"#,
        )
        .unwrap();

        let prev = env::var("XDG_CONFIG_HOME").ok();
        env::set_var("XDG_CONFIG_HOME", dir.path());
        let settings = load_settings("wfsettingstest").unwrap();
        if let Some(p) = prev {
            env::set_var("XDG_CONFIG_HOME", p);
        } else {
            env::remove_var("XDG_CONFIG_HOME");
        }

        assert_eq!(settings.default_max_parallel, 8);
        assert_eq!(settings.default_warn_ratio, 0.9);
        assert_eq!(settings.spec_hash_policy, SpecHashPolicy::Refuse);
        assert_eq!(settings.default_lock_timeout_secs, 10);
    }
}
