//! Control-label vocabulary and parsing rules.
//!
//! Every per-container knob this engine reads comes from Docker labels under
//! the `arcane` prefix. The vocabulary is a closed enumeration so the
//! truthy/falsy parsing rules are defined once and reused; keys are matched
//! case-insensitively throughout.

use std::collections::HashMap;
use std::time::Duration;

// ── Vocabulary ────────────────────────────────────────────────────────────────

/// The closed set of labels this engine reads. Never written by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlLabel {
    /// Marks the orchestrator's own container.
    Manager,
    /// Opt a container out of updates (`false`/`0`/`no`/`off` disables).
    UpdaterEnabled,
    /// Hook command run before the staleness check.
    PreCheck,
    /// Hook command run after the staleness check.
    PostCheck,
    /// Hook command run before stop/recreate.
    PreUpdate,
    /// Hook command run after the replacement container starts.
    PostUpdate,
    /// Timeout override for the pre-update hook.
    PreUpdateTimeout,
    /// Timeout override for the post-update hook.
    PostUpdateTimeout,
    /// Comma-separated explicit dependency names.
    DependsOn,
    /// Custom stop signal, normalized to upper case.
    StopSignal,
}

impl ControlLabel {
    /// The full label key as it appears on a container.
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::Manager => "arcane",
            Self::UpdaterEnabled => "arcane.updater",
            Self::PreCheck => "arcane.lifecycle.pre-check",
            Self::PostCheck => "arcane.lifecycle.post-check",
            Self::PreUpdate => "arcane.lifecycle.pre-update",
            Self::PostUpdate => "arcane.lifecycle.post-update",
            Self::PreUpdateTimeout => "arcane.lifecycle.pre-update-timeout",
            Self::PostUpdateTimeout => "arcane.lifecycle.post-update-timeout",
            Self::DependsOn => "arcane.depends-on",
            Self::StopSignal => "arcane.stop-signal",
        }
    }
}

/// The four lifecycle hook points, in execution order around an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleHook {
    PreCheck,
    PostCheck,
    PreUpdate,
    PostUpdate,
}

impl LifecycleHook {
    /// Label holding the hook command.
    #[must_use]
    pub fn command_label(self) -> ControlLabel {
        match self {
            Self::PreCheck => ControlLabel::PreCheck,
            Self::PostCheck => ControlLabel::PostCheck,
            Self::PreUpdate => ControlLabel::PreUpdate,
            Self::PostUpdate => ControlLabel::PostUpdate,
        }
    }

    /// Label holding the timeout override. Check hooks are not independently
    /// configurable and always use the default.
    #[must_use]
    pub fn timeout_label(self) -> Option<ControlLabel> {
        match self {
            Self::PreUpdate => Some(ControlLabel::PreUpdateTimeout),
            Self::PostUpdate => Some(ControlLabel::PostUpdateTimeout),
            Self::PreCheck | Self::PostCheck => None,
        }
    }

    /// Human-readable hook name for log and error messages.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::PreCheck => "pre-check",
            Self::PostCheck => "post-check",
            Self::PreUpdate => "pre-update",
            Self::PostUpdate => "post-update",
        }
    }
}

// ── Boolean-like value sets ───────────────────────────────────────────────────

/// Values accepted as "enabled" for boolean-like labels.
const TRUTHY: [&str; 4] = ["true", "1", "yes", "on"];

/// Values accepted as "disabled" for boolean-like labels.
const FALSY: [&str; 4] = ["false", "0", "no", "off"];

fn is_truthy(value: &str) -> bool {
    let v = value.trim().to_ascii_lowercase();
    TRUTHY.contains(&v.as_str())
}

fn is_falsy(value: &str) -> bool {
    let v = value.trim().to_ascii_lowercase();
    FALSY.contains(&v.as_str())
}

// ── Lookup ────────────────────────────────────────────────────────────────────

/// Look up a control label in a label map, matching keys case-insensitively.
#[must_use]
pub fn label_value(labels: &HashMap<String, String>, label: ControlLabel) -> Option<&str> {
    let key = label.key();
    labels
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v.as_str())
}

// ── Policy operations ─────────────────────────────────────────────────────────

/// `true` if the container carries the manager label with a truthy value,
/// i.e. it is an instance of the orchestrator itself.
#[must_use]
pub fn is_managed_by_arcane(labels: &HashMap<String, String>) -> bool {
    label_value(labels, ControlLabel::Manager).is_some_and(is_truthy)
}

/// `true` only if the updater label is present AND explicitly disabled.
/// An absent label means updates are enabled; so does any unrecognized value.
#[must_use]
pub fn is_update_disabled(labels: &HashMap<String, String>) -> bool {
    label_value(labels, ControlLabel::UpdaterEnabled).is_some_and(is_falsy)
}

/// Custom stop signal, trimmed and upper-cased, or `None` when unset/blank.
#[must_use]
pub fn stop_signal(labels: &HashMap<String, String>) -> Option<String> {
    let raw = label_value(labels, ControlLabel::StopSignal)?.trim();
    if raw.is_empty() {
        return None;
    }
    Some(raw.to_ascii_uppercase())
}

/// Explicit dependency names: comma-separated, trimmed, empty entries dropped.
#[must_use]
pub fn depends_on(labels: &HashMap<String, String>) -> Vec<String> {
    label_value(labels, ControlLabel::DependsOn)
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

/// Hook command for a label, wrapped as a single shell invocation.
///
/// Hook values may contain arbitrary shell syntax (pipes, `&&`, quoting), so
/// the raw string is handed to `/bin/sh -c` rather than whitespace-split.
/// Returns `None` when the label is absent or blank.
#[must_use]
pub fn lifecycle_command(
    labels: &HashMap<String, String>,
    label: ControlLabel,
) -> Option<Vec<String>> {
    let raw = label_value(labels, label)?.trim();
    if raw.is_empty() {
        return None;
    }
    Some(vec!["/bin/sh".to_owned(), "-c".to_owned(), raw.to_owned()])
}

/// Parse a hook timeout label.
///
/// The value is tried first as a positive integer number of seconds, then as
/// a duration string (`"90s"`, `"2m"`). Anything else — absent, empty, zero,
/// negative, unparsable — yields the caller-supplied default.
#[must_use]
pub fn hook_timeout(
    labels: &HashMap<String, String>,
    label: ControlLabel,
    default: Duration,
) -> Duration {
    let Some(raw) = label_value(labels, label) else {
        return default;
    };
    let raw = raw.trim();
    if let Ok(secs) = raw.parse::<i64>() {
        return if secs > 0 {
            Duration::from_secs(secs.unsigned_abs())
        } else {
            default
        };
    }
    match humantime::parse_duration(raw) {
        Ok(d) if !d.is_zero() => d,
        _ => default,
    }
}
