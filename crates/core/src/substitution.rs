//! Variable substitution for `{{name}}` tokens in text layers.
//!
//! Substitution is a pure function of a scene and a variable map. It only
//! touches the `content` of text layers, replaces each token in a single
//! pass, and leaves tokens without a matching variable verbatim so partially
//! filled templates still render legibly.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::scene::{LayerKind, SceneDocument};

/// Variable name (without delimiters) to replacement text.
pub type VariableMap = BTreeMap<String, String>;

/// Regex pattern matching `{{name}}` tokens: two braces, at least one
/// non-`}` character, two braces.
pub const TOKEN_PATTERN: &str = r"\{\{([^}]+)\}\}";

static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(TOKEN_PATTERN).expect("valid regex"));

/// Return a copy of `scene` with every known token in text layers replaced.
///
/// The input is never modified. Replacement values are inserted as-is and
/// are not scanned again, so a value containing `{{other}}` stays literal.
pub fn substitute(scene: &SceneDocument, vars: &VariableMap) -> SceneDocument {
    let mut resolved = scene.clone();
    if vars.is_empty() {
        return resolved;
    }
    for layer in &mut resolved.layers {
        if let LayerKind::Text(text) = &mut layer.kind {
            if let Some(replaced) = substitute_text(&text.content, vars) {
                text.content = replaced;
            }
        }
    }
    resolved
}

/// Substitute tokens in a single string.
///
/// Returns `None` when nothing changed so callers can skip the allocation.
pub fn substitute_text(content: &str, vars: &VariableMap) -> Option<String> {
    let mut changed = false;
    let out = TOKEN_RE.replace_all(content, |caps: &Captures<'_>| {
        match vars.get(caps[1].trim()) {
            Some(value) => {
                changed = true;
                value.clone()
            }
            None => caps[0].to_string(),
        }
    });
    changed.then(|| out.into_owned())
}

/// Collect the distinct variable names referenced by the scene's text layers.
///
/// Placeholder layers are editor-only and contribute nothing.
pub fn extract_variable_names(scene: &SceneDocument) -> BTreeSet<String> {
    scene
        .layers
        .iter()
        .filter_map(|layer| match &layer.kind {
            LayerKind::Text(text) => Some(text.content.as_str()),
            _ => None,
        })
        .flat_map(|content| TOKEN_RE.captures_iter(content))
        .map(|caps| caps[1].trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
