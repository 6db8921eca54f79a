//! Merge-tag and conditional-block rendering.
//!
//! Evaluation order:
//! 1. `{{#if key}}BODY{{/if}}` blocks are kept (markers stripped) or removed.
//! 2. `{{tag}}` placeholders are substituted; unknown tags become `""`.
//! 3. Any remaining `{{#if ..}}` / `{{/if}}` markers are removed.
//! 4. Runs of three or more newlines collapse to a single blank line.
//!
//! Rendering never fails: partial data yields a partial document.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static CONDITIONAL_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\{\{#if\s+(\w+)\s*\}\}(.*?)\{\{/if\}\}").expect("valid conditional regex")
});

static STRAY_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{#if\s+\w*\s*\}\}|\{\{/if\}\}").expect("valid marker regex")
});

static MERGE_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*(\w+)\s*\}\}").expect("valid merge tag regex"));

static BLANK_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("valid newline regex"));

/// Render `template` with `tags` and `conditions`.
///
/// Condition keys absent from `conditions` evaluate to false.
pub fn render(
    template: &str,
    tags: &HashMap<String, String>,
    conditions: &HashMap<String, bool>,
) -> String {
    let resolved = CONDITIONAL_BLOCK.replace_all(template, |caps: &Captures<'_>| {
        let enabled = conditions.get(&caps[1]).copied().unwrap_or(false);
        if enabled {
            caps[2].to_string()
        } else {
            String::new()
        }
    });

    let merged = MERGE_TAG.replace_all(&resolved, |caps: &Captures<'_>| {
        tags.get(&caps[1]).cloned().unwrap_or_default()
    });

    let mut text = merged.into_owned();
    // Removing one marker can splice its neighbours into a new one.
    while STRAY_MARKER.is_match(&text) {
        text = STRAY_MARKER.replace_all(&text, "").into_owned();
    }

    BLANK_RUN.replace_all(&text, "\n\n").into_owned()
}
