//! Preverb form derivation.
//!
//! Given the stored forms for a verb's default preverb, compute the forms
//! for another preverb by swapping the leading prefix. Forms that do not
//! carry the default prefix (suppletive or otherwise irregular cells) are
//! copied unchanged rather than guessed at.

use crate::types::{Conjugations, PreverbRules, TenseData};

/// Strip hyphens, so `"წა-"` and `"წა"` compare equal.
pub fn normalize_preverb(preverb: &str) -> String {
    preverb.trim().chars().filter(|c| *c != '-').collect()
}

/// `"-"` and `""` mark a cell with no form.
pub fn is_sentinel(form: &str) -> bool {
    form.is_empty() || form == "-"
}

/// Derive the conjugation table for `target_preverb`.
///
/// The input is never modified. Requesting the default preverb, or passing
/// empty rules, returns a copy of the stored table as-is; this matters for
/// verbs whose default forms would not survive a prefix round trip.
///
/// For any other preverb, each tense uses the tense-specific fallback prefix
/// when one is declared and the general replacement otherwise. Only `forms`
/// change; `gloss` and `examples` are carried over untouched.
pub fn derive_forms(
    conjugations: &Conjugations,
    rules: &PreverbRules,
    target_preverb: &str,
) -> Conjugations {
    if rules.is_empty() {
        return conjugations.clone();
    }

    let target = normalize_preverb(target_preverb);
    if target == normalize_preverb(&rules.default) {
        return conjugations.clone();
    }

    let replacement = rules.replacement_for(target_preverb);

    conjugations
        .iter()
        .map(|(tense, data)| {
            let prefix = rules
                .tense_fallback(&target, *tense)
                .unwrap_or(replacement.as_str());

            let forms = data
                .forms
                .iter()
                .map(|(person, form)| (person, swap_prefix(form, &rules.default, prefix)))
                .collect();

            let derived = TenseData {
                forms,
                gloss: data.gloss.clone(),
                examples: data.examples.clone(),
            };
            (*tense, derived)
        })
        .collect()
}

fn swap_prefix(form: &str, default_prefix: &str, replacement: &str) -> String {
    if is_sentinel(form) {
        return form.to_string();
    }
    match form.strip_prefix(default_prefix) {
        Some(stem) => format!("{}{}", replacement, stem),
        None => {
            tracing::trace!(
                form,
                default_prefix,
                "form does not start with the default preverb; copied unchanged"
            );
            form.to_string()
        }
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
