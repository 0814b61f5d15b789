//! Field extraction: recover report fields from unstructured OCR text.
//!
//! OCR output has no structure beyond line breaks, so fields are located by
//! their headings. Every non-blank line is tested against every field's
//! aliases; when a heading is found the value is either the rest of that line
//! (`Paciente: Firulais`) or the lines that follow a heading-only line, up to
//! the next blank line or the next line containing a colon.
//!
//! Matching has two tiers:
//!
//! 1. **Exact**: the alias occurs as a whole word, case-insensitively. Aliases
//!    are tried in table order and the first hit wins.
//! 2. **Fuzzy**: the first [`FieldScanOptions::fuzzy_token_count`] alphabetic
//!    tokens of the line are compared with each alias using
//!    [`similarity::ratio`](super::similarity::ratio). Catches headings that
//!    OCR garbled slightly (`Propietaro`).
//!
//! A heading may appear more than once (page header, then the actual entry).
//! The longest cleaned value found for a field wins, which keeps the result
//! independent of scan order.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::similarity;
use crate::labels::{LabelAlias, LabelAliasTable};
use crate::output::FieldRecord;

/// Tunables for the field scanner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldScanOptions {
    /// Minimum similarity for a fuzzy heading match. Default: 0.75.
    pub fuzzy_cutoff: f64,
    /// How many leading alphabetic tokens form the fuzzy probe. Default: 2.
    pub fuzzy_token_count: usize,
    /// Maximum continuation lines read after a heading-only line. Default: 6.
    pub continuation_lookahead: usize,
}

impl Default for FieldScanOptions {
    fn default() -> Self {
        Self {
            fuzzy_cutoff: 0.75,
            fuzzy_token_count: 2,
            continuation_lookahead: 6,
        }
    }
}

// ── Text normalisation ───────────────────────────────────────────────────────

static RE_LINE_BREAK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\r\n|[\n\r\x0B\x0C\x1C\x1D\x1E\x{85}\x{2028}\x{2029}]").unwrap()
});
static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Split into lines, collapse whitespace runs and trim each line.
///
/// Blank lines are kept so that line indices stay aligned with the source.
pub fn normalise_lines(text: &str) -> Vec<String> {
    RE_LINE_BREAK
        .split(text)
        .map(|line| RE_WHITESPACE.replace_all(line, " ").trim().to_string())
        .collect()
}

// ── Value cleanup ────────────────────────────────────────────────────────────

static RE_LEADING_PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\s:\-–—•·]+").unwrap());
static RE_TRAILING_PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s:\-–—•·]+$").unwrap());
static RE_MULTI_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}").unwrap());

/// Strip bullet/dash/colon runs from both ends and collapse inner whitespace.
/// Returns `None` when nothing is left.
pub fn clean_value(raw: &str) -> Option<String> {
    let v = raw.trim();
    let v = RE_LEADING_PUNCT.replace(v, "");
    let v = RE_TRAILING_PUNCT.replace(&v, "");
    let v = RE_MULTI_SPACE.replace_all(&v, " ");
    if v.is_empty() {
        None
    } else {
        Some(v.into_owned())
    }
}

// ── Heading detection ────────────────────────────────────────────────────────

static RE_ALPHA_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-zÁÉÍÓÚÑáéíóúñ]+").unwrap());

/// The alias that introduces a field on `line`, if any.
pub fn find_label<'a>(
    line: &str,
    aliases: &'a [LabelAlias],
    options: &FieldScanOptions,
) -> Option<&'a LabelAlias> {
    if let Some(alias) = aliases.iter().find(|a| a.occurs_in(line)) {
        return Some(alias);
    }

    let probe = RE_ALPHA_TOKEN
        .find_iter(line)
        .take(options.fuzzy_token_count)
        .map(|m| m.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    if probe.is_empty() {
        return None;
    }

    let (idx, score) = similarity::closest(
        &probe,
        aliases.iter().map(LabelAlias::text),
        options.fuzzy_cutoff,
    )?;
    debug!(
        "Fuzzy heading '{}' ~ '{}' ({:.2})",
        probe,
        aliases[idx].text(),
        score
    );
    Some(&aliases[idx])
}

// ── Value capture ────────────────────────────────────────────────────────────

/// Read the value that follows `alias` on line `label_idx`.
///
/// Same-line values win outright, even when they clean to nothing. Otherwise
/// continuation lines are joined with single spaces.
pub fn value_after_label(
    lines: &[String],
    label_idx: usize,
    alias: &LabelAlias,
    lookahead: usize,
) -> Option<String> {
    if let Some(rest) = alias.same_line_value(&lines[label_idx]) {
        return clean_value(rest);
    }

    let end = lines.len().min(label_idx + 1 + lookahead);
    let collected: Vec<&str> = lines
        .get(label_idx + 1..end)
        .unwrap_or(&[])
        .iter()
        .take_while(|l| !l.is_empty() && !l.contains(':'))
        .map(String::as_str)
        .collect();

    clean_value(&collected.join(" "))
}

// ── Driver ───────────────────────────────────────────────────────────────────

/// Scan `text` and build a [`FieldRecord`].
///
/// Never fails: a field without a heading or without a usable value is left
/// as `None`. Deterministic for a given `(text, labels, options)`.
pub fn extract_fields(
    text: &str,
    labels: &LabelAliasTable,
    options: &FieldScanOptions,
) -> FieldRecord {
    let lines = normalise_lines(text);
    let mut record = FieldRecord::default();

    for (idx, line) in lines.iter().enumerate().filter(|(_, l)| !l.is_empty()) {
        for (field, aliases) in labels.iter() {
            let Some(alias) = find_label(line, aliases, options) else {
                continue;
            };
            let Some(value) =
                value_after_label(&lines, idx, alias, options.continuation_lookahead)
            else {
                continue;
            };

            let longer = record
                .get(field)
                .map_or(true, |cur| value.chars().count() > cur.chars().count());
            if longer {
                debug!("Line {}: {} = {:?} (via '{}')", idx + 1, field, value, alias.text());
                record.set(field, Some(value));
            }
        }
    }

    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::Field;

    fn scan(text: &str) -> FieldRecord {
        extract_fields(text, &LabelAliasTable::spanish(), &FieldScanOptions::default())
    }

    // ── normalise_lines ─────────────────────────────────────────────────

    #[test]
    fn normalise_collapses_and_keeps_blank_lines() {
        let lines = normalise_lines("  Paciente:\t  Firulais \r\n\nDueño   Ana");
        assert_eq!(lines, vec!["Paciente: Firulais", "", "Dueño Ana"]);
    }

    // ── clean_value ─────────────────────────────────────────────────────

    #[test]
    fn clean_strips_bullets_and_dashes() {
        assert_eq!(clean_value(" • Reposo – "), Some("Reposo".into()));
        assert_eq!(clean_value(": — Control en 7 días ·"), Some("Control en 7 días".into()));
        assert_eq!(clean_value("a   b"), Some("a b".into()));
    }

    #[test]
    fn clean_empty_is_none() {
        assert_eq!(clean_value(""), None);
        assert_eq!(clean_value(" - : • "), None);
    }

    // ── extraction ──────────────────────────────────────────────────────

    #[test]
    fn same_line_value() {
        let record = scan("Paciente: Firulais");
        assert_eq!(record.patient.as_deref(), Some("Firulais"));
    }

    #[test]
    fn same_line_value_with_hyphen() {
        let record = scan("Propietario - Juan Pérez");
        assert_eq!(record.owner.as_deref(), Some("Juan Pérez"));
    }

    #[test]
    fn multi_line_value() {
        let record = scan("Propietario\nJuan Pérez\n\nOtro texto");
        assert_eq!(record.owner.as_deref(), Some("Juan Pérez"));
    }

    #[test]
    fn continuation_joins_lines() {
        let record = scan("Recomendaciones\nReposo absoluto\ncontrol en 7 días\n");
        assert_eq!(
            record.recommendations.as_deref(),
            Some("Reposo absoluto control en 7 días")
        );
    }

    #[test]
    fn continuation_stops_at_colon_line() {
        let record = scan("Diagnóstico\nNormal estudio\nVeterinario: Dra. Gomez");
        assert_eq!(record.diagnosis.as_deref(), Some("Normal estudio"));
        assert_eq!(record.veterinarian.as_deref(), Some("Dra. Gomez"));
    }

    #[test]
    fn continuation_respects_lookahead() {
        let text = "Indicaciones\nl1\nl2\nl3\nl4\nl5\nl6\nl7";
        let record = scan(text);
        assert_eq!(record.recommendations.as_deref(), Some("l1 l2 l3 l4 l5 l6"));

        let options = FieldScanOptions {
            continuation_lookahead: 2,
            ..Default::default()
        };
        let record = extract_fields(text, &LabelAliasTable::spanish(), &options);
        assert_eq!(record.recommendations.as_deref(), Some("l1 l2"));
    }

    #[test]
    fn exact_match_is_case_insensitive() {
        let record = scan("DIAGNÓSTICO: Hepatomegalia leve");
        assert_eq!(record.diagnosis.as_deref(), Some("Hepatomegalia leve"));
    }

    #[test]
    fn missing_accent_heading_resolves() {
        let record = scan("Diagnostico:\nQuiste renal");
        assert_eq!(record.diagnosis.as_deref(), Some("Quiste renal"));
    }

    #[test]
    fn fuzzy_fallback_catches_ocr_noise() {
        let labels = LabelAliasTable::spanish();
        let options = FieldScanOptions::default();
        let aliases = labels.aliases(Field::Owner);
        let alias = find_label("Propietaro Juan", aliases, &options).expect("fuzzy match");
        assert_eq!(alias.text(), "Propietario");

        let record = scan("Propietaro\nJuan Pérez");
        assert_eq!(record.owner.as_deref(), Some("Juan Pérez"));
    }

    #[test]
    fn truncated_heading_below_cutoff_is_ignored() {
        let labels = LabelAliasTable::spanish();
        let aliases = labels.aliases(Field::Patient);
        assert!(find_label("Pacine", aliases, &FieldScanOptions::default()).is_none());

        let record = scan("Pacine\nFirulais");
        assert_eq!(record.patient, None);
    }

    #[test]
    fn fuzzy_cutoff_rejects_distant_words() {
        let labels = LabelAliasTable::spanish();
        let aliases = labels.aliases(Field::Diagnosis);
        assert!(find_label("Ecografia abdominal", aliases, &FieldScanOptions::default()).is_none());
    }

    #[test]
    fn fuzzy_token_count_is_configurable() {
        let labels = LabelAliasTable::spanish();
        let aliases = labels.aliases(Field::Recommendations);
        // "Tratamiento recomendad" only resembles the two-word alias.
        let two = FieldScanOptions::default();
        assert!(find_label("Tratamiento recomendad", aliases, &two).is_some());
        let one = FieldScanOptions {
            fuzzy_token_count: 1,
            ..Default::default()
        };
        assert!(find_label("Tratamiento recomendad", aliases, &one).is_none());
    }

    #[test]
    fn longest_value_wins_regardless_of_order() {
        let short_first = scan("Paciente: Max\n\nPaciente: Max Rodríguez");
        let long_first = scan("Paciente: Max Rodríguez\n\nPaciente: Max");
        assert_eq!(short_first.patient.as_deref(), Some("Max Rodríguez"));
        assert_eq!(short_first, long_first);
    }

    #[test]
    fn extraction_is_deterministic() {
        let text = "Paciente: Luna\nPropietario\nAna Torres\n\nDiagnóstico\nGastritis";
        let first = scan(text);
        for _ in 0..5 {
            assert_eq!(scan(text), first);
        }
    }

    #[test]
    fn heading_without_value_is_absent() {
        let record = scan("Diagnóstico\n\nFin del informe");
        assert_eq!(record.diagnosis, None);
    }

    #[test]
    fn empty_text_yields_empty_record() {
        assert!(scan("").is_empty());
        assert!(scan("\n\n   \n").is_empty());
    }

    #[test]
    fn full_report() {
        let text = "\
CLÍNICA VETERINARIA SAN ROQUE
Paciente: Toby
Propietario: Marta Díaz
Médico Veterinario: Dr. Luis Paredes

Diagnóstico
Esplenomegalia moderada
sin evidencia de masas

Recomendaciones
Control ecográfico en 30 días";
        let record = scan(text);
        assert_eq!(record.patient.as_deref(), Some("Toby"));
        assert_eq!(record.owner.as_deref(), Some("Marta Díaz"));
        assert_eq!(record.veterinarian.as_deref(), Some("Dr. Luis Paredes"));
        assert_eq!(
            record.diagnosis.as_deref(),
            Some("Esplenomegalia moderada sin evidencia de masas")
        );
        assert_eq!(
            record.recommendations.as_deref(),
            Some("Control ecográfico en 30 días")
        );
    }
}
