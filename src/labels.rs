//! Label vocabulary used to locate report fields in OCR text.
//!
//! A [`LabelAliasTable`] maps each [`Field`] to the ordered list of headings
//! that introduce it in a report. The built-in table is Spanish; callers that
//! process reports in another language build their own with
//! [`LabelAliasTable::new`].
//!
//! The table is constructed once, shared behind an `Arc`, and never mutated.
//! Every alias pre-compiles the two patterns the field scanner needs, so the
//! hot loop never touches the regex compiler.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ExtractError;

/// The five report fields the extractor recovers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Patient,
    Owner,
    Veterinarian,
    Diagnosis,
    Recommendations,
}

impl Field {
    /// All fields in scan order.
    pub const ALL: [Field; 5] = [
        Field::Patient,
        Field::Owner,
        Field::Veterinarian,
        Field::Diagnosis,
        Field::Recommendations,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Field::Patient => "patient",
            Field::Owner => "owner",
            Field::Veterinarian => "veterinarian",
            Field::Diagnosis => "diagnosis",
            Field::Recommendations => "recommendations",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Spanish headings, in match-priority order per field.
pub const SPANISH_ALIASES: [(Field, &[&str]); 5] = [
    (
        Field::Patient,
        &["Paciente", "Paciente:", "Nombre paciente", "Nombre"],
    ),
    (
        Field::Owner,
        &["Propietario", "Dueño", "Dueña", "Propietario:"],
    ),
    (
        Field::Veterinarian,
        &["Veterinario", "Médico Veterinario", "Veterinario:", "Profesional"],
    ),
    (
        Field::Diagnosis,
        &["Diagnóstico", "Diagnostico", "Impresión", "Impresión Diagnóstica"],
    ),
    (
        Field::Recommendations,
        &[
            "Recomendaciones",
            "Recomendación",
            "Indicaciones",
            "Tratamiento recomendado",
        ],
    ),
];

/// One accepted heading for a field.
#[derive(Debug, Clone)]
pub struct LabelAlias {
    text: String,
    bare: String,
    word: Regex,
    same_line: Regex,
}

impl LabelAlias {
    /// Compile an alias. A trailing colon is part of the alias text but is
    /// ignored when matching, so `"Paciente:"` and `"Paciente"` find the same
    /// lines.
    pub fn new(text: &str) -> Result<Self, ExtractError> {
        let bare = text.trim_matches(':').to_string();
        let escaped = regex::escape(&bare);
        let word = Regex::new(&format!(r"(?i)\b{escaped}\b"))
            .map_err(|e| ExtractError::InvalidConfig(format!("label '{text}': {e}")))?;
        let same_line = Regex::new(&format!(r"(?i){escaped}\s*[:\-]\s*(.+)"))
            .map_err(|e| ExtractError::InvalidConfig(format!("label '{text}': {e}")))?;
        Ok(Self {
            text: text.to_string(),
            bare,
            word,
            same_line,
        })
    }

    /// The alias exactly as listed in the table.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The alias with surrounding colons removed.
    pub fn bare(&self) -> &str {
        &self.bare
    }

    /// Case-insensitive whole-word occurrence of the alias in `line`.
    pub fn occurs_in(&self, line: &str) -> bool {
        self.word.is_match(line)
    }

    /// Text following `alias [:-]` on the same line, if any.
    pub fn same_line_value<'a>(&self, line: &'a str) -> Option<&'a str> {
        self.same_line
            .captures(line)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
    }
}

/// Field → ordered aliases.
#[derive(Debug, Clone)]
pub struct LabelAliasTable {
    entries: Vec<(Field, Vec<LabelAlias>)>,
}

impl LabelAliasTable {
    /// Build a table from `(field, aliases)` pairs. Field order is preserved
    /// and determines scan order.
    pub fn new<'a, I, A>(entries: I) -> Result<Self, ExtractError>
    where
        I: IntoIterator<Item = (Field, A)>,
        A: IntoIterator<Item = &'a str>,
    {
        let mut out: Vec<(Field, Vec<LabelAlias>)> = Vec::new();
        for (field, aliases) in entries {
            if out.iter().any(|(f, _)| *f == field) {
                return Err(ExtractError::InvalidConfig(format!(
                    "field '{field}' listed twice in label table"
                )));
            }
            let aliases = aliases
                .into_iter()
                .map(LabelAlias::new)
                .collect::<Result<Vec<_>, _>>()?;
            if aliases.is_empty() {
                return Err(ExtractError::InvalidConfig(format!(
                    "field '{field}' has no aliases"
                )));
            }
            out.push((field, aliases));
        }
        Ok(Self { entries: out })
    }

    /// The built-in Spanish vocabulary.
    pub fn spanish() -> Self {
        let entries = SPANISH_ALIASES
            .iter()
            .map(|(field, aliases)| {
                let compiled = aliases
                    .iter()
                    .filter_map(|a| LabelAlias::new(a).ok())
                    .collect();
                (*field, compiled)
            })
            .collect();
        Self { entries }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &[LabelAlias])> {
        self.entries.iter().map(|(f, a)| (*f, a.as_slice()))
    }

    pub fn aliases(&self, field: Field) -> &[LabelAlias] {
        self.entries
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, a)| a.as_slice())
            .unwrap_or(&[])
    }
}

impl Default for LabelAliasTable {
    fn default() -> Self {
        Self::spanish()
    }
}
