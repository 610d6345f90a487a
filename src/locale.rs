//! Label lookup, date and severity formatting.
//!
//! Every user-visible label goes through a [`LanguageTable`]. The built-in
//! [`Catalog`] ships English and Portuguese; further languages are added by
//! loading or merging another catalog, never by code changes.

use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::HashMap;

use crate::error::ReportError;

pub const DEFAULT_LANGUAGE: &str = "en";
const ISO_DATE: &str = "%Y-%m-%d";
const SEVERITY_CODES: [&str; 4] = ["SEV-1", "SEV-2", "SEV-3", "SEV-4"];

pub trait LanguageTable: Send + Sync {
    fn lookup(&self, lang: &str, key: &str) -> Option<&str>;

    /// chrono format string used for dates in `lang`.
    fn date_format(&self, _lang: &str) -> Option<&str> {
        None
    }
}

/// Label for `key` in `lang`, or the key itself when either is missing.
pub fn resolve(table: &dyn LanguageTable, lang: &str, key: &str) -> String {
    table.lookup(lang, key).unwrap_or(key).to_string()
}

/// Render an ISO `YYYY-MM-DD` date in the language's date pattern. Input
/// that does not parse is returned unchanged.
pub fn format_date(table: &dyn LanguageTable, iso_date: &str, lang: &str) -> String {
    let Ok(date) = NaiveDate::parse_from_str(iso_date.trim(), ISO_DATE) else {
        return iso_date.to_string();
    };
    let pattern = table.date_format(lang).unwrap_or(ISO_DATE);
    date.format(pattern).to_string()
}

/// `"SEV-1"` becomes `"SEV-1 (Critical)"` (or the language's label).
/// Unknown codes come back normalized but otherwise untouched.
pub fn format_severity(table: &dyn LanguageTable, code: &str, lang: &str) -> String {
    let code = code.trim().to_uppercase();
    if !SEVERITY_CODES.contains(&code.as_str()) {
        return code;
    }
    let key = format!("severity.{code}");
    let label = table
        .lookup(lang, &key)
        .or_else(|| table.lookup(DEFAULT_LANGUAGE, &key));
    match label {
        Some(label) => format!("{code} ({label})"),
        None => code,
    }
}

/// A language table bound to one language, used while composing a document.
#[derive(Clone, Copy)]
pub struct Localizer<'a> {
    table: &'a dyn LanguageTable,
    lang: &'a str,
}

impl<'a> Localizer<'a> {
    pub fn new(table: &'a dyn LanguageTable, lang: &'a str) -> Self {
        Self { table, lang }
    }

    pub fn lang(&self) -> &str {
        self.lang
    }

    pub fn t(&self, key: &str) -> String {
        resolve(self.table, self.lang, key)
    }

    pub fn date(&self, iso_date: &str) -> String {
        format_date(self.table, iso_date, self.lang)
    }

    pub fn severity(&self, code: &str) -> String {
        format_severity(self.table, code, self.lang)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LanguagePack {
    #[serde(default)]
    pub date_format: Option<String>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

/// In-memory language table keyed by language code.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Catalog {
    #[serde(flatten)]
    languages: HashMap<String, LanguagePack>,
}

impl Catalog {
    pub fn empty() -> Self {
        Self::default()
    }

    /// English and Portuguese labels for every key the composer uses.
    pub fn builtin() -> Self {
        let mut catalog = Self::default();
        catalog.insert_pack("en", Some(ISO_DATE), EN_LABELS);
        catalog.insert_pack("pt", Some("%d/%m/%Y"), PT_LABELS);
        catalog
    }

    /// Parse a catalog shaped as
    /// `{"<lang>": {"date_format": "...", "labels": {"<key>": "<text>"}}}`.
    pub fn from_json(json: &str) -> Result<Self, ReportError> {
        let catalog: Catalog = serde_json::from_str(json)
            .map_err(|e| ReportError::InvalidLanguageTable(e.to_string()))?;
        for (lang, pack) in &catalog.languages {
            if let Some(pattern) = pack.date_format.as_deref() {
                validate_date_format(lang, pattern)?;
            }
        }
        Ok(catalog)
    }

    /// Overlay `other` on top of this catalog. Labels from `other` win.
    pub fn merge(&mut self, other: Catalog) {
        for (lang, pack) in other.languages {
            let entry = self.languages.entry(lang).or_default();
            if pack.date_format.is_some() {
                entry.date_format = pack.date_format;
            }
            entry.labels.extend(pack.labels);
        }
    }

    pub fn languages(&self) -> impl Iterator<Item = &str> {
        self.languages.keys().map(String::as_str)
    }

    fn insert_pack(&mut self, lang: &str, date_format: Option<&str>, labels: &[(&str, &str)]) {
        let pack = LanguagePack {
            date_format: date_format.map(str::to_string),
            labels: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        };
        self.languages.insert(lang.to_string(), pack);
    }
}

impl LanguageTable for Catalog {
    fn lookup(&self, lang: &str, key: &str) -> Option<&str> {
        self.languages
            .get(lang)?
            .labels
            .get(key)
            .map(String::as_str)
            .filter(|label| !label.is_empty())
    }

    fn date_format(&self, lang: &str) -> Option<&str> {
        self.languages.get(lang)?.date_format.as_deref()
    }
}

fn validate_date_format(lang: &str, pattern: &str) -> Result<(), ReportError> {
    use chrono::format::{Item, StrftimeItems};
    if StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error)) {
        return Err(ReportError::InvalidLanguageTable(format!(
            "date_format for '{lang}' is not a valid strftime pattern: {pattern}"
        )));
    }
    Ok(())
}

const EN_LABELS: &[(&str, &str)] = &[
    ("Post-Incident Report", "Post-Incident Report"),
    ("Severity", "Severity"),
    ("Creator", "Creator"),
    ("Incident Overview", "Incident Overview"),
    ("Date (start)", "Date (start)"),
    ("Duration", "Duration"),
    ("Start", "Start"),
    ("End", "End"),
    ("Owners:", "Owners:"),
    ("Executive Summary", "Executive Summary"),
    ("Customer Impact", "Customer Impact"),
    (
        "This report documents the incident occurrence, impact, response, and continuous improvement actions.",
        "This report documents the incident occurrence, impact, response, and continuous improvement actions.",
    ),
    ("Incident Details", "Incident Details"),
    ("Affected Systems:", "Affected Systems:"),
    ("Technical Problems", "Technical Problems"),
    ("Root Cause", "Root Cause"),
    ("Detection", "Detection"),
    ("Incident Response", "Incident Response"),
    ("Communications", "Communications"),
    ("Timeline", "Timeline"),
    ("Actor:", "Actor:"),
    ("Notes:", "Notes:"),
    ("Corrective & Preventive Actions (CAPA)", "Corrective & Preventive Actions (CAPA)"),
    ("Action", "Action"),
    ("Owner", "Owner"),
    ("Priority", "Priority"),
    ("Due", "Due"),
    ("Due Date", "Due Date"),
    ("Status", "Status"),
    ("No actions recorded.", "No actions recorded."),
    ("Lessons Learned", "Lessons Learned"),
    ("What went well:", "What went well:"),
    ("What to improve:", "What to improve:"),
    ("Appendix", "Appendix"),
    ("References & Links", "References & Links"),
    ("Page", "Page"),
    ("severity.SEV-1", "Critical"),
    ("severity.SEV-2", "High"),
    ("severity.SEV-3", "Moderate"),
    ("severity.SEV-4", "Low"),
];

const PT_LABELS: &[(&str, &str)] = &[
    ("Post-Incident Report", "Relatório Pós-Incidente"),
    ("Severity", "Gravidade"),
    ("Creator", "Criador"),
    ("Incident Overview", "Visão Geral do Incidente"),
    ("Date (start)", "Data (início)"),
    ("Duration", "Duração"),
    ("Start", "Início"),
    ("End", "Fim"),
    ("Owners:", "Responsáveis:"),
    ("Executive Summary", "Sumário Executivo"),
    ("Customer Impact", "Impacto no Cliente"),
    (
        "This report documents the incident occurrence, impact, response, and continuous improvement actions.",
        "Este relatório documenta a ocorrência do incidente, o impacto, a resposta e as ações de melhoria contínua.",
    ),
    ("Incident Details", "Detalhes do Incidente"),
    ("Affected Systems:", "Sistemas Afetados:"),
    ("Technical Problems", "Problemas Técnicos"),
    ("Root Cause", "Causa Raiz"),
    ("Detection", "Detecção"),
    ("Incident Response", "Resposta ao Incidente"),
    ("Communications", "Comunicações"),
    ("Timeline", "Linha do Tempo"),
    ("Actor:", "Ator:"),
    ("Notes:", "Notas:"),
    ("Corrective & Preventive Actions (CAPA)", "Ações Corretivas e Preventivas (CAPA)"),
    ("Action", "Ação"),
    ("Owner", "Dono"),
    ("Priority", "Prioridade"),
    ("Due", "Prazo"),
    ("Due Date", "Prazo"),
    ("Status", "Status"),
    ("No actions recorded.", "Nenhuma ação registrada."),
    ("Lessons Learned", "Lições Aprendidas"),
    ("What went well:", "O que foi bem:"),
    ("What to improve:", "O que melhorar:"),
    ("Appendix", "Apêndice"),
    ("References & Links", "Referências e Links"),
    ("Page", "Página"),
    ("severity.SEV-1", "Crítico"),
    ("severity.SEV-2", "Alto"),
    ("severity.SEV-3", "Moderado"),
    ("severity.SEV-4", "Baixo"),
];
