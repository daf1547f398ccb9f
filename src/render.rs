//! Result rendering: turns analysis results into terminal text or JSON.
//!
//! Sinks mirror each other: `TextSink` for interactive use, `JsonSink` for
//! scripting (newline-delimited JSON), `VecSink` for tests. Display-name
//! formatting of identifiers lives here, never in the session controller.

use std::sync::{Mutex, PoisonError};

use serde::Serialize;

use crate::model::{AnalysisResult, ConclusionId, DiagnosisResult, SymptomId, VerificationResult};

// ── Display names ───────────────────────────────────────────────────────

/// `sore_throat` → `Sore Throat`.
pub fn display_name(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    let mut at_word_start = true;
    for ch in id.chars() {
        let ch = if ch == '_' { ' ' } else { ch };
        if at_word_start && ch.is_alphanumeric() {
            out.extend(ch.to_uppercase());
        } else {
            out.push(ch);
        }
        at_word_start = !ch.is_alphanumeric();
    }
    out
}

/// Symptoms whose display name contains `query`, case-insensitively, in
/// catalog order. An empty query matches everything.
pub fn filter_symptoms<'a>(symptoms: &'a [SymptomId], query: &str) -> Vec<&'a SymptomId> {
    let query = query.trim().to_lowercase();
    symptoms
        .iter()
        .filter(|id| display_name(id.as_str()).to_lowercase().contains(&query))
        .collect()
}

// ── Text layout ─────────────────────────────────────────────────────────

pub fn diagnosis_lines(result: &DiagnosisResult) -> Vec<String> {
    if result.is_empty() {
        return vec!["No specific diagnosis found for these symptoms.".into()];
    }

    let mut lines = vec!["Diagnostic Trace".to_string()];
    for rule in &result.fired_rules {
        let matched: Vec<&str> = rule.conditions.iter().map(SymptomId::as_str).collect();
        lines.push(format!(
            "  Rule {} fired: Matched {} -> Discovered: {}",
            rule.rule_id,
            matched.join(", "),
            rule.conclusion
        ));
    }
    for rule in result.reports() {
        lines.push(format!("Report: {}", rule.conclusion));
        if let Some(advice) = &rule.precautions {
            lines.push(format!("  Treatment & Advice: {advice}"));
        }
    }
    lines
}

pub fn verification_lines(target: &ConclusionId, result: &VerificationResult) -> Vec<String> {
    let verdict = if result.success {
        "CONFIRMED"
    } else {
        "NOT SUPPORTED"
    };
    let mut lines = vec![
        format!("Hypothesis for {target}: {verdict}"),
        "Verification Logic Trace:".to_string(),
    ];
    lines.extend(result.trace.iter().map(|step| format!("  {step}")));
    lines
}

pub fn result_lines(result: &AnalysisResult) -> Vec<String> {
    match result {
        AnalysisResult::Diagnosis(d) => diagnosis_lines(d),
        AnalysisResult::Verification { target, result } => verification_lines(target, result),
    }
}

// ── ResultSink trait ────────────────────────────────────────────────────

/// A destination for analysis results and user-facing notices.
pub trait ResultSink: Send + Sync {
    fn emit(&self, result: &AnalysisResult);

    /// Short status line (e.g. "3 selected", "Session reset successfully.").
    fn notice(&self, text: &str);

    /// Shell prompt, if this sink's output is meant for a person.
    fn prompt(&self) -> Option<&str> {
        None
    }
}

// ── TextSink ────────────────────────────────────────────────────────────

/// Renders results as plain terminal text.
pub struct TextSink;

impl ResultSink for TextSink {
    fn emit(&self, result: &AnalysisResult) {
        for line in result_lines(result) {
            println!("{line}");
        }
    }

    fn notice(&self, text: &str) {
        println!("{text}");
    }

    fn prompt(&self) -> Option<&str> {
        Some("artdoc> ")
    }
}

// ── JsonSink ────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct Notice<'a> {
    kind: &'static str,
    text: &'a str,
}

/// Emits newline-delimited JSON.
pub struct JsonSink;

impl ResultSink for JsonSink {
    fn emit(&self, result: &AnalysisResult) {
        if let Ok(json) = serde_json::to_string(result) {
            println!("{json}");
        }
    }

    fn notice(&self, text: &str) {
        if let Ok(json) = serde_json::to_string(&Notice { kind: "notice", text }) {
            println!("{json}");
        }
    }
}

// ── VecSink ─────────────────────────────────────────────────────────────

/// Collects results and notices in memory for testing.
#[derive(Default)]
pub struct VecSink {
    results: Mutex<Vec<AnalysisResult>>,
    notices: Mutex<Vec<String>>,
}

impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn results(&self) -> Vec<AnalysisResult> {
        self.results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn notices(&self) -> Vec<String> {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ResultSink for VecSink {
    fn emit(&self, result: &AnalysisResult) {
        self.results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(result.clone());
    }

    fn notice(&self, text: &str) {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(text.to_string());
    }
}
