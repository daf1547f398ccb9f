//! Reference rule base: CSV-backed forward chaining and backward verification.
//!
//! This is the in-process engine behind [`EngineBridge::Local`] and the
//! `artdocd` server. Sessions never touch it directly; they go through
//! [`EngineClient`].
//!
//! ## File format
//!
//! ```text
//! rule_id,conditions,conclusion,precautions
//! R1,fever;cough,flu,Rest and hydrate
//! ```
//!
//! Cells are whitespace-trimmed; `conditions` is `;`-separated. A conclusion
//! may appear as another rule's condition, which makes it an intermediate fact
//! rather than an observable symptom.
//!
//! [`EngineBridge::Local`]: crate::client::EngineBridge::Local
//! [`EngineClient`]: crate::client::EngineClient

use std::collections::{BTreeSet, HashSet};
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{KnowledgeBaseError, KnowledgeBaseResult};
use crate::model::{ConclusionId, FiredRule, SymptomId, VerificationResult};

const COLUMNS: [&str; 4] = ["rule_id", "conditions", "conclusion", "precautions"];

/// A single production rule: all `conditions` imply `conclusion`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub rule_id: String,
    pub conditions: Vec<String>,
    pub conclusion: String,
    pub precautions: Option<String>,
}

impl Rule {
    pub fn to_fired(&self) -> FiredRule {
        FiredRule {
            rule_id: self.rule_id.clone(),
            conditions: self.conditions.iter().map(|c| SymptomId::new(c.as_str())).collect(),
            conclusion: ConclusionId::from(self.conclusion.as_str()),
            precautions: self.precautions.clone(),
        }
    }
}

/// Result of running forward chaining to its fixpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForwardChain {
    /// Rules in firing order.
    pub fired_rules: Vec<FiredRule>,
    /// Input symptoms plus every derived conclusion, sorted.
    pub known_facts: Vec<String>,
}

/// Ordered collection of rules loaded from a CSV file.
#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    rules: Vec<Rule>,
}

impl KnowledgeBase {
    /// Load rules from a CSV file.
    pub fn load(path: &Path) -> KnowledgeBaseResult<Self> {
        let file = std::fs::File::open(path).map_err(|e| KnowledgeBaseError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        let kb = Self::from_reader(file)?;
        tracing::info!(path = %path.display(), rules = kb.rules.len(), "knowledge base loaded");
        Ok(kb)
    }

    /// Parse rules from any CSV source with a header row.
    pub fn from_reader<R: io::Read>(reader: R) -> KnowledgeBaseResult<Self> {
        let mut csv = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = csv
            .headers()
            .map_err(|e| KnowledgeBaseError::Parse {
                row: 1,
                message: e.to_string(),
            })?
            .clone();

        let mut idx = [0usize; 4];
        for (slot, column) in idx.iter_mut().zip(COLUMNS) {
            *slot = headers
                .iter()
                .position(|h| h == column)
                .ok_or_else(|| KnowledgeBaseError::MissingColumn {
                    column: column.to_string(),
                })?;
        }
        let [id_col, cond_col, concl_col, prec_col] = idx;

        let mut rules = Vec::new();
        for (i, record) in csv.records().enumerate() {
            // Header is row 1.
            let row = i + 2;
            let record = record.map_err(|e| KnowledgeBaseError::Parse {
                row,
                message: e.to_string(),
            })?;
            if record.iter().all(str::is_empty) {
                continue;
            }

            let cell = |col: usize| record.get(col).unwrap_or("");
            let rule_id = cell(id_col);
            let conclusion = cell(concl_col);
            if rule_id.is_empty() {
                return Err(KnowledgeBaseError::Parse {
                    row,
                    message: "empty rule_id".into(),
                });
            }
            if conclusion.is_empty() {
                return Err(KnowledgeBaseError::Parse {
                    row,
                    message: format!("rule {rule_id} has no conclusion"),
                });
            }

            let conditions: Vec<String> = cell(cond_col)
                .split(';')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect();
            if conditions.is_empty() {
                return Err(KnowledgeBaseError::Parse {
                    row,
                    message: format!("rule {rule_id} has no conditions"),
                });
            }

            let precautions = Some(cell(prec_col))
                .filter(|p| !p.is_empty())
                .map(str::to_string);

            rules.push(Rule {
                rule_id: rule_id.to_string(),
                conditions,
                conclusion: conclusion.to_string(),
                precautions,
            });
        }

        if rules.is_empty() {
            return Err(KnowledgeBaseError::Empty);
        }
        Ok(Self { rules })
    }

    pub fn from_rules(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Conditions that no rule concludes, sorted.
    pub fn observable_symptoms(&self) -> Vec<SymptomId> {
        let conclusions: HashSet<&str> = self.rules.iter().map(|r| r.conclusion.as_str()).collect();
        self.rules
            .iter()
            .flat_map(|r| r.conditions.iter())
            .map(String::as_str)
            .filter(|c| !conclusions.contains(c))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(SymptomId::from)
            .collect()
    }

    /// Every rule conclusion, sorted.
    pub fn conclusions(&self) -> Vec<ConclusionId> {
        self.rules
            .iter()
            .map(|r| r.conclusion.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(ConclusionId::from)
            .collect()
    }

    /// Forward-chain from `symptoms` until a pass derives no new fact.
    ///
    /// Rules are scanned in file order and each fires at most once. A rule
    /// whose conditions hold fires even when its conclusion is already known.
    pub fn forward_chain(&self, symptoms: &[SymptomId]) -> ForwardChain {
        let mut known: HashSet<String> = symptoms.iter().map(|s| s.to_string()).collect();
        let mut fired = vec![false; self.rules.len()];
        let mut order = Vec::new();

        loop {
            let mut derived_new = false;
            for (i, rule) in self.rules.iter().enumerate() {
                if fired[i] {
                    continue;
                }
                if rule.conditions.iter().all(|c| known.contains(c)) {
                    if known.insert(rule.conclusion.clone()) {
                        derived_new = true;
                    }
                    fired[i] = true;
                    order.push(i);
                }
            }
            if !derived_new {
                break;
            }
        }

        tracing::debug!(fired = order.len(), facts = known.len(), "forward chaining done");

        let mut known_facts: Vec<String> = known.into_iter().collect();
        known_facts.sort();
        ForwardChain {
            fired_rules: order.into_iter().map(|i| self.rules[i].to_fired()).collect(),
            known_facts,
        }
    }

    /// Try to prove `target` from `symptoms`, recording every step.
    pub fn backward_verify(&self, target: &ConclusionId, symptoms: &[SymptomId]) -> VerificationResult {
        let mut prover = Prover {
            rules: &self.rules,
            known: symptoms.iter().map(|s| s.to_string()).collect(),
            stack: Vec::new(),
            trace: Vec::new(),
        };
        let success = prover.prove(target.as_str(), 0);
        tracing::debug!(%target, success, steps = prover.trace.len(), "backward verification done");
        VerificationResult {
            success,
            trace: prover.trace,
        }
    }
}

/// Depth-first goal prover for [`KnowledgeBase::backward_verify`].
struct Prover<'a> {
    rules: &'a [Rule],
    known: HashSet<String>,
    /// Goals currently being proven, to stop on circular rules.
    stack: Vec<String>,
    trace: Vec<String>,
}

impl Prover<'_> {
    fn log(&mut self, depth: usize, line: String) {
        self.trace.push(format!("{}{line}", "    ".repeat(depth)));
    }

    fn prove(&mut self, goal: &str, depth: usize) -> bool {
        if self.known.contains(goal) {
            self.log(depth, format!("[OK] Fact '{goal}' detected."));
            return true;
        }
        if self.stack.iter().any(|g| g == goal) {
            self.log(depth, format!("[CYCLE] '{goal}' depends on itself."));
            return false;
        }

        let rules = self.rules;
        let candidates: Vec<&Rule> = rules.iter().filter(|r| r.conclusion == goal).collect();
        if candidates.is_empty() {
            self.log(depth, format!("[MISSING] '{goal}' not found in symptoms."));
            return false;
        }

        self.stack.push(goal.to_string());
        for rule in candidates {
            self.log(depth, format!("Checking Rule {} for '{goal}'...", rule.rule_id));
            let holds = rule.conditions.iter().all(|c| self.prove(c, depth + 1));
            if holds {
                self.log(
                    depth,
                    format!("[SUCCESS] Rule {} fired. '{goal}' confirmed.", rule.rule_id),
                );
                self.known.insert(goal.to_string());
                self.stack.pop();
                return true;
            }
        }
        self.stack.pop();

        self.log(depth, format!("[FAIL] Could not establish '{goal}'."));
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
rule_id, conditions, conclusion, precautions
R1, fever;cough, flu, Rest and hydrate
R2, flu;body_ache, severe_flu, See a doctor
R3, headache;stiff_neck, meningitis_risk,
";

    fn kb() -> KnowledgeBase {
        KnowledgeBase::from_reader(SAMPLE.as_bytes()).unwrap()
    }

    fn ids(names: &[&str]) -> Vec<SymptomId> {
        names.iter().map(|n| SymptomId::from(*n)).collect()
    }

    #[test]
    fn parses_trimmed_cells() {
        let kb = kb();
        assert_eq!(kb.rules().len(), 3);
        let r1 = &kb.rules()[0];
        assert_eq!(r1.rule_id, "R1");
        assert_eq!(r1.conditions, ["fever", "cough"]);
        assert_eq!(r1.precautions.as_deref(), Some("Rest and hydrate"));
        assert_eq!(kb.rules()[2].precautions, None);
    }

    #[test]
    fn observable_symptoms_exclude_intermediate_conclusions() {
        let names: Vec<String> = kb().observable_symptoms().iter().map(|s| s.to_string()).collect();
        assert_eq!(names, ["body_ache", "cough", "fever", "headache", "stiff_neck"]);
    }

    #[test]
    fn conclusions_are_sorted_and_unique() {
        let names: Vec<String> = kb().conclusions().iter().map(|c| c.to_string()).collect();
        assert_eq!(names, ["flu", "meningitis_risk", "severe_flu"]);
    }

    #[test]
    fn forward_chaining_reaches_fixpoint_in_rule_order() {
        let outcome = kb().forward_chain(&ids(&["body_ache", "fever", "cough"]));
        let fired: Vec<&str> = outcome.fired_rules.iter().map(|r| r.rule_id.as_str()).collect();
        assert_eq!(fired, ["R1", "R2"]);
        assert!(outcome.known_facts.contains(&"severe_flu".to_string()));
    }

    #[test]
    fn forward_chaining_without_match_fires_nothing() {
        let outcome = kb().forward_chain(&ids(&["fever"]));
        assert!(outcome.fired_rules.is_empty());
        assert_eq!(outcome.known_facts, ["fever"]);
    }

    #[test]
    fn backward_verification_confirms_nested_goal() {
        let result = kb().backward_verify(&"severe_flu".into(), &ids(&["fever", "cough", "body_ache"]));
        assert!(result.success);
        assert_eq!(
            result.trace,
            [
                "Checking Rule R2 for 'severe_flu'...",
                "    Checking Rule R1 for 'flu'...",
                "        [OK] Fact 'fever' detected.",
                "        [OK] Fact 'cough' detected.",
                "    [SUCCESS] Rule R1 fired. 'flu' confirmed.",
                "    [OK] Fact 'body_ache' detected.",
                "[SUCCESS] Rule R2 fired. 'severe_flu' confirmed.",
            ]
        );
    }

    #[test]
    fn backward_verification_reports_missing_fact() {
        let result = kb().backward_verify(&"flu".into(), &ids(&["fever"]));
        assert!(!result.success);
        assert_eq!(
            result.trace,
            [
                "Checking Rule R1 for 'flu'...",
                "    [OK] Fact 'fever' detected.",
                "    [MISSING] 'cough' not found in symptoms.",
                "[FAIL] Could not establish 'flu'.",
            ]
        );
    }

    #[test]
    fn circular_rules_terminate() {
        let kb = KnowledgeBase::from_rules(vec![
            Rule {
                rule_id: "A".into(),
                conditions: vec!["b".into()],
                conclusion: "a".into(),
                precautions: None,
            },
            Rule {
                rule_id: "B".into(),
                conditions: vec!["a".into()],
                conclusion: "b".into(),
                precautions: None,
            },
        ]);
        let result = kb.backward_verify(&"a".into(), &[]);
        assert!(!result.success);
        assert!(result.trace.iter().any(|l| l.contains("[CYCLE] 'a'")));
    }

    #[test]
    fn missing_column_is_reported() {
        let err = KnowledgeBase::from_reader("rule_id,conditions,conclusion\nR1,a,b\n".as_bytes())
            .unwrap_err();
        assert!(matches!(err, KnowledgeBaseError::MissingColumn { ref column } if column == "precautions"));
    }

    #[test]
    fn rule_without_conditions_is_rejected() {
        let err = KnowledgeBase::from_reader(
            "rule_id,conditions,conclusion,precautions\nR1, ,flu,\n".as_bytes(),
        )
        .unwrap_err();
        assert!(matches!(err, KnowledgeBaseError::Parse { row: 2, .. }));
    }

    #[test]
    fn header_only_file_is_empty() {
        let err = KnowledgeBase::from_reader("rule_id,conditions,conclusion,precautions\n".as_bytes())
            .unwrap_err();
        assert!(matches!(err, KnowledgeBaseError::Empty));
    }
}
