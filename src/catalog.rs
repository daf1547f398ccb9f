//! Catalog of known symptoms and conclusions, fetched once per session.
//!
//! The symptom listing is required: a session cannot start without it. The
//! conclusion listing is best-effort; if it fails the session still allows
//! symptom selection and diagnosis, but verification is refused.

use std::collections::HashSet;

use crate::client::EngineClient;
use crate::error::{SessionError, SessionResult};
use crate::model::{ConclusionId, SymptomId};

#[derive(Debug, Clone)]
enum Conclusions {
    Loaded(Vec<ConclusionId>),
    Unavailable(String),
}

/// Read-only snapshot of the engine's catalog.
#[derive(Debug, Clone)]
pub struct Catalog {
    symptoms: Vec<SymptomId>,
    known: HashSet<SymptomId>,
    conclusions: Conclusions,
}

impl Catalog {
    /// Build a catalog from already-fetched listings.
    ///
    /// Duplicate symptom ids keep their first position.
    pub fn new(symptoms: Vec<SymptomId>, conclusions: Vec<ConclusionId>) -> Self {
        let mut catalog = Self::with_symptoms(symptoms);
        catalog.conclusions = Conclusions::Loaded(conclusions);
        catalog
    }

    fn with_symptoms(listing: Vec<SymptomId>) -> Self {
        let mut known = HashSet::with_capacity(listing.len());
        let mut symptoms = Vec::with_capacity(listing.len());
        for id in listing {
            if known.insert(id.clone()) {
                symptoms.push(id);
            } else {
                tracing::warn!(symptom = %id, "duplicate symptom in engine catalog");
            }
        }
        Self {
            symptoms,
            known,
            conclusions: Conclusions::Unavailable("not loaded".into()),
        }
    }

    /// Fetch both listings from the engine.
    ///
    /// Fails only when the symptom listing cannot be fetched.
    pub async fn load<E: EngineClient>(engine: &E) -> SessionResult<Self> {
        let symptoms = engine.list_symptoms().await.map_err(SessionError::from)?;
        let mut catalog = Self::with_symptoms(symptoms);

        catalog.conclusions = match engine.list_conclusions().await {
            Ok(list) => Conclusions::Loaded(list),
            Err(e) => {
                tracing::warn!(error = %e, "conclusion catalog unavailable; verification disabled");
                Conclusions::Unavailable(e.to_string())
            }
        };

        tracing::debug!(
            symptoms = catalog.symptoms.len(),
            conclusions = catalog.conclusions().map(<[_]>::len).unwrap_or(0),
            "catalog loaded"
        );
        Ok(catalog)
    }

    /// Symptoms in catalog order.
    pub fn symptoms(&self) -> &[SymptomId] {
        &self.symptoms
    }

    pub fn contains(&self, id: &SymptomId) -> bool {
        self.known.contains(id)
    }

    /// Conclusions in catalog order, or why they are missing.
    pub fn conclusions(&self) -> Result<&[ConclusionId], SessionError> {
        match &self.conclusions {
            Conclusions::Loaded(list) => Ok(list),
            Conclusions::Unavailable(message) => Err(SessionError::ConclusionsUnavailable {
                message: message.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_keep_first_position() {
        let catalog = Catalog::new(
            vec!["fever".into(), "cough".into(), "fever".into()],
            vec!["flu".into()],
        );
        assert_eq!(catalog.symptoms(), [SymptomId::from("fever"), SymptomId::from("cough")]);
        assert!(catalog.contains(&"cough".into()));
        assert!(!catalog.contains(&"rash".into()));
    }

    #[test]
    fn symptoms_only_catalog_reports_missing_conclusions() {
        let catalog = Catalog::with_symptoms(vec!["fever".into()]);
        assert!(matches!(
            catalog.conclusions(),
            Err(SessionError::ConclusionsUnavailable { .. })
        ));
    }
}
