//! Symptom selection for one diagnostic session.

use std::collections::HashSet;
use std::sync::Arc;

use crate::catalog::Catalog;
use crate::error::{SessionError, SessionResult};
use crate::model::SymptomId;

/// The set of currently selected symptoms.
///
/// Every member is in the catalog the state was created with. Storage is
/// unordered; [`SessionState::selected`] reports in catalog order.
#[derive(Debug, Clone)]
pub struct SessionState {
    catalog: Arc<Catalog>,
    selected: HashSet<SymptomId>,
}

impl SessionState {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            catalog,
            selected: HashSet::new(),
        }
    }

    /// Add `id` if absent, remove it if present. Returns whether it is now
    /// selected.
    pub fn toggle(&mut self, id: &SymptomId) -> SessionResult<bool> {
        if !self.catalog.contains(id) {
            tracing::warn!(symptom = %id, "toggle of a symptom outside the catalog ignored");
            return Err(SessionError::UnknownSymptom { id: id.to_string() });
        }
        if self.selected.remove(id) {
            Ok(false)
        } else {
            self.selected.insert(id.clone());
            Ok(true)
        }
    }

    pub fn reset(&mut self) {
        self.selected.clear();
    }

    pub fn count(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn is_selected(&self, id: &SymptomId) -> bool {
        self.selected.contains(id)
    }

    /// Snapshot of the selection in catalog order.
    pub fn selected(&self) -> Vec<SymptomId> {
        self.catalog
            .symptoms()
            .iter()
            .filter(|id| self.selected.contains(*id))
            .cloned()
            .collect()
    }
}
