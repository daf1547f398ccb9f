//! Diagnostic session controller.
//!
//! A [`DiagnosticSession`] owns the catalog, the symptom selection and the
//! at-most-one-in-flight analysis slot for one user session. It validates
//! preconditions locally, calls the injected [`EngineClient`], and keeps the
//! latest result for the selection that produced it.
//!
//! ```text
//!   Idle ──run_diagnosis / run_verification──▶ Pending ──response──▶ Idle
//!                                                 │
//!                         second call ────────────┴──▶ CallInProgress
//! ```
//!
//! Methods take `&self`, so a session can be shared (e.g. behind an `Arc`)
//! between a UI loop and background tasks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::catalog::Catalog;
use crate::client::EngineClient;
use crate::error::{SessionError, SessionResult};
use crate::model::{AnalysisResult, ConclusionId, DiagnosisResult, SymptomId, VerificationResult};
use crate::session::SessionState;

/// Whether an analysis call is outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Idle,
    Pending,
}

#[derive(Debug)]
struct Inner {
    state: SessionState,
    /// Bumped on every selection change; results computed for an older
    /// generation are returned to the caller but not kept.
    generation: u64,
    last_result: Option<AnalysisResult>,
}

/// Marks the analysis slot as taken; releases it on drop, including when the
/// analysis future is cancelled.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn claim(flag: &'a AtomicBool) -> SessionResult<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| InFlight(flag))
            .map_err(|_| SessionError::CallInProgress)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// One interactive diagnostic session against an inference engine.
pub struct DiagnosticSession<E> {
    engine: E,
    catalog: Arc<Catalog>,
    inner: Mutex<Inner>,
    in_flight: AtomicBool,
}

impl<E: EngineClient> DiagnosticSession<E> {
    /// Load the catalog from `engine` and open an empty session.
    ///
    /// Fails if the symptom catalog cannot be fetched. A missing conclusion
    /// catalog only disables verification.
    pub async fn start(engine: E) -> SessionResult<Self> {
        let catalog = Catalog::load(&engine).await?;
        tracing::info!(
            symptoms = catalog.symptoms().len(),
            verification = catalog.conclusions().is_ok(),
            "diagnostic session started"
        );
        Ok(Self::with_catalog(engine, catalog))
    }

    /// Open a session over an already-loaded catalog.
    pub fn with_catalog(engine: E, catalog: Catalog) -> Self {
        let catalog = Arc::new(catalog);
        Self {
            engine,
            inner: Mutex::new(Inner {
                state: SessionState::new(Arc::clone(&catalog)),
                generation: 0,
                last_result: None,
            }),
            catalog,
            in_flight: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    // -----------------------------------------------------------------------
    // Selection
    // -----------------------------------------------------------------------

    /// Flip membership of `id`. Returns whether it is now selected.
    pub fn toggle(&self, id: &SymptomId) -> SessionResult<bool> {
        let mut inner = self.lock();
        let now_selected = inner.state.toggle(id)?;
        inner.generation += 1;
        inner.last_result = None;
        Ok(now_selected)
    }

    /// Clear the selection and any displayed result.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.state.reset();
        inner.generation += 1;
        inner.last_result = None;
        tracing::debug!("session reset");
    }

    pub fn count(&self) -> usize {
        self.lock().state.count()
    }

    pub fn is_selected(&self, id: &SymptomId) -> bool {
        self.lock().state.is_selected(id)
    }

    /// Selected symptoms in catalog order.
    pub fn selected(&self) -> Vec<SymptomId> {
        self.lock().state.selected()
    }

    pub fn status(&self) -> SessionStatus {
        if self.in_flight.load(Ordering::Acquire) {
            SessionStatus::Pending
        } else {
            SessionStatus::Idle
        }
    }

    /// Result of the last successful analysis for the current selection.
    pub fn last_result(&self) -> Option<AnalysisResult> {
        self.lock().last_result.clone()
    }

    // -----------------------------------------------------------------------
    // Analyses
    // -----------------------------------------------------------------------

    /// Snapshot the selection for a call.
    fn snapshot(&self) -> SessionResult<(Vec<SymptomId>, u64)> {
        let inner = self.lock();
        if inner.state.is_empty() {
            return Err(SessionError::EmptySelection);
        }
        Ok((inner.state.selected(), inner.generation))
    }

    /// Take the analysis slot and drop the result being replaced.
    fn begin(&self) -> SessionResult<InFlight<'_>> {
        let slot = InFlight::claim(&self.in_flight)?;
        self.lock().last_result = None;
        Ok(slot)
    }

    fn finish(&self, generation: u64, result: AnalysisResult) {
        let mut inner = self.lock();
        if inner.generation == generation {
            inner.last_result = Some(result);
        } else {
            tracing::debug!("selection changed during analysis; result not kept");
        }
    }

    /// Forward chaining over the current selection.
    pub async fn run_diagnosis(&self) -> SessionResult<DiagnosisResult> {
        let (symptoms, generation) = self.snapshot()?;
        let _slot = self.begin()?;

        tracing::debug!(symptoms = symptoms.len(), "running diagnosis");
        let result = self.engine.run_diagnosis(&symptoms).await?;
        tracing::info!(fired = result.fired_rules.len(), "diagnosis complete");

        self.finish(generation, AnalysisResult::Diagnosis(result.clone()));
        Ok(result)
    }

    /// Backward verification of `target` against the current selection.
    pub async fn run_verification(&self, target: &ConclusionId) -> SessionResult<VerificationResult> {
        if target.is_empty() {
            return Err(SessionError::NoTargetSelected);
        }
        let (symptoms, generation) = self.snapshot()?;
        self.catalog.conclusions()?;
        let _slot = self.begin()?;

        tracing::debug!(%target, symptoms = symptoms.len(), "running verification");
        let result = self.engine.run_verification(target, &symptoms).await?;
        tracing::info!(%target, success = result.success, "verification complete");

        self.finish(
            generation,
            AnalysisResult::Verification {
                target: target.clone(),
                result: result.clone(),
            },
        );
        Ok(result)
    }
}
