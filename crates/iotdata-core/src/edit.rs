// ── Edit guard ──
//
// Tracks in-progress local renames and shields them from being clobbered
// by a concurrent refresh. While a session is open for an ESN: poll
// ingestion is suppressed, push renames for that ESN are dropped, and the
// expand/collapse affordance for that device is inert.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::CoreError;

// ── Per-device view state machine ───────────────────────────────────

/// Disclosure half of the per-device state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Disclosure {
    #[default]
    Collapsed,
    Expanded,
}

/// Edit half of the per-device state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditPhase {
    #[default]
    Idle,
    Editing,
}

/// The product state machine `{Collapsed, Expanded} × {Idle, Editing}`.
///
/// Transitions:
/// - `toggle_disclosure` flips collapsed/expanded, but is inert while
///   editing (an accidental collapse would tear down the rename input).
/// - `begin_edit` / `end_edit` move between Idle and Editing; beginning
///   twice is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PanelState {
    pub disclosure: Disclosure,
    pub edit: EditPhase,
}

impl PanelState {
    pub fn is_editing(self) -> bool {
        self.edit == EditPhase::Editing
    }

    /// Flip disclosure. Returns the resulting state; refuses (returns the
    /// unchanged state) while an edit is in flight.
    pub fn toggle_disclosure(&mut self) -> Disclosure {
        if self.edit == EditPhase::Idle {
            self.disclosure = match self.disclosure {
                Disclosure::Collapsed => Disclosure::Expanded,
                Disclosure::Expanded => Disclosure::Collapsed,
            };
        }
        self.disclosure
    }

    /// Enter Editing. Returns `false` if already editing.
    pub fn begin_edit(&mut self) -> bool {
        if self.edit == EditPhase::Editing {
            return false;
        }
        self.edit = EditPhase::Editing;
        true
    }

    /// Leave Editing.
    pub fn end_edit(&mut self) {
        self.edit = EditPhase::Idle;
    }
}

// ── Edit sessions ───────────────────────────────────────────────────

/// One in-progress rename: the draft text plus when it was opened.
#[derive(Debug, Clone)]
pub struct EditSession {
    pub esn: String,
    pub draft: String,
    pub opened_at: Instant,
}

#[derive(Debug, Default)]
struct PanelEntry {
    state: PanelState,
    session: Option<EditSession>,
}

/// Guard over all per-device edit sessions and view states.
///
/// Invariant: at most one session per ESN, and a session exists exactly
/// when the panel's edit phase is `Editing`.
#[derive(Default)]
pub struct EditGuard {
    panels: Mutex<HashMap<String, PanelEntry>>,
}

impl EditGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a session for `esn` with the draft initialized to the
    /// currently displayed name. Fails if a session is already open.
    pub fn begin(&self, esn: &str, current_name: &str) -> Result<(), CoreError> {
        let mut panels = self.lock();
        let entry = panels.entry(esn.to_owned()).or_default();
        if !entry.state.begin_edit() {
            return Err(CoreError::EditInProgress {
                esn: esn.to_owned(),
            });
        }
        entry.session = Some(EditSession {
            esn: esn.to_owned(),
            draft: current_name.to_owned(),
            opened_at: Instant::now(),
        });
        Ok(())
    }

    /// Replace the draft text for an open session.
    pub fn update(&self, esn: &str, draft: &str) -> Result<(), CoreError> {
        let mut panels = self.lock();
        let session = panels
            .get_mut(esn)
            .and_then(|e| e.session.as_mut())
            .ok_or_else(|| CoreError::NoEditSession {
                esn: esn.to_owned(),
            })?;
        session.draft = draft.to_owned();
        Ok(())
    }

    /// The current draft for `esn`, if a session is open.
    pub fn draft(&self, esn: &str) -> Option<String> {
        self.lock()
            .get(esn)
            .and_then(|e| e.session.as_ref())
            .map(|s| s.draft.clone())
    }

    /// Whether any session is open — the poll-suppression predicate.
    pub fn is_editing(&self) -> bool {
        self.lock().values().any(|e| e.session.is_some())
    }

    /// Whether a session is open for this specific ESN — the push-rename
    /// drop predicate.
    pub fn is_editing_esn(&self, esn: &str) -> bool {
        self.lock().get(esn).is_some_and(|e| e.session.is_some())
    }

    /// Close the session after a successful commit. Only now may
    /// ingestion overwrite the name again.
    pub fn finish(&self, esn: &str) -> Option<EditSession> {
        self.take_session(esn)
    }

    /// Discard the session without any network call.
    pub fn cancel(&self, esn: &str) -> Option<EditSession> {
        self.take_session(esn)
    }

    /// Drop sessions older than `max_age`; returns the affected ESNs.
    /// An abandoned session must not suppress polling forever.
    pub fn expire(&self, max_age: Duration) -> Vec<String> {
        let mut panels = self.lock();
        let mut expired = Vec::new();
        for (esn, entry) in panels.iter_mut() {
            let stale = entry
                .session
                .as_ref()
                .is_some_and(|s| s.opened_at.elapsed() > max_age);
            if stale {
                entry.session = None;
                entry.state.end_edit();
                expired.push(esn.clone());
            }
        }
        expired
    }

    /// Flip a device's expand/collapse state. Inert while that device is
    /// being edited.
    pub fn toggle_disclosure(&self, esn: &str) -> Disclosure {
        let mut panels = self.lock();
        let entry = panels.entry(esn.to_owned()).or_default();
        entry.state.toggle_disclosure()
    }

    /// Current view state for a device.
    pub fn panel_state(&self, esn: &str) -> PanelState {
        self.lock().get(esn).map(|e| e.state).unwrap_or_default()
    }

    fn take_session(&self, esn: &str) -> Option<EditSession> {
        let mut panels = self.lock();
        let entry = panels.get_mut(esn)?;
        let session = entry.session.take();
        if session.is_some() {
            entry.state.end_edit();
        }
        session
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, PanelEntry>> {
        self.panels.lock().expect("edit guard lock poisoned")
    }
}
