//! Focus selection.
//!
//! A source may focus on one other participant, shown large (or across the
//! whole composite with `focus_full`). The reference is weak: destroying
//! the target leaves the focus unresolvable rather than dangling.

use std::sync::{Arc, Weak};

use crate::layout::View;
use crate::source::{Source, SourceShared};

#[derive(Debug, Clone)]
pub(crate) struct FocusRef {
    pidx: u32,
    target: Weak<SourceShared>,
}

impl FocusRef {
    fn new(target: &Arc<SourceShared>) -> Self {
        Self {
            pidx: target.pidx,
            target: Arc::downgrade(target),
        }
    }

    /// Participant index of the target while it is alive.
    pub(crate) fn resolve(&self) -> Option<u32> {
        (self.target.strong_count() > 0).then_some(self.pidx)
    }
}

impl Source {
    /// Focus on `target`, or clear the focus with `None`.
    pub fn set_focus(&self, target: Option<&Source>, full: bool) {
        let mut state = self.shared.state.lock();
        state.focus = target.map(|t| FocusRef::new(&t.shared));
        state.focus_full = full && state.focus.is_some();
        tracing::debug!(
            pidx = self.shared.pidx,
            focus = ?target.map(Source::pidx),
            full = state.focus_full,
            "Focus set"
        );
    }

    /// Focus by participant index; `0` clears the focus.
    ///
    /// Only enabled participants visible to this source can be selected.
    /// Selecting the current target again toggles `focus_full`; selecting
    /// a new target resets it. An index that matches nothing clears the
    /// focus.
    pub fn set_focus_idx(&self, pidx: u32) {
        let me = self.shared.pidx;

        if pidx == 0 {
            self.clear_focus();
            return;
        }

        let view = {
            let state = self.shared.state.lock();
            View {
                pidx: me,
                selfview: state.selfview,
                content_hide: state.content_hide,
                ..Default::default()
            }
        };

        let found = {
            let reg = self.shared.mixer.registry.lock();
            let found = reg
                .sources
                .iter()
                .find(|e| e.participant.pidx == pidx && view.is_visible(&e.participant))
                .map(|e| FocusRef {
                    pidx,
                    target: e.source.clone(),
                });
            found
        };

        let Some(target) = found else {
            tracing::debug!(pidx = me, target = pidx, "Focus target not found");
            self.clear_focus();
            return;
        };

        let mut state = self.shared.state.lock();
        let same = state.focus.as_ref().and_then(FocusRef::resolve) == Some(pidx);
        state.focus_full = same && !state.focus_full;
        state.focus = Some(target);
        tracing::debug!(pidx = me, target = pidx, full = state.focus_full, "Focus set");
    }

    /// Participant index of the live focus target.
    pub fn focus(&self) -> Option<u32> {
        self.shared
            .state
            .lock()
            .focus
            .as_ref()
            .and_then(FocusRef::resolve)
    }

    pub fn focus_full(&self) -> bool {
        self.shared.state.lock().focus_full
    }

    fn clear_focus(&self) {
        let mut state = self.shared.state.lock();
        if state.focus.take().is_some() {
            tracing::debug!(pidx = self.shared.pidx, "Focus cleared");
        }
        state.focus_full = false;
    }
}
