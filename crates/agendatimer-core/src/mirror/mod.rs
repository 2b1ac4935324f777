//! Change-driven synchronization to an always-visible mirror surface.
//!
//! The mirror has no diffing of its own, so [`MirrorSync`] decides between a
//! full repaint (structure changed, or a control that should be there is
//! missing) and a leaf patch (time text, progress, status). Pushes that would
//! not visibly change anything are skipped.

use serde::{Deserialize, Serialize};

use crate::block::BlockQueue;
use crate::countdown::{format_remaining, CountdownEngine, CountdownPhase};

/// Opaque token for an open mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MirrorHandle(pub u64);

/// Parts of the mirror whose presence or text requires a repaint to change.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MirrorStructure {
    /// Whether the "jump to next block" control is shown.
    pub show_next: bool,
    pub block_title: Option<String>,
    pub next_title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MirrorSnapshot {
    pub time_text: String,
    pub progress_percent: f64,
    pub status: CountdownPhase,
    pub structure: MirrorStructure,
}

/// Leaf fields that changed since the last push.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MirrorPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<CountdownPhase>,
}

impl MirrorPatch {
    pub fn is_empty(&self) -> bool {
        self.time_text.is_none() && self.progress_percent.is_none() && self.status.is_none()
    }
}

/// The external mirror display.
pub trait MirrorSurface {
    /// Open the mirror. `None` means the host does not support one.
    fn open(&mut self, initial: &MirrorSnapshot) -> Option<MirrorHandle>;
    /// False once the mirror was closed from outside.
    fn is_open(&self, handle: MirrorHandle) -> bool;
    /// Whether the "next" control is currently present on the surface.
    fn has_next_control(&self, handle: MirrorHandle) -> bool;
    fn full_repaint(&mut self, handle: MirrorHandle, snapshot: &MirrorSnapshot);
    fn patch(&mut self, handle: MirrorHandle, patch: &MirrorPatch);
    fn close(&mut self, handle: MirrorHandle);
}

/// Action forwarded from the mirror back to the primary control surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MirrorAction {
    Advance,
}

/// What a sync did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    NotOpen,
    Skipped,
    Patched,
    Repainted,
}

/// Derive what the mirror should show right now.
pub fn snapshot(engine: &CountdownEngine, queue: &BlockQueue, advance_enabled: bool) -> MirrorSnapshot {
    let next = queue.peek_next().map(|i| &queue.all()[i]);
    MirrorSnapshot {
        time_text: format_remaining(engine.remaining()),
        progress_percent: engine.progress_percent(),
        status: engine.phase(),
        structure: MirrorStructure {
            show_next: next.is_some() && advance_enabled,
            block_title: queue.active().map(|b| b.title.clone()),
            next_title: next.map(|b| b.title.clone()),
        },
    }
}

#[derive(Debug)]
pub struct MirrorSync<S: MirrorSurface> {
    surface: S,
    handle: Option<MirrorHandle>,
    last: Option<MirrorSnapshot>,
    progress_threshold_pct: f64,
}

impl<S: MirrorSurface> MirrorSync<S> {
    pub fn new(surface: S, progress_threshold_pct: f64) -> Self {
        Self {
            surface,
            handle: None,
            last: None,
            progress_threshold_pct,
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    pub fn last_pushed(&self) -> Option<&MirrorSnapshot> {
        self.last.as_ref()
    }

    /// Open the mirror from current state. Returns whether a mirror is open
    /// afterwards; an unsupported surface degrades to a no-op.
    pub fn open(&mut self, engine: &CountdownEngine, queue: &BlockQueue, advance_enabled: bool) -> bool {
        if self.handle.is_some() {
            return true;
        }
        let snap = snapshot(engine, queue, advance_enabled);
        match self.surface.open(&snap) {
            Some(handle) => {
                tracing::debug!(?handle, "mirror opened");
                self.handle = Some(handle);
                self.last = Some(snap);
                true
            }
            None => {
                tracing::warn!("mirror surface unavailable");
                false
            }
        }
    }

    pub fn close(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.surface.close(handle);
            tracing::debug!(?handle, "mirror closed");
        }
        self.last = None;
    }

    /// Push the current state if it differs visibly from the last push.
    pub fn sync(&mut self, engine: &CountdownEngine, queue: &BlockQueue, advance_enabled: bool) -> SyncOutcome {
        let Some(handle) = self.handle else {
            return SyncOutcome::NotOpen;
        };
        if !self.surface.is_open(handle) {
            // Closed from outside; a reopen derives everything again.
            self.handle = None;
            self.last = None;
            return SyncOutcome::NotOpen;
        }

        let current = snapshot(engine, queue, advance_enabled);
        let Some(last) = self.last.as_ref() else {
            self.surface.full_repaint(handle, &current);
            self.last = Some(current);
            return SyncOutcome::Repainted;
        };

        let control_missing = current.structure.show_next && !self.surface.has_next_control(handle);
        if current.structure != last.structure || control_missing {
            self.surface.full_repaint(handle, &current);
            self.last = Some(current);
            return SyncOutcome::Repainted;
        }

        let progress_delta = (current.progress_percent - last.progress_percent).abs();
        let worth_pushing = current.time_text != last.time_text
            || progress_delta > self.progress_threshold_pct
            || current.status != last.status;
        if !worth_pushing {
            return SyncOutcome::Skipped;
        }

        let patch = MirrorPatch {
            time_text: (current.time_text != last.time_text).then(|| current.time_text.clone()),
            progress_percent: (current.progress_percent != last.progress_percent)
                .then_some(current.progress_percent),
            status: (current.status != last.status).then_some(current.status),
        };
        self.surface.patch(handle, &patch);
        self.last = Some(current);
        SyncOutcome::Patched
    }
}

impl<S: MirrorSurface> Drop for MirrorSync<S> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Surface for hosts without a mirror. Never opens.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMirror;

impl MirrorSurface for NoMirror {
    fn open(&mut self, _initial: &MirrorSnapshot) -> Option<MirrorHandle> {
        None
    }
    fn is_open(&self, _handle: MirrorHandle) -> bool {
        false
    }
    fn has_next_control(&self, _handle: MirrorHandle) -> bool {
        false
    }
    fn full_repaint(&mut self, _handle: MirrorHandle, _snapshot: &MirrorSnapshot) {}
    fn patch(&mut self, _handle: MirrorHandle, _patch: &MirrorPatch) {}
    fn close(&mut self, _handle: MirrorHandle) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::{AlertPolicy, NoNotifications, SilentAlerts};
    use crate::countdown::{EngineServices, ManualClock, ManualDriver};
    use crate::storage::CountdownConfig;

    #[derive(Debug, Default)]
    struct FakeMirror {
        open: bool,
        next_control: bool,
        repaints: usize,
        patches: Vec<MirrorPatch>,
        closes: usize,
    }

    impl MirrorSurface for FakeMirror {
        fn open(&mut self, initial: &MirrorSnapshot) -> Option<MirrorHandle> {
            self.open = true;
            self.next_control = initial.structure.show_next;
            Some(MirrorHandle(1))
        }
        fn is_open(&self, _handle: MirrorHandle) -> bool {
            self.open
        }
        fn has_next_control(&self, _handle: MirrorHandle) -> bool {
            self.next_control
        }
        fn full_repaint(&mut self, _handle: MirrorHandle, snapshot: &MirrorSnapshot) {
            self.repaints += 1;
            self.next_control = snapshot.structure.show_next;
        }
        fn patch(&mut self, _handle: MirrorHandle, patch: &MirrorPatch) {
            self.patches.push(patch.clone());
        }
        fn close(&mut self, _handle: MirrorHandle) {
            self.open = false;
            self.closes += 1;
        }
    }

    fn engine(clock: &ManualClock) -> CountdownEngine {
        CountdownEngine::new(
            EngineServices {
                clock: Box::new(clock.clone()),
                driver: Box::new(ManualDriver::new()),
                alerts: Box::new(SilentAlerts),
                notifier: Box::new(NoNotifications),
            },
            CountdownConfig::default(),
            AlertPolicy::default(),
        )
    }

    fn two_blocks() -> BlockQueue {
        let mut q = BlockQueue::new();
        q.add("Intro", 10.0);
        q.add("Demo", 5.0);
        q
    }

    #[test]
    fn sync_without_open_mirror_is_noop() {
        let clock = ManualClock::new(0);
        let mut sync = MirrorSync::new(FakeMirror::default(), 1.0);
        assert_eq!(sync.sync(&engine(&clock), &two_blocks(), true), SyncOutcome::NotOpen);
        assert_eq!(sync.surface().repaints, 0);
    }

    #[test]
    fn identical_ticks_are_suppressed() {
        let clock = ManualClock::new(0);
        let mut e = engine(&clock);
        let q = two_blocks();
        e.start(600_000, None);
        let mut sync = MirrorSync::new(FakeMirror::default(), 1.0);
        assert!(sync.open(&e, &q, true));

        clock.advance(100);
        assert_eq!(sync.sync(&e, &q, true), SyncOutcome::Patched);
        clock.advance(100);
        e.tick();
        assert_eq!(sync.sync(&e, &q, true), SyncOutcome::Skipped);
        clock.advance(100);
        assert_eq!(sync.sync(&e, &q, true), SyncOutcome::Skipped);
        assert_eq!(sync.surface().patches.len(), 1);
        assert_eq!(sync.surface().repaints, 0);
    }

    #[test]
    fn patch_carries_only_changed_fields() {
        let clock = ManualClock::new(0);
        let mut e = engine(&clock);
        let q = two_blocks();
        e.start(600_000, None);
        let mut sync = MirrorSync::new(FakeMirror::default(), 1.0);
        sync.open(&e, &q, true);

        e.pause();
        assert_eq!(sync.sync(&e, &q, true), SyncOutcome::Patched);
        let patch = sync.surface().patches.last().unwrap();
        assert_eq!(patch.status, Some(CountdownPhase::Paused));
        assert_eq!(patch.time_text, None);
        assert_eq!(patch.progress_percent, None);
    }

    #[test]
    fn progress_beyond_threshold_pushes_without_text_change() {
        let clock = ManualClock::new(0);
        let mut e = engine(&clock);
        let q = two_blocks();
        // On a 50s countdown one progress point is 500ms.
        e.start(50_000, None);
        let mut sync = MirrorSync::new(FakeMirror::default(), 1.0);
        sync.open(&e, &q, true);

        clock.advance(1_200);
        assert_eq!(sync.sync(&e, &q, true), SyncOutcome::Patched);

        clock.advance(400);
        assert_eq!(sync.sync(&e, &q, true), SyncOutcome::Skipped);

        clock.advance(200);
        assert_eq!(sync.sync(&e, &q, true), SyncOutcome::Patched);
        let patch = sync.surface().patches.last().unwrap();
        assert_eq!(patch.time_text, None);
        assert!(patch.progress_percent.is_some());
        assert_eq!(patch.status, None);
    }

    #[test]
    fn structural_change_repaints() {
        let clock = ManualClock::new(0);
        let mut e = engine(&clock);
        let mut q = two_blocks();
        e.start(600_000, None);
        let mut sync = MirrorSync::new(FakeMirror::default(), 1.0);
        sync.open(&e, &q, true);
        assert!(sync.last_pushed().unwrap().structure.show_next);

        let demo = q.all()[1].id.clone();
        q.mark_done(&demo);
        assert_eq!(sync.sync(&e, &q, true), SyncOutcome::Repainted);
        assert!(!sync.last_pushed().unwrap().structure.show_next);

        assert_eq!(sync.sync(&e, &q, true), SyncOutcome::Skipped);
    }

    #[test]
    fn missing_next_control_repaints() {
        let clock = ManualClock::new(0);
        let e = engine(&clock);
        let q = two_blocks();
        let mut sync = MirrorSync::new(FakeMirror::default(), 1.0);
        sync.open(&e, &q, true);
        sync.surface_mut().next_control = false;
        assert_eq!(sync.sync(&e, &q, true), SyncOutcome::Repainted);
        assert!(sync.surface().next_control);
    }

    #[test]
    fn disabled_advance_hides_next_control() {
        let clock = ManualClock::new(0);
        let e = engine(&clock);
        let q = two_blocks();
        let snap = snapshot(&e, &q, false);
        assert!(!snap.structure.show_next);
        assert_eq!(snap.structure.next_title.as_deref(), Some("Demo"));
        assert_eq!(snap.structure.block_title.as_deref(), Some("Intro"));
    }

    #[test]
    fn externally_closed_mirror_reopens_fresh() {
        let clock = ManualClock::new(0);
        let e = engine(&clock);
        let q = two_blocks();
        let mut sync = MirrorSync::new(FakeMirror::default(), 1.0);
        sync.open(&e, &q, true);
        sync.surface_mut().open = false;
        assert_eq!(sync.sync(&e, &q, true), SyncOutcome::NotOpen);
        assert!(!sync.is_open());
        assert!(sync.open(&e, &q, true));
        assert!(sync.last_pushed().is_some());
    }

    #[test]
    fn unsupported_surface_degrades() {
        let clock = ManualClock::new(0);
        let e = engine(&clock);
        let mut sync = MirrorSync::new(NoMirror, 1.0);
        assert!(!sync.open(&e, &two_blocks(), true));
        assert_eq!(sync.sync(&e, &two_blocks(), true), SyncOutcome::NotOpen);
        sync.close();
    }

    #[test]
    fn close_tears_down_once() {
        let clock = ManualClock::new(0);
        let e = engine(&clock);
        let mut sync = MirrorSync::new(FakeMirror::default(), 1.0);
        sync.open(&e, &two_blocks(), true);
        sync.close();
        sync.close();
        assert_eq!(sync.surface().closes, 1);
        assert!(sync.last_pushed().is_none());
    }
}
