//! Mirror surface backed by a JSON file.
//!
//! The file holds the latest [`MirrorSnapshot`] so status bars and overlays can
//! poll it. Deleting the file counts as closing the mirror from outside.

use std::io;
use std::path::{Path, PathBuf};

use agendatimer_core::mirror::{MirrorHandle, MirrorPatch, MirrorSnapshot, MirrorSurface};

pub struct FileMirror {
    path: PathBuf,
    next_handle: u64,
    open: Option<MirrorHandle>,
    shown: Option<MirrorSnapshot>,
}

impl FileMirror {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            next_handle: 1,
            open: None,
            shown: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, snapshot: &MirrorSnapshot) -> io::Result<()> {
        let json = serde_json::to_vec_pretty(snapshot)?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)
    }

    fn show(&mut self, snapshot: MirrorSnapshot) {
        if let Err(e) = self.write(&snapshot) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to write mirror file");
        }
        self.shown = Some(snapshot);
    }
}

impl MirrorSurface for FileMirror {
    fn open(&mut self, initial: &MirrorSnapshot) -> Option<MirrorHandle> {
        if let Err(e) = self.write(initial) {
            tracing::warn!(path = %self.path.display(), error = %e, "cannot open mirror file");
            return None;
        }
        let handle = MirrorHandle(self.next_handle);
        self.next_handle += 1;
        self.open = Some(handle);
        self.shown = Some(initial.clone());
        Some(handle)
    }

    fn is_open(&self, handle: MirrorHandle) -> bool {
        self.open == Some(handle) && self.path.exists()
    }

    fn has_next_control(&self, handle: MirrorHandle) -> bool {
        self.open == Some(handle)
            && self.shown.as_ref().is_some_and(|s| s.structure.show_next)
    }

    fn full_repaint(&mut self, handle: MirrorHandle, snapshot: &MirrorSnapshot) {
        if self.open == Some(handle) {
            self.show(snapshot.clone());
        }
    }

    fn patch(&mut self, handle: MirrorHandle, patch: &MirrorPatch) {
        if self.open != Some(handle) {
            return;
        }
        let Some(mut snapshot) = self.shown.clone() else {
            return;
        };
        if let Some(text) = &patch.time_text {
            snapshot.time_text = text.clone();
        }
        if let Some(progress) = patch.progress_percent {
            snapshot.progress_percent = progress;
        }
        if let Some(status) = patch.status {
            snapshot.status = status;
        }
        self.show(snapshot);
    }

    fn close(&mut self, handle: MirrorHandle) {
        if self.open != Some(handle) {
            return;
        }
        self.open = None;
        self.shown = None;
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %self.path.display(), error = %e, "failed to remove mirror file"),
        }
    }
}
