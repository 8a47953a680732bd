//! Fair-queue rotation over attached pipes.
//!
//! Goals:
//! - Pipes are kept in arrival order; new pipes join at the tail
//! - Each pick scans forward from the cursor (wrapping) and moves the
//!   cursor past the pipe it returns
//! - Under simultaneous availability every pipe is served once per full
//!   rotation before any is served twice
//! - Removing a pipe keeps the relative order of the rest and keeps the
//!   cursor pointing at the same successor

use crate::pipe::PipeId;

/// Round-robin cursor over a list of pipe ids.
#[derive(Debug, Default)]
pub struct FairQueue {
    rotation: Vec<PipeId>,
    cursor: usize,
}

impl FairQueue {
    /// Create an empty rotation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pipe at the tail of the rotation.
    ///
    /// Returns false if the pipe was already present.
    pub fn attach(&mut self, id: PipeId) -> bool {
        if self.rotation.contains(&id) {
            return false;
        }
        self.rotation.push(id);
        true
    }

    /// Remove a pipe from the rotation.
    ///
    /// Returns false if the pipe was not present.
    pub fn detach(&mut self, id: PipeId) -> bool {
        let Some(pos) = self.rotation.iter().position(|x| *x == id) else {
            return false;
        };
        self.rotation.remove(pos);

        // Entries after `pos` shifted left by one; follow them.
        if pos < self.cursor {
            self.cursor -= 1;
        }
        if self.cursor >= self.rotation.len() {
            self.cursor = 0;
        }
        true
    }

    /// Pick the next pipe for which `is_readable` holds.
    ///
    /// Scans at most one full rotation starting at the cursor. On success the
    /// cursor moves to the position after the returned pipe.
    pub fn next_readable(&mut self, mut is_readable: impl FnMut(PipeId) -> bool) -> Option<PipeId> {
        let len = self.rotation.len();
        if len == 0 {
            return None;
        }
        if self.cursor >= len {
            self.cursor = 0;
        }

        for step in 0..len {
            let pos = (self.cursor + step) % len;
            let id = self.rotation[pos];
            if is_readable(id) {
                self.cursor = (pos + 1) % len;
                return Some(id);
            }
        }
        None
    }

    /// Pipes in rotation order starting from the cursor.
    pub fn iter_from_cursor(&self) -> impl Iterator<Item = PipeId> + '_ {
        let (tail, head) = self.rotation.split_at(self.cursor.min(self.rotation.len()));
        head.iter().chain(tail.iter()).copied()
    }

    /// Returns true if the pipe is in the rotation.
    pub fn contains(&self, id: PipeId) -> bool {
        self.rotation.contains(&id)
    }

    /// Number of pipes in the rotation.
    pub fn len(&self) -> usize {
        self.rotation.len()
    }

    /// Returns true if no pipes are attached.
    pub fn is_empty(&self) -> bool {
        self.rotation.is_empty()
    }

    /// Remove every pipe and reset the cursor.
    pub fn clear(&mut self) {
        self.rotation.clear();
        self.cursor = 0;
    }
}
