//! The editing session: local edits, remote values, and the defer/save
//! scheduler that decides when the two reconcile.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::SyncOptions;
use crate::editing::{Block, Cmd, Document, EditOutcome, Point, Selection};
use crate::markdown::{ParseError, parse, serialize};
use crate::sync::diff::{ChunkOp, DiffChunk, diff_blocks};
use crate::sync::merge::three_way_merge;
use crate::sync::patch::apply_patch;
use crate::sync::remap::{RemappedPoint, remap_point};
use crate::sync::sentinel::remap_offset;

/// What the session needs from the surrounding editor.
///
/// `is_active` gates remote deferral: while the surface reports active
/// interaction, incoming values wait. `commit` persists a serialized
/// document, and is also how a merge result that differs from the
/// incoming remote text gets propagated back out.
pub trait EditorHost {
    fn is_active(&self) -> bool;
    fn commit(&mut self, text: &str);
}

/// Scheduler phase of a [`SyncSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    /// No remote value outstanding.
    Idle,
    /// A remote value is held back until the user goes quiet.
    Deferred,
    /// A reconciliation pass is running.
    Reconciling,
}

/// What a session call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncEffect {
    /// A remote or merged value was adopted into the document.
    /// `changed` is false when local edits already subsumed it.
    Applied { changed: bool },
    /// The remote value was stored for later; due at `deadline`.
    Deferred { deadline: Instant },
    /// The merged text did not survive parsing; local state kept.
    Discarded,
    /// Local edits were serialized and committed to the host.
    Committed,
    /// Nothing to do.
    Idle,
}

/// A live editing session bound to one document.
///
/// Owns the [`Document`], the last text both sides agreed on (the
/// baseline), and the timers. All time flows in through `now` parameters;
/// the session never reads a clock, so tests drive it deterministically
/// and an embedding event loop schedules wakeups off
/// [`next_deadline`](Self::next_deadline).
pub struct SyncSession<H: EditorHost> {
    document: Document,
    baseline: String,
    options: SyncOptions,
    host: H,
    state: SyncState,
    pending_remote: Option<String>,
    defer_deadline: Option<Instant>,
    dirty: bool,
    last_edit: Option<Instant>,
    merge_pending: bool,
}

impl<H: EditorHost> SyncSession<H> {
    /// Start a session from the document's current text.
    ///
    /// The baseline is the canonical serialization of the parsed tree,
    /// not the raw input, so later equality checks compare like with
    /// like.
    pub fn new(initial: &str, options: SyncOptions, host: H) -> Result<Self, ParseError> {
        let blocks = parse(initial)?;
        let baseline = serialize(&blocks);
        Ok(Self {
            document: Document::new(blocks),
            baseline,
            options,
            host,
            state: SyncState::Idle,
            pending_remote: None,
            defer_deadline: None,
            dirty: false,
            last_edit: None,
            merge_pending: false,
        })
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Last text both sides agreed on.
    pub fn baseline(&self) -> &str {
        &self.baseline
    }

    /// Whether the deferred remote value would change the document if
    /// reconciled right now. Always false outside a deferral.
    pub fn changes_pending(&self) -> bool {
        self.merge_pending
    }

    /// Apply a local edit command.
    ///
    /// Content edits mark the session dirty, restart the save debounce,
    /// and push back an active defer deadline.
    pub fn apply(&mut self, cmd: Cmd, now: Instant) -> EditOutcome {
        let outcome = self.document.apply(cmd);
        if outcome.dirty {
            self.dirty = true;
            self.last_edit = Some(now);
            if self.state == SyncState::Deferred {
                self.defer_deadline = Some(now + self.options.merge_idle());
                self.refresh_merge_pending();
            }
        }
        outcome
    }

    /// Feed a new remote value into the session.
    ///
    /// Applied immediately when the user is quiet; otherwise stored,
    /// last-writer-wins, until the defer deadline or a [`flush`](Self::flush).
    pub fn remote_change(&mut self, remote: &str, now: Instant) -> SyncEffect {
        if self.state == SyncState::Deferred {
            // A newer remote value replaces the stored one without
            // re-arming the deadline; only local edits push that back.
            self.pending_remote = Some(remote.to_string());
            let deadline = *self
                .defer_deadline
                .get_or_insert(now + self.options.merge_idle());
            self.refresh_merge_pending();
            return SyncEffect::Deferred { deadline };
        }
        if self.should_defer(now) {
            let deadline = now + self.options.merge_idle();
            self.state = SyncState::Deferred;
            self.pending_remote = Some(remote.to_string());
            self.defer_deadline = Some(deadline);
            self.refresh_merge_pending();
            return SyncEffect::Deferred { deadline };
        }
        self.reconcile(remote)
    }

    /// Run any timer that has come due.
    ///
    /// Order matters: a due deferred merge reconciles before a due save,
    /// so a merge outcome is what gets committed rather than the stale
    /// pre-merge text.
    pub fn poll(&mut self, now: Instant) -> SyncEffect {
        if self.state == SyncState::Deferred && self.defer_deadline.is_some_and(|d| now >= d) {
            if let Some(remote) = self.pending_remote.take() {
                return self.reconcile(&remote);
            }
            self.clear_deferral();
        }
        if self.save_due(now) {
            return self.commit_local();
        }
        SyncEffect::Idle
    }

    /// Reconcile a deferred remote value immediately, deadline or not.
    pub fn flush(&mut self) -> SyncEffect {
        if let Some(remote) = self.pending_remote.take() {
            return self.reconcile(&remote);
        }
        self.clear_deferral();
        SyncEffect::Idle
    }

    /// Earliest instant at which [`poll`](Self::poll) has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        let save = if self.dirty {
            self.last_edit.map(|t| t + self.options.save_debounce)
        } else {
            None
        };
        match (self.defer_deadline, save) {
            (Some(defer), Some(save)) => Some(defer.min(save)),
            (defer, save) => defer.or(save),
        }
    }

    fn should_defer(&self, now: Instant) -> bool {
        if self.options.ignore_remote_while_focused && self.host.is_active() {
            return true;
        }
        self.last_edit
            .is_some_and(|t| now.saturating_duration_since(t) < self.options.merge_idle())
    }

    fn save_due(&self, now: Instant) -> bool {
        self.dirty
            && self
                .last_edit
                .is_some_and(|t| now.saturating_duration_since(t) >= self.options.save_debounce)
    }

    fn commit_local(&mut self) -> SyncEffect {
        let text = serialize(self.document.blocks());
        self.host.commit(&text);
        self.baseline = text;
        self.dirty = false;
        SyncEffect::Committed
    }

    fn refresh_merge_pending(&mut self) {
        self.merge_pending = match &self.pending_remote {
            Some(remote) => {
                let local = serialize(self.document.blocks());
                three_way_merge(&self.baseline, &local, remote) != local
            }
            None => false,
        };
    }

    /// Fold a remote value into the document.
    ///
    /// With no local edits since the baseline the remote text is adopted
    /// wholesale. Otherwise the two sides are merged through the
    /// baseline; a merge the local text already contains just advances
    /// the baseline. Whenever the adopted text differs from the incoming
    /// remote value, it is committed back to the host.
    fn reconcile(&mut self, remote: &str) -> SyncEffect {
        self.clear_deferral();
        self.state = SyncState::Reconciling;
        let local = serialize(self.document.blocks());
        let effect = if local == self.baseline {
            self.adopt(remote, remote)
        } else {
            let merged = three_way_merge(&self.baseline, &local, remote);
            if merged == local {
                if merged != remote {
                    self.host.commit(&merged);
                }
                self.baseline = merged;
                self.dirty = false;
                SyncEffect::Applied { changed: false }
            } else {
                self.adopt(&merged, remote)
            }
        };
        self.state = SyncState::Idle;
        effect
    }

    /// Patch the document over to `text`, carrying the selection across.
    fn adopt(&mut self, text: &str, remote: &str) -> SyncEffect {
        let next = match parse(text) {
            Ok(blocks) => blocks,
            Err(error) => {
                warn!(%error, "merged text failed to parse, keeping local state");
                return SyncEffect::Discarded;
            }
        };
        let prev = self.document.blocks().to_vec();
        let prev_selection = self.document.selection().cloned();
        let chunks = diff_blocks(&prev, &next);
        let outcome = apply_patch(&mut self.document, &next, &chunks);
        if let Some(selection) = prev_selection {
            let remapped = remap_selection_through(&prev, &next, &selection, &chunks);
            self.document.set_selection(remapped);
        }
        let adopted = serialize(self.document.blocks());
        if adopted != remote {
            self.host.commit(&adopted);
        }
        self.baseline = adopted;
        self.dirty = false;
        SyncEffect::Applied {
            changed: outcome.mutated,
        }
    }

    fn clear_deferral(&mut self) {
        self.pending_remote = None;
        self.defer_deadline = None;
        self.merge_pending = false;
        if self.state == SyncState::Deferred {
            self.state = SyncState::Idle;
        }
    }
}

/// Remap a selection across a patch, preferring character precision.
///
/// Each endpoint first tries the in-block refinement below and falls back
/// to the coarse block-level remap. A selection with any approximate or
/// lost endpoint collapses to a caret, same as the coarse path.
fn remap_selection_through(
    prev: &[Arc<Block>],
    next: &[Arc<Block>],
    selection: &Selection,
    chunks: &[DiffChunk],
) -> Option<Selection> {
    let anchor = remap_endpoint(prev, next, &selection.anchor, chunks);
    let focus = remap_endpoint(prev, next, &selection.focus, chunks);
    match (anchor, focus) {
        (Some(anchor), Some(focus)) => {
            if !anchor.approximate && !focus.approximate {
                Some(Selection::new(anchor.point, focus.point))
            } else {
                Some(Selection::caret(anchor.point))
            }
        }
        (Some(anchor), None) => Some(Selection::caret(anchor.point)),
        (None, Some(focus)) => Some(Selection::caret(focus.point)),
        (None, None) => None,
    }
}

fn remap_endpoint(
    prev: &[Arc<Block>],
    next: &[Arc<Block>],
    point: &Point,
    chunks: &[DiffChunk],
) -> Option<RemappedPoint> {
    if let Some(point) = refine_point(prev, next, point, chunks) {
        return Some(RemappedPoint {
            point,
            approximate: false,
        });
    }
    remap_point(next, point, chunks)
}

/// Character-precise remap for a point inside an edited block.
///
/// Applies when the point's block was rewritten in place, which the
/// alignment reports as a single-block delete immediately followed by a
/// single-block insert. The point's text offset is carried from the old
/// block's text to the new one and resolved back to a leaf position.
fn refine_point(
    prev: &[Arc<Block>],
    next: &[Arc<Block>],
    point: &Point,
    chunks: &[DiffChunk],
) -> Option<Point> {
    let old_index = point.block_index()?;
    let (at, _) = chunks
        .iter()
        .enumerate()
        .find(|(_, chunk)| {
            chunk.op == ChunkOp::Delete && chunk.prev_index == old_index && chunk.count == 1
        })?;
    let insert = chunks.get(at + 1)?;
    if insert.op != ChunkOp::Insert || insert.count != 1 {
        return None;
    }
    let prev_block = prev.get(old_index)?;
    let next_block = next.get(insert.next_index)?;
    let old_offset = prev_block.text_offset_of(&point.path[1..], point.offset)?;
    let new_offset = remap_offset(&prev_block.text(), &next_block.text(), old_offset);
    let (leaf_path, leaf_offset) = next_block.point_at_text_offset(new_offset)?;
    let mut path = vec![insert.next_index];
    path.extend(leaf_path);
    Some(Point::new(path, leaf_offset))
}
