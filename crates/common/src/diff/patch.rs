// Context-carrying text patches with fuzzy (offset-tolerant) application.
//
// A patch is a list of hunks. Each hunk records where it expects to apply in
// the base text (a char offset), a little unchanged context on either side,
// the deleted run and the inserted run. Application searches for the
// context+deleted text near the expected offset, so a base that drifted by a
// few edits elsewhere still takes the patch. A hunk whose text cannot be
// found within `MAX_DRIFT_CHARS` of its expected position fails.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::myers::{self, Edit};

/// Unchanged chars kept on each side of a change.
pub const CONTEXT_CHARS: usize = 16;
/// How far (in chars) a hunk may have drifted from its recorded offset.
pub const MAX_DRIFT_CHARS: usize = 1_000;
/// Serialized format version.
pub const PATCH_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PatchError {
    #[error("malformed patch: {0}")]
    Malformed(String),

    #[error("unsupported patch format version {0}")]
    UnsupportedVersion(u32),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hunk {
    /// Char offset in the base text where `before` starts.
    pub start: usize,
    pub before: String,
    pub delete: String,
    pub insert: String,
    pub after: String,
}

impl Hunk {
    fn pattern(&self) -> Vec<char> {
        self.before.chars().chain(self.delete.chars()).chain(self.after.chars()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TextPatch {
    hunks: Vec<Hunk>,
}

#[derive(Serialize, Deserialize)]
struct WirePatch {
    version: u32,
    hunks: Vec<Hunk>,
}

/// Result of applying one hunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HunkOutcome {
    /// Applied; `drift` is how far (in chars) the match was from the expected offset.
    Applied { drift: isize },
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchApplication {
    pub text: String,
    pub outcomes: Vec<HunkOutcome>,
}

impl PatchApplication {
    /// True when every hunk applied.
    pub fn is_clean(&self) -> bool {
        self.outcomes.iter().all(|o| matches!(o, HunkOutcome::Applied { .. }))
    }

    /// Indices of hunks that could not be applied.
    pub fn failed_hunks(&self) -> Vec<usize> {
        self.outcomes
            .iter()
            .enumerate()
            .filter(|(_, o)| matches!(o, HunkOutcome::Failed))
            .map(|(i, _)| i)
            .collect()
    }
}

enum Segment {
    Equal(String),
    Change { delete: String, insert: String },
}

impl TextPatch {
    /// Builds the patch that turns `old` into `new`.
    pub fn build(old: &str, new: &str) -> Self {
        if old == new {
            return Self::default();
        }

        let old_chars: Vec<char> = old.chars().collect();
        let new_chars: Vec<char> = new.chars().collect();
        let segments = segment(&myers::diff(&old_chars, &new_chars));
        Self { hunks: hunks_from_segments(&segments) }
    }

    pub fn hunks(&self) -> &[Hunk] {
        &self.hunks
    }

    pub fn is_empty(&self) -> bool {
        self.hunks.is_empty()
    }

    /// Serializes to the wire format.
    pub fn to_wire(&self) -> String {
        let wire = WirePatch { version: PATCH_FORMAT_VERSION, hunks: self.hunks.clone() };
        // A struct of strings and integers always serializes.
        serde_json::to_string(&wire).unwrap_or_default()
    }

    /// Parses the wire format.
    pub fn from_wire(input: &str) -> Result<Self, PatchError> {
        let wire: WirePatch =
            serde_json::from_str(input).map_err(|e| PatchError::Malformed(e.to_string()))?;
        if wire.version != PATCH_FORMAT_VERSION {
            return Err(PatchError::UnsupportedVersion(wire.version));
        }
        Ok(Self { hunks: wire.hunks })
    }

    /// Applies every hunk in order against `base`.
    ///
    /// Failed hunks are skipped and reported; the caller decides whether a
    /// partial result is acceptable (the sync protocol never accepts one).
    pub fn apply(&self, base: &str) -> PatchApplication {
        let mut text: Vec<char> = base.chars().collect();
        let base_len = text.len();
        let mut outcomes = Vec::with_capacity(self.hunks.len());
        let mut delta: isize = 0;

        for hunk in &self.hunks {
            // Offsets come off the wire; one past the end of the base is the
            // furthest a hunk can start.
            if hunk.start > base_len {
                outcomes.push(HunkOutcome::Failed);
                continue;
            }
            let pattern = hunk.pattern();
            let expected = (hunk.start as isize).saturating_add(delta).max(0) as usize;

            let Some(found) = find_nearest(&text, &pattern, expected) else {
                outcomes.push(HunkOutcome::Failed);
                continue;
            };

            let before_len = hunk.before.chars().count();
            let delete_len = hunk.delete.chars().count();
            let insert: Vec<char> = hunk.insert.chars().collect();
            let insert_len = insert.len();

            let del_start = found + before_len;
            text.splice(del_start..del_start + delete_len, insert);

            outcomes.push(HunkOutcome::Applied { drift: found as isize - expected as isize });
            delta = found as isize - hunk.start as isize + insert_len as isize
                - delete_len as isize;
        }

        PatchApplication { text: text.into_iter().collect(), outcomes }
    }
}

/// Collapses a char edit script into alternating equal/change runs.
fn segment(edits: &[Edit<char>]) -> Vec<Segment> {
    let mut segments: Vec<Segment> = Vec::new();

    for edit in edits {
        match (edit, segments.last_mut()) {
            (Edit::Equal(c), Some(Segment::Equal(run))) => run.push(*c),
            (Edit::Equal(c), _) => segments.push(Segment::Equal(c.to_string())),
            (Edit::Delete(c), Some(Segment::Change { delete, .. })) => delete.push(*c),
            (Edit::Insert(c), Some(Segment::Change { insert, .. })) => insert.push(*c),
            (Edit::Delete(c), _) => {
                segments.push(Segment::Change { delete: c.to_string(), insert: String::new() })
            }
            (Edit::Insert(c), _) => {
                segments.push(Segment::Change { delete: String::new(), insert: c.to_string() })
            }
        }
    }

    segments
}

fn hunks_from_segments(segments: &[Segment]) -> Vec<Hunk> {
    let mut hunks = Vec::new();
    let mut current: Option<Hunk> = None;
    let mut old_pos = 0usize;

    for (i, seg) in segments.iter().enumerate() {
        match seg {
            Segment::Change { delete, insert } => {
                let hunk = current.get_or_insert_with(|| {
                    let before = match i.checked_sub(1).map(|p| &segments[p]) {
                        Some(Segment::Equal(run)) => tail_chars(run, CONTEXT_CHARS),
                        _ => String::new(),
                    };
                    let start = old_pos - before.chars().count();
                    Hunk {
                        start,
                        before,
                        delete: String::new(),
                        insert: String::new(),
                        after: String::new(),
                    }
                });
                hunk.delete.push_str(delete);
                hunk.insert.push_str(insert);
                old_pos += delete.chars().count();
            }
            Segment::Equal(run) => {
                let run_len = run.chars().count();
                let has_next_change = i + 1 < segments.len();
                if let Some(mut hunk) = current.take() {
                    if has_next_change && run_len <= 2 * CONTEXT_CHARS {
                        // Short gap: fold it into the same hunk on both sides.
                        hunk.delete.push_str(run);
                        hunk.insert.push_str(run);
                        current = Some(hunk);
                    } else {
                        hunk.after = run.chars().take(CONTEXT_CHARS).collect();
                        hunks.push(hunk);
                    }
                }
                old_pos += run_len;
            }
        }
    }

    if let Some(hunk) = current {
        hunks.push(hunk);
    }

    hunks
}

fn tail_chars(s: &str, n: usize) -> String {
    let count = s.chars().count();
    s.chars().skip(count.saturating_sub(n)).collect()
}

/// Finds the occurrence of `pattern` in `text` closest to `expected`.
fn find_nearest(text: &[char], pattern: &[char], expected: usize) -> Option<usize> {
    if pattern.is_empty() {
        // Only a patch against an empty base has no anchoring text at all.
        return text.is_empty().then_some(0);
    }
    if pattern.len() > text.len() {
        return None;
    }

    let last_start = text.len() - pattern.len();
    let matches_at = |pos: usize| pos <= last_start && text[pos..pos + pattern.len()] == *pattern;

    for distance in 0..=MAX_DRIFT_CHARS {
        let forward = expected.saturating_add(distance);
        if matches_at(forward) {
            return Some(forward);
        }
        if let Some(backward) = expected.checked_sub(distance) {
            if distance > 0 && matches_at(backward) {
                return Some(backward);
            }
        }
        if forward > last_start && expected < distance {
            break;
        }
    }

    None
}
