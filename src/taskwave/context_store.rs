//! Prior-work context for task prompts.
//!
//! Every successful task records its output here; every later task asks for a
//! snapshot (the string of prior work injected into its prompt) selected by
//! a [`ContextStrategy`] and packed into a token budget. The store only ever
//! grows: entries are never removed, only left out of snapshots.
//!
//! # Strategies
//!
//! - [`Shared`](ContextStrategy::Shared): most recent completions first,
//!   across the whole run, packed until the budget is reached.
//! - [`Isolated`](ContextStrategy::Isolated): no cross-task context at all.
//! - [`Hierarchical`](ContextStrategy::Hierarchical): the task's ancestor
//!   chain (via `parent_id`), root first; siblings are excluded.
//!
//! # The pack rule
//!
//! When one output exceeds its character cap it is reduced to its head and
//! tail around a fixed marker; the onset and the most recent text are the
//! informative regions, and the rule is deterministic so snapshots are
//! reproducible in tests:
//!
//! ```rust
//! use taskwave::context_store::pack;
//!
//! let long = "x".repeat(1000);
//! let packed = pack(&long, 200);
//! assert!(packed.len() <= 200);
//! assert!(packed.contains("... [content pruned] ..."));
//! // Idempotent: re-packing changes nothing.
//! assert_eq!(pack(&packed, 200), packed);
//! ```

use crate::taskwave::task::Task;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Marker spliced between the head and tail of a pruned output.
const PRUNE_MARKER: &str = "\n\n... [content pruned] ...\n\n";

/// How prior-work context is selected for each task prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextStrategy {
    /// Recent completed outputs across all tasks in the run.
    Shared,
    /// No cross-task context.
    Isolated,
    /// The `parent_id` ancestor chain, root first.
    Hierarchical,
}

impl Default for ContextStrategy {
    fn default() -> Self {
        ContextStrategy::Shared
    }
}

/// What the store remembers about one completed task.
#[derive(Debug, Clone)]
pub struct ContextEntry {
    /// Id of the task that produced the output.
    pub task_id: String,
    /// Agent that produced it.
    pub agent_name: String,
    /// Parent task id, if any; drives the hierarchical strategy.
    pub parent_id: Option<String>,
    /// The full output text. Never truncated in storage.
    pub output: String,
    /// When the output was recorded.
    pub timestamp: DateTime<Utc>,
    /// Backend-reported token count when available, estimate otherwise.
    pub token_estimate: usize,
}

/// Approximate a token count from text: one token per four characters,
/// never less than one.
///
/// ```rust
/// use taskwave::context_store::estimate_tokens;
///
/// assert_eq!(estimate_tokens(""), 1);
/// assert_eq!(estimate_tokens("abcd"), 1);
/// assert_eq!(estimate_tokens("abcde"), 2);
/// ```
pub fn estimate_tokens(text: &str) -> usize {
    let chars = text.chars().count();
    std::cmp::max(1, (chars + 3) / 4)
}

/// Deterministically reduce `text` to at most `cap` characters, keeping the
/// head and tail around [`PRUNE_MARKER`].
///
/// Idempotent (`pack(pack(t, c), c) == pack(t, c)`) and monotonic in `cap`.
/// Operates on characters, so multi-byte text never splits mid-codepoint.
pub fn pack(text: &str, cap: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= cap {
        return text.to_string();
    }
    let keep = (cap / 2).saturating_sub(25);
    let head: String = chars[..keep].iter().collect();
    let tail: String = chars[chars.len() - keep..].iter().collect();
    let mut packed = String::with_capacity(head.len() + PRUNE_MARKER.len() + tail.len());
    packed.push_str(&head);
    packed.push_str(PRUNE_MARKER);
    packed.push_str(&tail);
    packed
}

/// Concurrent store of completed-task outputs.
///
/// Many readers, one writer per [`record`](ContextStore::record); no lock is
/// ever held across an await. One store exists per run and is dropped with it.
#[derive(Debug, Default)]
pub struct ContextStore {
    entries: RwLock<Vec<ContextEntry>>,
}

impl ContextStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed task's output.
    ///
    /// `reported_tokens` is the backend's count for the call when it supplied
    /// one; it replaces the character-based estimate.
    pub async fn record(&self, task: &Task, output: &str, reported_tokens: Option<usize>) {
        let entry = ContextEntry {
            task_id: task.id.clone(),
            agent_name: task.agent_name.clone(),
            parent_id: task.parent_id.clone(),
            output: output.to_string(),
            timestamp: Utc::now(),
            token_estimate: reported_tokens.unwrap_or_else(|| estimate_tokens(output)),
        };
        self.entries.write().await.push(entry);
    }

    /// Number of recorded entries.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// True when nothing has been recorded yet.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Copy of all entries in completion order, oldest first.
    pub async fn entries(&self) -> Vec<ContextEntry> {
        self.entries.read().await.clone()
    }

    /// Build the prior-work string injected into `task`'s prompt.
    ///
    /// Selection follows `strategy`; each selected output is packed to the
    /// per-entry character cap (`token_budget / 10`), and entries accumulate
    /// until their token estimates reach `token_budget`. When the selected
    /// entries' stored estimates together exceed `pruning_threshold`, every
    /// selected entry is re-capped at
    /// `min(per_entry_cap, pruning_threshold / selected_count)` first.
    ///
    /// Returns the empty string when the strategy yields nothing; the
    /// runner then omits the prior-work section entirely.
    pub async fn snapshot_for(
        &self,
        task: &Task,
        strategy: ContextStrategy,
        token_budget: usize,
        pruning_threshold: usize,
    ) -> String {
        let entries = self.entries.read().await;
        let selected: Vec<&ContextEntry> = match strategy {
            ContextStrategy::Isolated => return String::new(),
            // Completion time descending: most recent first.
            ContextStrategy::Shared => entries.iter().rev().collect(),
            ContextStrategy::Hierarchical => {
                let mut chain: Vec<&ContextEntry> = Vec::new();
                // Parent links are caller data and are not validated by the
                // graph; the visited set keeps a malformed loop finite.
                let mut visited: std::collections::HashSet<&str> = std::collections::HashSet::new();
                visited.insert(task.id.as_str());
                let mut cursor = task.parent_id.clone();
                while let Some(parent) = cursor {
                    let entry = match entries.iter().find(|entry| entry.task_id == parent) {
                        Some(entry) => entry,
                        None => break,
                    };
                    if !visited.insert(entry.task_id.as_str()) {
                        break;
                    }
                    cursor = entry.parent_id.clone();
                    chain.push(entry);
                }
                // Walked self -> root; snapshots read root -> self.
                chain.reverse();
                chain
            }
        };

        if selected.is_empty() {
            return String::new();
        }

        let per_entry_cap = token_budget / 10;

        // Pick entries under the token budget first, then decide the final cap.
        let mut picked: Vec<&ContextEntry> = Vec::new();
        let mut spent = 0usize;
        for entry in selected {
            let packed = pack(&entry.output, per_entry_cap);
            let cost = estimate_tokens(&packed);
            if spent + cost > token_budget {
                break;
            }
            spent += cost;
            picked.push(entry);
        }

        if picked.is_empty() {
            return String::new();
        }

        let raw_total: usize = picked.iter().map(|entry| entry.token_estimate).sum();
        let cap = if raw_total > pruning_threshold {
            std::cmp::min(per_entry_cap, pruning_threshold / picked.len())
        } else {
            per_entry_cap
        };

        picked
            .iter()
            .map(|entry| {
                format!(
                    "### {} ({})\n{}",
                    entry.task_id,
                    entry.agent_name,
                    pack(&entry.output, cap)
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}
