//! Readable context: application state the model is allowed to see.
//!
//! Applications register short `description: value` facts in a
//! [`ReadableRegistry`], optionally nested under a parent and tagged
//! with categories. When an extraction asks for readable context, the
//! registry renders the entries of the requested categories as an
//! indented outline:
//!
//! ```text
//! 1. Current user: Ada
//!    A. Team: compilers
//!    B. Role: lead
//! 2. Open document: notes.md
//! ```
//!
//! The extractor never sees the registry type itself, only the
//! [`ContextSource`] trait, so callers can plug in their own renderer.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::{PoisonError, RwLock};

use serde_json::Value;

/// Category applied to entries registered without one, and the category
/// an extraction renders.
pub const DEFAULT_CATEGORY: &str = "global";

const INDENT: &str = "   ";

/// Anything that can render readable context for a set of categories.
pub trait ContextSource: Send + Sync {
    /// Renders the context visible under any of `categories`.
    fn context_string(&self, categories: &[&str]) -> String;
}

/// Handle returned by [`ReadableRegistry::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u64);

/// A readable entry before registration.
///
/// ```rust
/// use llm_extract::readable::{Readable, ReadableRegistry};
///
/// let registry = ReadableRegistry::new();
/// let user = registry.add(Readable::new("Current user", "Ada"));
/// registry.add(Readable::new("Team", "compilers").parent(user));
///
/// assert_eq!(
///     registry.render(&["global"]),
///     "1. Current user: Ada\n   A. Team: compilers"
/// );
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Readable {
    description: String,
    value: Value,
    parent: Option<ContextId>,
    categories: Vec<String>,
}

impl Readable {
    /// A top-level entry in the default category.
    pub fn new(description: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            description: description.into(),
            value: value.into(),
            parent: None,
            categories: Vec::new(),
        }
    }

    /// Nests the entry under `parent`.
    #[must_use]
    pub fn parent(mut self, parent: ContextId) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Replaces the default category with the given ones.
    #[must_use]
    pub fn categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = categories.into_iter().map(Into::into).collect();
        self
    }
}

#[derive(Debug)]
struct Entry {
    id: ContextId,
    readable: Readable,
}

impl Entry {
    fn in_any(&self, wanted: &HashSet<&str>) -> bool {
        if self.readable.categories.is_empty() {
            return wanted.contains(DEFAULT_CATEGORY);
        }
        self.readable
            .categories
            .iter()
            .any(|c| wanted.contains(c.as_str()))
    }

    fn line(&self) -> String {
        let value = match &self.readable.value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        format!("{}: {value}", self.readable.description)
    }
}

#[derive(Debug, Default)]
struct Entries {
    next_id: u64,
    items: Vec<Entry>,
}

/// A shared, insertion-ordered store of readable entries.
#[derive(Debug, Default)]
pub struct ReadableRegistry {
    inner: RwLock<Entries>,
}

impl ReadableRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an entry and returns its handle.
    ///
    /// An entry whose parent is unknown is kept at top level.
    pub fn add(&self, readable: Readable) -> ContextId {
        let mut entries = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(parent) = readable.parent {
            if !entries.items.iter().any(|e| e.id == parent) {
                tracing::warn!(?parent, "readable parent not registered");
            }
        }
        let id = ContextId(entries.next_id);
        entries.next_id += 1;
        entries.items.push(Entry { id, readable });
        id
    }

    /// Removes an entry together with everything nested under it.
    ///
    /// Returns `false` if `id` was not registered.
    pub fn remove(&self, id: ContextId) -> bool {
        let mut entries = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if !entries.items.iter().any(|e| e.id == id) {
            return false;
        }
        let mut doomed = HashSet::from([id]);
        // Children always follow their parent in insertion order.
        for entry in &entries.items {
            if entry.readable.parent.is_some_and(|p| doomed.contains(&p)) {
                doomed.insert(entry.id);
            }
        }
        entries.items.retain(|e| !doomed.contains(&e.id));
        true
    }

    /// Number of registered entries.
    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .items
            .len()
    }

    /// Whether the registry holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Renders the entries in any of `categories` as a numbered outline.
    ///
    /// An entry whose parent is filtered out is rendered at top level.
    pub fn render(&self, categories: &[&str]) -> String {
        let entries = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let wanted: HashSet<&str> = categories.iter().copied().collect();
        let visible: Vec<&Entry> = entries.items.iter().filter(|e| e.in_any(&wanted)).collect();
        let shown: HashSet<ContextId> = visible.iter().map(|e| e.id).collect();

        let roots: Vec<&Entry> = visible
            .iter()
            .copied()
            .filter(|e| e.readable.parent.is_none_or(|p| !shown.contains(&p)))
            .collect();

        let mut out = String::new();
        write_level(&mut out, &visible, &roots, 0);
        out.truncate(out.trim_end().len());
        out
    }
}

impl ContextSource for ReadableRegistry {
    fn context_string(&self, categories: &[&str]) -> String {
        self.render(categories)
    }
}

fn write_level(out: &mut String, visible: &[&Entry], level: &[&Entry], depth: usize) {
    for (i, entry) in level.iter().enumerate() {
        let _ = writeln!(
            out,
            "{}{}. {}",
            INDENT.repeat(depth),
            label(i + 1, depth),
            entry.line()
        );
        let children: Vec<&Entry> = visible
            .iter()
            .copied()
            .filter(|e| e.readable.parent == Some(entry.id))
            .collect();
        write_level(out, visible, &children, depth + 1);
    }
}

/// Outline label for the `n`th (1-based) item at `depth`: `1`, `A`, `a`,
/// `i`, then the cycle repeats.
fn label(n: usize, depth: usize) -> String {
    match depth % 4 {
        0 => n.to_string(),
        1 => alphabetic(n).to_uppercase(),
        2 => alphabetic(n),
        _ => roman(n),
    }
}

/// `1 -> a`, `26 -> z`, `27 -> aa`.
fn alphabetic(mut n: usize) -> String {
    let mut letters = Vec::new();
    while n > 0 {
        n -= 1;
        letters.push(char::from(b'a' + u8::try_from(n % 26).unwrap_or(0)));
        n /= 26;
    }
    letters.iter().rev().collect()
}

fn roman(mut n: usize) -> String {
    const NUMERALS: [(usize, &str); 13] = [
        (1000, "m"),
        (900, "cm"),
        (500, "d"),
        (400, "cd"),
        (100, "c"),
        (90, "xc"),
        (50, "l"),
        (40, "xl"),
        (10, "x"),
        (9, "ix"),
        (5, "v"),
        (4, "iv"),
        (1, "i"),
    ];
    let mut out = String::new();
    for (value, numeral) in NUMERALS {
        while n >= value {
            out.push_str(numeral);
            n -= value;
        }
    }
    out
}
