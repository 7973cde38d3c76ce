//! Dependency expansion.
//!
//! A changed type invalidates every type that uses it, directly or through
//! other users. [`DependencySearch`] answers the one-hop question; the
//! [`DependencyExpander`] walks it to a fixed point.

use std::collections::VecDeque;
use std::fs;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::unit::TypeName;
use crate::SourceTree;

/// Finds the direct dependents of a type.
pub trait DependencySearch: Send + Sync {
    /// Types in `scope` that reference `unit` (by name, inheritance, or any
    /// other edge the language defines). Need not include `unit` itself.
    fn find_dependents(&self, scope: &SourceTree, unit: &TypeName) -> FxHashSet<TypeName>;

    /// Lookups against one fixed `scope`, answered for a whole expansion.
    ///
    /// Searches that read the tree override this to load it once; the
    /// default asks [`find_dependents`](Self::find_dependents) every time.
    fn index<'a>(&'a self, scope: &'a SourceTree) -> Box<dyn UsageIndex + 'a> {
        Box::new(SearchIndex {
            search: self,
            scope,
        })
    }
}

/// Direct dependents within the scope an index was built for.
pub trait UsageIndex {
    fn dependents(&self, unit: &TypeName) -> FxHashSet<TypeName>;
}

struct SearchIndex<'a, S: ?Sized> {
    search: &'a S,
    scope: &'a SourceTree,
}

impl<S: DependencySearch + ?Sized> UsageIndex for SearchIndex<'_, S> {
    fn dependents(&self, unit: &TypeName) -> FxHashSet<TypeName> {
        self.search.find_dependents(self.scope, unit)
    }
}

/// Transitive closure over a [`DependencySearch`].
pub struct DependencyExpander<'a> {
    index: Box<dyn UsageIndex + 'a>,
}

impl<'a> DependencyExpander<'a> {
    pub fn new(search: &'a dyn DependencySearch, scope: &'a SourceTree) -> Self {
        DependencyExpander {
            index: search.index(scope),
        }
    }

    /// `changed` plus everything that transitively uses it.
    pub fn expand(&self, changed: &TypeName) -> FxHashSet<TypeName> {
        let mut closure = FxHashSet::default();
        self.expand_into(changed, &mut closure);
        closure
    }

    /// Union of [`expand`](Self::expand) over every changed type.
    pub fn expand_all<'n>(
        &self,
        changed: impl IntoIterator<Item = &'n TypeName>,
    ) -> FxHashSet<TypeName> {
        let mut closure = FxHashSet::default();
        for name in changed {
            self.expand_into(name, &mut closure);
        }
        closure
    }

    fn expand_into(&self, changed: &TypeName, closure: &mut FxHashSet<TypeName>) {
        if !closure.insert(changed.clone()) {
            return;
        }
        let mut queue = VecDeque::from([changed.clone()]);
        while let Some(next) = queue.pop_front() {
            for dependent in self.index.dependents(&next) {
                if closure.insert(dependent.clone()) {
                    queue.push_back(dependent);
                }
            }
        }
        tracing::trace!(%changed, closure = closure.len(), "expanded dependents");
    }
}

/// Dependency edges supplied up front, e.g. by an engine that already
/// tracks them.
#[derive(Clone, Debug, Default)]
pub struct UsageGraph {
    /// Used type -> types using it.
    users: FxHashMap<TypeName, FxHashSet<TypeName>>,
}

impl UsageGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `user` references `used`.
    pub fn add_use(&mut self, user: impl Into<TypeName>, used: impl Into<TypeName>) {
        self.users
            .entry(used.into())
            .or_default()
            .insert(user.into());
    }

    #[must_use]
    pub fn with_use(mut self, user: impl Into<TypeName>, used: impl Into<TypeName>) -> Self {
        self.add_use(user, used);
        self
    }
}

impl DependencySearch for UsageGraph {
    fn find_dependents(&self, scope: &SourceTree, unit: &TypeName) -> FxHashSet<TypeName> {
        self.users
            .get(unit)
            .map(|users| {
                users
                    .iter()
                    .filter(|user| *user != unit && scope.contains(user))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Searches typed sources for references to a type's name.
///
/// A source mentioning the simple name as a whole word is a dependent; this
/// also covers the qualified name. Sources that cannot be read are treated as
/// dependents.
#[derive(Copy, Clone, Debug, Default)]
pub struct TextualUsageSearch;

impl DependencySearch for TextualUsageSearch {
    fn find_dependents(&self, scope: &SourceTree, unit: &TypeName) -> FxHashSet<TypeName> {
        SourceTexts::load(scope).dependents(unit)
    }

    fn index<'a>(&'a self, scope: &'a SourceTree) -> Box<dyn UsageIndex + 'a> {
        Box::new(SourceTexts::load(scope))
    }
}

/// Every typed source of a tree, read once. `None` marks an unreadable file.
struct SourceTexts {
    sources: Vec<(TypeName, Option<String>)>,
}

impl SourceTexts {
    fn load(scope: &SourceTree) -> Self {
        let sources = scope
            .types()
            .map(|unit| {
                let text = match fs::read_to_string(&unit.path) {
                    Ok(text) => Some(text),
                    Err(err) => {
                        tracing::debug!(
                            path = %unit.path.display(),
                            %err,
                            "unreadable source counted as dependent"
                        );
                        None
                    }
                };
                (unit.name.clone(), text)
            })
            .collect();
        SourceTexts { sources }
    }
}

impl UsageIndex for SourceTexts {
    fn dependents(&self, unit: &TypeName) -> FxHashSet<TypeName> {
        let needle = unit.simple_name();
        self.sources
            .iter()
            .filter(|(name, _)| name != unit)
            .filter(|(_, text)| match text {
                Some(text) => contains_word(text, needle),
                None => true,
            })
            .map(|(name, _)| name.clone())
            .collect()
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Whether `word` occurs in `text` with no identifier characters around it.
fn contains_word(text: &str, word: &str) -> bool {
    if word.is_empty() {
        return false;
    }
    text.match_indices(word).any(|(start, _)| {
        let before = text[..start].chars().next_back();
        let after = text[start + word.len()..].chars().next();
        !before.is_some_and(is_ident_char) && !after.is_some_and(is_ident_char)
    })
}
