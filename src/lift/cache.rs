use super::config::{Direction, LiftOptions};
use crate::util::{new_fx_hash_map, Ctx, ExprPtr, FxHashMap, NamePtr};

/// Memoized rewrites of one lifting configuration.
///
/// Entries are keyed by the term, the number of binders the traversal had opened when
/// it reached the term, and the direction. Terms are hash-consed, so the term part of
/// the key is physical identity. Entries seeded from a [`LiftStore`] are consulted only
/// for terms without free variables, whose rewrite cannot depend on the binder context.
#[derive(Debug, Clone, Default)]
pub struct LiftCache {
    local: FxHashMap<(ExprPtr, u16, Direction), ExprPtr>,
    seeded: FxHashMap<(ExprPtr, Direction), ExprPtr>,
}

impl LiftCache {
    pub fn new() -> Self { Self { local: new_fx_hash_map(), seeded: new_fx_hash_map() } }

    pub fn get(&self, ctx: &Ctx, e: ExprPtr, depth: u16, direction: Direction) -> Option<ExprPtr> {
        if let Some(hit) = self.local.get(&(e, depth, direction)) {
            return Some(*hit)
        }
        if ctx.has_fvars(e) {
            None
        } else {
            self.seeded.get(&(e, direction)).copied()
        }
    }

    pub fn insert(&mut self, e: ExprPtr, depth: u16, direction: Direction, lifted: ExprPtr) {
        self.local.insert((e, depth, direction), lifted);
    }

    pub fn len(&self) -> usize { self.local.len() }

    pub fn is_empty(&self) -> bool { self.local.is_empty() }

    pub fn clear(&mut self) {
        self.local.clear();
        self.seeded.clear();
    }

    pub(crate) fn seed(&mut self, entries: &FxHashMap<(ExprPtr, Direction), ExprPtr>) {
        self.seeded.extend(entries.iter().map(|(k, v)| (*k, *v)));
    }

    /// The entries whose term and rewrite are both free of free variables.
    pub(crate) fn context_free(&self, ctx: &Ctx) -> Vec<((ExprPtr, Direction), ExprPtr)> {
        self.local
            .iter()
            .filter(|((e, _, _), lifted)| !ctx.has_fvars(*e) && !ctx.has_fvars(**lifted))
            .map(|((e, _, direction), lifted)| ((*e, *direction), *lifted))
            .collect()
    }
}

/// Everything a stored rewrite depends on besides the term itself: the correspondence,
/// the names kept opaque, and the options that change the shape of a rewrite.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoreKey {
    pub before: NamePtr,
    pub after: NamePtr,
    opaque: Vec<NamePtr>,
    repack: bool,
    eta_expand: bool,
}

impl StoreKey {
    pub fn new(pair: (NamePtr, NamePtr), opaque: impl IntoIterator<Item = NamePtr>, options: LiftOptions) -> Self {
        let mut opaque = opaque.into_iter().collect::<Vec<_>>();
        opaque.sort_by_key(|n| n.idx());
        opaque.dedup();
        let (before, after) = pair;
        Self { before, after, opaque, repack: options.repack, eta_expand: options.eta_expand }
    }
}

/// Rewrites kept across lifting requests, keyed by the [`StoreKey`] of the configuration
/// that produced them. Owned by the caller; terms are pointers into one `Ctx`, so a
/// store is only meaningful alongside the context it was filled from.
#[derive(Debug, Clone, Default)]
pub struct LiftStore {
    entries: FxHashMap<StoreKey, FxHashMap<(ExprPtr, Direction), ExprPtr>>,
}

impl LiftStore {
    pub fn new() -> Self { Self { entries: new_fx_hash_map() } }

    pub fn get(&self, key: &StoreKey, e: ExprPtr, direction: Direction) -> Option<ExprPtr> {
        self.entries.get(key)?.get(&(e, direction)).copied()
    }

    pub fn num_entries(&self, key: &StoreKey) -> usize { self.entries.get(key).map_or(0, |m| m.len()) }

    pub(crate) fn entries_for(&self, key: &StoreKey) -> Option<&FxHashMap<(ExprPtr, Direction), ExprPtr>> {
        self.entries.get(key)
    }

    pub(crate) fn extend(&mut self, key: StoreKey, new: impl IntoIterator<Item = ((ExprPtr, Direction), ExprPtr)>) -> usize {
        let entries = self.entries.entry(key).or_insert_with(new_fx_hash_map);
        let before = entries.len();
        entries.extend(new);
        entries.len() - before
    }
}
