use super::cache::{LiftCache, LiftStore, StoreKey};
use crate::ornament::CorrespondenceDescriptor;
use crate::util::{new_fx_hash_map, Ctx, ExprPtr, FxHashMap, FxHashSet, NamePtr};
use tracing::debug;

/// `Forward` rewrites the `before` type into the `after` type, `Backward` the reverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Forward,
    Backward,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiftOptions {
    /// Re-wrap lifted subterms of packed type whose form is not a visible pack.
    pub repack: bool,
    /// Eta-expand under-applied type formers, constructors and eliminators. When off,
    /// they are rejected with `UnsupportedShape`.
    pub eta_expand: bool,
    /// Let [`LiftingConfiguration::retain_into`] promote cache entries into a store.
    pub retain_cache: bool,
}

impl Default for LiftOptions {
    fn default() -> Self { Self { repack: true, eta_expand: true, retain_cache: false } }
}

/// Everything one lifting request needs: the correspondence, the direction, the set of
/// references to leave alone, and the state memoized while lifting.
///
/// A configuration may be reused for several calls to [`crate::lift::lift`]; the
/// cache and the local substitution are shared between them.
#[derive(Debug, Clone)]
pub struct LiftingConfiguration {
    pub correspondence: CorrespondenceDescriptor,
    pub direction: Direction,
    pub opaque: FxHashSet<NamePtr>,
    pub options: LiftOptions,
    pub(crate) cache: LiftCache,
    /// Free variables of the input mapped to their rewrites.
    pub(crate) locals: FxHashMap<ExprPtr, ExprPtr>,
    pub(crate) mentions_memo: FxHashMap<ExprPtr, bool>,
    pub(crate) const_memo: FxHashMap<NamePtr, bool>,
}

pub fn initialize_lifting_configuration(
    correspondence: &CorrespondenceDescriptor,
    direction: Direction,
    opaque: &[NamePtr],
) -> LiftingConfiguration {
    LiftingConfiguration::with_options(correspondence, direction, opaque, LiftOptions::default())
}

impl LiftingConfiguration {
    pub fn with_options(
        correspondence: &CorrespondenceDescriptor,
        direction: Direction,
        opaque: &[NamePtr],
        options: LiftOptions,
    ) -> Self {
        Self {
            correspondence: correspondence.clone(),
            direction,
            opaque: opaque.iter().copied().collect(),
            options,
            cache: LiftCache::new(),
            locals: new_fx_hash_map(),
            mentions_memo: new_fx_hash_map(),
            const_memo: new_fx_hash_map(),
        }
    }

    /// The `(before, after)` names of the correspondence.
    pub fn pair(&self) -> (NamePtr, NamePtr) { (self.correspondence.before, self.correspondence.after) }

    /// The key of this configuration's entries in a [`LiftStore`]. Configurations that
    /// differ in their opaque names or in `repack`/`eta_expand` never share entries.
    pub fn store_key(&self) -> StoreKey { StoreKey::new(self.pair(), self.opaque.iter().copied(), self.options) }

    pub fn cache(&self) -> &LiftCache { &self.cache }

    /// Seed the cache with the rewrites `store` holds for this configuration's key.
    pub fn with_store(mut self, store: &LiftStore) -> Self {
        if let Some(entries) = store.entries_for(&self.store_key()) {
            self.cache.seed(entries);
        }
        self
    }

    /// Copy the context-free cache entries into `store`, returning how many were new.
    /// Does nothing unless `options.retain_cache` is set.
    pub fn retain_into(&self, ctx: &Ctx, store: &mut LiftStore) -> usize {
        if !self.options.retain_cache {
            return 0
        }
        let added = store.extend(self.store_key(), self.cache.context_free(ctx));
        debug!(added, "retained lifted terms");
        added
    }
}
