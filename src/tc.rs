//! Reduction, inference and conversion for the kernel's terms.
//!
//! The type checker here infers types without re-checking them: its inputs are
//! already-elaborated terms, and it is used by discovery (convertibility under
//! known substitutions), by the lifting engine (static types of rewritten
//! subterms) and by tests.
use crate::env::Env;
use crate::util::{new_unique_hash_map, Ctx, ExprPtr, UniqueHashMap};

pub mod eq;
pub mod infer;
pub mod reduce;

pub(crate) struct TcCache {
    pub(crate) infer_cache: UniqueHashMap<ExprPtr, ExprPtr>,
    pub(crate) whnf_cache: UniqueHashMap<ExprPtr, ExprPtr>,
    pub(crate) whnf_core_cache: UniqueHashMap<ExprPtr, ExprPtr>,
    pub(crate) normalize_cache: UniqueHashMap<ExprPtr, ExprPtr>,
}

impl TcCache {
    pub(crate) fn new() -> Self {
        Self {
            infer_cache: new_unique_hash_map(),
            whnf_cache: new_unique_hash_map(),
            whnf_core_cache: new_unique_hash_map(),
            normalize_cache: new_unique_hash_map(),
        }
    }

    pub(crate) fn clear(&mut self) {
        self.infer_cache.clear();
        self.whnf_cache.clear();
        self.whnf_core_cache.clear();
        self.normalize_cache.clear();
    }
}

pub struct TypeChecker<'x> {
    pub ctx: &'x mut Ctx,
    pub env: &'x Env,
    pub(crate) tc_cache: TcCache,
}

impl<'x> TypeChecker<'x> {
    pub fn new(ctx: &'x mut Ctx, env: &'x Env) -> Self { Self { ctx, env, tc_cache: TcCache::new() } }

    pub fn clear_cache(&mut self) { self.tc_cache.clear() }

    /// Whether the inductive `Nat` is declared, enabling the literal extension.
    pub(crate) fn has_nat(&self) -> bool { self.env.get_inductive(&self.ctx.name_cache.nat).is_some() }
}
