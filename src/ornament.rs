//! Ornament discovery: relating an algebraic type `A` to a type `B` that differs from
//! it by one inserted index, and synthesizing the functions that witness the relation.
//!
//! For `A = List T` and `B = Vec T : Nat → Type` discovery finds the index at position 0
//! of type `Nat` and builds
//!
//! ```text
//! indexer : Π T (l : List T), Nat
//! promote : Π T (l : List T), Sigma Nat (λ n, Vec T n)
//! forget  : Π T (v : Sigma Nat (λ n, Vec T n)), List T
//! ```
//!
//! Every synthesized function is a closed term built from the eliminators of `A` and
//! `B`, so it reduces in the kernel without being declared.
use crate::errors::{OrnResult, OrnamentError};
use crate::tc::TypeChecker;
use crate::util::{Ctx, ExprPtr, NamePtr};
use crate::env::Env;
use tracing::debug;

pub mod curry;
pub mod differ;
pub mod indexer;
pub mod promote;

pub use curry::discover_curry_record;
pub use differ::difference;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryOptions {
    /// Take the first confirmed index position (outer to inner) when more than one
    /// qualifies, instead of failing with `AmbiguousIndex`.
    pub first_candidate_wins: bool,
}

impl Default for DiscoveryOptions {
    fn default() -> Self { Self { first_candidate_wins: true } }
}

/// How one argument of a `B` constructor relates to the arguments of the matching `A`
/// constructor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// Corresponds to the `A` argument at this position.
    Shared(usize),
    /// The new index of the recursive `B` argument at position `pinned_by`.
    NewIndex { pinned_by: usize },
}

/// The alignment of one constructor pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseAlignment {
    pub before_ctor: NamePtr,
    pub after_ctor: NamePtr,
    /// One slot per argument of the `B` constructor.
    pub slots: Vec<Slot>,
    /// `(A position, B position)` of each pair of recursive arguments.
    pub rec_pairs: Vec<(usize, usize)>,
    /// The indices of the `B` constructor's conclusion, each closed over the parameters
    /// and then the constructor's arguments.
    pub conclusion_indices: Vec<ExprPtr>,
}

impl CaseAlignment {
    /// The `B` position holding the `A` argument at `a_pos`.
    pub fn after_pos_of(&self, a_pos: usize) -> Option<usize> { self.slots.iter().position(|s| *s == Slot::Shared(a_pos)) }

    /// The `A` position of the recursive argument whose new index sits at `b_pos`.
    pub fn pinning_before_pos(&self, b_pos: usize) -> Option<usize> {
        match self.slots.get(b_pos)? {
            Slot::NewIndex { pinned_by } => match self.slots.get(*pinned_by)? {
                Slot::Shared(a_pos) => Some(*a_pos),
                Slot::NewIndex { .. } => None,
            },
            Slot::Shared(_) => None,
        }
    }

    pub fn num_new_indices(&self) -> usize { self.slots.iter().filter(|s| matches!(s, Slot::NewIndex { .. })).count() }
}

/// The result of differencing `before` against `after`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDescriptor {
    pub before: NamePtr,
    pub after: NamePtr,
    pub num_params: u16,
    /// Position of the new index within `after`'s index telescope.
    pub position: usize,
    /// `λ ps, I`: the index type, closed over the shared parameters.
    pub index_type: ExprPtr,
    /// One alignment per constructor, in declaration order.
    pub cases: Vec<CaseAlignment>,
}

impl IndexDescriptor {
    pub fn index_type_at(&self, ctx: &mut Ctx, params: &[ExprPtr]) -> ExprPtr {
        let applied = ctx.foldl_apps(self.index_type, params.iter().copied());
        ctx.head_beta(applied)
    }

    /// Insert `index` into `before`-indices at the new position.
    pub fn insert_index(&self, indices: &[ExprPtr], index: ExprPtr) -> Vec<ExprPtr> {
        let mut out = indices.to_vec();
        out.insert(self.position.min(out.len()), index);
        out
    }

    /// Drop the new index from `after`-indices.
    pub fn delete_index(&self, indices: &[ExprPtr]) -> Vec<ExprPtr> {
        indices.iter().enumerate().filter(|(i, _)| *i != self.position).map(|(_, x)| *x).collect()
    }

    /// `λ (n : I ps), B ps (ins indices n)`
    pub fn family_at(&self, ctx: &mut Ctx, params: &[ExprPtr], indices: &[ExprPtr]) -> ExprPtr {
        let index_ty = self.index_type_at(ctx, params);
        let n = ctx.mk_local("n", index_ty);
        let after = ctx.mk_const(self.after);
        let all = self.insert_index(indices, n);
        let body = ctx.foldl_apps(after, params.iter().chain(all.iter()).copied());
        ctx.abstr_lambda(n, body)
    }

    /// `Sigma (I ps) (λ n, B ps (ins indices n))`
    pub fn packed_type_at(&self, ctx: &mut Ctx, params: &[ExprPtr], indices: &[ExprPtr]) -> ExprPtr {
        let index_ty = self.index_type_at(ctx, params);
        let family = self.family_at(ctx, params, indices);
        crate::pack::packed_type(ctx, index_ty, family)
    }

    /// The conclusion indices of `B`'s constructor `case` applied to `params` and `args`.
    pub fn conclusion_at(&self, ctx: &mut Ctx, case: usize, params: &[ExprPtr], args: &[ExprPtr]) -> Vec<ExprPtr> {
        let closed = self.cases[case].conclusion_indices.clone();
        closed
            .into_iter()
            .map(|c| {
                let applied = ctx.foldl_apps(c, params.iter().chain(args.iter()).copied());
                ctx.head_beta(applied)
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorrespondenceKind {
    Algebraic(IndexDescriptor),
    /// A record with `num_fields` fields related to the right-nested pairs of its fields.
    CurryRecord { record: NamePtr, num_fields: usize },
}

/// A discovered correspondence with its witnessing functions. `promote` and `forget`
/// are closed terms taking the shared parameters first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrespondenceDescriptor {
    pub before: NamePtr,
    pub after: NamePtr,
    pub kind: CorrespondenceKind,
    pub indexer: Option<ExprPtr>,
    pub promote: ExprPtr,
    pub forget: ExprPtr,
}

impl CorrespondenceDescriptor {
    pub fn index_descriptor(&self) -> Option<&IndexDescriptor> {
        match &self.kind {
            CorrespondenceKind::Algebraic(d) => Some(d),
            CorrespondenceKind::CurryRecord { .. } => None,
        }
    }
}

pub(crate) fn require_sigma(ctx: &Ctx, env: &Env) -> OrnResult<()> {
    let sigma = ctx.name_cache.sigma;
    if env.get_inductive(&sigma).is_some() {
        Ok(())
    } else {
        Err(OrnamentError::UnknownDeclaration(ctx.name_to_string(sigma)))
    }
}

/// Relate `before` to `after`, which must differ by exactly one inserted index, and
/// synthesize the indexer, promote and forget functions. `Sigma` must already be
/// declared in `env` (see [`crate::pack::add_sigma`]).
pub fn discover(
    ctx: &mut Ctx,
    env: &Env,
    before: NamePtr,
    after: NamePtr,
    options: &DiscoveryOptions,
) -> OrnResult<CorrespondenceDescriptor> {
    require_sigma(ctx, env)?;
    let mut tc = TypeChecker::new(ctx, env);
    let index = differ::difference_with(&mut tc, before, after, options)?;
    let indexer = indexer::indexer_with(&mut tc, &index)?;
    let (promote, forget) = promote::promote_forget_with(&mut tc, &index, indexer)?;
    debug!(
        before = %tc.ctx.name_to_string(before),
        after = %tc.ctx.name_to_string(after),
        position = index.position,
        "discovered algebraic ornament"
    );
    Ok(CorrespondenceDescriptor {
        before,
        after,
        kind: CorrespondenceKind::Algebraic(index),
        indexer: Some(indexer),
        promote,
        forget,
    })
}

/// Build the indexer of an index descriptor: `λ ps is (a : A ps is), I ps`.
pub fn synthesize_indexer(ctx: &mut Ctx, env: &Env, index: &IndexDescriptor) -> OrnResult<ExprPtr> {
    let mut tc = TypeChecker::new(ctx, env);
    indexer::indexer_with(&mut tc, index)
}

/// Build `(promote, forget)` for an index descriptor and its indexer.
pub fn synthesize_promote_forget(
    ctx: &mut Ctx,
    env: &Env,
    index: &IndexDescriptor,
    indexer: ExprPtr,
) -> OrnResult<(ExprPtr, ExprPtr)> {
    require_sigma(ctx, env)?;
    let mut tc = TypeChecker::new(ctx, env);
    promote::promote_forget_with(&mut tc, index, indexer)
}
