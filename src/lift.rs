//! Rewriting terms across a correspondence.
//!
//! [`lift`] walks a term once, asking [`rules`] how to treat each node and memoizing
//! every rewritten node in the configuration's cache. Binders are opened with fresh
//! locals; a local whose type changes is replaced by a retyped copy, recorded in the
//! configuration so later occurrences map to the same rewrite.
//!
//! Forward lifting of an algebraic correspondence sends `A ps is` to the packed
//! `Sigma (I ps) (λ n, B ps (ins is n))`, constructors of `A` to packs of `B`
//! constructors, and `A.rec` to `B.rec` over the unpacked value. Backward lifting
//! erases the index: `B` values become `A` values, packs become their value, and the
//! index of a packed value becomes the indexer applied to it.
use crate::env::{Declar, Env};
use crate::errors::{malformed, OrnResult, OrnamentError};
use crate::expr::Expr::*;
use crate::ornament::{require_sigma, CorrespondenceKind, IndexDescriptor};
use crate::pack::reduce_pack_projections;
use crate::tc::TypeChecker;
use crate::util::{new_fx_hash_set, Ctx, ExprPtr, FxHashSet, NamePtr};
use config::{Direction, LiftingConfiguration};
use record::RecordShape;
use rules::{LiftRule, StructuralRule};
use tracing::trace;

mod algebraic;
pub mod cache;
pub mod config;
mod record;
pub mod rules;

pub use cache::{LiftCache, LiftStore, StoreKey};
pub use config::{initialize_lifting_configuration, LiftOptions};

/// Rewrite `term` across `config`'s correspondence in `config`'s direction.
///
/// Subterms that do not mention the source type, directly or through unfolding
/// definitions, come back unchanged; in particular a term with no such occurrence
/// lifts to itself.
pub fn lift(ctx: &mut Ctx, env: &Env, config: &mut LiftingConfiguration, term: ExprPtr) -> OrnResult<ExprPtr> {
    require_sigma(ctx, env)?;
    let mut lifter = Lifter::new(TypeChecker::new(ctx, env), config)?;
    lifter.lift_term(term)
}

pub(crate) enum Shape {
    Algebraic { index: IndexDescriptor, indexer: ExprPtr, before_rec: NamePtr, after_rec: NamePtr },
    Record(RecordShape),
}

pub(crate) struct Lifter<'x, 'c> {
    pub(crate) tc: TypeChecker<'x>,
    pub(crate) config: &'c mut LiftingConfiguration,
    /// Binders opened above the current node.
    pub(crate) depth: u16,
    /// The type being rewritten away.
    pub(crate) source: NamePtr,
    /// `source` with its constructors and eliminator (and, for records lifted
    /// backward, `Sigma`'s).
    pub(crate) source_names: FxHashSet<NamePtr>,
    pub(crate) shape: Shape,
}

impl<'x, 'c> Lifter<'x, 'c> {
    pub(crate) fn new(mut tc: TypeChecker<'x>, config: &'c mut LiftingConfiguration) -> OrnResult<Self> {
        let direction = config.direction;
        let corr = &config.correspondence;
        let shape = match &corr.kind {
            CorrespondenceKind::Algebraic(index) => {
                let indexer = corr
                    .indexer
                    .ok_or_else(|| malformed(tc.ctx.name_to_string(corr.before), "algebraic correspondence without an indexer"))?;
                let before_rec = crate::ornament::indexer::rec_of(&tc, index.before)?;
                let after_rec = crate::ornament::indexer::rec_of(&tc, index.after)?;
                Shape::Algebraic { index: index.clone(), indexer, before_rec, after_rec }
            }
            CorrespondenceKind::CurryRecord { record, .. } => Shape::Record(RecordShape::new(&mut tc, *record)?),
        };
        let source = match (&shape, direction) {
            (Shape::Algebraic { index, .. }, Direction::Forward) => index.before,
            (Shape::Algebraic { index, .. }, Direction::Backward) => index.after,
            (Shape::Record(r), Direction::Forward) => r.record,
            (Shape::Record(_), Direction::Backward) => tc.ctx.name_cache.sigma,
        };
        let env = tc.env;
        let mut source_names = new_fx_hash_set();
        source_names.insert(source);
        if let Some(ind) = env.get_inductive(&source) {
            source_names.extend(ind.all_ctor_names.iter().copied());
            source_names.extend(ind.rec_name);
        }
        Ok(Self { tc, config, depth: 0, source, source_names, shape })
    }

    pub(crate) fn direction(&self) -> Direction { self.config.direction }

    pub(crate) fn lift_term(&mut self, e: ExprPtr) -> OrnResult<ExprPtr> {
        let rule = self.classify(e)?;
        trace!(rule = ?rule, depth = self.depth, "lift {:?}", self.tc.ctx.debug_print(e));
        let out = match rule {
            LiftRule::CacheHit(hit) => return Ok(hit),
            LiftRule::Unchanged => return Ok(e),
            LiftRule::Unliftable(ty) => {
                let node = format!("{:?}", self.tc.ctx.debug_print(e));
                return Err(OrnamentError::UnliftableNode { node, ty: self.tc.ctx.name_to_string(ty) })
            }
            LiftRule::OpaqueSkip => self.lift_opaque(e)?,
            LiftRule::Structural(structural) => {
                let out = self.lift_structural(e, structural)?;
                if structural.may_need_repack() {
                    self.repack_if_needed(e, out)?
                } else {
                    out
                }
            }
            LiftRule::Generic => self.lift_generic(e)?,
        };
        let direction = self.direction();
        self.config.cache.insert(e, self.depth, direction, out);
        Ok(out)
    }

    pub(crate) fn lift_all(&mut self, es: &[ExprPtr]) -> OrnResult<Vec<ExprPtr>> { es.iter().map(|e| self.lift_term(*e)).collect() }

    fn lift_structural(&mut self, e: ExprPtr, rule: StructuralRule) -> OrnResult<ExprPtr> {
        match rule {
            StructuralRule::EtaExpand { missing } => {
                if !self.config.options.eta_expand {
                    return Err(OrnamentError::UnsupportedShape(format!(
                        "under-applied {:?} with eta expansion disabled",
                        self.tc.ctx.debug_print(e)
                    )))
                }
                let expanded = self.eta_expand(e, missing)?;
                self.lift_term(expanded)
            }
            StructuralRule::Constant => {
                let env = self.tc.env;
                match self.tc.ctx.const_name(e).and_then(|n| env.get_unfoldable(&n)) {
                    Some(val) => self.lift_term(val),
                    None => Ok(e),
                }
            }
            StructuralRule::Application => {
                let (head, args) = self.tc.ctx.unfold_apps(e);
                let head_l = self.lift_term(head)?;
                let args_l = self.lift_all(&args)?;
                let out = self.tc.ctx.foldl_apps(head_l, args_l);
                if head_l == head {
                    Ok(out)
                } else {
                    let out = self.tc.ctx.head_beta(out);
                    Ok(reduce_pack_projections(self.tc.ctx, out))
                }
            }
            StructuralRule::TypeFormer | StructuralRule::Constructor | StructuralRule::Eliminator | StructuralRule::IndexProjection => {
                match (&self.shape, self.direction()) {
                    (Shape::Algebraic { .. }, Direction::Forward) => self.forward_algebraic(e, rule),
                    (Shape::Algebraic { .. }, Direction::Backward) => self.backward_algebraic(e, rule),
                    (Shape::Record(_), Direction::Forward) => self.forward_record(e, rule),
                    (Shape::Record(_), Direction::Backward) => self.backward_record(e, rule),
                }
            }
        }
    }

    /// `λ xs, e xs` for the `missing` arguments of `e`'s type.
    fn eta_expand(&mut self, e: ExprPtr, missing: usize) -> OrnResult<ExprPtr> {
        let mut ty = self.tc.infer(e)?;
        let mut locals = Vec::with_capacity(missing);
        for _ in 0..missing {
            let pi = self.tc.ensure_pi(ty, e)?;
            match self.tc.ctx.open_binder(pi) {
                Some((local, body)) => {
                    locals.push(local);
                    ty = body;
                }
                None => return Err(malformed(format!("{:?}", self.tc.ctx.debug_print(e)), "expected a function type")),
            }
        }
        let applied = self.tc.ctx.foldl_apps(e, locals.iter().copied());
        Ok(self.tc.ctx.lambda_telescope(&locals, applied))
    }

    fn lift_generic(&mut self, e: ExprPtr) -> OrnResult<ExprPtr> {
        match self.tc.ctx.read_expr(e) {
            Var { .. } | Sort { .. } | Const { .. } | NatLit { .. } => Ok(e),
            Local { .. } => self.lift_local(e),
            App { .. } => {
                let (head, args) = self.tc.ctx.unfold_apps(e);
                let head_l = self.lift_term(head)?;
                let args_l = self.lift_all(&args)?;
                Ok(self.tc.ctx.foldl_apps(head_l, args_l))
            }
            Pi { binder_name, binder_style, binder_type, body, .. } => {
                let (local, body) = self.open(binder_name, binder_style, binder_type, body)?;
                Ok(self.tc.ctx.abstr_pi(local, body))
            }
            Lambda { binder_name, binder_style, binder_type, body, .. } => {
                let (local, body) = self.open(binder_name, binder_style, binder_type, body)?;
                Ok(self.tc.ctx.abstr_lambda(local, body))
            }
            Let { binder_name, binder_type, val, body, .. } => {
                let val = self.lift_term(val)?;
                let (local, body) = self.open(binder_name, crate::expr::BinderStyle::Default, binder_type, body)?;
                let ty = self.tc.ctx.local_type(local);
                let body = self.tc.ctx.abstr(body, &[local]);
                Ok(self.tc.ctx.mk_let(binder_name, ty, val, body))
            }
            Proj { ty_name, idx, structure, .. } => {
                let structure = self.lift_term(structure)?;
                Ok(self.tc.ctx.mk_proj(ty_name, idx, structure))
            }
            Case { ind_name, motive, scrutinee, branches, .. } => {
                let motive = self.lift_term(motive)?;
                let scrutinee = self.lift_term(scrutinee)?;
                let branches = self.tc.ctx.read_exprs(branches);
                let branches = self.lift_all(&branches)?;
                Ok(self.tc.ctx.mk_case(ind_name, motive, scrutinee, &branches))
            }
            Fix { binder_name, binder_type, body, rec_arg, .. } => {
                let (local, body) = self.open(binder_name, crate::expr::BinderStyle::Default, binder_type, body)?;
                let ty = self.tc.ctx.local_type(local);
                let body = self.tc.ctx.abstr(body, &[local]);
                Ok(self.tc.ctx.mk_fix(binder_name, ty, body, rec_arg))
            }
            CoFix { binder_name, binder_type, body, .. } => {
                let (local, body) = self.open(binder_name, crate::expr::BinderStyle::Default, binder_type, body)?;
                let ty = self.tc.ctx.local_type(local);
                let body = self.tc.ctx.abstr(body, &[local]);
                Ok(self.tc.ctx.mk_cofix(binder_name, ty, body))
            }
            Cast { val, ty, .. } => {
                let val = self.lift_term(val)?;
                let ty = self.lift_term(ty)?;
                Ok(self.tc.ctx.mk_cast(val, ty))
            }
        }
    }

    /// Open the binder `(name : ty)` of `body`, lift its type and then `body`. Returns the
    /// local standing for the binder in the lifted body, which is retyped if its type
    /// changed.
    fn open(
        &mut self,
        name: NamePtr,
        style: crate::expr::BinderStyle,
        ty: ExprPtr,
        body: ExprPtr,
    ) -> OrnResult<(ExprPtr, ExprPtr)> {
        let ty_l = self.lift_term(ty)?;
        let local = self.tc.ctx.mk_unique(name, style, ty);
        let body = self.tc.ctx.inst1(body, local);
        let target = if ty_l == ty {
            local
        } else {
            let retyped = self.tc.ctx.mk_unique(name, style, ty_l);
            self.config.locals.insert(local, retyped);
            retyped
        };
        let body_l = self.under_binders(1, |this| this.lift_term(body))?;
        Ok((target, body_l))
    }

    pub(crate) fn under_binders<A>(&mut self, n: usize, f: impl FnOnce(&mut Self) -> OrnResult<A>) -> OrnResult<A> {
        let n = u16::try_from(n).unwrap_or(u16::MAX);
        self.depth = self.depth.saturating_add(n);
        let out = f(self);
        self.depth = self.depth.saturating_sub(n);
        out
    }

    /// Map each of `from` to the matching entry of `to` for the rest of the request.
    pub(crate) fn bind_locals(&mut self, from: &[ExprPtr], to: &[ExprPtr]) {
        for (f, t) in from.iter().zip(to.iter()) {
            self.config.locals.insert(*f, *t);
        }
    }

    fn lift_local(&mut self, e: ExprPtr) -> OrnResult<ExprPtr> {
        if let Some(mapped) = self.config.locals.get(&e).copied() {
            return Ok(mapped)
        }
        let (name, style, ty) = match self.tc.ctx.read_expr(e) {
            Local { binder_name, binder_style, binder_type, .. } => (binder_name, binder_style, binder_type),
            _ => return Ok(e),
        };
        let ty_l = self.lift_term(ty)?;
        if ty_l == ty {
            return Ok(e)
        }
        let retyped = self.tc.ctx.mk_unique(name, style, ty_l);
        self.config.locals.insert(e, retyped);
        Ok(retyped)
    }

    /// Whether `e` mentions the source type, directly, through a rewritten local, or
    /// through unfolding a definition.
    pub(crate) fn mentions(&mut self, e: ExprPtr) -> bool {
        if let Some(memo) = self.config.mentions_memo.get(&e).copied() {
            return memo
        }
        let out = match self.tc.ctx.read_expr(e) {
            Var { .. } | Sort { .. } | NatLit { .. } => false,
            Const { name, .. } => self.const_mentions(name),
            Local { binder_type, .. } => self.config.locals.contains_key(&e) || self.mentions(binder_type),
            Proj { ty_name, structure, .. } => self.source_names.contains(&ty_name) || self.mentions(structure),
            Case { ind_name, .. } if self.source_names.contains(&ind_name) => true,
            _ => {
                let children = self.tc.ctx.children(e);
                children.into_iter().any(|c| self.mentions(c))
            }
        };
        self.config.mentions_memo.insert(e, out);
        out
    }

    fn const_mentions(&mut self, name: NamePtr) -> bool {
        if self.source_names.contains(&name) {
            return true
        }
        if self.config.opaque.contains(&name) {
            return false
        }
        if let Some(memo) = self.config.const_memo.get(&name).copied() {
            return memo
        }
        // Provisional answer for definitions that mention themselves.
        self.config.const_memo.insert(name, false);
        let env = self.tc.env;
        let out = match env.get_declar(&name) {
            Some(Declar::Definition { val, opaque: false, .. }) => self.mentions(*val),
            _ => false,
        };
        self.config.const_memo.insert(name, out);
        out
    }

    /// References the lifter must not look into: configured opaque names, axioms and
    /// kernel-opaque definitions.
    pub(crate) fn is_opaque(&self, name: NamePtr) -> bool {
        if self.config.opaque.contains(&name) {
            return true
        }
        matches!(self.tc.env.get_declar(&name), Some(Declar::Axiom { .. }) | Some(Declar::Definition { opaque: true, .. }))
    }

    /// Lift the arguments of an opaque application, converting back to the source
    /// representation any argument whose type is the source type, and convert the
    /// result forward if it is itself of the source type.
    fn lift_opaque(&mut self, e: ExprPtr) -> OrnResult<ExprPtr> {
        let (head, args) = self.tc.ctx.unfold_apps(e);
        let mut out_args = Vec::with_capacity(args.len());
        for arg in args {
            let lifted = self.lift_term(arg)?;
            let restored = if lifted == arg { arg } else { self.convert(arg, lifted, false)? };
            out_args.push(restored);
        }
        let out = self.tc.ctx.foldl_apps(head, out_args);
        self.convert(e, out, true)
    }

    /// If `orig` has the source type, apply the correspondence function that takes
    /// `value` across: into the target representation if `into_target`, back into the
    /// source representation otherwise.
    fn convert(&mut self, orig: ExprPtr, value: ExprPtr, into_target: bool) -> OrnResult<ExprPtr> {
        let ty = self.tc.infer(orig)?;
        let ty = self.tc.whnf(ty);
        let (params, indices) = match self.source_type_args(ty)? {
            Some(args) => args,
            None => return Ok(value),
        };
        let params = self.lift_all(&params)?;
        let indices = self.lift_all(&indices)?;
        let corr = &self.config.correspondence;
        let forward_fn = match self.direction() {
            Direction::Forward => corr.promote,
            Direction::Backward => corr.forget,
        };
        let backward_fn = match self.direction() {
            Direction::Forward => corr.forget,
            Direction::Backward => corr.promote,
        };
        let fun = if into_target { forward_fn } else { backward_fn };
        let applied = self.tc.ctx.foldl_apps(fun, params.into_iter().chain(indices).chain(std::iter::once(value)));
        let applied = self.tc.ctx.head_beta(applied);
        Ok(reduce_pack_projections(self.tc.ctx, applied))
    }

    /// The parameters and indices of `ty` if it is the source type: `A ps is` lifting
    /// forward, the packed `Sigma (I ps) (λ n, B ps (ins is n))` lifting backward, and
    /// for records `R ps` or a pair chain matching `R ps`.
    pub(crate) fn source_type_args(&mut self, ty: ExprPtr) -> OrnResult<Option<(Vec<ExprPtr>, Vec<ExprPtr>)>> {
        match (&self.shape, self.direction()) {
            (Shape::Algebraic { index, .. }, Direction::Forward) => {
                let (head, args) = self.tc.ctx.unfold_apps(ty);
                let np = index.num_params as usize;
                if self.tc.ctx.const_name(head) == Some(index.before) && args.len() >= np {
                    Ok(Some((args[..np].to_vec(), args[np..].to_vec())))
                } else {
                    Ok(None)
                }
            }
            (Shape::Algebraic { .. }, Direction::Backward) => Ok(self.as_packed_after(ty)),
            (Shape::Record(r), Direction::Forward) => {
                let (head, args) = self.tc.ctx.unfold_apps(ty);
                if self.tc.ctx.const_name(head) == Some(r.record) && args.len() == r.params.len() {
                    Ok(Some((args, Vec::new())))
                } else {
                    Ok(None)
                }
            }
            (Shape::Record(_), Direction::Backward) => Ok(self.match_chain(ty).map(|ps| (ps, Vec::new()))),
        }
    }

    /// Wrap a lifted term of the packed target type that is not visibly a pack, so
    /// both of its components can be read off without recomputing it.
    fn repack_if_needed(&mut self, orig: ExprPtr, lifted: ExprPtr) -> OrnResult<ExprPtr> {
        if !self.config.options.repack || self.direction() != Direction::Forward {
            return Ok(lifted)
        }
        let index = match &self.shape {
            Shape::Algebraic { index, .. } => index.clone(),
            Shape::Record(_) => return Ok(lifted),
        };
        let ctx = &self.tc.ctx;
        if crate::pack::as_pack(ctx, lifted).is_some() || matches!(ctx.read_expr(lifted), Let { .. } | Local { .. }) {
            return Ok(lifted)
        }
        let ty = self.tc.infer(orig)?;
        let ty = self.tc.whnf(ty);
        let (params, indices) = match self.source_type_args(ty)? {
            Some(args) => args,
            None => return Ok(lifted),
        };
        let params = self.lift_all(&params)?;
        let indices = self.lift_all(&indices)?;
        let index_ty = index.index_type_at(self.tc.ctx, &params);
        let family = index.family_at(self.tc.ctx, &params, &indices);
        Ok(crate::pack::repack(self.tc.ctx, index_ty, family, lifted))
    }
}
