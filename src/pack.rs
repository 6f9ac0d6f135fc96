//! Dependent pairs of an index and a value indexed by it.
//!
//! Packed values are built with `Sigma.mk`, and both projections are kernel
//! projections, so `π₀ (Sigma.mk α β a b)` and `π₁ (Sigma.mk α β a b)` reduce by
//! whnf. The helpers here additionally reduce them syntactically when the packed
//! value is visibly canonical, which keeps lifted terms recognizable.
use crate::env::Env;
use crate::errors::OrnResult;
use crate::expr::{BinderStyle, Expr};
use crate::inductive::InductiveDecl;
use crate::util::{new_fx_hash_map, Ctx, ExprPtr, FxHashMap};
use crate::{app, arrow};
use tracing::debug;

/// Declare `Sigma (α : Type) (β : α → Type) : Type` with its single constructor
/// `Sigma.mk (fst : α) (snd : β fst)`. Does nothing if `Sigma` is already declared.
pub fn add_sigma(ctx: &mut Ctx, env: &mut Env) -> OrnResult<()> {
    let names = ctx.name_cache;
    if env.contains(&names.sigma) {
        return Ok(())
    }
    let ty0 = ctx.type0();
    let alpha_name = ctx.str1("α");
    let alpha = ctx.mk_unique(alpha_name, BinderStyle::Default, ty0);
    let fam_ty = arrow!(in ctx; alpha, ty0);
    let beta_name = ctx.str1("β");
    let beta = ctx.mk_unique(beta_name, BinderStyle::Default, fam_ty);
    let sigma_ty = ctx.pi_telescope(&[alpha, beta], ty0);

    let fst = ctx.mk_local("fst", alpha);
    let snd_ty = ctx.mk_app(beta, fst);
    let snd = ctx.mk_local("snd", snd_ty);
    let sigma = ctx.mk_const(names.sigma);
    let conclusion = app!(in ctx; sigma, alpha, beta);
    let mk_ty = ctx.pi_telescope(&[alpha, beta, fst, snd], conclusion);

    env.add_inductive(ctx, InductiveDecl::single(2, names.sigma, sigma_ty, vec![(names.sigma_mk, mk_ty)]))?;
    debug!("declared Sigma");
    Ok(())
}

/// `Sigma index_type family`
pub fn packed_type(ctx: &mut Ctx, index_type: ExprPtr, family: ExprPtr) -> ExprPtr {
    let sigma_name = ctx.name_cache.sigma;
    let sigma = ctx.mk_const(sigma_name);
    app!(in ctx; sigma, index_type, family)
}

/// `Sigma.mk index_type family index value`
pub fn pack(ctx: &mut Ctx, index_type: ExprPtr, family: ExprPtr, index: ExprPtr, value: ExprPtr) -> ExprPtr {
    let mk_name = ctx.name_cache.sigma_mk;
    let mk = ctx.mk_const(mk_name);
    app!(in ctx; mk, index_type, family, index, value)
}

/// The components of a canonical pack `Sigma.mk α β a b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackView {
    pub index_type: ExprPtr,
    pub family: ExprPtr,
    pub index: ExprPtr,
    pub value: ExprPtr,
}

pub fn as_pack(ctx: &Ctx, e: ExprPtr) -> Option<PackView> {
    let (head, args) = ctx.unfold_apps(e);
    match args.as_slice() {
        [index_type, family, index, value] if ctx.const_name(head) == Some(ctx.name_cache.sigma_mk) => {
            Some(PackView { index_type: *index_type, family: *family, index: *index, value: *value })
        }
        _ => None,
    }
}

/// `Sigma α β` to `(α, β)`.
pub fn as_packed_type(ctx: &Ctx, e: ExprPtr) -> Option<(ExprPtr, ExprPtr)> {
    let (head, args) = ctx.unfold_apps(e);
    match args.as_slice() {
        [index_type, family] if ctx.const_name(head) == Some(ctx.name_cache.sigma) => Some((*index_type, *family)),
        _ => None,
    }
}

/// If `e` is `π₀ x` (`idx = 0`) or `π₁ x` (`idx = 1`) of a `Sigma`, return `x`.
pub fn as_projection(ctx: &Ctx, e: ExprPtr, idx: usize) -> Option<ExprPtr> {
    match ctx.read_expr(e) {
        Expr::Proj { ty_name, idx: i, structure, .. } if ty_name == ctx.name_cache.sigma && i == idx => Some(structure),
        _ => None,
    }
}

/// `Sigma.mk α β (π₀ x) (π₁ x)` to `x`.
pub fn as_eta_pack(ctx: &Ctx, e: ExprPtr) -> Option<ExprPtr> {
    let PackView { index, value, .. } = as_pack(ctx, e)?;
    let x = as_projection(ctx, index, 0)?;
    if as_projection(ctx, value, 1) == Some(x) {
        Some(x)
    } else {
        None
    }
}

/// The index of a packed value; reduces on a canonical pack.
pub fn project_index(ctx: &mut Ctx, packed: ExprPtr) -> ExprPtr {
    match as_pack(ctx, packed) {
        Some(view) => view.index,
        None => {
            let sigma = ctx.name_cache.sigma;
            ctx.mk_proj(sigma, 0, packed)
        }
    }
}

/// The value of a packed value; reduces on a canonical pack.
pub fn project_value(ctx: &mut Ctx, packed: ExprPtr) -> ExprPtr {
    match as_pack(ctx, packed) {
        Some(view) => view.value,
        None => {
            let sigma = ctx.name_cache.sigma;
            ctx.mk_proj(sigma, 1, packed)
        }
    }
}

/// Rewrite every `π₀`/`π₁` of a visibly canonical pack inside `e` to the component.
pub fn reduce_pack_projections(ctx: &mut Ctx, e: ExprPtr) -> ExprPtr {
    let mut memo = new_fx_hash_map();
    reduce_projections_aux(ctx, e, &mut memo)
}

fn reduce_projections_aux(ctx: &mut Ctx, e: ExprPtr, memo: &mut FxHashMap<ExprPtr, ExprPtr>) -> ExprPtr {
    if let Some(cached) = memo.get(&e).copied() {
        return cached
    }
    let calcd = match ctx.read_expr(e) {
        Expr::Proj { ty_name, idx, structure, .. } if ty_name == ctx.name_cache.sigma => {
            let structure = reduce_projections_aux(ctx, structure, memo);
            match (as_pack(ctx, structure), idx) {
                (Some(view), 0) => view.index,
                (Some(view), 1) => view.value,
                _ => ctx.mk_proj(ty_name, idx, structure),
            }
        }
        _ => ctx.map_children(e, 0, &mut |ctx, c, _| reduce_projections_aux(ctx, c, memo)),
    };
    memo.insert(e, calcd);
    calcd
}

/// `let p : Sigma α β := e in Sigma.mk α β (π₀ p) (π₁ p)`, naming `e` once so both
/// components are visible without recomputing it.
pub fn repack(ctx: &mut Ctx, index_type: ExprPtr, family: ExprPtr, e: ExprPtr) -> ExprPtr {
    let ty = packed_type(ctx, index_type, family);
    let p = ctx.mk_local("p", ty);
    let idx = project_index(ctx, p);
    let val = project_value(ctx, p);
    let body = pack(ctx, index_type, family, idx, val);
    let body = ctx.abstr(body, &[p]);
    let name = ctx.str1("p");
    ctx.mk_let(name, ty, e, body)
}
