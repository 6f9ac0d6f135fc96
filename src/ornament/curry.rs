//! The correspondence between a record and the right-nested pairs of its fields:
//! `R ps` with fields `f₀ .. fₖ` against `Sigma T₀ (λ f₀, Sigma T₁ (λ f₁, .. Tₖ))`.
use super::indexer::rec_of;
use super::{require_sigma, CorrespondenceDescriptor, CorrespondenceKind};
use crate::env::Env;
use crate::errors::{malformed, OrnResult, OrnamentError};
use crate::introspect::{ctor_view, open_params};
use crate::pack::{pack, packed_type, project_index, project_value};
use crate::tc::TypeChecker;
use crate::util::{Ctx, ExprPtr, FxHashMap, NamePtr};
use std::iter::once;
use tracing::debug;

/// The pair type of `fields`, which are locals whose types may mention earlier fields.
pub(crate) fn chain_type(ctx: &mut Ctx, fields: &[ExprPtr]) -> OrnResult<ExprPtr> {
    Ok(chain(ctx, fields)?.0)
}

/// The nested pair of `values` for the fields `fields`.
pub(crate) fn chain_value(ctx: &mut Ctx, fields: &[ExprPtr], values: &[ExprPtr]) -> OrnResult<ExprPtr> {
    let (_, pattern) = chain(ctx, fields)?;
    let map = fields.iter().copied().zip(values.iter().copied()).collect::<FxHashMap<_, _>>();
    Ok(ctx.replace_locals(pattern, &map))
}

// Folds from the innermost field outwards, returning the chain type with the pair of
// the field locals themselves.
fn chain(ctx: &mut Ctx, fields: &[ExprPtr]) -> OrnResult<(ExprPtr, ExprPtr)> {
    let (last, init) = fields.split_last().ok_or_else(|| malformed(String::from("record"), "no fields to pair"))?;
    let mut ty = ctx.local_type(*last);
    let mut value = *last;
    for field in init.iter().copied().rev() {
        let family = ctx.abstr_lambda(field, ty);
        let field_ty = ctx.local_type(field);
        value = pack(ctx, field_ty, family, field, value);
        ty = packed_type(ctx, field_ty, family);
    }
    Ok((ty, value))
}

/// `[π₀ c, π₀ (π₁ c), .., π₁ (.. (π₁ c))]` for a chain of `num_fields` fields.
pub(crate) fn chain_projections(ctx: &mut Ctx, chain: ExprPtr, num_fields: usize) -> Vec<ExprPtr> {
    let mut out = Vec::with_capacity(num_fields);
    let mut cursor = chain;
    for _ in 1..num_fields {
        out.push(project_index(ctx, cursor));
        cursor = project_value(ctx, cursor);
    }
    out.push(cursor);
    out
}

/// Relate `record` to the nested pairs of its fields, with
///
/// ```text
/// promote = λ ps (r : R ps), R.rec ps (λ r, chain) (λ fs, pairs fs) r
/// forget  = λ ps (c : chain), R.mk ps (π₀ c) .. (π₁ .. c)
/// ```
pub fn discover_curry_record(ctx: &mut Ctx, env: &Env, record: NamePtr) -> OrnResult<CorrespondenceDescriptor> {
    require_sigma(ctx, env)?;
    let mut tc = TypeChecker::new(ctx, env);
    curry_record_with(&mut tc, record)
}

fn curry_record_with(tc: &mut TypeChecker, record: NamePtr) -> OrnResult<CorrespondenceDescriptor> {
    let env = tc.env;
    let r = env.expect_inductive(tc.ctx, record)?;
    let name = tc.ctx.name_to_string(record);
    let unsupported = |why: &str| Err(OrnamentError::UnsupportedShape(format!("{} {}", name, why)));
    if r.is_mutual() || r.is_coinductive {
        return unsupported("is mutual or coinductive")
    }
    if r.num_indices != 0 {
        return unsupported("is indexed")
    }
    if r.all_ctor_names.len() != 1 || r.is_recursive {
        return unsupported("is not a non-recursive record")
    }
    let ctor_name = r.all_ctor_names[0];
    let rec_name = rec_of(tc, record)?;
    let params = open_params(tc.ctx, r)?;
    let view = ctor_view(tc, record, ctor_name, &params)?;
    let num_fields = view.fields.len();
    if num_fields < 2 {
        return unsupported("has fewer than two fields")
    }

    let r_const = tc.ctx.mk_const(record);
    let r_params = tc.ctx.foldl_apps(r_const, params.iter().copied());
    let chain_ty = chain_type(tc.ctx, &view.fields)?;

    let motive_major = tc.ctx.mk_local("r", r_params);
    let motive = tc.ctx.abstr_lambda(motive_major, chain_ty);
    let pairs = chain_value(tc.ctx, &view.fields, &view.fields)?;
    let minor = tc.ctx.lambda_telescope(&view.fields, pairs);
    let major = tc.ctx.mk_local("r", r_params);
    let rec = tc.ctx.mk_const(rec_name);
    let promote_body = tc.ctx.foldl_apps(rec, params.iter().copied().chain([motive, minor, major]));
    let binders = params.iter().copied().chain(once(major)).collect::<Vec<_>>();
    let promote = tc.ctx.lambda_telescope(&binders, promote_body);

    let packed = tc.ctx.mk_local("c", chain_ty);
    let projections = chain_projections(tc.ctx, packed, num_fields);
    let mk = tc.ctx.mk_const(ctor_name);
    let forget_body = tc.ctx.foldl_apps(mk, params.iter().chain(projections.iter()).copied());
    let binders = params.iter().copied().chain(once(packed)).collect::<Vec<_>>();
    let forget = tc.ctx.lambda_telescope(&binders, forget_body);

    debug!(record = %name, num_fields, "discovered curry-record correspondence");
    Ok(CorrespondenceDescriptor {
        before: record,
        after: tc.ctx.name_cache.sigma,
        kind: CorrespondenceKind::CurryRecord { record, num_fields },
        indexer: None,
        promote,
        forget,
    })
}
