use super::indexer::{after_args, apply_indexer, rec_of};
use super::IndexDescriptor;
use crate::errors::{malformed, OrnResult};
use crate::introspect::{ctor_view, open_indices, open_params};
use crate::pack::pack;
use crate::tc::TypeChecker;
use crate::util::ExprPtr;
use std::iter::once;

/// `promote = λ ps is (a : A ps is), Sigma.mk (I ps) F (indexer ps is a) (A.rec ps P minors is a)`
/// with `P = λ is a, B ps (ins is (indexer ps is a))`. Each minor rebuilds the `B`
/// constructor from the `A` fields: recursive fields become their (already promoted)
/// inductive hypotheses, and new indices are the indexer applied to the recursive
/// field they belong to.
///
/// `forget = λ ps is (pb : Sigma (I ps) F), B.rec ps Q minors (ins is (π₀ pb)) (π₁ pb)`
/// with `Q = λ is b, A ps (del is)`. Each minor drops the new indices and rebuilds the
/// `A` constructor, using inductive hypotheses for recursive fields.
pub(crate) fn promote_forget_with(tc: &mut TypeChecker, index: &IndexDescriptor, indexer: ExprPtr) -> OrnResult<(ExprPtr, ExprPtr)> {
    let promote = promote_with(tc, index, indexer)?;
    let forget = forget_with(tc, index)?;
    Ok((promote, forget))
}

fn promote_with(tc: &mut TypeChecker, index: &IndexDescriptor, indexer: ExprPtr) -> OrnResult<ExprPtr> {
    let env = tc.env;
    let a = env.expect_inductive(tc.ctx, index.before)?;
    let rec_name = rec_of(tc, index.before)?;
    let params = open_params(tc.ctx, a)?;
    let a_const = tc.ctx.mk_const(index.before);
    let a_params = tc.ctx.foldl_apps(a_const, params.iter().copied());
    let b_const = tc.ctx.mk_const(index.after);
    let b_params = tc.ctx.foldl_apps(b_const, params.iter().copied());

    // P = λ is a, B ps (ins is (indexer ps is a))
    let motive_indices = open_indices(tc, a, &params)?;
    let motive_major_ty = tc.ctx.foldl_apps(a_params, motive_indices.iter().copied());
    let motive_major = tc.ctx.mk_local("a", motive_major_ty);
    let motive_index = apply_indexer(tc.ctx, indexer, &params, &motive_indices, motive_major);
    let motive_body = tc.ctx.foldl_apps(b_params, index.insert_index(&motive_indices, motive_index));
    let motive_binders = motive_indices.iter().copied().chain(once(motive_major)).collect::<Vec<_>>();
    let motive = tc.ctx.lambda_telescope(&motive_binders, motive_body);

    let mut minors = Vec::new();
    for (case, ctor_name) in a.all_ctor_names.iter().copied().enumerate() {
        let view = ctor_view(tc, index.before, ctor_name, &params)?;
        let mut ihs = Vec::new();
        for (pos, idxs) in view.rec_fields.iter() {
            let n = apply_indexer(tc.ctx, indexer, &params, idxs, view.fields[*pos]);
            let ih_ty = tc.ctx.foldl_apps(b_params, index.insert_index(idxs, n));
            ihs.push(tc.ctx.mk_local("ih", ih_ty));
        }
        let mut new_indices = Vec::new();
        for (a_pos, field) in view.fields.iter().copied().enumerate() {
            new_indices.push(match view.rec_indices(a_pos) {
                Some(idxs) => {
                    let idxs = idxs.to_vec();
                    Some(apply_indexer(tc.ctx, indexer, &params, &idxs, field))
                }
                None => None,
            });
        }
        let args = after_args(
            index,
            case,
            |a_pos| match view.ih_of(a_pos) {
                Some(h) => ihs[h],
                None => view.fields[a_pos],
            },
            |a_pos| new_indices[a_pos].ok_or_else(|| malformed(format!("case {}", case), "new index of a non-recursive argument")),
        )?;
        let after_ctor = tc.ctx.mk_const(index.cases[case].after_ctor);
        let body = tc.ctx.foldl_apps(after_ctor, params.iter().chain(args.iter()).copied());
        let binders = view.fields.iter().chain(ihs.iter()).copied().collect::<Vec<_>>();
        minors.push(tc.ctx.lambda_telescope(&binders, body));
    }

    let indices = open_indices(tc, a, &params)?;
    let major_ty = tc.ctx.foldl_apps(a_params, indices.iter().copied());
    let major = tc.ctx.mk_local("a", major_ty);
    let rec = tc.ctx.mk_const(rec_name);
    let value = tc.ctx.foldl_apps(
        rec,
        params.iter().copied().chain(once(motive)).chain(minors).chain(indices.iter().copied()).chain(once(major)),
    );
    let index_ty = index.index_type_at(tc.ctx, &params);
    let family = index.family_at(tc.ctx, &params, &indices);
    let n = apply_indexer(tc.ctx, indexer, &params, &indices, major);
    let body = pack(tc.ctx, index_ty, family, n, value);
    let binders = params.iter().chain(indices.iter()).copied().chain(once(major)).collect::<Vec<_>>();
    Ok(tc.ctx.lambda_telescope(&binders, body))
}

fn forget_with(tc: &mut TypeChecker, index: &IndexDescriptor) -> OrnResult<ExprPtr> {
    let env = tc.env;
    let a = env.expect_inductive(tc.ctx, index.before)?;
    let b = env.expect_inductive(tc.ctx, index.after)?;
    let rec_name = rec_of(tc, index.after)?;
    let params = open_params(tc.ctx, a)?;
    let a_const = tc.ctx.mk_const(index.before);
    let a_params = tc.ctx.foldl_apps(a_const, params.iter().copied());
    let b_const = tc.ctx.mk_const(index.after);
    let b_params = tc.ctx.foldl_apps(b_const, params.iter().copied());

    // Q = λ is b, A ps (del is)
    let motive_indices = open_indices(tc, b, &params)?;
    let motive_major_ty = tc.ctx.foldl_apps(b_params, motive_indices.iter().copied());
    let motive_major = tc.ctx.mk_local("b", motive_major_ty);
    let motive_body = tc.ctx.foldl_apps(a_params, index.delete_index(&motive_indices));
    let motive_binders = motive_indices.iter().copied().chain(once(motive_major)).collect::<Vec<_>>();
    let motive = tc.ctx.lambda_telescope(&motive_binders, motive_body);

    let mut minors = Vec::new();
    for (case, ctor_name) in b.all_ctor_names.iter().copied().enumerate() {
        let alignment = &index.cases[case];
        let view = ctor_view(tc, index.after, ctor_name, &params)?;
        let mut ihs = Vec::new();
        for (_, idxs) in view.rec_fields.iter() {
            let ih_ty = tc.ctx.foldl_apps(a_params, index.delete_index(idxs));
            ihs.push(tc.ctx.mk_local("ih", ih_ty));
        }
        let num_before_fields = alignment.slots.len() - alignment.num_new_indices();
        let mut args = Vec::with_capacity(num_before_fields);
        for a_pos in 0..num_before_fields {
            let b_pos = alignment
                .after_pos_of(a_pos)
                .ok_or_else(|| malformed(tc.ctx.name_to_string(ctor_name), "argument with no counterpart"))?;
            args.push(match view.ih_of(b_pos) {
                Some(h) => ihs[h],
                None => view.fields[b_pos],
            });
        }
        let before_ctor = tc.ctx.mk_const(alignment.before_ctor);
        let body = tc.ctx.foldl_apps(before_ctor, params.iter().chain(args.iter()).copied());
        let binders = view.fields.iter().chain(ihs.iter()).copied().collect::<Vec<_>>();
        minors.push(tc.ctx.lambda_telescope(&binders, body));
    }

    let indices = open_indices(tc, a, &params)?;
    let packed_ty = index.packed_type_at(tc.ctx, &params, &indices);
    let packed = tc.ctx.mk_local("pb", packed_ty);
    let sigma = tc.ctx.name_cache.sigma;
    let n = tc.ctx.mk_proj(sigma, 0, packed);
    let value = tc.ctx.mk_proj(sigma, 1, packed);
    let rec = tc.ctx.mk_const(rec_name);
    let body = tc.ctx.foldl_apps(
        rec,
        params
            .iter()
            .copied()
            .chain(once(motive))
            .chain(minors)
            .chain(index.insert_index(&indices, n))
            .chain(once(value)),
    );
    let binders = params.iter().chain(indices.iter()).copied().chain(once(packed)).collect::<Vec<_>>();
    Ok(tc.ctx.lambda_telescope(&binders, body))
}

