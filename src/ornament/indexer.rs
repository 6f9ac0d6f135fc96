use super::{IndexDescriptor, Slot};
use crate::errors::{malformed, OrnResult, OrnamentError};
use crate::introspect::{ctor_view, open_indices, open_params, CtorView};
use crate::tc::TypeChecker;
use crate::util::{Ctx, ExprPtr, NamePtr};

/// The eliminator of `ind_name`, or `UnsupportedShape` if it has none.
pub(crate) fn rec_of(tc: &TypeChecker, ind_name: NamePtr) -> OrnResult<NamePtr> {
    let ind = tc.env.expect_inductive(tc.ctx, ind_name)?;
    ind.rec_name
        .ok_or_else(|| OrnamentError::UnsupportedShape(format!("{} has no eliminator", tc.ctx.name_to_string(ind_name))))
}

/// The arguments of the `B` constructor of `case`, read off the opened `A` constructor:
/// shared arguments come from `shared` (the fields, or their inductive hypotheses for
/// recursive fields), new indices from `new_index(a_pos)` for the pinning `A` field.
pub(crate) fn after_args(
    index: &IndexDescriptor,
    case: usize,
    mut shared: impl FnMut(usize) -> ExprPtr,
    mut new_index: impl FnMut(usize) -> OrnResult<ExprPtr>,
) -> OrnResult<Vec<ExprPtr>> {
    let alignment = &index.cases[case];
    let mut out = Vec::with_capacity(alignment.slots.len());
    for (b_pos, slot) in alignment.slots.iter().enumerate() {
        match slot {
            Slot::Shared(a_pos) => out.push(shared(*a_pos)),
            Slot::NewIndex { .. } => match alignment.pinning_before_pos(b_pos) {
                Some(a_pos) => out.push(new_index(a_pos)?),
                None => return Err(malformed(format!("case {}", case), "new index pinned by no recursive argument")),
            },
        }
    }
    Ok(out)
}

/// `indexer ps is a`, beta-reduced into an application of `A.rec`.
pub(crate) fn apply_indexer(ctx: &mut Ctx, indexer: ExprPtr, params: &[ExprPtr], indices: &[ExprPtr], a: ExprPtr) -> ExprPtr {
    let applied = ctx.foldl_apps(indexer, params.iter().chain(indices.iter()).copied().chain(std::iter::once(a)));
    ctx.head_beta(applied)
}

/// `λ ps is (a : A ps is), A.rec ps (λ is a, I ps) minors is a`, where the minor for a
/// constructor computes the constructor's index term in `B`, with each new index
/// replaced by the inductive hypothesis of the recursive argument it belongs to.
pub(crate) fn indexer_with(tc: &mut TypeChecker, index: &IndexDescriptor) -> OrnResult<ExprPtr> {
    let env = tc.env;
    let a = env.expect_inductive(tc.ctx, index.before)?;
    let rec_name = rec_of(tc, index.before)?;
    let params = open_params(tc.ctx, a)?;
    let index_ty = index.index_type_at(tc.ctx, &params);
    let a_const = tc.ctx.mk_const(index.before);
    let a_params = tc.ctx.foldl_apps(a_const, params.iter().copied());

    let motive_indices = open_indices(tc, a, &params)?;
    let motive_major_ty = tc.ctx.foldl_apps(a_params, motive_indices.iter().copied());
    let motive_major = tc.ctx.mk_local("a", motive_major_ty);
    let motive_binders = motive_indices.iter().copied().chain(std::iter::once(motive_major)).collect::<Vec<_>>();
    let motive = tc.ctx.lambda_telescope(&motive_binders, index_ty);

    let mut minors = Vec::new();
    for (case, ctor_name) in a.all_ctor_names.iter().copied().enumerate() {
        let view = ctor_view(tc, index.before, ctor_name, &params)?;
        let ihs = view.rec_fields.iter().map(|_| tc.ctx.mk_local("ih", index_ty)).collect::<Vec<_>>();
        let args = after_args(index, case, |a_pos| view.fields[a_pos], |a_pos| ih_for(tc.ctx, &view, &ihs, a_pos))?;
        let index_term = index.cases[case].conclusion_indices[index.position];
        let body = tc.ctx.foldl_apps(index_term, params.iter().chain(args.iter()).copied());
        let body = tc.ctx.head_beta(body);
        let binders = view.fields.iter().chain(ihs.iter()).copied().collect::<Vec<_>>();
        minors.push(tc.ctx.lambda_telescope(&binders, body));
    }

    let indices = open_indices(tc, a, &params)?;
    let major_ty = tc.ctx.foldl_apps(a_params, indices.iter().copied());
    let major = tc.ctx.mk_local("a", major_ty);
    let rec = tc.ctx.mk_const(rec_name);
    let body = tc.ctx.foldl_apps(
        rec,
        params
            .iter()
            .copied()
            .chain(std::iter::once(motive))
            .chain(minors)
            .chain(indices.iter().copied())
            .chain(std::iter::once(major)),
    );
    let binders = params.iter().chain(indices.iter()).copied().chain(std::iter::once(major)).collect::<Vec<_>>();
    Ok(tc.ctx.lambda_telescope(&binders, body))
}

fn ih_for(ctx: &Ctx, view: &CtorView, ihs: &[ExprPtr], a_pos: usize) -> OrnResult<ExprPtr> {
    match view.ih_of(a_pos) {
        Some(h) => Ok(ihs[h]),
        None => Err(malformed(ctx.name_to_string(view.name), "new index paired with a non-recursive argument")),
    }
}
