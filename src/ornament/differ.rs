//! Locating the inserted index by comparing the eliminators of two types case by case.
use super::{CaseAlignment, DiscoveryOptions, IndexDescriptor, Slot};
use crate::env::{Env, InductiveData};
use crate::errors::{malformed, OrnResult, OrnamentError};
use crate::expr::Expr;
use crate::introspect::{open_params, principle_signature, CaseSignature, PrincipleSignature};
use crate::tc::TypeChecker;
use crate::util::{new_fx_hash_map, Ctx, ExprPtr, FxHashMap, NamePtr};
use tracing::{debug, warn};

/// Find the position and type of the index `after` inserts into `before`, along with
/// the alignment of every constructor pair.
pub fn difference(
    ctx: &mut Ctx,
    env: &Env,
    before: NamePtr,
    after: NamePtr,
    options: &DiscoveryOptions,
) -> OrnResult<IndexDescriptor> {
    let mut tc = TypeChecker::new(ctx, env);
    difference_with(&mut tc, before, after, options)
}

pub(crate) fn difference_with(
    tc: &mut TypeChecker,
    before: NamePtr,
    after: NamePtr,
    options: &DiscoveryOptions,
) -> OrnResult<IndexDescriptor> {
    let env = tc.env;
    let a = env.expect_inductive(tc.ctx, before)?;
    let b = env.expect_inductive(tc.ctx, after)?;
    precheck(tc.ctx, a, b)?;

    let params = open_params(tc.ctx, a)?;
    share_params(tc, b, &params)?;
    let sig_a = principle_signature(tc, before, &params)?;
    let sig_b = principle_signature(tc, after, &params)?;

    let mut motive_aligned = Vec::new();
    let mut depends_on_indices = false;
    let mut first_failure = None;
    let mut confirmed = Vec::new();
    for position in 0..sig_b.motive_indices.len() {
        let index_ty = match check_motive(tc, &sig_a, &sig_b, position) {
            MotiveCheck::Aligned(index_ty) => index_ty,
            MotiveCheck::Dependent => {
                debug!(position, "index type depends on other indices");
                depends_on_indices = true;
                continue
            }
            MotiveCheck::Misaligned => {
                debug!(position, "motive indices do not align");
                continue
            }
        };
        motive_aligned.push(position);
        match align_cases(tc, &sig_a, &sig_b, position, index_ty, &params) {
            Ok(cases) => {
                debug!(position, "confirmed index position");
                confirmed.push((position, index_ty, cases));
                if options.first_candidate_wins {
                    break
                }
            }
            Err(e) => {
                debug!(position, error = %e, "rejected index position");
                first_failure.get_or_insert(e);
            }
        }
    }

    if confirmed.len() > 1 && !options.first_candidate_wins {
        return Err(OrnamentError::AmbiguousIndex {
            before: tc.ctx.name_to_string(before),
            after: tc.ctx.name_to_string(after),
            positions: confirmed.iter().map(|(p, ..)| *p).collect(),
        })
    }
    match confirmed.into_iter().next() {
        Some((position, index_ty, cases)) => Ok(IndexDescriptor {
            before,
            after,
            num_params: a.num_params,
            position,
            index_type: tc.ctx.lambda_telescope(&params, index_ty),
            cases,
        }),
        None => match first_failure {
            Some(e) => Err(e),
            None if depends_on_indices && motive_aligned.is_empty() => Err(OrnamentError::UnsupportedShape(format!(
                "the new index of {} depends on its other indices",
                tc.ctx.name_to_string(after)
            ))),
            None => Err(OrnamentError::NoIndexCandidate {
                before: tc.ctx.name_to_string(before),
                after: tc.ctx.name_to_string(after),
            }),
        },
    }
}

fn precheck(ctx: &Ctx, a: &InductiveData, b: &InductiveData) -> OrnResult<()> {
    let (a_str, b_str) = (ctx.name_to_string(a.info.name), ctx.name_to_string(b.info.name));
    let unsupported = |msg: String| Err(OrnamentError::UnsupportedShape(msg));
    if a.is_mutual() || b.is_mutual() {
        return unsupported(format!("mutually inductive declarations ({}, {})", a_str, b_str))
    }
    if a.is_coinductive || b.is_coinductive {
        return unsupported(format!("coinductive declarations ({}, {})", a_str, b_str))
    }
    if a.num_params != b.num_params {
        return unsupported(format!("{} has {} parameters but {} has {}", a_str, a.num_params, b_str, b.num_params))
    }
    if b.num_indices != a.num_indices + 1 {
        return unsupported(format!("{} must have exactly one more index than {}", b_str, a_str))
    }
    if a.all_ctor_names.len() != b.all_ctor_names.len() {
        return unsupported(format!("{} and {} have different numbers of constructors", a_str, b_str))
    }
    Ok(())
}

/// Check that `after`'s parameter telescope agrees with the already opened `params`.
fn share_params(tc: &mut TypeChecker, b: &InductiveData, params: &[ExprPtr]) -> OrnResult<()> {
    let mut ty = b.info.ty;
    for p in params.iter().copied() {
        let whnfd = tc.ensure_pi(ty, ty)?;
        ty = match tc.ctx.read_expr(whnfd) {
            Expr::Pi { binder_type, body, .. } => {
                let expected = tc.ctx.local_type(p);
                if !tc.def_eq(binder_type, expected) {
                    return Err(OrnamentError::UnsupportedShape(format!(
                        "the parameters of {} differ from those of the type it is related to",
                        tc.ctx.name_to_string(b.info.name)
                    )))
                }
                tc.ctx.inst1(body, p)
            }
            _ => return Err(malformed(tc.ctx.name_to_string(b.info.name), "fewer binders than parameters")),
        };
    }
    Ok(())
}

enum MotiveCheck {
    Aligned(ExprPtr),
    Dependent,
    Misaligned,
}

/// The motive indices of `B` without `position` must line up with those of `A`; the
/// index at `position` has the index type, which may only depend on the parameters.
fn check_motive(tc: &mut TypeChecker, sig_a: &PrincipleSignature, sig_b: &PrincipleSignature, position: usize) -> MotiveCheck {
    let (ias, ibs) = (&sig_a.motive_indices, &sig_b.motive_indices);
    if ibs.len() != ias.len() + 1 {
        return MotiveCheck::Misaligned
    }
    let new_index = ibs[position];
    let index_ty = tc.ctx.local_type(new_index);
    if ibs[..position].iter().any(|l| tc.ctx.has_local(index_ty, *l)) {
        return MotiveCheck::Dependent
    }
    let mut subst = new_fx_hash_map();
    let others = ibs.iter().copied().enumerate().filter(|(k, _)| *k != position).map(|(_, ib)| ib);
    for (ib, ia) in others.zip(ias.iter().copied()) {
        let ty = tc.ctx.local_type(ib);
        let ty = tc.ctx.replace_locals(ty, &subst);
        let expected = tc.ctx.local_type(ia);
        if tc.ctx.has_local(ty, new_index) || !tc.def_eq(ty, expected) {
            return MotiveCheck::Misaligned
        }
        subst.insert(ib, ia);
    }
    MotiveCheck::Aligned(index_ty)
}

fn align_cases(
    tc: &mut TypeChecker,
    sig_a: &PrincipleSignature,
    sig_b: &PrincipleSignature,
    position: usize,
    index_ty: ExprPtr,
    params: &[ExprPtr],
) -> OrnResult<Vec<CaseAlignment>> {
    let mut out = Vec::new();
    for (a, b) in sig_a.cases.iter().zip(sig_b.cases.iter()) {
        let search = CaseSearch { a, b, position, index_ty };
        let mut slots = Vec::new();
        let mut subst = new_fx_hash_map();
        if !search.search(tc, &mut slots, &mut subst) {
            return Err(OrnamentError::AlignmentFailure {
                ctor: tc.ctx.name_to_string(b.ctor_name),
                reason: format!(
                    "its arguments do not match those of {} with one index inserted at position {}",
                    tc.ctx.name_to_string(a.ctor_name),
                    position
                ),
            })
        }
        let binders = params.iter().chain(b.fields.iter()).copied().collect::<Vec<_>>();
        let conclusion_indices = b.conclusion_indices.iter().map(|c| tc.ctx.lambda_telescope(&binders, *c)).collect();
        let rec_pairs = slots
            .iter()
            .enumerate()
            .filter_map(|(b_pos, s)| match s {
                Slot::Shared(a_pos) if b.rec_fields.iter().any(|(pos, _)| *pos == b_pos) => Some((*a_pos, b_pos)),
                _ => None,
            })
            .collect();
        out.push(CaseAlignment { before_ctor: a.ctor_name, after_ctor: b.ctor_name, slots, rec_pairs, conclusion_indices });
    }
    Ok(out)
}

/// Backtracking alignment of one constructor pair. Every `B` argument either matches
/// the next `A` argument under the substitution built so far, or is a new index.
struct CaseSearch<'s> {
    a: &'s CaseSignature,
    b: &'s CaseSignature,
    position: usize,
    index_ty: ExprPtr,
}

impl<'s> CaseSearch<'s> {
    fn search(&self, tc: &mut TypeChecker, slots: &mut Vec<Slot>, subst: &mut FxHashMap<ExprPtr, ExprPtr>) -> bool {
        let i_b = slots.len();
        let i_a = slots.iter().filter(|s| matches!(s, Slot::Shared(_))).count();
        let (remaining_b, remaining_a) = (self.b.fields.len() - i_b, self.a.fields.len() - i_a);
        if remaining_b == 0 {
            return remaining_a == 0 && self.verify(tc, slots, subst)
        }
        if remaining_b < remaining_a {
            return false
        }
        let field_b = self.b.fields[i_b];
        let field_ty = tc.ctx.local_type(field_b);
        let ty_b = tc.ctx.replace_locals(field_ty, subst);

        if remaining_a > 0 && self.fields_match(tc, i_b, i_a, ty_b, subst) {
            slots.push(Slot::Shared(i_a));
            subst.insert(field_b, self.a.fields[i_a]);
            if self.search(tc, slots, subst) {
                return true
            }
            subst.remove(&field_b);
            slots.pop();
        }

        if tc.def_eq(ty_b, self.index_ty) {
            if remaining_b == remaining_a {
                warn!(
                    ctor = %tc.ctx.name_to_string(self.b.ctor_name),
                    arg = i_b,
                    "hypothesis of the index type leaves no room for an insertion; treating it as changed"
                );
            } else {
                slots.push(Slot::NewIndex { pinned_by: i_b });
                if self.search(tc, slots, subst) {
                    return true
                }
                slots.pop();
            }
        }
        false
    }

    fn fields_match(
        &self,
        tc: &mut TypeChecker,
        i_b: usize,
        i_a: usize,
        ty_b: ExprPtr,
        subst: &FxHashMap<ExprPtr, ExprPtr>,
    ) -> bool {
        let rec_b = self.b.rec_fields.iter().find(|(pos, _)| *pos == i_b);
        let rec_a = self.a.rec_fields.iter().find(|(pos, _)| *pos == i_a);
        match (rec_b, rec_a) {
            (Some((_, idxs_b)), Some((_, idxs_a))) => {
                if idxs_b.len() != idxs_a.len() + 1 {
                    return false
                }
                let others = idxs_b.iter().copied().enumerate().filter(|(k, _)| *k != self.position).map(|(_, x)| x);
                for (ib, ia) in others.zip(idxs_a.iter().copied()) {
                    let ib = tc.ctx.replace_locals(ib, subst);
                    if !tc.def_eq(ib, ia) {
                        return false
                    }
                }
                true
            }
            (None, None) => {
                let ty_a = tc.ctx.local_type(self.a.fields[i_a]);
                tc.def_eq(ty_b, ty_a)
            }
            _ => false,
        }
    }

    /// Every new index is the inserted index of exactly one recursive argument, every
    /// recursive argument's inserted index is a new index, and the conclusions agree
    /// away from the inserted position.
    fn verify(&self, tc: &mut TypeChecker, slots: &mut [Slot], subst: &FxHashMap<ExprPtr, ExprPtr>) -> bool {
        let p = self.position;
        let mut pinned = slots.to_vec();
        for (k, slot) in slots.iter().enumerate() {
            if let Slot::NewIndex { .. } = slot {
                let local = self.b.fields[k];
                let pinning = self
                    .b
                    .rec_fields
                    .iter()
                    .filter(|(_, idxs)| idxs.get(p) == Some(&local))
                    .map(|(pos, _)| *pos)
                    .collect::<Vec<_>>();
                match pinning.as_slice() {
                    [pos] => pinned[k] = Slot::NewIndex { pinned_by: *pos },
                    _ => return false,
                }
            }
        }
        for (_, idxs) in self.b.rec_fields.iter() {
            let is_new_index = idxs.get(p).and_then(|x| self.b.fields.iter().position(|f| f == x)).map(|k| slots[k]);
            if !matches!(is_new_index, Some(Slot::NewIndex { .. })) {
                return false
            }
        }
        let (conc_a, conc_b) = (&self.a.conclusion_indices, &self.b.conclusion_indices);
        if conc_b.len() != conc_a.len() + 1 {
            return false
        }
        let others = conc_b.iter().copied().enumerate().filter(|(k, _)| *k != p).map(|(_, x)| x);
        for (cb, ca) in others.zip(conc_a.iter().copied()) {
            let cb = tc.ctx.replace_locals(cb, subst);
            if !tc.def_eq(cb, ca) {
                return false
            }
        }
        slots.copy_from_slice(&pinned);
        true
    }
}
