//! Structural rules for a correspondence that inserts one index.
use super::rules::StructuralRule;
use super::{Lifter, Shape};
use crate::errors::{malformed, OrnResult, OrnamentError};
use crate::expr::Expr::*;
use crate::introspect::{ctor_view, open_indices};
use crate::ornament::indexer::{after_args, apply_indexer};
use crate::ornament::{IndexDescriptor, Slot};
use crate::pack::{as_eta_pack, as_packed_type, pack, packed_type, project_index, project_value};
use crate::util::{ExprPtr, NamePtr};
use std::iter::once;

/// The pieces of a full eliminator application `rec ps motive minors is major extra`.
struct RecApp {
    params: Vec<ExprPtr>,
    motive: ExprPtr,
    minors: Vec<ExprPtr>,
    indices: Vec<ExprPtr>,
    major: ExprPtr,
    extra: Vec<ExprPtr>,
}

impl<'x, 'c> Lifter<'x, 'c> {
    fn algebraic_parts(&self) -> OrnResult<(IndexDescriptor, ExprPtr, NamePtr, NamePtr)> {
        match &self.shape {
            Shape::Algebraic { index, indexer, before_rec, after_rec } => Ok((index.clone(), *indexer, *before_rec, *after_rec)),
            Shape::Record(r) => Err(malformed(self.tc.ctx.name_to_string(r.record), "not an algebraic correspondence")),
        }
    }

    fn split_rec_app(&self, rec_name: NamePtr, e: ExprPtr) -> OrnResult<RecApp> {
        let env = self.tc.env;
        let rec = env.get_rec(&rec_name).ok_or_else(|| OrnamentError::UnknownDeclaration(self.tc.ctx.name_to_string(rec_name)))?;
        let (_, args) = self.tc.ctx.unfold_apps(e);
        let major_idx = rec.major_idx();
        if args.len() <= major_idx {
            return Err(malformed(self.tc.ctx.name_to_string(rec_name), "under-applied eliminator"))
        }
        Ok(RecApp {
            params: args[..rec.motive_idx()].to_vec(),
            motive: args[rec.motive_idx()],
            minors: args[rec.minors_start()..rec.indices_start()].to_vec(),
            indices: args[rec.indices_start()..major_idx].to_vec(),
            major: args[major_idx],
            extra: args[major_idx + 1..].to_vec(),
        })
    }

    /// `(ps, is)` if `ty` is `Sigma (I ps) (λ n, B ps (ins is n))`, or the eta-short
    /// `Sigma (I ps) (B ps is)` when the new index comes last.
    pub(crate) fn as_packed_after(&mut self, ty: ExprPtr) -> Option<(Vec<ExprPtr>, Vec<ExprPtr>)> {
        let index = match &self.shape {
            Shape::Algebraic { index, .. } => index,
            Shape::Record(_) => return None,
        };
        let ctx = &mut *self.tc.ctx;
        let (_, family) = as_packed_type(ctx, ty)?;
        let body = match ctx.read_expr(family) {
            Lambda { body, .. } => body,
            _ => {
                let family = ctx.lift_loose_bvars(family, 1);
                let n = ctx.mk_var(0);
                ctx.mk_app(family, n)
            }
        };
        let (head, args) = ctx.unfold_apps(body);
        let np = index.num_params as usize;
        if ctx.const_name(head) != Some(index.after) || args.len() <= np + index.position {
            return None
        }
        let (params, indices) = args.split_at(np);
        if !matches!(ctx.read_expr(indices[index.position]), Var { dbj_idx: 0, .. }) {
            return None
        }
        let rest = index.delete_index(indices);
        if params.iter().chain(rest.iter()).any(|x| ctx.num_loose_bvars(*x) > 0) {
            return None
        }
        Some((params.to_vec(), rest))
    }

    /// Packs, pack types and projections out of packs, lifting backward.
    pub(crate) fn backward_packing_rule(
        &mut self,
        e: ExprPtr,
        name: Option<NamePtr>,
        args: &[ExprPtr],
    ) -> OrnResult<Option<StructuralRule>> {
        let names = self.tc.ctx.name_cache;
        if name == Some(names.sigma) && args.len() == 2 && self.as_packed_after(e).is_some() {
            return Ok(Some(StructuralRule::TypeFormer))
        }
        if name == Some(names.sigma_mk) && args.len() == 4 {
            let ty = packed_type(self.tc.ctx, args[0], args[1]);
            if self.as_packed_after(ty).is_some() {
                return Ok(Some(StructuralRule::Constructor))
            }
        }
        if let Proj { ty_name, structure, .. } = self.tc.ctx.read_expr(e) {
            if ty_name == names.sigma {
                let ty = self.tc.infer(structure)?;
                let ty = self.tc.whnf(ty);
                if self.as_packed_after(ty).is_some() {
                    return Ok(Some(StructuralRule::IndexProjection))
                }
            }
        }
        Ok(None)
    }

    pub(crate) fn forward_algebraic(&mut self, e: ExprPtr, rule: StructuralRule) -> OrnResult<ExprPtr> {
        let (index, _, before_rec, after_rec) = self.algebraic_parts()?;
        let np = index.num_params as usize;
        match rule {
            StructuralRule::TypeFormer => {
                let (_, args) = self.tc.ctx.unfold_apps(e);
                let args = self.lift_all(&args)?;
                let (params, indices) = args.split_at(np.min(args.len()));
                Ok(index.packed_type_at(self.tc.ctx, params, indices))
            }
            StructuralRule::Constructor => self.forward_constructor(&index, e),
            StructuralRule::Eliminator => self.forward_eliminator(&index, before_rec, after_rec, e),
            _ => Err(malformed(format!("{:?}", self.tc.ctx.debug_print(e)), "no forward rule applies")),
        }
    }

    /// `c_a ps args` to `Sigma.mk (I ps) F n (c_b ps bargs)`, where recursive arguments
    /// are unpacked and each new index is the index of the argument it belongs to.
    fn forward_constructor(&mut self, index: &IndexDescriptor, e: ExprPtr) -> OrnResult<ExprPtr> {
        let env = self.tc.env;
        let (head, args) = self.tc.ctx.unfold_apps(e);
        let ctor = self
            .tc
            .ctx
            .const_name(head)
            .and_then(|n| env.get_ctor(&n))
            .ok_or_else(|| malformed(format!("{:?}", self.tc.ctx.debug_print(head)), "expected a constructor"))?;
        let case = ctor.ctor_idx as usize;
        let np = index.num_params as usize;
        let args = self.lift_all(&args)?;
        let (params, fields) = args.split_at(np);
        let alignment = &index.cases[case];
        let mut values = Vec::with_capacity(fields.len());
        let mut new_indices = Vec::with_capacity(fields.len());
        for (a_pos, field) in fields.iter().copied().enumerate() {
            if alignment.rec_pairs.iter().any(|(a, _)| *a == a_pos) {
                values.push(project_value(self.tc.ctx, field));
                new_indices.push(Some(project_index(self.tc.ctx, field)));
            } else {
                values.push(field);
                new_indices.push(None);
            }
        }
        let bargs = after_args(
            index,
            case,
            |a_pos| values[a_pos],
            |a_pos| new_indices[a_pos].ok_or_else(|| malformed(format!("case {}", case), "new index of a non-recursive argument")),
        )?;
        let conclusion = index.conclusion_at(self.tc.ctx, case, params, &bargs);
        let n = conclusion[index.position];
        let rest = index.delete_index(&conclusion);
        let index_ty = index.index_type_at(self.tc.ctx, params);
        let family = index.family_at(self.tc.ctx, params, &rest);
        let after_ctor = self.tc.ctx.mk_const(alignment.after_ctor);
        let value = self.tc.ctx.foldl_apps(after_ctor, params.iter().chain(bargs.iter()).copied());
        Ok(pack(self.tc.ctx, index_ty, family, n, value))
    }

    /// `A.rec ps P ms is a` to `B.rec ps' P' ms' (ins is' (π₀ a')) (π₁ a')`. The motive and
    /// minors are reopened over `B`'s telescopes, with each `A`-side binder mapped to the
    /// `B`-side term it corresponds to: recursive arguments to packs of their `B`
    /// counterparts and inductive hypotheses to the `B` inductive hypotheses.
    fn forward_eliminator(&mut self, index: &IndexDescriptor, before_rec: NamePtr, after_rec: NamePtr, e: ExprPtr) -> OrnResult<ExprPtr> {
        let env = self.tc.env;
        let a_ind = env.expect_inductive(self.tc.ctx, index.before)?;
        let b_ind = env.expect_inductive(self.tc.ctx, index.after)?;
        let app = self.split_rec_app(before_rec, e)?;
        let params = self.lift_all(&app.params)?;
        let index_ty = index.index_type_at(self.tc.ctx, &params);

        let b_indices = open_indices(&mut self.tc, b_ind, &params)?;
        let b_const = self.tc.ctx.mk_const(index.after);
        let b_ty = self.tc.ctx.foldl_apps(b_const, params.iter().chain(b_indices.iter()).copied());
        let b = self.tc.ctx.mk_local("b", b_ty);
        let a_indices = open_indices(&mut self.tc, a_ind, &app.params)?;
        let a_const = self.tc.ctx.mk_const(index.before);
        let a_ty = self.tc.ctx.foldl_apps(a_const, app.params.iter().chain(a_indices.iter()).copied());
        let a = self.tc.ctx.mk_local("a", a_ty);
        let motive_body = self.tc.ctx.foldl_apps(app.motive, a_indices.iter().copied().chain(once(a)));
        let motive_body = self.tc.ctx.head_beta(motive_body);
        let rest = index.delete_index(&b_indices);
        let family = index.family_at(self.tc.ctx, &params, &rest);
        let packed = pack(self.tc.ctx, index_ty, family, b_indices[index.position], b);
        self.bind_locals(&a_indices, &rest);
        self.bind_locals(&[a], &[packed]);
        let motive_body = self.under_binders(b_indices.len() + 1, |this| this.lift_term(motive_body))?;
        let motive_binders = b_indices.iter().copied().chain(once(b)).collect::<Vec<_>>();
        let motive = self.tc.ctx.lambda_telescope(&motive_binders, motive_body);

        let mut minors = Vec::with_capacity(app.minors.len());
        for (case, minor) in app.minors.iter().copied().enumerate() {
            let alignment = index.cases[case].clone();
            let view_a = ctor_view(&mut self.tc, index.before, alignment.before_ctor, &app.params)?;
            let mut a_ihs = Vec::with_capacity(view_a.rec_fields.len());
            for (pos, idxs) in view_a.rec_fields.iter() {
                let ty = self.tc.ctx.foldl_apps(app.motive, idxs.iter().copied().chain(once(view_a.fields[*pos])));
                let ty = self.tc.ctx.head_beta(ty);
                a_ihs.push(self.tc.ctx.mk_local("ih", ty));
            }
            let body = self.tc.ctx.foldl_apps(minor, view_a.fields.iter().chain(a_ihs.iter()).copied());
            let body = self.tc.ctx.head_beta(body);

            let view_b = ctor_view(&mut self.tc, index.after, alignment.after_ctor, &params)?;
            let mut b_ihs = Vec::with_capacity(view_b.rec_fields.len());
            for (pos, idxs) in view_b.rec_fields.iter() {
                let ty = self.tc.ctx.foldl_apps(motive, idxs.iter().copied().chain(once(view_b.fields[*pos])));
                let ty = self.tc.ctx.head_beta(ty);
                b_ihs.push(self.tc.ctx.mk_local("ih", ty));
            }

            let mut field_targets = Vec::with_capacity(view_a.fields.len());
            for a_pos in 0..view_a.fields.len() {
                let b_pos = alignment
                    .after_pos_of(a_pos)
                    .ok_or_else(|| malformed(self.tc.ctx.name_to_string(alignment.before_ctor), "argument with no counterpart"))?;
                let target = match view_b.rec_indices(b_pos) {
                    Some(idxs) => {
                        let idxs = idxs.to_vec();
                        let rest = index.delete_index(&idxs);
                        let family = index.family_at(self.tc.ctx, &params, &rest);
                        pack(self.tc.ctx, index_ty, family, idxs[index.position], view_b.fields[b_pos])
                    }
                    None => view_b.fields[b_pos],
                };
                field_targets.push(target);
            }
            let mut ih_targets = Vec::with_capacity(a_ihs.len());
            for (a_pos, _) in view_a.rec_fields.iter() {
                let h = alignment
                    .after_pos_of(*a_pos)
                    .and_then(|b_pos| view_b.ih_of(b_pos))
                    .ok_or_else(|| malformed(self.tc.ctx.name_to_string(alignment.before_ctor), "unpaired recursive argument"))?;
                ih_targets.push(b_ihs[h]);
            }
            self.bind_locals(&view_a.fields, &field_targets);
            self.bind_locals(&a_ihs, &ih_targets);
            let binders = view_b.fields.iter().chain(b_ihs.iter()).copied().collect::<Vec<_>>();
            let body = self.under_binders(binders.len(), |this| this.lift_term(body))?;
            minors.push(self.tc.ctx.lambda_telescope(&binders, body));
        }

        let indices = self.lift_all(&app.indices)?;
        let major = self.lift_term(app.major)?;
        let extra = self.lift_all(&app.extra)?;
        let n = project_index(self.tc.ctx, major);
        let value = project_value(self.tc.ctx, major);
        let rec = self.tc.ctx.mk_const(after_rec);
        Ok(self.tc.ctx.foldl_apps(
            rec,
            params
                .into_iter()
                .chain(once(motive))
                .chain(minors)
                .chain(index.insert_index(&indices, n))
                .chain(once(value))
                .chain(extra),
        ))
    }

    pub(crate) fn backward_algebraic(&mut self, e: ExprPtr, rule: StructuralRule) -> OrnResult<ExprPtr> {
        let (index, indexer, before_rec, after_rec) = self.algebraic_parts()?;
        let np = index.num_params as usize;
        let names = self.tc.ctx.name_cache;
        let (head, args) = self.tc.ctx.unfold_apps(e);
        let head_name = self.tc.ctx.const_name(head);
        match rule {
            StructuralRule::TypeFormer => {
                let (params, indices) = if head_name == Some(names.sigma) {
                    self.as_packed_after(e).ok_or_else(|| malformed(format!("{:?}", self.tc.ctx.debug_print(e)), "expected a packed type"))?
                } else {
                    let (params, indices) = args.split_at(np.min(args.len()));
                    (params.to_vec(), index.delete_index(indices))
                };
                let params = self.lift_all(&params)?;
                let indices = self.lift_all(&indices)?;
                let a_const = self.tc.ctx.mk_const(index.before);
                Ok(self.tc.ctx.foldl_apps(a_const, params.into_iter().chain(indices)))
            }
            StructuralRule::Constructor if head_name == Some(names.sigma_mk) => match as_eta_pack(self.tc.ctx, e) {
                Some(x) => self.lift_term(x),
                None => self.lift_term(args[3]),
            },
            StructuralRule::Constructor => {
                let env = self.tc.env;
                let ctor = head_name
                    .and_then(|n| env.get_ctor(&n))
                    .ok_or_else(|| malformed(format!("{:?}", self.tc.ctx.debug_print(head)), "expected a constructor"))?;
                let alignment = index.cases[ctor.ctor_idx as usize].clone();
                let params = self.lift_all(&args[..np])?;
                let fields = &args[np..];
                let num_before = alignment.slots.len() - alignment.num_new_indices();
                let mut before_args = Vec::with_capacity(num_before);
                for a_pos in 0..num_before {
                    let b_pos = alignment
                        .after_pos_of(a_pos)
                        .ok_or_else(|| malformed(self.tc.ctx.name_to_string(alignment.after_ctor), "argument with no counterpart"))?;
                    before_args.push(self.lift_term(fields[b_pos])?);
                }
                let before_ctor = self.tc.ctx.mk_const(alignment.before_ctor);
                Ok(self.tc.ctx.foldl_apps(before_ctor, params.into_iter().chain(before_args)))
            }
            StructuralRule::IndexProjection => {
                let (idx, structure) = match self.tc.ctx.read_expr(e) {
                    Proj { idx, structure, .. } => (idx, structure),
                    _ => return Err(malformed(format!("{:?}", self.tc.ctx.debug_print(e)), "expected a projection")),
                };
                let lifted = self.lift_term(structure)?;
                if idx != 0 {
                    return Ok(lifted)
                }
                let ty = self.tc.infer(structure)?;
                let ty = self.tc.whnf(ty);
                let (params, indices) = self
                    .as_packed_after(ty)
                    .ok_or_else(|| malformed(format!("{:?}", self.tc.ctx.debug_print(e)), "projection out of an unpacked value"))?;
                let params = self.lift_all(&params)?;
                let indices = self.lift_all(&indices)?;
                Ok(apply_indexer(self.tc.ctx, indexer, &params, &indices, lifted))
            }
            StructuralRule::Eliminator => self.backward_eliminator(&index, indexer, before_rec, after_rec, e),
            _ => Err(malformed(format!("{:?}", self.tc.ctx.debug_print(e)), "no backward rule applies")),
        }
    }

    /// `B.rec ps Q ms is b` to `A.rec ps' Q' ms' (del is') b'`, where the new index of the
    /// motive and of each recursive argument becomes the indexer applied to the
    /// corresponding `A` value.
    fn backward_eliminator(
        &mut self,
        index: &IndexDescriptor,
        indexer: ExprPtr,
        before_rec: NamePtr,
        after_rec: NamePtr,
        e: ExprPtr,
    ) -> OrnResult<ExprPtr> {
        let env = self.tc.env;
        let a_ind = env.expect_inductive(self.tc.ctx, index.before)?;
        let b_ind = env.expect_inductive(self.tc.ctx, index.after)?;
        let app = self.split_rec_app(after_rec, e)?;
        let params = self.lift_all(&app.params)?;

        let a_indices = open_indices(&mut self.tc, a_ind, &params)?;
        let a_const = self.tc.ctx.mk_const(index.before);
        let a_ty = self.tc.ctx.foldl_apps(a_const, params.iter().chain(a_indices.iter()).copied());
        let a = self.tc.ctx.mk_local("a", a_ty);
        let b_indices = open_indices(&mut self.tc, b_ind, &app.params)?;
        let b_const = self.tc.ctx.mk_const(index.after);
        let b_ty = self.tc.ctx.foldl_apps(b_const, app.params.iter().chain(b_indices.iter()).copied());
        let b = self.tc.ctx.mk_local("b", b_ty);
        let motive_body = self.tc.ctx.foldl_apps(app.motive, b_indices.iter().copied().chain(once(b)));
        let motive_body = self.tc.ctx.head_beta(motive_body);
        let n = apply_indexer(self.tc.ctx, indexer, &params, &a_indices, a);
        let targets = index.insert_index(&a_indices, n);
        self.bind_locals(&b_indices, &targets);
        self.bind_locals(&[b], &[a]);
        let motive_body = self.under_binders(a_indices.len() + 1, |this| this.lift_term(motive_body))?;
        let motive_binders = a_indices.iter().copied().chain(once(a)).collect::<Vec<_>>();
        let motive = self.tc.ctx.lambda_telescope(&motive_binders, motive_body);

        let mut minors = Vec::with_capacity(app.minors.len());
        for (case, minor) in app.minors.iter().copied().enumerate() {
            let alignment = index.cases[case].clone();
            let view_b = ctor_view(&mut self.tc, index.after, alignment.after_ctor, &app.params)?;
            let mut b_ihs = Vec::with_capacity(view_b.rec_fields.len());
            for (pos, idxs) in view_b.rec_fields.iter() {
                let ty = self.tc.ctx.foldl_apps(app.motive, idxs.iter().copied().chain(once(view_b.fields[*pos])));
                let ty = self.tc.ctx.head_beta(ty);
                b_ihs.push(self.tc.ctx.mk_local("ih", ty));
            }
            let body = self.tc.ctx.foldl_apps(minor, view_b.fields.iter().chain(b_ihs.iter()).copied());
            let body = self.tc.ctx.head_beta(body);

            let view_a = ctor_view(&mut self.tc, index.before, alignment.before_ctor, &params)?;
            let mut a_ihs = Vec::with_capacity(view_a.rec_fields.len());
            for (pos, idxs) in view_a.rec_fields.iter() {
                let ty = self.tc.ctx.foldl_apps(motive, idxs.iter().copied().chain(once(view_a.fields[*pos])));
                let ty = self.tc.ctx.head_beta(ty);
                a_ihs.push(self.tc.ctx.mk_local("ih", ty));
            }

            let unpaired = || malformed(format!("case {}", case), "new index pinned by no recursive argument");
            let mut field_targets = Vec::with_capacity(view_b.fields.len());
            for (b_pos, slot) in alignment.slots.iter().enumerate() {
                let target = match slot {
                    Slot::Shared(a_pos) => view_a.fields[*a_pos],
                    Slot::NewIndex { .. } => {
                        let a_pos = alignment.pinning_before_pos(b_pos).ok_or_else(unpaired)?;
                        let idxs = view_a.rec_indices(a_pos).ok_or_else(unpaired)?.to_vec();
                        apply_indexer(self.tc.ctx, indexer, &params, &idxs, view_a.fields[a_pos])
                    }
                };
                field_targets.push(target);
            }
            let mut ih_targets = Vec::with_capacity(b_ihs.len());
            for (b_pos, _) in view_b.rec_fields.iter() {
                let h = match alignment.slots.get(*b_pos) {
                    Some(Slot::Shared(a_pos)) => view_a.ih_of(*a_pos),
                    _ => None,
                };
                let h = h.ok_or_else(|| malformed(self.tc.ctx.name_to_string(alignment.after_ctor), "unpaired recursive argument"))?;
                ih_targets.push(a_ihs[h]);
            }
            self.bind_locals(&view_b.fields, &field_targets);
            self.bind_locals(&b_ihs, &ih_targets);
            let binders = view_a.fields.iter().chain(a_ihs.iter()).copied().collect::<Vec<_>>();
            let body = self.under_binders(binders.len(), |this| this.lift_term(body))?;
            minors.push(self.tc.ctx.lambda_telescope(&binders, body));
        }

        let indices = index.delete_index(&app.indices);
        let indices = self.lift_all(&indices)?;
        let major = self.lift_term(app.major)?;
        let extra = self.lift_all(&app.extra)?;
        let rec = self.tc.ctx.mk_const(before_rec);
        Ok(self.tc.ctx.foldl_apps(
            rec,
            params.into_iter().chain(once(motive)).chain(minors).chain(indices).chain(once(major)).chain(extra),
        ))
    }
}
