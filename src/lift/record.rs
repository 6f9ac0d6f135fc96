//! Structural rules for a record related to the nested pairs of its fields.
use super::rules::StructuralRule;
use super::{Lifter, Shape};
use crate::errors::{malformed, OrnResult, OrnamentError};
use crate::expr::Expr::*;
use crate::introspect::{ctor_view, open_params};
use crate::ornament::curry::{chain_projections, chain_type, chain_value};
use crate::pack::{as_pack, packed_type};
use crate::tc::TypeChecker;
use crate::util::{Ctx, ExprPtr, FxHashMap, NamePtr};

/// A record opened once over placeholder parameters, so its pair chain can be both
/// instantiated and recognized.
#[derive(Debug, Clone)]
pub(crate) struct RecordShape {
    pub(crate) record: NamePtr,
    pub(crate) ctor: NamePtr,
    pub(crate) rec: NamePtr,
    pub(crate) num_fields: usize,
    /// Placeholder locals for the parameters.
    pub(crate) params: Vec<ExprPtr>,
    /// The fields at `params`.
    pub(crate) fields: Vec<ExprPtr>,
    /// The pair chain type of `fields`.
    pub(crate) chain_type: ExprPtr,
    /// The pair chain of the field locals themselves.
    pub(crate) chain_value: ExprPtr,
    pub(crate) sigma_rec: Option<NamePtr>,
}

impl RecordShape {
    pub(crate) fn new(tc: &mut TypeChecker, record: NamePtr) -> OrnResult<Self> {
        let env = tc.env;
        let ind = env.expect_inductive(tc.ctx, record)?;
        let ctor = match ind.all_ctor_names.first() {
            Some(c) if ind.all_ctor_names.len() == 1 => *c,
            _ => return Err(OrnamentError::UnsupportedShape(format!("{} is not a record", tc.ctx.name_to_string(record)))),
        };
        let rec = crate::ornament::indexer::rec_of(tc, record)?;
        let params = open_params(tc.ctx, ind)?;
        let fields = ctor_view(tc, record, ctor, &params)?.fields;
        let chain_ty = chain_type(tc.ctx, &fields)?;
        let chain_val = chain_value(tc.ctx, &fields, &fields)?;
        let sigma = tc.ctx.name_cache.sigma;
        let sigma_rec = env.get_inductive(&sigma).and_then(|s| s.rec_name);
        Ok(Self {
            record,
            ctor,
            rec,
            num_fields: fields.len(),
            params,
            fields,
            chain_type: chain_ty,
            chain_value: chain_val,
            sigma_rec,
        })
    }

    /// Replace the placeholder parameters by `params` and the leading fields by `values`.
    fn instantiate(&self, ctx: &mut Ctx, e: ExprPtr, params: &[ExprPtr], values: &[ExprPtr]) -> ExprPtr {
        let map = self
            .params
            .iter()
            .copied()
            .zip(params.iter().copied())
            .chain(self.fields.iter().copied().zip(values.iter().copied()))
            .collect::<FxHashMap<_, _>>();
        ctx.replace_locals(e, &map)
    }
}

/// Match `pattern` against `term`, where the locals in `holes` match any closed term
/// (consistently). Binder names and styles are ignored.
fn match_pattern(ctx: &Ctx, pattern: ExprPtr, term: ExprPtr, holes: &[ExprPtr], assignment: &mut [Option<ExprPtr>]) -> bool {
    if let Some(i) = holes.iter().position(|h| *h == pattern) {
        return match assignment[i] {
            Some(prev) => prev == term,
            None if ctx.num_loose_bvars(term) == 0 => {
                assignment[i] = Some(term);
                true
            }
            None => false,
        }
    }
    if pattern == term {
        return true
    }
    match ctx.read_expr_pair(pattern, term) {
        (App { fun: f1, arg: a1, .. }, App { fun: f2, arg: a2, .. }) => {
            match_pattern(ctx, f1, f2, holes, assignment) && match_pattern(ctx, a1, a2, holes, assignment)
        }
        (Pi { binder_type: t1, body: b1, .. }, Pi { binder_type: t2, body: b2, .. })
        | (Lambda { binder_type: t1, body: b1, .. }, Lambda { binder_type: t2, body: b2, .. }) => {
            match_pattern(ctx, t1, t2, holes, assignment) && match_pattern(ctx, b1, b2, holes, assignment)
        }
        _ => false,
    }
}

impl<'x, 'c> Lifter<'x, 'c> {
    fn record_shape(&self) -> OrnResult<RecordShape> {
        match &self.shape {
            Shape::Record(r) => Ok(r.clone()),
            Shape::Algebraic { index, .. } => Err(malformed(self.tc.ctx.name_to_string(index.before), "not a record correspondence")),
        }
    }

    /// The record parameters `ps` if `ty` is the pair chain of `R ps`.
    pub(crate) fn match_chain(&self, ty: ExprPtr) -> Option<Vec<ExprPtr>> {
        let r = match &self.shape {
            Shape::Record(r) => r,
            Shape::Algebraic { .. } => return None,
        };
        let mut assignment = vec![None; r.params.len()];
        if !match_pattern(self.tc.ctx, r.chain_type, ty, &r.params, &mut assignment) {
            return None
        }
        assignment.into_iter().collect()
    }

    fn whnf_type_of(&mut self, e: ExprPtr) -> OrnResult<ExprPtr> {
        let ty = self.tc.infer(e)?;
        Ok(self.tc.whnf(ty))
    }

    /// For `π₀ (π₁ⁱ x)` or `π₁ (π₁ⁱ x)` with `x` a pair chain of the record, the base `x`,
    /// the field position the projection starts at, and whether it denotes the rest of
    /// the chain from that field rather than the field itself.
    fn chain_path(&mut self, e: ExprPtr) -> OrnResult<Option<(ExprPtr, usize, bool)>> {
        let sigma = self.tc.ctx.name_cache.sigma;
        let num_fields = match &self.shape {
            Shape::Record(r) => r.num_fields,
            Shape::Algebraic { .. } => return Ok(None),
        };
        let (idx, mut cursor) = match self.tc.ctx.read_expr(e) {
            Proj { ty_name, idx, structure, .. } if ty_name == sigma => (idx, structure),
            _ => return Ok(None),
        };
        let mut depth = 0usize;
        loop {
            let ty = self.whnf_type_of(cursor)?;
            if self.match_chain(ty).is_some() {
                break
            }
            match self.tc.ctx.read_expr(cursor) {
                Proj { ty_name, idx: 1, structure, .. } if ty_name == sigma => {
                    cursor = structure;
                    depth += 1;
                }
                _ => return Ok(None),
            }
        }
        Ok(match idx {
            0 if depth + 2 <= num_fields => Some((cursor, depth, false)),
            1 if depth + 2 <= num_fields => Some((cursor, depth + 1, true)),
            _ => None,
        })
    }

    /// Whether `e` applies `Sigma.rec` to a pair chain of the record.
    pub(crate) fn eliminates_chain(&mut self, e: ExprPtr) -> OrnResult<bool> {
        let sigma_rec = match (&self.shape, self.direction()) {
            (Shape::Record(r), super::config::Direction::Backward) => r.sigma_rec,
            _ => return Ok(false),
        };
        let env = self.tc.env;
        let (head, args) = self.tc.ctx.unfold_apps(e);
        let major_idx = match (self.tc.ctx.const_name(head), sigma_rec) {
            (Some(n), Some(rec)) if n == rec => env.get_rec(&rec).map(|r| r.major_idx()),
            _ => None,
        };
        match major_idx.and_then(|i| args.get(i).copied()) {
            Some(major) => {
                let ty = self.whnf_type_of(major)?;
                Ok(self.match_chain(ty).is_some())
            }
            None => Ok(false),
        }
    }

    pub(crate) fn backward_chain_rule(&mut self, e: ExprPtr, name: Option<NamePtr>, args: &[ExprPtr]) -> OrnResult<Option<StructuralRule>> {
        let names = self.tc.ctx.name_cache;
        if name == Some(names.sigma) && args.len() == 2 && self.match_chain(e).is_some() {
            return Ok(Some(StructuralRule::TypeFormer))
        }
        if name == Some(names.sigma_mk) && args.len() == 4 {
            let ty = packed_type(self.tc.ctx, args[0], args[1]);
            if self.match_chain(ty).is_some() {
                return Ok(Some(StructuralRule::Constructor))
            }
        }
        if self.chain_path(e)?.is_some() {
            return Ok(Some(StructuralRule::IndexProjection))
        }
        Ok(None)
    }

    pub(crate) fn forward_record(&mut self, e: ExprPtr, rule: StructuralRule) -> OrnResult<ExprPtr> {
        let r = self.record_shape()?;
        let np = r.params.len();
        let (_, args) = self.tc.ctx.unfold_apps(e);
        match rule {
            StructuralRule::TypeFormer => {
                let params = self.lift_all(&args)?;
                Ok(r.instantiate(self.tc.ctx, r.chain_type, &params, &[]))
            }
            StructuralRule::Constructor => {
                let args = self.lift_all(&args)?;
                let (params, values) = args.split_at(np);
                Ok(r.instantiate(self.tc.ctx, r.chain_value, params, values))
            }
            StructuralRule::Eliminator => {
                // R.rec ps motive minor r extra
                let minor = self.lift_term(args[np + 1])?;
                let major = self.lift_term(args[np + 2])?;
                let extra = self.lift_all(&args[np + 3..])?;
                let projections = chain_projections(self.tc.ctx, major, r.num_fields);
                let applied = self.tc.ctx.foldl_apps(minor, projections.into_iter().chain(extra));
                Ok(self.tc.ctx.head_beta(applied))
            }
            StructuralRule::IndexProjection => match self.tc.ctx.read_expr(e) {
                Proj { idx, structure, .. } if idx < r.num_fields => {
                    let structure = self.lift_term(structure)?;
                    let projections = chain_projections(self.tc.ctx, structure, r.num_fields);
                    Ok(projections[idx])
                }
                _ => Err(malformed(self.tc.ctx.name_to_string(r.record), "projection out of range")),
            },
            _ => Err(malformed(format!("{:?}", self.tc.ctx.debug_print(e)), "no forward rule applies")),
        }
    }

    pub(crate) fn backward_record(&mut self, e: ExprPtr, rule: StructuralRule) -> OrnResult<ExprPtr> {
        let r = self.record_shape()?;
        let not_a_chain = |ctx: &Ctx| malformed(format!("{:?}", ctx.debug_print(e)), "expected a pair chain of the record");
        match rule {
            StructuralRule::TypeFormer => {
                let params = self.match_chain(e).ok_or_else(|| not_a_chain(self.tc.ctx))?;
                let params = self.lift_all(&params)?;
                let record = self.tc.ctx.mk_const(r.record);
                Ok(self.tc.ctx.foldl_apps(record, params))
            }
            StructuralRule::Constructor => {
                let (_, args) = self.tc.ctx.unfold_apps(e);
                let ty = packed_type(self.tc.ctx, args[0], args[1]);
                let params = self.match_chain(ty).ok_or_else(|| not_a_chain(self.tc.ctx))?;
                let mut values = vec![args[2]];
                let mut cursor = args[3];
                while values.len() + 1 < r.num_fields {
                    match as_pack(self.tc.ctx, cursor) {
                        Some(view) => {
                            values.push(view.index);
                            cursor = view.value;
                        }
                        None => break,
                    }
                }
                let mut fields = self.lift_all(&values)?;
                if fields.len() + 1 == r.num_fields {
                    fields.push(self.lift_term(cursor)?);
                } else {
                    let rest = self.lift_term(cursor)?;
                    let remaining = r.num_fields - fields.len();
                    fields.extend(chain_projections(self.tc.ctx, rest, remaining));
                }
                let params = self.lift_all(&params)?;
                let ctor = self.tc.ctx.mk_const(r.ctor);
                Ok(self.tc.ctx.foldl_apps(ctor, params.into_iter().chain(fields)))
            }
            StructuralRule::IndexProjection => {
                let (base, pos, is_rest) = self.chain_path(e)?.ok_or_else(|| not_a_chain(self.tc.ctx))?;
                let base_ty = self.whnf_type_of(base)?;
                let params = self.match_chain(base_ty).ok_or_else(|| not_a_chain(self.tc.ctx))?;
                let base = self.lift_term(base)?;
                if !is_rest || pos + 1 == r.num_fields {
                    return Ok(self.tc.ctx.mk_proj(r.record, pos, base))
                }
                let params = self.lift_all(&params)?;
                let projections = (0..r.num_fields).map(|i| self.tc.ctx.mk_proj(r.record, i, base)).collect::<Vec<_>>();
                let rest = chain_value(self.tc.ctx, &r.fields[pos..], &r.fields[pos..])?;
                Ok(r.instantiate(self.tc.ctx, rest, &params, &projections))
            }
            _ => Err(malformed(format!("{:?}", self.tc.ctx.debug_print(e)), "no backward rule applies")),
        }
    }
}
