//! Views of inductive declarations used by discovery and lifting: parameter and
//! index telescopes, constructor telescopes, and the case signatures of a type's
//! eliminator.
use crate::env::InductiveData;
use crate::errors::{malformed, OrnResult, OrnamentError};
use crate::expr::Expr;
use crate::tc::TypeChecker;
use crate::util::{Ctx, ExprPtr, NamePtr};

/// A constructor opened against fixed parameters.
#[derive(Debug, Clone)]
pub struct CtorView {
    pub name: NamePtr,
    pub fields: Vec<ExprPtr>,
    /// `(position in fields, index arguments)` for each recursive field, in field order.
    pub rec_fields: Vec<(usize, Vec<ExprPtr>)>,
    pub conclusion_indices: Vec<ExprPtr>,
}

impl CtorView {
    /// The position among the inductive hypotheses of the recursive field at `field_pos`.
    pub fn ih_of(&self, field_pos: usize) -> Option<usize> { self.rec_fields.iter().position(|(pos, _)| *pos == field_pos) }

    pub fn rec_indices(&self, field_pos: usize) -> Option<&[ExprPtr]> {
        self.rec_fields.iter().find(|(pos, _)| *pos == field_pos).map(|(_, idxs)| idxs.as_slice())
    }
}

/// One minor premise of an eliminator: the hypotheses it binds and the indices of the
/// value it concludes about.
#[derive(Debug, Clone)]
pub struct CaseSignature {
    pub ctor_name: NamePtr,
    pub fields: Vec<ExprPtr>,
    /// For each inductive hypothesis, the field it is about and that field's indices.
    pub rec_fields: Vec<(usize, Vec<ExprPtr>)>,
    pub conclusion_indices: Vec<ExprPtr>,
}

/// The shape of an eliminator `I.rec` instantiated at fixed parameters.
#[derive(Debug, Clone)]
pub struct PrincipleSignature {
    pub ind_name: NamePtr,
    pub params: Vec<ExprPtr>,
    pub motive_indices: Vec<ExprPtr>,
    pub cases: Vec<CaseSignature>,
}

/// Instantiate the first `params.len()` pi binders of `ty`, reducing to expose them if
/// necessary.
pub fn instantiate_pis(tc: &mut TypeChecker, mut ty: ExprPtr, params: &[ExprPtr]) -> OrnResult<ExprPtr> {
    for p in params.iter().copied() {
        let whnfd = tc.ensure_pi(ty, ty)?;
        ty = match tc.ctx.read_expr(whnfd) {
            Expr::Pi { body, .. } => tc.ctx.inst1(body, p),
            _ => return Err(malformed(format!("{:?}", tc.ctx.debug_print(ty)), "expected a pi binder")),
        };
    }
    Ok(ty)
}

/// Fresh locals for the parameter telescope of `ind`.
pub fn open_params(ctx: &mut Ctx, ind: &InductiveData) -> OrnResult<Vec<ExprPtr>> {
    let (params, _) = ctx.open_pis(ind.info.ty, Some(ind.num_params as usize));
    if params.len() != ind.num_params as usize {
        return Err(malformed(ctx.name_to_string(ind.info.name), "fewer binders than parameters"))
    }
    Ok(params)
}

/// Fresh locals for the index telescope of `ind` at `params`. Binders keep the names
/// the telescope gives them; anonymous ones (from an arrow `Nat → Type`) are named
/// `i`, or `i0`, `i1`, .. when there are several indices.
pub fn open_indices(tc: &mut TypeChecker, ind: &InductiveData, params: &[ExprPtr]) -> OrnResult<Vec<ExprPtr>> {
    let mut body = instantiate_pis(tc, ind.info.ty, params)?;
    let num_indices = ind.num_indices as usize;
    let anon = tc.ctx.anonymous();
    let mut indices = Vec::with_capacity(num_indices);
    while indices.len() < num_indices {
        match tc.ctx.read_expr(body) {
            Expr::Pi { binder_name, binder_style, binder_type, body: rest, .. } => {
                let binder_name = match binder_name {
                    n if n != anon => n,
                    _ if num_indices == 1 => tc.ctx.str1("i"),
                    _ => tc.ctx.str1(&format!("i{}", indices.len())),
                };
                let local = tc.ctx.mk_unique(binder_name, binder_style, binder_type);
                body = tc.ctx.inst1(rest, local);
                indices.push(local);
            }
            _ => break,
        }
    }
    Ok(indices)
}

/// Open constructor `ctor_name` of `ind_name` at `params`.
pub fn ctor_view(tc: &mut TypeChecker, ind_name: NamePtr, ctor_name: NamePtr, params: &[ExprPtr]) -> OrnResult<CtorView> {
    let env = tc.env;
    let ctor = env.get_ctor(&ctor_name).ok_or_else(|| OrnamentError::UnknownDeclaration(tc.ctx.name_to_string(ctor_name)))?;
    let num_fields = ctor.num_fields as usize;
    let body = instantiate_pis(tc, ctor.info.ty, params)?;
    let (fields, conclusion) = tc.ctx.open_pis(body, Some(num_fields));
    let np = params.len();
    let mut rec_fields = Vec::new();
    for (pos, field) in fields.iter().copied().enumerate() {
        let field_ty = tc.ctx.local_type(field);
        let (head, args) = tc.ctx.unfold_apps(field_ty);
        if tc.ctx.const_name(head) == Some(ind_name) && args.len() >= np {
            rec_fields.push((pos, args[np..].to_vec()));
        }
    }
    let (_, args) = tc.ctx.unfold_apps(conclusion);
    if args.len() < np {
        return Err(malformed(tc.ctx.name_to_string(ctor_name), "constructor conclusion is under-applied"))
    }
    Ok(CtorView { name: ctor_name, fields, rec_fields, conclusion_indices: args[np..].to_vec() })
}

/// Read the case signatures off the type of `ind_name`'s eliminator at `params`.
pub fn principle_signature(tc: &mut TypeChecker, ind_name: NamePtr, params: &[ExprPtr]) -> OrnResult<PrincipleSignature> {
    let ind = tc.env.expect_inductive(tc.ctx, ind_name)?.clone();
    let rec_name = match ind.rec_name {
        Some(n) => n,
        None => return Err(OrnamentError::UnsupportedShape(format!("{} has no eliminator", tc.ctx.name_to_string(ind_name)))),
    };
    let rec = tc.env.get_rec(&rec_name).ok_or_else(|| OrnamentError::UnknownDeclaration(tc.ctx.name_to_string(rec_name)))?.clone();
    let after_params = instantiate_pis(tc, rec.info.ty, params)?;
    let (motive, rest) = tc.ctx.open_binder(after_params).ok_or_else(|| malformed(tc.ctx.name_to_string(rec_name), "missing motive"))?;
    let motive_ty = tc.ctx.local_type(motive);
    let (motive_indices, _) = tc.ctx.open_pis(motive_ty, Some(ind.num_indices as usize));

    let (minors, _) = tc.ctx.open_pis(rest, Some(rec.num_minors as usize));
    let mut cases = Vec::new();
    for (minor, ctor_name) in minors.iter().copied().zip(ind.all_ctor_names.iter().copied()) {
        let num_fields = tc.env.get_ctor(&ctor_name).map(|c| c.num_fields as usize).unwrap_or(0);
        let minor_ty = tc.ctx.local_type(minor);
        let (hyps, result) = tc.ctx.open_pis(minor_ty, None);
        if hyps.len() < num_fields {
            return Err(malformed(tc.ctx.name_to_string(rec_name), "minor premise binds too few hypotheses"))
        }
        let fields = hyps[..num_fields].to_vec();
        let mut rec_fields = Vec::new();
        for ih in hyps[num_fields..].iter().copied() {
            let ih_ty = tc.ctx.local_type(ih);
            let (_, ih_args) = tc.ctx.unfold_apps(ih_ty);
            let about = ih_args.last().and_then(|f| fields.iter().position(|x| x == f));
            match about {
                Some(pos) => rec_fields.push((pos, ih_args[..ih_args.len() - 1].to_vec())),
                None => return Err(malformed(tc.ctx.name_to_string(rec_name), "inductive hypothesis about no field")),
            }
        }
        let (_, result_args) = tc.ctx.unfold_apps(result);
        let conclusion_indices = match result_args.split_last() {
            Some((_, idxs)) => idxs.to_vec(),
            None => Vec::new(),
        };
        cases.push(CaseSignature { ctor_name, fields, rec_fields, conclusion_indices });
    }
    Ok(PrincipleSignature { ind_name, params: params.to_vec(), motive_indices, cases })
}
