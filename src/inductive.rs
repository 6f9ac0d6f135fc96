//! Admission of inductive declarations and derivation of their eliminators.
//!
//! The eliminator derived for a single (non-mutual, inductive) type `I` with
//! parameters `ps` and indices `is` is
//!
//! ```text
//! I.rec : Π ps (motive : Π is (t : I ps is), Sort 1)
//!           (minor_1 : ..) .. (minor_k : ..)
//!           is (t : I ps is), motive is t
//! ```
//!
//! where the minor premise of a constructor binds all of the constructor's fields
//! first, followed by one inductive hypothesis per recursive field.
use crate::env::{ConstructorData, Declar, DeclarInfo, Env, InductiveData, RecRule, RecursorData};
use crate::errors::{malformed, OrnResult};
use crate::expr::{BinderStyle, Expr};
use crate::util::{Ctx, ExprPtr, NamePtr};
use std::sync::Arc;
use tracing::debug;

/// One type of an inductive block, with its constructors. `ty` and every constructor
/// type are closed pi telescopes beginning with the block's parameters.
#[derive(Debug, Clone)]
pub struct InductiveType {
    pub name: NamePtr,
    pub ty: ExprPtr,
    pub ctors: Vec<(NamePtr, ExprPtr)>,
}

#[derive(Debug, Clone)]
pub struct InductiveDecl {
    pub num_params: u16,
    pub types: Vec<InductiveType>,
    pub is_coinductive: bool,
}

impl InductiveDecl {
    /// A single, non-mutual inductive type.
    pub fn single(num_params: u16, name: NamePtr, ty: ExprPtr, ctors: Vec<(NamePtr, ExprPtr)>) -> Self {
        Self { num_params, types: vec![InductiveType { name, ty, ctors }], is_coinductive: false }
    }
}

/// A constructor after opening its telescope: parameters are shared with the block.
struct CheckedCtor {
    name: NamePtr,
    ty: ExprPtr,
    fields: Vec<ExprPtr>,
    /// (position in `fields`, index arguments) for each recursive field.
    rec_fields: Vec<(usize, Vec<ExprPtr>)>,
    conclusion_indices: Vec<ExprPtr>,
}

struct CheckedType {
    name: NamePtr,
    ty: ExprPtr,
    num_indices: u16,
    ctors: Vec<CheckedCtor>,
}

impl Env {
    /// Validate an inductive block, then add its types, constructors and (for a single
    /// inductive type) its derived eliminator to the environment.
    pub fn add_inductive(&mut self, ctx: &mut Ctx, decl: InductiveDecl) -> OrnResult<()> {
        let block_names = decl.types.iter().map(|t| t.name).collect::<Vec<_>>();
        let first = match decl.types.first() {
            Some(t) => t,
            None => return Err(malformed("<empty block>".to_string(), "an inductive block declares at least one type")),
        };
        for n in block_names.iter().chain(decl.types.iter().flat_map(|t| t.ctors.iter().map(|c| &c.0))) {
            if self.contains(n) {
                return Err(malformed(ctx.name_to_string(*n), "already declared"))
            }
        }

        let (params, _) = ctx.open_pis(first.ty, Some(decl.num_params as usize));
        if params.len() != decl.num_params as usize {
            return Err(malformed(ctx.name_to_string(first.name), "fewer binders than parameters"))
        }

        let mut checked = Vec::new();
        for t in decl.types.iter() {
            checked.push(self.check_type(ctx, t, &params, &block_names)?);
        }
        let is_recursive = checked.iter().any(|t| t.ctors.iter().any(|c| !c.rec_fields.is_empty()));
        let all_ctor_names =
            Arc::from(checked.iter().flat_map(|t| t.ctors.iter().map(|c| c.name)).collect::<Vec<_>>());
        let all_ind_names: Arc<[NamePtr]> = Arc::from(block_names.clone());
        let derive_rec = !decl.is_coinductive && checked.len() == 1;

        for t in checked.iter() {
            let rec_name = if derive_rec { Some(ctx.str_ext(t.name, "rec")) } else { None };
            self.insert_declar(
                ctx,
                Declar::Inductive(InductiveData {
                    info: DeclarInfo { name: t.name, ty: t.ty },
                    num_params: decl.num_params,
                    num_indices: t.num_indices,
                    all_ind_names: all_ind_names.clone(),
                    all_ctor_names: Arc::clone(&all_ctor_names),
                    is_recursive,
                    is_coinductive: decl.is_coinductive,
                    rec_name,
                }),
            )?;
            for (ctor_idx, c) in t.ctors.iter().enumerate() {
                self.insert_declar(
                    ctx,
                    Declar::Constructor(ConstructorData {
                        info: DeclarInfo { name: c.name, ty: c.ty },
                        inductive_name: t.name,
                        ctor_idx: ctor_idx as u16,
                        num_params: decl.num_params,
                        num_fields: c.fields.len() as u16,
                    }),
                )?;
            }
            if let Some(rec_name) = rec_name {
                let rec = derive_recursor(ctx, rec_name, t, &params);
                debug!(ind = %ctx.name_to_string(t.name), minors = rec.num_minors, "derived eliminator");
                self.insert_declar(ctx, Declar::Recursor(rec))?;
            }
        }
        Ok(())
    }

    fn check_type(
        &self,
        ctx: &mut Ctx,
        t: &InductiveType,
        params: &[ExprPtr],
        block_names: &[NamePtr],
    ) -> OrnResult<CheckedType> {
        let name_str = ctx.name_to_string(t.name);
        if ctx.num_loose_bvars(t.ty) > 0 || ctx.has_fvars(t.ty) {
            return Err(malformed(name_str, "type former must be closed"))
        }
        let body = instantiate_params(ctx, t.ty, params).ok_or_else(|| malformed(name_str.clone(), "parameters differ"))?;
        let (indices, sort) = ctx.open_pis(body, None);
        if !matches!(ctx.read_expr(sort), Expr::Sort { .. }) {
            return Err(malformed(name_str, "type former must end in a sort"))
        }
        let mut ctors = Vec::new();
        for (cname, cty) in t.ctors.iter().copied() {
            ctors.push(self.check_ctor(ctx, t.name, cname, cty, params, block_names)?);
        }
        Ok(CheckedType { name: t.name, ty: t.ty, num_indices: indices.len() as u16, ctors })
    }

    fn check_ctor(
        &self,
        ctx: &mut Ctx,
        ind_name: NamePtr,
        name: NamePtr,
        ty: ExprPtr,
        params: &[ExprPtr],
        block_names: &[NamePtr],
    ) -> OrnResult<CheckedCtor> {
        let name_str = ctx.name_to_string(name);
        if ctx.num_loose_bvars(ty) > 0 || ctx.has_fvars(ty) {
            return Err(malformed(name_str, "constructor type must be closed"))
        }
        let body = instantiate_params(ctx, ty, params)
            .ok_or_else(|| malformed(name_str.clone(), "constructor parameters differ from the type's"))?;
        let (fields, conclusion) = ctx.open_pis(body, None);

        let (head, args) = ctx.unfold_apps(conclusion);
        if ctx.const_name(head) != Some(ind_name) {
            return Err(malformed(name_str, "constructor must produce a value of its own type"))
        }
        if args.len() < params.len() || args[..params.len()] != *params {
            return Err(malformed(name_str, "constructor conclusion must repeat the parameters"))
        }
        let conclusion_indices = args[params.len()..].to_vec();
        if conclusion_indices.iter().any(|i| mentions_block(ctx, *i, block_names)) {
            return Err(malformed(name_str, "indices may not mention the type being declared"))
        }

        let mut rec_fields = Vec::new();
        for (pos, field) in fields.iter().copied().enumerate() {
            let field_ty = ctx.local_type(field);
            if !mentions_block(ctx, field_ty, block_names) {
                continue
            }
            let (fhead, fargs) = ctx.unfold_apps(field_ty);
            match ctx.const_name(fhead) {
                Some(n) if block_names.contains(&n) => {
                    if fargs.len() < params.len() || fargs[..params.len()] != *params {
                        return Err(malformed(name_str, "recursive occurrence with different parameters"))
                    }
                    let idxs = fargs[params.len()..].to_vec();
                    if idxs.iter().any(|i| mentions_block(ctx, *i, block_names)) {
                        return Err(malformed(name_str, "nested recursive occurrence"))
                    }
                    rec_fields.push((pos, idxs));
                }
                _ if matches!(ctx.read_expr(field_ty), Expr::Pi { .. }) => {
                    return Err(malformed(name_str, "reflexive recursive arguments are not supported"))
                }
                _ => return Err(malformed(name_str, "nested or non-positive recursive occurrence")),
            }
        }
        Ok(CheckedCtor { name, ty, fields, rec_fields, conclusion_indices })
    }
}

fn mentions_block(ctx: &Ctx, e: ExprPtr, block_names: &[NamePtr]) -> bool {
    ctx.find_const(e, &mut |n| block_names.contains(&n))
}

/// Instantiate the leading pi binders of `ty` with `params`, provided its binder types
/// agree with the parameters' types.
fn instantiate_params(ctx: &mut Ctx, mut ty: ExprPtr, params: &[ExprPtr]) -> Option<ExprPtr> {
    for p in params.iter().copied() {
        match ctx.read_expr(ty) {
            Expr::Pi { binder_type, body, .. } if binder_type == ctx.local_type(p) => ty = ctx.inst1(body, p),
            _ => return None,
        }
    }
    Some(ty)
}

fn derive_recursor(ctx: &mut Ctx, rec_name: NamePtr, t: &CheckedType, params: &[ExprPtr]) -> RecursorData {
    let ind_const = ctx.mk_const(t.name);
    let ind_app = ctx.foldl_apps(ind_const, params.iter().copied());
    let sort1 = ctx.type0();

    // motive : Π is (t : I ps is), Sort 1
    let ind_body = instantiate_params(ctx, t.ty, params).unwrap_or(t.ty);
    let (motive_idxs, _) = ctx.open_pis(ind_body, None);
    let motive_major_ty = ctx.foldl_apps(ind_app, motive_idxs.iter().copied());
    let motive_major = ctx.mk_local("t", motive_major_ty);
    let mut motive_binders = motive_idxs.clone();
    motive_binders.push(motive_major);
    let motive_ty = ctx.pi_telescope(&motive_binders, sort1);
    let motive_name = ctx.str1("motive");
    let motive = ctx.mk_unique(motive_name, BinderStyle::Implicit, motive_ty);

    // One minor premise per constructor, and the locals needed to build its iota rule.
    let mut minors = Vec::new();
    for c in t.ctors.iter() {
        let mut ihs = Vec::new();
        for (pos, idxs) in c.rec_fields.iter() {
            let ih_ty = ctx.foldl_apps(motive, idxs.iter().copied().chain(std::iter::once(c.fields[*pos])));
            ihs.push(ctx.mk_local("ih", ih_ty));
        }
        let ctor_const = ctx.mk_const(c.name);
        let ctor_app = ctx.foldl_apps(ctor_const, params.iter().chain(c.fields.iter()).copied());
        let minor_result = ctx.foldl_apps(motive, c.conclusion_indices.iter().copied().chain(std::iter::once(ctor_app)));
        let binders = c.fields.iter().chain(ihs.iter()).copied().collect::<Vec<_>>();
        let minor_ty = ctx.pi_telescope(&binders, minor_result);
        let minor_name = ctx.name_last(c.name).unwrap_or("minor").to_owned();
        minors.push(ctx.mk_local(&minor_name, minor_ty));
    }

    let (major_idxs, _) = ctx.open_pis(ind_body, None);
    let major_ty = ctx.foldl_apps(ind_app, major_idxs.iter().copied());
    let major = ctx.mk_local("t", major_ty);
    let result = ctx.foldl_apps(motive, major_idxs.iter().copied().chain(std::iter::once(major)));
    let mut binders = params.to_vec();
    binders.push(motive);
    binders.extend(minors.iter().copied());
    binders.extend(major_idxs.iter().copied());
    binders.push(major);
    let rec_ty = ctx.pi_telescope(&binders, result);

    let rec_const = ctx.mk_const(rec_name);
    let rec_prefix = ctx.foldl_apps(rec_const, params.iter().copied().chain(std::iter::once(motive)).chain(minors.iter().copied()));
    let mut rec_rules = Vec::new();
    for (j, c) in t.ctors.iter().enumerate() {
        let mut rhs = ctx.foldl_apps(minors[j], c.fields.iter().copied());
        for (pos, idxs) in c.rec_fields.iter() {
            let ih_val = ctx.foldl_apps(rec_prefix, idxs.iter().copied().chain(std::iter::once(c.fields[*pos])));
            rhs = ctx.mk_app(rhs, ih_val);
        }
        let mut rule_binders = params.to_vec();
        rule_binders.push(motive);
        rule_binders.extend(minors.iter().copied());
        rule_binders.extend(c.fields.iter().copied());
        let val = ctx.lambda_telescope(&rule_binders, rhs);
        rec_rules.push(RecRule { ctor_name: c.name, num_fields: c.fields.len() as u16, val });
    }

    RecursorData {
        info: DeclarInfo { name: rec_name, ty: rec_ty },
        ind_name: t.name,
        num_params: params.len() as u16,
        num_indices: t.num_indices,
        num_motives: 1,
        num_minors: t.ctors.len() as u16,
        rec_rules: Arc::from(rec_rules),
    }
}
