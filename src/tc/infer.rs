use crate::errors::{malformed, OrnResult, OrnamentError};
use crate::expr::Expr::*;
use crate::tc::TypeChecker;
use crate::util::ExprPtr;

impl<'x> TypeChecker<'x> {
    fn ill_typed(&self, e: ExprPtr, reason: &str) -> OrnamentError {
        malformed(format!("{:?}", self.ctx.debug_print(e)), reason)
    }

    /// Infer the type of `e` without checking it. `e` must not have loose bound variables.
    pub fn infer(&mut self, e: ExprPtr) -> OrnResult<ExprPtr> {
        if let Some(cached) = self.tc_cache.infer_cache.get(&e).copied() {
            return Ok(cached)
        }
        let r = match self.ctx.read_expr(e) {
            Var { .. } => return Err(self.ill_typed(e, "cannot infer the type of a loose bound variable")),
            Sort { level, .. } => self.ctx.mk_sort(level + 1),
            Const { name, .. } => match self.env.declar_type(&name) {
                Some(ty) => ty,
                None => return Err(OrnamentError::UnknownDeclaration(self.ctx.name_to_string(name))),
            },
            Local { binder_type, .. } => binder_type,
            NatLit { .. } => {
                let nat = self.ctx.name_cache.nat;
                self.ctx.mk_const(nat)
            }
            App { .. } => self.infer_app(e)?,
            Lambda { .. } => {
                let (local, body) = self.open(e)?;
                let body_ty = self.infer(body)?;
                self.ctx.abstr_pi(local, body_ty)
            }
            Pi { binder_type, .. } => {
                let dom_level = self.infer_sort_of(binder_type)?;
                let (_, body) = self.open(e)?;
                let cod_level = self.infer_sort_of(body)?;
                let level = if cod_level == 0 { 0 } else { dom_level.max(cod_level) };
                self.ctx.mk_sort(level)
            }
            Let { val, body, .. } => {
                let body = self.ctx.inst1(body, val);
                self.infer(body)?
            }
            Proj { ty_name, idx, structure, .. } => self.infer_proj(e, ty_name, idx, structure)?,
            Case { motive, scrutinee, .. } => {
                let scrut_ty = self.infer(scrutinee)?;
                let scrut_ty = self.whnf(scrut_ty);
                let (head, args) = self.ctx.unfold_apps(scrut_ty);
                let ind = self
                    .ctx
                    .const_name(head)
                    .and_then(|n| self.env.get_inductive(&n))
                    .ok_or_else(|| self.ill_typed(e, "case scrutinee is not a value of an inductive type"))?;
                let idxs = args[ind.num_params as usize..].to_vec();
                let applied = self.ctx.foldl_apps(motive, idxs.into_iter().chain(std::iter::once(scrutinee)));
                self.ctx.head_beta(applied)
            }
            Fix { binder_type, .. } | CoFix { binder_type, .. } => binder_type,
            Cast { ty, .. } => ty,
        };
        self.tc_cache.infer_cache.insert(e, r);
        Ok(r)
    }

    fn open(&mut self, e: ExprPtr) -> OrnResult<(ExprPtr, ExprPtr)> {
        self.ctx.open_binder(e).ok_or_else(|| self.ill_typed(e, "expected a binder"))
    }

    fn infer_app(&mut self, e: ExprPtr) -> OrnResult<ExprPtr> {
        let (fun, args) = self.ctx.unfold_apps(e);
        let mut fun_ty = self.infer(fun)?;
        for arg in args {
            let whnfd = self.ensure_pi(fun_ty, e)?;
            fun_ty = match self.ctx.read_expr(whnfd) {
                Pi { body, .. } => self.ctx.inst1(body, arg),
                _ => return Err(self.ill_typed(e, "applied a non-function")),
            };
        }
        Ok(fun_ty)
    }

    /// The type of field `idx` of `structure`, whose type is a single-constructor inductive.
    /// Earlier fields the field's type depends on are replaced by projections.
    fn infer_proj(&mut self, e: ExprPtr, ty_name: crate::util::NamePtr, idx: usize, structure: ExprPtr) -> OrnResult<ExprPtr> {
        let struct_ty = self.infer(structure)?;
        let struct_ty = self.whnf(struct_ty);
        let (head, args) = self.ctx.unfold_apps(struct_ty);
        if self.ctx.const_name(head) != Some(ty_name) {
            return Err(self.ill_typed(e, "projection from a value of the wrong type"))
        }
        let ind = self.env.get_inductive(&ty_name).ok_or_else(|| self.ill_typed(e, "projection from a non-inductive"))?;
        if ind.all_ctor_names.len() != 1 {
            return Err(self.ill_typed(e, "projection from a type without exactly one constructor"))
        }
        let num_params = ind.num_params as usize;
        let ctor_name = ind.all_ctor_names[0];
        let mut ctor_ty = self.env.declar_type(&ctor_name).ok_or_else(|| self.ill_typed(e, "missing constructor"))?;
        for arg in args.iter().take(num_params).copied() {
            ctor_ty = match self.ctx.read_expr(ctor_ty) {
                Pi { body, .. } => self.ctx.inst1(body, arg),
                _ => return Err(self.ill_typed(e, "constructor has too few parameters")),
            };
        }
        for i in 0..idx {
            let whnfd = self.whnf(ctor_ty);
            ctor_ty = match self.ctx.read_expr(whnfd) {
                Pi { body, .. } => {
                    let prev = self.ctx.mk_proj(ty_name, i, structure);
                    self.ctx.inst1(body, prev)
                }
                _ => return Err(self.ill_typed(e, "projection index out of range")),
            };
        }
        let whnfd = self.whnf(ctor_ty);
        match self.ctx.read_expr(whnfd) {
            Pi { binder_type, .. } => Ok(binder_type),
            _ => Err(self.ill_typed(e, "projection index out of range")),
        }
    }

    pub fn ensure_pi(&mut self, ty: ExprPtr, ctx_for_err: ExprPtr) -> OrnResult<ExprPtr> {
        if let Pi { .. } = self.ctx.read_expr(ty) {
            return Ok(ty)
        }
        let whnfd = self.whnf(ty);
        match self.ctx.read_expr(whnfd) {
            Pi { .. } => Ok(whnfd),
            _ => Err(self.ill_typed(ctx_for_err, "expected a function type")),
        }
    }

    /// The level `l` of `Sort l`, where `Sort l` is the type of `ty`.
    pub fn infer_sort_of(&mut self, ty: ExprPtr) -> OrnResult<u32> {
        let s = self.infer(ty)?;
        let s = self.whnf(s);
        match self.ctx.read_expr(s) {
            Sort { level, .. } => Ok(level),
            _ => Err(self.ill_typed(ty, "expected a type")),
        }
    }
}
