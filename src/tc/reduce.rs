use crate::expr::Expr::*;
use crate::tc::TypeChecker;
use crate::util::ExprPtr;
use num_bigint::BigUint;
use num_traits::{One, Zero};

impl<'x> TypeChecker<'x> {
    /// Weak head normal form without delta-unfolding definitions at the head.
    pub fn whnf_core(&mut self, e: ExprPtr) -> ExprPtr {
        if let Some(cached) = self.tc_cache.whnf_core_cache.get(&e).copied() {
            return cached
        }
        let mut cursor = e;
        loop {
            let next = match self.ctx.read_expr(cursor) {
                Var { .. } | Sort { .. } | Pi { .. } | Lambda { .. } | NatLit { .. } | Local { .. } | Const { .. } => None,
                Fix { .. } | CoFix { .. } => None,
                Let { val, body, .. } => Some(self.ctx.inst1(body, val)),
                Cast { val, .. } => Some(val),
                Proj { idx, structure, .. } => self.reduce_proj(idx, structure),
                Case { .. } => self.reduce_case(cursor),
                App { .. } => {
                    let head = self.ctx.unfold_apps_fun(cursor);
                    match self.ctx.read_expr(head) {
                        Lambda { .. } => Some(self.ctx.head_beta(cursor)),
                        Const { .. } => self.reduce_rec(cursor),
                        Fix { .. } => self.reduce_fix(cursor),
                        Let { .. } | Cast { .. } | Proj { .. } | Case { .. } => {
                            let (_, args) = self.ctx.unfold_apps(cursor);
                            let head_r = self.whnf_core(head);
                            if head_r == head {
                                None
                            } else {
                                Some(self.ctx.foldl_apps(head_r, args))
                            }
                        }
                        _ => None,
                    }
                }
            };
            match next {
                Some(n) => cursor = n,
                None => break,
            }
        }
        self.tc_cache.whnf_core_cache.insert(e, cursor);
        cursor
    }

    /// Weak head normal form, unfolding non-opaque definitions.
    pub fn whnf(&mut self, e: ExprPtr) -> ExprPtr {
        if let Some(cached) = self.tc_cache.whnf_cache.get(&e).copied() {
            return cached
        }
        let mut cursor = e;
        loop {
            cursor = self.whnf_core(cursor);
            match self.unfold_definition(cursor) {
                Some(unfolded) => cursor = unfolded,
                None => break,
            }
        }
        self.tc_cache.whnf_cache.insert(e, cursor);
        cursor
    }

    /// Delta-unfold the head of `e` if it is a non-opaque definition.
    pub fn unfold_definition(&mut self, e: ExprPtr) -> Option<ExprPtr> {
        let (head, args) = self.ctx.unfold_apps(e);
        let name = self.ctx.const_name(head)?;
        let val = self.env.get_unfoldable(&name)?;
        let applied = self.ctx.foldl_apps(val, args);
        Some(self.ctx.head_beta(applied))
    }

    /// `NatLit 0` to `Nat.zero`, `NatLit (n+1)` to `Nat.succ (NatLit n)`.
    pub(crate) fn nat_lit_to_ctor(&mut self, e: ExprPtr) -> ExprPtr {
        match self.ctx.read_expr(e) {
            NatLit { ptr, .. } if self.has_nat() => {
                let n = self.ctx.read_bignum(ptr).clone();
                let names = self.ctx.name_cache;
                if n.is_zero() {
                    self.ctx.mk_const(names.nat_zero)
                } else {
                    let pred = self.ctx.mk_nat_lit_quick(n - BigUint::one());
                    let succ = self.ctx.mk_const(names.nat_succ);
                    self.ctx.mk_app(succ, pred)
                }
            }
            _ => e,
        }
    }

    /// Reduce `e` to a constructor application if possible: weak head normal form,
    /// nat literals expanded, and coinductive fixpoints unfolded.
    fn whnf_to_ctor(&mut self, e: ExprPtr) -> Option<(ExprPtr, crate::env::ConstructorData, Vec<ExprPtr>)> {
        let mut e = self.whnf(e);
        for _ in 0..2 {
            e = self.nat_lit_to_ctor(e);
            let (head, args) = self.ctx.unfold_apps(e);
            match self.ctx.read_expr(head) {
                Const { name, .. } => {
                    let ctor = self.env.get_ctor(&name)?.clone();
                    if args.len() != ctor.arity() {
                        return None
                    }
                    return Some((e, ctor, args))
                }
                CoFix { body, .. } => {
                    let unfolded = self.ctx.inst1(body, head);
                    let unfolded = self.ctx.foldl_apps(unfolded, args);
                    e = self.whnf(unfolded);
                }
                _ => return None,
            }
        }
        None
    }

    /// Iota reduction for a fully applied eliminator whose major premise reduces to a
    /// constructor application.
    fn reduce_rec(&mut self, e: ExprPtr) -> Option<ExprPtr> {
        let (head, args) = self.ctx.unfold_apps(e);
        let rec = self.env.get_rec(&self.ctx.const_name(head)?)?.clone();
        let major_idx = rec.major_idx();
        if args.len() <= major_idx {
            return None
        }
        let (_, ctor, ctor_args) = self.whnf_to_ctor(args[major_idx])?;
        let rule = rec.rec_rules.iter().find(|r| r.ctor_name == ctor.info.name)?;
        let fields = &ctor_args[ctor.num_params as usize..];
        if fields.len() != rule.num_fields as usize {
            return None
        }
        let rhs = self.ctx.foldl_apps(rule.val, args[..rec.indices_start()].iter().copied());
        let rhs = self.ctx.foldl_apps(rhs, fields.iter().copied());
        let rhs = self.ctx.foldl_apps(rhs, args[major_idx + 1..].iter().copied());
        Some(self.ctx.head_beta(rhs))
    }

    fn reduce_proj(&mut self, idx: usize, structure: ExprPtr) -> Option<ExprPtr> {
        let (_, ctor, args) = self.whnf_to_ctor(structure)?;
        args.get(ctor.num_params as usize + idx).copied()
    }

    fn reduce_case(&mut self, e: ExprPtr) -> Option<ExprPtr> {
        let (ind_name, scrutinee, branches) = match self.ctx.read_expr(e) {
            Case { ind_name, scrutinee, branches, .. } => (ind_name, scrutinee, branches),
            _ => return None,
        };
        let (_, ctor, args) = self.whnf_to_ctor(scrutinee)?;
        if ctor.inductive_name != ind_name {
            return None
        }
        let branch = self.ctx.read_exprs(branches).get(ctor.ctor_idx as usize).copied()?;
        let applied = self.ctx.foldl_apps(branch, args[ctor.num_params as usize..].iter().copied());
        Some(self.ctx.head_beta(applied))
    }

    fn reduce_fix(&mut self, e: ExprPtr) -> Option<ExprPtr> {
        let (head, args) = self.ctx.unfold_apps(e);
        let (body, rec_arg) = match self.ctx.read_expr(head) {
            Fix { body, rec_arg, .. } => (body, rec_arg as usize),
            _ => return None,
        };
        let decreasing = *args.get(rec_arg)?;
        self.whnf_to_ctor(decreasing)?;
        let unfolded = self.ctx.inst1(body, head);
        let applied = self.ctx.foldl_apps(unfolded, args);
        Some(self.ctx.head_beta(applied))
    }

    /// Strong normal form: reduce everywhere, including under binders. Closed
    /// `Nat.zero`/`Nat.succ` chains are folded into literals.
    pub fn normalize(&mut self, e: ExprPtr) -> ExprPtr {
        if let Some(cached) = self.tc_cache.normalize_cache.get(&e).copied() {
            return cached
        }
        let w = self.whnf(e);
        let calcd = match self.ctx.read_expr(w) {
            Var { .. } | Sort { .. } | Const { .. } | NatLit { .. } | Local { .. } => self.fold_nat(w),
            App { .. } => {
                let (head, args) = self.ctx.unfold_apps(w);
                let head = self.normalize(head);
                let args = args.into_iter().map(|a| self.normalize(a)).collect::<Vec<_>>();
                let out = self.ctx.foldl_apps(head, args);
                self.fold_nat(out)
            }
            Pi { binder_name, binder_style, binder_type, body, .. }
            | Lambda { binder_name, binder_style, binder_type, body, .. } => {
                let binder_type = self.normalize(binder_type);
                let local = self.ctx.mk_unique(binder_name, binder_style, binder_type);
                let body = self.ctx.inst1(body, local);
                let body = self.normalize(body);
                if matches!(self.ctx.read_expr(w), Pi { .. }) {
                    self.ctx.abstr_pi(local, body)
                } else {
                    self.ctx.abstr_lambda(local, body)
                }
            }
            Fix { binder_name, binder_type, body, rec_arg, .. } => {
                let binder_type = self.normalize(binder_type);
                let local = self.ctx.mk_unique(binder_name, crate::expr::BinderStyle::Default, binder_type);
                let body = self.ctx.inst1(body, local);
                let body = self.normalize(body);
                let body = self.ctx.abstr(body, &[local]);
                self.ctx.mk_fix(binder_name, binder_type, body, rec_arg)
            }
            CoFix { binder_name, binder_type, body, .. } => {
                let binder_type = self.normalize(binder_type);
                let local = self.ctx.mk_unique(binder_name, crate::expr::BinderStyle::Default, binder_type);
                let body = self.ctx.inst1(body, local);
                let body = self.normalize(body);
                let body = self.ctx.abstr(body, &[local]);
                self.ctx.mk_cofix(binder_name, binder_type, body)
            }
            Proj { ty_name, idx, structure, .. } => {
                let structure = self.normalize(structure);
                self.ctx.mk_proj(ty_name, idx, structure)
            }
            Case { ind_name, motive, scrutinee, branches, .. } => {
                let motive = self.normalize(motive);
                let scrutinee = self.normalize(scrutinee);
                let branches = self.ctx.read_exprs(branches);
                let branches = branches.iter().map(|b| self.normalize(*b)).collect::<Vec<_>>();
                self.ctx.mk_case(ind_name, motive, scrutinee, &branches)
            }
            Let { .. } | Cast { .. } => panic!("whnf left a let or cast at the head: {:?}", self.ctx.debug_print(w)),
        };
        self.tc_cache.normalize_cache.insert(e, calcd);
        calcd
    }

    fn fold_nat(&mut self, e: ExprPtr) -> ExprPtr {
        if !self.has_nat() {
            return e
        }
        match self.ctx.read_expr(e) {
            Const { name, .. } if name == self.ctx.name_cache.nat_zero => self.ctx.mk_nat_lit_quick(BigUint::zero()),
            App { fun, arg, .. } if self.ctx.const_name(fun) == Some(self.ctx.name_cache.nat_succ) => {
                match self.ctx.read_expr(arg) {
                    NatLit { ptr, .. } => {
                        let n = self.ctx.read_bignum(ptr) + BigUint::one();
                        self.ctx.mk_nat_lit_quick(n)
                    }
                    _ => e,
                }
            }
            _ => e,
        }
    }
}
