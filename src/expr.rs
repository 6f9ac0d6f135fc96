use crate::util::{new_fx_hash_set, BigUintPtr, Ctx, ExprPtr, ExprsPtr, FxHashMap, NamePtr};
use Expr::*;

pub(crate) const VAR_HASH: u64 = 281;
pub(crate) const SORT_HASH: u64 = 283;
pub(crate) const CONST_HASH: u64 = 293;
pub(crate) const APP_HASH: u64 = 307;
pub(crate) const PI_HASH: u64 = 311;
pub(crate) const LAMBDA_HASH: u64 = 313;
pub(crate) const LET_HASH: u64 = 317;
pub(crate) const PROJ_HASH: u64 = 331;
pub(crate) const CASE_HASH: u64 = 337;
pub(crate) const FIX_HASH: u64 = 347;
pub(crate) const COFIX_HASH: u64 = 349;
pub(crate) const CAST_HASH: u64 = 353;
pub(crate) const NAT_LIT_HASH: u64 = 359;
pub(crate) const LOCAL_HASH: u64 = 367;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinderStyle {
    Default,
    Implicit,
    StrictImplicit,
    InstImplicit,
}

/// Terms of the kernel. Bound variables are de Bruijn indices; free variables are
/// `Local`s with a unique id, so every traversal that goes under a binder opens it
/// with a fresh `Local` (or tracks an offset) instead of shifting.
///
/// Constructor applications and eliminator applications are `App` spines headed by
/// a `Const`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expr {
    Var {
        dbj_idx: u16,
        hash: u64,
    },
    /// `Sort 0` is `Prop`, `Sort 1` is `Type`.
    Sort {
        level: u32,
        hash: u64,
    },
    Const {
        name: NamePtr,
        hash: u64,
    },
    App {
        fun: ExprPtr,
        arg: ExprPtr,
        num_loose_bvars: u16,
        has_fvars: bool,
        hash: u64,
    },
    Pi {
        binder_name: NamePtr,
        binder_style: BinderStyle,
        binder_type: ExprPtr,
        body: ExprPtr,
        num_loose_bvars: u16,
        has_fvars: bool,
        hash: u64,
    },
    Lambda {
        binder_name: NamePtr,
        binder_style: BinderStyle,
        binder_type: ExprPtr,
        body: ExprPtr,
        num_loose_bvars: u16,
        has_fvars: bool,
        hash: u64,
    },
    Let {
        binder_name: NamePtr,
        binder_type: ExprPtr,
        val: ExprPtr,
        body: ExprPtr,
        num_loose_bvars: u16,
        has_fvars: bool,
        hash: u64,
    },
    /// Field projection out of a value of a single-constructor type.
    Proj {
        ty_name: NamePtr,
        idx: usize,
        structure: ExprPtr,
        num_loose_bvars: u16,
        has_fvars: bool,
        hash: u64,
    },
    Case {
        ind_name: NamePtr,
        motive: ExprPtr,
        scrutinee: ExprPtr,
        branches: ExprsPtr,
        num_loose_bvars: u16,
        has_fvars: bool,
        hash: u64,
    },
    Fix {
        binder_name: NamePtr,
        binder_type: ExprPtr,
        body: ExprPtr,
        rec_arg: u16,
        num_loose_bvars: u16,
        has_fvars: bool,
        hash: u64,
    },
    CoFix {
        binder_name: NamePtr,
        binder_type: ExprPtr,
        body: ExprPtr,
        num_loose_bvars: u16,
        has_fvars: bool,
        hash: u64,
    },
    Cast {
        val: ExprPtr,
        ty: ExprPtr,
        num_loose_bvars: u16,
        has_fvars: bool,
        hash: u64,
    },
    NatLit {
        ptr: BigUintPtr,
        hash: u64,
    },
    Local {
        binder_name: NamePtr,
        binder_style: BinderStyle,
        binder_type: ExprPtr,
        id: u32,
        hash: u64,
    },
}

impl std::hash::Hash for Expr {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) { state.write_u64(self.get_hash()) }
}

impl Expr {
    pub fn get_hash(&self) -> u64 {
        match self {
            Var { hash, .. }
            | Sort { hash, .. }
            | Const { hash, .. }
            | App { hash, .. }
            | Pi { hash, .. }
            | Lambda { hash, .. }
            | Let { hash, .. }
            | Proj { hash, .. }
            | Case { hash, .. }
            | Fix { hash, .. }
            | CoFix { hash, .. }
            | Cast { hash, .. }
            | NatLit { hash, .. }
            | Local { hash, .. } => *hash,
        }
    }
}

impl Ctx {
    pub fn num_loose_bvars(&self, e: ExprPtr) -> u16 {
        match self.read_expr(e) {
            Sort { .. } | Const { .. } | NatLit { .. } | Local { .. } => 0,
            Var { dbj_idx, .. } => dbj_idx + 1,
            App { num_loose_bvars, .. }
            | Pi { num_loose_bvars, .. }
            | Lambda { num_loose_bvars, .. }
            | Let { num_loose_bvars, .. }
            | Proj { num_loose_bvars, .. }
            | Case { num_loose_bvars, .. }
            | Fix { num_loose_bvars, .. }
            | CoFix { num_loose_bvars, .. }
            | Cast { num_loose_bvars, .. } => num_loose_bvars,
        }
    }

    pub fn has_fvars(&self, e: ExprPtr) -> bool {
        match self.read_expr(e) {
            Var { .. } | Sort { .. } | Const { .. } | NatLit { .. } => false,
            Local { .. } => true,
            App { has_fvars, .. }
            | Pi { has_fvars, .. }
            | Lambda { has_fvars, .. }
            | Let { has_fvars, .. }
            | Proj { has_fvars, .. }
            | Case { has_fvars, .. }
            | Fix { has_fvars, .. }
            | CoFix { has_fvars, .. }
            | Cast { has_fvars, .. } => has_fvars,
        }
    }

    /// Rebuild `e` with `f` applied to each immediate subterm, along with the number of
    /// binders (relative to `e`) that subterm sits under, plus `offset`.
    pub(crate) fn map_children<F>(&mut self, e: ExprPtr, offset: u16, f: &mut F) -> ExprPtr
    where
        F: FnMut(&mut Ctx, ExprPtr, u16) -> ExprPtr, {
        match self.read_expr(e) {
            Var { .. } | Sort { .. } | Const { .. } | NatLit { .. } | Local { .. } => e,
            App { fun, arg, .. } => {
                let fun = f(self, fun, offset);
                let arg = f(self, arg, offset);
                self.mk_app(fun, arg)
            }
            Pi { binder_name, binder_style, binder_type, body, .. } => {
                let binder_type = f(self, binder_type, offset);
                let body = f(self, body, offset + 1);
                self.mk_pi(binder_name, binder_style, binder_type, body)
            }
            Lambda { binder_name, binder_style, binder_type, body, .. } => {
                let binder_type = f(self, binder_type, offset);
                let body = f(self, body, offset + 1);
                self.mk_lambda(binder_name, binder_style, binder_type, body)
            }
            Let { binder_name, binder_type, val, body, .. } => {
                let binder_type = f(self, binder_type, offset);
                let val = f(self, val, offset);
                let body = f(self, body, offset + 1);
                self.mk_let(binder_name, binder_type, val, body)
            }
            Proj { ty_name, idx, structure, .. } => {
                let structure = f(self, structure, offset);
                self.mk_proj(ty_name, idx, structure)
            }
            Case { ind_name, motive, scrutinee, branches, .. } => {
                let motive = f(self, motive, offset);
                let scrutinee = f(self, scrutinee, offset);
                let branches = self.read_exprs(branches);
                let branches = branches.iter().map(|b| f(self, *b, offset)).collect::<Vec<_>>();
                self.mk_case(ind_name, motive, scrutinee, &branches)
            }
            Fix { binder_name, binder_type, body, rec_arg, .. } => {
                let binder_type = f(self, binder_type, offset);
                let body = f(self, body, offset + 1);
                self.mk_fix(binder_name, binder_type, body, rec_arg)
            }
            CoFix { binder_name, binder_type, body, .. } => {
                let binder_type = f(self, binder_type, offset);
                let body = f(self, body, offset + 1);
                self.mk_cofix(binder_name, binder_type, body)
            }
            Cast { val, ty, .. } => {
                let val = f(self, val, offset);
                let ty = f(self, ty, offset);
                self.mk_cast(val, ty)
            }
        }
    }

    /// Immediate subterms of `e`, ignoring binder structure.
    pub(crate) fn children(&self, e: ExprPtr) -> Vec<ExprPtr> {
        match self.read_expr(e) {
            Var { .. } | Sort { .. } | Const { .. } | NatLit { .. } | Local { .. } => Vec::new(),
            App { fun, arg, .. } => vec![fun, arg],
            Pi { binder_type, body, .. } | Lambda { binder_type, body, .. } => vec![binder_type, body],
            Let { binder_type, val, body, .. } => vec![binder_type, val, body],
            Proj { structure, .. } => vec![structure],
            Case { motive, scrutinee, branches, .. } => {
                let mut out = vec![motive, scrutinee];
                out.extend(self.read_exprs(branches).iter().copied());
                out
            }
            Fix { binder_type, body, .. } | CoFix { binder_type, body, .. } => vec![binder_type, body],
            Cast { val, ty, .. } => vec![val, ty],
        }
    }

    /// Instantiate the loose bound variables of `body` with `substs`, where `substs` is
    /// given in telescope order: `Var 0` becomes the last element of `substs`.
    pub fn inst(&mut self, body: ExprPtr, substs: &[ExprPtr]) -> ExprPtr {
        if substs.is_empty() || self.num_loose_bvars(body) == 0 {
            return body
        }
        self.expr_cache.inst_cache.clear();
        self.inst_aux(body, substs, 0u16)
    }

    pub fn inst1(&mut self, body: ExprPtr, subst: ExprPtr) -> ExprPtr { self.inst(body, &[subst]) }

    fn inst_aux(&mut self, e: ExprPtr, substs: &[ExprPtr], offset: u16) -> ExprPtr {
        if self.num_loose_bvars(e) <= offset {
            return e
        }
        if let Some(cached) = self.expr_cache.inst_cache.get(&(e, offset)).copied() {
            return cached
        }
        let calcd = match self.read_expr(e) {
            Var { dbj_idx, .. } => {
                let rel = (dbj_idx - offset) as usize;
                if rel < substs.len() {
                    let v = substs[substs.len() - 1 - rel];
                    self.shift_loose_bvars(v, offset as i32)
                } else {
                    self.mk_var(dbj_idx - (substs.len() as u16))
                }
            }
            _ => self.map_children(e, offset, &mut |ctx, c, o| ctx.inst_aux(c, substs, o)),
        };
        self.expr_cache.inst_cache.insert((e, offset), calcd);
        calcd
    }

    /// Replace the locals in `locals` with bound variables; the last element of `locals`
    /// becomes `Var 0`. The inverse of `inst`.
    pub fn abstr(&mut self, e: ExprPtr, locals: &[ExprPtr]) -> ExprPtr {
        if locals.is_empty() || !self.has_fvars(e) {
            return e
        }
        self.expr_cache.abstr_cache.clear();
        self.abstr_aux(e, locals, 0u16)
    }

    fn abstr_aux(&mut self, e: ExprPtr, locals: &[ExprPtr], offset: u16) -> ExprPtr {
        if !self.has_fvars(e) {
            return e
        }
        if let Some(cached) = self.expr_cache.abstr_cache.get(&(e, offset)).copied() {
            return cached
        }
        let calcd = match self.read_expr(e) {
            Local { .. } => match locals.iter().rposition(|l| *l == e) {
                Some(pos) => self.mk_var(offset + ((locals.len() - 1 - pos) as u16)),
                None => e,
            },
            _ => self.map_children(e, offset, &mut |ctx, c, o| ctx.abstr_aux(c, locals, o)),
        };
        self.expr_cache.abstr_cache.insert((e, offset), calcd);
        calcd
    }

    /// Shift every loose bound variable of `e` up by `n`.
    pub fn lift_loose_bvars(&mut self, e: ExprPtr, n: u16) -> ExprPtr { self.shift_loose_bvars(e, n as i32) }

    /// Shift every loose bound variable of `e` down by `n`. Panics if a variable below
    /// `n` is loose.
    pub fn lower_loose_bvars(&mut self, e: ExprPtr, n: u16) -> ExprPtr { self.shift_loose_bvars(e, -(n as i32)) }

    fn shift_loose_bvars(&mut self, e: ExprPtr, delta: i32) -> ExprPtr {
        if delta == 0 || self.num_loose_bvars(e) == 0 {
            return e
        }
        self.expr_cache.shift_cache.clear();
        self.shift_aux(e, delta, 0u16)
    }

    fn shift_aux(&mut self, e: ExprPtr, delta: i32, cutoff: u16) -> ExprPtr {
        if self.num_loose_bvars(e) <= cutoff {
            return e
        }
        if let Some(cached) = self.expr_cache.shift_cache.get(&(e, cutoff)).copied() {
            return cached
        }
        let calcd = match self.read_expr(e) {
            Var { dbj_idx, .. } => match u16::try_from(dbj_idx as i32 + delta) {
                Ok(shifted) if shifted >= cutoff => self.mk_var(shifted),
                _ => panic!("lowering captured bound variable {} by {}", dbj_idx, -delta),
            },
            _ => self.map_children(e, cutoff, &mut |ctx, c, o| ctx.shift_aux(c, delta, o)),
        };
        self.expr_cache.shift_cache.insert((e, cutoff), calcd);
        calcd
    }

    /// Replace free variables according to `map`. Replacements must be closed with
    /// respect to bound variables.
    pub fn replace_locals(&mut self, e: ExprPtr, map: &FxHashMap<ExprPtr, ExprPtr>) -> ExprPtr {
        if map.is_empty() || !self.has_fvars(e) {
            return e
        }
        self.expr_cache.replace_cache.clear();
        self.replace_aux(e, map)
    }

    fn replace_aux(&mut self, e: ExprPtr, map: &FxHashMap<ExprPtr, ExprPtr>) -> ExprPtr {
        if !self.has_fvars(e) {
            return e
        }
        if let Some(cached) = self.expr_cache.replace_cache.get(&e).copied() {
            return cached
        }
        let calcd = match self.read_expr(e) {
            Local { .. } => map.get(&e).copied().unwrap_or(e),
            _ => self.map_children(e, 0, &mut |ctx, c, _| ctx.replace_aux(c, map)),
        };
        self.expr_cache.replace_cache.insert(e, calcd);
        calcd
    }

    /// Close `body` over `locals` with a pi telescope. Binder types may mention earlier locals.
    pub fn pi_telescope(&mut self, locals: &[ExprPtr], body: ExprPtr) -> ExprPtr { self.abstr_telescope(locals, body, true) }

    /// Close `body` over `locals` with a lambda telescope.
    pub fn lambda_telescope(&mut self, locals: &[ExprPtr], body: ExprPtr) -> ExprPtr {
        self.abstr_telescope(locals, body, false)
    }

    pub fn abstr_pi(&mut self, local: ExprPtr, body: ExprPtr) -> ExprPtr { self.abstr_telescope(&[local], body, true) }

    pub fn abstr_lambda(&mut self, local: ExprPtr, body: ExprPtr) -> ExprPtr { self.abstr_telescope(&[local], body, false) }

    fn abstr_telescope(&mut self, locals: &[ExprPtr], body: ExprPtr, is_pi: bool) -> ExprPtr {
        let mut out = self.abstr(body, locals);
        for (j, local) in locals.iter().copied().enumerate().rev() {
            match self.read_expr(local) {
                Local { binder_name, binder_style, binder_type, .. } => {
                    let binder_type = self.abstr(binder_type, &locals[..j]);
                    out = if is_pi {
                        self.mk_pi(binder_name, binder_style, binder_type, out)
                    } else {
                        self.mk_lambda(binder_name, binder_style, binder_type, out)
                    };
                }
                _ => panic!("abstr_telescope expected a Local, got {:?}", self.debug_print(local)),
            }
        }
        out
    }

    /// If `e` is a pi or lambda, open its binder with a fresh local and return the
    /// local along with the instantiated body.
    pub fn open_binder(&mut self, e: ExprPtr) -> Option<(ExprPtr, ExprPtr)> {
        match self.read_expr(e) {
            Pi { binder_name, binder_style, binder_type, body, .. }
            | Lambda { binder_name, binder_style, binder_type, body, .. } => {
                let local = self.mk_unique(binder_name, binder_style, binder_type);
                Some((local, self.inst1(body, local)))
            }
            _ => None,
        }
    }

    /// Open up to `n` leading pi binders (or all of them if `n` is `None`) of `e`.
    pub fn open_pis(&mut self, mut e: ExprPtr, n: Option<usize>) -> (Vec<ExprPtr>, ExprPtr) {
        let mut locals = Vec::new();
        while n.map_or(true, |n| locals.len() < n) {
            if !matches!(self.read_expr(e), Pi { .. }) {
                break
            }
            match self.open_binder(e) {
                Some((local, body)) => {
                    locals.push(local);
                    e = body;
                }
                None => break,
            }
        }
        (locals, e)
    }

    /// Open up to `n` leading lambda binders of `e`.
    pub fn open_lambdas(&mut self, mut e: ExprPtr, n: usize) -> (Vec<ExprPtr>, ExprPtr) {
        let mut locals = Vec::new();
        while locals.len() < n {
            if !matches!(self.read_expr(e), Lambda { .. }) {
                break
            }
            match self.open_binder(e) {
                Some((local, body)) => {
                    locals.push(local);
                    e = body;
                }
                None => break,
            }
        }
        (locals, e)
    }

    /// The type of a `Local`.
    pub fn local_type(&self, e: ExprPtr) -> ExprPtr {
        match self.read_expr(e) {
            Local { binder_type, .. } => binder_type,
            _ => panic!("local_type expected a Local, got {:?}", self.debug_print(e)),
        }
    }

    /// Copy `local` with a new type, keeping its binder name and style.
    pub fn retype_local(&mut self, local: ExprPtr, ty: ExprPtr) -> ExprPtr {
        match self.read_expr(local) {
            Local { binder_name, binder_style, .. } => self.mk_unique(binder_name, binder_style, ty),
            _ => panic!("retype_local expected a Local, got {:?}", self.debug_print(local)),
        }
    }

    pub fn is_local(&self, e: ExprPtr) -> bool { matches!(self.read_expr(e), Local { .. }) }

    pub fn const_name(&self, e: ExprPtr) -> Option<NamePtr> {
        match self.read_expr(e) {
            Const { name, .. } => Some(name),
            _ => None,
        }
    }

    /// `f a b c` to `(f, [a, b, c])`
    pub fn unfold_apps(&self, mut e: ExprPtr) -> (ExprPtr, Vec<ExprPtr>) {
        let mut args = Vec::new();
        while let App { fun, arg, .. } = self.read_expr(e) {
            args.push(arg);
            e = fun;
        }
        args.reverse();
        (e, args)
    }

    pub fn unfold_apps_fun(&self, mut e: ExprPtr) -> ExprPtr {
        while let App { fun, .. } = self.read_expr(e) {
            e = fun;
        }
        e
    }

    /// `(f, [a, b, c])` to `f a b c`
    pub fn foldl_apps(&mut self, mut fun: ExprPtr, args: impl IntoIterator<Item = ExprPtr>) -> ExprPtr {
        for arg in args {
            fun = self.mk_app(fun, arg);
        }
        fun
    }

    /// Beta-reduce the head of `e` as long as it is an applied lambda.
    pub fn head_beta(&mut self, e: ExprPtr) -> ExprPtr {
        let (mut fun, args) = self.unfold_apps(e);
        let mut consumed = 0usize;
        while consumed < args.len() {
            match self.read_expr(fun) {
                Lambda { body, .. } => {
                    fun = self.inst1(body, args[consumed]);
                    consumed += 1;
                }
                _ => break,
            }
        }
        if consumed == 0 {
            return e
        }
        let out = self.foldl_apps(fun, args[consumed..].iter().copied());
        self.head_beta(out)
    }

    /// Whether some `Const` satisfying `pred` occurs in `e`.
    pub fn find_const(&self, e: ExprPtr, pred: &mut impl FnMut(NamePtr) -> bool) -> bool {
        let mut visited = new_fx_hash_set();
        let mut todo = vec![e];
        while let Some(e) = todo.pop() {
            if !visited.insert(e) {
                continue
            }
            match self.read_expr(e) {
                Const { name, .. } if pred(name) => return true,
                Local { binder_type, .. } => todo.push(binder_type),
                _ => todo.extend(self.children(e)),
            }
        }
        false
    }

    /// Whether the local `local` occurs in `e`.
    pub fn has_local(&self, e: ExprPtr, local: ExprPtr) -> bool {
        let mut visited = new_fx_hash_set();
        let mut todo = vec![e];
        while let Some(e) = todo.pop() {
            if e == local {
                return true
            }
            if !self.has_fvars(e) || !visited.insert(e) {
                continue
            }
            todo.extend(self.children(e));
        }
        false
    }
}
