use crate::expr::Expr::*;
use crate::name::Name;
use crate::util::{Ctx, ExprPtr, NamePtr};
use std::fmt;

pub struct DebugPrinter<'x, A> {
    pub(crate) ctx: &'x Ctx,
    pub(crate) elem_to_print: A,
}

impl Ctx {
    pub fn debug_print<A>(&self, elem_to_print: A) -> DebugPrinter<'_, A> { DebugPrinter { ctx: self, elem_to_print } }
}

impl<'x> fmt::Debug for DebugPrinter<'x, NamePtr> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Name::*;
        match self.ctx.read_name(self.elem_to_print) {
            Anon => Ok(()),
            Str(pfx, sfx, _) => {
                let sfx = self.ctx.read_string(sfx);
                match self.ctx.read_name(pfx) {
                    Anon => write!(f, "{}", sfx),
                    _ => write!(f, "{:?}.{}", self.ctx.debug_print(pfx), sfx),
                }
            }
            Num(pfx, sfx, _) => match self.ctx.read_name(pfx) {
                Anon => write!(f, "{}", sfx),
                _ => write!(f, "{:?}.{}", self.ctx.debug_print(pfx), sfx),
            },
        }
    }
}

impl<'x, A> fmt::Debug for DebugPrinter<'x, &[A]>
where
    A: Copy,
    DebugPrinter<'x, A>: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.elem_to_print.iter().copied().map(|x| self.ctx.debug_print(x))).finish()
    }
}

impl<'x> fmt::Debug for DebugPrinter<'x, ExprPtr> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ctx.read_expr(self.elem_to_print) {
            Var { dbj_idx, .. } => write!(f, "${}", dbj_idx),
            Sort { level, .. } => write!(f, "Sort({})", level),
            Const { name, .. } => write!(f, "{:?}", self.ctx.debug_print(name)),
            App { fun, arg, .. } => write!(f, "({:?} {:?})", self.ctx.debug_print(fun), self.ctx.debug_print(arg)),
            Let { binder_name, val, binder_type, body, .. } => {
                write!(
                    f,
                    "let {:?} : {:?} := {:?} in {:?}",
                    self.ctx.debug_print(binder_name),
                    self.ctx.debug_print(binder_type),
                    self.ctx.debug_print(val),
                    self.ctx.debug_print(body)
                )
            }
            Pi { binder_name, binder_type, body, .. } => {
                write!(
                    f,
                    "Pi ({:?} : {:?}), {:?}",
                    self.ctx.debug_print(binder_name),
                    self.ctx.debug_print(binder_type),
                    self.ctx.debug_print(body)
                )
            }
            Lambda { binder_name, binder_type, body, .. } => {
                write!(
                    f,
                    "fun ({:?} : {:?}) => {:?}",
                    self.ctx.debug_print(binder_name),
                    self.ctx.debug_print(binder_type),
                    self.ctx.debug_print(body)
                )
            }
            Local { binder_name, id, .. } => write!(f, "#({:?}, {})", self.ctx.debug_print(binder_name), id),
            Proj { idx, structure, .. } => write!(f, "%({:?}).{}", self.ctx.debug_print(structure), idx),
            Case { ind_name, motive, scrutinee, branches, .. } => {
                let branches = self.ctx.read_exprs(branches);
                write!(
                    f,
                    "case[{:?}] {:?} return {:?} with {:?}",
                    self.ctx.debug_print(ind_name),
                    self.ctx.debug_print(scrutinee),
                    self.ctx.debug_print(motive),
                    self.ctx.debug_print(branches.as_ref())
                )
            }
            Fix { binder_name, body, rec_arg, .. } => {
                write!(f, "fix[{}] {:?} => {:?}", rec_arg, self.ctx.debug_print(binder_name), self.ctx.debug_print(body))
            }
            CoFix { binder_name, body, .. } => {
                write!(f, "cofix {:?} => {:?}", self.ctx.debug_print(binder_name), self.ctx.debug_print(body))
            }
            Cast { val, ty, .. } => write!(f, "({:?} :> {:?})", self.ctx.debug_print(val), self.ctx.debug_print(ty)),
            NatLit { ptr, .. } => write!(f, "{}", self.ctx.read_bignum(ptr)),
        }
    }
}
