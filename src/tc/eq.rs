use crate::expr::Expr::*;
use crate::tc::TypeChecker;
use crate::util::ExprPtr;

impl<'x> TypeChecker<'x> {
    /// Definitional equality by normalization: both sides are reduced to strong normal
    /// form and then compared up to alpha-equivalence and lambda-eta.
    pub fn def_eq(&mut self, a: ExprPtr, b: ExprPtr) -> bool {
        if a == b {
            return true
        }
        let a = self.normalize(a);
        let b = self.normalize(b);
        self.alpha_eq(a, b)
    }

    /// Structural equality ignoring binder names and binder styles. Terms may carry loose
    /// bound variables.
    pub fn alpha_eq(&mut self, a: ExprPtr, b: ExprPtr) -> bool {
        if a == b {
            return true
        }
        match self.ctx.read_expr_pair(a, b) {
            (Sort { level: l1, .. }, Sort { level: l2, .. }) => l1 == l2,
            (App { fun: f1, arg: a1, .. }, App { fun: f2, arg: a2, .. }) => self.alpha_eq(f1, f2) && self.alpha_eq(a1, a2),
            (Pi { binder_type: t1, body: b1, .. }, Pi { binder_type: t2, body: b2, .. })
            | (Lambda { binder_type: t1, body: b1, .. }, Lambda { binder_type: t2, body: b2, .. }) => {
                self.alpha_eq(t1, t2) && self.alpha_eq(b1, b2)
            }
            (Lambda { body, .. }, _) => self.eta_eq(body, b),
            (_, Lambda { body, .. }) => self.eta_eq(body, a),
            (Let { binder_type: t1, val: v1, body: b1, .. }, Let { binder_type: t2, val: v2, body: b2, .. }) => {
                self.alpha_eq(t1, t2) && self.alpha_eq(v1, v2) && self.alpha_eq(b1, b2)
            }
            (Proj { ty_name: n1, idx: i1, structure: s1, .. }, Proj { ty_name: n2, idx: i2, structure: s2, .. }) => {
                n1 == n2 && i1 == i2 && self.alpha_eq(s1, s2)
            }
            (
                Case { ind_name: n1, motive: m1, scrutinee: s1, branches: bs1, .. },
                Case { ind_name: n2, motive: m2, scrutinee: s2, branches: bs2, .. },
            ) => {
                let bs1 = self.ctx.read_exprs(bs1);
                let bs2 = self.ctx.read_exprs(bs2);
                n1 == n2
                    && bs1.len() == bs2.len()
                    && self.alpha_eq(m1, m2)
                    && self.alpha_eq(s1, s2)
                    && bs1.iter().zip(bs2.iter()).all(|(x, y)| self.alpha_eq(*x, *y))
            }
            (Fix { binder_type: t1, body: b1, rec_arg: r1, .. }, Fix { binder_type: t2, body: b2, rec_arg: r2, .. }) => {
                r1 == r2 && self.alpha_eq(t1, t2) && self.alpha_eq(b1, b2)
            }
            (CoFix { binder_type: t1, body: b1, .. }, CoFix { binder_type: t2, body: b2, .. }) => {
                self.alpha_eq(t1, t2) && self.alpha_eq(b1, b2)
            }
            (Cast { val: v1, .. }, Cast { val: v2, .. }) => self.alpha_eq(v1, v2),
            (NatLit { ptr: p1, .. }, NatLit { ptr: p2, .. }) => p1 == p2,
            _ => false,
        }
    }

    /// `λ x, body =?= other` where `other` is not a lambda: compare `body` against
    /// `other x`, with `x` as the loose `Var 0`.
    fn eta_eq(&mut self, body: ExprPtr, other: ExprPtr) -> bool {
        let shifted = self.ctx.lift_loose_bvars(other, 1);
        let v0 = self.ctx.mk_var(0);
        let expanded = self.ctx.mk_app(shifted, v0);
        self.alpha_eq(body, expanded)
    }
}
