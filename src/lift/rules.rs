//! Classification of the nodes met while lifting. Each node is classified once, and
//! the lifter then dispatches on the result; the checks here are tried in order, so
//! an earlier rule shadows later ones.
use super::config::Direction;
use super::{Lifter, Shape};
use crate::env::Declar;
use crate::errors::OrnResult;
use crate::expr::Expr::*;
use crate::util::{ExprPtr, NamePtr};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiftRule {
    /// Already lifted in this binder context.
    CacheHit(ExprPtr),
    /// Applied or bare reference the lifter must not look into.
    OpaqueSkip,
    Structural(StructuralRule),
    /// Recurse into every subterm.
    Generic,
    /// Does not mention the source type.
    Unchanged,
    /// A case split or fixpoint that takes a value of the named type apart directly.
    Unliftable(NamePtr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructuralRule {
    TypeFormer,
    Constructor,
    Eliminator,
    /// A projection out of a packed value (backward), or out of a record (forward).
    IndexProjection,
    /// A transparent definition mentioning the source type, unfolded and lifted.
    Constant,
    /// An application headed by a definition; the head is lifted first.
    Application,
    /// A type former, constructor or eliminator missing `missing` arguments.
    EtaExpand { missing: usize },
}

impl StructuralRule {
    pub(crate) fn may_need_repack(self) -> bool {
        matches!(self, StructuralRule::Application | StructuralRule::Constant | StructuralRule::Eliminator)
    }
}

impl<'x, 'c> Lifter<'x, 'c> {
    pub fn classify(&mut self, e: ExprPtr) -> OrnResult<LiftRule> {
        let direction = self.direction();
        if let Some(hit) = self.config.cache.get(self.tc.ctx, e, self.depth, direction) {
            return Ok(LiftRule::CacheHit(hit))
        }
        if !self.mentions(e) {
            return Ok(LiftRule::Unchanged)
        }
        let (head, args) = self.tc.ctx.unfold_apps(e);
        let head_name = self.tc.ctx.const_name(head);
        if let Some(name) = head_name {
            if self.is_opaque(name) {
                return Ok(LiftRule::OpaqueSkip)
            }
        }
        if let Some(ty) = self.scrutinized(e)? {
            return Ok(LiftRule::Unliftable(ty))
        }
        if let Some(rule) = self.structural(e, &args)? {
            return Ok(LiftRule::Structural(rule))
        }
        let env = self.tc.env;
        if let Some(Declar::Definition { opaque: false, .. }) = head_name.and_then(|n| env.get_declar(&n)) {
            let rule = if args.is_empty() { StructuralRule::Constant } else { StructuralRule::Application };
            return Ok(LiftRule::Structural(rule))
        }
        Ok(LiftRule::Generic)
    }

    /// The name of the source type if `e` is a case split, fixpoint or projection that
    /// takes a source value apart without going through its eliminator.
    fn scrutinized(&mut self, e: ExprPtr) -> OrnResult<Option<NamePtr>> {
        let source = self.source;
        let hit = match self.tc.ctx.read_expr(e) {
            Case { ind_name, .. } => ind_name == source,
            Fix { binder_type, rec_arg, .. } => self.domain_is_source(binder_type, Some(rec_arg as usize)),
            CoFix { binder_type, .. } => self.domain_is_source(binder_type, None),
            Proj { ty_name, .. } => ty_name == source && matches!(self.shape, Shape::Algebraic { .. }),
            App { .. } => self.eliminates_chain(e)?,
            _ => false,
        };
        Ok(if hit { Some(source) } else { None })
    }

    /// Whether the `position`th domain of the pi type `ty` (or any domain, if `None`) is
    /// an application of the source type.
    fn domain_is_source(&mut self, ty: ExprPtr, position: Option<usize>) -> bool {
        let n = position.map(|p| p + 1);
        let (binders, _) = self.tc.ctx.open_pis(ty, n);
        let candidates = match position {
            Some(p) => binders.get(p).copied().into_iter().collect::<Vec<_>>(),
            None => binders,
        };
        candidates.into_iter().any(|local| {
            let dom = self.tc.ctx.local_type(local);
            let dom = self.tc.whnf(dom);
            self.tc.ctx.const_name(self.tc.ctx.unfold_apps_fun(dom)) == Some(self.source)
        })
    }

    fn structural(&mut self, e: ExprPtr, args: &[ExprPtr]) -> OrnResult<Option<StructuralRule>> {
        let head = self.tc.ctx.unfold_apps_fun(e);
        let name = self.tc.ctx.const_name(head);
        let env = self.tc.env;
        let saturate = |arity: usize, rule: StructuralRule| {
            if args.len() < arity {
                StructuralRule::EtaExpand { missing: arity - args.len() }
            } else {
                rule
            }
        };
        match (&self.shape, self.direction()) {
            (Shape::Algebraic { index, before_rec, after_rec, .. }, direction) => {
                let (ind, rec) = match direction {
                    Direction::Forward => (index.before, *before_rec),
                    Direction::Backward => (index.after, *after_rec),
                };
                if let Some(name) = name {
                    if name == ind {
                        let arity = env.expect_inductive(self.tc.ctx, ind)?.arity();
                        return Ok(Some(saturate(arity, StructuralRule::TypeFormer)))
                    }
                    if let Some(ctor) = env.get_ctor(&name).filter(|c| c.inductive_name == ind) {
                        return Ok(Some(saturate(ctor.arity(), StructuralRule::Constructor)))
                    }
                    if name == rec {
                        let major = env.get_rec(&rec).map(|r| r.major_idx()).unwrap_or(0);
                        return Ok(Some(saturate(major + 1, StructuralRule::Eliminator)))
                    }
                }
                if direction == Direction::Backward {
                    return self.backward_packing_rule(e, name, args)
                }
                Ok(None)
            }
            (Shape::Record(r), Direction::Forward) => {
                let (record, ctor, rec, num_params) = (r.record, r.ctor, r.rec, r.params.len());
                let num_fields = r.num_fields;
                if let Proj { ty_name, .. } = self.tc.ctx.read_expr(e) {
                    return Ok(if ty_name == record { Some(StructuralRule::IndexProjection) } else { None })
                }
                Ok(match name {
                    Some(n) if n == record => Some(saturate(num_params, StructuralRule::TypeFormer)),
                    Some(n) if n == ctor => Some(saturate(num_params + num_fields, StructuralRule::Constructor)),
                    Some(n) if n == rec => Some(saturate(num_params + 3, StructuralRule::Eliminator)),
                    _ => None,
                })
            }
            (Shape::Record(_), Direction::Backward) => self.backward_chain_rule(e, name, args),
        }
    }
}
