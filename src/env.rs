use crate::errors::{malformed, OrnResult, OrnamentError};
use crate::util::{new_fx_index_map, Ctx, ExprPtr, FxIndexMap, NamePtr};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeclarInfo {
    pub name: NamePtr,
    pub ty: ExprPtr,
}

#[derive(Debug, Clone)]
pub enum Declar {
    Axiom { info: DeclarInfo },
    /// Opaque definitions are never delta-unfolded by the kernel.
    Definition { info: DeclarInfo, val: ExprPtr, opaque: bool },
    Inductive(InductiveData),
    Constructor(ConstructorData),
    Recursor(RecursorData),
}

impl Declar {
    pub fn info(&self) -> &DeclarInfo {
        match self {
            Declar::Axiom { info }
            | Declar::Definition { info, .. }
            | Declar::Inductive(InductiveData { info, .. })
            | Declar::Constructor(ConstructorData { info, .. })
            | Declar::Recursor(RecursorData { info, .. }) => info,
        }
    }
}

#[derive(Debug, Clone)]
pub struct InductiveData {
    pub info: DeclarInfo,
    pub num_params: u16,
    pub num_indices: u16,
    /// The names of every type declared in the same block; more than one means
    /// the block is mutual.
    pub all_ind_names: Arc<[NamePtr]>,
    pub all_ctor_names: Arc<[NamePtr]>,
    pub is_recursive: bool,
    pub is_coinductive: bool,
    /// The derived eliminator. Mutual and coinductive blocks have none.
    pub rec_name: Option<NamePtr>,
}

impl InductiveData {
    pub fn is_mutual(&self) -> bool { self.all_ind_names.len() > 1 }

    /// Number of arguments a fully applied type former takes.
    pub fn arity(&self) -> usize { (self.num_params + self.num_indices) as usize }
}

#[derive(Debug, Clone)]
pub struct ConstructorData {
    pub info: DeclarInfo,
    pub inductive_name: NamePtr,
    pub ctor_idx: u16,
    pub num_params: u16,
    pub num_fields: u16,
}

impl ConstructorData {
    pub fn arity(&self) -> usize { (self.num_params + self.num_fields) as usize }
}

#[derive(Debug, Clone)]
pub struct RecursorData {
    pub info: DeclarInfo,
    pub ind_name: NamePtr,
    pub num_params: u16,
    pub num_indices: u16,
    pub num_motives: u16,
    pub num_minors: u16,
    pub rec_rules: Arc<[RecRule]>,
}

impl RecursorData {
    /// Position of the major premise in a full application of the recursor.
    pub fn major_idx(&self) -> usize { (self.num_params + self.num_motives + self.num_minors + self.num_indices) as usize }

    pub fn motive_idx(&self) -> usize { self.num_params as usize }

    pub fn minors_start(&self) -> usize { (self.num_params + self.num_motives) as usize }

    pub fn indices_start(&self) -> usize { (self.num_params + self.num_motives + self.num_minors) as usize }
}

/// An iota rule: `val` is a closed lambda over the recursor's parameters, motive,
/// minor premises and then the constructor's fields.
#[derive(Debug, Clone, Copy)]
pub struct RecRule {
    pub ctor_name: NamePtr,
    pub num_fields: u16,
    pub val: ExprPtr,
}

/// The global environment: declarations keyed by name, in insertion order.
#[derive(Debug, Clone)]
pub struct Env {
    pub(crate) declars: FxIndexMap<NamePtr, Declar>,
}

impl Default for Env {
    fn default() -> Self { Self::new() }
}

impl Env {
    pub fn new() -> Self { Self { declars: new_fx_index_map() } }

    pub fn get_declar(&self, n: &NamePtr) -> Option<&Declar> { self.declars.get(n) }

    pub fn get_inductive(&self, n: &NamePtr) -> Option<&InductiveData> {
        match self.declars.get(n) {
            Some(Declar::Inductive(d)) => Some(d),
            _ => None,
        }
    }

    pub fn get_ctor(&self, n: &NamePtr) -> Option<&ConstructorData> {
        match self.declars.get(n) {
            Some(Declar::Constructor(d)) => Some(d),
            _ => None,
        }
    }

    pub fn get_rec(&self, n: &NamePtr) -> Option<&RecursorData> {
        match self.declars.get(n) {
            Some(Declar::Recursor(d)) => Some(d),
            _ => None,
        }
    }

    /// The value of a definition the kernel may unfold (i.e. not opaque).
    pub fn get_unfoldable(&self, n: &NamePtr) -> Option<ExprPtr> {
        match self.declars.get(n) {
            Some(Declar::Definition { val, opaque: false, .. }) => Some(*val),
            _ => None,
        }
    }

    pub fn declar_type(&self, n: &NamePtr) -> Option<ExprPtr> { self.declars.get(n).map(|d| d.info().ty) }

    pub fn contains(&self, n: &NamePtr) -> bool { self.declars.contains_key(n) }

    /// Look up an inductive, or fail with `UnknownDeclaration`.
    pub fn expect_inductive(&self, ctx: &Ctx, n: NamePtr) -> OrnResult<&InductiveData> {
        self.get_inductive(&n).ok_or_else(|| OrnamentError::UnknownDeclaration(ctx.name_to_string(n)))
    }

    pub(crate) fn insert_declar(&mut self, ctx: &Ctx, d: Declar) -> OrnResult<()> {
        let name = d.info().name;
        if self.declars.contains_key(&name) {
            return Err(malformed(ctx.name_to_string(name), "already declared"))
        }
        self.declars.insert(name, d);
        Ok(())
    }

    fn check_closed(ctx: &Ctx, name: NamePtr, es: &[ExprPtr]) -> OrnResult<()> {
        for e in es.iter().copied() {
            if ctx.num_loose_bvars(e) > 0 || ctx.has_fvars(e) {
                return Err(malformed(ctx.name_to_string(name), "declarations must be closed terms"))
            }
        }
        Ok(())
    }

    pub fn add_axiom(&mut self, ctx: &Ctx, name: NamePtr, ty: ExprPtr) -> OrnResult<()> {
        Self::check_closed(ctx, name, &[ty])?;
        self.insert_declar(ctx, Declar::Axiom { info: DeclarInfo { name, ty } })
    }

    pub fn add_definition(&mut self, ctx: &Ctx, name: NamePtr, ty: ExprPtr, val: ExprPtr) -> OrnResult<()> {
        Self::check_closed(ctx, name, &[ty, val])?;
        self.insert_declar(ctx, Declar::Definition { info: DeclarInfo { name, ty }, val, opaque: false })
    }

    pub fn add_opaque_definition(&mut self, ctx: &Ctx, name: NamePtr, ty: ExprPtr, val: ExprPtr) -> OrnResult<()> {
        Self::check_closed(ctx, name, &[ty, val])?;
        self.insert_declar(ctx, Declar::Definition { info: DeclarInfo { name, ty }, val, opaque: true })
    }
}
