use crate::env::Env;
use crate::errors::OrnResult;
use crate::inductive::{InductiveDecl, InductiveType};
use crate::pack::{add_sigma, pack};
use crate::util::{Ctx, ExprPtr, NamePtr};
use crate::{app, arrow};
use num_bigint::BigUint;
use std::error::Error;

/// The declarations of [`test_env`].
#[derive(Debug, Clone, Copy)]
pub(crate) struct Fixtures {
    pub(crate) nat: NamePtr,
    pub(crate) unit: NamePtr,
    pub(crate) add: NamePtr,
    pub(crate) double: NamePtr,
    pub(crate) list: NamePtr,
    pub(crate) vec: NamePtr,
    pub(crate) vec2: NamePtr,
    pub(crate) bad_vec: NamePtr,
    pub(crate) tree: NamePtr,
    pub(crate) sized_tree: NamePtr,
    pub(crate) e: NamePtr,
    pub(crate) d: NamePtr,
    pub(crate) w: NamePtr,
    pub(crate) ev: NamePtr,
    pub(crate) stream: NamePtr,
    pub(crate) pair: NamePtr,
    pub(crate) point3: NamePtr,
    pub(crate) first_or_default: NamePtr,
    pub(crate) length: NamePtr,
    pub(crate) shuffle: NamePtr,
}

pub(crate) fn with_fixtures<A>(
    f: impl FnOnce(&mut Ctx, &Env, &Fixtures) -> Result<A, Box<dyn Error>>,
) -> Result<A, Box<dyn Error>> {
    let mut ctx = Ctx::new();
    let (env, fixtures) = test_env(&mut ctx)?;
    f(&mut ctx, &env, &fixtures)
}

pub(crate) fn test_env(ctx: &mut Ctx) -> OrnResult<(Env, Fixtures)> {
    let mut env = Env::new();
    add_sigma(ctx, &mut env)?;
    let nat = declare_nat(ctx, &mut env)?;
    let unit = {
        let ty0 = ctx.type0();
        let unit_c = ctx.const_of("Unit");
        declare(ctx, &mut env, 0, "Unit", ty0, vec![("Unit.star", unit_c)])?
    };
    let add = define_add(ctx, &mut env)?;
    let double = define_double(ctx, &mut env)?;
    let list = declare_list(ctx, &mut env)?;
    let vec = declare_vec(ctx, &mut env)?;
    let vec2 = declare_vec2(ctx, &mut env)?;
    let bad_vec = declare_bad_vec(ctx, &mut env)?;
    let tree = declare_tree(ctx, &mut env)?;
    let sized_tree = declare_sized_tree(ctx, &mut env)?;
    let (e, d) = declare_e_d(ctx, &mut env)?;
    let w = declare_w(ctx, &mut env)?;
    let ev = declare_even_odd(ctx, &mut env)?;
    let stream = declare_stream(ctx, &mut env)?;
    let pair = declare_pair(ctx, &mut env)?;
    let point3 = declare_point3(ctx, &mut env)?;
    let first_or_default = define_first_or_default(ctx, &mut env)?;
    let length = define_length(ctx, &mut env)?;
    let shuffle = {
        let name = ctx.name_of("shuffle");
        let list_nat = ctx.list_type_of_nat();
        let ty = arrow!(in ctx; list_nat, list_nat);
        env.add_axiom(ctx, name, ty)?;
        name
    };
    let fixtures = Fixtures {
        nat,
        unit,
        add,
        double,
        list,
        vec,
        vec2,
        bad_vec,
        tree,
        sized_tree,
        e,
        d,
        w,
        ev,
        stream,
        pair,
        point3,
        first_or_default,
        length,
        shuffle,
    };
    Ok((env, fixtures))
}

pub(crate) fn declare(
    ctx: &mut Ctx,
    env: &mut Env,
    num_params: u16,
    name: &str,
    ty: ExprPtr,
    ctors: Vec<(&str, ExprPtr)>,
) -> OrnResult<NamePtr> {
    let name = ctx.name_of(name);
    let ctors = ctors.into_iter().map(|(n, t)| (ctx.name_of(n), t)).collect();
    env.add_inductive(ctx, InductiveDecl::single(num_params, name, ty, ctors))?;
    Ok(name)
}

fn declare_nat(ctx: &mut Ctx, env: &mut Env) -> OrnResult<NamePtr> {
    let ty0 = ctx.type0();
    let nat_c = ctx.const_of("Nat");
    let n = ctx.mk_local("n", nat_c);
    let succ_ty = ctx.pi_telescope(&[n], nat_c);
    declare(ctx, env, 0, "Nat", ty0, vec![("Nat.zero", nat_c), ("Nat.succ", succ_ty)])
}

/// `add n m`, recursing on `m`.
fn define_add(ctx: &mut Ctx, env: &mut Env) -> OrnResult<NamePtr> {
    let nat_c = ctx.const_of("Nat");
    let succ = ctx.const_of("Nat.succ");
    let rec = ctx.const_of("Nat.rec");
    let n = ctx.mk_local("n", nat_c);
    let m = ctx.mk_local("m", nat_c);
    let t = ctx.mk_local("t", nat_c);
    let motive = ctx.abstr_lambda(t, nat_c);
    let k = ctx.mk_local("k", nat_c);
    let ih = ctx.mk_local("ih", nat_c);
    let succ_ih = ctx.mk_app(succ, ih);
    let step = ctx.lambda_telescope(&[k, ih], succ_ih);
    let body = app!(in ctx; rec, motive, n, step, m);
    let val = ctx.lambda_telescope(&[n, m], body);
    let ty = arrow!(in ctx; nat_c, nat_c, nat_c);
    let name = ctx.name_of("add");
    env.add_definition(ctx, name, ty, val)?;
    Ok(name)
}

fn define_double(ctx: &mut Ctx, env: &mut Env) -> OrnResult<NamePtr> {
    let nat_c = ctx.const_of("Nat");
    let add = ctx.const_of("add");
    let n = ctx.mk_local("n", nat_c);
    let body = app!(in ctx; add, n, n);
    let val = ctx.abstr_lambda(n, body);
    let ty = arrow!(in ctx; nat_c, nat_c);
    let name = ctx.name_of("double");
    env.add_definition(ctx, name, ty, val)?;
    Ok(name)
}

fn declare_list(ctx: &mut Ctx, env: &mut Env) -> OrnResult<NamePtr> {
    let ty0 = ctx.type0();
    let list_c = ctx.const_of("List");
    let t = ctx.mk_local("T", ty0);
    let list_t = ctx.mk_app(list_c, t);
    let list_ty = ctx.pi_telescope(&[t], ty0);
    let nil_ty = ctx.pi_telescope(&[t], list_t);
    let x = ctx.mk_local("x", t);
    let l = ctx.mk_local("l", list_t);
    let cons_ty = ctx.pi_telescope(&[t, x, l], list_t);
    declare(ctx, env, 1, "List", list_ty, vec![("List.nil", nil_ty), ("List.cons", cons_ty)])
}

/// `Vec T : Nat → Type`, with the length of the tail bound before the head.
fn declare_vec(ctx: &mut Ctx, env: &mut Env) -> OrnResult<NamePtr> {
    let ty0 = ctx.type0();
    let nat_c = ctx.const_of("Nat");
    let zero = ctx.const_of("Nat.zero");
    let succ = ctx.const_of("Nat.succ");
    let vec_c = ctx.const_of("Vec");
    let t = ctx.mk_local("T", ty0);
    let fam = arrow!(in ctx; nat_c, ty0);
    let vec_ty = ctx.pi_telescope(&[t], fam);
    let nil_concl = app!(in ctx; vec_c, t, zero);
    let nil_ty = ctx.pi_telescope(&[t], nil_concl);
    let n = ctx.mk_local("n", nat_c);
    let x = ctx.mk_local("x", t);
    let vec_t_n = app!(in ctx; vec_c, t, n);
    let v = ctx.mk_local("v", vec_t_n);
    let succ_n = ctx.mk_app(succ, n);
    let cons_concl = app!(in ctx; vec_c, t, succ_n);
    let cons_ty = ctx.pi_telescope(&[t, n, x, v], cons_concl);
    declare(ctx, env, 1, "Vec", vec_ty, vec![("Vec.nil", nil_ty), ("Vec.cons", cons_ty)])
}

/// `Vec2 T n k`: a vector of length `n` whose second index is `2 * n`.
fn declare_vec2(ctx: &mut Ctx, env: &mut Env) -> OrnResult<NamePtr> {
    let ty0 = ctx.type0();
    let nat_c = ctx.const_of("Nat");
    let zero = ctx.const_of("Nat.zero");
    let succ = ctx.const_of("Nat.succ");
    let vec2_c = ctx.const_of("Vec2");
    let t = ctx.mk_local("T", ty0);
    let fam = arrow!(in ctx; nat_c, nat_c, ty0);
    let vec2_ty = ctx.pi_telescope(&[t], fam);
    let nil_concl = app!(in ctx; vec2_c, t, zero, zero);
    let nil_ty = ctx.pi_telescope(&[t], nil_concl);
    let n = ctx.mk_local("n", nat_c);
    let x = ctx.mk_local("x", t);
    let k = ctx.mk_local("k", nat_c);
    let tail_ty = app!(in ctx; vec2_c, t, n, k);
    let v = ctx.mk_local("v", tail_ty);
    let succ_n = ctx.mk_app(succ, n);
    let succ_k = ctx.mk_app(succ, k);
    let succ_succ_k = ctx.mk_app(succ, succ_k);
    let cons_concl = app!(in ctx; vec2_c, t, succ_n, succ_succ_k);
    let cons_ty = ctx.pi_telescope(&[t, n, x, k, v], cons_concl);
    declare(ctx, env, 1, "Vec2", vec2_ty, vec![("Vec2.nil", nil_ty), ("Vec2.cons", cons_ty)])
}

/// Like `Vec`, but the tail of a cons is always empty.
fn declare_bad_vec(ctx: &mut Ctx, env: &mut Env) -> OrnResult<NamePtr> {
    let ty0 = ctx.type0();
    let nat_c = ctx.const_of("Nat");
    let zero = ctx.const_of("Nat.zero");
    let succ = ctx.const_of("Nat.succ");
    let bad_c = ctx.const_of("BadVec");
    let t = ctx.mk_local("T", ty0);
    let fam = arrow!(in ctx; nat_c, ty0);
    let bad_ty = ctx.pi_telescope(&[t], fam);
    let nil_concl = app!(in ctx; bad_c, t, zero);
    let nil_ty = ctx.pi_telescope(&[t], nil_concl);
    let x = ctx.mk_local("x", t);
    let v = ctx.mk_local("v", nil_concl);
    let one = ctx.mk_app(succ, zero);
    let cons_concl = app!(in ctx; bad_c, t, one);
    let cons_ty = ctx.pi_telescope(&[t, x, v], cons_concl);
    declare(ctx, env, 1, "BadVec", bad_ty, vec![("BadVec.nil", nil_ty), ("BadVec.cons", cons_ty)])
}

fn declare_tree(ctx: &mut Ctx, env: &mut Env) -> OrnResult<NamePtr> {
    let ty0 = ctx.type0();
    let tree_c = ctx.const_of("Tree");
    let t = ctx.mk_local("T", ty0);
    let tree_t = ctx.mk_app(tree_c, t);
    let tree_ty = ctx.pi_telescope(&[t], ty0);
    let leaf_ty = ctx.pi_telescope(&[t], tree_t);
    let l = ctx.mk_local("l", tree_t);
    let x = ctx.mk_local("x", t);
    let r = ctx.mk_local("r", tree_t);
    let node_ty = ctx.pi_telescope(&[t, l, x, r], tree_t);
    declare(ctx, env, 1, "Tree", tree_ty, vec![("Tree.leaf", leaf_ty), ("Tree.node", node_ty)])
}

/// Trees indexed by their number of nodes.
fn declare_sized_tree(ctx: &mut Ctx, env: &mut Env) -> OrnResult<NamePtr> {
    let ty0 = ctx.type0();
    let nat_c = ctx.const_of("Nat");
    let zero = ctx.const_of("Nat.zero");
    let succ = ctx.const_of("Nat.succ");
    let add = ctx.const_of("add");
    let st_c = ctx.const_of("SizedTree");
    let t = ctx.mk_local("T", ty0);
    let fam = arrow!(in ctx; nat_c, ty0);
    let st_ty = ctx.pi_telescope(&[t], fam);
    let leaf_concl = app!(in ctx; st_c, t, zero);
    let leaf_ty = ctx.pi_telescope(&[t], leaf_concl);
    let n = ctx.mk_local("n", nat_c);
    let l_ty = app!(in ctx; st_c, t, n);
    let l = ctx.mk_local("l", l_ty);
    let x = ctx.mk_local("x", t);
    let m = ctx.mk_local("m", nat_c);
    let r_ty = app!(in ctx; st_c, t, m);
    let r = ctx.mk_local("r", r_ty);
    let sum = app!(in ctx; add, n, m);
    let size = ctx.mk_app(succ, sum);
    let node_concl = app!(in ctx; st_c, t, size);
    let node_ty = ctx.pi_telescope(&[t, n, l, x, m, r], node_concl);
    declare(ctx, env, 1, "SizedTree", st_ty, vec![("SizedTree.leaf", leaf_ty), ("SizedTree.node", node_ty)])
}

/// `E : Nat → Type` and `D : Nat → Nat → Type`, where both indices of `D` count
/// constructors, so either position relates `D` to `E`.
fn declare_e_d(ctx: &mut Ctx, env: &mut Env) -> OrnResult<(NamePtr, NamePtr)> {
    let ty0 = ctx.type0();
    let nat_c = ctx.const_of("Nat");
    let zero = ctx.const_of("Nat.zero");
    let succ = ctx.const_of("Nat.succ");

    let e_c = ctx.const_of("E");
    let e_ty = arrow!(in ctx; nat_c, ty0);
    let e_nil = ctx.mk_app(e_c, zero);
    let n = ctx.mk_local("n", nat_c);
    let e_n = ctx.mk_app(e_c, n);
    let prev = ctx.mk_local("e", e_n);
    let succ_n = ctx.mk_app(succ, n);
    let e_succ_n = ctx.mk_app(e_c, succ_n);
    let e_cons = ctx.pi_telescope(&[n, prev], e_succ_n);
    let e = declare(ctx, env, 0, "E", e_ty, vec![("E.nil", e_nil), ("E.cons", e_cons)])?;

    let d_c = ctx.const_of("D");
    let d_ty = arrow!(in ctx; nat_c, nat_c, ty0);
    let d_nil = app!(in ctx; d_c, zero, zero);
    let n = ctx.mk_local("n", nat_c);
    let m = ctx.mk_local("m", nat_c);
    let d_n_m = app!(in ctx; d_c, n, m);
    let prev = ctx.mk_local("d", d_n_m);
    let succ_n = ctx.mk_app(succ, n);
    let succ_m = ctx.mk_app(succ, m);
    let concl = app!(in ctx; d_c, succ_n, succ_m);
    let d_cons = ctx.pi_telescope(&[n, m, prev], concl);
    let d = declare(ctx, env, 0, "D", d_ty, vec![("D.nil", d_nil), ("D.cons", d_cons)])?;
    Ok((e, d))
}

/// `W : Unit → Unit → Type`; neither index lines up with the `Nat` index of `E`.
fn declare_w(ctx: &mut Ctx, env: &mut Env) -> OrnResult<NamePtr> {
    let ty0 = ctx.type0();
    let unit_c = ctx.const_of("Unit");
    let star = ctx.const_of("Unit.star");
    let w_c = ctx.const_of("W");
    let w_ty = arrow!(in ctx; unit_c, unit_c, ty0);
    let w_star = app!(in ctx; w_c, star, star);
    let prev = ctx.mk_local("w", w_star);
    let w_cons = ctx.pi_telescope(&[prev], w_star);
    declare(ctx, env, 0, "W", w_ty, vec![("W.nil", w_star), ("W.cons", w_cons)])
}

fn declare_even_odd(ctx: &mut Ctx, env: &mut Env) -> OrnResult<NamePtr> {
    let ty0 = ctx.type0();
    let (ev, od) = (ctx.name_of("Ev"), ctx.name_of("Od"));
    let ev_c = ctx.mk_const(ev);
    let od_c = ctx.mk_const(od);
    let ev_succ = arrow!(in ctx; od_c, ev_c);
    let od_succ = arrow!(in ctx; ev_c, od_c);
    let decl = InductiveDecl {
        num_params: 0,
        types: vec![
            InductiveType {
                name: ev,
                ty: ty0,
                ctors: vec![(ctx.name_of("Ev.zero"), ev_c), (ctx.name_of("Ev.succ"), ev_succ)],
            },
            InductiveType { name: od, ty: ty0, ctors: vec![(ctx.name_of("Od.succ"), od_succ)] },
        ],
        is_coinductive: false,
    };
    env.add_inductive(ctx, decl)?;
    Ok(ev)
}

fn declare_stream(ctx: &mut Ctx, env: &mut Env) -> OrnResult<NamePtr> {
    let ty0 = ctx.type0();
    let name = ctx.name_of("Stream");
    let stream_c = ctx.mk_const(name);
    let t = ctx.mk_local("T", ty0);
    let stream_t = ctx.mk_app(stream_c, t);
    let stream_ty = ctx.pi_telescope(&[t], ty0);
    let x = ctx.mk_local("x", t);
    let s = ctx.mk_local("s", stream_t);
    let cons_ty = ctx.pi_telescope(&[t, x, s], stream_t);
    let cons = ctx.name_of("Stream.cons");
    let decl = InductiveDecl {
        num_params: 1,
        types: vec![InductiveType { name, ty: stream_ty, ctors: vec![(cons, cons_ty)] }],
        is_coinductive: true,
    };
    env.add_inductive(ctx, decl)?;
    Ok(name)
}

fn declare_pair(ctx: &mut Ctx, env: &mut Env) -> OrnResult<NamePtr> {
    let ty0 = ctx.type0();
    let pair_c = ctx.const_of("Pair");
    let a = ctx.mk_local("A", ty0);
    let b = ctx.mk_local("B", ty0);
    let pair_ty = ctx.pi_telescope(&[a, b], ty0);
    let fst = ctx.mk_local("fst", a);
    let snd = ctx.mk_local("snd", b);
    let concl = app!(in ctx; pair_c, a, b);
    let mk_ty = ctx.pi_telescope(&[a, b, fst, snd], concl);
    declare(ctx, env, 2, "Pair", pair_ty, vec![("Pair.mk", mk_ty)])
}

fn declare_point3(ctx: &mut Ctx, env: &mut Env) -> OrnResult<NamePtr> {
    let ty0 = ctx.type0();
    let nat_c = ctx.const_of("Nat");
    let point_c = ctx.const_of("Point3");
    let x = ctx.mk_local("x", nat_c);
    let y = ctx.mk_local("y", nat_c);
    let z = ctx.mk_local("z", nat_c);
    let mk_ty = ctx.pi_telescope(&[x, y, z], point_c);
    declare(ctx, env, 0, "Point3", ty0, vec![("Point3.mk", mk_ty)])
}

/// `first_or_default T d l`: the head of `l`, or `d` if `l` is empty.
fn define_first_or_default(ctx: &mut Ctx, env: &mut Env) -> OrnResult<NamePtr> {
    let ty0 = ctx.type0();
    let list_c = ctx.const_of("List");
    let rec = ctx.const_of("List.rec");
    let t = ctx.mk_local("T", ty0);
    let d = ctx.mk_local("d", t);
    let list_t = ctx.mk_app(list_c, t);
    let l = ctx.mk_local("l", list_t);
    let scrutinee = ctx.mk_local("l", list_t);
    let motive = ctx.abstr_lambda(scrutinee, t);
    let x = ctx.mk_local("x", t);
    let rest = ctx.mk_local("rest", list_t);
    let ih = ctx.mk_local("ih", t);
    let on_cons = ctx.lambda_telescope(&[x, rest, ih], x);
    let body = app!(in ctx; rec, t, motive, d, on_cons, l);
    let val = ctx.lambda_telescope(&[t, d, l], body);
    let ty = ctx.pi_telescope(&[t, d, l], t);
    let name = ctx.name_of("first_or_default");
    env.add_definition(ctx, name, ty, val)?;
    Ok(name)
}

fn define_length(ctx: &mut Ctx, env: &mut Env) -> OrnResult<NamePtr> {
    let nat_c = ctx.const_of("Nat");
    let zero = ctx.const_of("Nat.zero");
    let succ = ctx.const_of("Nat.succ");
    let rec = ctx.const_of("List.rec");
    let list_nat = ctx.list_type_of_nat();
    let l = ctx.mk_local("l", list_nat);
    let scrutinee = ctx.mk_local("l", list_nat);
    let motive = ctx.abstr_lambda(scrutinee, nat_c);
    let x = ctx.mk_local("x", nat_c);
    let rest = ctx.mk_local("rest", list_nat);
    let ih = ctx.mk_local("ih", nat_c);
    let succ_ih = ctx.mk_app(succ, ih);
    let on_cons = ctx.lambda_telescope(&[x, rest, ih], succ_ih);
    let body = app!(in ctx; rec, nat_c, motive, zero, on_cons, l);
    let val = ctx.abstr_lambda(l, body);
    let ty = arrow!(in ctx; list_nat, nat_c);
    let name = ctx.name_of("length");
    env.add_definition(ctx, name, ty, val)?;
    Ok(name)
}

impl Ctx {
    pub(crate) fn const_of(&mut self, s: &str) -> ExprPtr {
        let n = self.name_of(s);
        self.mk_const(n)
    }

    pub(crate) fn nat_lit(&mut self, n: u64) -> ExprPtr { self.mk_nat_lit_quick(BigUint::from(n)) }

    pub(crate) fn mk_succ_app(&mut self, n: usize) -> ExprPtr {
        let mut out = self.const_of("Nat.zero");
        let succ = self.const_of("Nat.succ");
        for _ in 0..n {
            out = self.mk_app(succ, out);
        }
        out
    }

    pub(crate) fn list_type_of_nat(&mut self) -> ExprPtr {
        let list_c = self.const_of("List");
        let nat_c = self.const_of("Nat");
        self.mk_app(list_c, nat_c)
    }

    /// `List.cons T x₀ (.. (List.nil T))`
    pub(crate) fn list_of(&mut self, elem_ty: ExprPtr, elems: &[ExprPtr]) -> ExprPtr {
        let nil = self.const_of("List.nil");
        let cons = self.const_of("List.cons");
        let mut out = self.mk_app(nil, elem_ty);
        for x in elems.iter().rev().copied() {
            out = app!(in self; cons, elem_ty, x, out);
        }
        out
    }

    pub(crate) fn nat_list(&mut self, elems: &[u64]) -> ExprPtr {
        let nat_c = self.const_of("Nat");
        let elems = elems.iter().map(|n| self.nat_lit(*n)).collect::<Vec<_>>();
        self.list_of(nat_c, &elems)
    }

    /// `Vec.cons T n x₀ (.. (Vec.nil T))` with literal lengths.
    pub(crate) fn vec_of(&mut self, elem_ty: ExprPtr, elems: &[ExprPtr]) -> ExprPtr {
        let nil = self.const_of("Vec.nil");
        let cons = self.const_of("Vec.cons");
        let mut out = self.mk_app(nil, elem_ty);
        for (len, x) in elems.iter().rev().copied().enumerate() {
            let n = self.nat_lit(len as u64);
            out = app!(in self; cons, elem_ty, n, x, out);
        }
        out
    }

    /// `λ n, Vec T n`
    pub(crate) fn vec_family(&mut self, elem_ty: ExprPtr) -> ExprPtr {
        let nat_c = self.const_of("Nat");
        let vec_c = self.const_of("Vec");
        let n = self.mk_local("n", nat_c);
        let body = app!(in self; vec_c, elem_ty, n);
        self.abstr_lambda(n, body)
    }

    /// The packed vector holding `elems`.
    pub(crate) fn packed_nat_vec(&mut self, elems: &[u64]) -> ExprPtr {
        let nat_c = self.const_of("Nat");
        let elems = elems.iter().map(|n| self.nat_lit(*n)).collect::<Vec<_>>();
        let len = self.nat_lit(elems.len() as u64);
        let family = self.vec_family(nat_c);
        let value = self.vec_of(nat_c, &elems);
        pack(self, nat_c, family, len, value)
    }
}
