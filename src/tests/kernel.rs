use super::util::{test_env, with_fixtures};
use crate::env::Env;
use crate::errors::OrnamentError;
use crate::expr::Expr;
use crate::inductive::InductiveDecl;
use crate::introspect::open_indices;
use crate::tc::TypeChecker;
use crate::util::Ctx;
use crate::{app, arrow};
use std::error::Error;

#[test]
fn inst_abstr_test0() -> Result<(), Box<dyn Error>> {
    let mut ctx = Ctx::new();
    let ty0 = ctx.type0();
    let f = ctx.const_of("f");
    let x = ctx.mk_local("x", ty0);
    let y = ctx.mk_local("y", ty0);
    let fxy = app!(in ctx; f, x, y);
    let abstracted = ctx.abstr(fxy, &[x, y]);
    let v0 = ctx.mk_var(0);
    let v1 = ctx.mk_var(1);
    assert_eq!(abstracted, app!(in ctx; f, v1, v0));
    assert_eq!(ctx.num_loose_bvars(abstracted), 2);
    assert!(!ctx.has_fvars(abstracted));
    assert_eq!(ctx.inst(abstracted, &[x, y]), fxy);
    assert_eq!(ctx.inst(abstracted, &[y, x]), app!(in ctx; f, y, x));
    Ok(())
}

#[test]
fn lift_lower_test0() -> Result<(), Box<dyn Error>> {
    let mut ctx = Ctx::new();
    let f = ctx.const_of("f");
    let v0 = ctx.mk_var(0);
    let v3 = ctx.mk_var(3);
    let e = app!(in ctx; f, v0, v3);
    let lifted = ctx.lift_loose_bvars(e, 2);
    let v2 = ctx.mk_var(2);
    let v5 = ctx.mk_var(5);
    assert_eq!(lifted, app!(in ctx; f, v2, v5));
    assert_eq!(ctx.lower_loose_bvars(lifted, 2), e);
    // bound occurrences are not shifted
    let ty0 = ctx.type0();
    let x = ctx.str1("x");
    let lam = ctx.mk_lambda(x, crate::expr::BinderStyle::Default, ty0, e);
    let lam_lifted = ctx.lift_loose_bvars(lam, 1);
    let v4 = ctx.mk_var(4);
    let expected_body = app!(in ctx; f, v0, v4);
    assert_eq!(lam_lifted, ctx.mk_lambda(x, crate::expr::BinderStyle::Default, ty0, expected_body));
    Ok(())
}

#[test]
fn telescope_open_test0() -> Result<(), Box<dyn Error>> {
    with_fixtures(|ctx, env, fx| {
        let vec_cons = ctx.const_of("Vec.cons");
        let ty = env.declar_type(&ctx.const_name(vec_cons).ok_or("no name")?).ok_or("Vec.cons is declared")?;
        let (binders, conclusion) = ctx.open_pis(ty, None);
        assert_eq!(binders.len(), 4);
        let (head, args) = ctx.unfold_apps(conclusion);
        assert_eq!(ctx.const_name(head), Some(fx.vec));
        assert_eq!(args[0], binders[0]);
        // reclosing gives back the same type
        assert_eq!(ctx.pi_telescope(&binders, conclusion), ty);
        Ok(())
    })
}

#[test]
fn open_indices_test0() -> Result<(), Box<dyn Error>> {
    // arrow-declared indices are opened with readable names
    with_fixtures(|ctx, env, fx| {
        let nat_c = ctx.mk_const(fx.nat);
        let vec = env.expect_inductive(ctx, fx.vec)?;
        let vec2 = env.expect_inductive(ctx, fx.vec2)?;
        let mut tc = TypeChecker::new(ctx, env);
        let indices = open_indices(&mut tc, vec, &[nat_c])?;
        let pair_indices = open_indices(&mut tc, vec2, &[nat_c])?;
        let mut names = Vec::new();
        for local in indices.iter().chain(pair_indices.iter()).copied() {
            match tc.ctx.read_expr(local) {
                Expr::Local { binder_name, binder_type, .. } => {
                    assert_eq!(binder_type, nat_c);
                    names.push(tc.ctx.name_to_string(binder_name));
                }
                owise => panic!("expected a local, got {:?}", owise),
            }
        }
        assert_eq!(names, vec!["i", "i0", "i1"]);
        Ok(())
    })
}

#[test]
fn nat_add_test0() -> Result<(), Box<dyn Error>> {
    with_fixtures(|ctx, env, _| {
        let add = ctx.const_of("add");
        let two = ctx.nat_lit(2);
        let three = ctx.nat_lit(3);
        let sum = app!(in ctx; add, two, three);
        let five = ctx.nat_lit(5);
        let mut tc = TypeChecker::new(ctx, env);
        assert_eq!(tc.normalize(sum), five);
        Ok(())
    })
}

#[test]
fn nat_literal_folding_test0() -> Result<(), Box<dyn Error>> {
    with_fixtures(|ctx, env, _| {
        let succs = ctx.mk_succ_app(4);
        let four = ctx.nat_lit(4);
        let double = ctx.const_of("double");
        let doubled = ctx.mk_app(double, succs);
        let eight = ctx.nat_lit(8);
        let mut tc = TypeChecker::new(ctx, env);
        assert_eq!(tc.normalize(succs), four);
        assert!(tc.def_eq(succs, four));
        assert_eq!(tc.normalize(doubled), eight);
        Ok(())
    })
}

#[test]
fn nat_literal_no_nat_test0() {
    // without `Nat` declared, constructor chains are left alone
    let mut ctx = Ctx::new();
    let env = Env::new();
    let zero = ctx.const_of("Nat.zero");
    let mut tc = TypeChecker::new(&mut ctx, &env);
    assert_eq!(tc.normalize(zero), zero);
}

#[test]
fn rec_iota_test0() -> Result<(), Box<dyn Error>> {
    with_fixtures(|ctx, env, _| {
        let first = ctx.const_of("first_or_default");
        let nat_c = ctx.const_of("Nat");
        let seven = ctx.nat_lit(7);
        let three = ctx.nat_lit(3);
        let xs = ctx.nat_list(&[3, 4]);
        let nil = ctx.nat_list(&[]);
        let on_cons = app!(in ctx; first, nat_c, seven, xs);
        let on_nil = app!(in ctx; first, nat_c, seven, nil);
        let mut tc = TypeChecker::new(ctx, env);
        assert_eq!(tc.whnf(on_cons), three);
        assert_eq!(tc.whnf(on_nil), seven);
        Ok(())
    })
}

#[test]
fn rec_iota_test1() -> Result<(), Box<dyn Error>> {
    with_fixtures(|ctx, env, _| {
        let length = ctx.const_of("length");
        let xs = ctx.nat_list(&[5, 5, 5]);
        let applied = ctx.mk_app(length, xs);
        let three = ctx.nat_lit(3);
        let mut tc = TypeChecker::new(ctx, env);
        assert_eq!(tc.normalize(applied), three);
        Ok(())
    })
}

#[test]
fn proj_reduce_test0() -> Result<(), Box<dyn Error>> {
    with_fixtures(|ctx, env, fx| {
        let mk = ctx.const_of("Pair.mk");
        let nat_c = ctx.const_of("Nat");
        let one = ctx.nat_lit(1);
        let two = ctx.nat_lit(2);
        let p = app!(in ctx; mk, nat_c, nat_c, one, two);
        let snd = ctx.mk_proj(fx.pair, 1, p);
        let mut tc = TypeChecker::new(ctx, env);
        assert_eq!(tc.whnf(snd), two);
        assert_eq!(tc.infer(snd)?, nat_c);
        Ok(())
    })
}

#[test]
fn case_reduce_test0() -> Result<(), Box<dyn Error>> {
    with_fixtures(|ctx, env, fx| {
        let nat_c = ctx.const_of("Nat");
        let list_nat = ctx.list_type_of_nat();
        let zero = ctx.nat_lit(0);
        let l = ctx.mk_local("l", list_nat);
        let motive = ctx.abstr_lambda(l, nat_c);
        let x = ctx.mk_local("x", nat_c);
        let rest = ctx.mk_local("rest", list_nat);
        let on_cons = ctx.lambda_telescope(&[x, rest], x);
        let xs = ctx.nat_list(&[9, 1]);
        let case = ctx.mk_case(fx.list, motive, xs, &[zero, on_cons]);
        let nine = ctx.nat_lit(9);
        let mut tc = TypeChecker::new(ctx, env);
        assert_eq!(tc.whnf(case), nine);
        let case_ty = tc.infer(case)?;
        assert!(tc.def_eq(case_ty, nat_c));
        Ok(())
    })
}

#[test]
fn infer_test0() -> Result<(), Box<dyn Error>> {
    with_fixtures(|ctx, env, _| {
        let xs = ctx.nat_list(&[1, 2]);
        let list_nat = ctx.list_type_of_nat();
        let packed = ctx.packed_nat_vec(&[1, 2]);
        let nat_c = ctx.const_of("Nat");
        let sigma = ctx.const_of("Sigma");
        let family = ctx.vec_family(nat_c);
        let packed_ty = app!(in ctx; sigma, nat_c, family);
        let mut tc = TypeChecker::new(ctx, env);
        let xs_ty = tc.infer(xs)?;
        assert!(tc.def_eq(xs_ty, list_nat));
        let inferred = tc.infer(packed)?;
        assert!(tc.def_eq(inferred, packed_ty));
        Ok(())
    })
}

#[test]
fn infer_unknown_test0() -> Result<(), Box<dyn Error>> {
    with_fixtures(|ctx, env, _| {
        let missing = ctx.const_of("not.declared");
        let mut tc = TypeChecker::new(ctx, env);
        assert_eq!(tc.infer(missing), Err(OrnamentError::UnknownDeclaration(String::from("not.declared"))));
        Ok(())
    })
}

#[test]
fn alpha_eq_test0() -> Result<(), Box<dyn Error>> {
    with_fixtures(|ctx, env, _| {
        let nat_c = ctx.const_of("Nat");
        let a = ctx.mk_local("a", nat_c);
        let b = ctx.mk_local("b", nat_c);
        let id_a = ctx.abstr_lambda(a, a);
        let id_b = ctx.abstr_lambda(b, b);
        assert_ne!(id_a, id_b);
        let succ = ctx.const_of("Nat.succ");
        let succ_a = ctx.mk_app(succ, a);
        let eta = ctx.abstr_lambda(a, succ_a);
        let mut tc = TypeChecker::new(ctx, env);
        assert!(tc.def_eq(id_a, id_b));
        assert!(tc.def_eq(eta, succ));
        assert!(!tc.def_eq(id_a, succ));
        Ok(())
    })
}

#[test]
fn derived_recursor_test0() -> Result<(), Box<dyn Error>> {
    with_fixtures(|ctx, env, fx| {
        let list = env.get_inductive(&fx.list).ok_or("List")?;
        assert_eq!((list.num_params, list.num_indices), (1, 0));
        assert!(list.is_recursive);
        let list_rec = env.get_rec(&list.rec_name.ok_or("List.rec")?).ok_or("List.rec")?;
        assert_eq!(list_rec.num_minors, 2);
        assert_eq!(list_rec.major_idx(), 4);

        let vec = env.get_inductive(&fx.vec).ok_or("Vec")?;
        let vec_rec = env.get_rec(&vec.rec_name.ok_or("Vec.rec")?).ok_or("Vec.rec")?;
        assert_eq!(vec_rec.major_idx(), 5);
        assert_eq!(vec_rec.rec_rules[1].num_fields, 3);

        let pair = env.get_inductive(&fx.pair).ok_or("Pair")?;
        assert!(!pair.is_recursive);
        assert_eq!(ctx.name_to_string(pair.rec_name.ok_or("Pair.rec")?), "Pair.rec");
        Ok(())
    })
}

#[test]
fn no_recursor_test0() -> Result<(), Box<dyn Error>> {
    with_fixtures(|_, env, fx| {
        let stream = env.get_inductive(&fx.stream).ok_or("Stream")?;
        assert!(stream.is_coinductive);
        assert_eq!(stream.rec_name, None);
        let ev = env.get_inductive(&fx.ev).ok_or("Ev")?;
        assert!(ev.is_mutual());
        assert_eq!(ev.rec_name, None);
        Ok(())
    })
}

#[test]
fn reject_redeclaration_test0() -> Result<(), Box<dyn Error>> {
    let mut ctx = Ctx::new();
    let (mut env, fx) = test_env(&mut ctx)?;
    let ty0 = ctx.type0();
    let unit_c = ctx.mk_const(fx.unit);
    let star = ctx.name_of("Unit.other");
    let decl = InductiveDecl::single(0, fx.unit, ty0, vec![(star, unit_c)]);
    match env.add_inductive(&mut ctx, decl) {
        Err(OrnamentError::MalformedDeclaration { name, .. }) => assert_eq!(name, "Unit"),
        owise => panic!("expected a malformed declaration, got {:?}", owise),
    }
    let nat_c = ctx.mk_const(fx.nat);
    assert!(env.add_axiom(&ctx, fx.add, nat_c).is_err());
    Ok(())
}

#[test]
fn reject_bad_ctor_test0() -> Result<(), Box<dyn Error>> {
    let mut ctx = Ctx::new();
    let (mut env, fx) = test_env(&mut ctx)?;
    let ty0 = ctx.type0();
    let nat_c = ctx.mk_const(fx.nat);
    let name = ctx.name_of("Wrong");
    let ctor = ctx.name_of("Wrong.mk");
    // the constructor produces a `Nat`, not a `Wrong`
    let decl = InductiveDecl::single(0, name, ty0, vec![(ctor, nat_c)]);
    assert!(matches!(env.add_inductive(&mut ctx, decl), Err(OrnamentError::MalformedDeclaration { .. })));
    assert!(!env.contains(&name));

    let name = ctx.name_of("Neg");
    let ctor = ctx.name_of("Neg.mk");
    let neg_c = ctx.mk_const(name);
    let neg_fn = arrow!(in ctx; neg_c, nat_c);
    let neg_ty = arrow!(in ctx; neg_fn, neg_c);
    let decl = InductiveDecl::single(0, name, ty0, vec![(ctor, neg_ty)]);
    assert!(matches!(env.add_inductive(&mut ctx, decl), Err(OrnamentError::MalformedDeclaration { .. })));
    Ok(())
}

#[test]
fn reject_open_definition_test0() -> Result<(), Box<dyn Error>> {
    let mut ctx = Ctx::new();
    let (mut env, fx) = test_env(&mut ctx)?;
    let nat_c = ctx.mk_const(fx.nat);
    let n = ctx.mk_local("n", nat_c);
    let name = ctx.name_of("leaky");
    assert!(env.add_definition(&ctx, name, nat_c, n).is_err());
    let v0 = ctx.mk_var(0);
    assert!(env.add_definition(&ctx, name, nat_c, v0).is_err());
    Ok(())
}
