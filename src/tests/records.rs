use super::util::{with_fixtures, Fixtures};
use crate::app;
use crate::errors::{OrnResult, OrnamentError};
use crate::lift::config::{Direction, LiftingConfiguration};
use crate::lift::{initialize_lifting_configuration, lift};
use crate::ornament::{discover_curry_record, CorrespondenceDescriptor, CorrespondenceKind};
use crate::pack::{as_pack, pack};
use crate::tc::TypeChecker;
use crate::util::{Ctx, ExprPtr};
use crate::env::Env;
use std::error::Error;

fn pair_config(ctx: &mut Ctx, env: &Env, fx: &Fixtures, direction: Direction) -> OrnResult<LiftingConfiguration> {
    let corr = discover_curry_record(ctx, env, fx.pair)?;
    Ok(initialize_lifting_configuration(&corr, direction, &[]))
}

/// `Pair.mk Nat Nat a b`
fn nat_pair(ctx: &mut Ctx, a: u64, b: u64) -> ExprPtr {
    let mk = ctx.const_of("Pair.mk");
    let nat_c = ctx.const_of("Nat");
    let (a, b) = (ctx.nat_lit(a), ctx.nat_lit(b));
    app!(in ctx; mk, nat_c, nat_c, a, b)
}

/// `Sigma.mk Nat (λ fst, Nat) a b`
fn nat_chain(ctx: &mut Ctx, a: u64, b: u64) -> ExprPtr {
    let nat_c = ctx.const_of("Nat");
    let fst = ctx.mk_local("fst", nat_c);
    let family = ctx.abstr_lambda(fst, nat_c);
    let (a, b) = (ctx.nat_lit(a), ctx.nat_lit(b));
    pack(ctx, nat_c, family, a, b)
}

#[test]
fn curry_discovery_test0() -> Result<(), Box<dyn Error>> {
    with_fixtures(|ctx, env, fx| {
        let corr: CorrespondenceDescriptor = discover_curry_record(ctx, env, fx.pair)?;
        assert_eq!(corr.kind, CorrespondenceKind::CurryRecord { record: fx.pair, num_fields: 2 });
        assert_eq!(corr.after, ctx.name_of("Sigma"));
        assert_eq!(corr.indexer, None);
        assert!(corr.index_descriptor().is_none());

        let nat_c = ctx.mk_const(fx.nat);
        let p = nat_pair(ctx, 1, 2);
        let promoted = app!(in ctx; corr.promote, nat_c, nat_c, p);
        let chain = nat_chain(ctx, 1, 2);
        let forgotten = app!(in ctx; corr.forget, nat_c, nat_c, chain);
        let mut tc = TypeChecker::new(ctx, env);
        assert!(tc.def_eq(promoted, chain));
        assert!(tc.def_eq(forgotten, p));
        Ok(())
    })
}

#[test]
fn curry_discovery_test1() -> Result<(), Box<dyn Error>> {
    with_fixtures(|ctx, env, fx| {
        assert!(matches!(discover_curry_record(ctx, env, fx.list), Err(OrnamentError::UnsupportedShape(_))));
        assert!(matches!(discover_curry_record(ctx, env, fx.unit), Err(OrnamentError::UnsupportedShape(_))));
        assert!(matches!(discover_curry_record(ctx, env, fx.vec), Err(OrnamentError::UnsupportedShape(_))));
        Ok(())
    })
}

#[test]
fn record_constructor_test0() -> Result<(), Box<dyn Error>> {
    with_fixtures(|ctx, env, fx| {
        let p = nat_pair(ctx, 1, 2);
        let mut forward = pair_config(ctx, env, fx, Direction::Forward)?;
        let lifted = lift(ctx, env, &mut forward, p)?;
        let chain = nat_chain(ctx, 1, 2);
        let mut backward = pair_config(ctx, env, fx, Direction::Backward)?;
        let back = lift(ctx, env, &mut backward, lifted)?;
        assert_eq!(back, p);
        let mut tc = TypeChecker::new(ctx, env);
        assert!(tc.def_eq(lifted, chain));
        Ok(())
    })
}

#[test]
fn record_projection_test0() -> Result<(), Box<dyn Error>> {
    with_fixtures(|ctx, env, fx| {
        let p = nat_pair(ctx, 1, 2);
        let fst = ctx.mk_proj(fx.pair, 0, p);
        let mut forward = pair_config(ctx, env, fx, Direction::Forward)?;
        let one = ctx.nat_lit(1);
        assert_eq!(lift(ctx, env, &mut forward, fst)?, one);
        Ok(())
    })
}

#[test]
fn record_projection_test1() -> Result<(), Box<dyn Error>> {
    // `λ p, p.2` across both directions
    with_fixtures(|ctx, env, fx| {
        let nat_c = ctx.mk_const(fx.nat);
        let pair_c = ctx.mk_const(fx.pair);
        let pair_ty = app!(in ctx; pair_c, nat_c, nat_c);
        let p = ctx.mk_local("p", pair_ty);
        let snd = ctx.mk_proj(fx.pair, 1, p);
        let get_snd = ctx.abstr_lambda(p, snd);

        let mut forward = pair_config(ctx, env, fx, Direction::Forward)?;
        let lifted = lift(ctx, env, &mut forward, get_snd)?;

        let sigma = ctx.name_of("Sigma");
        let sigma_c = ctx.mk_const(sigma);
        let fst = ctx.mk_local("fst", nat_c);
        let family = ctx.abstr_lambda(fst, nat_c);
        let chain_ty = app!(in ctx; sigma_c, nat_c, family);
        let c = ctx.mk_local("c", chain_ty);
        let second = ctx.mk_proj(sigma, 1, c);
        let expected = ctx.abstr_lambda(c, second);

        let mut backward = pair_config(ctx, env, fx, Direction::Backward)?;
        let back = lift(ctx, env, &mut backward, lifted)?;
        let mut tc = TypeChecker::new(ctx, env);
        assert!(tc.def_eq(lifted, expected));
        assert!(tc.def_eq(back, get_snd));
        Ok(())
    })
}

#[test]
fn record_eliminator_test0() -> Result<(), Box<dyn Error>> {
    with_fixtures(|ctx, env, fx| {
        let nat_c = ctx.mk_const(fx.nat);
        let pair_c = ctx.mk_const(fx.pair);
        let pair_ty = app!(in ctx; pair_c, nat_c, nat_c);
        let r = ctx.mk_local("r", pair_ty);
        let motive = ctx.abstr_lambda(r, nat_c);
        let a = ctx.mk_local("a", nat_c);
        let b = ctx.mk_local("b", nat_c);
        let take_first = ctx.lambda_telescope(&[a, b], a);
        let p = nat_pair(ctx, 1, 2);
        let rec = ctx.const_of("Pair.rec");
        let e = app!(in ctx; rec, nat_c, nat_c, motive, take_first, p);

        let mut forward = pair_config(ctx, env, fx, Direction::Forward)?;
        let one = ctx.nat_lit(1);
        assert_eq!(lift(ctx, env, &mut forward, e)?, one);
        Ok(())
    })
}

#[test]
fn record_chain_eliminator_test0() -> Result<(), Box<dyn Error>> {
    // eliminating a pair chain directly has no record counterpart
    with_fixtures(|ctx, env, fx| {
        let nat_c = ctx.mk_const(fx.nat);
        let fst = ctx.mk_local("fst", nat_c);
        let family = ctx.abstr_lambda(fst, nat_c);
        let sigma_c = ctx.const_of("Sigma");
        let chain_ty = app!(in ctx; sigma_c, nat_c, family);
        let c = ctx.mk_local("c", chain_ty);
        let motive = ctx.abstr_lambda(c, nat_c);
        let a = ctx.mk_local("a", nat_c);
        let b = ctx.mk_local("b", nat_c);
        let take_first = ctx.lambda_telescope(&[a, b], a);
        let chain = nat_chain(ctx, 1, 2);
        let rec = ctx.const_of("Sigma.rec");
        let e = app!(in ctx; rec, nat_c, family, motive, take_first, chain);

        let mut backward = pair_config(ctx, env, fx, Direction::Backward)?;
        match lift(ctx, env, &mut backward, e) {
            Err(OrnamentError::UnliftableNode { ty, .. }) => assert_eq!(ty, "Sigma"),
            owise => panic!("expected an unliftable node, got {:?}", owise),
        }
        Ok(())
    })
}

#[test]
fn nested_record_test0() -> Result<(), Box<dyn Error>> {
    with_fixtures(|ctx, env, fx| {
        let corr = discover_curry_record(ctx, env, fx.point3)?;
        assert_eq!(corr.kind, CorrespondenceKind::CurryRecord { record: fx.point3, num_fields: 3 });
        let mk = ctx.const_of("Point3.mk");
        let (x, y, z) = (ctx.nat_lit(1), ctx.nat_lit(2), ctx.nat_lit(3));
        let point = app!(in ctx; mk, x, y, z);

        let mut forward = initialize_lifting_configuration(&corr, Direction::Forward, &[]);
        let lifted = lift(ctx, env, &mut forward, point)?;
        let outer = as_pack(ctx, lifted).ok_or("a lifted record is a pack")?;
        assert_eq!(outer.index, x);
        let inner = as_pack(ctx, outer.value).ok_or("the rest of the chain is a pack")?;
        assert_eq!((inner.index, inner.value), (y, z));

        let mut backward = initialize_lifting_configuration(&corr, Direction::Backward, &[]);
        assert_eq!(lift(ctx, env, &mut backward, lifted)?, point);
        Ok(())
    })
}
