use super::util::with_fixtures;
use crate::errors::OrnamentError;
use crate::lift::config::{Direction, LiftOptions, LiftingConfiguration};
use crate::lift::lift;
use crate::ornament::{discover, DiscoveryOptions};
use crate::util::Config;
use std::error::Error;

#[test]
fn config_defaults_test0() -> Result<(), Box<dyn Error>> {
    let config = Config::from_json_str("{}")?;
    assert!(config.opaque.is_empty());
    assert!(config.first_candidate_wins);
    assert!(config.repack);
    assert!(config.eta_expand);
    assert!(!config.retain_cache);
    assert_eq!(config.discovery_options(), DiscoveryOptions::default());
    assert_eq!(config.lift_options(), LiftOptions::default());
    Ok(())
}

#[test]
fn config_explicit_test0() -> Result<(), Box<dyn Error>> {
    let config = Config::from_json_str(
        r#"{
            "opaque": ["length", "Nat.add"],
            "first_candidate_wins": false,
            "repack": false,
            "retain_cache": true,
            "eta_expand": false
        }"#,
    )?;
    assert_eq!(config.opaque, vec!["length".to_string(), "Nat.add".to_string()]);
    assert_eq!(config.discovery_options(), DiscoveryOptions { first_candidate_wins: false });
    assert_eq!(config.lift_options(), LiftOptions { repack: false, eta_expand: false, retain_cache: true });
    Ok(())
}

#[test]
fn config_malformed_test0() {
    assert!(Config::from_json_str(r#"{ "opaque": ["A..b"] }"#).is_err());
    assert!(Config::from_json_str(r#"{ "opaque": [""] }"#).is_err());
    assert!(Config::from_json_str(r#"{ "opaque": [".tail"] }"#).is_err());
    assert!(Config::from_json_str(r#"{ "repack": "yes" }"#).is_err());
    assert!(Config::from_json_str("not json").is_err());
    match Config::from_json_str(r#"{ "opaque": ["List.", "length"] }"#) {
        Err(e) => assert_eq!(e.to_string(), "malformed opaque name \"List.\""),
        Ok(owise) => panic!("expected a malformed name error, got {:?}", owise),
    }
}

#[test]
fn config_opaque_names_test0() -> Result<(), Box<dyn Error>> {
    with_fixtures(|ctx, _, fx| {
        let config = Config::from_json_str(r#"{ "opaque": ["length", "List.cons"] }"#)?;
        let names = config.opaque_names(ctx);
        let cons = ctx.name_of("List.cons");
        assert_eq!(names, vec![fx.length, cons]);
        Ok(())
    })
}

#[test]
fn config_discovery_test0() -> Result<(), Box<dyn Error>> {
    with_fixtures(|ctx, env, fx| {
        let strict = Config::from_json_str(r#"{ "first_candidate_wins": false }"#)?;
        match discover(ctx, env, fx.e, fx.d, &strict.discovery_options()) {
            Err(OrnamentError::AmbiguousIndex { positions, .. }) => assert_eq!(positions, vec![0, 1]),
            owise => panic!("expected an ambiguous index, got {:?}", owise),
        }
        let lenient = Config::default();
        let corr = discover(ctx, env, fx.e, fx.d, &lenient.discovery_options())?;
        assert_eq!(corr.index_descriptor().map(|d| d.position), Some(0));
        Ok(())
    })
}

#[test]
fn config_lifting_test0() -> Result<(), Box<dyn Error>> {
    // a configured opaque name survives lifting untouched
    with_fixtures(|ctx, env, fx| {
        let corr = discover(ctx, env, fx.list, fx.vec, &DiscoveryOptions::default())?;
        let config = Config::from_json_str(r#"{ "opaque": ["length"] }"#)?;
        let opaque = config.opaque_names(ctx);
        let mut lifting = LiftingConfiguration::with_options(&corr, Direction::Forward, &opaque, config.lift_options());
        let length = ctx.mk_const(fx.length);
        assert_eq!(lift(ctx, env, &mut lifting, length)?, length);
        assert_eq!(lifting.direction, Direction::Forward);
        Ok(())
    })
}

#[test]
fn error_display_test0() {
    let cases = [
        (OrnamentError::UnsupportedShape("Stream is coinductive".to_string()), "Unsupported declaration shape: Stream is coinductive"),
        (
            OrnamentError::NoIndexCandidate { before: "E".to_string(), after: "W".to_string() },
            "No index position relates E to W",
        ),
        (
            OrnamentError::AmbiguousIndex { before: "E".to_string(), after: "D".to_string(), positions: vec![0, 1] },
            "Ambiguous index between E and D: positions [0, 1] all qualify",
        ),
        (
            OrnamentError::AlignmentFailure { ctor: "BadVec.cons".to_string(), reason: "no index".to_string() },
            "Cannot align constructor BadVec.cons: no index",
        ),
        (
            OrnamentError::UnliftableNode { node: "List.casesOn".to_string(), ty: "List".to_string() },
            "Cannot lift List.casesOn: it scrutinizes a value of List directly",
        ),
        (OrnamentError::UnknownDeclaration("Nope".to_string()), "Unknown declaration: Nope"),
        (
            OrnamentError::MalformedDeclaration { name: "f".to_string(), reason: "open term".to_string() },
            "Malformed declaration f: open term",
        ),
    ];
    for (err, expected) in cases.iter() {
        assert_eq!(err.to_string(), *expected);
    }
}
