//! End-to-end tests for parsing, mapping, generation and change analysis

use atomgen::analysis::change_analyzer::should_regenerate;
use atomgen::analysis::validation::{lint, missing_fields};
use atomgen::codegen::{
    generate_from_text, generate_source, map_to_config, name_to_id, parse_file_data,
    CanonicalConfig, OutputPathResolver, OutputRequest, ValueDef,
};
use pretty_assertions::assert_eq;
use std::path::{Path, PathBuf};

const PLAYER: &str = r#"header: "PlayerAPI"
entityType: IEntity
aggressiveInlining: false
unsafe: false
namespace: NS
className: Foo
directory: Assets/Generated

imports:
- UnityEngine

tags:
- Enemy

values:
- Health: float
"#;

#[test]
fn test_hash_reference_values() {
    assert_eq!(name_to_id(""), 17);
    assert_eq!(name_to_id("A"), 592);
    assert_eq!(name_to_id("Enemy"), name_to_id("Enemy"));
}

#[test]
fn test_end_to_end_player_file() {
    let source = generate_from_text(PLAYER).unwrap();

    assert!(source.contains("namespace NS\n{\n\tpublic static class Foo\n\t{"));
    assert!(source.contains("using UnityEngine;"));
    assert!(source.contains(&format!("public const int Enemy = {};", name_to_id("Enemy"))));
    assert!(source.contains(&format!(
        "public const int Health = {}; // float",
        name_to_id("Health")
    )));

    for method in ["HasEnemyTag", "AddEnemyTag", "DelEnemyTag"] {
        assert!(source.contains(&format!(" {}(this IEntity entity", method)), "{}", method);
    }
    for method in ["GetHealth", "TryGetHealth", "AddHealth", "HasHealth", "DelHealth", "SetHealth"] {
        assert!(source.contains(&format!(" {}(this IEntity entity", method)), "{}", method);
    }
    assert!(!source.contains("RefHealth"));
    assert!(!source.contains("MethodImpl"));
    assert!(source.ends_with("\t}\n}\n"));
}

#[test]
fn test_generation_is_deterministic() {
    let config = map_to_config(&parse_file_data(PLAYER).unwrap()).unwrap();
    assert_eq!(generate_source(&config).unwrap(), generate_source(&config).unwrap());
}

#[test]
fn test_emission_preserves_declaration_order() {
    let config = CanonicalConfig {
        class_name: "Order".to_string(),
        namespace: "NS".to_string(),
        tags: vec!["B".to_string(), "A".to_string()],
        values: vec![ValueDef::new("y", "int"), ValueDef::new("x", "string")],
        ..Default::default()
    };
    let source = generate_source(&config).unwrap();

    let position = |needle: &str| source.find(needle).unwrap_or_else(|| panic!("missing {}", needle));
    assert!(position("public const int B =") < position("public const int A ="));
    assert!(position("public const int y =") < position("public const int x ="));
    assert!(position("#region B") < position("#region A"));
    assert!(position("#region y") < position("#region x"));
}

#[test]
fn test_unsafe_gating_applies_to_every_value() {
    let text = PLAYER
        .replace("unsafe: false", "unsafe: true")
        .replace("- Health: float", "- Health: float\n- Mana: int");
    let source = generate_from_text(&text).unwrap();

    assert!(source.contains("RefHealth"));
    assert!(source.contains("RefMana"));
    assert_eq!(source.matches("public static ref ").count(), 2);
    assert_eq!(source.matches("TryGetValueUnsafe").count(), 2);
}

#[test]
fn test_defaults_fill_blank_header() {
    let source = generate_from_text("tags:\n- Enemy\n").unwrap();
    assert!(source.contains("namespace Generated"));
    assert!(source.contains("public static class AtomicExtensions"));
    assert!(source.contains("(this IEntity entity)"));
}

#[test]
fn test_invalid_boolean_aborts_generation() {
    let err = generate_from_text(&PLAYER.replace("unsafe: false", "unsafe: maybe")).unwrap_err();
    assert!(err.is_configuration());
}

#[test]
fn test_change_classification() {
    let moved = PLAYER.replace("directory: Assets/Generated", "directory: Assets/Other");
    assert!(!should_regenerate(Some(PLAYER), &moved));

    let retyped = PLAYER.replace("- Health: float", "- Health: double");
    assert!(should_regenerate(Some(PLAYER), &retyped));

    let reheadered = PLAYER.replace("\"PlayerAPI\"", "\"EnemyAPI\"");
    assert!(should_regenerate(Some(PLAYER), &reheadered));

    assert!(should_regenerate(None, PLAYER));
}

#[test]
fn test_required_fields_and_lint_on_complete_file() {
    let data = parse_file_data(PLAYER).unwrap();
    assert!(missing_fields(&data).is_empty());
    assert!(lint(&data).is_empty());
}

#[test]
fn test_output_path_boundaries() {
    let resolver = OutputPathResolver::default();

    let colocated = resolver
        .resolve(&OutputRequest {
            directory: None,
            class_name: "Foo",
            source_file: Path::new("/proj/src/x.atomic"),
            project_root: None,
            content_root: None,
        })
        .unwrap();
    assert_eq!(colocated, PathBuf::from("/proj/src/Foo.cs"));

    let absolute = resolver
        .resolve(&OutputRequest {
            directory: Some("/abs/out"),
            class_name: "Foo",
            source_file: Path::new("/anywhere/else/x.atomic"),
            project_root: Some(Path::new("/some/root")),
            content_root: None,
        })
        .unwrap();
    assert_eq!(absolute, PathBuf::from("/abs/out/Foo.cs"));
}
