//! C# extension-class generation from a canonical configuration.
//!
//! The output is a pure function of the [`CanonicalConfig`]: one static
//! class with an `int` constant per tag and value (the hashed name) and a
//! group of extension methods per tag and per value, all in file order.

use crate::codegen::hash::name_to_id;
use crate::codegen::types::{CanonicalConfig, ValueDef};
use crate::codegen::utils::{find_duplicates, is_base_type};
use crate::error::{AtomicError, Result};
use std::collections::HashSet;
use std::io::Write;

/// Extension of generated files
pub const GENERATED_EXTENSION: &str = "cs";

/// Text of the do-not-edit banner; marks a file as ours
pub const GENERATED_MARKER: &str = "Code generation. Don't modify!";

/// Namespace implicitly imported when inlining hints are emitted
pub const INLINING_NAMESPACE: &str = "System.Runtime.CompilerServices";

const AGGRESSIVE_INLINING: &str = "\t\t[MethodImpl(MethodImplOptions.AggressiveInlining)]";
const UNSAFE_SUFFIX: &str = "Unsafe";
const PARAM_NAME: &str = "entity";

/// Generate the complete source text for `config`.
///
/// Rejects configurations that would produce uncompilable output: blank
/// class/namespace/entity names and names declared more than once.
pub fn generate_source(config: &CanonicalConfig) -> Result<String> {
    check_preconditions(config)?;

    let mut output = Vec::new();
    generate_csharp_code(&mut output, config)
        .map_err(|e| AtomicError::generation(format!("Failed to emit source: {}", e)))?;

    String::from_utf8(output)
        .map_err(|e| AtomicError::generation(format!("Generated source is not UTF-8: {}", e)))
}

/// Write the generated source for `config` to `writer`
pub fn generate_csharp_code<W: Write>(writer: &mut W, config: &CanonicalConfig) -> std::io::Result<()> {
    writeln!(writer, "/**")?;
    writeln!(writer, "* {}", GENERATED_MARKER)?;
    writeln!(writer, "**/")?;
    writeln!(writer)?;

    let usings = collect_usings(config);
    if !usings.is_empty() {
        for namespace in &usings {
            writeln!(writer, "using {};", namespace)?;
        }
        writeln!(writer)?;
    }

    writeln!(writer, "namespace {}", config.namespace)?;
    writeln!(writer, "{{")?;
    writeln!(writer, "\tpublic static class {}", config.class_name)?;
    writeln!(writer, "\t{{")?;

    generate_constants(writer, config)?;

    if !config.tags.is_empty() {
        writeln!(writer)?;
        writeln!(writer, "\t\t///Tag Extensions")?;
        for tag in &config.tags {
            generate_tag_extensions(writer, tag, config)?;
        }
    }

    if !config.values.is_empty() {
        writeln!(writer)?;
        writeln!(writer, "\t\t///Value Extensions")?;
        for value in &config.values {
            generate_value_extensions(writer, value, config)?;
        }
    }

    writeln!(writer, "\t}}")?;
    writeln!(writer, "}}")?;

    Ok(())
}

/// True when `text` carries the generated-file banner
pub fn is_generated_text(text: &str) -> bool {
    text.lines().take(4).any(|line| line.contains(GENERATED_MARKER))
}

/// Using directives in emission order: the inlining namespace first when
/// enabled, then imports as listed. First occurrence wins.
///
/// ```rust
/// use atomgen::codegen::csharp_codegen::collect_usings;
/// use atomgen::CanonicalConfig;
///
/// let config = CanonicalConfig {
///     aggressive_inlining: true,
///     imports: vec!["UnityEngine".to_string(), "UnityEngine".to_string()],
///     ..Default::default()
/// };
/// assert_eq!(
///     collect_usings(&config),
///     vec!["System.Runtime.CompilerServices", "UnityEngine"]
/// );
/// ```
pub fn collect_usings(config: &CanonicalConfig) -> Vec<&str> {
    let mut seen = HashSet::new();
    let implicit = config.aggressive_inlining.then_some(INLINING_NAMESPACE);

    implicit
        .into_iter()
        .chain(config.imports.iter().map(|s| s.trim()))
        .filter(|namespace| !namespace.is_empty())
        .filter(|namespace| seen.insert(*namespace))
        .collect()
}

fn check_preconditions(config: &CanonicalConfig) -> Result<()> {
    for (field, value) in [
        ("className", &config.class_name),
        ("namespace", &config.namespace),
        ("entityType", &config.entity_type),
    ] {
        if value.trim().is_empty() {
            return Err(AtomicError::generation(format!("'{}' must not be empty", field)));
        }
    }

    let duplicates = duplicate_names(config);
    if !duplicates.is_empty() {
        return Err(AtomicError::generation(format!(
            "Duplicate constant names: {}",
            duplicates.join(", ")
        )));
    }

    Ok(())
}

/// Names declared more than once across tags and values, in first-seen order
pub fn duplicate_names(config: &CanonicalConfig) -> Vec<String> {
    find_duplicates(
        config
            .tags
            .iter()
            .map(String::as_str)
            .chain(config.values.iter().map(|v| v.name.as_str())),
    )
}

fn generate_constants<W: Write>(writer: &mut W, config: &CanonicalConfig) -> std::io::Result<()> {
    if !config.tags.is_empty() {
        writeln!(writer)?;
        writeln!(writer, "\t\t///Tags")?;
        for tag in &config.tags {
            writeln!(writer, "\t\tpublic const int {} = {};", tag, name_to_id(tag))?;
        }
    }

    if !config.values.is_empty() {
        writeln!(writer)?;
        writeln!(writer, "\t\t///Values")?;
        for value in &config.values {
            let id = name_to_id(&value.name);
            if is_base_type(&value.value_type) {
                writeln!(writer, "\t\tpublic const int {} = {};", value.name, id)?;
            } else {
                writeln!(
                    writer,
                    "\t\tpublic const int {} = {}; // {}",
                    value.name,
                    id,
                    value.value_type.trim()
                )?;
            }
        }
    }

    Ok(())
}

fn write_inlining<W: Write>(writer: &mut W, config: &CanonicalConfig) -> std::io::Result<()> {
    if config.aggressive_inlining {
        writeln!(writer, "{}", AGGRESSIVE_INLINING)?;
    }
    Ok(())
}

fn generate_tag_extensions<W: Write>(
    writer: &mut W,
    tag: &str,
    config: &CanonicalConfig,
) -> std::io::Result<()> {
    let entity = &config.entity_type;

    writeln!(writer)?;
    writeln!(writer, "\t\t#region {}", tag)?;

    for operation in ["Has", "Add", "Del"] {
        writeln!(writer)?;
        write_inlining(writer, config)?;
        writeln!(
            writer,
            "\t\tpublic static bool {op}{tag}Tag(this {entity} {p}) => {p}.{op}Tag({tag});",
            op = operation,
            tag = tag,
            entity = entity,
            p = PARAM_NAME,
        )?;
    }

    writeln!(writer)?;
    writeln!(writer, "\t\t#endregion")?;

    Ok(())
}

fn generate_value_extensions<W: Write>(
    writer: &mut W,
    value: &ValueDef,
    config: &CanonicalConfig,
) -> std::io::Result<()> {
    let entity = &config.entity_type;
    let name = &value.name;
    let ty = value.value_type.trim();
    let p = PARAM_NAME;
    let unsafe_suffix = if config.unsafe_access { UNSAFE_SUFFIX } else { "" };

    writeln!(writer)?;
    writeln!(writer, "\t\t#region {}", name)?;

    // Get
    writeln!(writer)?;
    write_inlining(writer, config)?;
    writeln!(
        writer,
        "\t\tpublic static {ty} Get{name}(this {entity} {p}) => {p}.GetValue{unsafe_suffix}<{ty}>({name});"
    )?;

    // Ref
    if config.unsafe_access {
        writeln!(writer)?;
        write_inlining(writer, config)?;
        writeln!(
            writer,
            "\t\tpublic static ref {ty} Ref{name}(this {entity} {p}) => ref {p}.GetValue{unsafe_suffix}<{ty}>({name});"
        )?;
    }

    // TryGet
    writeln!(writer)?;
    write_inlining(writer, config)?;
    writeln!(
        writer,
        "\t\tpublic static bool TryGet{name}(this {entity} {p}, out {ty} value) => {p}.TryGetValue{unsafe_suffix}({name}, out value);"
    )?;

    // Add
    writeln!(writer)?;
    write_inlining(writer, config)?;
    writeln!(
        writer,
        "\t\tpublic static void Add{name}(this {entity} {p}, {ty} value) => {p}.AddValue({name}, value);"
    )?;

    // Has
    writeln!(writer)?;
    write_inlining(writer, config)?;
    writeln!(
        writer,
        "\t\tpublic static bool Has{name}(this {entity} {p}) => {p}.HasValue({name});"
    )?;

    // Del
    writeln!(writer)?;
    write_inlining(writer, config)?;
    writeln!(
        writer,
        "\t\tpublic static bool Del{name}(this {entity} {p}) => {p}.DelValue({name});"
    )?;

    // Set
    writeln!(writer)?;
    write_inlining(writer, config)?;
    writeln!(
        writer,
        "\t\tpublic static void Set{name}(this {entity} {p}, {ty} value) => {p}.SetValue({name}, value);"
    )?;

    writeln!(writer)?;
    writeln!(writer, "\t\t#endregion")?;

    Ok(())
}
