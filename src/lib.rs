//! # atomgen: C# extension generation from `.atomic` entity files
//!
//! An `.atomic` file declares the tags and typed values of an entity type.
//! atomgen turns it into a static C# class with one hashed `int` constant per
//! name and a group of extension methods per tag and value.
//!
//! ## Features
//!
//! - **Deterministic generation**: the output is a pure function of the file
//! - **Change classification**: edits to routing fields (`directory`,
//!   `className`, `solution`) do not trigger regeneration
//! - **Orchestration**: debounced, per-file serialized, idempotent writes
//! - **Validation and rename**: lint plus type checks through a pluggable
//!   type oracle; renames rewrite call sites before regenerating
//!
//! ## Example
//!
//! ```yaml
//! entityType: IEntity
//! aggressiveInlining: true
//! namespace: Game.Generated
//! className: EntityExtensions
//! directory: Assets/Scripts/Generated
//!
//! imports:
//! - UnityEngine
//!
//! tags:
//! - Enemy
//!
//! values:
//! - Health: float
//! - Position: Vector3
//! ```
//!
//! ```rust
//! let source = atomgen::codegen::generate_from_text(
//!     "namespace: Game\nclassName: Foo\ntags:\n- Enemy\n",
//! ).unwrap();
//! assert!(source.contains("public static bool HasEnemyTag(this IEntity entity)"));
//! ```

pub mod error;

// Parsing, mapping and emission
pub mod codegen;

// Change classification and validation
pub mod analysis;

// Host collaborators, oracle readiness and tracking
pub mod services;

// Debounced generation, rename and deletion handling
pub mod orchestrator;

// Re-export key types
pub use error::{AtomicError, Result};
pub use codegen::{AtomicSettings, CanonicalConfig, name_to_id};
pub use analysis::{should_regenerate, ValidationReport};
pub use orchestrator::{
    Collaborators, GenerationEvent, GenerationMode, GenerationOutcome, Orchestrator,
    RenameKind, RenameOutcome, RenameRequest, SkipReason,
};
