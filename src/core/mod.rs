// This file is the module declaration file for the `core` module.
// In Rust, a `mod.rs` file within a directory (e.g., `src/core/`)
// serves two main purposes:
//
// 1. It declares the submodules contained within that directory.
// 2. It exposes these submodules to the parent module (`src/` in this case),
//    making them accessible to the entire crate.

// The `pub mod config;` declaration tells the Rust compiler to look for
// a file named `config.rs` (or `config/mod.rs`) within the same directory.
// The `pub` keyword makes the `config` module and all its public items
// (structs, functions, traits) available to the parent crate.
//
// `config` module:
// This module is responsible for the validation configuration. It defines
// the data structures of the three configuration documents (rename mappings,
// file filters and forbidden patterns), reads them as JSON, YAML or TOML,
// merges the per-project filter override and provides a `ConfigProvider`
// trait with the file-backed `ConfigManager` and the in-memory `StaticConfig`.
pub mod config;

// `engine` module:
// The orchestrator. `SourceValidator` walks a source tree, applies the file
// filter, checks file names against the rename rules and runs every accepted
// file through the content checks (tokenized rename check, the light
// whole-text check and the bounded copyright check), aggregating everything
// into a `ProjectValidationResult`.
pub mod engine;

// `entries` module:
// Abstracts "a set of files" so the same filter runs over a directory on disk,
// an explicit list of paths or the entries of a zip archive. It also sniffs
// the zip signature so archives can be recognised regardless of extension.
pub mod entries;
