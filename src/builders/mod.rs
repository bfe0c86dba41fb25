// This file is the module declaration file for the `builders` module.
// It declares and makes public all the sub-modules within the `src/builders`
// directory. These modules encapsulate the individual validation steps that
// the engine in `core` composes.

// The `pub mod copyright;` declaration exposes the `copyright` module.
//
// `copyright` module:
// Checks every line of a file against the configured copyright patterns.
// Lines are only tested when they contain one of the trigger substrings, run
// on a fixed worker pool behind an admission gate, and each line is watched
// by a timer that gives up on it after the configured timeout.
pub mod copyright;

// `filter` module:
// Decides which files take part in a validation run. Directory globs, file
// include/exclude globs and content rules (skip a file when it contains one
// of several substrings) are applied in that order to any `EntrySource`.
pub mod filter;

// `masking` module:
// Builds the case-alternating regular expressions used by the rename rules
// and hides configured exception words inside a token before it is tested,
// so an allowed word never triggers a rule.
pub mod masking;

// `names` module:
// Validates a hierarchy of names (typically archive entries) against an
// allowed-name pattern, segment by segment, reporting the full path of each
// offending segment.
pub mod names;

// The `pub mod patterns;` declaration exposes the `patterns` module.
//
// `patterns` module:
// This is a fundamental module that defines the core data structures for
// rename rules (`FileValidationRule`) and their findings (`ValidationProblem`).
// It expands each authored mapping into its case variants and provides the
// `RuleSet` that tests a single token and suggests its replacement.
pub mod patterns;

// The `pub mod reporter;` declaration exposes the `reporter` module.
//
// `reporter` module:
// This module is responsible for turning a validation result into reports.
// It defines a `ReportGenerator` trait with a plain-text and a JSON
// implementation, and writes either the errors or the success report.
pub mod reporter;

// `tokenizer` module:
// Splits a file into the fragments the rename rules are tested against.
// Java sources are parsed with tree-sitter (identifiers and comments), XML
// is read as a stream of names, values and text, JSON yields its field names
// and scalars, and everything else is read line by line.
pub mod tokenizer;

// The `pub mod validator;` declaration exposes the `validator` module.
//
// `validator` module:
// This module is dedicated to ensuring the integrity and correctness of
// the configuration. It defines the `ConfigValidator` trait and a
// `StandardValidator` implementation to check for common issues like
// mismatched tokenizations, exceptions hiding the restricted token and
// copyright patterns that match everything.
pub mod validator;
