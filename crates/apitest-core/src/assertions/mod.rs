//! Assertion evaluation and generation.

mod evaluator;
mod generator;
mod path;

pub use evaluator::AssertionEvaluator;
pub use generator::{generate, AssertionGenerator, CapturedResponse, GeneratorConfig};
pub use path::{parse_path, render_path, resolve_path, PathError, PathSegment};
