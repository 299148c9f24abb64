//! detectors/ast
//!
//! Structural extraction: source text -> `Vec<FunctionInfo>`.
//!
//! Two strategies share one contract. Grammar-based extraction walks a
//! tree-sitter syntax tree; lexical extraction approximates it with regular
//! expressions for families that have no in-process parser.

pub mod grammar;
pub mod lexical;
pub mod params;

use crate::detectors::infer::TypeInference;
use crate::detectors::language::{LanguageFamily, Strategy};
use crate::error::ExtractError;
use crate::model::FunctionInfo;

pub use grammar::GrammarExtractor;
pub use lexical::LexicalExtractor;

pub trait StructuralExtractor {
    /// Pure function of `source`: identical input, identical output.
    fn extract(&self, source: &str) -> Result<Vec<FunctionInfo>, ExtractError>;
}

pub fn extractor_for<'a>(
    family: LanguageFamily,
    inference: &'a TypeInference,
) -> Result<Box<dyn StructuralExtractor + 'a>, ExtractError> {
    Ok(match family.strategy() {
        Strategy::Grammar => Box::new(GrammarExtractor::new(family, inference)),
        Strategy::Lexical => Box::new(LexicalExtractor::new(inference)?),
    })
}

pub fn extract(
    source: &str,
    family: LanguageFamily,
    inference: &TypeInference,
) -> Result<Vec<FunctionInfo>, ExtractError> {
    extractor_for(family, inference)?.extract(source)
}
