mod evaluator;
mod prompts;
mod verdict;

pub use evaluator::{CritiqueAgent, CritiqueError};
pub use prompts::CritiquePrompts;
pub use verdict::{CritiqueVerdict, DefectCategory, Finding, VerdictParseError};
