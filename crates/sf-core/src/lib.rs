pub mod diagnostic;
pub mod engine;
pub mod error;
pub mod program;
pub mod types;
pub mod value;

pub use diagnostic::{Diagnostic, ErrorType};
pub use engine::{ChoiceItem, NarrativeEngine};
pub use error::StoryError;
pub use program::*;
pub use types::*;
pub use value::*;
