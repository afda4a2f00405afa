//! Model metadata registry.
//!
//! Types describe their schema once with a [`ModelDescriptor`]; the registry
//! turns that into an immutable [`ModelComposition`] shared by the translator,
//! the reconciler and the evaluator.

mod composition;
mod descriptor;
mod registry;

pub use composition::{CachePolicy, ModelComposition};
pub use descriptor::{
    AutoKind, ForeignAction, ForeignReference, KeyGeneration, ModelDescriptor, ModelTag,
    PrimitiveKind, PropertyDescriptor, PropertyTag,
};
pub use registry::{Manageable, ModelRegistry};
