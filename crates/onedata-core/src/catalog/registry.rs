//! Process-wide registry of model compositions keyed by type.

use std::any::TypeId;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use onedata_proto::{Parameter, Row};

use super::composition::ModelComposition;
use super::descriptor::ModelDescriptor;
use crate::error::{Error, Result};

/// A Rust type persisted through the data manager.
pub trait Manageable: Sized + Send + Sync + 'static {
    /// Declarative schema of the type.
    fn descriptor() -> ModelDescriptor;

    /// Flatten an instance into a row. Unset optional values become `Null`.
    fn to_row(&self) -> Row;

    /// Rebuild an instance from a row returned by the database or the cache.
    fn from_row(row: &Row) -> std::result::Result<Self, onedata_proto::Error>;

    /// Hydrate an instance from a parameter list.
    fn from_parameters(parameters: &[Parameter]) -> std::result::Result<Self, onedata_proto::Error> {
        Self::from_row(&Row::from_parameters(parameters))
    }
}

/// Registry of compositions, one per managed type.
///
/// Compositions are built on first access and shared afterwards. [`reset`]
/// drops them so tests can start from a clean registry.
///
/// Caches are keyed by model name, so a name belongs to one type only.
///
/// [`reset`]: ModelRegistry::reset
#[derive(Debug)]
pub struct ModelRegistry {
    default_schema: String,
    models: DashMap<TypeId, Arc<ModelComposition>>,
    /// Owning type of each model name.
    names: DashMap<String, TypeId>,
}

impl ModelRegistry {
    pub fn new(default_schema: impl Into<String>) -> Self {
        Self {
            default_schema: default_schema.into(),
            models: DashMap::new(),
            names: DashMap::new(),
        }
    }

    /// Get the composition of `T`, building it on first use.
    pub fn describe<T: Manageable>(&self) -> Result<Arc<ModelComposition>> {
        let key = TypeId::of::<T>();
        if let Some(existing) = self.models.get(&key) {
            return Ok(existing.clone());
        }

        let composition = Arc::new(ModelComposition::build(&T::descriptor(), &self.default_schema)?);
        match self.names.entry(composition.model().to_string()) {
            Entry::Occupied(owner) if *owner.get() != key => {
                return Err(Error::Configuration(format!(
                    "model name {} is already used by another type",
                    composition.model()
                )));
            }
            Entry::Occupied(_) => {}
            Entry::Vacant(slot) => {
                slot.insert(key);
            }
        }
        tracing::debug!(model = %composition.model(), table = %composition.table(), "described model");

        // Another thread may have won the race; keep whichever landed first.
        let entry = self.models.entry(key).or_insert(composition);
        Ok(entry.value().clone())
    }

    /// Number of described types.
    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Forget every composition.
    pub fn reset(&self) {
        self.models.clear();
        self.names.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::descriptor::{KeyGeneration, PrimitiveKind, PropertyDescriptor};

    struct Tag {
        id: i32,
        label: String,
    }

    impl Manageable for Tag {
        fn descriptor() -> ModelDescriptor {
            ModelDescriptor::new("Tag")
                .with_table("Tag")
                .with_property(
                    PropertyDescriptor::new("Id", PrimitiveKind::Int32)
                        .primary_key(KeyGeneration::Supplied),
                )
                .with_property(PropertyDescriptor::new("Label", PrimitiveKind::String))
        }

        fn to_row(&self) -> Row {
            Row::new().with("Id", self.id).with("Label", self.label.clone())
        }

        fn from_row(row: &Row) -> std::result::Result<Self, onedata_proto::Error> {
            Ok(Self {
                id: row.value("Id")?,
                label: row.value("Label")?,
            })
        }
    }

    struct Untabled;

    impl Manageable for Untabled {
        fn descriptor() -> ModelDescriptor {
            ModelDescriptor::new("Untabled")
        }

        fn to_row(&self) -> Row {
            Row::new()
        }

        fn from_row(_: &Row) -> std::result::Result<Self, onedata_proto::Error> {
            Ok(Untabled)
        }
    }

    #[test]
    fn test_describe_is_cached_per_type() {
        let registry = ModelRegistry::new("dbo");
        let first = registry.describe::<Tag>().unwrap();
        let second = registry.describe::<Tag>().unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);

        registry.reset();
        assert!(registry.is_empty());
    }

    /// A second type reusing the `Tag` model name with another key.
    struct LegacyTag;

    impl Manageable for LegacyTag {
        fn descriptor() -> ModelDescriptor {
            ModelDescriptor::new("Tag")
                .with_table("LegacyTag")
                .with_property(
                    PropertyDescriptor::new("Code", PrimitiveKind::String)
                        .primary_key(KeyGeneration::Supplied),
                )
        }

        fn to_row(&self) -> Row {
            Row::new()
        }

        fn from_row(_: &Row) -> std::result::Result<Self, onedata_proto::Error> {
            Ok(LegacyTag)
        }
    }

    #[test]
    fn test_model_name_belongs_to_one_type() {
        let registry = ModelRegistry::new("dbo");
        registry.describe::<Tag>().unwrap();
        assert!(matches!(
            registry.describe::<LegacyTag>(),
            Err(Error::Configuration(_))
        ));
        assert_eq!(registry.len(), 1);
        assert!(registry.describe::<Tag>().is_ok());

        registry.reset();
        assert!(registry.describe::<LegacyTag>().is_ok());
    }

    #[test]
    fn test_describe_missing_table() {
        let registry = ModelRegistry::new("dbo");
        assert!(matches!(
            registry.describe::<Untabled>(),
            Err(Error::MissingRequiredMetadata { .. })
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_from_parameters_hydrates() {
        let tag = Tag::from_parameters(&[Parameter::new("Id", 3), Parameter::new("Label", "rust")])
            .unwrap();
        assert_eq!(tag.id, 3);
        assert_eq!(tag.label, "rust");
        assert_eq!(tag.to_row().len(), 2);
    }
}
