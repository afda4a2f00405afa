//! Immutable per-model composition derived from a descriptor.

use std::time::Duration;

use super::descriptor::{
    KeyGeneration, ModelDescriptor, ModelTag, PropertyDescriptor, PropertyTag,
};
use crate::error::{Error, Result};

/// Cache policy of a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub enabled: bool,
    pub expiration: Duration,
}

impl CachePolicy {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            expiration: Duration::ZERO,
        }
    }
}

/// Everything the reconciler, translator and evaluator need to know about a
/// model, computed once.
///
/// Every property falls into exactly one of four partitions: managed
/// (persisted, caller supplied), auto (persisted, server populated),
/// unmanaged, and foreign collections. Foreign keys and unique columns are
/// subsets of the persisted columns.
#[derive(Debug, Clone)]
pub struct ModelComposition {
    model: String,
    table: String,
    schema: String,
    properties: Vec<PropertyDescriptor>,
    managed: Vec<usize>,
    auto: Vec<usize>,
    unmanaged: Vec<usize>,
    foreign_collections: Vec<usize>,
    foreign_keys: Vec<usize>,
    unique: Vec<usize>,
    primary_key: usize,
    key_generation: KeyGeneration,
    date_created: Option<usize>,
    date_modified: Option<usize>,
    cache: CachePolicy,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Partition {
    Managed,
    Auto,
    Unmanaged,
    ForeignCollection,
}

fn partition_of(property: &PropertyDescriptor) -> Partition {
    let mut partition = Partition::Managed;
    for tag in &property.tags {
        match tag {
            PropertyTag::Unmanaged => return Partition::Unmanaged,
            PropertyTag::ForeignCollection { .. } => partition = Partition::ForeignCollection,
            PropertyTag::Auto(_) | PropertyTag::DateCreated | PropertyTag::DateModified
                if partition == Partition::Managed =>
            {
                partition = Partition::Auto
            }
            _ => {}
        }
    }
    partition
}

impl ModelComposition {
    /// Build the composition of a descriptor.
    ///
    /// Fails when the model declares no table, no primary key, more than one
    /// primary key, or a primary key that is not a caller-visible column.
    pub fn build(descriptor: &ModelDescriptor, default_schema: &str) -> Result<Self> {
        let model = descriptor.name.clone();

        let mut table = None;
        let mut cache = CachePolicy::disabled();
        for tag in &descriptor.tags {
            match tag {
                ModelTag::Table { name, schema } => table = Some((name.clone(), schema.clone())),
                ModelTag::CacheEnabled { expiration_secs } => {
                    cache = CachePolicy {
                        enabled: true,
                        expiration: Duration::from_secs(*expiration_secs),
                    }
                }
            }
        }
        let (table, schema) = match table {
            Some((name, _)) if name.trim().is_empty() => {
                return Err(Error::missing_metadata(&model, "table name"))
            }
            Some((name, schema)) => (name, schema.unwrap_or_else(|| default_schema.to_string())),
            None => return Err(Error::missing_metadata(&model, "table name")),
        };

        let mut composition = Self {
            model,
            table,
            schema,
            properties: descriptor.properties.clone(),
            managed: Vec::new(),
            auto: Vec::new(),
            unmanaged: Vec::new(),
            foreign_collections: Vec::new(),
            foreign_keys: Vec::new(),
            unique: Vec::new(),
            primary_key: 0,
            key_generation: KeyGeneration::Supplied,
            date_created: None,
            date_modified: None,
            cache,
        };

        let mut primary_key = None;
        for (index, property) in descriptor.properties.iter().enumerate() {
            let partition = partition_of(property);
            match partition {
                Partition::Managed => composition.managed.push(index),
                Partition::Auto => composition.auto.push(index),
                Partition::Unmanaged => composition.unmanaged.push(index),
                Partition::ForeignCollection => composition.foreign_collections.push(index),
            }
            let persisted = matches!(partition, Partition::Managed | Partition::Auto);

            if let Some(generation) = property.key_generation() {
                if partition != Partition::Managed {
                    return Err(Error::missing_metadata(
                        &composition.model,
                        "primary key must be a managed property",
                    ));
                }
                if primary_key.replace((index, generation)).is_some() {
                    return Err(Error::missing_metadata(
                        &composition.model,
                        "single primary key",
                    ));
                }
            }
            if persisted && property.foreign_reference().is_some() {
                composition.foreign_keys.push(index);
            }
            if persisted && property.is_unique() {
                composition.unique.push(index);
            }
            if persisted && property.has_tag(|t| matches!(t, PropertyTag::DateCreated)) {
                composition.date_created = Some(index);
            }
            if persisted && property.has_tag(|t| matches!(t, PropertyTag::DateModified)) {
                composition.date_modified = Some(index);
            }
        }

        let (primary_key, key_generation) = primary_key
            .ok_or_else(|| Error::missing_metadata(&composition.model, "primary key"))?;
        composition.primary_key = primary_key;
        composition.key_generation = key_generation;

        Ok(composition)
    }

    /// Model (type) name.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Table name without prefix.
    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn cache(&self) -> CachePolicy {
        self.cache
    }

    /// All declared properties in declaration order.
    pub fn properties(&self) -> &[PropertyDescriptor] {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.name == name)
    }

    fn select<'a>(&'a self, indexes: &'a [usize]) -> impl Iterator<Item = &'a PropertyDescriptor> {
        indexes.iter().map(move |&i| &self.properties[i])
    }

    /// Caller-supplied persisted properties.
    pub fn managed(&self) -> impl Iterator<Item = &PropertyDescriptor> {
        self.select(&self.managed)
    }

    /// Server-populated persisted properties.
    pub fn auto(&self) -> impl Iterator<Item = &PropertyDescriptor> {
        self.select(&self.auto)
    }

    pub fn unmanaged(&self) -> impl Iterator<Item = &PropertyDescriptor> {
        self.select(&self.unmanaged)
    }

    pub fn foreign_collections(&self) -> impl Iterator<Item = &PropertyDescriptor> {
        self.select(&self.foreign_collections)
    }

    pub fn foreign_keys(&self) -> impl Iterator<Item = &PropertyDescriptor> {
        self.select(&self.foreign_keys)
    }

    pub fn unique(&self) -> impl Iterator<Item = &PropertyDescriptor> {
        self.select(&self.unique)
    }

    /// Every column of the backing table, in declaration order.
    pub fn persisted(&self) -> impl Iterator<Item = &PropertyDescriptor> {
        self.properties
            .iter()
            .filter(|p| matches!(partition_of(p), Partition::Managed | Partition::Auto))
    }

    pub fn primary_key(&self) -> &PropertyDescriptor {
        &self.properties[self.primary_key]
    }

    pub fn key_generation(&self) -> KeyGeneration {
        self.key_generation
    }

    pub fn date_created(&self) -> Option<&PropertyDescriptor> {
        self.date_created.map(|i| &self.properties[i])
    }

    pub fn date_modified(&self) -> Option<&PropertyDescriptor> {
        self.date_modified.map(|i| &self.properties[i])
    }

    pub fn is_primary_key(&self, name: &str) -> bool {
        self.primary_key().name == name
    }

    pub fn is_persisted(&self, name: &str) -> bool {
        self.persisted().any(|p| p.name == name)
    }

    pub fn is_auto(&self, name: &str) -> bool {
        self.auto().any(|p| p.name == name)
    }
}
