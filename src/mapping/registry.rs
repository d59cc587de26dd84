//! Descriptor cache and URI generator registry

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::info;

use super::definition::{SparqlResource, TargetRef};
use super::descriptor::{DescriptorError, DescriptorResult, ResourceDescriptor};
use super::uri::{FieldUriGenerator, UriGenerator, UuidUriGenerator};

/// Builds each mapped type's descriptor once and hands out shared copies
pub struct DescriptorRegistry {
    descriptors: RwLock<HashMap<TypeId, Arc<ResourceDescriptor>>>,
    generators: RwLock<HashMap<String, Arc<dyn UriGenerator>>>,
}

impl DescriptorRegistry {
    /// Registry with the `uuid`, `name` and `label` generators
    pub fn new() -> Self {
        let mut generators: HashMap<String, Arc<dyn UriGenerator>> = HashMap::new();
        generators.insert("uuid".to_string(), Arc::new(UuidUriGenerator));
        generators.insert("name".to_string(), Arc::new(FieldUriGenerator::new("name")));
        generators.insert("label".to_string(), Arc::new(FieldUriGenerator::new("label")));
        Self {
            descriptors: RwLock::new(HashMap::new()),
            generators: RwLock::new(generators),
        }
    }

    /// Register or replace a named generator
    ///
    /// Descriptors already built keep the generator they resolved.
    pub fn register_generator(
        &self,
        name: impl Into<String>,
        generator: Arc<dyn UriGenerator>,
    ) -> DescriptorResult<()> {
        let name = name.into();
        info!("Registered URI generator '{}'", name);
        self.generators
            .write()
            .map_err(|_| DescriptorError::Poisoned)?
            .insert(name, generator);
        Ok(())
    }

    pub fn generator(&self, name: &str) -> Option<Arc<dyn UriGenerator>> {
        self.generators.read().ok()?.get(name).cloned()
    }

    /// Descriptor of a mapped type
    pub fn get<T: SparqlResource>(&self) -> DescriptorResult<Arc<ResourceDescriptor>> {
        self.get_target(&TargetRef::of::<T>())
    }

    /// Descriptor of an object property target
    pub fn get_target(&self, target: &TargetRef) -> DescriptorResult<Arc<ResourceDescriptor>> {
        if let Some(descriptor) = self
            .descriptors
            .read()
            .map_err(|_| DescriptorError::Poisoned)?
            .get(&target.type_id())
        {
            return Ok(Arc::clone(descriptor));
        }

        let descriptor = {
            let generators = self.generators.read().map_err(|_| DescriptorError::Poisoned)?;
            ResourceDescriptor::build(target.type_id(), target.definition(), |name| {
                generators.get(name).cloned()
            })?
        };

        let mut descriptors = self.descriptors.write().map_err(|_| DescriptorError::Poisoned)?;
        let entry = descriptors
            .entry(target.type_id())
            .or_insert_with(|| {
                info!(
                    "Loaded descriptor {} -> {}",
                    descriptor.type_name(),
                    descriptor.rdf_type()
                );
                Arc::new(descriptor)
            });
        Ok(Arc::clone(entry))
    }

    /// Build and cache a descriptor ahead of first use
    pub fn preload<T: SparqlResource>(&self) -> DescriptorResult<()> {
        self.get::<T>().map(|_| ())
    }

    /// Number of cached descriptors
    pub fn len(&self) -> usize {
        self.descriptors.read().map(|d| d.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for DescriptorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
