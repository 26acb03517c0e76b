pub mod metadata;

pub use metadata::{
    HandlerFactory, HandlerMetadata, HandlerMetadataFactory, HandlerMetadataFactoryWrapper,
};

use indexmap::IndexMap;
use std::rc::Rc;

use crate::file::{MediaTypes, Reader, Walker};
use crate::nodes::{Copier, Generator, Tracer};

/// Handlers resolvable by id, both in the graph process and inside workers.
#[derive(Debug, Clone, Default)]
pub struct HandlerRegistry {
    handlers: IndexMap<String, HandlerMetadata>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in handlers plus every `#[derive(FlowHandler)]` submission
    /// linked into the binary, sharing one standard media table.
    pub fn builtin() -> Self {
        Self::with_media(Rc::new(MediaTypes::standard()))
    }

    /// Like `builtin`, with every `walker` instance using `media`.
    pub fn with_media(media: Rc<MediaTypes>) -> Self {
        let mut registry = Self::new();
        let builtins: [HandlerMetadataFactory; 5] = [
            Generator::handler_metadata,
            Copier::handler_metadata,
            Tracer::handler_metadata,
            Walker::handler_metadata,
            Reader::handler_metadata,
        ];
        for factory in builtins {
            registry.register(factory());
        }
        registry.register(
            Walker::handler_metadata()
                .with_factory(move || Box::new(Walker::new(media.clone()))),
        );
        for wrapper in inventory::iter::<HandlerMetadataFactoryWrapper> {
            let metadata = (wrapper.0)();
            if !registry.contains(&metadata.id) {
                registry.register(metadata);
            }
        }
        registry
    }

    /// Adds or replaces the entry for `metadata.id`.
    pub fn register(&mut self, metadata: HandlerMetadata) {
        self.handlers.insert(metadata.id.clone(), metadata);
    }

    pub fn get(&self, id: &str) -> Option<&HandlerMetadata> {
        self.handlers.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.handlers.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    pub fn by_category<'a>(&'a self, category: &'a str) -> impl Iterator<Item = &'a HandlerMetadata> {
        self.handlers.values().filter(move |m| m.category == category)
    }
}
