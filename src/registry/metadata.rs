use std::rc::Rc;

use crate::core::Handler;

/// Creates handler instances. Factories may capture shared assembly-time
/// values such as lookup tables.
pub type HandlerFactory = Rc<dyn Fn() -> Box<dyn Handler>>;

/// Complete metadata for a registered handler type
#[derive(Clone)]
pub struct HandlerMetadata {
    pub id: String,
    pub category: String,
    /// Declared input port names. Empty means any name is accepted.
    pub inputs: Vec<String>,
    /// Declared output port names. Empty means any name is accepted.
    pub outputs: Vec<String>,
    pub factory: HandlerFactory,
}

impl HandlerMetadata {
    pub fn new(
        id: impl Into<String>,
        category: impl Into<String>,
        factory: impl Fn() -> Box<dyn Handler> + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            category: category.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            factory: Rc::new(factory),
        }
    }

    pub fn with_factory(mut self, factory: impl Fn() -> Box<dyn Handler> + 'static) -> Self {
        self.factory = Rc::new(factory);
        self
    }

    pub fn add_input(mut self, name: impl Into<String>) -> Self {
        self.inputs.push(name.into());
        self
    }

    pub fn add_output(mut self, name: impl Into<String>) -> Self {
        self.outputs.push(name.into());
        self
    }

    pub fn declares_input(&self, name: &str) -> bool {
        self.inputs.is_empty() || self.inputs.iter().any(|p| p == name)
    }

    pub fn declares_output(&self, name: &str) -> bool {
        self.outputs.is_empty() || self.outputs.iter().any(|p| p == name)
    }

    /// Create a new instance of this handler type
    pub fn create_instance(&self) -> Box<dyn Handler> {
        (self.factory)()
    }
}

impl std::fmt::Debug for HandlerMetadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerMetadata")
            .field("id", &self.id)
            .field("category", &self.category)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .finish()
    }
}

// Factory type for creating handler metadata at runtime
pub type HandlerMetadataFactory = fn() -> HandlerMetadata;

// Wrapper for inventory collection
pub struct HandlerMetadataFactoryWrapper(pub HandlerMetadataFactory);

inventory::collect!(HandlerMetadataFactoryWrapper);
