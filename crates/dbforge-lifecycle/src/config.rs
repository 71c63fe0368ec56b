use dbforge_core::{DatabaseHandle, Result, SchemaSource};
use dbforge_engine::{Engine, EngineOptions, build_engine};

/// Everything the lifecycle manager needs, passed explicitly.
pub struct LifecycleConfig {
    /// Engine capability bound to one database handle.
    pub engine: Box<dyn Engine>,
    /// Logical model applied by `ensure_created`.
    pub schema_source: Box<dyn SchemaSource>,
}

impl LifecycleConfig {
    pub fn new(engine: Box<dyn Engine>, schema_source: Box<dyn SchemaSource>) -> Self {
        Self {
            engine,
            schema_source,
        }
    }

    /// Build the engine for `handle` with the given options.
    pub fn for_handle(
        handle: DatabaseHandle,
        schema_source: Box<dyn SchemaSource>,
        opts: &EngineOptions,
    ) -> Result<Self> {
        Ok(Self::new(build_engine(handle, opts)?, schema_source))
    }
}
