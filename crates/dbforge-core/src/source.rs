use std::path::{Path, PathBuf};

use crate::definition::SchemaDefinition;
use crate::error::Result;
use crate::validation::validate_definition;

/// Supplies the logical model that `ensure_created` materializes.
pub trait SchemaSource: Send + Sync {
    /// Return a validated schema definition.
    fn definition(&self) -> Result<SchemaDefinition>;
}

impl SchemaSource for SchemaDefinition {
    fn definition(&self) -> Result<SchemaDefinition> {
        validate_definition(self)?;
        Ok(self.clone())
    }
}

/// Schema definition read from a TOML or JSON file on every request.
#[derive(Debug, Clone)]
pub struct SchemaFile {
    path: PathBuf,
}

impl SchemaFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SchemaSource for SchemaFile {
    fn definition(&self) -> Result<SchemaDefinition> {
        let definition = SchemaDefinition::load(&self.path)?;
        validate_definition(&definition)?;
        Ok(definition)
    }
}
