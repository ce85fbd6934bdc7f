//! Static libraries and the compilands (object files) linked from them.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::core::contribution::Contribution;

/// One object file contributing to the image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Compiland {
    /// Full path of the object file as recorded by the linker.
    pub name: String,
    pub size: u32,
    pub virtual_size: u32,
    /// One entry per section this object file has bytes in.
    pub section_contributions: Vec<Arc<Contribution>>,
    /// One entry per COFF group this object file has bytes in.
    pub coff_group_contributions: Vec<Arc<Contribution>>,
}

impl Compiland {
    pub fn new(name: impl Into<String>, size: u32, virtual_size: u32) -> Self {
        Self {
            name: name.into(),
            size,
            virtual_size,
            section_contributions: Vec::new(),
            coff_group_contributions: Vec::new(),
        }
    }

    pub fn with_section_contribution(mut self, contribution: Contribution) -> Self {
        self.section_contributions.push(Arc::new(contribution));
        self
    }

    pub fn with_coff_group_contribution(mut self, contribution: Contribution) -> Self {
        self.coff_group_contributions.push(Arc::new(contribution));
        self
    }

    /// Filename portion of the path.
    pub fn short_name(&self) -> &str {
        short_name(&self.name)
    }
}

/// A library and the compilands it contributed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Library {
    /// Full path of the library, or of the object file for loose objects.
    pub name: String,
    pub size: u32,
    pub virtual_size: u32,
    pub compilands: Vec<Arc<Compiland>>,
    pub section_contributions: Vec<Arc<Contribution>>,
    pub coff_group_contributions: Vec<Arc<Contribution>>,
}

impl Library {
    pub fn new(name: impl Into<String>, size: u32, virtual_size: u32) -> Self {
        Self {
            name: name.into(),
            size,
            virtual_size,
            compilands: Vec::new(),
            section_contributions: Vec::new(),
            coff_group_contributions: Vec::new(),
        }
    }

    pub fn with_compiland(mut self, compiland: Compiland) -> Self {
        self.compilands.push(Arc::new(compiland));
        self
    }

    pub fn with_section_contribution(mut self, contribution: Contribution) -> Self {
        self.section_contributions.push(Arc::new(contribution));
        self
    }

    pub fn with_coff_group_contribution(mut self, contribution: Contribution) -> Self {
        self.coff_group_contributions.push(Arc::new(contribution));
        self
    }

    pub fn short_name(&self) -> &str {
        short_name(&self.name)
    }
}

fn short_name(path: &str) -> &str {
    path.rsplit(['\\', '/']).next().unwrap_or(path)
}
