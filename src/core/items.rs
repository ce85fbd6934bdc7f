//! Waste analysis items: duplicated data and foldable template instances.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::core::symbol::Symbol;

/// A piece of data emitted into several compilands instead of once.
#[derive(Debug, Clone)]
pub struct DuplicateDataItem {
    pub symbol: Arc<Symbol>,
    /// Size of all copies together.
    pub total_size: u32,
    /// Size of every copy beyond the first.
    pub wasted_size: u32,
}

impl DuplicateDataItem {
    pub fn new(symbol: Arc<Symbol>, total_size: u32, wasted_size: u32) -> Self {
        Self {
            symbol,
            total_size,
            wasted_size,
        }
    }
}

/// Instances of one template that could share a single implementation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateFoldabilityItem {
    pub template_name: String,
    pub total_size: u32,
    pub wasted_size: u32,
}

impl TemplateFoldabilityItem {
    pub fn new(template_name: impl Into<String>, total_size: u32, wasted_size: u32) -> Self {
        Self {
            template_name: template_name.into(),
            total_size,
            wasted_size,
        }
    }
}
