//! Template module.
//!
//! Provides `{{dotted.path}}` placeholder substitution against an execution context.

mod resolver;

pub use resolver::TemplateResolver;
