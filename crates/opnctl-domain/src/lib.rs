//! Resource type schemas, instance validation, and the built-in OPNsense
//! catalog. This crate owns the data model every other crate treats as
//! ground truth: it has no dependency on graph, store, planner or engine.

pub mod catalog;
pub mod error;
pub mod ids;
pub mod instance;
pub mod registry;
pub mod schema;
pub mod template;

pub use error::{DomainError, ValidationOutcome, ValidationWarning};
pub use ids::{DeploymentName, ResourceId, TypeName};
pub use instance::{PropertyMap, ResourceInstance, ResourceState};
pub use registry::{PropertyDiff, Registry};
pub use schema::{CrossFieldRule, FieldSpec, FieldType, TypeDefinition};
