//! Runtime object model
//!
//! Types that can be proxied are described at runtime by [`ClassDescriptor`]s
//! built with [`ClassBuilder`]; objects are [`Instance`]s holding a class
//! reference and field slots.

mod class;
mod instance;

pub use class::{ClassBuilder, ClassDescriptor, Constructor, FieldDef, MethodBody, MethodDef, TypeShape};
pub use instance::Instance;
