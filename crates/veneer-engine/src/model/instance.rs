//! Object instances

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use veneer_sdk::{InvokeError, Value};

use super::class::ClassDescriptor;

/// Global counter for generating unique object IDs
static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Generate a new unique object ID
fn generate_object_id() -> u64 {
    NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Object instance: a class reference plus field slots
pub struct Instance {
    /// Unique object ID (assigned on creation)
    object_id: u64,
    /// Runtime type
    class: Arc<ClassDescriptor>,
    /// Field values, laid out as `class.field_layout()`
    fields: RwLock<Vec<Value>>,
}

impl Instance {
    /// Create an instance whose fields all hold their category's zero value.
    ///
    /// No constructor runs; this is the layout step shared by normal
    /// construction and raw proxy allocation.
    pub fn zeroed(class: Arc<ClassDescriptor>) -> Self {
        let fields = class
            .field_layout()
            .iter()
            .map(|f| Value::zero(f.category))
            .collect();
        Self {
            object_id: generate_object_id(),
            class,
            fields: RwLock::new(fields),
        }
    }

    /// Unique object ID
    pub fn object_id(&self) -> u64 {
        self.object_id
    }

    /// Runtime type of this instance
    pub fn class(&self) -> &Arc<ClassDescriptor> {
        &self.class
    }

    /// Whether this instance is of `class` or one of its subtypes
    pub fn is_instance_of(&self, class: &ClassDescriptor) -> bool {
        self.class.is_subtype_of(class)
    }

    /// Get a field value by name
    pub fn get_field(&self, name: &str) -> Option<Value> {
        let index = self.class.field_index(name)?;
        self.get_field_at(index)
    }

    /// Set a field value by name
    pub fn set_field(&self, name: &str, value: Value) -> Result<(), InvokeError> {
        let index = self.class.field_index(name).ok_or_else(|| {
            InvokeError::raised(format!("{} has no field '{}'", self.class.name(), name))
        })?;
        self.set_field_at(index, value)
    }

    /// Get a field value by index
    pub fn get_field_at(&self, index: usize) -> Option<Value> {
        self.fields.read().get(index).cloned()
    }

    /// Set a field value by index
    pub fn set_field_at(&self, index: usize, value: Value) -> Result<(), InvokeError> {
        let mut fields = self.fields.write();
        let count = fields.len();
        match fields.get_mut(index) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(InvokeError::raised(format!(
                "Field index {} out of bounds (object has {} fields)",
                index, count
            ))),
        }
    }

    /// Get number of fields
    pub fn field_count(&self) -> usize {
        self.fields.read().len()
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("object_id", &self.object_id)
            .field("class", &self.class.name())
            .field("fields", &*self.fields.read())
            .finish()
    }
}
