//! Common ID Types
//!
//! Type-safe ID wrappers for records owned by the access-control core.

use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;
use uuid::Uuid;

/// Generic typed ID wrapper
///
/// Usage:
/// ```
/// use kernel::id::{Id, markers};
/// type EventId = Id<markers::AuditEvent>;
/// let id = EventId::new();
/// assert_eq!(id.to_string().len(), 36);
/// ```
pub struct Id<T> {
    value: Uuid,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Id<T> {
    /// Create a new random ID (UUID v4)
    pub fn new() -> Self {
        Self::from_uuid(Uuid::new_v4())
    }

    /// Create from an existing UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self {
            value: uuid,
            _marker: PhantomData,
        }
    }

    /// Get the underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.value
    }

    /// Convert to UUID
    pub fn into_uuid(self) -> Uuid {
        self.value
    }
}

// Manual impls: derives would put bounds on the marker type.
impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Id<T> {}

impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T> Eq for Id<T> {}

impl<T> std::hash::Hash for Id<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl<T> Default for Id<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self.value)
    }
}

impl<T> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl<T> FromStr for Id<T> {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self::from_uuid)
    }
}

impl<T> From<Uuid> for Id<T> {
    fn from(uuid: Uuid) -> Self {
        Self::from_uuid(uuid)
    }
}

impl<T> From<Id<T>> for Uuid {
    fn from(id: Id<T>) -> Self {
        id.value
    }
}

/// Marker types for different entity IDs
pub mod markers {
    /// Marker for security audit event IDs
    pub struct AuditEvent;
}

/// Type aliases for common IDs
pub type AuditEventId = Id<markers::AuditEvent>;
