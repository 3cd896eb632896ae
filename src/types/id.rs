// ABOUTME: Phantom-typed identifiers for compile-time type safety.
// ABOUTME: Prevents accidental swapping of deployment, environment, step, and user ids.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Marker types for phantom type parameters.
/// Using empty enums prevents instantiation and requires no trait bounds.
pub enum DeploymentMarker {}
pub enum EnvironmentMarker {}
pub enum StepMarker {}
pub enum UserMarker {}

/// A type-safe identifier that prevents accidental mixing of different id types.
///
/// The ledger passes several surrogate ids around together (a step message
/// carries its deployment id, an environment points at its active deployment);
/// phantom typing makes swapping two of them a compile error.
#[must_use = "ids reference records and should not be ignored"]
pub struct Id<T> {
    value: String,
    _marker: PhantomData<T>,
}

impl<T> Id<T> {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            _marker: PhantomData,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }
}

// Manual trait implementations that don't require T to implement the trait.
// This is necessary because T is only used as a phantom type marker.

impl<T> std::fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Id").field("value", &self.value).finish()
    }
}

impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T> Eq for Id<T> {}

impl<T> Hash for Id<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl<T> std::fmt::Display for Id<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl<T> Serialize for Id<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.value)
    }
}

impl<'de, T> Deserialize<'de> for Id<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Id::new(String::deserialize(deserializer)?))
    }
}

/// Identifies a deployment record.
pub type DeploymentId = Id<DeploymentMarker>;

/// Identifies an environment within a project.
pub type EnvironmentId = Id<EnvironmentMarker>;

/// Identifies one step row in a deployment's ledger.
pub type StepId = Id<StepMarker>;

/// Identifies the user who initiated a deployment.
pub type UserId = Id<UserMarker>;
