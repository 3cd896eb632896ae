// ABOUTME: Type-safe identifiers and validated domain types.
// ABOUTME: Uses phantom types to prevent id confusion at compile time.

mod id;
mod image;
mod slug;

pub use id::{DeploymentId, EnvironmentId, Id, StepId, UserId};
pub use image::{BuiltImage, ParseBuiltImageError};
pub use slug::{Slug, SlugError};
