//! Generation request types.

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Everything a run needs to produce one recipe.
///
/// Immutable once the run starts: the coordinator hands the same value to
/// every step executor.
///
/// # Examples
///
/// ```
/// use escoffier_core::GenerationRequest;
///
/// let request = GenerationRequest::builder()
///     .run_id("recipe-gen-0123456789ab")
///     .user_id("user_1")
///     .prompt("quick breakfast with eggs")
///     .ingredients(Some(vec!["eggs".to_string()]))
///     .build()
///     .expect("valid request");
///
/// assert_eq!(request.run_id, "recipe-gen-0123456789ab");
/// assert!(request.dietary_restrictions.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Builder)]
#[builder(setter(into))]
pub struct GenerationRequest {
    /// Run identifier, also the idempotency key for the recipe entity
    pub run_id: String,
    /// Requesting user
    pub user_id: String,
    /// Free-text description of the dish
    pub prompt: String,
    /// Ingredients the recipe must use
    #[builder(default)]
    #[serde(default)]
    pub ingredients: Option<Vec<String>>,
    /// Dietary restrictions to follow
    #[builder(default)]
    #[serde(default)]
    pub dietary_restrictions: Option<Vec<String>>,
}

impl GenerationRequest {
    /// Create a builder for a request.
    pub fn builder() -> GenerationRequestBuilder {
        GenerationRequestBuilder::default()
    }
}
