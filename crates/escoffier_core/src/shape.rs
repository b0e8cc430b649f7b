use serde::{Serialize, de::DeserializeOwned};

/// A type the generation client can request from a model.
///
/// `shape` is a JSON sketch embedded in the prompt so the model knows what
/// to emit. `validate` checks constraints serde cannot express; a failure
/// triggers the client's reformulation loop.
pub trait StructuredOutput: Serialize + DeserializeOwned + Send + 'static {
    /// JSON sketch of the expected output.
    fn shape() -> serde_json::Value;

    /// Semantic checks beyond deserialization.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}
