pub mod collection;
pub mod manifest;

/// One stored object. The store only requires it to be a JSON object;
/// collaborators define the rest of the shape.
pub type Record = serde_json::Map<String, serde_json::Value>;
