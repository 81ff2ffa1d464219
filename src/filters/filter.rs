use image::DynamicImage;
use sha1::{Digest, Sha1};
use std::fmt;

use super::operation::Operation;
use super::registry::OperationRegistry;
use super::spec::join_stages;
use crate::error::RenditionError;
use crate::rendition::SourceImage;
use crate::transform::TransformEnv;

/// Hex characters kept from each SHA-1 digest
pub const KEY_HASH_LEN: usize = 8;

/// First `KEY_HASH_LEN` hex characters of the SHA-1 of `value`
pub fn short_sha1(value: &str) -> String {
    let digest = Sha1::digest(value.as_bytes());
    let mut hex = hex::encode(digest);
    hex.truncate(KEY_HASH_LEN);
    hex
}

/// A parsed filter spec, ready to run
///
/// Immutable after construction. The stored spec is the canonical one, so
/// `Filter::new("width-0200")` and `Filter::new("width-200")` compare equal
/// and share cache keys.
#[derive(Debug, Clone)]
pub struct Filter {
    spec: String,
    operations: Vec<Operation>,
}

impl Filter {
    pub fn new(spec: &str, registry: &OperationRegistry) -> Result<Self, RenditionError> {
        let operations = registry.parse(spec)?;
        let spec = join_stages(operations.iter().map(Operation::canonical));
        Ok(Self { spec, operations })
    }

    /// The canonical spec string
    pub fn spec(&self) -> &str {
        &self.spec
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Values of every vary field declared by the operations, in operation
    /// order then declaration order, skipping fields unset on `source`
    pub fn vary_values(&self, source: &SourceImage) -> Vec<String> {
        self.operations
            .iter()
            .flat_map(|op| op.vary_fields().iter())
            .filter_map(|field| source.vary_value(*field))
            .collect()
    }

    /// Hash of the vary values, or an empty string when there are none
    pub fn vary_key(&self, source: &SourceImage) -> String {
        let values = self.vary_values(source);
        if values.is_empty() {
            return String::new();
        }
        short_sha1(&values.join("-"))
    }

    /// Hash of the canonical spec followed by the vary key
    pub fn cache_key(&self, source: &SourceImage) -> String {
        let mut key = short_sha1(&self.spec);
        key.push_str(&self.vary_key(source));
        key
    }

    /// Apply every operation in order
    pub fn run(
        &self,
        image: DynamicImage,
        source: &SourceImage,
        env: &mut TransformEnv,
    ) -> Result<DynamicImage, RenditionError> {
        self.operations
            .iter()
            .try_fold(image, |image, op| op.run(image, source, env))
    }
}

impl PartialEq for Filter {
    fn eq(&self, other: &Self) -> bool {
        self.spec == other.spec
    }
}

impl Eq for Filter {}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.spec)
    }
}
