//! Get-or-create for renditions

use std::sync::Arc;

use super::naming::{output_filename, rendition_path};
use super::{Rendition, RenditionKey, SourceImage};
use crate::config::ImageConfig;
use crate::error::RenditionError;
use crate::filters::spec::STAGE_SEPARATOR;
use crate::filters::{short_sha1, Filter, OperationRegistry};
use crate::storage::Storage;
use crate::store::RenditionStore;
use crate::transform::Executor;

/// Produces renditions on demand and remembers them
///
/// Cheap to share behind an `Arc`; every method takes `&self`.
pub struct RenditionService {
    registry: Arc<OperationRegistry>,
    storage: Arc<dyn Storage>,
    store: Arc<dyn RenditionStore>,
    executor: Executor,
    renditions_dir: String,
    max_filename_length: usize,
}

impl RenditionService {
    pub fn new(
        registry: Arc<OperationRegistry>,
        storage: Arc<dyn Storage>,
        store: Arc<dyn RenditionStore>,
        config: &ImageConfig,
    ) -> Self {
        Self {
            registry,
            storage,
            store,
            executor: Executor::new(config),
            renditions_dir: config.renditions_dir.clone(),
            max_filename_length: config.max_filename_length,
        }
    }

    pub fn registry(&self) -> &OperationRegistry {
        &self.registry
    }

    pub fn storage(&self) -> &dyn Storage {
        self.storage.as_ref()
    }

    pub fn store(&self) -> &dyn RenditionStore {
        self.store.as_ref()
    }

    /// Parse `spec` with this service's registry
    pub fn filter(&self, spec: &str) -> Result<Filter, RenditionError> {
        Filter::new(spec, &self.registry)
    }

    pub fn get_rendition(
        &self,
        source: &SourceImage,
        spec: &str,
    ) -> Result<Rendition, RenditionError> {
        let filter = self.filter(spec)?;
        self.get_rendition_for_filter(source, &filter)
    }

    /// Return the stored rendition for `filter`, generating it on a miss
    ///
    /// An unreadable source yields an unsaved placeholder rendition. Every
    /// other failure is returned to the caller.
    pub fn get_rendition_for_filter(
        &self,
        source: &SourceImage,
        filter: &Filter,
    ) -> Result<Rendition, RenditionError> {
        let key = RenditionKey::new(source.id, filter.spec(), filter.vary_key(source));
        self.get_or_generate(key, filter, source, &filter.cache_key(source))
    }

    /// Apply `spec` on top of an existing rendition
    ///
    /// The result belongs to the parent's image and is keyed by the combined
    /// spec `<parent spec>|<spec>` and the parent's vary key. It is generated
    /// from the parent's file, not from the original.
    pub fn get_derived_rendition(
        &self,
        parent: &Rendition,
        spec: &str,
    ) -> Result<Rendition, RenditionError> {
        let combined_spec = format!("{}{}{}", parent.filter_spec, STAGE_SEPARATOR, spec);
        let combined = self.filter(&combined_spec)?;
        let child = self.filter(spec)?;
        let key = RenditionKey::new(parent.image_id, combined.spec(), parent.vary_key.clone());

        if parent.is_placeholder() {
            tracing::warn!(
                image_id = parent.image_id,
                spec = %combined.spec(),
                "Parent rendition is a placeholder, returning placeholder rendition"
            );
            return Ok(Rendition::placeholder(key));
        }

        let input = SourceImage::new(
            parent.image_id,
            parent.file.clone(),
            parent.width,
            parent.height,
        );
        let cache_key = format!("{}{}", short_sha1(combined.spec()), parent.vary_key);
        self.get_or_generate(key, &child, &input, &cache_key)
    }

    /// Look `key` up, or run `filter` over `input` and store the result
    fn get_or_generate(
        &self,
        key: RenditionKey,
        filter: &Filter,
        input: &SourceImage,
        cache_key: &str,
    ) -> Result<Rendition, RenditionError> {
        if let Some(rendition) = self.store.get(&key)? {
            tracing::debug!(rendition = %key, file = %rendition.file, "Rendition cache hit");
            return Ok(rendition);
        }

        tracing::debug!(rendition = %key, source = %input.file, "Rendition cache miss");

        let generated = match self.executor.run(filter, input, self.storage.as_ref()) {
            Ok(generated) => generated,
            Err(e) if e.is_recoverable() => {
                tracing::warn!(
                    image_id = key.image_id,
                    source = %input.file,
                    spec = %key.filter_spec,
                    error = %e,
                    "Source image unavailable, returning placeholder rendition"
                );
                return Ok(Rendition::placeholder(key));
            }
            Err(e) => return Err(e),
        };

        let filename = output_filename(
            &input.file,
            cache_key,
            generated.format.extension(),
            self.max_filename_length,
        )?;
        let name = self.storage.save(
            &rendition_path(&self.renditions_dir, key.image_id, &filename),
            &generated.data,
        )?;

        let candidate = Rendition::new(key, name, generated.width, generated.height);
        let (rendition, created) = match self.store.get_or_create(candidate.clone()) {
            Ok(result) => result,
            Err(e) => {
                self.discard_unreferenced(&candidate);
                return Err(e.into());
            }
        };

        if created {
            tracing::info!(
                image_id = rendition.image_id,
                spec = %rendition.filter_spec,
                file = %rendition.file,
                width = rendition.width,
                height = rendition.height,
                bytes = generated.data.len(),
                "Rendition created"
            );
        } else if rendition.file != candidate.file {
            // Another caller stored the row under a different name first
            self.storage.delete(&candidate.file)?;
        }

        Ok(rendition)
    }

    /// Delete a saved file whose row never made it into the store
    ///
    /// A racing caller may have stored a row for the same file meanwhile,
    /// in which case the file stays.
    fn discard_unreferenced(&self, candidate: &Rendition) {
        let referenced = matches!(
            self.store.get(&candidate.key()),
            Ok(Some(stored)) if stored.file == candidate.file
        );
        if referenced {
            return;
        }
        if let Err(e) = self.storage.delete(&candidate.file) {
            tracing::warn!(
                file = %candidate.file,
                error = %e,
                "Failed to remove rendition file after store error"
            );
        }
    }

    /// Every stored rendition of `source`
    pub fn renditions_for(&self, source: &SourceImage) -> Result<Vec<Rendition>, RenditionError> {
        Ok(self.store.list_for_image(source.id)?)
    }

    /// Remove every rendition of `source`, rows and files
    ///
    /// Returns how many renditions were removed.
    pub fn delete_renditions(&self, source: &SourceImage) -> Result<usize, RenditionError> {
        let removed = self.store.delete_for_image(source.id)?;
        for rendition in &removed {
            self.storage.delete(&rendition.file)?;
        }

        tracing::info!(
            image_id = source.id,
            count = removed.len(),
            "Deleted renditions"
        );

        Ok(removed.len())
    }
}
