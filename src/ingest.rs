//! Normalization and the idempotent write keyed on `(link, query)`.

use std::sync::Arc;
use tracing::debug;

use crate::extract::{RawExtraction, collapse_whitespace};
use crate::models::{NewProductRecord, ProductRecord, RecordField};
use crate::rules::ExtractionRuleSet;
use crate::store::CatalogStore;
use crate::utils::error::{AppError, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    Inserted(ProductRecord),
    AlreadyPresent,
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|text| collapse_whitespace(&text))
        .filter(|text| !text.is_empty())
}

/// Canonical record for one extraction, or `ExtractionIncomplete` naming every
/// required field that is missing. An unparseable price counts as missing.
pub fn normalize(
    raw: RawExtraction,
    rules: &ExtractionRuleSet,
    link: &str,
    query: &str,
) -> Result<NewProductRecord> {
    let title = clean(raw.title);
    let price = clean(raw.price).and_then(|text| rules.price.normalize(&text));
    let image_src = clean(raw.image_src);
    let description = clean(raw.description);
    let specifications = clean(raw.specifications);
    let reviews = clean(raw.reviews);

    let present = |field: RecordField| match field {
        RecordField::Title => title.is_some(),
        RecordField::Price => price.is_some(),
        RecordField::ImageSrc => image_src.is_some(),
        RecordField::Description => description.is_some(),
        RecordField::Specifications => specifications.is_some(),
        RecordField::Reviews => reviews.is_some(),
    };
    let missing: Vec<RecordField> = rules
        .required_fields
        .iter()
        .copied()
        .filter(|field| !present(*field))
        .collect();

    match (title, price, image_src) {
        (Some(title), Some(price), Some(image_src)) if missing.is_empty() => Ok(NewProductRecord {
            title,
            price,
            description,
            image_src,
            link: link.to_string(),
            source: rules.source,
            query: query.to_string(),
            specifications,
            reviews,
        }),
        _ => Err(AppError::ExtractionIncomplete {
            link: link.to_string(),
            missing,
        }),
    }
}

/// Writes normalized records at most once per `(link, query)`.
#[derive(Clone)]
pub struct IngestGate {
    store: Arc<dyn CatalogStore>,
}

impl IngestGate {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self { store }
    }

    pub async fn admit(&self, record: NewProductRecord) -> Result<IngestOutcome> {
        if self
            .store
            .find_one(&record.link, &record.query)
            .await?
            .is_some()
        {
            debug!(link = %record.link, query = %record.query, "Record already in catalog");
            return Ok(IngestOutcome::AlreadyPresent);
        }

        // A concurrent ingestion can land between the lookup and the write.
        match self.store.insert_if_absent(record).await {
            Ok(Some(stored)) => Ok(IngestOutcome::Inserted(stored)),
            Ok(None) | Err(AppError::ConstraintViolation { .. }) => Ok(IngestOutcome::AlreadyPresent),
            Err(e) => Err(e),
        }
    }
}
