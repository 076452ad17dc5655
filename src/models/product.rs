use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::{MarketplaceSource, generate_id};

/// A catalog entry produced by one successful extraction.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProductRecord {
    pub id: String,
    pub title: String,
    pub price: String,
    pub description: Option<String>,
    pub image_src: String,
    pub link: String,
    pub source: MarketplaceSource,
    pub query: String,
    pub specifications: Option<String>,
    pub reviews: Option<String>,

    // Metadata
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A normalized record that passed the required-field check and awaits the dedup gate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewProductRecord {
    pub title: String,
    pub price: String,
    pub description: Option<String>,
    pub image_src: String,
    pub link: String,
    pub source: MarketplaceSource,
    pub query: String,
    pub specifications: Option<String>,
    pub reviews: Option<String>,
}

impl ProductRecord {
    pub fn new(record: NewProductRecord) -> Self {
        let now = Utc::now();
        Self {
            id: generate_id(),
            title: record.title,
            price: record.price,
            description: record.description,
            image_src: record.image_src,
            link: record.link,
            source: record.source,
            query: record.query,
            specifications: record.specifications,
            reviews: record.reviews,
            created_at: now,
            updated_at: now,
        }
    }

    /// Text searched when matching query keywords.
    pub fn searchable_fields(&self) -> [Option<&str>; 4] {
        [
            Some(self.title.as_str()),
            self.description.as_deref(),
            self.specifications.as_deref(),
            self.reviews.as_deref(),
        ]
    }

    /// Case-insensitive check of a lowercase keyword against the searchable fields.
    pub fn mentions(&self, keyword: &str) -> bool {
        self.searchable_fields()
            .into_iter()
            .flatten()
            .any(|text| text.to_lowercase().contains(keyword))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_record() -> NewProductRecord {
        NewProductRecord {
            title: "Чехол для iPhone 13 Phone Case".to_string(),
            price: "2990.00 ₸".to_string(),
            description: Some("Silicone case".to_string()),
            image_src: "https://kaspi.kz/img/1.jpg".to_string(),
            link: "https://kaspi.kz/shop/p/case-1/".to_string(),
            source: MarketplaceSource::Kaspi,
            query: "phone case".to_string(),
            specifications: Some("Материал: силикон".to_string()),
            reviews: None,
        }
    }

    #[test]
    fn test_record_creation() {
        let record = ProductRecord::new(create_test_record());

        assert_eq!(record.title, "Чехол для iPhone 13 Phone Case");
        assert_eq!(record.source, MarketplaceSource::Kaspi);
        assert_eq!(record.query, "phone case");
        assert_eq!(record.created_at, record.updated_at);
        assert_eq!(record.id.len(), 32);
    }

    #[test]
    fn test_mentions_is_case_insensitive() {
        let record = ProductRecord::new(create_test_record());

        assert!(record.mentions("phone"));
        assert!(record.mentions("чехол"));
        assert!(record.mentions("силикон"));
        assert!(!record.mentions("laptop"));
    }

    #[test]
    fn test_serializes_camel_case() {
        let record = ProductRecord::new(create_test_record());
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["imageSrc"], "https://kaspi.kz/img/1.jpg");
        assert_eq!(value["source"], "Kaspi");
        assert!(value.get("createdAt").is_some());
        assert!(value.get("image_src").is_none());
    }
}
