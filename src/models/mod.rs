use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub mod product;

pub use product::*;

/// Marketplaces a record can originate from. Stored and serialized by display name.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "TEXT")]
pub enum MarketplaceSource {
    #[sqlx(rename = "Kaspi")]
    Kaspi,
    #[sqlx(rename = "Wildberries")]
    Wildberries,
    #[sqlx(rename = "Alfa")]
    Alfa,
    #[serde(rename = "OLX")]
    #[sqlx(rename = "OLX")]
    Olx,
    #[sqlx(rename = "Ozon")]
    Ozon,
    #[sqlx(rename = "HalykMarket")]
    HalykMarket,
    #[sqlx(rename = "Lamoda")]
    Lamoda,
}

impl MarketplaceSource {
    pub const ALL: [MarketplaceSource; 7] = [
        MarketplaceSource::Kaspi,
        MarketplaceSource::Wildberries,
        MarketplaceSource::Alfa,
        MarketplaceSource::Olx,
        MarketplaceSource::Ozon,
        MarketplaceSource::HalykMarket,
        MarketplaceSource::Lamoda,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MarketplaceSource::Kaspi => "Kaspi",
            MarketplaceSource::Wildberries => "Wildberries",
            MarketplaceSource::Alfa => "Alfa",
            MarketplaceSource::Olx => "OLX",
            MarketplaceSource::Ozon => "Ozon",
            MarketplaceSource::HalykMarket => "HalykMarket",
            MarketplaceSource::Lamoda => "Lamoda",
        }
    }
}

impl fmt::Display for MarketplaceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MarketplaceSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        MarketplaceSource::ALL
            .into_iter()
            .find(|source| source.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("Unknown marketplace: {}", s))
    }
}

/// Product record fields addressable by extraction rules.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum RecordField {
    Title,
    Price,
    Description,
    ImageSrc,
    Specifications,
    Reviews,
}

impl RecordField {
    /// Fields the catalog schema cannot store a record without.
    pub const MANDATORY: [RecordField; 3] =
        [RecordField::Title, RecordField::Price, RecordField::ImageSrc];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordField::Title => "title",
            RecordField::Price => "price",
            RecordField::Description => "description",
            RecordField::ImageSrc => "imageSrc",
            RecordField::Specifications => "specifications",
            RecordField::Reviews => "reviews",
        }
    }
}

// Helper function to generate UUIDs in the format expected by the database
pub fn generate_id() -> String {
    Uuid::new_v4().simple().to_string()
}
