use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{RecordRejected, ScrapeError, ScrapeResult};

// --- Record types ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordType {
    Businesses,
    Books,
}

impl RecordType {
    pub const ALL: [RecordType; 2] = [RecordType::Businesses, RecordType::Books];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::Businesses => "businesses",
            RecordType::Books => "books",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = ScrapeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "businesses" => Ok(RecordType::Businesses),
            "books" => Ok(RecordType::Books),
            _ => Err(ScrapeError::InvalidInput),
        }
    }
}

/// Which extraction path produced a persisted batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Primary,
    Fallback,
}

impl Provenance {
    /// Label reported to HTTP callers in the `source` field.
    pub fn source_label(&self) -> &'static str {
        match self {
            Provenance::Primary => "stagehand",
            Provenance::Fallback => "python",
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provenance::Primary => f.write_str("primary"),
            Provenance::Fallback => f.write_str("fallback"),
        }
    }
}

// --- Request ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeRequest {
    pub url: String,
    pub record_type: RecordType,
}

impl ScrapeRequest {
    /// Build a request from caller input. Missing, non-text or blank `url`, or
    /// an unknown `type`, is `InvalidInput`.
    pub fn parse(url: Option<&str>, record_type: Option<&str>) -> ScrapeResult<Self> {
        let url = url
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or(ScrapeError::InvalidInput)?;
        let record_type = record_type
            .ok_or(ScrapeError::InvalidInput)?
            .parse::<RecordType>()?;

        Ok(Self {
            url: url.to_string(),
            record_type,
        })
    }

    /// Build a request from a raw JSON body of shape `{url, type}`.
    pub fn from_json(body: &serde_json::Value) -> ScrapeResult<Self> {
        Self::parse(
            body.get("url").and_then(|v| v.as_str()),
            body.get("type").and_then(|v| v.as_str()),
        )
    }
}

// --- Extracted records ---

/// A business directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct BusinessRecord {
    /// Business name as shown on the result card
    pub name: String,
    /// Phone number
    pub phone: Option<String>,
    /// Principal contact person
    pub principal_contact: Option<String>,
    /// Street address
    pub address: Option<String>,
    /// Accreditation status
    pub accreditation: Option<String>,
    /// Link to the business profile
    pub url: Option<String>,
}

/// A catalogue item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct BookRecord {
    /// Book title
    pub name: String,
    /// Price including currency symbol
    pub price: String,
    /// Star rating, e.g. "Three"
    pub star_rating: Option<String>,
    /// In-stock availability text
    pub instock_availability: Option<String>,
}

/// Envelope the remote extractor fills: a list of items of one record shape.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExtractionEnvelope<T> {
    pub items: Vec<T>,
}

fn clean_required(field: &str, value: String) -> Result<String, RecordRejected> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(RecordRejected(format!("required field `{field}` is blank")));
    }
    Ok(trimmed.to_string())
}

fn clean_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl BusinessRecord {
    fn normalized(self) -> Result<Self, RecordRejected> {
        Ok(Self {
            name: clean_required("name", self.name)?,
            phone: clean_optional(self.phone),
            principal_contact: clean_optional(self.principal_contact),
            address: clean_optional(self.address),
            accreditation: clean_optional(self.accreditation),
            url: clean_optional(self.url),
        })
    }
}

impl BookRecord {
    fn normalized(self) -> Result<Self, RecordRejected> {
        Ok(Self {
            name: clean_required("name", self.name)?,
            price: clean_required("price", self.price)?,
            star_rating: clean_optional(self.star_rating),
            instock_availability: clean_optional(self.instock_availability),
        })
    }
}

/// One validated, normalized record. The variant always matches the record
/// type it was validated against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ExtractedRecord {
    Business(BusinessRecord),
    Book(BookRecord),
}

impl ExtractedRecord {
    /// Validate a loosely typed item against `record_type`'s shape. Unknown
    /// fields are ignored; values are trimmed and blank optionals become null.
    pub fn from_value(
        record_type: RecordType,
        value: serde_json::Value,
    ) -> Result<Self, RecordRejected> {
        if !value.is_object() {
            return Err(RecordRejected("expected an object".to_string()));
        }
        let reject = |e: serde_json::Error| RecordRejected(e.to_string());
        match record_type {
            RecordType::Businesses => serde_json::from_value::<BusinessRecord>(value)
                .map_err(reject)?
                .normalized()
                .map(ExtractedRecord::Business),
            RecordType::Books => serde_json::from_value::<BookRecord>(value)
                .map_err(reject)?
                .normalized()
                .map(ExtractedRecord::Book),
        }
    }

    pub fn record_type(&self) -> RecordType {
        match self {
            ExtractedRecord::Business(_) => RecordType::Businesses,
            ExtractedRecord::Book(_) => RecordType::Books,
        }
    }

    /// Field value by schema name. Unknown names and null optionals are `None`.
    pub fn get(&self, field: &str) -> Option<&str> {
        match self {
            ExtractedRecord::Business(b) => match field {
                "name" => Some(b.name.as_str()),
                "phone" => b.phone.as_deref(),
                "principal_contact" => b.principal_contact.as_deref(),
                "address" => b.address.as_deref(),
                "accreditation" => b.accreditation.as_deref(),
                "url" => b.url.as_deref(),
                _ => None,
            },
            ExtractedRecord::Book(b) => match field {
                "name" => Some(b.name.as_str()),
                "price" => Some(b.price.as_str()),
                "star_rating" => b.star_rating.as_deref(),
                "instock_availability" => b.instock_availability.as_deref(),
                _ => None,
            },
        }
    }

    /// Identity within one batch. Listings are keyed by profile URL, falling
    /// back to name + phone; books by name + price.
    pub fn dedup_key(&self) -> String {
        match self {
            ExtractedRecord::Business(b) => match &b.url {
                Some(url) => url.clone(),
                None => format!("{}-{}", b.name, b.phone.as_deref().unwrap_or_default()),
            },
            ExtractedRecord::Book(b) => format!("{}-{}", b.name, b.price),
        }
    }
}

// --- Outcomes ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionOutcome {
    pub records: Vec<ExtractedRecord>,
    pub provenance: Provenance,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PersistResult {
    pub table_name: String,
    pub row_count: usize,
    pub provenance: Provenance,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_type_round_trips_through_str() {
        for rt in RecordType::ALL {
            assert_eq!(rt.as_str().parse::<RecordType>().unwrap(), rt);
        }
        assert!(matches!(
            "movies".parse::<RecordType>(),
            Err(ScrapeError::InvalidInput)
        ));
    }

    #[test]
    fn request_rejects_unknown_type_and_blank_url() {
        assert!(ScrapeRequest::parse(Some("https://x.test"), Some("movies")).is_err());
        assert!(ScrapeRequest::parse(Some("   "), Some("books")).is_err());
        assert!(ScrapeRequest::parse(None, Some("books")).is_err());
        assert!(ScrapeRequest::parse(Some("https://x.test"), None).is_err());
    }

    #[test]
    fn request_from_json_rejects_non_text_url() {
        let err = ScrapeRequest::from_json(&json!({"url": 42, "type": "books"})).unwrap_err();
        assert!(matches!(err, ScrapeError::InvalidInput));

        let req =
            ScrapeRequest::from_json(&json!({"url": " https://x.test ", "type": "businesses"}))
                .unwrap();
        assert_eq!(req.url, "https://x.test");
        assert_eq!(req.record_type, RecordType::Businesses);
    }

    #[test]
    fn business_requires_name_only() {
        let rec = ExtractedRecord::from_value(
            RecordType::Businesses,
            json!({"name": "  Acme Billing ", "phone": "", "extra": 1}),
        )
        .unwrap();
        assert_eq!(rec.get("name"), Some("Acme Billing"));
        assert_eq!(rec.get("phone"), None);
        assert_eq!(rec.get("extra"), None);

        assert!(ExtractedRecord::from_value(RecordType::Businesses, json!({"phone": "1"})).is_err());
        assert!(ExtractedRecord::from_value(RecordType::Businesses, json!({"name": " "})).is_err());
    }

    #[test]
    fn book_requires_name_and_price() {
        assert!(ExtractedRecord::from_value(RecordType::Books, json!({"name": "A"})).is_err());
        assert!(
            ExtractedRecord::from_value(RecordType::Books, json!({"name": "A", "price": 10}))
                .is_err()
        );
        let rec = ExtractedRecord::from_value(
            RecordType::Books,
            json!({"name": "A", "price": "£10.00", "star_rating": null}),
        )
        .unwrap();
        assert_eq!(rec.record_type(), RecordType::Books);
        assert_eq!(rec.get("price"), Some("£10.00"));
        assert_eq!(rec.get("star_rating"), None);
    }

    #[test]
    fn non_object_items_are_rejected() {
        assert!(ExtractedRecord::from_value(RecordType::Books, json!("A")).is_err());
        assert!(ExtractedRecord::from_value(RecordType::Books, json!([1, 2])).is_err());
    }

    #[test]
    fn dedup_key_prefers_business_url() {
        let with_url = ExtractedRecord::from_value(
            RecordType::Businesses,
            json!({"name": "A", "phone": "1", "url": "https://bbb.test/a"}),
        )
        .unwrap();
        assert_eq!(with_url.dedup_key(), "https://bbb.test/a");

        let without_url =
            ExtractedRecord::from_value(RecordType::Businesses, json!({"name": "A", "phone": "1"}))
                .unwrap();
        assert_eq!(without_url.dedup_key(), "A-1");
    }

    #[test]
    fn provenance_labels() {
        assert_eq!(Provenance::Primary.source_label(), "stagehand");
        assert_eq!(Provenance::Fallback.source_label(), "python");
        assert_eq!(Provenance::Fallback.to_string(), "fallback");
    }
}
