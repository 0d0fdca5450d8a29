//! Static per-record-type configuration.
//!
//! Built once at startup and shared read-only. Every `RecordType` resolves to
//! exactly one `TypeConfig`.

use schemars::gen::SchemaSettings;
use schemars::JsonSchema;

use crate::error::RecordRejected;
use crate::types::{BookRecord, BusinessRecord, ExtractedRecord, ExtractionEnvelope, RecordType};

const BUSINESSES_INSTRUCTION: &str = "Extract each result card listing with its result business name, phone number, principal contact, address, accreditation, and URL.";
const BOOKS_INSTRUCTION: &str = "Extract each book with its name, price, star-rating, and instock availability from the search results.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub required: bool,
}

const fn required(name: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        required: true,
    }
}

const fn optional(name: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        required: false,
    }
}

/// Column order for persistence and CSV export.
const BUSINESS_FIELDS: &[FieldSpec] = &[
    required("name"),
    optional("phone"),
    optional("principal_contact"),
    optional("address"),
    optional("accreditation"),
    optional("url"),
];

const BOOK_FIELDS: &[FieldSpec] = &[
    required("name"),
    required("price"),
    optional("star_rating"),
    optional("instock_availability"),
];

/// Field constraints for one record type, plus the JSON schema handed to the
/// remote extractor. Both describe the same Rust record struct.
#[derive(Debug, Clone)]
pub struct RecordSchema {
    record_type: RecordType,
    fields: &'static [FieldSpec],
    json: serde_json::Value,
}

impl RecordSchema {
    fn new<T: JsonSchema>(record_type: RecordType, fields: &'static [FieldSpec]) -> Self {
        Self {
            record_type,
            fields,
            json: envelope_schema::<T>(),
        }
    }

    pub fn fields(&self) -> &'static [FieldSpec] {
        self.fields
    }

    pub fn field_names(&self) -> impl Iterator<Item = &'static str> {
        self.fields.iter().map(|f| f.name)
    }

    /// `{"items": [<record>]}` schema, fully inlined.
    pub fn json_schema(&self) -> &serde_json::Value {
        &self.json
    }

    pub fn validate(&self, item: serde_json::Value) -> Result<ExtractedRecord, RecordRejected> {
        ExtractedRecord::from_value(self.record_type, item)
    }
}

fn envelope_schema<T: JsonSchema>() -> serde_json::Value {
    let generator = SchemaSettings::draft07()
        .with(|s| s.inline_subschemas = true)
        .into_generator();
    let schema = generator.into_root_schema_for::<ExtractionEnvelope<T>>();
    let mut value = serde_json::to_value(schema).unwrap_or_default();

    if let serde_json::Value::Object(map) = &mut value {
        map.remove("$schema");
        map.remove("title");
        map.remove("definitions");
    }

    value
}

#[derive(Debug, Clone)]
pub struct TypeConfig {
    pub record_type: RecordType,
    pub instruction: String,
    pub output_file_name: String,
    pub table_name: String,
    pub schema: RecordSchema,
}

impl TypeConfig {
    fn new<T: JsonSchema>(
        record_type: RecordType,
        instruction: &str,
        fields: &'static [FieldSpec],
    ) -> Self {
        Self {
            record_type,
            instruction: instruction.to_string(),
            output_file_name: format!("{}_scraper_output.csv", record_type.as_str()),
            table_name: record_type.as_str().to_string(),
            schema: RecordSchema::new::<T>(record_type, fields),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    businesses: TypeConfig,
    books: TypeConfig,
}

impl SchemaRegistry {
    pub fn standard() -> Self {
        Self {
            businesses: TypeConfig::new::<BusinessRecord>(
                RecordType::Businesses,
                BUSINESSES_INSTRUCTION,
                BUSINESS_FIELDS,
            ),
            books: TypeConfig::new::<BookRecord>(RecordType::Books, BOOKS_INSTRUCTION, BOOK_FIELDS),
        }
    }

    pub fn get(&self, record_type: RecordType) -> &TypeConfig {
        match record_type {
            RecordType::Businesses => &self.businesses,
            RecordType::Books => &self.books,
        }
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
