//! Core data models used throughout ultradoc.
//!
//! These types represent the pages, chunks, search results, and the
//! structured logistics record that flow through the upload and
//! answering pipeline.

use serde::{Deserialize, Serialize};

/// One page of text produced by a document parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// 1-based page number within the source document.
    pub page_number: u32,
    pub text: String,
}

impl Page {
    pub fn new(page_number: u32, text: impl Into<String>) -> Self {
        Self {
            page_number,
            text: text.into(),
        }
    }
}

/// A contiguous window of a page's text, the unit of retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub page: u32,
}

/// A chunk paired with its squared Euclidean distance to a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub chunk: Chunk,
    pub distance: f32,
}

/// The fixed logistics schema extracted from a document corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    ShipmentId,
    Shipper,
    Consignee,
    PickupDatetime,
    DeliveryDatetime,
    EquipmentType,
    Mode,
    Rate,
    Currency,
    Weight,
    CarrierName,
}

impl Field {
    /// All fields in schema order.
    pub const ALL: [Field; 11] = [
        Field::ShipmentId,
        Field::Shipper,
        Field::Consignee,
        Field::PickupDatetime,
        Field::DeliveryDatetime,
        Field::EquipmentType,
        Field::Mode,
        Field::Rate,
        Field::Currency,
        Field::Weight,
        Field::CarrierName,
    ];

    /// The JSON key of this field.
    pub fn key(self) -> &'static str {
        match self {
            Field::ShipmentId => "shipment_id",
            Field::Shipper => "shipper",
            Field::Consignee => "consignee",
            Field::PickupDatetime => "pickup_datetime",
            Field::DeliveryDatetime => "delivery_datetime",
            Field::EquipmentType => "equipment_type",
            Field::Mode => "mode",
            Field::Rate => "rate",
            Field::Currency => "currency",
            Field::Weight => "weight",
            Field::CarrierName => "carrier_name",
        }
    }

    /// Question phrases that route a question straight to this field.
    pub fn question_keywords(self) -> &'static [&'static str] {
        match self {
            Field::ShipmentId => &["shipment id", "shipment number", "load id"],
            Field::Shipper => &["shipper"],
            Field::Consignee => &["consignee", "receiver"],
            Field::PickupDatetime => &["pickup date", "pickup time", "pick up"],
            Field::DeliveryDatetime => &["delivery date", "delivery time", "deliver"],
            Field::EquipmentType => &["equipment type", "equipment"],
            Field::Mode => &["mode of transport", "shipping mode"],
            Field::Rate => &["carrier rate", "rate", "charge", "amount"],
            Field::Currency => &["currency"],
            Field::Weight => &["weight"],
            Field::CarrierName => &["carrier name", "carrier"],
        }
    }
}

/// Structured record with every field either a matched string or absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredRecord {
    pub shipment_id: Option<String>,
    pub shipper: Option<String>,
    pub consignee: Option<String>,
    pub pickup_datetime: Option<String>,
    pub delivery_datetime: Option<String>,
    pub equipment_type: Option<String>,
    pub mode: Option<String>,
    pub rate: Option<String>,
    pub currency: Option<String>,
    pub weight: Option<String>,
    pub carrier_name: Option<String>,
}

impl StructuredRecord {
    /// A record with every field absent.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.slot(field).as_deref()
    }

    pub fn set(&mut self, field: Field, value: Option<String>) {
        *self.slot_mut(field) = value;
    }

    /// `(field, value)` pairs in schema order.
    pub fn fields(&self) -> impl Iterator<Item = (Field, Option<&str>)> + '_ {
        Field::ALL.iter().map(move |&f| (f, self.get(f)))
    }

    /// Number of present fields.
    pub fn filled(&self) -> usize {
        self.fields().filter(|(_, v)| v.is_some()).count()
    }

    /// Overwrite fields with every present value of `other`.
    ///
    /// Absent values in `other` never erase a value in `self`.
    pub fn overlay(&mut self, other: &StructuredRecord) {
        for field in Field::ALL {
            if let Some(v) = other.get(field) {
                self.set(field, Some(v.to_string()));
            }
        }
    }

    /// Answer a question directly from the record.
    ///
    /// Fields are checked in schema order. A field whose keywords appear
    /// in the question answers with its value when present; an absent
    /// value moves the search on to the next field.
    pub fn lookup_answer(&self, question: &str) -> Option<(Field, &str)> {
        let question = question.to_lowercase();
        for field in Field::ALL {
            let asked = field
                .question_keywords()
                .iter()
                .any(|kw| question.contains(kw));
            if asked {
                if let Some(value) = self.get(field) {
                    return Some((field, value));
                }
            }
        }
        None
    }

    fn slot(&self, field: Field) -> &Option<String> {
        match field {
            Field::ShipmentId => &self.shipment_id,
            Field::Shipper => &self.shipper,
            Field::Consignee => &self.consignee,
            Field::PickupDatetime => &self.pickup_datetime,
            Field::DeliveryDatetime => &self.delivery_datetime,
            Field::EquipmentType => &self.equipment_type,
            Field::Mode => &self.mode,
            Field::Rate => &self.rate,
            Field::Currency => &self.currency,
            Field::Weight => &self.weight,
            Field::CarrierName => &self.carrier_name,
        }
    }

    fn slot_mut(&mut self, field: Field) -> &mut Option<String> {
        match field {
            Field::ShipmentId => &mut self.shipment_id,
            Field::Shipper => &mut self.shipper,
            Field::Consignee => &mut self.consignee,
            Field::PickupDatetime => &mut self.pickup_datetime,
            Field::DeliveryDatetime => &mut self.delivery_datetime,
            Field::EquipmentType => &mut self.equipment_type,
            Field::Mode => &mut self.mode,
            Field::Rate => &mut self.rate,
            Field::Currency => &mut self.currency,
            Field::Weight => &mut self.weight,
            Field::CarrierName => &mut self.carrier_name,
        }
    }
}
