//! Wire shapes for the document-creation endpoint.
//!
//! Field names on the wire are fixed by the remote API and mix `snake_case` with
//! `camelCase` (`importRequest`, `description.participantInn`). Absent optional fields are
//! omitted when serializing and default to `None` when parsing, so sparse server responses
//! such as `{"doc_id":"X"}` parse into a [`Document`].

use serde::{Deserialize, Serialize};

/// Document type sent when the caller does not pick one.
pub const DEFAULT_DOC_TYPE: &str = "LP_INTRODUCE_GOODS";

fn default_doc_type() -> String {
    DEFAULT_DOC_TYPE.to_string()
}

/// A goods-introduction document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<Description>,
    #[serde(rename = "doc_id", default, skip_serializing_if = "Option::is_none")]
    pub doc_id: Option<String>,
    #[serde(rename = "doc_status", default, skip_serializing_if = "Option::is_none")]
    pub doc_status: Option<String>,
    #[serde(rename = "doc_type", default = "default_doc_type")]
    pub doc_type: String,
    #[serde(rename = "importRequest", default)]
    pub import_request: bool,
    #[serde(rename = "owner_inn", default, skip_serializing_if = "Option::is_none")]
    pub owner_inn: Option<String>,
    #[serde(rename = "participant_inn", default, skip_serializing_if = "Option::is_none")]
    pub participant_inn: Option<String>,
    #[serde(rename = "producer_inn", default, skip_serializing_if = "Option::is_none")]
    pub producer_inn: Option<String>,
    #[serde(rename = "production_date", default, skip_serializing_if = "Option::is_none")]
    pub production_date: Option<String>,
    #[serde(rename = "production_type", default, skip_serializing_if = "Option::is_none")]
    pub production_type: Option<String>,
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(rename = "reg_date", default, skip_serializing_if = "Option::is_none")]
    pub reg_date: Option<String>,
    #[serde(rename = "reg_number", default, skip_serializing_if = "Option::is_none")]
    pub reg_number: Option<String>,
}

impl Default for Document {
    fn default() -> Self {
        Self {
            description: None,
            doc_id: None,
            doc_status: None,
            doc_type: default_doc_type(),
            import_request: false,
            owner_inn: None,
            participant_inn: None,
            producer_inn: None,
            production_date: None,
            production_type: None,
            products: Vec::new(),
            reg_date: None,
            reg_number: None,
        }
    }
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_doc_id(mut self, doc_id: impl Into<String>) -> Self {
        self.doc_id = Some(doc_id.into());
        self
    }

    pub fn with_doc_status(mut self, status: impl Into<String>) -> Self {
        self.doc_status = Some(status.into());
        self
    }

    pub fn with_doc_type(mut self, doc_type: impl Into<String>) -> Self {
        self.doc_type = doc_type.into();
        self
    }

    pub fn with_import_request(mut self, import_request: bool) -> Self {
        self.import_request = import_request;
        self
    }

    /// Sets `description.participantInn`.
    pub fn with_description(mut self, participant_inn: impl Into<String>) -> Self {
        self.description = Some(Description { participant_inn: Some(participant_inn.into()) });
        self
    }

    pub fn with_owner_inn(mut self, inn: impl Into<String>) -> Self {
        self.owner_inn = Some(inn.into());
        self
    }

    pub fn with_participant_inn(mut self, inn: impl Into<String>) -> Self {
        self.participant_inn = Some(inn.into());
        self
    }

    pub fn with_producer_inn(mut self, inn: impl Into<String>) -> Self {
        self.producer_inn = Some(inn.into());
        self
    }

    pub fn with_production_date(mut self, date: impl Into<String>) -> Self {
        self.production_date = Some(date.into());
        self
    }

    pub fn with_production_type(mut self, production_type: impl Into<String>) -> Self {
        self.production_type = Some(production_type.into());
        self
    }

    pub fn with_reg_date(mut self, date: impl Into<String>) -> Self {
        self.reg_date = Some(date.into());
        self
    }

    pub fn with_reg_number(mut self, number: impl Into<String>) -> Self {
        self.reg_number = Some(number.into());
        self
    }

    /// Appends one product, keeping order.
    pub fn with_product(mut self, product: Product) -> Self {
        self.products.push(product);
        self
    }
}

/// Nested `description` object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Description {
    #[serde(rename = "participantInn", default, skip_serializing_if = "Option::is_none")]
    pub participant_inn: Option<String>,
}

/// One product line with its certificate metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    #[serde(rename = "certificate_document", default, skip_serializing_if = "Option::is_none")]
    pub certificate_document: Option<String>,
    #[serde(
        rename = "certificate_document_date",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub certificate_document_date: Option<String>,
    #[serde(
        rename = "certificate_document_number",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub certificate_document_number: Option<String>,
    #[serde(rename = "owner_inn", default, skip_serializing_if = "Option::is_none")]
    pub owner_inn: Option<String>,
    #[serde(rename = "producer_inn", default, skip_serializing_if = "Option::is_none")]
    pub producer_inn: Option<String>,
    #[serde(rename = "production_date", default, skip_serializing_if = "Option::is_none")]
    pub production_date: Option<String>,
    #[serde(rename = "tnved_code", default, skip_serializing_if = "Option::is_none")]
    pub tnved_code: Option<String>,
    #[serde(rename = "uit_code", default, skip_serializing_if = "Option::is_none")]
    pub uit_code: Option<String>,
    #[serde(rename = "uitu_code", default, skip_serializing_if = "Option::is_none")]
    pub uitu_code: Option<String>,
}

impl Product {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the certificate document kind, number and date together.
    pub fn with_certificate(
        mut self,
        document: impl Into<String>,
        number: impl Into<String>,
        date: impl Into<String>,
    ) -> Self {
        self.certificate_document = Some(document.into());
        self.certificate_document_number = Some(number.into());
        self.certificate_document_date = Some(date.into());
        self
    }

    pub fn with_owner_inn(mut self, inn: impl Into<String>) -> Self {
        self.owner_inn = Some(inn.into());
        self
    }

    pub fn with_producer_inn(mut self, inn: impl Into<String>) -> Self {
        self.producer_inn = Some(inn.into());
        self
    }

    pub fn with_production_date(mut self, date: impl Into<String>) -> Self {
        self.production_date = Some(date.into());
        self
    }

    pub fn with_tnved_code(mut self, code: impl Into<String>) -> Self {
        self.tnved_code = Some(code.into());
        self
    }

    pub fn with_uit_code(mut self, code: impl Into<String>) -> Self {
        self.uit_code = Some(code.into());
        self
    }

    pub fn with_uitu_code(mut self, code: impl Into<String>) -> Self {
        self.uitu_code = Some(code.into());
        self
    }
}
