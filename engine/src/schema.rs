//! Form schema and validation.
//!
//! The schema rejects a form payload before any save request is issued.
//! All failing fields are reported together so they can be shown inline.

use crate::{error::Result, Error, FieldError, FormValues, ProductField};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Field types supported in the form schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    /// Number, or a string holding a decimal number (prices)
    Decimal,
    Int,
    Bool,
    List,
    /// Arbitrary nested JSON
    Json,
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldType::String => write!(f, "String"),
            FieldType::Decimal => write!(f, "Decimal"),
            FieldType::Int => write!(f, "Int"),
            FieldType::Bool => write!(f, "Bool"),
            FieldType::List => write!(f, "List"),
            FieldType::Json => write!(f, "Json"),
        }
    }
}

/// Definition of a field in the form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDef {
    /// Flat form key
    pub key: String,
    /// Field type
    pub field_type: FieldType,
    /// Whether a non-blank value is required
    pub required: bool,
    /// Whether numeric values must be >= 0
    pub non_negative: bool,
}

impl FieldDef {
    /// Create a new required field definition.
    pub fn required(key: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            key: key.into(),
            field_type,
            required: true,
            non_negative: false,
        }
    }

    /// Create a new optional field definition.
    pub fn optional(key: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            key: key.into(),
            field_type,
            required: false,
            non_negative: false,
        }
    }

    /// Reject negative numbers.
    pub fn non_negative(mut self) -> Self {
        self.non_negative = true;
        self
    }

    /// Validate a form value against this definition.
    pub fn validate(&self, value: Option<&Value>) -> std::result::Result<(), FieldError> {
        let blank = value.map_or(true, is_blank_input);
        if blank {
            return if self.required {
                Err(FieldError::new(&self.key, "is required"))
            } else {
                Ok(())
            };
        }
        // Not blank, so present.
        let Some(value) = value else { return Ok(()) };
        self.validate_type(value)?;

        if self.non_negative {
            if let Some(n) = numeric_value(value) {
                if n < 0.0 {
                    return Err(FieldError::new(&self.key, "must not be negative"));
                }
            }
        }
        Ok(())
    }

    fn validate_type(&self, value: &Value) -> std::result::Result<(), FieldError> {
        let valid = match self.field_type {
            FieldType::String => value.is_string(),
            FieldType::Decimal => numeric_value(value).is_some(),
            FieldType::Int => match value {
                Value::Number(n) => n.is_i64() || n.is_u64(),
                Value::String(s) => s.trim().parse::<i64>().is_ok(),
                _ => false,
            },
            FieldType::Bool => value.is_boolean(),
            FieldType::List => value.is_array(),
            FieldType::Json => true, // Any JSON is valid
        };

        if valid {
            Ok(())
        } else {
            Err(FieldError::new(
                &self.key,
                format!(
                    "expected {}, got {}",
                    self.field_type,
                    json_type_name(value)
                ),
            ))
        }
    }
}

fn is_blank_input(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Numeric reading of a value; prices arrive as strings from the platform.
pub(crate) fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "Null",
        Value::Bool(_) => "Bool",
        Value::Number(n) if n.is_i64() || n.is_u64() => "Int",
        Value::Number(_) => "Float",
        Value::String(_) => "String",
        Value::Array(_) => "Array",
        Value::Object(_) => "Object",
    }
}

/// Schema for the product form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSchema {
    /// Field definitions
    pub fields: Vec<FieldDef>,
}

impl FormSchema {
    /// Create a new schema.
    pub fn new(fields: Vec<FieldDef>) -> Self {
        Self { fields }
    }

    /// The schema every product form is checked against.
    pub fn product() -> Self {
        use ProductField as F;
        Self::new(vec![
            FieldDef::required(F::Title.form_key(), FieldType::String),
            FieldDef::optional(F::Description.form_key(), FieldType::String),
            FieldDef::optional(F::ShortDescription.form_key(), FieldType::String),
            FieldDef::optional(F::Sku.form_key(), FieldType::String),
            FieldDef::optional(F::RegularPrice.form_key(), FieldType::Decimal).non_negative(),
            FieldDef::optional(F::SalePrice.form_key(), FieldType::Decimal).non_negative(),
            FieldDef::optional(F::StockQuantity.form_key(), FieldType::Int),
            FieldDef::optional(F::StockStatus.form_key(), FieldType::String),
            FieldDef::optional(F::ManageStock.form_key(), FieldType::Bool),
            FieldDef::optional(F::Slug.form_key(), FieldType::String),
            FieldDef::optional(F::MetaTitle.form_key(), FieldType::String),
            FieldDef::optional(F::MetaDescription.form_key(), FieldType::String),
            FieldDef::optional(F::FocusKeyword.form_key(), FieldType::String),
            FieldDef::optional(F::Categories.form_key(), FieldType::List),
            FieldDef::optional(F::Tags.form_key(), FieldType::List),
            FieldDef::optional(F::Images.form_key(), FieldType::List),
            FieldDef::optional(F::Attributes.form_key(), FieldType::List),
            FieldDef::optional(F::UpsellIds.form_key(), FieldType::List),
            FieldDef::optional(F::CrossSellIds.form_key(), FieldType::List),
        ])
    }

    /// Get a field definition by key.
    pub fn get_field(&self, key: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.key == key)
    }

    /// Validate form values, collecting every failing field.
    pub fn validate(&self, values: &FormValues) -> Result<()> {
        let mut errors: Vec<FieldError> = self
            .fields
            .iter()
            .filter_map(|field| field.validate(values.get(&field.key)).err())
            .collect();

        if let Some(err) = check_sale_price(values) {
            if !errors.iter().any(|e| e.field == err.field) {
                errors.push(err);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(errors))
        }
    }
}

fn check_sale_price(values: &FormValues) -> Option<FieldError> {
    let regular = values
        .field(ProductField::RegularPrice)
        .and_then(numeric_value)?;
    let sale = values.field(ProductField::SalePrice).and_then(numeric_value)?;
    (sale > regular).then(|| {
        FieldError::new(
            ProductField::SalePrice.form_key(),
            "must not exceed the regular price",
        )
    })
}
