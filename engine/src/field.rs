//! The field path table.
//!
//! Product content is nested (`seo.title`) while the form is flat
//! (`metaTitle`). Every known field is a variant of [`ProductField`] and the
//! mapping between the two shapes is a fixed lookup table, so a field can never
//! be half-mapped.

use crate::{error::Result, Error};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// A known editable field of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProductField {
    Title,
    Description,
    ShortDescription,
    Sku,
    RegularPrice,
    SalePrice,
    StockQuantity,
    StockStatus,
    ManageStock,
    Slug,
    MetaTitle,
    MetaDescription,
    /// UI-only; lives in legacy metadata, never in the content object
    FocusKeyword,
    Categories,
    Tags,
    Images,
    Attributes,
    UpsellIds,
    CrossSellIds,
}

impl ProductField {
    /// Every field, in form order.
    pub const ALL: [ProductField; 19] = [
        ProductField::Title,
        ProductField::Description,
        ProductField::ShortDescription,
        ProductField::Sku,
        ProductField::RegularPrice,
        ProductField::SalePrice,
        ProductField::StockQuantity,
        ProductField::StockStatus,
        ProductField::ManageStock,
        ProductField::Slug,
        ProductField::MetaTitle,
        ProductField::MetaDescription,
        ProductField::FocusKeyword,
        ProductField::Categories,
        ProductField::Tags,
        ProductField::Images,
        ProductField::Attributes,
        ProductField::UpsellIds,
        ProductField::CrossSellIds,
    ];

    /// Flat key used by the form.
    pub fn form_key(self) -> &'static str {
        match self {
            ProductField::Title => "title",
            ProductField::Description => "description",
            ProductField::ShortDescription => "shortDescription",
            ProductField::Sku => "sku",
            ProductField::RegularPrice => "regularPrice",
            ProductField::SalePrice => "salePrice",
            ProductField::StockQuantity => "stockQuantity",
            ProductField::StockStatus => "stockStatus",
            ProductField::ManageStock => "manageStock",
            ProductField::Slug => "slug",
            ProductField::MetaTitle => "metaTitle",
            ProductField::MetaDescription => "metaDescription",
            ProductField::FocusKeyword => "focusKeyword",
            ProductField::Categories => "categories",
            ProductField::Tags => "tags",
            ProductField::Images => "images",
            ProductField::Attributes => "attributes",
            ProductField::UpsellIds => "upsellIds",
            ProductField::CrossSellIds => "crossSellIds",
        }
    }

    /// Dotted path inside the content object, `None` for UI-only fields.
    pub fn content_path(self) -> Option<&'static str> {
        let path = match self {
            ProductField::Title => "title",
            ProductField::Description => "description",
            ProductField::ShortDescription => "short_description",
            ProductField::Sku => "sku",
            ProductField::RegularPrice => "regular_price",
            ProductField::SalePrice => "sale_price",
            ProductField::StockQuantity => "stock_quantity",
            ProductField::StockStatus => "stock_status",
            ProductField::ManageStock => "manage_stock",
            ProductField::Slug => "slug",
            ProductField::MetaTitle => "seo.title",
            ProductField::MetaDescription => "seo.description",
            ProductField::FocusKeyword => return None,
            ProductField::Categories => "categories",
            ProductField::Tags => "tags",
            ProductField::Images => "images",
            ProductField::Attributes => "attributes",
            ProductField::UpsellIds => "upsell_ids",
            ProductField::CrossSellIds => "cross_sell_ids",
        };
        Some(path)
    }

    /// First segment of the content path (the granularity of dirty tracking).
    pub fn top_level_key(self) -> Option<&'static str> {
        self.content_path()
            .map(|path| path.split('.').next().unwrap_or(path))
    }

    /// Key in the platform's legacy metadata consulted when content has no value.
    pub fn legacy_meta_key(self) -> Option<&'static str> {
        match self {
            ProductField::MetaTitle => Some("_seo_title"),
            ProductField::MetaDescription => Some("_seo_description"),
            ProductField::FocusKeyword => Some("_seo_focus_keyword"),
            _ => None,
        }
    }

    /// Value used when neither content nor legacy metadata provide one.
    pub fn default_value(self) -> Value {
        match self {
            ProductField::StockQuantity => Value::Null,
            ProductField::StockStatus => json!("instock"),
            ProductField::ManageStock => json!(false),
            ProductField::Categories
            | ProductField::Tags
            | ProductField::Images
            | ProductField::Attributes
            | ProductField::UpsellIds
            | ProductField::CrossSellIds => json!([]),
            _ => json!(""),
        }
    }

    /// Rich-text fields are rewritten by the editor widgets after a reset.
    pub fn is_rich_text(self) -> bool {
        matches!(
            self,
            ProductField::Description | ProductField::ShortDescription
        )
    }

    /// Whether the content generator may propose a value for this field.
    pub fn is_draftable(self) -> bool {
        matches!(
            self,
            ProductField::Title
                | ProductField::Description
                | ProductField::ShortDescription
                | ProductField::Slug
                | ProductField::MetaTitle
                | ProductField::MetaDescription
                | ProductField::Categories
                | ProductField::Tags
                | ProductField::Attributes
        )
    }

    /// Look a field up by its flat form key.
    pub fn from_form_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.form_key() == key)
    }

    /// Look a field up by its dotted content path.
    pub fn from_content_path(path: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.content_path() == Some(path))
    }

    /// Resolve a content path, failing for paths outside the table.
    pub fn parse_content_path(path: &str) -> Result<Self> {
        Self::from_content_path(path).ok_or_else(|| Error::UnknownFieldPath(path.to_string()))
    }

    /// Resolve a form key, failing for keys outside the table.
    pub fn parse_form_key(key: &str) -> Result<Self> {
        Self::from_form_key(key).ok_or_else(|| Error::UnknownFormKey(key.to_string()))
    }

    /// Fields stored under a given top-level content key.
    pub fn under_top_level(key: &str) -> impl Iterator<Item = ProductField> + '_ {
        Self::ALL
            .into_iter()
            .filter(move |f| f.top_level_key() == Some(key))
    }
}

impl std::fmt::Display for ProductField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.content_path() {
            Some(path) => f.write_str(path),
            None => f.write_str(self.form_key()),
        }
    }
}
