//! Draft reconciliation.
//!
//! Holds the content proposed by the generator and the set of proposals the
//! user has not acted on yet. Accepting writes one field into the form;
//! rejecting only forgets the proposal. Neither touches any other field.

use crate::{
    content::is_blank, error::Result, FormState, ProductContent, ProductField, SetOptions,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// Result of accepting a proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AcceptOutcome {
    /// The value was written into the form
    Applied { field: ProductField, value: Value },
    /// Nothing to accept: already consumed, rejected, or absent from the draft
    NoOp,
}

impl AcceptOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, AcceptOutcome::Applied { .. })
    }
}

/// The generator's draft and the proposals still open.
#[derive(Debug, Clone, Default)]
pub struct DraftReconciler {
    draft: Option<ProductContent>,
    remaining: BTreeSet<ProductField>,
    revision: u64,
}

impl DraftReconciler {
    /// Create a reconciler with no draft.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a freshly generated draft (or clear it).
    ///
    /// This is the only operation that grows the remaining proposals.
    pub fn set_draft(&mut self, draft: Option<ProductContent>) {
        self.remaining = draft
            .as_ref()
            .map(proposals_in)
            .unwrap_or_default();
        self.draft = draft;
        self.revision += 1;
    }

    /// The current draft.
    pub fn draft(&self) -> Option<&ProductContent> {
        self.draft.as_ref()
    }

    /// Proposals not yet accepted or rejected, in field order.
    pub fn remaining_proposals(&self) -> Vec<ProductField> {
        self.remaining.iter().copied().collect()
    }

    /// Whether a field still has an open proposal.
    pub fn is_remaining(&self, field: ProductField) -> bool {
        self.remaining.contains(&field)
    }

    /// Whether any proposal is open.
    pub fn has_proposals(&self) -> bool {
        !self.remaining.is_empty()
    }

    /// Incremented whenever the proposals change.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// The draft's proposed value for a field.
    pub fn proposed_value(&self, field: ProductField) -> Option<&Value> {
        let path = field.content_path()?;
        self.draft.as_ref()?.get_path(path).filter(|v| !is_blank(v))
    }

    /// Accept a proposal into the form.
    ///
    /// Writes `override_value` if given, else the draft's value, at the
    /// field's form key and marks it dirty. Accepting a field that is no
    /// longer open is a no-op, never an error: the draft may have been
    /// consumed by a concurrent action.
    pub fn accept_field(
        &mut self,
        field: ProductField,
        override_value: Option<Value>,
        form: &mut FormState,
    ) -> AcceptOutcome {
        if !self.remaining.contains(&field) {
            return AcceptOutcome::NoOp;
        }
        let Some(value) = override_value.or_else(|| self.proposed_value(field).cloned()) else {
            return AcceptOutcome::NoOp;
        };

        form.set_value(field.form_key(), value.clone(), SetOptions::user());
        self.remaining.remove(&field);
        self.revision += 1;
        AcceptOutcome::Applied { field, value }
    }

    /// Reject a proposal. Returns whether it was open.
    pub fn reject_field(&mut self, field: ProductField) -> bool {
        let removed = self.remaining.remove(&field);
        if removed {
            self.revision += 1;
        }
        removed
    }

    /// [`accept_field`](Self::accept_field) by content path.
    pub fn accept_path(
        &mut self,
        path: &str,
        override_value: Option<Value>,
        form: &mut FormState,
    ) -> Result<AcceptOutcome> {
        let field = ProductField::parse_content_path(path)?;
        Ok(self.accept_field(field, override_value, form))
    }

    /// [`reject_field`](Self::reject_field) by content path.
    pub fn reject_path(&mut self, path: &str) -> Result<bool> {
        let field = ProductField::parse_content_path(path)?;
        Ok(self.reject_field(field))
    }
}

fn proposals_in(draft: &ProductContent) -> BTreeSet<ProductField> {
    ProductField::ALL
        .into_iter()
        .filter(|f| f.is_draftable())
        .filter(|f| {
            f.content_path()
                .and_then(|path| draft.get_path(path))
                .is_some_and(|v| !is_blank(v))
        })
        .collect()
}
