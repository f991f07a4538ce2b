use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Only currency the board settles in.
pub const CURRENCY: &str = "USD";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentType {
    Monetary,
    InKind,
    Hybrid,
}

impl PaymentType {
    pub const ALL: [PaymentType; 3] = [PaymentType::Monetary, PaymentType::InKind, PaymentType::Hybrid];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::Monetary => "MONETARY",
            PaymentType::InKind => "IN_KIND",
            PaymentType::Hybrid => "HYBRID",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "MONETARY" => Some(PaymentType::Monetary),
            "IN_KIND" => Some(PaymentType::InKind),
            "HYBRID" => Some(PaymentType::Hybrid),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PaymentType::Monetary => "Cash Payment",
            PaymentType::InKind => "Trade/Barter",
            PaymentType::Hybrid => "Cash + Trade",
        }
    }

    pub fn needs_amount(&self) -> bool {
        matches!(self, PaymentType::Monetary | PaymentType::Hybrid)
    }

    pub fn needs_in_kind(&self) -> bool {
        matches!(self, PaymentType::InKind | PaymentType::Hybrid)
    }
}

/// Commercial terms shared by jobs (their budget) and offers (the proposal).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentTerms {
    pub payment_type: PaymentType,
    pub amount_cents: Option<i64>,
    pub in_kind_description: Option<String>,
}

impl PaymentTerms {
    pub fn monetary(amount_cents: i64) -> Self {
        Self {
            payment_type: PaymentType::Monetary,
            amount_cents: Some(amount_cents),
            in_kind_description: None,
        }
    }

    pub fn in_kind(description: impl Into<String>) -> Self {
        Self {
            payment_type: PaymentType::InKind,
            amount_cents: None,
            in_kind_description: Some(description.into()),
        }
    }

    pub fn hybrid(amount_cents: i64, description: impl Into<String>) -> Self {
        Self {
            payment_type: PaymentType::Hybrid,
            amount_cents: Some(amount_cents),
            in_kind_description: Some(description.into()),
        }
    }

    /// Checks the fields the payment type mandates and drops the ones it
    /// doesn't use, so a cash offer never carries a stale barter note.
    pub fn normalized(self, amount_field: &'static str) -> Result<Self, ValidationError> {
        let in_kind_description = self
            .in_kind_description
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let amount_cents = if self.payment_type.needs_amount() {
            match self.amount_cents {
                None => return Err(ValidationError::missing(amount_field)),
                Some(c) if c <= 0 => {
                    return Err(ValidationError::invalid(amount_field, "must be greater than zero"))
                }
                Some(c) => Some(c),
            }
        } else {
            None
        };

        let in_kind_description = if self.payment_type.needs_in_kind() {
            match in_kind_description {
                None => return Err(ValidationError::missing("in_kind_description")),
                some => some,
            }
        } else {
            None
        };

        Ok(Self {
            payment_type: self.payment_type,
            amount_cents,
            in_kind_description,
        })
    }

    /// One-line rendering for notices and the timeline.
    pub fn summary(&self) -> String {
        let cash = self.amount_cents.map(format_usd);
        let trade = self.in_kind_description.as_deref();
        match (self.payment_type, cash, trade) {
            (PaymentType::Hybrid, Some(cash), Some(trade)) => format!("{cash} + {trade}"),
            (PaymentType::InKind, _, Some(trade)) => format!("trade: {trade}"),
            (_, Some(cash), _) => cash,
            (_, None, Some(trade)) => format!("trade: {trade}"),
            (payment_type, None, None) => payment_type.label().to_string(),
        }
    }
}

/// Renders cents as a dollar string, e.g. `4500` -> `$45.00`.
pub fn format_usd(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.abs();
    format!("{sign}${}.{:02}", cents / 100, cents % 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monetary_without_amount_is_rejected() {
        let terms = PaymentTerms {
            payment_type: PaymentType::Monetary,
            amount_cents: None,
            in_kind_description: None,
        };
        assert_eq!(
            terms.normalized("amount_cents"),
            Err(ValidationError::missing("amount_cents"))
        );
    }

    #[test]
    fn hybrid_needs_both_components() {
        let missing_barter = PaymentTerms {
            payment_type: PaymentType::Hybrid,
            amount_cents: Some(2500),
            in_kind_description: Some("   ".into()),
        };
        assert_eq!(
            missing_barter.normalized("budget_cents"),
            Err(ValidationError::missing("in_kind_description"))
        );

        let ok = PaymentTerms::hybrid(2500, " 3D printing credit ")
            .normalized("budget_cents")
            .unwrap();
        assert_eq!(ok.in_kind_description.as_deref(), Some("3D printing credit"));
    }

    #[test]
    fn unused_components_are_dropped() {
        let terms = PaymentTerms {
            payment_type: PaymentType::InKind,
            amount_cents: Some(100),
            in_kind_description: Some("plywood".into()),
        }
        .normalized("amount_cents")
        .unwrap();
        assert_eq!(terms.amount_cents, None);
    }

    #[test]
    fn zero_amount_is_invalid() {
        let err = PaymentTerms::monetary(0).normalized("amount_cents").unwrap_err();
        assert!(matches!(err, ValidationError::InvalidField { field: "amount_cents", .. }));
    }

    #[test]
    fn formats_dollars() {
        assert_eq!(format_usd(4500), "$45.00");
        assert_eq!(format_usd(705), "$7.05");
    }

    #[test]
    fn summary_names_both_components_of_a_hybrid() {
        assert_eq!(PaymentTerms::hybrid(2500, "filament").summary(), "$25.00 + filament");
        assert_eq!(PaymentTerms::in_kind("pizza").summary(), "trade: pizza");
        assert_eq!(PaymentTerms::monetary(4500).summary(), "$45.00");
    }
}
