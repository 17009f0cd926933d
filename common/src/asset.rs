//! Asset records tracked in a user's portfolio.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{AssetId, Currency, FolioError, Money, Timestamp, UserId};

/// Kind of holding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AssetType {
    Stock,
    Etf,
    RealEstate,
    Cash,
    Crypto,
    Bond,
    Other,
    /// Israeli provident fund.
    Gemel,
    /// Israeli money-market fund.
    Kaspit,
}

impl AssetType {
    pub const ALL: [AssetType; 9] = [
        AssetType::Stock,
        AssetType::Etf,
        AssetType::RealEstate,
        AssetType::Cash,
        AssetType::Crypto,
        AssetType::Bond,
        AssetType::Other,
        AssetType::Gemel,
        AssetType::Kaspit,
    ];

    /// Stable key, matching the serialized form.
    pub fn key(&self) -> &'static str {
        match self {
            AssetType::Stock => "stock",
            AssetType::Etf => "etf",
            AssetType::RealEstate => "realEstate",
            AssetType::Cash => "cash",
            AssetType::Crypto => "crypto",
            AssetType::Bond => "bond",
            AssetType::Other => "other",
            AssetType::Gemel => "gemel",
            AssetType::Kaspit => "kaspit",
        }
    }

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            AssetType::Stock => "Stocks",
            AssetType::Etf => "ETFs",
            AssetType::RealEstate => "Real Estate",
            AssetType::Cash => "Cash",
            AssetType::Crypto => "Crypto",
            AssetType::Bond => "Bonds",
            AssetType::Other => "Other",
            AssetType::Gemel => "Gemel",
            AssetType::Kaspit => "Kaspit",
        }
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl FromStr for AssetType {
    type Err = FolioError;

    /// Parse a key, ignoring case (`realestate` is `realEstate`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|t| t.key().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| FolioError::invalid_field("type", format!("unknown asset type: {}", s)))
    }
}

/// Risk classification chosen by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub const ALL: [RiskLevel; 3] = [RiskLevel::Low, RiskLevel::Medium, RiskLevel::High];

    /// Stable key, matching the serialized form.
    pub fn key(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low Risk",
            RiskLevel::Medium => "Medium Risk",
            RiskLevel::High => "High Risk",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl FromStr for RiskLevel {
    type Err = FolioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|r| r.key().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                FolioError::invalid_field("risk_level", format!("unknown risk level: {}", s))
            })
    }
}

/// How often a recurring contribution is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecurringFrequency {
    Weekly,
    Monthly,
    Quarterly,
    Annually,
}

/// A stored asset record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: AssetId,
    /// Owning user; stores only ever return a user's own records.
    pub owner: UserId,
    pub name: String,
    #[serde(rename = "type")]
    pub asset_type: AssetType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticker: Option<String>,
    /// Current value in `currency`.
    pub value: f64,
    pub currency: Currency,
    pub location: String,
    pub risk_level: RiskLevel,
    /// Annual yield in percent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annual_yield: Option<f64>,
    #[serde(default)]
    pub has_recurring_contribution: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurring_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurring_frequency: Option<RecurringFrequency>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub managing_institution: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Asset {
    /// Create a stored record from user input.
    pub fn from_new(owner: UserId, new: NewAsset) -> Self {
        let now = crate::now();
        Self {
            id: AssetId::new(),
            owner,
            name: new.name,
            asset_type: new.asset_type,
            ticker: new.ticker,
            value: new.value,
            currency: new.currency,
            location: new.location,
            risk_level: new.risk_level,
            annual_yield: new.annual_yield,
            has_recurring_contribution: new.has_recurring_contribution,
            recurring_amount: new.recurring_amount,
            recurring_frequency: new.recurring_frequency,
            notes: new.notes,
            managing_institution: new.managing_institution,
            created_at: now,
            updated_at: now,
        }
    }

    /// The asset's value as a currency-tagged amount.
    pub fn money(&self) -> Money {
        Money::new(self.value, self.currency)
    }

    /// Apply a partial update and bump `updated_at`.
    pub fn apply(&mut self, patch: AssetPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(asset_type) = patch.asset_type {
            self.asset_type = asset_type;
        }
        if let Some(ticker) = patch.ticker {
            self.ticker = ticker;
        }
        if let Some(value) = patch.value {
            self.value = value;
        }
        if let Some(currency) = patch.currency {
            self.currency = currency;
        }
        if let Some(location) = patch.location {
            self.location = location;
        }
        if let Some(risk_level) = patch.risk_level {
            self.risk_level = risk_level;
        }
        if let Some(annual_yield) = patch.annual_yield {
            self.annual_yield = annual_yield;
        }
        if let Some(flag) = patch.has_recurring_contribution {
            self.has_recurring_contribution = flag;
        }
        if let Some(amount) = patch.recurring_amount {
            self.recurring_amount = amount;
        }
        if let Some(frequency) = patch.recurring_frequency {
            self.recurring_frequency = frequency;
        }
        if let Some(notes) = patch.notes {
            self.notes = notes;
        }
        if let Some(institution) = patch.managing_institution {
            self.managing_institution = institution;
        }
        self.updated_at = crate::now().max(self.created_at);
    }

    /// Validate field contents.
    pub fn validate(&self) -> Result<(), FolioError> {
        validate_fields(&self.name, self.value, self.recurring_amount)
    }
}

/// User input for a new asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAsset {
    pub name: String,
    #[serde(rename = "type")]
    pub asset_type: AssetType,
    #[serde(default)]
    pub ticker: Option<String>,
    pub value: f64,
    pub currency: Currency,
    pub location: String,
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub annual_yield: Option<f64>,
    #[serde(default)]
    pub has_recurring_contribution: bool,
    #[serde(default)]
    pub recurring_amount: Option<f64>,
    #[serde(default)]
    pub recurring_frequency: Option<RecurringFrequency>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub managing_institution: Option<String>,
}

impl NewAsset {
    /// Create input with the required fields; optional fields start empty.
    pub fn new(
        name: impl Into<String>,
        asset_type: AssetType,
        value: f64,
        currency: Currency,
        location: impl Into<String>,
        risk_level: RiskLevel,
    ) -> Self {
        Self {
            name: name.into(),
            asset_type,
            ticker: None,
            value,
            currency,
            location: location.into(),
            risk_level,
            annual_yield: None,
            has_recurring_contribution: false,
            recurring_amount: None,
            recurring_frequency: None,
            notes: None,
            managing_institution: None,
        }
    }

    /// Set the annual yield in percent.
    pub fn with_yield(mut self, annual_yield: f64) -> Self {
        self.annual_yield = Some(annual_yield);
        self
    }

    /// Set the managing institution.
    pub fn with_institution(mut self, institution: impl Into<String>) -> Self {
        self.managing_institution = Some(institution.into());
        self
    }

    /// Validate field contents.
    pub fn validate(&self) -> Result<(), FolioError> {
        validate_fields(&self.name, self.value, self.recurring_amount)
    }
}

/// Partial update; `None` leaves a field unchanged.
///
/// Optional fields use a nested `Option` so they can be cleared.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssetPatch {
    pub name: Option<String>,
    pub asset_type: Option<AssetType>,
    pub ticker: Option<Option<String>>,
    pub value: Option<f64>,
    pub currency: Option<Currency>,
    pub location: Option<String>,
    pub risk_level: Option<RiskLevel>,
    pub annual_yield: Option<Option<f64>>,
    pub has_recurring_contribution: Option<bool>,
    pub recurring_amount: Option<Option<f64>>,
    pub recurring_frequency: Option<Option<RecurringFrequency>>,
    pub notes: Option<Option<String>>,
    pub managing_institution: Option<Option<String>>,
}

fn validate_fields(name: &str, value: f64, recurring_amount: Option<f64>) -> Result<(), FolioError> {
    if name.trim().is_empty() {
        return Err(FolioError::invalid_field("name", "name cannot be empty"));
    }
    if !value.is_finite() || value < 0.0 {
        return Err(FolioError::invalid_field(
            "value",
            "value must be a non-negative number",
        ));
    }
    if let Some(amount) = recurring_amount {
        if !amount.is_finite() || amount < 0.0 {
            return Err(FolioError::invalid_field(
                "recurring_amount",
                "recurring amount must be a non-negative number",
            ));
        }
    }
    Ok(())
}
