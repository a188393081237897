use crate::utils::error::{QuotaError, Result};
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A product module that consumes a monthly quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Tool {
    Nutrition,
    Menus,
    Exports,
    Inventory,
    CostEntries,
    Recipes,
}

impl Tool {
    pub const ALL: [Tool; 6] = [
        Tool::Nutrition,
        Tool::Menus,
        Tool::Exports,
        Tool::Inventory,
        Tool::CostEntries,
        Tool::Recipes,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tool::Nutrition => "nutrition",
            Tool::Menus => "menus",
            Tool::Exports => "exports",
            Tool::Inventory => "inventory",
            Tool::CostEntries => "costEntries",
            Tool::Recipes => "recipes",
        }
    }

    /// Product label stored as the lead's interest.
    pub fn interest_label(&self) -> &'static str {
        match self {
            Tool::Nutrition => "naehrwertrechner",
            Tool::Menus => "speisekarten-designer",
            Tool::Exports => "speisekarten-export",
            Tool::Inventory => "lagerverwaltung",
            Tool::CostEntries => "kostenkontrolle",
            Tool::Recipes => "menueplaner",
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tool {
    type Err = QuotaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "nutrition" | "naehrwert" | "naehrwertrechner" => Ok(Tool::Nutrition),
            "menus" | "speisekarten" | "speisekartendesigner" => Ok(Tool::Menus),
            "exports" => Ok(Tool::Exports),
            "inventory" | "lagerverwaltung" => Ok(Tool::Inventory),
            "costentries" | "cost" | "kostenkontrolle" => Ok(Tool::CostEntries),
            "recipes" | "menuplan" | "menueplaner" => Ok(Tool::Recipes),
            _ => Err(QuotaError::InvalidValue {
                field: "tool".to_string(),
                value: s.to_string(),
                reason: format!(
                    "Supported tools: {}",
                    Tool::ALL.map(|t| t.as_str()).join(", ")
                ),
            }),
        }
    }
}

/// Subscription tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Free,
    Premium,
}

impl Plan {
    pub const ALL: [Plan; 2] = [Plan::Free, Plan::Premium];

    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Premium => "premium",
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Plan {
    type Err = QuotaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" => Ok(Plan::Free),
            "premium" => Ok(Plan::Premium),
            _ => Err(QuotaError::InvalidValue {
                field: "plan".to_string(),
                value: s.to_string(),
                reason: "Supported plans: free, premium".to_string(),
            }),
        }
    }
}

/// Calendar month bucket, always UTC. Serialized as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Period {
    year: i32,
    month: u32,
}

impl Period {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) || !(0..=9999).contains(&year) {
            return Err(QuotaError::InvalidPeriod {
                value: format!("{:04}-{:02}", year, month),
            });
        }
        Ok(Self { year, month })
    }

    pub fn current() -> Self {
        Self::from_datetime(Utc::now())
    }

    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self {
            year: at.year(),
            month: at.month(),
        }
    }
}

impl FromStr for Period {
    type Err = QuotaError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || QuotaError::InvalidPeriod {
            value: s.to_string(),
        };
        let bytes = s.as_bytes();
        if bytes.len() != 7 || bytes[4] != b'-' {
            return Err(invalid());
        }
        if !bytes[..4].iter().chain(&bytes[5..]).all(u8::is_ascii_digit) {
            return Err(invalid());
        }
        let year: i32 = s[..4].parse().map_err(|_| invalid())?;
        let month: u32 = s[5..].parse().map_err(|_| invalid())?;
        Period::new(year, month).map_err(|_| invalid())
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl Serialize for Period {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Period {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Per-period allowance. Serialized as a number or the string `"unlimited"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    Finite(u64),
    Unlimited,
}

impl Limit {
    /// A finite limit is reached once `count` equals it.
    pub fn is_exceeded_by(&self, count: u64) -> bool {
        match self {
            Limit::Finite(limit) => count >= *limit,
            Limit::Unlimited => false,
        }
    }

    pub fn remaining(&self, count: u64) -> Option<u64> {
        match self {
            Limit::Finite(limit) => Some(limit.saturating_sub(count)),
            Limit::Unlimited => None,
        }
    }

    pub fn is_unlimited(&self) -> bool {
        matches!(self, Limit::Unlimited)
    }
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Limit::Finite(limit) => write!(f, "{}", limit),
            Limit::Unlimited => f.write_str("unlimited"),
        }
    }
}

impl Serialize for Limit {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Limit::Finite(limit) => serializer.serialize_u64(*limit),
            Limit::Unlimited => serializer.serialize_str("unlimited"),
        }
    }
}

impl<'de> Deserialize<'de> for Limit {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawLimit {
            Number(u64),
            Text(String),
        }

        match RawLimit::deserialize(deserializer)? {
            RawLimit::Number(limit) => Ok(Limit::Finite(limit)),
            RawLimit::Text(text) if text.eq_ignore_ascii_case("unlimited") => Ok(Limit::Unlimited),
            RawLimit::Text(text) => Err(serde::de::Error::custom(format!(
                "expected a non-negative integer or \"unlimited\", got \"{}\"",
                text
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CounterKey {
    pub user_id: String,
    pub tool: Tool,
    pub period: Period,
}

impl CounterKey {
    pub fn new(user_id: impl Into<String>, tool: Tool, period: Period) -> Self {
        Self {
            user_id: user_id.into(),
            tool,
            period,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageCounter {
    pub user_id: String,
    pub tool: Tool,
    pub period: Period,
    pub count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UsageCheck {
    pub count: u64,
    pub limit: Limit,
    pub exceeded: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolUsage {
    pub tool: Tool,
    pub count: u64,
    pub limit: Limit,
    pub remaining: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSummary {
    pub user_id: String,
    pub plan: Plan,
    pub period: Period,
    pub tools: Vec<ToolUsage>,
}

/// Contact details copied onto a lead. Missing fields become empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub name: Option<String>,
    pub email: Option<String>,
    pub company: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadSource {
    FreemiumLimitReached,
    CrossSellInterest,
    ContactForm,
}

impl LeadSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadSource::FreemiumLimitReached => "freemium_limit_reached",
            LeadSource::CrossSellInterest => "cross_sell_interest",
            LeadSource::ContactForm => "contact_form",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeadStatus {
    New,
    Contacted,
    Converted,
}

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::New => "new",
            LeadStatus::Contacted => "contacted",
            LeadStatus::Converted => "converted",
        }
    }
}

impl FromStr for LeadStatus {
    type Err = QuotaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "new" => Ok(LeadStatus::New),
            "contacted" => Ok(LeadStatus::Contacted),
            "converted" => Ok(LeadStatus::Converted),
            _ => Err(QuotaError::InvalidValue {
                field: "status".to_string(),
                value: s.to_string(),
                reason: "Supported statuses: new, contacted, converted".to_string(),
            }),
        }
    }
}

/// A lead before the store assigns its id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLead {
    pub user_id: Option<String>,
    pub tool: Option<Tool>,
    pub name: String,
    pub email: String,
    pub company: String,
    pub phone: String,
    pub interest: String,
    pub message: Option<String>,
    pub source: LeadSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadRecord {
    pub id: u64,
    pub user_id: Option<String>,
    pub tool: Option<Tool>,
    pub name: String,
    pub email: String,
    pub company: String,
    pub phone: String,
    pub interest: String,
    pub message: Option<String>,
    pub source: LeadSource,
    pub status: LeadStatus,
    pub created_at: DateTime<Utc>,
}

impl LeadRecord {
    pub fn from_new(id: u64, lead: NewLead, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id: lead.user_id,
            tool: lead.tool,
            name: lead.name,
            email: lead.email,
            company: lead.company,
            phone: lead.phone,
            interest: lead.interest,
            message: lead.message,
            source: lead.source,
            status: LeadStatus::New,
            created_at,
        }
    }
}

/// Result of an insert-if-absent on the (user, tool) lead key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeadInsert {
    Inserted(LeadRecord),
    Existing(LeadRecord),
}
