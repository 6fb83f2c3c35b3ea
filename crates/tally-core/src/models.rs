//! Domain models for Tally

use std::collections::HashSet;
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};
use crate::ids::IdGenerator;

/// Largest magnitude accepted from the wire, in minor units (ten trillion pounds)
const MAX_WIRE_MINOR: f64 = 1e15;

/// A signed amount of money in minor units (pence)
///
/// Arithmetic is exact. On the JSON wire an amount is a number in major units,
/// so `1234.5` is £1,234.50. Whole amounts serialize as integers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    pub const fn from_major(major: i64) -> Self {
        Self(major * 100)
    }

    /// Convert a major-unit float, rounding half away from zero to the nearest penny.
    ///
    /// Returns `None` for NaN, infinities and absurdly large values.
    pub fn from_major_f64(major: f64) -> Option<Self> {
        if !major.is_finite() {
            return None;
        }
        let minor = (major * 100.0).round();
        if minor.abs() > MAX_WIRE_MINOR {
            return None;
        }
        Some(Self(minor as i64))
    }

    pub const fn minor(self) -> i64 {
        self.0
    }

    pub fn as_major_f64(self) -> f64 {
        self.0 as f64 / 100.0
    }

    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub fn checked_add(self, rhs: Money) -> Option<Money> {
        self.0.checked_add(rhs.0).map(Money)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Money {
        iter.copied().sum()
    }
}

impl fmt::Display for Money {
    /// Formats as `£1,234.50`, or `-£12.00` for negative amounts
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let pounds = (abs / 100).to_string();
        let pence = abs % 100;

        let mut grouped = String::with_capacity(pounds.len() + pounds.len() / 3);
        for (i, ch) in pounds.chars().enumerate() {
            if i > 0 && (pounds.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(ch);
        }

        write!(f, "{}£{}.{:02}", sign, grouped, pence)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if self.0 % 100 == 0 {
            serializer.serialize_i64(self.0 / 100)
        } else {
            serializer.serialize_f64(self.as_major_f64())
        }
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct MoneyVisitor;

        impl<'de> de::Visitor<'de> for MoneyVisitor {
            type Value = Money;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an amount in major currency units")
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Money, E> {
                v.checked_mul(100)
                    .filter(|minor| (*minor as f64).abs() <= MAX_WIRE_MINOR)
                    .map(Money)
                    .ok_or_else(|| E::custom(format!("amount out of range: {}", v)))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Money, E> {
                let v = i64::try_from(v)
                    .map_err(|_| E::custom(format!("amount out of range: {}", v)))?;
                self.visit_i64(v)
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<Money, E> {
                Money::from_major_f64(v)
                    .ok_or_else(|| E::custom(format!("amount out of range: {}", v)))
            }

            // Form inputs sometimes arrive as strings; an empty field means zero
            fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Money, E> {
                let v = v.trim();
                if v.is_empty() {
                    return Ok(Money::ZERO);
                }
                let parsed: f64 = v
                    .parse()
                    .map_err(|_| E::custom(format!("invalid amount: {:?}", v)))?;
                self.visit_f64(parsed)
            }

            fn visit_unit<E: de::Error>(self) -> std::result::Result<Money, E> {
                Ok(Money::ZERO)
            }
        }

        deserializer.deserialize_any(MoneyVisitor)
    }
}

/// A calendar month (year + month), written as `YYYY-MM`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BudgetMonth {
    year: i32,
    month: u32,
}

impl BudgetMonth {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=9999).contains(&year) || !(1..=12).contains(&month) {
            return Err(Error::InvalidData(format!(
                "Invalid month: {}-{:02}",
                year, month
            )));
        }
        Ok(Self { year, month })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn first_day(&self) -> NaiveDate {
        // Always valid: fields are range-checked on construction
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    /// Human-readable label, e.g. "May 2024"
    pub fn label(&self) -> String {
        self.first_day().format("%B %Y").to_string()
    }
}

impl FromStr for BudgetMonth {
    type Err = Error;

    /// Accepts `YYYY-MM`, `YYYY-MM-DD` and RFC 3339 timestamps
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();

        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Self::new(dt.year(), dt.month());
        }
        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Self::new(date.year(), date.month());
        }
        if let Some((year, month)) = s.split_once('-') {
            if let (Ok(year), Ok(month)) = (year.parse::<i32>(), month.parse::<u32>()) {
                return Self::new(year, month);
            }
        }

        Err(Error::InvalidData(format!("Invalid month: {:?}", s)))
    }
}

impl fmt::Display for BudgetMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl Serialize for BudgetMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BudgetMonth {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// A discretionary spending line for the month
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub amount: Money,
}

/// A one-off credit card payment for the month
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repayment {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub amount: Money,
}

/// One entry of the monthly transfer checklist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferItem {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub amount: Money,
    #[serde(default)]
    pub completed: bool,
}

impl TransferItem {
    /// A new, not yet completed checklist entry
    pub fn pending(id: impl Into<String>, description: impl Into<String>, amount: Money) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            amount,
            completed: false,
        }
    }
}

/// One month's budget
///
/// Field names are camelCase on the wire. Missing amounts default to zero and
/// missing text to empty; only `month` is required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default)]
    pub aim: String,
    pub month: BudgetMonth,
    #[serde(default)]
    pub wages: Money,
    #[serde(default)]
    pub mortgage: Money,
    #[serde(default)]
    pub bills: Money,
    #[serde(default)]
    pub travel: Money,
    #[serde(default)]
    pub groceries: Money,
    #[serde(default)]
    pub barclaycard: Money,
    #[serde(default)]
    pub monzo_flex: Money,
    #[serde(default)]
    pub amex: Money,
    #[serde(default)]
    pub amount_to_save: Money,
    #[serde(default)]
    pub previous_month_reflection: String,
    #[serde(default)]
    pub upcoming_calendar_notes: String,
    #[serde(default)]
    pub events: Vec<Event>,
    #[serde(default)]
    pub one_off_repayments: Vec<Repayment>,
    #[serde(default)]
    pub transfers: Vec<TransferItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl BudgetRecord {
    /// An empty, unsaved budget for the given month
    pub fn new(month: BudgetMonth) -> Self {
        Self {
            id: None,
            aim: String::new(),
            month,
            wages: Money::ZERO,
            mortgage: Money::ZERO,
            bills: Money::ZERO,
            travel: Money::ZERO,
            groceries: Money::ZERO,
            barclaycard: Money::ZERO,
            monzo_flex: Money::ZERO,
            amex: Money::ZERO,
            amount_to_save: Money::ZERO,
            previous_month_reflection: String::new(),
            upcoming_calendar_notes: String::new(),
            events: Vec::new(),
            one_off_repayments: Vec::new(),
            transfers: Vec::new(),
            created_at: None,
            updated_at: None,
        }
    }

    /// Check that every amount is non-negative, the totals stay in range and ids are unique
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("wages", self.wages),
            ("mortgage", self.mortgage),
            ("bills", self.bills),
            ("travel", self.travel),
            ("groceries", self.groceries),
            ("barclaycard", self.barclaycard),
            ("monzoFlex", self.monzo_flex),
            ("amex", self.amex),
            ("amountToSave", self.amount_to_save),
        ];
        if let Some((name, _)) = fields.iter().find(|(_, amount)| amount.is_negative()) {
            return Err(Error::InvalidData(format!("{} must not be negative", name)));
        }
        if let Some(event) = self.events.iter().find(|e| e.amount.is_negative()) {
            return Err(Error::InvalidData(format!(
                "event {:?} amount must not be negative",
                event.name
            )));
        }
        if let Some(repayment) = self.one_off_repayments.iter().find(|r| r.amount.is_negative()) {
            return Err(Error::InvalidData(format!(
                "repayment {:?} amount must not be negative",
                repayment.name
            )));
        }
        if let Some(item) = self.transfers.iter().find(|t| t.amount.is_negative()) {
            return Err(Error::InvalidData(format!(
                "transfer {:?} amount must not be negative",
                item.id
            )));
        }

        // Every total the summary derives is bounded by this one
        let total = fields
            .iter()
            .map(|(_, amount)| *amount)
            .chain(self.events.iter().map(|e| e.amount))
            .chain(self.one_off_repayments.iter().map(|r| r.amount))
            .try_fold(Money::ZERO, Money::checked_add)
            .filter(|total| total.minor() as f64 <= MAX_WIRE_MINOR);
        if total.is_none() {
            return Err(Error::InvalidData(
                "Budget amounts add up to more than can be tracked".to_string(),
            ));
        }

        if let Some(id) = first_duplicate(self.events.iter().map(|e| e.id.as_str())) {
            return Err(Error::InvalidData(format!("duplicate event id {:?}", id)));
        }
        if let Some(id) = first_duplicate(self.one_off_repayments.iter().map(|r| r.id.as_str())) {
            return Err(Error::InvalidData(format!("duplicate repayment id {:?}", id)));
        }
        Ok(())
    }

    /// Append a new event with a freshly generated id
    pub fn with_event(mut self, name: impl Into<String>, amount: Money, ids: &dyn IdGenerator) -> Self {
        self.events.push(Event {
            id: ids.next_id(),
            name: name.into(),
            amount,
        });
        self
    }

    pub fn without_event(mut self, id: &str) -> Result<Self> {
        let index = position_of(&self.events, |e| e.id == id, "Event", id)?;
        self.events.remove(index);
        Ok(self)
    }

    pub fn with_event_updated(
        mut self,
        id: &str,
        name: impl Into<String>,
        amount: Money,
    ) -> Result<Self> {
        let index = position_of(&self.events, |e| e.id == id, "Event", id)?;
        let event = &mut self.events[index];
        event.name = name.into();
        event.amount = amount;
        Ok(self)
    }

    /// Append a new one-off repayment with a freshly generated id
    pub fn with_repayment(
        mut self,
        name: impl Into<String>,
        amount: Money,
        ids: &dyn IdGenerator,
    ) -> Self {
        self.one_off_repayments.push(Repayment {
            id: ids.next_id(),
            name: name.into(),
            amount,
        });
        self
    }

    pub fn without_repayment(mut self, id: &str) -> Result<Self> {
        let index = position_of(&self.one_off_repayments, |r| r.id == id, "Repayment", id)?;
        self.one_off_repayments.remove(index);
        Ok(self)
    }

    pub fn with_repayment_updated(
        mut self,
        id: &str,
        name: impl Into<String>,
        amount: Money,
    ) -> Result<Self> {
        let index = position_of(&self.one_off_repayments, |r| r.id == id, "Repayment", id)?;
        let repayment = &mut self.one_off_repayments[index];
        repayment.name = name.into();
        repayment.amount = amount;
        Ok(self)
    }

    /// Give every event and repayment without an id a generated one
    pub fn with_assigned_ids(mut self, ids: &dyn IdGenerator) -> Self {
        for event in self.events.iter_mut().filter(|e| e.id.trim().is_empty()) {
            event.id = ids.next_id();
        }
        for repayment in self
            .one_off_repayments
            .iter_mut()
            .filter(|r| r.id.trim().is_empty())
        {
            repayment.id = ids.next_id();
        }
        self
    }

    pub fn with_transfers(mut self, transfers: Vec<TransferItem>) -> Self {
        self.transfers = transfers;
        self
    }

    /// Set the completion flag of one checklist item
    pub fn with_transfer_completed(mut self, id: &str, completed: bool) -> Result<Self> {
        let index = position_of(&self.transfers, |t| t.id == id, "Transfer item", id)?;
        self.transfers[index].completed = completed;
        Ok(self)
    }
}

fn position_of<T>(items: &[T], matches: impl Fn(&T) -> bool, kind: &str, id: &str) -> Result<usize> {
    items
        .iter()
        .position(matches)
        .ok_or_else(|| Error::NotFound(format!("{} {} not found", kind, id)))
}

/// Audit log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub user_email: String,
    pub action: String,
    pub entity_type: Option<String>,
    pub entity_id: Option<i64>,
    pub details: Option<String>,
}

/// First non-blank id that appears more than once
fn first_duplicate<'a>(ids: impl Iterator<Item = &'a str>) -> Option<&'a str> {
    let mut seen = HashSet::new();
    ids.filter(|id| !id.trim().is_empty())
        .find(|id| !seen.insert(*id))
}
