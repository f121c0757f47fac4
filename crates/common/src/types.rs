//! Common types used across StratX
//!
//! This module provides the fundamental domain types of a multi-leg
//! strategy: the legs themselves, the instruments they reference, and the
//! loosely-typed records instruments arrive as from upstream feeds.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::Error;

/// Settlement time applied to date-only expiries (15:30 IST).
pub const EXPIRY_SETTLEMENT_HOUR_UTC: u32 = 10;

/// Unique identifier for strategy legs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LegId(pub Uuid);

impl LegId {
    /// Create a new random LegId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a LegId from an existing UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for LegId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LegId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position direction of a leg
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Long the instrument
    #[serde(alias = "buy", alias = "BUY", alias = "B")]
    Buy,
    /// Short the instrument
    #[serde(alias = "sell", alias = "SELL", alias = "S")]
    Sell,
}

impl Side {
    /// Sign applied to per-unit P&L and Greeks: +1 long, -1 short
    pub fn direction(&self) -> f64 {
        match self {
            Side::Buy => 1.0,
            Side::Sell => -1.0,
        }
    }

    /// Returns the opposite side
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// Single-letter code used in concise leg labels
    pub fn code(&self) -> &'static str {
        match self {
            Side::Buy => "B",
            Side::Sell => "S",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "Buy"),
            Side::Sell => write!(f, "Sell"),
        }
    }
}

/// Type of option: CE (call) or PE (put).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptionType {
    /// Call option
    #[serde(rename = "CE", alias = "call", alias = "CALL")]
    Call,
    /// Put option
    #[serde(rename = "PE", alias = "put", alias = "PUT")]
    Put,
}

impl OptionType {
    /// Exchange code for the option type.
    pub fn code(&self) -> &'static str {
        match self {
            OptionType::Call => "CE",
            OptionType::Put => "PE",
        }
    }

    /// Parse from an exchange or plain-English code.
    pub fn from_code(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "CE" | "C" | "CALL" => Some(OptionType::Call),
            "PE" | "P" | "PUT" => Some(OptionType::Put),
            _ => None,
        }
    }

    /// Payoff of one unit at settlement price `spot`.
    pub fn intrinsic(&self, spot: f64, strike: f64) -> f64 {
        match self {
            OptionType::Call => (spot - strike).max(0.0),
            OptionType::Put => (strike - spot).max(0.0),
        }
    }
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// What a leg holds. Options carry the strike and type chosen in the builder.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "leg_type", rename_all = "lowercase")]
pub enum LegKind {
    Option { strike: f64, option_type: OptionType },
    Future,
}

impl LegKind {
    pub fn is_option(&self) -> bool {
        matches!(self, LegKind::Option { .. })
    }

    pub fn is_future(&self) -> bool {
        matches!(self, LegKind::Future)
    }

    pub fn strike(&self) -> Option<f64> {
        match self {
            LegKind::Option { strike, .. } => Some(*strike),
            LegKind::Future => None,
        }
    }

    pub fn option_type(&self) -> Option<OptionType> {
        match self {
            LegKind::Option { option_type, .. } => Some(*option_type),
            LegKind::Future => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LegKind::Option { .. } => "option",
            LegKind::Future => "future",
        }
    }
}

fn default_count() -> u32 {
    1
}

fn default_selected() -> bool {
    true
}

/// One buy/sell position of a strategy.
///
/// Legs are owned by the caller; every analytic takes them by shared
/// reference and never mutates them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leg {
    #[serde(default)]
    pub id: LegId,
    #[serde(flatten)]
    pub kind: LegKind,
    pub side: Side,
    /// Instrument identifier resolvable through an [`InstrumentLookup`](crate::InstrumentLookup)
    pub token: String,
    /// Entry price per unit
    pub price: f64,
    /// Number of lots
    #[serde(default = "default_count")]
    pub lots: u32,
    /// Contract size of one lot
    #[serde(default = "default_count")]
    pub lot_size: u32,
    /// Unselected legs are ignored by every calculation
    #[serde(default = "default_selected")]
    pub selected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
}

impl Leg {
    /// Create a selected single-lot option leg
    pub fn option(
        side: Side,
        token: impl Into<String>,
        strike: f64,
        option_type: OptionType,
        price: f64,
    ) -> Self {
        Self {
            id: LegId::new(),
            kind: LegKind::Option { strike, option_type },
            side,
            token: token.into(),
            price,
            lots: 1,
            lot_size: 1,
            selected: true,
            symbol: None,
        }
    }

    /// Create a selected single-lot future leg
    pub fn future(side: Side, token: impl Into<String>, price: f64) -> Self {
        Self {
            id: LegId::new(),
            kind: LegKind::Future,
            side,
            token: token.into(),
            price,
            lots: 1,
            lot_size: 1,
            selected: true,
            symbol: None,
        }
    }

    pub fn with_lots(mut self, lots: u32) -> Self {
        self.lots = lots;
        self
    }

    pub fn with_lot_size(mut self, lot_size: u32) -> Self {
        self.lot_size = lot_size;
        self
    }

    pub fn with_selected(mut self, selected: bool) -> Self {
        self.selected = selected;
        self
    }

    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    /// +1 for long legs, -1 for short legs
    pub fn direction(&self) -> f64 {
        self.side.direction()
    }

    /// Lots, floored at one
    pub fn lots_or_one(&self) -> u32 {
        self.lots.max(1)
    }

    /// Lot size, floored at one
    pub fn lot_size_or_one(&self) -> u32 {
        self.lot_size.max(1)
    }

    /// Units held: lots x lot size, each floored at one
    pub fn quantity(&self) -> f64 {
        self.lots_or_one() as f64 * self.lot_size_or_one() as f64
    }

    /// Entry price when it is a usable number
    pub fn entry_price(&self) -> Option<f64> {
        self.price.is_finite().then_some(self.price)
    }

    /// Selected and resolvable
    pub fn is_active(&self) -> bool {
        self.selected && !self.token.is_empty()
    }

    pub fn strike(&self) -> Option<f64> {
        self.kind.strike()
    }

    pub fn option_type(&self) -> Option<OptionType> {
        self.kind.option_type()
    }
}

/// Snapshot of a listed option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionInstrument {
    pub strike: f64,
    pub expiry: DateTime<Utc>,
    pub option_type: OptionType,
    #[serde(default)]
    pub last_price: Option<f64>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub underlying: Option<String>,
    /// Market implied volatility in percent (e.g. 14.5)
    #[serde(default)]
    pub iv: Option<f64>,
    /// Open interest
    #[serde(default)]
    pub oi: Option<f64>,
    #[serde(default)]
    pub lot_size: Option<u32>,
}

/// Snapshot of a listed future.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FutureInstrument {
    /// Missing expiry means the future is priced at spot
    #[serde(default)]
    pub expiry: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_price: Option<f64>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub underlying: Option<String>,
    #[serde(default)]
    pub lot_size: Option<u32>,
}

/// Instrument details resolved for a token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "leg_type_db", rename_all = "lowercase")]
pub enum InstrumentDetails {
    Option(OptionInstrument),
    Future(FutureInstrument),
}

impl InstrumentDetails {
    pub fn as_option(&self) -> Option<&OptionInstrument> {
        match self {
            InstrumentDetails::Option(o) => Some(o),
            InstrumentDetails::Future(_) => None,
        }
    }

    pub fn as_future(&self) -> Option<&FutureInstrument> {
        match self {
            InstrumentDetails::Future(f) => Some(f),
            InstrumentDetails::Option(_) => None,
        }
    }

    /// True when the instrument is of the kind the leg expects
    pub fn matches(&self, kind: &LegKind) -> bool {
        matches!(
            (self, kind),
            (InstrumentDetails::Option(_), LegKind::Option { .. })
                | (InstrumentDetails::Future(_), LegKind::Future)
        )
    }

    pub fn kind_str(&self) -> &'static str {
        match self {
            InstrumentDetails::Option(_) => "option",
            InstrumentDetails::Future(_) => "future",
        }
    }

    pub fn last_price(&self) -> Option<f64> {
        match self {
            InstrumentDetails::Option(o) => o.last_price,
            InstrumentDetails::Future(f) => f.last_price,
        }
        .filter(|p| p.is_finite())
    }

    pub fn expiry(&self) -> Option<DateTime<Utc>> {
        match self {
            InstrumentDetails::Option(o) => Some(o.expiry),
            InstrumentDetails::Future(f) => f.expiry,
        }
    }

    pub fn symbol(&self) -> Option<&str> {
        match self {
            InstrumentDetails::Option(o) => o.symbol.as_deref(),
            InstrumentDetails::Future(f) => f.symbol.as_deref(),
        }
    }

    pub fn underlying(&self) -> Option<&str> {
        match self {
            InstrumentDetails::Option(o) => o.underlying.as_deref(),
            InstrumentDetails::Future(f) => f.underlying.as_deref(),
        }
    }

    pub fn lot_size(&self) -> Option<u32> {
        match self {
            InstrumentDetails::Option(o) => o.lot_size,
            InstrumentDetails::Future(f) => f.lot_size,
        }
    }

    /// Short display name used in leg tables, e.g. `23000CE 30MAY` or `MAY FUT`
    pub fn display_name(&self) -> String {
        match self {
            InstrumentDetails::Option(o) => format!(
                "{}{} {}",
                o.strike,
                o.option_type.code(),
                expiry_label(&o.expiry)
            ),
            InstrumentDetails::Future(f) => match (&f.symbol, &f.expiry) {
                (Some(symbol), _) => symbol.clone(),
                (None, Some(expiry)) => {
                    format!("{} FUT", expiry.format("%b").to_string().to_uppercase())
                }
                (None, None) => "FUT".to_string(),
            },
        }
    }
}

/// Instrument as delivered by an upstream feed, every field optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstrumentRecord {
    pub token: String,
    #[serde(default)]
    pub leg_type_db: Option<String>,
    #[serde(default)]
    pub strike: Option<f64>,
    #[serde(default)]
    pub expiry: Option<String>,
    #[serde(default)]
    pub expiry_date: Option<String>,
    #[serde(default)]
    pub option_type: Option<String>,
    #[serde(default)]
    pub last_price: Option<f64>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub underlying: Option<String>,
    #[serde(default)]
    pub iv: Option<f64>,
    #[serde(default)]
    pub oi: Option<f64>,
    #[serde(default)]
    pub lot_size: Option<u32>,
}

impl TryFrom<&InstrumentRecord> for InstrumentDetails {
    type Error = Error;

    fn try_from(record: &InstrumentRecord) -> Result<Self, Self::Error> {
        let kind = record
            .leg_type_db
            .as_deref()
            .map(|k| k.trim().to_lowercase())
            .ok_or_else(|| Error::invalid_record(&record.token, "leg_type_db is missing"))?;

        match kind.as_str() {
            "option" => {
                let strike = record
                    .strike
                    .filter(|s| s.is_finite() && *s > 0.0)
                    .ok_or_else(|| {
                        Error::invalid_record(&record.token, "strike is missing or not positive")
                    })?;
                let raw_expiry = record
                    .expiry
                    .as_deref()
                    .or(record.expiry_date.as_deref())
                    .ok_or_else(|| Error::invalid_record(&record.token, "expiry is missing"))?;
                let expiry = parse_expiry(raw_expiry).ok_or_else(|| {
                    Error::invalid_record(
                        &record.token,
                        format!("unrecognised expiry '{}'", raw_expiry),
                    )
                })?;
                let option_type = record
                    .option_type
                    .as_deref()
                    .and_then(OptionType::from_code)
                    .ok_or_else(|| {
                        Error::invalid_record(&record.token, "option_type is missing or unknown")
                    })?;

                Ok(InstrumentDetails::Option(OptionInstrument {
                    strike,
                    expiry,
                    option_type,
                    last_price: record.last_price,
                    symbol: record.symbol.clone(),
                    underlying: record.underlying.clone(),
                    iv: record.iv,
                    oi: record.oi,
                    lot_size: record.lot_size,
                }))
            }
            "future" => {
                let raw_expiry = record.expiry_date.as_deref().or(record.expiry.as_deref());
                let expiry = raw_expiry.and_then(parse_expiry);
                if let (Some(raw), None) = (raw_expiry, expiry) {
                    tracing::warn!(
                        token = %record.token,
                        expiry = raw,
                        "Unrecognised future expiry, pricing at spot"
                    );
                }

                Ok(InstrumentDetails::Future(FutureInstrument {
                    expiry,
                    last_price: record.last_price,
                    symbol: record.symbol.clone(),
                    underlying: record.underlying.clone(),
                    lot_size: record.lot_size,
                }))
            }
            other => Err(Error::invalid_record(
                &record.token,
                format!("unknown leg_type_db '{}'", other),
            )),
        }
    }
}

/// Parse the expiry formats seen in instrument feeds.
///
/// Accepts RFC 3339 timestamps, naive `YYYY-MM-DD[ HH:MM:SS]` values (read as
/// UTC) and exchange-style dates such as `30MAY2024` or `30-May-2024`.
/// Date-only values settle at [`EXPIRY_SETTLEMENT_HOUR_UTC`].
pub fn parse_expiry(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    let settlement = NaiveTime::from_hms_opt(EXPIRY_SETTLEMENT_HOUR_UTC, 0, 0)?;
    ["%Y-%m-%d", "%d%b%Y", "%d-%b-%Y", "%d %b %Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .map(|date| Utc.from_utc_datetime(&date.and_time(settlement)))
}

/// Concise expiry label, e.g. `30MAY`
pub fn expiry_label(expiry: &DateTime<Utc>) -> String {
    expiry.format("%d%b").to_string().to_uppercase()
}
