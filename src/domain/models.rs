// src/domain/models.rs
use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw event from the tick feed. Either field may be missing on a given
/// update (quote-only events, size-only corrections).
#[derive(Debug, Clone, PartialEq)]
pub struct TickEvent {
    pub last: Option<Decimal>,
    pub last_size: Option<u64>,
    pub timestamp: DateTime<Utc>,
}

impl TickEvent {
    pub fn trade(price: Decimal, size: u64, timestamp: DateTime<Utc>) -> Self {
        Self {
            last: Some(price),
            last_size: Some(size),
            timestamp,
        }
    }

    /// The usable trade carried by this event, if both price and size are present.
    pub fn as_tick(&self) -> Option<Tick> {
        match (self.last, self.last_size) {
            (Some(price), Some(size)) => Some(Tick {
                price,
                size,
                timestamp: self.timestamp,
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    pub price: Decimal,
    pub size: u64,
    pub timestamp: DateTime<Utc>,
}

/// Summary of one completed aggregation window.
///
/// Every price field is `None` when no trade was observed in the window;
/// `vwap` is also `None` when trades were seen but carried zero size.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowStats {
    pub vwap: Option<Decimal>,
    pub volatility: Option<Decimal>,
    pub open: Option<Decimal>,
    pub high: Option<Decimal>,
    pub low: Option<Decimal>,
    pub close: Option<Decimal>,
    pub volume: u64,
    pub tick_count: usize,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
}

impl WindowStats {
    pub fn has_trades(&self) -> bool {
        self.tick_count > 0
    }
}

/// Core Trading Components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderAction {
    Buy,
    Sell,
}

impl OrderAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderAction::Buy => "BUY",
            OrderAction::Sell => "SELL",
        }
    }
}

impl fmt::Display for OrderAction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OrderKind {
    Market,
    Limit(Decimal),
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OrderKind::Market => write!(f, "MARKET"),
            OrderKind::Limit(price) => write!(f, "LIMIT @ {:.2}", price),
        }
    }
}

/// What the caller wants traded. Consumed once by the executor.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderIntent {
    pub symbol: String,
    pub action: OrderAction,
    pub quantity: i64,
    pub kind: OrderKind,
}

impl OrderIntent {
    pub fn market(symbol: &str, action: OrderAction, quantity: i64) -> Self {
        Self {
            symbol: symbol.to_string(),
            action,
            quantity,
            kind: OrderKind::Market,
        }
    }

    pub fn limit(symbol: &str, action: OrderAction, quantity: i64, price: Decimal) -> Self {
        Self {
            symbol: symbol.to_string(),
            action,
            quantity,
            kind: OrderKind::Limit(price),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Submitted,
    Filled,
    Cancelled,
    Rejected,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Submitted)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OrderStatus::Submitted => write!(f, "SUBMITTED"),
            OrderStatus::Filled => write!(f, "FILLED"),
            OrderStatus::Cancelled => write!(f, "CANCELLED"),
            OrderStatus::Rejected => write!(f, "REJECTED"),
        }
    }
}

/// Venue-side view of a submitted order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderHandle {
    pub id: String,
    pub symbol: String,
    pub action: OrderAction,
    pub quantity: i64,
    pub status: OrderStatus,
    pub fill_price: Option<Decimal>,
}

impl OrderHandle {
    pub fn is_done(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Daily historical bar. Unique by `date`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub date: NaiveDate,
    #[serde(with = "weekday_name")]
    pub day_of_week: Weekday,
    #[serde(with = "rust_decimal::serde::str")]
    pub open: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub high: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub low: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub close: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub volume: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub average: Decimal,
    pub bar_count: i64,
}

impl Bar {
    /// Build a bar whose weekday label is derived from its date.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        date: NaiveDate,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
        average: Decimal,
        bar_count: i64,
    ) -> Self {
        Self {
            date,
            day_of_week: date.weekday(),
            open,
            high,
            low,
            close,
            volume,
            average,
            bar_count,
        }
    }
}

/// Full English day names on disk ("Monday"), as the bar files have always
/// been written. Abbreviations are accepted on read.
pub mod weekday_name {
    use chrono::Weekday;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn as_str(day: Weekday) -> &'static str {
        match day {
            Weekday::Mon => "Monday",
            Weekday::Tue => "Tuesday",
            Weekday::Wed => "Wednesday",
            Weekday::Thu => "Thursday",
            Weekday::Fri => "Friday",
            Weekday::Sat => "Saturday",
            Weekday::Sun => "Sunday",
        }
    }

    pub fn serialize<S: Serializer>(day: &Weekday, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(as_str(*day))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Weekday, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.trim()
            .parse::<Weekday>()
            .map_err(|_| de::Error::custom(format!("invalid weekday: {}", raw)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[test]
    fn tick_event_requires_price_and_size() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 5, 14, 30, 0).unwrap();
        let full = TickEvent::trade(dec!(10.5), 3, ts);
        assert_eq!(full.as_tick().map(|t| t.size), Some(3));

        let no_size = TickEvent { last_size: None, ..full.clone() };
        assert!(no_size.as_tick().is_none());

        let no_price = TickEvent { last: None, ..full };
        assert!(no_price.as_tick().is_none());
    }

    #[test]
    fn only_submitted_is_live() {
        assert!(!OrderStatus::Submitted.is_terminal());
        assert!(OrderStatus::Filled.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(OrderStatus::Rejected.is_terminal());
    }

    #[test]
    fn bar_weekday_follows_date() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 4).unwrap();
        let bar = Bar::new(date, dec!(1), dec!(1), dec!(1), dec!(1), dec!(1), dec!(1), 1);
        assert_eq!(bar.day_of_week, Weekday::Thu);
        assert_eq!(weekday_name::as_str(bar.day_of_week), "Thursday");
    }
}
