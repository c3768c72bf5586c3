use serde::{Deserialize, Serialize};

use crate::realtime::PushEvent;

/// Launch cities. Each city maps to one payout currency and one realtime
/// broadcast room.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum City {
    Lagos,
    Joburg,
    Nairobi,
}

impl City {
    pub const ALL: [City; 3] = [City::Lagos, City::Joburg, City::Nairobi];

    pub fn name(&self) -> &'static str {
        match self {
            City::Lagos => "Lagos",
            City::Joburg => "Johannesburg",
            City::Nairobi => "Nairobi",
        }
    }

    pub fn country(&self) -> &'static str {
        match self {
            City::Lagos => "Nigeria",
            City::Joburg => "South Africa",
            City::Nairobi => "Kenya",
        }
    }

    pub fn currency(&self) -> Currency {
        match self {
            City::Lagos => Currency::Ngn,
            City::Joburg => Currency::Zar,
            City::Nairobi => Currency::Kes,
        }
    }

    /// Query-string and room identifier, e.g. `lagos`.
    pub fn slug(&self) -> &'static str {
        match self {
            City::Lagos => "lagos",
            City::Joburg => "joburg",
            City::Nairobi => "nairobi",
        }
    }

    /// Wire value as sent by the API, e.g. `LAGOS`.
    pub fn as_str(&self) -> &'static str {
        match self {
            City::Lagos => "LAGOS",
            City::Joburg => "JOBURG",
            City::Nairobi => "NAIROBI",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Currency {
    Ngn,
    Zar,
    Kes,
}

impl Currency {
    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::Ngn => "₦",
            Currency::Zar => "R",
            Currency::Kes => "KSh",
        }
    }

    /// All supported currencies carry two decimal places.
    pub fn minor_units_per_major(&self) -> i64 {
        100
    }

    /// Formats a minor-unit amount for display, e.g. `₦1,250` from 125000.
    /// Fractional minor units are floored, matching the backend's display
    /// strings.
    pub fn format_minor(&self, amount: i64) -> String {
        let major = amount / self.minor_units_per_major();
        format!("{}{}", self.symbol(), group_thousands(major))
    }
}

/// Trending window accepted by the trending endpoints.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    #[default]
    Day,
    Week,
    Month,
    All,
}

impl Timeframe {
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::Day => "day",
            Timeframe::Week => "week",
            Timeframe::Month => "month",
            Timeframe::All => "all",
        }
    }

    /// Short label used by timeframe pickers.
    pub fn label(&self) -> &'static str {
        match self {
            Timeframe::Day => "24h",
            Timeframe::Week => "7d",
            Timeframe::Month => "30d",
            Timeframe::All => "All",
        }
    }
}

fn group_thousands(value: i64) -> String {
    let negative = value < 0;
    let digits = value.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if negative {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

/// Events that can be processed by the Dasham event processing loop.
#[derive(Debug)]
pub enum ProcessableEvent {
    /// A typed push event received over the realtime connection.
    Push(PushEvent),
    /// A connection status transition, for logging/monitoring purposes.
    SocketStatus(String),
}
