use std::{fmt, str::FromStr};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(ReservationId);
id_newtype!(MenuItemId);

pub const MIN_GUESTS: u8 = 1;
pub const MAX_GUESTS: u8 = 8;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognised {kind} '{value}'")]
pub struct ParseDomainError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseDomainError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    #[default]
    Pending,
    Confirmed,
    Cancelled,
}

impl ReservationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Confirmed and cancelled reservations never move again.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReservationStatus {
    type Err = ParseDomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(ParseDomainError::new("reservation status", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeatingArea {
    Inside,
    Outside,
}

impl SeatingArea {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inside => "inside",
            Self::Outside => "outside",
        }
    }

    pub fn tables(self) -> std::ops::RangeInclusive<u32> {
        match self {
            Self::Inside => 1..=8,
            Self::Outside => 9..=14,
        }
    }

    pub fn contains_table(self, table_number: u32) -> bool {
        self.tables().contains(&table_number)
    }

    pub fn for_table(table_number: u32) -> Option<Self> {
        [Self::Inside, Self::Outside]
            .into_iter()
            .find(|area| area.contains_table(table_number))
    }
}

impl FromStr for SeatingArea {
    type Err = ParseDomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inside" => Ok(Self::Inside),
            "outside" => Ok(Self::Outside),
            other => Err(ParseDomainError::new("seating area", other)),
        }
    }
}

/// A bookable half-hour slot between 17:00 and 21:00, both inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeSlot {
    minutes: u16,
}

const FIRST_SLOT_MINUTES: u16 = 17 * 60;
const LAST_SLOT_MINUTES: u16 = 21 * 60;
const SLOT_STEP_MINUTES: u16 = 30;

impl TimeSlot {
    pub fn all() -> impl Iterator<Item = TimeSlot> {
        (FIRST_SLOT_MINUTES..=LAST_SLOT_MINUTES)
            .step_by(SLOT_STEP_MINUTES as usize)
            .map(|minutes| TimeSlot { minutes })
    }

    pub fn from_hm(hour: u16, minute: u16) -> Option<Self> {
        if minute >= 60 {
            return None;
        }
        let minutes = hour.checked_mul(60)?.checked_add(minute)?;
        let on_grid = minutes % SLOT_STEP_MINUTES == 0;
        (on_grid && (FIRST_SLOT_MINUTES..=LAST_SLOT_MINUTES).contains(&minutes))
            .then_some(TimeSlot { minutes })
    }

    pub fn hour(self) -> u16 {
        self.minutes / 60
    }

    pub fn minute(self) -> u16 {
        self.minutes % 60
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl FromStr for TimeSlot {
    type Err = ParseDomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (hour, minute) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| ParseDomainError::new("time slot", s))?;
        let hour = hour
            .parse::<u16>()
            .map_err(|_| ParseDomainError::new("time slot", s))?;
        let minute = minute
            .parse::<u16>()
            .map_err(|_| ParseDomainError::new("time slot", s))?;
        TimeSlot::from_hm(hour, minute).ok_or_else(|| ParseDomainError::new("time slot", s))
    }
}

impl TryFrom<String> for TimeSlot {
    type Error = ParseDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeSlot> for String {
    fn from(value: TimeSlot) -> Self {
        value.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MenuCategory {
    Starters,
    Mains,
    Desserts,
    Drinks,
}

impl MenuCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Starters => "starters",
            Self::Mains => "mains",
            Self::Desserts => "desserts",
            Self::Drinks => "drinks",
        }
    }
}

impl FromStr for MenuCategory {
    type Err = ParseDomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "starters" => Ok(Self::Starters),
            "mains" => Ok(Self::Mains),
            "desserts" => Ok(Self::Desserts),
            "drinks" => Ok(Self::Drinks),
            other => Err(ParseDomainError::new("menu category", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: MenuItemId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub price_cents: i64,
    pub category: MenuCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub is_spicy: bool,
}

/// Menu item as supplied by the seeding tool, before the store assigns an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMenuItem {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price_cents: i64,
    pub category: MenuCategory,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub is_spicy: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub menu_item_id: MenuItemId,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub date: NaiveDate,
    pub time: TimeSlot,
    pub guests: u8,
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seating_area: Option<SeatingArea>,
    pub table_number: u32,
    #[serde(default)]
    pub status: ReservationStatus,
    #[serde(default)]
    pub items: Vec<LineItem>,
    pub created_at: DateTime<Utc>,
}

/// A validated reservation ready to be persisted. Always starts out pending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReservation {
    pub date: NaiveDate,
    pub time: TimeSlot,
    pub guests: u8,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub seating_area: Option<SeatingArea>,
    pub table_number: u32,
    pub items: Vec<LineItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    New,
    Confirmed,
    Cancelled,
}

impl NotificationKind {
    pub fn for_status(status: ReservationStatus) -> Option<Self> {
        match status {
            ReservationStatus::Pending => None,
            ReservationStatus::Confirmed => Some(Self::Confirmed),
            ReservationStatus::Cancelled => Some(Self::Cancelled),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
