/// Shared data structures for the engine
///
/// These structs represent the data model that flows between
/// the media store and the facet/query engine.
use chrono::{DateTime, Datelike, Month, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::EngineError;

pub type ConversationId = i64;
pub type SenderId = i64;
pub type MediaId = i64;

/// Whether a conversation is a group chat or a one-to-one thread
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ConversationKind {
    Group,
    Direct,
}

impl ConversationKind {
    /// Value stored in the catalog's `chat_type` column
    pub fn as_db_str(&self) -> &'static str {
        match self {
            ConversationKind::Group => "group",
            ConversationKind::Direct => "dm",
        }
    }

    pub fn from_db_str(value: &str) -> Self {
        match value {
            "group" => ConversationKind::Group,
            _ => ConversationKind::Direct,
        }
    }
}

/// A conversation the media was exported from, with its media count
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ConversationFacet {
    pub id: ConversationId,
    pub name: String,
    pub kind: ConversationKind,
    pub usage_count: u64,
}

/// A participant who sent at least one media item
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SenderFacet {
    pub id: SenderId,
    pub name: String,
    pub usage_count: u64,
}

/// Media kind of a stored record
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Image,
    Video,
    Gif,
}

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Image => "image",
            FileType::Video => "video",
            FileType::Gif => "gif",
        }
    }
}

impl FromStr for FileType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(FileType::Image),
            "video" => Ok(FileType::Video),
            "gif" => Ok(FileType::Gif),
            other => Err(EngineError::invalid("file type", other)),
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// File-type facet value. `All` is the "no filter" sentinel.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum FileTypeFilter {
    #[default]
    All,
    Image,
    Video,
    Gif,
}

impl FileTypeFilter {
    /// The concrete type to filter on, or `None` for `All`
    pub fn file_type(&self) -> Option<FileType> {
        match self {
            FileTypeFilter::All => None,
            FileTypeFilter::Image => Some(FileType::Image),
            FileTypeFilter::Video => Some(FileType::Video),
            FileTypeFilter::Gif => Some(FileType::Gif),
        }
    }
}

impl From<FileType> for FileTypeFilter {
    fn from(file_type: FileType) -> Self {
        match file_type {
            FileType::Image => FileTypeFilter::Image,
            FileType::Video => FileTypeFilter::Video,
            FileType::Gif => FileTypeFilter::Gif,
        }
    }
}

impl FromStr for FileTypeFilter {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(FileTypeFilter::All),
            other => other.parse::<FileType>().map(FileTypeFilter::from),
        }
    }
}

/// Result ordering requested from the store
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SortOrder {
    /// Newest first
    #[default]
    DateDesc,
    /// Oldest first
    DateAsc,
    /// Sender name, then newest first
    Sender,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::DateDesc => "date-desc",
            SortOrder::DateAsc => "date-asc",
            SortOrder::Sender => "sender",
        }
    }
}

impl FromStr for SortOrder {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "date-desc" => Ok(SortOrder::DateDesc),
            "date-asc" => Ok(SortOrder::DateAsc),
            "sender" => Ok(SortOrder::Sender),
            other => Err(EngineError::invalid("sort order", other)),
        }
    }
}

/// Canonical `YYYY-MM` calendar month, ordered chronologically.
///
/// Years outside 0..=9999 are written with an explicit sign, as in
/// ISO 8601 expanded form (`+10000-01`, `-0001-12`).
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct MonthKey {
    year: i32,
    month: u32,
}

impl MonthKey {
    /// Returns `None` unless `month` is in 1..=12 and the month is a
    /// representable calendar date
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1)?;
        Some(Self { year, month })
    }

    /// UTC calendar month containing the given epoch-millis timestamp
    pub fn from_timestamp_ms(timestamp_ms: i64) -> Option<Self> {
        let at = DateTime::<Utc>::from_timestamp_millis(timestamp_ms)?;
        Self::new(at.year(), at.month())
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    fn month_name(&self) -> &'static str {
        u8::try_from(self.month)
            .ok()
            .and_then(|m| Month::try_from(m).ok())
            .map(|m| m.name())
            .unwrap_or("Unknown")
    }

    /// Short display label, e.g. "Mar 2024"
    pub fn label(&self) -> String {
        format!("{} {}", &self.month_name()[..3], self.year)
    }

    /// Long display label, e.g. "March 2024"
    pub fn long_label(&self) -> String {
        format!("{} {}", self.month_name(), self.year)
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if (0..=9999).contains(&self.year) {
            write!(f, "{:04}-{:02}", self.year, self.month)
        } else {
            write!(f, "{:+05}-{:02}", self.year, self.month)
        }
    }
}

impl FromStr for MonthKey {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || EngineError::InvalidMonthKey(s.to_string());
        let (year, month) = s.rsplit_once('-').ok_or_else(invalid)?;
        let digits = year.strip_prefix(&['+', '-'][..]).unwrap_or(year);
        let signed = digits.len() != year.len();
        if digits.len() < 4 || (!signed && digits.len() != 4) || month.len() != 2 {
            return Err(invalid());
        }
        if !digits.bytes().chain(month.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        let key = Self::new(year, month).ok_or_else(invalid)?;
        // One spelling per month: four-digit years never carry a sign
        if signed && (0..=9999).contains(&year) {
            return Err(invalid());
        }
        Ok(key)
    }
}

impl TryFrom<String> for MonthKey {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MonthKey> for String {
    fn from(key: MonthKey) -> Self {
        key.to_string()
    }
}

/// A single media item as returned by the store. Read-only to the engine.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MediaRecord {
    pub id: MediaId,
    pub conversation_id: ConversationId,
    pub sender_id: SenderId,
    /// Milliseconds since the Unix epoch
    pub timestamp_ms: i64,
    pub file_type: FileType,
    /// Store-resolved location of the media content
    pub locator: String,
    pub sender_name: String,
    pub conversation_name: String,
}

impl MediaRecord {
    pub fn month_key(&self) -> Option<MonthKey> {
        MonthKey::from_timestamp_ms(self.timestamp_ms)
    }
}

/// One month of the timeline histogram
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TimelineEntry {
    pub month_key: MonthKey,
    pub label: String,
    pub count: u64,
}

impl TimelineEntry {
    /// The label is derived from the key alone
    pub fn new(month_key: MonthKey, count: u64) -> Self {
        Self {
            label: month_key.label(),
            month_key,
            count,
        }
    }
}

/// Timeline entries of one calendar year
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct YearBucket {
    pub year: i32,
    pub months: Vec<TimelineEntry>,
    pub total: u64,
}
