//! Partial temporal value engine
//!
//! A date whose year, month, day and time may each be known, explicitly unknown,
//! or never specified. The composite (`birthDate`, `valueDateTime`, ...) is written
//! only when year, month and day are all known; every fragment is additionally kept
//! in the partial date extension on the composite's `_key` sibling:
//!
//! ```text
//! "_birthDate": { "extension": [{
//!     "url": <keys.extension_url>,
//!     "extension": [
//!         { "url": "year",  "valueUnsignedInt": 1940 },
//!         { "url": "month", "_valueUnsignedInt": { <data-absent-reason: unknown> } },
//!         { "url": "time",  "valueTime": "08:15:00" }
//!     ]
//! }] }
//! ```
//!
//! Every write goes read → apply → recompose → write, so the composite and the
//! fragments never disagree.

use crate::config::PartialDateKeys;
use crate::error::{Error, Result};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::{json, Value};
use std::fmt;
use tracing::debug;
use vitalis_document::extension::{
    self, absent_reason_element, find_extension, primitive_element,
    primitive_element_mut, prune_primitive_element, remove_extension, upsert_extension,
};
use vitalis_models::DataAbsentReason;

/// Caller-facing alias for an explicitly unknown fragment.
pub const UNKNOWN_SENTINEL: i32 = -1;
pub const UNKNOWN_TIME_SENTINEL: &str = "-1";

const INT_VALUE: &str = "valueUnsignedInt";
const TIME_VALUE: &str = "valueTime";
const TIME_FORMAT: &str = "%H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

// ============================================================================
// Fragment states
// ============================================================================

/// Three-state value of one fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentValue<T> {
    Known(T),
    Unknown,
    Unspecified,
}

impl<T> Default for FragmentValue<T> {
    fn default() -> Self {
        FragmentValue::Unspecified
    }
}

impl<T: Copy> FragmentValue<T> {
    pub fn known(&self) -> Option<T> {
        match self {
            FragmentValue::Known(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, FragmentValue::Known(_))
    }

    pub fn is_unspecified(&self) -> bool {
        matches!(self, FragmentValue::Unspecified)
    }
}

impl FragmentValue<i32> {
    /// `None` → unspecified, `-1` → unknown, anything else → known.
    pub fn from_sentinel(value: Option<i32>) -> Self {
        match value {
            None => FragmentValue::Unspecified,
            Some(UNKNOWN_SENTINEL) => FragmentValue::Unknown,
            Some(v) => FragmentValue::Known(v),
        }
    }

    pub fn to_sentinel(self) -> Option<i32> {
        match self {
            FragmentValue::Known(v) => Some(v),
            FragmentValue::Unknown => Some(UNKNOWN_SENTINEL),
            FragmentValue::Unspecified => None,
        }
    }
}

impl FragmentValue<NaiveTime> {
    pub fn to_sentinel(self) -> Option<String> {
        match self {
            FragmentValue::Known(t) => Some(t.format(TIME_FORMAT).to_string()),
            FragmentValue::Unknown => Some(UNKNOWN_TIME_SENTINEL.to_string()),
            FragmentValue::Unspecified => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DateFragment {
    Year,
    Month,
    Day,
}

impl DateFragment {
    fn range(self) -> (i32, i32) {
        match self {
            DateFragment::Year => (1, 9999),
            DateFragment::Month => (1, 12),
            DateFragment::Day => (1, 31),
        }
    }

    fn key(self, keys: &PartialDateKeys) -> &str {
        match self {
            DateFragment::Year => &keys.year_key,
            DateFragment::Month => &keys.month_key,
            DateFragment::Day => &keys.day_key,
        }
    }

    /// Validate a caller value. `-1` is the unknown alias; other values must be in range.
    pub fn check(self, value: i32) -> Result<FragmentValue<i32>> {
        if value == UNKNOWN_SENTINEL {
            return Ok(FragmentValue::Unknown);
        }
        self.check_known(value).map(FragmentValue::Known)
    }

    fn check_known(self, value: i32) -> Result<i32> {
        let (min, max) = self.range();
        if !(min..=max).contains(&value) {
            return Err(Error::InvalidArgument(format!(
                "{self} must be between {min} and {max} (or -1 for unknown), got {value}"
            )));
        }
        Ok(value)
    }
}

impl fmt::Display for DateFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DateFragment::Year => "year",
            DateFragment::Month => "month",
            DateFragment::Day => "day",
        })
    }
}

/// Parse a caller time. `"-1"` is the unknown alias; blank means no value.
pub fn parse_time(field: &str, value: &str) -> Result<Option<FragmentValue<NaiveTime>>> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    if value == UNKNOWN_TIME_SENTINEL {
        return Ok(Some(FragmentValue::Unknown));
    }
    ["%H:%M:%S%.f", TIME_FORMAT, "%H:%M"]
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(value, fmt).ok())
        .map(|t| Some(FragmentValue::Known(t)))
        .ok_or_else(|| Error::InvalidDateFormat {
            field: field.to_string(),
            value: value.to_string(),
        })
}

/// Parse a composite date or date-time. Blank means no value. An RFC 3339 offset
/// is dropped: the wall-clock date and time are kept as written.
pub fn parse_composite(field: &str, value: &str) -> Result<Option<(NaiveDate, Option<NaiveTime>)>> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, DATE_FORMAT) {
        return Ok(Some((date, None)));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        let local = dt.naive_local();
        return Ok(Some((local.date(), Some(local.time()))));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|dt| Some((dt.date(), Some(dt.time()))))
        .ok_or_else(|| Error::InvalidDateFormat {
            field: field.to_string(),
            value: value.to_string(),
        })
}

// ============================================================================
// Slots
// ============================================================================

/// Where the time fragment of a slot lives, if it has one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeStorage {
    /// Date only
    None,
    /// The composite itself is a date-time (`valueDateTime`).
    Inline,
    /// The composite is a date; the full date-time goes to an extension with this
    /// url on the composite's `_key` sibling (e.g. `patient-birthTime`).
    Extension(&'static str),
}

/// A composite date element on a node together with how its time is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemporalSlot {
    pub composite_key: &'static str,
    pub time: TimeStorage,
}

impl TemporalSlot {
    pub const fn date(composite_key: &'static str) -> Self {
        Self {
            composite_key,
            time: TimeStorage::None,
        }
    }

    pub const fn date_time(composite_key: &'static str) -> Self {
        Self {
            composite_key,
            time: TimeStorage::Inline,
        }
    }

    pub const fn date_with_time_extension(composite_key: &'static str, url: &'static str) -> Self {
        Self {
            composite_key,
            time: TimeStorage::Extension(url),
        }
    }

    pub fn has_time(&self) -> bool {
        !matches!(self.time, TimeStorage::None)
    }
}

// ============================================================================
// Value
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PartialTemporalValue {
    pub year: FragmentValue<i32>,
    pub month: FragmentValue<i32>,
    pub day: FragmentValue<i32>,
    pub time: FragmentValue<NaiveTime>,
}

impl PartialTemporalValue {
    pub fn fragment(&self, fragment: DateFragment) -> FragmentValue<i32> {
        match fragment {
            DateFragment::Year => self.year,
            DateFragment::Month => self.month,
            DateFragment::Day => self.day,
        }
    }

    /// Apply a transition. `Unspecified` never downgrades a fragment.
    pub fn apply(&mut self, fragment: DateFragment, value: FragmentValue<i32>) {
        if value.is_unspecified() {
            return;
        }
        match fragment {
            DateFragment::Year => self.year = value,
            DateFragment::Month => self.month = value,
            DateFragment::Day => self.day = value,
        }
    }

    pub fn apply_time(&mut self, value: FragmentValue<NaiveTime>) {
        if !value.is_unspecified() {
            self.time = value;
        }
    }

    /// The calendar date, when year, month and day are all known and form a real date.
    pub fn date(&self) -> Option<NaiveDate> {
        let (y, m, d) = (self.year.known()?, self.month.known()?, self.day.known()?);
        NaiveDate::from_ymd_opt(y, u32::try_from(m).ok()?, u32::try_from(d).ok()?)
    }

    /// `YYYY-MM-DD`, or `YYYY-MM-DDTHH:MM:SS` when `with_time` and the time is known.
    pub fn composite(&self, with_time: bool) -> Option<String> {
        let date = self.date()?;
        match self.time.known() {
            Some(time) if with_time => Some(date.and_time(time).format("%Y-%m-%dT%H:%M:%S").to_string()),
            _ => Some(date.format(DATE_FORMAT).to_string()),
        }
    }

    pub fn is_unspecified(&self) -> bool {
        self.year.is_unspecified()
            && self.month.is_unspecified()
            && self.day.is_unspecified()
            && self.time.is_unspecified()
    }

    fn set_date(&mut self, date: NaiveDate) {
        self.year = FragmentValue::Known(date.year());
        self.month = FragmentValue::Known(date.month() as i32);
        self.day = FragmentValue::Known(date.day() as i32);
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Reads and writes partial temporal values on JSON nodes, using the injected keys.
#[derive(Debug, Clone, Copy)]
pub struct PartialDateEngine<'k> {
    keys: &'k PartialDateKeys,
}

impl<'k> PartialDateEngine<'k> {
    pub fn new(keys: &'k PartialDateKeys) -> Self {
        Self { keys }
    }

    pub fn keys(&self) -> &PartialDateKeys {
        self.keys
    }

    /// Current value of `slot` on `node`. When the composite is present it is the
    /// source of truth for year, month and day.
    pub fn read(&self, node: &Value, slot: &TemporalSlot) -> PartialTemporalValue {
        let mut value = self.read_fragments(node, slot);
        let composite = node.get(slot.composite_key).and_then(Value::as_str);
        if let Some(Ok(Some((date, time)))) = composite.map(|c| parse_composite(slot.composite_key, c)) {
            value.set_date(date);
            if let (Some(time), TimeStorage::Inline) = (time, slot.time) {
                value.time = FragmentValue::Known(time);
            }
        }
        if let TimeStorage::Extension(url) = slot.time {
            if let Some(time) = self.read_time_extension(node, slot, url) {
                value.time = FragmentValue::Known(time);
            }
        }
        value
    }

    /// `Some(v)` for known, `Some(-1)` for unknown, `None` for unspecified.
    pub fn get_fragment(&self, node: &Value, slot: &TemporalSlot, fragment: DateFragment) -> Option<i32> {
        self.read(node, slot).fragment(fragment).to_sentinel()
    }

    /// Set one fragment from a caller value (`None` is a no-op, `-1` marks it unknown).
    pub fn set_fragment(
        &self,
        node: &mut Value,
        slot: &TemporalSlot,
        fragment: DateFragment,
        value: Option<i32>,
    ) -> Result<()> {
        let Some(value) = value else {
            return Ok(());
        };
        let value = fragment.check(value)?;
        let mut current = self.read(node, slot);
        current.apply(fragment, value);
        self.write(node, slot, &current);
        Ok(())
    }

    /// `Some("HH:MM:SS")`, `Some("-1")` for unknown, `None` for unspecified.
    pub fn get_time(&self, node: &Value, slot: &TemporalSlot) -> Option<String> {
        if !slot.has_time() {
            return None;
        }
        self.read(node, slot).time.to_sentinel()
    }

    pub fn set_time(&self, node: &mut Value, slot: &TemporalSlot, value: Option<&str>) -> Result<()> {
        let Some(value) = value else {
            return Ok(());
        };
        if !slot.has_time() {
            return Err(Error::InvalidArgument(format!(
                "{} does not carry a time",
                slot.composite_key
            )));
        }
        let Some(time) = parse_time(slot.composite_key, value)? else {
            return Ok(());
        };
        let mut current = self.read(node, slot);
        current.apply_time(time);
        self.write(node, slot, &current);
        Ok(())
    }

    /// The composite date, or date-time when the slot carries a known time.
    pub fn get_composite(&self, node: &Value, slot: &TemporalSlot) -> Option<String> {
        if let TimeStorage::Extension(url) = slot.time {
            let date_time = primitive_element(node, slot.composite_key)
                .and_then(|el| find_extension(el, url))
                .and_then(|ext| ext.get("valueDateTime"))
                .and_then(Value::as_str);
            if let Some(date_time) = date_time {
                return Some(date_time.to_string());
            }
        }
        node.get(slot.composite_key)
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    /// Set year, month and day (and the time, if the string has one) from a composite
    /// string. A date-only string keeps the current time fragment. Blank is a no-op.
    pub fn set_composite(&self, node: &mut Value, slot: &TemporalSlot, value: Option<&str>) -> Result<()> {
        let Some(value) = value else {
            return Ok(());
        };
        let Some((date, time)) = parse_composite(slot.composite_key, value)? else {
            return Ok(());
        };
        DateFragment::Year.check_known(date.year())?;
        DateFragment::Month.check_known(date.month() as i32)?;
        DateFragment::Day.check_known(date.day() as i32)?;
        let mut current = self.read(node, slot);
        current.set_date(date);
        match time {
            Some(time) if slot.has_time() => current.time = FragmentValue::Known(time),
            Some(_) => debug!("Dropping time from {} on date-only {}", value, slot.composite_key),
            None => {}
        }
        self.write(node, slot, &current);
        Ok(())
    }

    /// Persist `value`: fragments always, composite only when the date is complete.
    pub fn write(&self, node: &mut Value, slot: &TemporalSlot, value: &PartialTemporalValue) {
        let key = slot.composite_key;
        let composite = value.composite(matches!(slot.time, TimeStorage::Inline));

        match &composite {
            Some(c) => {
                extension::ensure_object(node).insert(key.to_string(), json!(c));
            }
            None => {
                if let Some(obj) = node.as_object_mut() {
                    if obj.remove(key).is_some() {
                        debug!("Demoted {} to fragment form", key);
                    }
                }
            }
        }

        if let TimeStorage::Extension(url) = slot.time {
            match value.composite(true).filter(|_| value.time.is_known()) {
                Some(date_time) => {
                    upsert_extension(primitive_element_mut(node, key), url)["valueDateTime"] =
                        json!(date_time);
                }
                None => {
                    if let Some(el) = node.get_mut(format!("_{key}")) {
                        remove_extension(el, url);
                    }
                }
            }
        }

        self.write_fragments(node, slot, value);
        prune_primitive_element(node, key);
    }

    fn read_fragments(&self, node: &Value, slot: &TemporalSlot) -> PartialTemporalValue {
        let Some(partial) = primitive_element(node, slot.composite_key)
            .and_then(|el| find_extension(el, &self.keys.extension_url))
        else {
            return PartialTemporalValue::default();
        };

        let read_int = |sub_key: &str| -> FragmentValue<i32> {
            let Some(sub) = find_extension(partial, sub_key) else {
                return FragmentValue::Unspecified;
            };
            if let Some(v) = sub
                .get(INT_VALUE)
                .or_else(|| sub.get("valueInteger"))
                .and_then(Value::as_i64)
                .and_then(|v| i32::try_from(v).ok())
            {
                return FragmentValue::Known(v);
            }
            match sub.get(&format!("_{INT_VALUE}")).and_then(extension::absent_reason) {
                Some(_) => FragmentValue::Unknown,
                None => FragmentValue::Unspecified,
            }
        };

        let mut value = PartialTemporalValue {
            year: read_int(&self.keys.year_key),
            month: read_int(&self.keys.month_key),
            day: read_int(&self.keys.day_key),
            time: FragmentValue::Unspecified,
        };

        if slot.has_time() {
            if let Some(sub) = find_extension(partial, &self.keys.time_key) {
                let known = sub
                    .get(TIME_VALUE)
                    .and_then(Value::as_str)
                    .and_then(|t| parse_time(&self.keys.time_key, t).ok().flatten());
                value.time = match known {
                    Some(FragmentValue::Known(t)) => FragmentValue::Known(t),
                    _ if sub
                        .get(&format!("_{TIME_VALUE}"))
                        .and_then(extension::absent_reason)
                        .is_some() =>
                    {
                        FragmentValue::Unknown
                    }
                    _ => FragmentValue::Unspecified,
                };
            }
        }
        value
    }

    fn read_time_extension(&self, node: &Value, slot: &TemporalSlot, url: &str) -> Option<NaiveTime> {
        let date_time = primitive_element(node, slot.composite_key)
            .and_then(|el| find_extension(el, url))?
            .get("valueDateTime")?
            .as_str()?;
        match parse_composite(url, date_time) {
            Ok(Some((_, time))) => time,
            _ => None,
        }
    }

    fn write_fragments(&self, node: &mut Value, slot: &TemporalSlot, value: &PartialTemporalValue) {
        let key = slot.composite_key;
        let url = self.keys.extension_url.as_str();

        let mut subs = Vec::new();
        for fragment in [DateFragment::Year, DateFragment::Month, DateFragment::Day] {
            let sub_key = fragment.key(self.keys);
            match value.fragment(fragment) {
                FragmentValue::Known(v) => subs.push(json!({ "url": sub_key, INT_VALUE: v })),
                FragmentValue::Unknown => subs.push(json!({
                    "url": sub_key,
                    "_valueUnsignedInt": absent_reason_element(DataAbsentReason::Unknown)
                })),
                FragmentValue::Unspecified => {}
            }
        }
        if slot.has_time() {
            let sub_key = self.keys.time_key.as_str();
            match value.time {
                FragmentValue::Known(t) => subs.push(json!({
                    "url": sub_key,
                    TIME_VALUE: t.format(TIME_FORMAT).to_string()
                })),
                FragmentValue::Unknown => subs.push(json!({
                    "url": sub_key,
                    "_valueTime": absent_reason_element(DataAbsentReason::Unknown)
                })),
                FragmentValue::Unspecified => {}
            }
        }

        if subs.is_empty() {
            if let Some(el) = node.get_mut(format!("_{key}")) {
                remove_extension(el, url);
            }
            return;
        }
        let partial = upsert_extension(primitive_element_mut(node, key), url);
        extension::ensure_object(partial).insert("extension".to_string(), Value::Array(subs));
    }
}
