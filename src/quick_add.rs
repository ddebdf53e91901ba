//! Quick-add token grammar.
//!
//! Turns one line of free text into a `TaskPatch`:
//!
//! - `+tag` appends a tag
//! - `!p0`..`!p3` sets an explicit bucket
//! - `@ai` / `@me` set the owner type, any other `@name` appends an owner
//! - `impact:N`, `urgency:N`, `effort:N` set the scoring levels
//! - `due:today|tomorrow|YYYY-MM-DD [HH:MM]` and `expect:...` set timestamps, 18:00
//!   local time unless a time token follows
//!
//! Everything else is title text. Double quotes group words into one token. The
//! grammar is a stable interface: callers depend on the exact token syntax.

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, TimeZone, Utc};

use crate::fields::{Bucket, OwnerType};
use crate::task::{normalise_tag, TaskPatch};
use crate::validation::{validate_owner_name, MAX_LEVEL};

const DEFAULT_HOUR: u32 = 18;

/// Parse `text` relative to the current local time.
pub fn parse_quick_add(text: &str) -> TaskPatch {
    parse_quick_add_at(text, Local::now())
}

/// Parse `text`, resolving `today`/`tomorrow` against `now`.
pub fn parse_quick_add_at(text: &str, now: DateTime<Local>) -> TaskPatch {
    let tokens = tokenize(text);
    let mut patch = TaskPatch::default();
    let mut title: Vec<String> = Vec::new();
    let mut tags: Vec<String> = Vec::new();
    let mut owners: Vec<String> = Vec::new();
    let mut explicit_type: Option<OwnerType> = None;

    let mut i = 0;
    while i < tokens.len() {
        let tok = tokens[i].as_str();
        i += 1;

        if let Some(tag) = tok.strip_prefix('+').filter(|t| !t.is_empty()) {
            let tag = normalise_tag(tag);
            if !tags.contains(&tag) {
                tags.push(tag);
            }
            continue;
        }

        if let Some(bucket) = tok.strip_prefix('!').and_then(Bucket::parse) {
            patch.bucket = Some(Some(bucket));
            continue;
        }

        if let Some(name) = tok.strip_prefix('@').filter(|n| !n.is_empty()) {
            match name.to_lowercase().as_str() {
                "ai" => explicit_type = Some(OwnerType::Agent),
                "me" => explicit_type = Some(OwnerType::Myself),
                _ if validate_owner_name(name).is_ok() => {
                    let name = name.trim().to_string();
                    if !owners.contains(&name) {
                        owners.push(name);
                    }
                }
                _ => title.push(tok.to_string()),
            }
            continue;
        }

        if let Some((key, value)) = tok.split_once(':') {
            match key.to_lowercase().as_str() {
                "impact" => {
                    patch.impact = parse_level(value).or(patch.impact);
                    continue;
                }
                "urgency" => {
                    patch.urgency = parse_level(value).or(patch.urgency);
                    continue;
                }
                "effort" => {
                    patch.effort = parse_level(value).or(patch.effort);
                    continue;
                }
                "due" | "expect" => {
                    let time = tokens.get(i).and_then(|t| parse_time(t));
                    if time.is_some() {
                        i += 1;
                    }
                    let at = resolve_date(value, now).and_then(|d| at_local(d, time, now));
                    if key.eq_ignore_ascii_case("due") {
                        patch.due = Some(at);
                    } else {
                        patch.expected_by = Some(at);
                    }
                    continue;
                }
                _ => {}
            }
        }

        title.push(tok.to_string());
    }

    if !title.is_empty() {
        patch.title = Some(title.join(" "));
    }
    if !tags.is_empty() {
        patch.tags = Some(tags);
    }
    if !owners.is_empty() {
        patch.owners = Some(owners);
    }
    patch.owner_type = match explicit_type {
        Some(t) => Some(t),
        None if patch.owners.is_some() => Some(OwnerType::Other),
        None => None,
    };
    // A malformed date leaves the field unset rather than clearing it.
    if patch.due == Some(None) {
        patch.due = None;
    }
    if patch.expected_by == Some(None) {
        patch.expected_by = None;
    }
    patch
}

/// Parse a standalone `today|tomorrow|YYYY-MM-DD [HH:MM]` value, as accepted after
/// `due:` and `expect:`.
pub fn parse_when(value: &str) -> Option<DateTime<Utc>> {
    parse_when_at(value, Local::now())
}

pub fn parse_when_at(value: &str, now: DateTime<Local>) -> Option<DateTime<Utc>> {
    let mut parts = value.split_whitespace();
    let date = resolve_date(parts.next()?, now)?;
    let time = match parts.next() {
        Some(t) => Some(parse_time(t)?),
        None => None,
    };
    if parts.next().is_some() {
        return None;
    }
    at_local(date, time, now)
}

/// Split on whitespace, keeping double-quoted runs together without the quotes.
fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut quoted = false;

    for c in text.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                quoted = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() || quoted {
                    tokens.push(std::mem::take(&mut current));
                }
                quoted = false;
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens.retain(|t| !t.is_empty());
    tokens
}

fn parse_level(value: &str) -> Option<u8> {
    value.trim().parse::<i64>().ok().map(|n| n.clamp(0, i64::from(MAX_LEVEL)) as u8)
}

fn parse_time(tok: &str) -> Option<NaiveTime> {
    if !tok.contains(':') {
        return None;
    }
    NaiveTime::parse_from_str(tok, "%H:%M").ok()
}

fn resolve_date(value: &str, now: DateTime<Local>) -> Option<NaiveDate> {
    let today = now.date_naive();
    match value.trim().to_lowercase().as_str() {
        "today" => Some(today),
        "tomorrow" => Some(today + Duration::days(1)),
        other => NaiveDate::parse_from_str(other, "%Y-%m-%d").ok(),
    }
}

fn at_local(date: NaiveDate, time: Option<NaiveTime>, now: DateTime<Local>) -> Option<DateTime<Utc>> {
    let time = match time {
        Some(t) => t,
        None => NaiveTime::from_hms_opt(DEFAULT_HOUR, 0, 0)?,
    };
    now.timezone()
        .from_local_datetime(&date.and_time(time))
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}
