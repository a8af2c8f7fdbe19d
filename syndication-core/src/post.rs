//! Post records exchanged by transports, and the date conversions they need.

use chrono::{FixedOffset, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The "no date" sentinel of the content store.
pub const ZERO_DATE: &str = "0000-00-00 00:00:00";
/// Storage format of local and GMT post dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// XML-RPC `dateTime.iso8601` format.
pub const XMLRPC_DATE_FORMAT: &str = "%Y%m%dT%H:%M:%S";
/// XML-RPC encoding of [`ZERO_DATE`].
pub const XMLRPC_ZERO_DATE: &str = "00000000T00:00:00";

pub const DEFAULT_STATUS: &str = "draft";
pub const DEFAULT_TYPE: &str = "post";

pub const TAXONOMY_CATEGORY: &str = "category";
pub const TAXONOMY_TAG: &str = "post_tag";

/// A custom field on a remote or pulled post. `id` is the remote field id,
/// when the remote exposes one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomField {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub key: String,
    pub value: String,
}

/// Transport-normalized post. Every field has a default so a post built from
/// a sparse remote record is always complete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Post {
    pub post_title: String,
    pub post_content: String,
    pub post_excerpt: String,
    pub post_status: String,
    pub post_password: String,
    pub post_date: String,
    pub post_date_gmt: String,
    pub post_type: String,
    pub comment_status: String,
    pub ping_status: String,
    pub remote_id: u64,
    pub guid: String,
    /// Local category term ids.
    pub post_category: Vec<u64>,
    /// Local tag term ids.
    pub tags_input: Vec<u64>,
    /// Term names by taxonomy, as reported by the remote.
    pub terms: BTreeMap<String, Vec<String>>,
    pub meta: Vec<CustomField>,
}

impl Default for Post {
    fn default() -> Self {
        Self {
            post_title: String::new(),
            post_content: String::new(),
            post_excerpt: String::new(),
            post_status: DEFAULT_STATUS.to_string(),
            post_password: String::new(),
            post_date: String::new(),
            post_date_gmt: String::new(),
            post_type: DEFAULT_TYPE.to_string(),
            comment_status: String::new(),
            ping_status: String::new(),
            remote_id: 0,
            guid: String::new(),
            post_category: Vec::new(),
            tags_input: Vec::new(),
            terms: BTreeMap::new(),
            meta: Vec::new(),
        }
    }
}

/// A post as held by the local content store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalPost {
    pub id: u64,
    pub post_title: String,
    pub post_content: String,
    pub post_excerpt: String,
    pub post_status: String,
    pub post_password: String,
    pub post_date: String,
    pub post_date_gmt: String,
    pub post_type: String,
    pub comment_status: String,
    pub ping_status: String,
    pub guid: String,
    /// Term ids by taxonomy.
    pub terms: BTreeMap<String, Vec<u64>>,
    pub meta: BTreeMap<String, String>,
}

impl Default for LocalPost {
    fn default() -> Self {
        Self {
            id: 0,
            post_title: String::new(),
            post_content: String::new(),
            post_excerpt: String::new(),
            post_status: DEFAULT_STATUS.to_string(),
            post_password: String::new(),
            post_date: ZERO_DATE.to_string(),
            post_date_gmt: ZERO_DATE.to_string(),
            post_type: DEFAULT_TYPE.to_string(),
            comment_status: String::new(),
            ping_status: String::new(),
            guid: String::new(),
            terms: BTreeMap::new(),
            meta: BTreeMap::new(),
        }
    }
}

/// The record a push transport sends, built from the live local post right
/// before the network call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostData {
    pub local_id: u64,
    pub post_title: String,
    pub post_content: String,
    pub post_excerpt: String,
    pub post_status: String,
    pub post_password: String,
    pub post_date: String,
    pub post_date_gmt: String,
    pub post_type: String,
}

impl PostData {
    pub fn from_local(post: &LocalPost) -> Self {
        Self {
            local_id: post.id,
            post_title: post.post_title.clone(),
            post_content: post.post_content.clone(),
            post_excerpt: post.post_excerpt.clone(),
            post_status: or_default(&post.post_status, DEFAULT_STATUS),
            post_password: post.post_password.clone(),
            post_date: post.post_date.clone(),
            post_date_gmt: post.post_date_gmt.clone(),
            post_type: or_default(&post.post_type, DEFAULT_TYPE),
        }
    }
}

pub(crate) fn or_default(value: &str, default: &str) -> String {
    if value.trim().is_empty() {
        default.to_string()
    } else {
        value.to_string()
    }
}

pub fn is_zero_date(date: &str) -> bool {
    let date = date.trim();
    date.is_empty() || date == ZERO_DATE
}

/// GMT date to send for a post.
///
/// A real GMT date is used as-is. A zero GMT date with a real local date is
/// derived from the local date and the site offset. If both are zero the
/// sentinel is returned unchanged.
pub fn resolve_gmt_date(local: &str, gmt: &str, offset: FixedOffset) -> String {
    if !is_zero_date(gmt) {
        return gmt.trim().to_string();
    }
    if is_zero_date(local) {
        return ZERO_DATE.to_string();
    }
    match NaiveDateTime::parse_from_str(local.trim(), DATE_FORMAT) {
        Ok(naive) => match offset.from_local_datetime(&naive).single() {
            Some(dt) => dt.naive_utc().format(DATE_FORMAT).to_string(),
            None => ZERO_DATE.to_string(),
        },
        Err(_) => ZERO_DATE.to_string(),
    }
}

/// Local date for a UTC timestamp under the site offset.
pub fn local_from_utc(utc: &chrono::DateTime<Utc>, offset: FixedOffset) -> String {
    utc.with_timezone(&offset).format(DATE_FORMAT).to_string()
}

/// Stored date to XML-RPC `dateTime.iso8601`. Zero or unparseable dates
/// become [`XMLRPC_ZERO_DATE`].
pub fn to_xmlrpc_date(date: &str) -> String {
    if is_zero_date(date) {
        return XMLRPC_ZERO_DATE.to_string();
    }
    NaiveDateTime::parse_from_str(date.trim(), DATE_FORMAT)
        .map(|naive| naive.format(XMLRPC_DATE_FORMAT).to_string())
        .unwrap_or_else(|_| XMLRPC_ZERO_DATE.to_string())
}

/// XML-RPC `dateTime.iso8601` to a stored date. Accepts the compact form with
/// or without a trailing `Z` and the dashed ISO form.
pub fn from_xmlrpc_date(date: &str) -> String {
    let trimmed = date.trim().trim_end_matches('Z');
    if trimmed.is_empty() || trimmed == XMLRPC_ZERO_DATE {
        return ZERO_DATE.to_string();
    }
    [XMLRPC_DATE_FORMAT, "%Y-%m-%dT%H:%M:%S", "%Y%m%dT%H%M%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .map(|naive| naive.format(DATE_FORMAT).to_string())
        .unwrap_or_else(|| ZERO_DATE.to_string())
}

/// Stored GMT date to ISO-8601 for the REST API; empty for a zero date.
pub fn to_rest_date(gmt: &str) -> String {
    if is_zero_date(gmt) {
        return String::new();
    }
    NaiveDateTime::parse_from_str(gmt.trim(), DATE_FORMAT)
        .map(|naive| Utc.from_utc_datetime(&naive).to_rfc3339())
        .unwrap_or_default()
}
