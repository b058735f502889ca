//! Media types and their specificity ordering.
//!
//! A [`MediaType`] is a `type/subtype` pair with parameters. Wildcards are
//! allowed in both positions (`*/*`, `text/*`) and in structured-syntax
//! suffixes (`application/*+json`).

use std::cmp::{Ordering, Reverse};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::foundation::error::{MediaTypeError, MediaTypeResult};

/// The wildcard token.
pub const WILDCARD: &str = "*";

const QUALITY_PARAM: &str = "q";

/// A media type such as `application/json;charset=utf-8`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MediaType {
    type_: String,
    subtype: String,
    parameters: BTreeMap<String, String>,
}

impl MediaType {
    /// Creates a media type without parameters.
    pub fn new(type_: impl Into<String>, subtype: impl Into<String>) -> Self {
        Self {
            type_: type_.into().to_ascii_lowercase(),
            subtype: subtype.into().to_ascii_lowercase(),
            parameters: BTreeMap::new(),
        }
    }

    /// `*/*`.
    pub fn all() -> Self {
        Self::new(WILDCARD, WILDCARD)
    }

    /// `application/json`.
    pub fn application_json() -> Self {
        Self::new("application", "json")
    }

    /// `application/xml`.
    pub fn application_xml() -> Self {
        Self::new("application", "xml")
    }

    /// `text/html`.
    pub fn text_html() -> Self {
        Self::new("text", "html")
    }

    /// `text/plain`.
    pub fn text_plain() -> Self {
        Self::new("text", "plain")
    }

    /// Returns a copy with the given parameter set.
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    /// Parses a single media type.
    pub fn parse(input: &str) -> MediaTypeResult<Self> {
        let mut parts = split_outside_quotes(input, ';').into_iter();
        let full = parts.next().unwrap_or_default().trim();
        if full.is_empty() {
            return Err(MediaTypeError::invalid(input, "media type must not be empty"));
        }

        let full = if full == WILDCARD { "*/*" } else { full };
        let Some((type_, subtype)) = full.split_once('/') else {
            return Err(MediaTypeError::invalid(input, "does not contain '/'"));
        };
        let (type_, subtype) = (type_.trim(), subtype.trim());
        if type_.is_empty() {
            return Err(MediaTypeError::invalid(input, "empty type"));
        }
        if subtype.is_empty() {
            return Err(MediaTypeError::invalid(input, "empty subtype"));
        }
        if subtype.contains('/') {
            return Err(MediaTypeError::invalid(input, "subtype contains '/'"));
        }
        if type_ == WILDCARD && subtype != WILDCARD {
            return Err(MediaTypeError::invalid(
                input,
                "wildcard type is legal only in '*/*'",
            ));
        }

        let mut media_type = Self::new(type_, subtype);
        for parameter in parts {
            let parameter = parameter.trim();
            if parameter.is_empty() {
                continue;
            }
            let Some((name, value)) = parameter.split_once('=') else {
                return Err(MediaTypeError::invalid(
                    input,
                    format!("parameter '{parameter}' has no value"),
                ));
            };
            let value = unquote(value.trim());
            let name = name.trim().to_ascii_lowercase();
            if name == QUALITY_PARAM {
                match value.parse::<f64>() {
                    Ok(q) if (0.0..=1.0).contains(&q) => {}
                    _ => {
                        return Err(MediaTypeError::invalid(
                            input,
                            format!("invalid quality value '{value}'"),
                        ));
                    }
                }
            }
            media_type.parameters.insert(name, value.to_string());
        }
        Ok(media_type)
    }

    /// Parses a comma-separated list of media types, such as an `Accept` header.
    pub fn parse_list(input: &str) -> MediaTypeResult<Vec<Self>> {
        split_outside_quotes(input, ',')
            .into_iter()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(Self::parse)
            .collect()
    }

    /// Returns the primary type.
    pub fn type_(&self) -> &str {
        &self.type_
    }

    /// Returns the subtype.
    pub fn subtype(&self) -> &str {
        &self.subtype
    }

    /// Returns the structured-syntax suffix of the subtype (`json` for `vnd.api+json`).
    pub fn subtype_suffix(&self) -> Option<&str> {
        self.subtype.rsplit_once('+').map(|(_, suffix)| suffix)
    }

    /// Returns a parameter value.
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(String::as_str)
    }

    /// Returns all parameters.
    pub fn parameters(&self) -> &BTreeMap<String, String> {
        &self.parameters
    }

    /// Returns `true` for `*` as the primary type.
    pub fn is_wildcard_type(&self) -> bool {
        self.type_ == WILDCARD
    }

    /// Returns `true` for `*` or `*+suffix` as the subtype.
    pub fn is_wildcard_subtype(&self) -> bool {
        self.subtype == WILDCARD || self.subtype.starts_with("*+")
    }

    /// Returns `true` if neither the type nor the subtype is a wildcard.
    pub fn is_concrete(&self) -> bool {
        !self.is_wildcard_type() && !self.is_wildcard_subtype()
    }

    /// Returns the `q` parameter, defaulting to `1.0`.
    pub fn quality(&self) -> f64 {
        self.parameter(QUALITY_PARAM)
            .and_then(|q| q.parse().ok())
            .unwrap_or(1.0)
    }

    /// Returns a copy carrying the quality value of `other`, if it has one.
    pub fn copy_quality_value(&self, other: &MediaType) -> MediaType {
        match other.parameter(QUALITY_PARAM) {
            Some(q) => self.clone().with_parameter(QUALITY_PARAM, q),
            None => self.clone(),
        }
    }

    /// Returns a copy without a quality value.
    pub fn remove_quality_value(&self) -> MediaType {
        let mut copy = self.clone();
        copy.parameters.remove(QUALITY_PARAM);
        copy
    }

    /// Returns `true` if this media type includes `other`.
    ///
    /// `text/*` includes `text/plain`, `application/*+xml` includes
    /// `application/soap+xml`, but not the other way around.
    pub fn includes(&self, other: &MediaType) -> bool {
        if self.is_wildcard_type() {
            return true;
        }
        if self.type_ != other.type_ {
            return false;
        }
        if self.subtype == other.subtype {
            return true;
        }
        if !self.is_wildcard_subtype() {
            return false;
        }
        match self.subtype.rsplit_once('+') {
            None => true,
            Some((stem, suffix)) => stem == WILDCARD && other.subtype_suffix() == Some(suffix),
        }
    }

    /// Returns `true` if this media type is compatible with `other`.
    ///
    /// Unlike [`includes`](Self::includes) the relation is symmetric.
    pub fn is_compatible_with(&self, other: &MediaType) -> bool {
        if self.is_wildcard_type() || other.is_wildcard_type() {
            return true;
        }
        if self.type_ != other.type_ {
            return false;
        }
        if self.subtype == other.subtype {
            return true;
        }
        if !self.is_wildcard_subtype() && !other.is_wildcard_subtype() {
            return false;
        }
        if self.subtype == WILDCARD || other.subtype == WILDCARD {
            return true;
        }

        let this_suffix = self.subtype_suffix();
        let other_suffix = other.subtype_suffix();
        if self.is_wildcard_subtype()
            && let Some(suffix) = this_suffix
        {
            return suffix == other.subtype || Some(suffix) == other_suffix;
        }
        if other.is_wildcard_subtype()
            && let Some(suffix) = other_suffix
        {
            return self.subtype == suffix || Some(suffix) == this_suffix;
        }
        false
    }

    fn wildcard_count(&self) -> u8 {
        u8::from(self.is_wildcard_type()) + u8::from(self.is_wildcard_subtype())
    }

    fn specificity_parameter_count(&self) -> usize {
        self.parameters
            .keys()
            .filter(|k| k.as_str() != QUALITY_PARAM)
            .count()
    }

    /// Compares two media types by specificity alone.
    ///
    /// Returns `Less` when `self` is more specific. Types that cannot be
    /// ranked against each other (`text/html` vs `application/json`)
    /// compare `Equal`.
    pub fn specificity_cmp(&self, other: &MediaType) -> Ordering {
        match (self.is_wildcard_type(), other.is_wildcard_type()) {
            (true, false) => return Ordering::Greater,
            (false, true) => return Ordering::Less,
            _ => {}
        }
        if self.type_ != other.type_ {
            return Ordering::Equal;
        }
        match (self.is_wildcard_subtype(), other.is_wildcard_subtype()) {
            (true, false) => return Ordering::Greater,
            (false, true) => return Ordering::Less,
            _ => {}
        }
        if self.subtype != other.subtype {
            return Ordering::Equal;
        }
        quality_key(other.quality())
            .cmp(&quality_key(self.quality()))
            .then_with(|| {
                other
                    .specificity_parameter_count()
                    .cmp(&self.specificity_parameter_count())
            })
    }

    /// Picks the more specific of an acceptable and a producible type.
    ///
    /// The producible side inherits the acceptable side's quality value.
    pub fn more_specific(acceptable: &MediaType, producible: &MediaType) -> MediaType {
        let producible = producible.copy_quality_value(acceptable);
        if acceptable.specificity_cmp(&producible) != Ordering::Greater {
            acceptable.clone()
        } else {
            producible
        }
    }

    /// Sorts media types by specificity, then by quality.
    ///
    /// Fewer wildcards come first, then higher quality, then more
    /// parameters. The sort is stable, so equally ranked types keep their
    /// input order.
    pub fn sort_by_specificity_and_quality(media_types: &mut [MediaType]) {
        media_types.sort_by_key(|m| {
            (
                m.wildcard_count(),
                Reverse(quality_key(m.quality())),
                Reverse(m.specificity_parameter_count()),
            )
        });
    }
}

/// Quality values carry at most three decimals.
fn quality_key(q: f64) -> u16 {
    (q * 1000.0).round() as u16
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

fn split_outside_quotes(input: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;
    for (i, c) in input.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            c if c == separator && !in_quotes => {
                parts.push(&input[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&input[start..]);
    parts
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.type_, self.subtype)?;
        for (name, value) in &self.parameters {
            write!(f, ";{name}={value}")?;
        }
        Ok(())
    }
}

impl FromStr for MediaType {
    type Err = MediaTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for MediaType {
    type Error = MediaTypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<MediaType> for String {
    fn from(value: MediaType) -> Self {
        value.to_string()
    }
}
