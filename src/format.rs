//! Format validators
//!
//! `format` on a `str` node names a semantic check looked up in a
//! [`FormatRegistry`]. Unknown names are rejected when the schema is resolved,
//! so validation never sees a format it cannot check.

use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

/// A semantic string check
pub trait FormatValidator: Send + Sync {
    fn is_valid(&self, value: &str) -> bool;
}

impl<F> FormatValidator for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn is_valid(&self, value: &str) -> bool {
        self(value)
    }
}

/// Registry of format validators keyed by format name
#[derive(Clone)]
pub struct FormatRegistry {
    validators: HashMap<String, Arc<dyn FormatValidator>>,
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FormatRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.validators.keys().collect();
        names.sort();
        f.debug_struct("FormatRegistry").field("formats", &names).finish()
    }
}

impl FormatRegistry {
    /// Registry with the built-in network formats
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register("ipv4", |v: &str| v.parse::<Ipv4Addr>().is_ok());
        registry.register("ipv6", |v: &str| v.parse::<Ipv6Addr>().is_ok());
        registry.register("ip", |v: &str| v.parse::<IpAddr>().is_ok());
        registry.register("ipv4_cidr", |v: &str| is_cidr::<Ipv4Addr>(v, 32));
        registry.register("ipv6_cidr", |v: &str| is_cidr::<Ipv6Addr>(v, 128));
        registry.register("cidr", |v: &str| {
            is_cidr::<Ipv4Addr>(v, 32) || is_cidr::<Ipv6Addr>(v, 128)
        });
        let mac = Regex::new(r"^[0-9a-fA-F]{2}([:-][0-9a-fA-F]{2}){5}$|^[0-9a-fA-F]{4}\.[0-9a-fA-F]{4}\.[0-9a-fA-F]{4}$")
            .expect("mac address pattern is valid");
        registry.register("mac", move |v: &str| mac.is_match(v));
        registry
    }

    /// Registry without any formats
    pub fn empty() -> Self {
        Self {
            validators: HashMap::new(),
        }
    }

    /// Add or replace a format validator
    pub fn register(&mut self, name: impl Into<String>, validator: impl FormatValidator + 'static) {
        self.validators.insert(name.into(), Arc::new(validator));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.validators.contains_key(name)
    }

    /// Check `value` against format `name`; `None` if the format is unknown
    pub fn check(&self, name: &str, value: &str) -> Option<bool> {
        self.validators.get(name).map(|v| v.is_valid(value))
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.validators.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

fn is_cidr<A: std::str::FromStr>(value: &str, max_prefix: u8) -> bool {
    let Some((address, prefix)) = value.split_once('/') else {
        return false;
    };
    address.parse::<A>().is_ok()
        && prefix
            .parse::<u8>()
            .map(|p| p <= max_prefix)
            .unwrap_or(false)
}
