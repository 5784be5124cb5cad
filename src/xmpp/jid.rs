//! RFC 7622 addresses.

use std::error::Error;
use std::fmt::Display;
use std::str::FromStr;

pub mod description {
    pub const EMPTY_DOMAIN: &str = "Domain part is empty";
    pub const EMPTY_LOCAL: &str = "Local part is empty";
    pub const EMPTY_RESOURCE: &str = "Resource part is empty";
    pub const PART_TOO_LONG: &str = "Address part is longer than 1023 bytes";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JidError(pub &'static str);

impl Display for JidError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid address: {}", self.0)
    }
}

impl Error for JidError {}

const MAX_PART_BYTES: usize = 1023;

/// An XMPP address. The local and domain parts are case-folded on
/// construction; the resource keeps its case.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Jid {
    local: Option<String>,
    domain: String,
    resource: Option<String>,
}

impl Jid {
    pub fn new(
        local: Option<&str>,
        domain: &str,
        resource: Option<&str>,
    ) -> Result<Jid, JidError> {
        let domain = prepare_domain(domain)?;
        let local = match local {
            Some(local) => Some(prepare_part(local, description::EMPTY_LOCAL)?.to_lowercase()),
            None => None,
        };
        let resource = match resource {
            Some(resource) => Some(prepare_part(resource, description::EMPTY_RESOURCE)?),
            None => None,
        };
        Ok(Jid {
            local,
            domain,
            resource,
        })
    }

    pub fn local(&self) -> Option<&str> {
        self.local.as_deref()
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn resource(&self) -> Option<&str> {
        self.resource.as_deref()
    }

    /// The address without its resource.
    pub fn bare(&self) -> Jid {
        Jid {
            local: self.local.clone(),
            domain: self.domain.clone(),
            resource: None,
        }
    }

    pub fn is_bare(&self) -> bool {
        self.resource.is_none()
    }

    /// The full textual form, present only when the address carries a
    /// resource.
    pub fn full(&self) -> Option<String> {
        self.resource.as_ref().map(|_| self.to_string())
    }

    /// Whether both addresses name the same account, ignoring
    /// resources.
    pub fn same_account(&self, other: &Jid) -> bool {
        self.local == other.local && self.domain == other.domain
    }
}

fn prepare_domain(domain: &str) -> Result<String, JidError> {
    // A single trailing dot is allowed on the wire but not significant.
    let domain = domain.strip_suffix('.').unwrap_or(domain);
    if domain.is_empty() {
        return Err(JidError(description::EMPTY_DOMAIN));
    }
    if domain.len() > MAX_PART_BYTES {
        return Err(JidError(description::PART_TOO_LONG));
    }
    Ok(domain.to_lowercase())
}

fn prepare_part(part: &str, empty_error: &'static str) -> Result<String, JidError> {
    if part.is_empty() {
        return Err(JidError(empty_error));
    }
    if part.len() > MAX_PART_BYTES {
        return Err(JidError(description::PART_TOO_LONG));
    }
    Ok(part.to_string())
}

impl FromStr for Jid {
    type Err = JidError;

    fn from_str(value: &str) -> Result<Jid, JidError> {
        let (address, resource) = match value.split_once('/') {
            Some((address, resource)) => (address, Some(resource)),
            None => (value, None),
        };
        let (local, domain) = match address.split_once('@') {
            Some((local, domain)) => (Some(local), domain),
            None => (None, address),
        };
        Jid::new(local, domain, resource)
    }
}

impl Display for Jid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(local) = &self.local {
            write!(f, "{local}@")?;
        }
        write!(f, "{}", self.domain)?;
        if let Some(resource) = &self.resource {
            write!(f, "/{resource}")?;
        }
        Ok(())
    }
}
