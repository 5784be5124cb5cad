//! SASL mechanisms for stream authentication.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub authzid: Option<String>,
}

/// One SASL mechanism: its IANA name and the initial response it
/// produces, already base64 encoded for the wire.
pub trait Mechanism {
    fn name(&self) -> &'static str;
    fn response(&self, credentials: &Credentials) -> String;
}

pub struct Plain;

impl Mechanism for Plain {
    fn name(&self) -> &'static str {
        "PLAIN"
    }

    fn response(&self, credentials: &Credentials) -> String {
        let authzid = credentials.authzid.as_deref().unwrap_or("");
        let message = format!(
            "{authzid}\0{}\0{}",
            credentials.username, credentials.password
        );
        STANDARD.encode(message)
    }
}

pub struct Anonymous;

impl Mechanism for Anonymous {
    fn name(&self) -> &'static str {
        "ANONYMOUS"
    }

    fn response(&self, _credentials: &Credentials) -> String {
        String::new()
    }
}

/// Picks the strongest supported mechanism among those the server
/// offered.
pub fn choose_mechanism(offered: &[String]) -> Option<Box<dyn Mechanism>> {
    let supported: [Box<dyn Mechanism>; 2] = [Box::new(Plain), Box::new(Anonymous)];
    supported
        .into_iter()
        .find(|mechanism| offered.iter().any(|name| name == mechanism.name()))
}
