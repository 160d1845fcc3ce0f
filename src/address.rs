//! Sender and destination addresses.

use std::fmt;

use email_address::EmailAddress;
use serde::{Deserialize, Serialize};

/// A mailbox: email plus an optional display name.
///
/// ```
/// use outreach::Address;
///
/// let donor: Address = "ada@example.org".into();
/// assert_eq!(donor.to_string(), "ada@example.org");
///
/// let sender: Address = ("City Food Bank", "news@foodbank.org").into();
/// assert_eq!(sender.to_string(), "City Food Bank <news@foodbank.org>");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub email: String,
}

impl Address {
    /// Wrap an email without checking it. Adapters and [`Message::validate`]
    /// catch bad destinations before anything goes on the wire.
    ///
    /// [`Message::validate`]: crate::Message::validate
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            name: None,
            email: email.into(),
        }
    }

    /// A blank name is treated as no name.
    pub fn with_name(name: impl Into<String>, email: impl Into<String>) -> Self {
        let name = name.into();
        let name = name.trim();
        Self {
            name: (!name.is_empty()).then(|| name.to_string()),
            email: email.into(),
        }
    }

    pub fn is_valid(&self) -> bool {
        is_valid_email(&self.email)
    }

    pub fn domain(&self) -> Option<&str> {
        self.email.rsplit_once('@').map(|(_, domain)| domain)
    }

    /// The email with its domain punycoded, for transports that only speak
    /// ASCII.
    ///
    /// ```
    /// use outreach::Address;
    ///
    /// let addr = Address::new("ada@bücherhalle.de");
    /// assert_eq!(addr.to_ascii().as_deref(), Some("ada@xn--bcherhalle-9db.de"));
    /// ```
    pub fn to_ascii(&self) -> Option<String> {
        let (local, domain) = self.email.rsplit_once('@')?;
        let domain = idna::domain_to_ascii(domain).ok()?;
        Some(format!("{local}@{domain}"))
    }
}

/// The check applied to recipient records, import rows and the configured
/// sender: a syntactically valid address whose domain contains a dot.
///
/// ```
/// use outreach::is_valid_email;
///
/// assert!(is_valid_email("volunteer@foodbank.org"));
/// assert!(!is_valid_email("volunteer@localhost"));
/// ```
pub fn is_valid_email(email: &str) -> bool {
    if !EmailAddress::is_valid(email) {
        return false;
    }
    match email.rsplit_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} <{}>", name, self.email),
            None => f.write_str(&self.email),
        }
    }
}

impl From<&str> for Address {
    fn from(email: &str) -> Self {
        Self::new(email)
    }
}

impl From<String> for Address {
    fn from(email: String) -> Self {
        Self::new(email)
    }
}

impl<N: AsRef<str>, E: AsRef<str>> From<(N, E)> for Address {
    fn from((name, email): (N, E)) -> Self {
        Self::with_name(name.as_ref(), email.as_ref())
    }
}

/// Anything the message builder accepts as a mailbox.
///
/// [`Recipient`](crate::Recipient) implements it, so stored contacts go
/// straight into [`Message::to`](crate::Message::to).
pub trait ToAddress {
    fn to_address(&self) -> Address;
}

impl ToAddress for Address {
    fn to_address(&self) -> Address {
        self.clone()
    }
}

impl ToAddress for str {
    fn to_address(&self) -> Address {
        Address::new(self)
    }
}

impl ToAddress for String {
    fn to_address(&self) -> Address {
        Address::new(self.as_str())
    }
}

impl<N: AsRef<str>, E: AsRef<str>> ToAddress for (N, E) {
    fn to_address(&self) -> Address {
        Address::with_name(self.0.as_ref(), self.1.as_ref())
    }
}

impl<T: ToAddress + ?Sized> ToAddress for &T {
    fn to_address(&self) -> Address {
        (**self).to_address()
    }
}
