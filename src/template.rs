//! Placeholder substitution for subjects and bodies.
//!
//! Tokens are written as `[KEY]`:
//!
//! ```
//! use std::collections::HashMap;
//! use outreach::render;
//!
//! let vars = HashMap::from([("DONOR_NAME".to_string(), "Ada".to_string())]);
//! assert_eq!(render("Dear [DONOR_NAME],", &vars), "Dear Ada,");
//! ```
//!
//! With the `templates` feature, the built-in transactional emails
//! ([`DonationReceipt`], [`Welcome`]) are rendered with askama instead.

use std::collections::HashMap;

use crate::message::Message;

/// Values keyed by token name, without the brackets.
pub type Variables = HashMap<String, String>;

/// Replace every `[KEY]` whose key is in `variables`.
///
/// Matching is exact and case-sensitive. Unknown tokens pass through, unused
/// variables are ignored, and substituted values are never scanned again, so
/// a value containing bracket syntax comes out literally.
pub fn render(content: &str, variables: &Variables) -> String {
    if variables.is_empty() {
        return content.to_string();
    }

    let mut out = String::with_capacity(content.len());
    let mut rest = content;

    while let Some(open) = rest.find('[') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let replacement = after
            .find(']')
            .and_then(|close| variables.get(&after[..close]).map(|value| (close, value)));

        match replacement {
            Some((close, value)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                // Not a known token; the next '[' may still start one.
                out.push('[');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

/// Render subject, HTML body and explicit plain-text body of a message.
pub fn render_message(message: &Message, variables: &Variables) -> Message {
    let mut rendered = message.clone();
    rendered.subject = render(&message.subject, variables);
    rendered.html_body = render(&message.html_body, variables);
    rendered.text_body = message.text_body.as_deref().map(|t| render(t, variables));
    rendered
}

#[cfg(feature = "templates")]
pub use builtin::{DonationReceipt, TransactionalTemplate, Welcome};

#[cfg(feature = "templates")]
mod builtin {
    use askama::Template;

    use crate::address::Address;
    use crate::message::Message;

    /// An askama template that knows its subject and recipient.
    pub trait TransactionalTemplate: Template {
        fn subject(&self) -> String;

        fn to(&self) -> Address;

        /// Render into a [`Message`] with the template as HTML body.
        fn into_message(self) -> Result<Message, askama::Error>
        where
            Self: Sized,
        {
            let html = self.render()?;
            Ok(Message::new()
                .to(self.to())
                .subject(self.subject())
                .html_body(html))
        }
    }

    /// Acknowledgment sent after a donation is recorded.
    #[derive(Template)]
    #[template(path = "donation_receipt.html")]
    pub struct DonationReceipt {
        pub donor_name: String,
        pub donor_email: String,
        pub organization: String,
        /// Pre-formatted amount, e.g. "$50.00".
        pub amount: String,
        pub date: String,
    }

    impl TransactionalTemplate for DonationReceipt {
        fn subject(&self) -> String {
            format!("Thank you for your donation to {}", self.organization)
        }

        fn to(&self) -> Address {
            Address::with_name(&self.donor_name, &self.donor_email)
        }
    }

    /// Welcome email for newly enrolled volunteers and subscribers.
    #[derive(Template)]
    #[template(path = "welcome.html")]
    pub struct Welcome {
        pub name: String,
        pub email: String,
        pub organization: String,
    }

    impl TransactionalTemplate for Welcome {
        fn subject(&self) -> String {
            format!("Welcome to {}!", self.organization)
        }

        fn to(&self) -> Address {
            Address::with_name(&self.name, &self.email)
        }
    }
}
