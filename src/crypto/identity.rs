use crate::domain::{NewSubscriber, SubscriberEmail};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, Secret};
use sha3::Sha3_256;

type HmacSha3 = Hmac<Sha3_256>;

/// Secret key used to derive subscriber identifiers and verification tokens.
#[derive(Debug, Clone)]
pub struct HmacSecret(pub Secret<String>);

impl HmacSecret {
    /// Derive the lookup identifier of a subscriber from their email.
    /// The same email always gives the same identifier.
    pub fn derive_ident(&self, email: &SubscriberEmail) -> String {
        let mut mac = self.mac();
        mac.update(b"ident:");
        mac.update(email.as_ref().as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Derive a one-time verification token for a new subscriber.
    /// A random salt is mixed in, so subscribing again after unsubscribing
    /// issues a fresh token.
    pub fn derive_token(&self, subscriber: &NewSubscriber) -> String {
        let mut mac = self.mac();
        mac.update(b"token:");
        mac.update(subscriber.name.as_ref().as_bytes());
        mac.update(subscriber.email.as_ref().as_bytes());
        mac.update(generate_salt().as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn mac(&self) -> HmacSha3 {
        HmacSha3::new_from_slice(self.0.expose_secret().as_bytes()).unwrap()
    }
}

/// Generate a random 25-characters-long salt.
fn generate_salt() -> String {
    use rand::{distributions::Alphanumeric, thread_rng, Rng};
    let mut rng = thread_rng();

    std::iter::repeat_with(|| rng.sample(Alphanumeric))
        .map(char::from)
        .take(25)
        .collect()
}
