//! Protection of subscriber details at rest.
//!
//! Names and emails are stored encrypted with [`FieldCipher`], which means the
//! database cannot be searched by email. Lookups go through a keyed digest of
//! the email instead, derived by [`HmacSecret`].

mod cipher;
mod identity;

pub use cipher::{CipherError, FieldCipher};
pub use identity::HmacSecret;
