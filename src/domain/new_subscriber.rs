use super::{SubscriberEmail, SubscriberName};

/// Represents a person asking to subscribe, before anything is persisted.
#[derive(Debug)]
pub struct NewSubscriber {
    pub email: SubscriberEmail,
    pub name: SubscriberName,
}
