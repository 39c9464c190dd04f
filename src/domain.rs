mod content_block;
mod new_subscriber;
mod subscriber_email;
mod subscriber_name;

pub use content_block::ContentBlock;
pub use new_subscriber::NewSubscriber;
pub use subscriber_email::SubscriberEmail;
pub use subscriber_name::SubscriberName;
