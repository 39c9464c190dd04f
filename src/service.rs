pub mod pages;
pub mod subscribers;

pub use pages::{NewIssue, NewsletterIndex, NewsletterIssue, PageService};
pub use subscribers::{SubscriberService, SubscriberServiceError};
