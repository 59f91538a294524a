pub mod association;
pub mod content_object;
pub mod instance;
