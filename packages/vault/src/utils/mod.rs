pub mod slug;

pub use slug::{generate_instance_id, validate_instance_id};
