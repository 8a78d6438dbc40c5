pub mod aws;
pub mod memory;

pub use aws::AwsQueueClient;
pub use memory::InMemoryQueueClient;
