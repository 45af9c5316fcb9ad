mod publisher;
mod s3;
#[cfg(test)]
pub mod testing;
mod traits;

pub use publisher::Publisher;
pub use s3::S3Storage;
pub use traits::ObjectStorage;
