pub mod descriptors;
pub mod endpoint;
pub mod http;
pub mod soap;

pub use endpoint::{DeviceEndpoint, EndpointSettings};
