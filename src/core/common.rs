pub mod http_client_factory;
pub mod transport;

pub use http_client_factory::BackendClient;
pub use transport::BackendError;
