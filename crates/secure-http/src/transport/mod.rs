//! The transport seam.
//!
//! A [`Transport`] performs the network I/O for one verb given a
//! [`RequestDescriptor`]. The client never inspects a transport's responses
//! or errors; it only awaits them.
//!
//! # Example
//!
//! ```ignore
//! use secure_http::transport::{ReqwestTransport, Transport};
//!
//! let transport = ReqwestTransport::builder()
//!     .timeout(Duration::from_secs(10))
//!     .build()?;
//! let response = transport.get(descriptor).await?;
//! ```

mod reqwest_transport;
mod response;

use std::future::Future;
use std::sync::Arc;

use crate::descriptor::{HttpMethod, RequestDescriptor};

pub use reqwest_transport::{ReqwestTransport, ReqwestTransportBuilder, TransportConfig};
pub use response::{ResponseBody, TransportResponse};

/// Performs outbound requests, one async operation per verb.
pub trait Transport: Send + Sync {
    /// The parsed response produced by a successful call.
    type Response: Send;
    /// The failure produced by an unsuccessful call.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Perform a GET request.
    fn get(
        &self,
        request: RequestDescriptor,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send;

    /// Perform a POST request.
    fn post(
        &self,
        request: RequestDescriptor,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send;

    /// Perform a PUT request.
    fn put(
        &self,
        request: RequestDescriptor,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send;

    /// Perform a PATCH request.
    fn patch(
        &self,
        request: RequestDescriptor,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send;

    /// Perform a DELETE request.
    fn delete(
        &self,
        request: RequestDescriptor,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send;
}

/// Route a descriptor to the transport operation for its method.
pub async fn dispatch<T: Transport>(
    transport: &T,
    request: RequestDescriptor,
) -> Result<T::Response, T::Error> {
    match request.method() {
        HttpMethod::Get => transport.get(request).await,
        HttpMethod::Post => transport.post(request).await,
        HttpMethod::Put => transport.put(request).await,
        HttpMethod::Patch => transport.patch(request).await,
        HttpMethod::Delete => transport.delete(request).await,
    }
}

impl<T: Transport> Transport for &T {
    type Response = T::Response;
    type Error = T::Error;

    fn get(
        &self,
        request: RequestDescriptor,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send {
        (**self).get(request)
    }

    fn post(
        &self,
        request: RequestDescriptor,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send {
        (**self).post(request)
    }

    fn put(
        &self,
        request: RequestDescriptor,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send {
        (**self).put(request)
    }

    fn patch(
        &self,
        request: RequestDescriptor,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send {
        (**self).patch(request)
    }

    fn delete(
        &self,
        request: RequestDescriptor,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send {
        (**self).delete(request)
    }
}

impl<T: Transport> Transport for Arc<T> {
    type Response = T::Response;
    type Error = T::Error;

    fn get(
        &self,
        request: RequestDescriptor,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send {
        self.as_ref().get(request)
    }

    fn post(
        &self,
        request: RequestDescriptor,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send {
        self.as_ref().post(request)
    }

    fn put(
        &self,
        request: RequestDescriptor,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send {
        self.as_ref().put(request)
    }

    fn patch(
        &self,
        request: RequestDescriptor,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send {
        self.as_ref().patch(request)
    }

    fn delete(
        &self,
        request: RequestDescriptor,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send {
        self.as_ref().delete(request)
    }
}
