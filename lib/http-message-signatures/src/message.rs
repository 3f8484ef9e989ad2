//!
//! Direction-agnostic view over requests and responses
//!

use http::{Extensions, HeaderMap, Method, Request, Response, StatusCode, Uri};

/// Marker type
///
/// Insert it into the extensions of a message to get the exact signature base back from the
/// verifier
#[derive(Clone, Copy, Debug, Default)]
pub struct AddDebugInfo;

/// Parts of a message derived components are computed from
#[derive(Clone, Copy, Debug)]
pub enum Target<'a> {
    /// The message is a request
    Request {
        /// Request method
        method: &'a Method,

        /// Request URI
        uri: &'a Uri,
    },

    /// The message is a response
    Response {
        /// Response status code
        status: StatusCode,
    },
}

/// HTTP message that can be signed and verified
pub trait Message {
    /// Body type of the message
    type Body;

    /// Method/URI for requests, status code for responses
    fn target(&self) -> Target<'_>;

    /// Headers of the message
    fn headers(&self) -> &HeaderMap;

    /// Mutable access to the headers of the message
    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Mutable access to the body, used to replace it after it has been digested
    fn body_mut(&mut self) -> &mut Self::Body;

    /// Execution context of the message
    fn extensions(&self) -> &Extensions;

    /// Whether the caller asked for debug information via [`AddDebugInfo`]
    fn is_debug(&self) -> bool {
        self.extensions().get::<AddDebugInfo>().is_some()
    }
}

impl<B> Message for Request<B> {
    type Body = B;

    fn target(&self) -> Target<'_> {
        Target::Request {
            method: self.method(),
            uri: self.uri(),
        }
    }

    fn headers(&self) -> &HeaderMap {
        self.headers()
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        self.headers_mut()
    }

    fn body_mut(&mut self) -> &mut Self::Body {
        self.body_mut()
    }

    fn extensions(&self) -> &Extensions {
        self.extensions()
    }
}

impl<B> Message for Response<B> {
    type Body = B;

    fn target(&self) -> Target<'_> {
        Target::Response {
            status: self.status(),
        }
    }

    fn headers(&self) -> &HeaderMap {
        self.headers()
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        self.headers_mut()
    }

    fn body_mut(&mut self) -> &mut Self::Body {
        self.body_mut()
    }

    fn extensions(&self) -> &Extensions {
        self.extensions()
    }
}
