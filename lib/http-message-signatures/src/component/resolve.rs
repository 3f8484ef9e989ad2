use super::{ComponentId, DerivedComponent};
use crate::{
    error::{Error, ErrorKind, Result},
    message::{Message, Target},
};
use http::{header::HOST, HeaderMap, HeaderName, Uri};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::str::FromStr;

/// Everything besides the unreserved characters gets percent-encoded
const QUERY_PARAM_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Compute the value of a component for the given message
///
/// The value is the part after the `": "` of a signature base line
pub fn resolve<M>(component: &ComponentId, message: &M) -> Result<String>
where
    M: Message + ?Sized,
{
    if component.is_derived() {
        resolve_derived(component, message)
    } else {
        resolve_field(component, message.headers())
    }
}

fn resolve_field(component: &ComponentId, headers: &HeaderMap) -> Result<String> {
    if let Some((key, _)) = component.params().iter().next() {
        return Err(Error::new(
            ErrorKind::Unsupported,
            format!(
                "Parameter '{}' on field '{}' isn't supported",
                key.as_str(),
                component.name()
            ),
        ));
    }

    let name = HeaderName::from_str(component.name()).map_err(|error| {
        Error::with_source(
            ErrorKind::InvalidSignatureOptions,
            format!("'{}' isn't a valid field name", component.name()),
            error,
        )
    })?;

    let mut values = headers.get_all(&name).iter();
    let Some(value) = values.next() else {
        return Err(Error::new(
            ErrorKind::InvalidComponent,
            format!("Field '{name}' is missing from the message"),
        ));
    };

    if values.next().is_some() {
        return Err(Error::new(
            ErrorKind::Unsupported,
            format!("Field '{name}' occurs more than once"),
        ));
    }

    let value = value.to_str().map_err(|error| {
        Error::with_source(
            ErrorKind::InvalidComponent,
            format!("Field '{name}' isn't visible ASCII"),
            error,
        )
    })?;

    Ok(value.trim().to_string())
}

fn resolve_derived<M>(component: &ComponentId, message: &M) -> Result<String>
where
    M: Message + ?Sized,
{
    let derived = DerivedComponent::from_str(component.name()).map_err(|_| {
        Error::new(
            ErrorKind::Unsupported,
            format!("Unknown derived component '{}'", component.name()),
        )
    })?;

    if let Some((key, _)) = component
        .params()
        .iter()
        .find(|(key, _)| derived != DerivedComponent::QueryParam || key.as_str() != "name")
    {
        return Err(Error::new(
            ErrorKind::Unsupported,
            format!(
                "Parameter '{}' on component '{}' isn't supported",
                key.as_str(),
                component.name()
            ),
        ));
    }

    match (derived, message.target()) {
        (DerivedComponent::Status, Target::Response { status }) => Ok(status.as_str().to_string()),
        (DerivedComponent::Status, Target::Request { .. }) => Err(Error::new(
            ErrorKind::InvalidSignatureOptions,
            "'@status' is only applicable to responses",
        )),
        (_, Target::Response { .. }) => Err(Error::new(
            ErrorKind::InvalidSignatureOptions,
            format!("'{}' is only applicable to requests", component.name()),
        )),
        (DerivedComponent::Method, Target::Request { method, .. }) => {
            Ok(method.as_str().to_string())
        }
        (DerivedComponent::TargetUri, Target::Request { uri, .. }) => {
            let authority = authority(uri, message.headers())?;
            Ok(format!("{}://{authority}{}", scheme(uri), request_target(uri)))
        }
        (DerivedComponent::Authority, Target::Request { uri, .. }) => {
            authority(uri, message.headers())
        }
        (DerivedComponent::Scheme, Target::Request { uri, .. }) => Ok(scheme(uri)),
        (DerivedComponent::RequestTarget, Target::Request { uri, .. }) => Ok(request_target(uri)),
        (DerivedComponent::Path, Target::Request { uri, .. }) => Ok(path(uri).to_string()),
        (DerivedComponent::Query, Target::Request { uri, .. }) => {
            Ok(format!("?{}", uri.query().unwrap_or_default()))
        }
        (DerivedComponent::QueryParam, Target::Request { uri, .. }) => query_param(component, uri),
    }
}

fn scheme(uri: &Uri) -> String {
    uri.scheme_str().unwrap_or("https").to_ascii_lowercase()
}

fn authority(uri: &Uri, headers: &HeaderMap) -> Result<String> {
    if let Some(authority) = uri.authority() {
        return Ok(authority.as_str().to_ascii_lowercase());
    }

    let host = headers.get(HOST).ok_or_else(|| {
        Error::new(
            ErrorKind::InvalidComponent,
            "Request has neither an absolute URI nor a host header",
        )
    })?;

    let host = host.to_str().map_err(|error| {
        Error::with_source(
            ErrorKind::InvalidComponent,
            "Host header isn't visible ASCII",
            error,
        )
    })?;

    Ok(host.trim().to_ascii_lowercase())
}

fn path(uri: &Uri) -> &str {
    match uri.path() {
        "" => "/",
        path => path,
    }
}

fn request_target(uri: &Uri) -> String {
    match uri.query() {
        Some(query) => format!("{}?{query}", path(uri)),
        None => path(uri).to_string(),
    }
}

fn query_param(component: &ComponentId, uri: &Uri) -> Result<String> {
    let Some(name) = component.param("name").and_then(sfv::BareItem::as_string) else {
        return Err(Error::new(
            ErrorKind::InvalidSignatureOptions,
            "'@query-param' needs a string 'name' parameter",
        ));
    };

    let value = form_urlencoded::parse(uri.query().unwrap_or_default().as_bytes())
        .find(|(key, _)| key == name.as_str())
        .map(|(_, value)| value)
        .ok_or_else(|| {
            Error::new(
                ErrorKind::InvalidSignatureOptions,
                format!("Query parameter '{}' not found", name.as_str()),
            )
        })?;

    Ok(utf8_percent_encode(&value, QUERY_PARAM_ENCODE_SET).to_string())
}

#[cfg(test)]
mod test {
    use super::resolve;
    use crate::{component::ComponentId, ErrorKind};
    use http::{Method, Request, Response, StatusCode};

    fn request() -> Request<()> {
        Request::builder()
            .method(Method::POST)
            .uri("https://Example.com/foo?param=Value&Pet=dog")
            .header("Content-Type", "application/json")
            .header("X-Padded", "  padded value  ")
            .header("Cache-Control", "max-age=60")
            .header("Cache-Control", "must-revalidate")
            .body(())
            .unwrap()
    }

    fn value(component: &str) -> Result<String, crate::Error> {
        let component: ComponentId = component.parse()?;
        resolve(&component, &request())
    }

    #[test]
    fn derived_components() {
        assert_eq!(value("@method").unwrap(), "POST");
        assert_eq!(
            value("@target-uri").unwrap(),
            "https://example.com/foo?param=Value&Pet=dog"
        );
        assert_eq!(value("@authority").unwrap(), "example.com");
        assert_eq!(value("@scheme").unwrap(), "https");
        assert_eq!(value("@request-target").unwrap(), "/foo?param=Value&Pet=dog");
        assert_eq!(value("@path").unwrap(), "/foo");
        assert_eq!(value("@query").unwrap(), "?param=Value&Pet=dog");
        assert_eq!(value(r#""@query-param";name="Pet""#).unwrap(), "dog");
        assert_eq!(value(r#""@query-param";name="param""#).unwrap(), "Value");
    }

    #[test]
    fn query_param_is_reencoded() {
        let request = Request::builder()
            .uri("https://example.com/?q=a%20b%2Fc&empty")
            .body(())
            .unwrap();

        let component = ComponentId::query_param("q").unwrap();
        assert_eq!(resolve(&component, &request).unwrap(), "a%20b%2Fc");

        let component = ComponentId::query_param("empty").unwrap();
        assert_eq!(resolve(&component, &request).unwrap(), "");
    }

    #[test]
    fn missing_query() {
        let request = Request::builder()
            .uri("https://example.com/foo")
            .body(())
            .unwrap();

        let component = "@query".parse().unwrap();
        assert_eq!(resolve(&component, &request).unwrap(), "?");

        let component = ComponentId::query_param("Pet").unwrap();
        let error = resolve(&component, &request).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::InvalidSignatureOptions);
    }

    #[test]
    fn origin_form_uses_host() {
        let request = Request::builder()
            .uri("/foo")
            .header("Host", "Example.org:8443")
            .body(())
            .unwrap();

        let component = "@target-uri".parse().unwrap();
        assert_eq!(
            resolve(&component, &request).unwrap(),
            "https://example.org:8443/foo"
        );
    }

    #[test]
    fn fields() {
        assert_eq!(value("content-type").unwrap(), "application/json");
        assert_eq!(value("x-padded").unwrap(), "padded value");
        assert_eq!(
            value("x-missing").unwrap_err().kind(),
            ErrorKind::InvalidComponent
        );
        assert_eq!(
            value("cache-control").unwrap_err().kind(),
            ErrorKind::Unsupported
        );
        assert_eq!(
            value(r#""content-type";sf"#).unwrap_err().kind(),
            ErrorKind::Unsupported
        );
    }

    #[test]
    fn unknown_or_misplaced_components() {
        assert_eq!(value("@nope").unwrap_err().kind(), ErrorKind::Unsupported);
        assert_eq!(
            value(r#""@method";req"#).unwrap_err().kind(),
            ErrorKind::Unsupported
        );
        assert_eq!(
            value("@status").unwrap_err().kind(),
            ErrorKind::InvalidSignatureOptions
        );
    }

    #[test]
    fn response_components() {
        let response = Response::builder()
            .status(StatusCode::NOT_FOUND)
            .header("Content-Type", "text/plain")
            .body(())
            .unwrap();

        let status = "@status".parse().unwrap();
        assert_eq!(resolve(&status, &response).unwrap(), "404");

        let method = "@method".parse().unwrap();
        assert_eq!(
            resolve(&method, &response).unwrap_err().kind(),
            ErrorKind::InvalidSignatureOptions
        );
    }
}
