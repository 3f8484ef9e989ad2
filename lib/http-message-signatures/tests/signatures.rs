use self::data::{created, key_pair, key_store, signing_profile};
use bytes::Bytes;
use http::{HeaderValue, Method};
use http_body_util::Full;
use http_message_signatures::{
    crypto::{parse, Algorithm, SigningKey},
    AcceptSignature, AddDebugInfo, BoxError, Clock, ErrorKind, FetchContext, KeyFetcher, KeySpec,
    Metadata, PrivateKey, Signer, SigningProfile, VerifyProfile, Verifier,
};
use std::{collections::HashMap, future, future::Future, time::Duration};
use strum::IntoEnumIterator;
use tokio_util::sync::CancellationToken;


fn all_algorithms() -> VerifyProfile {
    VerifyProfile::builder()
        .allowed_algorithms(Algorithm::iter().collect())
        .build()
        .unwrap()
}

fn header<'a, B>(request: &'a http::Request<B>, name: &str) -> &'a str {
    request.headers()[name].to_str().unwrap()
}

#[tokio::test]
async fn round_trip() {
    for algorithm in Algorithm::iter() {
        let (private_key, key_spec) = key_pair(algorithm, "test-key");
        let signer = Signer::new(signing_profile(algorithm), private_key)
            .unwrap()
            .with_clock(Clock::fixed(created()));

        let mut request = data::post_request(r#"{"hello": "world"}"#);
        signer.sign(&mut request).await.unwrap();

        let verifier = Verifier::new(key_store([key_spec]), all_algorithms())
            .with_clock(Clock::fixed(created() + Duration::from_secs(10)));
        let result = verifier.verify(&mut request).await.unwrap();

        assert!(result.verified, "{algorithm} didn't verify");
        assert_eq!(result.label.as_deref(), Some("sig1"));
        assert_eq!(
            result
                .key_spec
                .and_then(|key_spec| key_spec.key_id)
                .as_deref(),
            Some("test-key")
        );
    }
}

#[tokio::test]
async fn hmac_vector() {
    let (private_key, _) = key_pair(Algorithm::HmacSha256, "test-key");
    let signer = Signer::new(signing_profile(Algorithm::HmacSha256), private_key)
        .unwrap()
        .with_clock(Clock::fixed(created()));

    let mut request = data::get_request();
    signer.sign(&mut request).await.unwrap();

    assert_eq!(
        header(&request, "content-digest"),
        "sha-256=:47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU=:"
    );
    assert_eq!(
        header(&request, "signature-input"),
        r#"sig1=("content-digest" "@method" "@target-uri");created=1618884473;keyid="test-key""#
    );
    assert_eq!(
        header(&request, "signature"),
        "sig1=:PjAB/KQRPWmAF7W8heF0Ok+kJLtbbTV+up5YGo6GOxw=:"
    );
}

#[tokio::test]
async fn shared_secret_vector() {
    let secret = base64_simd::STANDARD
        .decode_to_vec(
            "uzvJfB4u3N0Jy4T7NZ75MDVcr8zSTInedJtkgcu46YW4XByzNJjxBdtjUkdJPBtbmHhIDi6pcl8jsasjlTMtDQ==",
        )
        .unwrap();

    let profile = SigningProfile::builder()
        .algorithm(Algorithm::HmacSha256)
        .fields(data::components(&["date", "@authority", "content-type"]))
        .metadata(vec![Metadata::Created, Metadata::KeyId])
        .build()
        .unwrap();
    let private_key = PrivateKey::builder()
        .key(SigningKey::secret(secret.clone()))
        .key_id("test-shared-secret")
        .build()
        .unwrap();
    let signer = Signer::new(profile, private_key)
        .unwrap()
        .with_clock(Clock::fixed(created()));

    let mut request = data::post_request(r#"{"hello": "world"}"#);
    signer.sign(&mut request).await.unwrap();

    assert_eq!(
        header(&request, "signature"),
        "sig1=:pxcQw6G3AjtMBQjwo8XzkZf/bws5LelbaMk5rGIGtE8=:"
    );
    assert!(request.headers().get("content-digest").is_none());

    let key_spec = KeySpec {
        key_id: Some("test-shared-secret".into()),
        algorithm: Algorithm::HmacSha256,
        key: SigningKey::secret(secret).verifying_key(),
    };
    let profile = VerifyProfile::builder()
        .required_fields(data::components(&["@authority"]))
        .build()
        .unwrap();
    let verifier = Verifier::new(key_spec, profile).with_clock(Clock::fixed(created()));

    assert!(verifier.verify(&mut request).await.unwrap().verified);
}

#[tokio::test]
async fn ed25519_vector() {
    let public_key = parse::public_key(data::ED25519_PUBLIC_KEY).unwrap();
    let key_spec = KeySpec {
        key_id: Some("poqkLGiymh_W0uP6PZFw-dvez3QJT5SolqXBCW38r0U".into()),
        algorithm: Algorithm::Ed25519,
        key: public_key,
    };

    let mut request = http::Request::builder()
        .uri("https://example.com/")
        .header(
            "Signature-Input",
            r#"sig1=("@authority");created=1735689600;keyid="poqkLGiymh_W0uP6PZFw-dvez3QJT5SolqXBCW38r0U";alg="ed25519";expires=1735693200;nonce="gubxywVx7hzbYKatLgzuKDllDAIXAkz41PydU7aOY7vT+Mb3GJNxW0qD4zJ+IOQ1NVtg+BNbTCRUMt1Ojr5BgA==";tag="web-bot-auth""#,
        )
        .header(
            "Signature",
            "sig1=:uz2SAv+VIemw+Oo890bhYh6Xf5qZdLUgv6/PbiQfCFXcX/vt1A8Pf7OcgL2yUDUYXFtffNpkEr5W6dldqFrkDg==:",
        )
        .body(Full::<Bytes>::default())
        .unwrap();

    let profile = VerifyProfile::builder()
        .required_fields(data::components(&["@authority"]))
        .required_metadata(Vec::new())
        .disallowed_metadata(Vec::new())
        .allowed_algorithms(vec![Algorithm::Ed25519])
        .disable_time_enforcement(true)
        .build()
        .unwrap();

    let result = Verifier::new(key_spec, profile)
        .verify(&mut request)
        .await
        .unwrap();
    assert!(result.verified);

    let metadata = result.metadata.unwrap();
    assert!(metadata.contains(Metadata::Tag));
}

#[tokio::test]
async fn tampering() {
    let profile = SigningProfile::builder()
        .algorithm(Algorithm::Ed25519)
        .fields(data::components(&[
            "content-digest",
            "content-type",
            "@method",
            "@target-uri",
        ]))
        .metadata(vec![Metadata::Created, Metadata::KeyId])
        .build()
        .unwrap();
    let (private_key, key_spec) = key_pair(Algorithm::Ed25519, "test-key");
    let signer = Signer::new(profile, private_key)
        .unwrap()
        .with_clock(Clock::fixed(created()));
    let verifier =
        Verifier::new(key_spec, VerifyProfile::default()).with_clock(Clock::fixed(created()));

    let mut signed = data::post_request(r#"{"hello": "world"}"#);
    signer.sign(&mut signed).await.unwrap();
    let headers = signed.headers().clone();

    let mut request = data::post_request(r#"{"hello": "world"}"#);
    *request.headers_mut() = headers.clone();
    assert!(verifier.verify(&mut request).await.unwrap().verified);

    let mut request = data::post_request(r#"{"hello": "world"}"#);
    *request.headers_mut() = headers.clone();
    *request.method_mut() = Method::PUT;
    let failure = verifier.verify(&mut request).await.unwrap_err();
    assert_eq!(failure.kind(), ErrorKind::SigVerification);

    let mut request = data::post_request(r#"{"hello": "world"}"#);
    *request.headers_mut() = headers.clone();
    request
        .headers_mut()
        .insert("content-type", HeaderValue::from_static("text/plain"));
    let failure = verifier.verify(&mut request).await.unwrap_err();
    assert_eq!(failure.kind(), ErrorKind::SigVerification);
    assert!(failure.result.key_spec.is_some());

    // Headers alone still carry a valid signature
    let mut request = data::post_request(r#"{"hello": "World"}"#);
    *request.headers_mut() = headers;
    let failure = verifier.verify(&mut request).await.unwrap_err();
    assert_eq!(failure.kind(), ErrorKind::NoSigWrongDigest);
    assert!(failure.result.label.is_none());
}

#[tokio::test]
async fn profile_rejects_valid_signature() {
    let profile = SigningProfile::builder()
        .algorithm(Algorithm::HmacSha256)
        .fields(data::components(&["@method"]))
        .metadata(vec![Metadata::Created, Metadata::KeyId])
        .build()
        .unwrap();
    let (private_key, key_spec) = key_pair(Algorithm::HmacSha256, "test-key");
    let signer = Signer::new(profile, private_key)
        .unwrap()
        .with_clock(Clock::fixed(created()));

    let mut request = data::get_request();
    signer.sign(&mut request).await.unwrap();

    let failure = Verifier::new(key_spec, VerifyProfile::default())
        .with_clock(Clock::fixed(created()))
        .verify(&mut request)
        .await
        .unwrap_err();

    assert_eq!(failure.kind(), ErrorKind::SigFailedProfile);
    assert_eq!(failure.result.label.as_deref(), Some("sig1"));
    assert!(failure.result.key_spec.is_some());
    assert!(!failure.result.verified);
}

#[tokio::test]
async fn disallowed_algorithm() {
    let (private_key, key_spec) = key_pair(Algorithm::RsaPssSha512, "test-key");
    let signer = Signer::new(signing_profile(Algorithm::RsaPssSha512), private_key)
        .unwrap()
        .with_clock(Clock::fixed(created()));

    let mut request = data::get_request();
    signer.sign(&mut request).await.unwrap();

    let failure = Verifier::new(key_spec, VerifyProfile::default())
        .with_clock(Clock::fixed(created()))
        .verify(&mut request)
        .await
        .unwrap_err();
    assert_eq!(failure.kind(), ErrorKind::SigFailedProfile);
}

#[tokio::test]
async fn signature_ages() {
    let (private_key, key_spec) = key_pair(Algorithm::Ed25519, "test-key");
    let profile = SigningProfile::builder()
        .algorithm(Algorithm::Ed25519)
        .fields(data::components(&["content-digest", "@method", "@target-uri"]))
        .metadata(vec![Metadata::Created, Metadata::Expires, Metadata::KeyId])
        .expires_in(Duration::from_secs(60))
        .build()
        .unwrap();
    let signer = Signer::new(profile, private_key)
        .unwrap()
        .with_clock(Clock::fixed(created()));

    let mut request = data::get_request();
    signer.sign(&mut request).await.unwrap();
    assert!(header(&request, "signature-input").contains("expires=1618884533"));

    let (clock, handle) = Clock::mockable(created());
    let verifier = Verifier::new(key_spec, VerifyProfile::default()).with_clock(clock);
    assert!(verifier.verify(&mut request).await.is_ok());

    handle.advance(Duration::from_secs(61));
    let failure = verifier.verify(&mut request).await.unwrap_err();
    assert_eq!(failure.kind(), ErrorKind::SigFailedProfile);

    handle.rewind(Duration::from_secs(62));
    let failure = verifier.verify(&mut request).await.unwrap_err();
    assert_eq!(failure.kind(), ErrorKind::SigFailedProfile);
}

#[tokio::test]
async fn response_status() {
    let profile = SigningProfile::builder()
        .algorithm(Algorithm::EcdsaP256Sha256)
        .fields(data::components(&["@status", "content-type", "content-digest"]))
        .metadata(vec![Metadata::Created, Metadata::KeyId, Metadata::Nonce])
        .build()
        .unwrap();
    let (private_key, key_spec) = key_pair(Algorithm::EcdsaP256Sha256, "server-key");
    let signer = Signer::new(profile, private_key)
        .unwrap()
        .with_clock(Clock::fixed(created()));

    let mut response = data::get_response();
    signer.sign(&mut response).await.unwrap();
    assert!(response.headers().contains_key("content-digest"));

    let profile = VerifyProfile::builder()
        .required_fields(data::components(&["@status", "content-digest"]))
        .build()
        .unwrap();
    let result = Verifier::new(key_spec, profile)
        .with_clock(Clock::fixed(created()))
        .verify(&mut response)
        .await
        .unwrap();
    assert!(result.verified);

    let mut request = data::get_request();
    *request.headers_mut() = response.headers().clone();
    request.headers_mut().remove("content-digest");
    let failure = Verifier::new(
        key_pair(Algorithm::EcdsaP256Sha256, "server-key").1,
        VerifyProfile::default(),
    )
    .verify(&mut request)
        .await
        .unwrap_err();
    assert_eq!(failure.kind(), ErrorKind::InvalidSignatureOptions);
}

#[tokio::test]
async fn multiple_labels() {
    let (first_key, first_spec) = key_pair(Algorithm::Ed25519, "first");
    let (second_key, second_spec) = key_pair(Algorithm::HmacSha256, "second");

    let mut second_profile = signing_profile(Algorithm::HmacSha256);
    second_profile.label = "proxy".into();

    let first = Signer::new(signing_profile(Algorithm::Ed25519), first_key)
        .unwrap()
        .with_clock(Clock::fixed(created()));
    let second = Signer::new(second_profile, second_key)
        .unwrap()
        .with_clock(Clock::fixed(created()));

    let mut request = data::get_request();
    first.sign(&mut request).await.unwrap();
    second.sign(&mut request).await.unwrap();
    // Signing again replaces the member instead of adding another one
    second.sign(&mut request).await.unwrap();

    let signature = sfv::Parser::new(header(&request, "signature"))
        .parse_dictionary()
        .unwrap();
    assert_eq!(signature.len(), 2);

    let keys = key_store([first_spec, second_spec]);
    for label in ["sig1", "proxy"] {
        let profile = VerifyProfile::builder().label(label).build().unwrap();
        let result = Verifier::new(keys.clone(), profile)
            .with_clock(Clock::fixed(created()))
            .verify(&mut request)
            .await
            .unwrap();
        assert_eq!(result.label.as_deref(), Some(label));
    }

    let profile = VerifyProfile::builder().label("*").build().unwrap();
    let result = Verifier::new(keys, profile)
        .with_clock(Clock::fixed(created()))
        .verify(&mut request)
        .await
        .unwrap();
    assert_eq!(result.label.as_deref(), Some("sig1"));
}

#[tokio::test]
async fn debug_info() {
    let (private_key, key_spec) = key_pair(Algorithm::HmacSha256, "test-key");
    let signer = Signer::new(signing_profile(Algorithm::HmacSha256), private_key)
        .unwrap()
        .with_clock(Clock::fixed(created()));
    let verifier =
        Verifier::new(key_spec, VerifyProfile::default()).with_clock(Clock::fixed(created()));

    let mut request = data::get_request();
    signer.sign(&mut request).await.unwrap();

    let result = verifier.verify(&mut request).await.unwrap();
    assert!(result.debug.is_none());

    request.extensions_mut().insert(AddDebugInfo);
    let result = verifier.verify(&mut request).await.unwrap();
    assert_eq!(
        result.debug.unwrap().signature_base,
        "\"content-digest\": sha-256=:47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU=:\n\
         \"@method\": GET\n\
         \"@target-uri\": https://example.com/foo?param=Value&Pet=dog\n\
         \"@signature-params\": (\"content-digest\" \"@method\" \"@target-uri\");created=1618884473;keyid=\"test-key\""
    );
}

struct Stalled;

impl KeyFetcher for Stalled {
    fn fetch_by_key_id(
        &self,
        _context: &FetchContext<'_>,
        _key_id: &str,
    ) -> impl Future<Output = Result<KeySpec, BoxError>> + Send {
        future::pending::<Result<KeySpec, BoxError>>()
    }
}

#[tokio::test]
async fn cancelled_key_fetch() {
    let (private_key, _) = key_pair(Algorithm::HmacSha256, "test-key");
    let signer = Signer::new(signing_profile(Algorithm::HmacSha256), private_key)
        .unwrap()
        .with_clock(Clock::fixed(created()));

    let mut request = data::get_request();
    signer.sign(&mut request).await.unwrap();

    let token = CancellationToken::new();
    token.cancel();
    request.extensions_mut().insert(token);

    let failure = Verifier::new(Stalled, VerifyProfile::default())
        .with_clock(Clock::fixed(created()))
        .verify(&mut request)
        .await
        .unwrap_err();
    assert_eq!(failure.kind(), ErrorKind::SigKeyFetch);
}

#[tokio::test]
async fn signature_without_key_id() {
    let profile = SigningProfile::builder()
        .algorithm(Algorithm::Ed25519)
        .fields(data::components(&["@method", "@authority"]))
        .metadata(vec![Metadata::Created])
        .build()
        .unwrap();
    let (private_key, key_spec) = key_pair(Algorithm::Ed25519, "unused");
    let signer = Signer::new(profile, private_key)
        .unwrap()
        .with_clock(Clock::fixed(created()));

    let mut request = data::get_request();
    signer.sign(&mut request).await.unwrap();

    let profile = VerifyProfile::builder()
        .required_fields(data::components(&["@authority"]))
        .required_metadata(vec![Metadata::Created])
        .build()
        .unwrap();

    let result = Verifier::new(key_spec, profile.clone())
        .with_clock(Clock::fixed(created()))
        .verify(&mut request)
        .await
        .unwrap();
    assert!(result.verified);

    let failure = Verifier::new(HashMap::<String, KeySpec>::new(), profile)
        .with_clock(Clock::fixed(created()))
        .verify(&mut request)
        .await
        .unwrap_err();
    assert_eq!(failure.kind(), ErrorKind::SigKeyFetch);
}

#[tokio::test]
async fn signing_input_errors() {
    let profile = SigningProfile::builder()
        .algorithm(Algorithm::HmacSha256)
        .fields(data::components(&["@method", "@path", "@method"]))
        .build()
        .unwrap();
    let (private_key, _) = key_pair(Algorithm::HmacSha256, "test-key");
    let signer = Signer::new(profile, private_key).unwrap();
    let error = signer.sign(&mut data::get_request()).await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::InvalidSignatureOptions);

    let profile = SigningProfile::builder()
        .algorithm(Algorithm::HmacSha256)
        .metadata(vec![Metadata::Tag])
        .build()
        .unwrap();
    let (private_key, _) = key_pair(Algorithm::HmacSha256, "test-key");
    let error = Signer::new(profile, private_key).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::InvalidMetadata);

    let profile = SigningProfile::builder()
        .algorithm(Algorithm::HmacSha256)
        .fields(data::components(&[r#""@query-param";name="Cat""#]))
        .build()
        .unwrap();
    let (private_key, _) = key_pair(Algorithm::HmacSha256, "test-key");
    let signer = Signer::new(profile, private_key).unwrap();
    let error = signer.sign(&mut data::get_request()).await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::InvalidSignatureOptions);
}

#[tokio::test]
async fn accept_signature_flow() {
    let response = http::Response::builder()
        .status(401)
        .header(
            "Accept-Signature",
            r#"sig1=("@method" "@authority" "@path");created;keyid="test-key";nonce="server-nonce""#,
        )
        .body(Full::<Bytes>::default())
        .unwrap();

    let accept = AcceptSignature::from_headers(response.headers()).unwrap();
    let profile = accept
        .signing_profile()
        .algorithm(Algorithm::HmacSha256)
        .build()
        .unwrap();
    let (private_key, key_spec) =
        key_pair(Algorithm::HmacSha256, accept.key_id.as_deref().unwrap());
    let signer = Signer::new(profile, private_key)
        .unwrap()
        .with_clock(Clock::fixed(created()));

    let mut request = data::get_request();
    signer.sign(&mut request).await.unwrap();
    assert_eq!(
        header(&request, "signature-input"),
        r#"sig1=("@method" "@authority" "@path");created=1618884473;keyid="test-key";nonce="server-nonce""#
    );

    let profile = VerifyProfile::builder()
        .required_fields(data::components(&["@method", "@path"]))
        .build()
        .unwrap();
    let result = Verifier::new(key_spec, profile)
        .with_clock(Clock::fixed(created()))
        .verify(&mut request)
        .await
        .unwrap();
    assert!(result.verified);
}
