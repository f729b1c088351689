//! HTTP message signatures (draft-cavage) backed by registered ed25519 keys.
//!
//! A request is signed over a list of pseudo-headers and headers. The list must
//! cover `(request-target)` and a timestamp (`date` or `(created)`), so a
//! captured signature cannot be replayed against another route or much later.
//! Requests that carry a body (`POST`, `PUT`, `PATCH`) must also cover
//! `digest`, and handlers reading the body check it with [`verify_body_digest`]
//! so a captured signature cannot be replayed with a different body.
//!
//! Parsing, signing-string construction and freshness checks happen before any
//! database access; only the key lookup touches storage.

use axum::http::{HeaderMap, Method, Uri, header::AUTHORIZATION};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use ed25519_dalek::{Signature, VerifyingKey};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc2822;
use tracing::debug;

use super::key_storage::lookup_active_key;
use super::state::AuthConfig;
use super::storage::IdentityRecord;
use super::utils::now_unix_seconds;

pub(crate) const SIGNATURE_HEADER: &str = "signature";

const REQUEST_TARGET: &str = "(request-target)";
const CREATED: &str = "(created)";
const EXPIRES: &str = "(expires)";
const DATE: &str = "date";
const DIGEST: &str = "digest";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("malformed signature header: {0}")]
    Malformed(String),
    #[error("missing signature parameter `{0}`")]
    MissingParam(&'static str),
    #[error("unsupported signature algorithm `{0}`")]
    UnsupportedAlgorithm(String),
    #[error("signed headers must include {0}")]
    MissingRequiredHeader(&'static str),
    #[error("signed header `{0}` is missing from the request")]
    MissingHeader(String),
    #[error("request body does not match the signed digest")]
    DigestMismatch,
    #[error("signature timestamp is outside the allowed clock skew")]
    Stale,
    #[error("signature has expired")]
    Expired,
    #[error("unknown signature key")]
    UnknownKey,
    #[error("signature verification failed")]
    InvalidSignature,
    #[error("signature key lookup failed: {0}")]
    Storage(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SignatureAlgorithm {
    Ed25519,
    /// Algorithm derived from the key; every registered key is ed25519.
    Hs2019,
}

impl SignatureAlgorithm {
    fn parse(value: &str) -> Result<Self, SignatureError> {
        match value.to_ascii_lowercase().as_str() {
            "ed25519" => Ok(Self::Ed25519),
            "hs2019" => Ok(Self::Hs2019),
            _ => Err(SignatureError::UnsupportedAlgorithm(value.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct SignatureParams {
    pub(crate) key_id: String,
    pub(crate) algorithm: SignatureAlgorithm,
    pub(crate) headers: Vec<String>,
    pub(crate) signature: Vec<u8>,
    pub(crate) created: Option<i64>,
    pub(crate) expires: Option<i64>,
}

/// A parsed signature whose signing string has been rebuilt from the request.
#[derive(Debug)]
pub(crate) struct PreparedSignature {
    pub(crate) params: SignatureParams,
    pub(crate) signing_string: String,
}

/// Identity proven by a verified signature.
#[derive(Clone, Debug)]
pub(crate) struct SignedIdentity {
    pub(crate) identity: IdentityRecord,
    pub(crate) key_id: String,
}

/// Verify the request signature, if the request carries one.
///
/// `Ok(None)` means no signature was presented. Any presented signature that
/// fails is an error; callers must not fall back to other credentials.
pub(crate) async fn authenticate_signature(
    headers: &HeaderMap,
    method: &Method,
    uri: &Uri,
    pool: &PgPool,
    config: &AuthConfig,
) -> Result<Option<SignedIdentity>, SignatureError> {
    let Some(prepared) = prepare_signature(
        headers,
        method,
        uri,
        now_unix_seconds(),
        config.signature_max_skew_seconds(),
    )?
    else {
        return Ok(None);
    };

    let key = lookup_active_key(pool, &prepared.params.key_id)
        .await
        .map_err(|err| SignatureError::Storage(err.to_string()))?
        .ok_or(SignatureError::UnknownKey)?;

    verify_prepared(&prepared, &key.public_key)?;
    debug!(
        key_id = %key.key_id,
        algorithm = ?prepared.params.algorithm,
        "Verified request signature"
    );

    Ok(Some(SignedIdentity {
        identity: key.identity,
        key_id: key.key_id,
    }))
}

/// Parse and check everything that does not need the key.
pub(crate) fn prepare_signature(
    headers: &HeaderMap,
    method: &Method,
    uri: &Uri,
    now: i64,
    max_skew_seconds: i64,
) -> Result<Option<PreparedSignature>, SignatureError> {
    let Some(raw) = signature_header_value(headers)? else {
        return Ok(None);
    };
    let params = parse_signature_params(raw)?;
    ensure_required_headers(&params, method)?;
    let signing_string = build_signing_string(&params, headers, method, uri)?;
    check_freshness(&params, headers, now, max_skew_seconds)?;
    Ok(Some(PreparedSignature {
        params,
        signing_string,
    }))
}

/// Check the signature against a raw 32-byte ed25519 public key.
pub(crate) fn verify_prepared(
    prepared: &PreparedSignature,
    public_key: &[u8],
) -> Result<(), SignatureError> {
    let key_bytes: [u8; 32] = public_key
        .try_into()
        .map_err(|_| SignatureError::InvalidSignature)?;
    let key =
        VerifyingKey::from_bytes(&key_bytes).map_err(|_| SignatureError::InvalidSignature)?;
    let signature = Signature::from_slice(&prepared.params.signature)
        .map_err(|_| SignatureError::InvalidSignature)?;
    key.verify_strict(prepared.signing_string.as_bytes(), &signature)
        .map_err(|_| SignatureError::InvalidSignature)
}

/// `Signature:` wins over `Authorization: Signature ...`; bearer tokens are ignored.
fn signature_header_value(headers: &HeaderMap) -> Result<Option<&str>, SignatureError> {
    if let Some(value) = headers.get(SIGNATURE_HEADER) {
        let value = value
            .to_str()
            .map_err(|_| SignatureError::Malformed("non-ascii header".to_string()))?;
        return Ok(Some(value.trim()));
    }
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let Ok(value) = value.to_str() else {
        return Ok(None);
    };
    let value = value.trim();
    let Some((scheme, rest)) = value.split_once(' ') else {
        return Ok(None);
    };
    if scheme.eq_ignore_ascii_case("signature") {
        Ok(Some(rest.trim()))
    } else {
        Ok(None)
    }
}

/// Split `k1="v1",k2=v2` into pairs, honouring quotes.
fn split_params(raw: &str) -> Result<Vec<(String, String)>, SignatureError> {
    let mut pairs = Vec::new();
    let mut chars = raw.chars().peekable();

    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace() || *c == ',') {
            chars.next();
        }
        if chars.peek().is_none() {
            break;
        }

        let mut key = String::new();
        while let Some(&c) = chars.peek() {
            if c == '=' {
                break;
            }
            key.push(c);
            chars.next();
        }
        if chars.next() != Some('=') {
            return Err(SignatureError::Malformed(format!(
                "parameter `{}` has no value",
                key.trim()
            )));
        }

        let mut value = String::new();
        if chars.peek() == Some(&'"') {
            chars.next();
            let mut closed = false;
            for c in chars.by_ref() {
                if c == '"' {
                    closed = true;
                    break;
                }
                value.push(c);
            }
            if !closed {
                return Err(SignatureError::Malformed("unterminated quote".to_string()));
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c == ',' {
                    break;
                }
                value.push(c);
                chars.next();
            }
            value = value.trim().to_string();
        }

        let key = key.trim();
        if key.is_empty() {
            return Err(SignatureError::Malformed("empty parameter name".to_string()));
        }
        pairs.push((key.to_string(), value));
    }

    Ok(pairs)
}

pub(crate) fn parse_signature_params(raw: &str) -> Result<SignatureParams, SignatureError> {
    let mut key_id = None;
    let mut algorithm = None;
    let mut headers = None;
    let mut signature = None;
    let mut created = None;
    let mut expires = None;

    for (key, value) in split_params(raw)? {
        match key.as_str() {
            "keyId" => key_id = Some(value),
            "algorithm" => algorithm = Some(SignatureAlgorithm::parse(&value)?),
            "headers" => {
                headers = Some(
                    value
                        .split_whitespace()
                        .map(str::to_ascii_lowercase)
                        .collect::<Vec<_>>(),
                );
            }
            "signature" => {
                let decoded = STANDARD
                    .decode(value.as_bytes())
                    .map_err(|_| SignatureError::Malformed("signature is not base64".to_string()))?;
                signature = Some(decoded);
            }
            "created" => created = Some(parse_timestamp("created", &value)?),
            "expires" => expires = Some(parse_timestamp("expires", &value)?),
            // Unknown parameters are ignored for forward compatibility.
            _ => {}
        }
    }

    let key_id = key_id
        .filter(|value| !value.is_empty())
        .ok_or(SignatureError::MissingParam("keyId"))?;
    let signature = signature.ok_or(SignatureError::MissingParam("signature"))?;
    let headers = headers
        .filter(|list| !list.is_empty())
        .unwrap_or_else(|| vec![DATE.to_string()]);

    Ok(SignatureParams {
        key_id,
        algorithm: algorithm.unwrap_or(SignatureAlgorithm::Hs2019),
        headers,
        signature,
        created,
        expires,
    })
}

fn parse_timestamp(name: &str, value: &str) -> Result<i64, SignatureError> {
    value
        .trim()
        .parse::<i64>()
        .map_err(|_| SignatureError::Malformed(format!("`{name}` is not an integer")))
}

fn ensure_required_headers(
    params: &SignatureParams,
    method: &Method,
) -> Result<(), SignatureError> {
    let covers = |name: &str| params.headers.iter().any(|header| header == name);
    if !covers(REQUEST_TARGET) {
        return Err(SignatureError::MissingRequiredHeader(REQUEST_TARGET));
    }
    if !covers(DATE) && !covers(CREATED) {
        return Err(SignatureError::MissingRequiredHeader("date or (created)"));
    }
    if carries_body(method) && !covers(DIGEST) {
        return Err(SignatureError::MissingRequiredHeader(DIGEST));
    }
    Ok(())
}

fn carries_body(method: &Method) -> bool {
    *method == Method::POST || *method == Method::PUT || *method == Method::PATCH
}

/// Check the `Digest: SHA-256=<base64>` header against the received body.
///
/// Other algorithms in the header are ignored; one SHA-256 entry must match.
pub(crate) fn verify_body_digest(headers: &HeaderMap, body: &[u8]) -> Result<(), SignatureError> {
    let raw = header_value(headers, DIGEST)?;
    let expected = STANDARD.encode(Sha256::digest(body));
    let matches = raw
        .split(',')
        .filter_map(|entry| entry.trim().split_once('='))
        .any(|(algorithm, value)| {
            algorithm.trim().eq_ignore_ascii_case("sha-256") && value.trim() == expected
        });
    if matches {
        Ok(())
    } else {
        Err(SignatureError::DigestMismatch)
    }
}

pub(crate) fn build_signing_string(
    params: &SignatureParams,
    headers: &HeaderMap,
    method: &Method,
    uri: &Uri,
) -> Result<String, SignatureError> {
    let mut lines = Vec::with_capacity(params.headers.len());
    for name in &params.headers {
        let value = match name.as_str() {
            REQUEST_TARGET => {
                let target = uri.path_and_query().map_or("/", |pq| pq.as_str());
                format!("{} {target}", method.as_str().to_ascii_lowercase())
            }
            CREATED => params
                .created
                .ok_or(SignatureError::MissingParam("created"))?
                .to_string(),
            EXPIRES => params
                .expires
                .ok_or(SignatureError::MissingParam("expires"))?
                .to_string(),
            _ => header_value(headers, name)?,
        };
        lines.push(format!("{name}: {value}"));
    }
    Ok(lines.join("\n"))
}

fn header_value(headers: &HeaderMap, name: &str) -> Result<String, SignatureError> {
    let values = headers
        .get_all(name)
        .iter()
        .map(|value| value.to_str().map(str::trim))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| SignatureError::Malformed(format!("header `{name}` is not ascii")))?;
    if values.is_empty() {
        return Err(SignatureError::MissingHeader(name.to_string()));
    }
    Ok(values.join(", "))
}

pub(crate) fn check_freshness(
    params: &SignatureParams,
    headers: &HeaderMap,
    now: i64,
    max_skew_seconds: i64,
) -> Result<(), SignatureError> {
    if let Some(expires) = params.expires
        && expires < now
    {
        return Err(SignatureError::Expired);
    }

    if params.headers.iter().any(|header| header == CREATED) {
        let created = params.created.ok_or(SignatureError::MissingParam("created"))?;
        if outside_skew(now, created, max_skew_seconds) {
            return Err(SignatureError::Stale);
        }
    }

    if params.headers.iter().any(|header| header == DATE) {
        let raw = header_value(headers, DATE)?;
        let date = parse_http_date(&raw)
            .ok_or_else(|| SignatureError::Malformed("unparseable date header".to_string()))?;
        if outside_skew(now, date, max_skew_seconds) {
            return Err(SignatureError::Stale);
        }
    }

    Ok(())
}

/// Timestamps come from the caller and may sit anywhere in the `i64` range.
fn outside_skew(now: i64, timestamp: i64, max_skew_seconds: i64) -> bool {
    now.abs_diff(timestamp) > max_skew_seconds.unsigned_abs()
}

/// Parse an IMF-fixdate (`Sun, 06 Nov 1994 08:49:37 GMT`) or RFC 2822 date.
fn parse_http_date(value: &str) -> Option<i64> {
    let value = value.trim();
    if let Ok(parsed) = OffsetDateTime::parse(value, &Rfc2822) {
        return Some(parsed.unix_timestamp());
    }
    let numeric = value
        .strip_suffix(" GMT")
        .or_else(|| value.strip_suffix(" UTC"))
        .map(|prefix| format!("{prefix} +0000"))?;
    OffsetDateTime::parse(&numeric, &Rfc2822)
        .ok()
        .map(OffsetDateTime::unix_timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use axum::http::HeaderValue;
    use ed25519_dalek::{Signer, SigningKey};

    const NOW: i64 = 1_700_000_000;
    const NOW_HTTP_DATE: &str = "Tue, 14 Nov 2023 22:13:20 GMT";

    fn signing_key() -> SigningKey {
        SigningKey::from_bytes(&[7u8; 32])
    }

    fn signed_headers(
        method: &Method,
        uri: &Uri,
        covered: &str,
        extra: &str,
    ) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(DATE, HeaderValue::from_static(NOW_HTTP_DATE));
        headers.insert("host", HeaderValue::from_static("api.wicket.dev"));

        let unsigned = format!("keyId=\"key-1\",headers=\"{covered}\",signature=\"\"{extra}");
        let params = parse_signature_params(&unsigned)?;
        let signing_string = build_signing_string(&params, &headers, method, uri)?;
        let signature = STANDARD.encode(signing_key().sign(signing_string.as_bytes()).to_bytes());
        let value = format!(
            "keyId=\"key-1\",algorithm=\"ed25519\",headers=\"{covered}\",signature=\"{signature}\"{extra}"
        );
        headers.insert(SIGNATURE_HEADER, HeaderValue::from_str(&value)?);
        Ok(headers)
    }

    #[test]
    fn parse_params_with_defaults() -> Result<()> {
        let params = parse_signature_params("keyId=\"abc\",signature=\"AAAA\"")?;
        assert_eq!(params.key_id, "abc");
        assert_eq!(params.algorithm, SignatureAlgorithm::Hs2019);
        assert_eq!(params.headers, vec!["date".to_string()]);
        assert_eq!(params.signature, vec![0, 0, 0]);
        assert_eq!(params.created, None);
        Ok(())
    }

    #[test]
    fn parse_params_reads_unquoted_timestamps() -> Result<()> {
        let params = parse_signature_params(
            "keyId=\"abc\", headers=\"(request-target) (created)\", created=1700000000, expires=1700000300, signature=\"AAAA\"",
        )?;
        assert_eq!(params.headers, vec!["(request-target)", "(created)"]);
        assert_eq!(params.created, Some(NOW));
        assert_eq!(params.expires, Some(NOW + 300));
        Ok(())
    }

    #[test]
    fn parse_params_errors() {
        assert_eq!(
            parse_signature_params("signature=\"AAAA\""),
            Err(SignatureError::MissingParam("keyId"))
        );
        assert_eq!(
            parse_signature_params("keyId=\"abc\""),
            Err(SignatureError::MissingParam("signature"))
        );
        assert_eq!(
            parse_signature_params("keyId=\"abc\",algorithm=\"rsa-sha256\",signature=\"AAAA\""),
            Err(SignatureError::UnsupportedAlgorithm("rsa-sha256".to_string()))
        );
        assert!(matches!(
            parse_signature_params("keyId=\"abc"),
            Err(SignatureError::Malformed(_))
        ));
        assert!(matches!(
            parse_signature_params("keyId=\"abc\",signature=\"***\""),
            Err(SignatureError::Malformed(_))
        ));
    }

    #[test]
    fn required_headers_enforced() -> Result<()> {
        let params = parse_signature_params("keyId=\"a\",headers=\"date\",signature=\"AAAA\"")?;
        assert_eq!(
            ensure_required_headers(&params, &Method::GET),
            Err(SignatureError::MissingRequiredHeader("(request-target)"))
        );
        let params = parse_signature_params(
            "keyId=\"a\",headers=\"(request-target) host\",signature=\"AAAA\"",
        )?;
        assert_eq!(
            ensure_required_headers(&params, &Method::GET),
            Err(SignatureError::MissingRequiredHeader("date or (created)"))
        );
        Ok(())
    }

    #[test]
    fn body_methods_must_sign_digest() -> Result<()> {
        let params = parse_signature_params(
            "keyId=\"a\",headers=\"(request-target) (created)\",signature=\"AAAA\"",
        )?;
        assert_eq!(ensure_required_headers(&params, &Method::GET), Ok(()));
        assert_eq!(ensure_required_headers(&params, &Method::DELETE), Ok(()));
        for method in [Method::POST, Method::PUT, Method::PATCH] {
            assert_eq!(
                ensure_required_headers(&params, &method),
                Err(SignatureError::MissingRequiredHeader("digest"))
            );
        }

        let params = parse_signature_params(
            "keyId=\"a\",headers=\"(request-target) (created) digest\",signature=\"AAAA\"",
        )?;
        assert_eq!(ensure_required_headers(&params, &Method::POST), Ok(()));
        Ok(())
    }

    #[test]
    fn body_digest_must_match() -> Result<()> {
        let body = br#"{"public_key":"AAAA"}"#;
        let digest = format!("SHA-256={}", STANDARD.encode(Sha256::digest(body)));

        let mut headers = HeaderMap::new();
        headers.insert(DIGEST, HeaderValue::from_str(&digest)?);
        assert_eq!(verify_body_digest(&headers, body), Ok(()));
        assert_eq!(
            verify_body_digest(&headers, br#"{"public_key":"BBBB"}"#),
            Err(SignatureError::DigestMismatch)
        );

        let listed = format!("MD5=abc, sha-256={}", STANDARD.encode(Sha256::digest(body)));
        let mut headers = HeaderMap::new();
        headers.insert(DIGEST, HeaderValue::from_str(&listed)?);
        assert_eq!(verify_body_digest(&headers, body), Ok(()));

        assert_eq!(
            verify_body_digest(&HeaderMap::new(), body),
            Err(SignatureError::MissingHeader("digest".to_string()))
        );
        Ok(())
    }

    #[test]
    fn signing_string_layout() -> Result<()> {
        let params = parse_signature_params(
            "keyId=\"a\",headers=\"(request-target) host date\",signature=\"AAAA\"",
        )?;
        let mut headers = HeaderMap::new();
        headers.insert("host", HeaderValue::from_static("api.wicket.dev"));
        headers.insert(DATE, HeaderValue::from_static(NOW_HTTP_DATE));
        let uri = Uri::from_static("/v1/auth/keys?limit=5");
        let signing_string = build_signing_string(&params, &headers, &Method::POST, &uri)?;
        assert_eq!(
            signing_string,
            format!(
                "(request-target): post /v1/auth/keys?limit=5\nhost: api.wicket.dev\ndate: {NOW_HTTP_DATE}"
            )
        );
        Ok(())
    }

    #[test]
    fn signing_string_requires_listed_headers() -> Result<()> {
        let params = parse_signature_params(
            "keyId=\"a\",headers=\"(request-target) digest\",signature=\"AAAA\"",
        )?;
        let result = build_signing_string(
            &params,
            &HeaderMap::new(),
            &Method::GET,
            &Uri::from_static("/"),
        );
        assert_eq!(result, Err(SignatureError::MissingHeader("digest".to_string())));
        Ok(())
    }

    #[test]
    fn http_date_formats() {
        assert_eq!(parse_http_date(NOW_HTTP_DATE), Some(NOW));
        assert_eq!(parse_http_date("Tue, 14 Nov 2023 22:13:20 +0000"), Some(NOW));
        assert_eq!(parse_http_date("yesterday"), None);
    }

    #[test]
    fn freshness_checks() -> Result<()> {
        let mut headers = HeaderMap::new();
        headers.insert(DATE, HeaderValue::from_static(NOW_HTTP_DATE));
        let params = parse_signature_params(
            "keyId=\"a\",headers=\"(request-target) date\",signature=\"AAAA\"",
        )?;
        assert_eq!(check_freshness(&params, &headers, NOW + 299, 300), Ok(()));
        assert_eq!(
            check_freshness(&params, &headers, NOW + 301, 300),
            Err(SignatureError::Stale)
        );

        let params = parse_signature_params(
            "keyId=\"a\",headers=\"(request-target) (created)\",created=1700000000,expires=1700000010,signature=\"AAAA\"",
        )?;
        assert_eq!(check_freshness(&params, &HeaderMap::new(), NOW, 300), Ok(()));
        assert_eq!(
            check_freshness(&params, &HeaderMap::new(), NOW + 11, 300),
            Err(SignatureError::Expired)
        );
        assert_eq!(
            check_freshness(&params, &HeaderMap::new(), NOW - 400, 300),
            Err(SignatureError::Stale)
        );
        Ok(())
    }

    #[test]
    fn extreme_created_values_are_stale() -> Result<()> {
        for created in [i64::MIN, i64::MAX] {
            let params = parse_signature_params(&format!(
                "keyId=\"a\",headers=\"(request-target) (created)\",created={created},signature=\"AAAA\""
            ))?;
            assert_eq!(
                check_freshness(&params, &HeaderMap::new(), NOW, 300),
                Err(SignatureError::Stale)
            );
        }
        assert!(!outside_skew(i64::MAX, i64::MAX, 0));
        assert!(outside_skew(i64::MIN, i64::MAX, i64::MAX));
        Ok(())
    }

    #[test]
    fn prepared_signature_verifies() -> Result<()> {
        let method = Method::GET;
        let uri = Uri::from_static("/v1/auth/session");
        let headers = signed_headers(&method, &uri, "(request-target) host date", "")?;

        let prepared = prepare_signature(&headers, &method, &uri, NOW, 300)?;
        let Some(prepared) = prepared else {
            panic!("expected a signature");
        };
        assert_eq!(prepared.params.key_id, "key-1");
        let public_key = signing_key().verifying_key().to_bytes();
        assert_eq!(verify_prepared(&prepared, &public_key), Ok(()));

        // Another key must not verify the same signature.
        let other = SigningKey::from_bytes(&[9u8; 32]).verifying_key().to_bytes();
        assert_eq!(
            verify_prepared(&prepared, &other),
            Err(SignatureError::InvalidSignature)
        );
        Ok(())
    }

    #[test]
    fn signature_bound_to_request_target() -> Result<()> {
        let method = Method::GET;
        let signed_uri = Uri::from_static("/v1/auth/session");
        let headers = signed_headers(&method, &signed_uri, "(request-target) date", "")?;

        let replayed_uri = Uri::from_static("/v1/auth/keys");
        let Some(prepared) = prepare_signature(&headers, &Method::DELETE, &replayed_uri, NOW, 300)?
        else {
            panic!("expected a signature");
        };
        let public_key = signing_key().verifying_key().to_bytes();
        assert_eq!(
            verify_prepared(&prepared, &public_key),
            Err(SignatureError::InvalidSignature)
        );
        Ok(())
    }

    #[test]
    fn authorization_scheme_is_accepted() -> Result<()> {
        let method = Method::GET;
        let uri = Uri::from_static("/v1/auth/session");
        let mut headers = signed_headers(&method, &uri, "(request-target) date", "")?;
        let Some(value) = headers.remove(SIGNATURE_HEADER) else {
            panic!("expected a signature header");
        };
        let authorization = format!("Signature {}", value.to_str()?);
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&authorization)?);

        let prepared = prepare_signature(&headers, &method, &uri, NOW, 300)?;
        assert!(prepared.is_some());
        Ok(())
    }

    #[test]
    fn no_signature_is_none() -> Result<()> {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer token"));
        let prepared = prepare_signature(
            &headers,
            &Method::GET,
            &Uri::from_static("/"),
            NOW,
            300,
        )?;
        assert!(prepared.is_none());
        Ok(())
    }
}
