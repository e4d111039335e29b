//! AWS SigV4 request signing for the RGW admin API
//!
//! RGW's admin API authenticates exactly like S3: a standard SigV4
//! signature over service `s3`, region `default`. This uses the
//! `aws-sigv4` crate directly rather than hand-rolling HMAC-SHA256 — the
//! same crate family other S3-compatible clients in the wild build on.

use std::time::SystemTime;

use aws_credential_types::Credentials;
use aws_sigv4::http_request::{sign, SignableBody, SignableRequest, SigningParams, SigningSettings};
use reqwest::Request;

use crate::error::{Error, Result};

const SIGV4_SERVICE: &str = "s3";
const SIGV4_REGION: &str = "default";

/// Sign a `reqwest::Request` in place with SigV4, service `s3` region
/// `default`, using the given access/secret key pair.
pub fn sign_request(request: &mut Request, access_key: &str, secret_key: &str) -> Result<()> {
    let identity = Credentials::new(access_key, secret_key, None, None, "rgw-admin-client").into();

    let signing_params = SigningParams::builder()
        .identity(&identity)
        .region(SIGV4_REGION)
        .name(SIGV4_SERVICE)
        .time(SystemTime::now())
        .settings(SigningSettings::default())
        .build()
        .map_err(|e| Error::Signing(e.to_string()))?
        .into();

    let headers: Vec<(String, String)> = request
        .headers()
        .iter()
        .map(|(name, value)| (name.to_string(), value.to_str().unwrap_or_default().to_string()))
        .collect();

    let body = request.body().and_then(|b| b.as_bytes()).unwrap_or(&[]);

    let signable_request = SignableRequest::new(
        request.method().as_str(),
        request.url().as_str(),
        headers.iter().map(|(k, v)| (k.as_str(), v.as_str())),
        SignableBody::Bytes(body),
    )
    .map_err(|e| Error::Signing(e.to_string()))?;

    let (instructions, _signature) = sign(signable_request, &signing_params)
        .map_err(|e| Error::Signing(e.to_string()))?
        .into_parts();

    for header in instructions.headers() {
        let value = reqwest::header::HeaderValue::from_str(header.value())
            .map_err(|e| Error::Signing(e.to_string()))?;
        let name = reqwest::header::HeaderName::from_bytes(header.name().as_bytes())
            .map_err(|e| Error::Signing(e.to_string()))?;
        request.headers_mut().insert(name, value);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signing_adds_authorization_header() {
        let mut request = reqwest::Client::new()
            .get("https://rgw.example.com/admin/user?format=json")
            .build()
            .unwrap();

        sign_request(&mut request, "AKIA_TEST", "secret").unwrap();

        assert!(request.headers().contains_key("authorization") || request.headers().contains_key("Authorization"));
        assert!(request.headers().contains_key("x-amz-date"));
    }

    #[test]
    fn signing_is_reproducible_for_a_fixed_clock() {
        // aws-sigv4 stamps wall-clock time into the signature; to assert
        // byte-for-byte reproducibility we fix the signing params' clock
        // and compare the Authorization header across two independent
        // signing passes over the same request.
        let make = || {
            reqwest::Client::new()
                .get("https://rgw.example.com/admin/user?format=json")
                .build()
                .unwrap()
        };
        let time = SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1_700_000_000);

        let sign_at_fixed_time = |mut req: Request| {
            let identity = Credentials::new("AKIA_TEST", "secret", None, None, "rgw-admin-client").into();
            let signing_params = SigningParams::builder()
                .identity(&identity)
                .region(SIGV4_REGION)
                .name(SIGV4_SERVICE)
                .time(time)
                .settings(SigningSettings::default())
                .build()
                .unwrap()
                .into();
            let headers: Vec<(String, String)> = req
                .headers()
                .iter()
                .map(|(n, v)| (n.to_string(), v.to_str().unwrap().to_string()))
                .collect();
            let signable = SignableRequest::new(
                req.method().as_str(),
                req.url().as_str(),
                headers.iter().map(|(k, v)| (k.as_str(), v.as_str())),
                SignableBody::Bytes(&[]),
            )
            .unwrap();
            let (instructions, _) = sign(signable, &signing_params).unwrap().into_parts();
            for header in instructions.headers() {
                req.headers_mut().insert(
                    reqwest::header::HeaderName::from_bytes(header.name().as_bytes()).unwrap(),
                    reqwest::header::HeaderValue::from_str(header.value()).unwrap(),
                );
            }
            req
        };

        let r1 = sign_at_fixed_time(make());
        let r2 = sign_at_fixed_time(make());
        assert_eq!(r1.headers().get("authorization"), r2.headers().get("authorization"));
    }
}
