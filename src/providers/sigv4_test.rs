//! Conformance tests against the published AWS SigV4 test suite.

use chrono::{TimeZone, Utc};
use reqwest::Url;

use super::sigv4::*;

const SECRET: &str = "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY";

fn suite_signer() -> Signer {
    Signer::new(
        Credentials {
            access_key_id: "AKIDEXAMPLE".to_string(),
            secret_access_key: SECRET.to_string(),
            session_token: None,
        },
        "us-east-1",
        "service",
    )
}

fn suite_time() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2015, 8, 30, 12, 36, 0).unwrap()
}

#[test]
fn signing_key_matches_reference_derivation() {
    let key = derive_signing_key(SECRET, "20120215", "us-east-1", "iam").unwrap();

    assert_eq!(
        hex::encode(key),
        "f4780e2d9f65fa895f9c67b32ce1baf0b0d8a43505a000a1a9e090d414db404d"
    );
}

#[test]
fn get_vanilla_canonical_request() {
    let headers = vec![
        ("Host".to_string(), "example.amazonaws.com".to_string()),
        ("X-Amz-Date".to_string(), "20150830T123600Z".to_string()),
    ];
    let (block, signed) = canonical_headers(&headers);
    let creq = canonical_request("GET", "/", None, &block, &signed, b"");

    assert_eq!(
        creq,
        "GET\n/\n\nhost:example.amazonaws.com\nx-amz-date:20150830T123600Z\n\nhost;x-amz-date\n\
         e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
    );

    let sts = string_to_sign(
        "20150830T123600Z",
        &credential_scope("20150830", "us-east-1", "service"),
        &creq,
    );
    assert_eq!(
        sts,
        "AWS4-HMAC-SHA256\n20150830T123600Z\n20150830/us-east-1/service/aws4_request\n\
         bb579772317eb040ac9ed261061d46c1f17a8133879d6129b6e1c25292927e63"
    );
}

#[test]
fn get_vanilla_signature() {
    let url = Url::parse("https://example.amazonaws.com/").unwrap();
    let signed = suite_signer()
        .sign("GET", &url, &[], b"", suite_time())
        .unwrap();

    assert_eq!(
        signed.signature,
        "5fa00fa31553b73ebf1942676e86291e8372ff2a2260956d9b8aae1d763fbf31"
    );
    assert_eq!(
        signed.authorization,
        "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/service/aws4_request, \
         SignedHeaders=host;x-amz-date, \
         Signature=5fa00fa31553b73ebf1942676e86291e8372ff2a2260956d9b8aae1d763fbf31"
    );
    assert_eq!(signed.amz_date, "20150830T123600Z");
}

#[test]
fn get_vanilla_query_order_key_case_signature() {
    let url = Url::parse("https://example.amazonaws.com/?Param2=value2&Param1=value1").unwrap();
    let signed = suite_signer()
        .sign("GET", &url, &[], b"", suite_time())
        .unwrap();

    assert_eq!(
        signed.signature,
        "b97d918cfa904a5beff61c982a1b6f458b799221646efd99d3219ec94cdf2500"
    );
}

#[test]
fn canonical_query_sorts_and_escapes() {
    assert_eq!(canonical_query("b=2&a=1&a=0"), "a=0&a=1&b=2");
    assert_eq!(canonical_query("text=a b&x=%7E"), "text=a%20b&x=~");
    assert_eq!(canonical_query(""), "");
}

#[test]
fn canonical_uri_encodes_each_segment_again() {
    assert_eq!(canonical_uri(""), "/");
    assert_eq!(
        canonical_uri("/model/anthropic.claude-v2%3A1/invoke"),
        "/model/anthropic.claude-v2%253A1/invoke"
    );
}

#[test]
fn header_values_are_trimmed_and_collapsed() {
    let headers = vec![
        ("My-Header".to_string(), "  a   b  ".to_string()),
        ("my-header".to_string(), "c".to_string()),
        ("Host".to_string(), "h".to_string()),
    ];
    let (block, signed) = canonical_headers(&headers);

    assert_eq!(block, "host:h\nmy-header:a b,c\n");
    assert_eq!(signed, "host;my-header");
}

#[test]
fn signed_header_list_in_authorization_matches_canonical_request() {
    let signer = Signer::new(
        Credentials {
            access_key_id: "AKID".to_string(),
            secret_access_key: "secret".to_string(),
            session_token: Some("token".to_string()),
        },
        "ap-northeast-1",
        "bedrock",
    );
    let url = Url::parse("https://bedrock-runtime.ap-northeast-1.amazonaws.com/model/m/invoke")
        .unwrap();

    let signed = signer
        .sign(
            "POST",
            &url,
            &[("Content-Type", "application/json")],
            b"{}",
            suite_time(),
        )
        .unwrap();

    assert!(signed.authorization.contains(
        "SignedHeaders=content-type;host;x-amz-date;x-amz-security-token,"
    ));
    assert_eq!(signed.security_token.as_deref(), Some("token"));
    assert_eq!(signed.pairs().len(), 3);
}

#[test]
fn credentials_debug_hides_secret() {
    let creds = Credentials {
        access_key_id: "AKID".to_string(),
        secret_access_key: "very-secret".to_string(),
        session_token: None,
    };

    let printed = format!("{creds:?}");

    assert!(printed.contains("AKID"));
    assert!(!printed.contains("very-secret"));
}
