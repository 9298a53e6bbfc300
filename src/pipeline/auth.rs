//! Authorization: submit email/passcode through the viewer's form.
//!
//! The form is a Rails-style `PATCH` sent as a `POST` with `_method=patch`.
//! Success sets a session cookie which the shared client's cookie store then
//! sends with every page request. The token is a required argument: there is
//! no way to call this for a public document.

use crate::config::Credentials;
use crate::document::Document;
use crate::error::{DocsendError, HttpError};
use crate::session::Session;
use tracing::info;

/// Form fields in submission order. `link_auth_form[passcode]` is omitted
/// when no passcode was given.
pub fn authorization_form<'a>(
    authenticity_token: &'a str,
    credentials: &'a Credentials,
) -> Vec<(&'static str, &'a str)> {
    let mut form = vec![
        ("utf8", "✓"),
        ("_method", "patch"),
        ("authenticity_token", authenticity_token),
        ("link_auth_form[email]", credentials.email.as_str()),
    ];
    if let Some(ref passcode) = credentials.passcode {
        form.push(("link_auth_form[passcode]", passcode.as_str()));
    }
    form.push(("commit", "Continue"));
    form
}

/// Submit the credentials for `document`.
pub async fn authorize(
    session: &Session,
    document: &Document,
    authenticity_token: &str,
    credentials: &Credentials,
) -> Result<(), DocsendError> {
    info!(
        "Authorizing '{}' as {}",
        document.doc_id(),
        credentials.email
    );

    let form = authorization_form(authenticity_token, credentials);
    session
        .post_form(document.viewer_url(), &form)
        .await
        .map_err(|source| {
            let reason = match &source {
                HttpError::Status { status, .. } => {
                    format!("credentials rejected (HTTP {status})")
                }
                HttpError::RetriesExhausted { .. } => "viewer unavailable".to_string(),
                _ => "form submission failed".to_string(),
            };
            DocsendError::Authorization {
                doc_id: document.doc_id().to_string(),
                reason,
                source: Some(source),
            }
        })?;

    info!("Authorized '{}'", document.doc_id());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpConfig;
    use crate::document::DocumentRef;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn document(base: &str) -> Document {
        Document::resolved(DocumentRef::parse("abc123", base).unwrap(), Some("tok".into()), 2, 5)
    }

    fn session() -> Session {
        Session::open(&HttpConfig {
            retry_backoff_ms: 1,
            ..HttpConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn form_without_passcode() {
        let creds = Credentials::new("me@example.com");
        let form = authorization_form("tok", &creds);
        let keys: Vec<_> = form.iter().map(|(k, _)| *k).collect();
        assert_eq!(
            keys,
            vec![
                "utf8",
                "_method",
                "authenticity_token",
                "link_auth_form[email]",
                "commit"
            ]
        );
        assert!(form.contains(&("_method", "patch")));
        assert!(form.contains(&("authenticity_token", "tok")));
    }

    #[test]
    fn form_with_passcode() {
        let creds = Credentials::new("me@example.com").with_passcode("1234");
        let form = authorization_form("tok", &creds);
        assert!(form.contains(&("link_auth_form[passcode]", "1234")));
        assert_eq!(form.last(), Some(&("commit", "Continue")));
    }

    #[tokio::test]
    async fn posts_patch_override_with_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/view/abc123"))
            .and(body_string_contains("_method=patch"))
            .and(body_string_contains("authenticity_token=tok"))
            .and(body_string_contains("me%40example.com"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let doc = document(&server.uri());
        authorize(&session(), &doc, "tok", &Credentials::new("me@example.com"))
            .await
            .expect("2xx should authorize");
    }

    #[tokio::test]
    async fn rejected_credentials_fail_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/view/abc123"))
            .respond_with(ResponseTemplate::new(403))
            .expect(1)
            .mount(&server)
            .await;

        let doc = document(&server.uri());
        let err = authorize(&session(), &doc, "tok", &Credentials::new("bad@example.com"))
            .await
            .unwrap_err();
        match err {
            DocsendError::Authorization { reason, .. } => assert!(reason.contains("403")),
            other => panic!("expected Authorization error, got {other:?}"),
        }
    }
}
