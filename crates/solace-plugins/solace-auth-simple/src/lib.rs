//! # solace-auth-simple
//!
//! HMAC-SHA256 implementation of `AuthProvider`.
//! Tokens have the form `base64url(user_id).hex(hmac(secret, user_id))`.

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use solace_core::AuthProvider;

type HmacSha256 = Hmac<Sha256>;

pub struct SimpleAuthProvider {
    /// Keyed with `auth.secret`; cloned per token
    keyed: HmacSha256,
}

impl SimpleAuthProvider {
    pub fn new(secret: &str) -> anyhow::Result<Self> {
        if secret.is_empty() {
            anyhow::bail!("auth secret must not be empty");
        }
        let keyed = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|_| anyhow::anyhow!("invalid auth secret"))?;
        Ok(Self { keyed })
    }

    fn mac(&self) -> HmacSha256 {
        self.keyed.clone()
    }
}

#[async_trait]
impl AuthProvider for SimpleAuthProvider {
    fn issue_token(&self, user_id: &str) -> String {
        let mut mac = self.mac();
        mac.update(user_id.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());
        format!("{}.{}", URL_SAFE_NO_PAD.encode(user_id), signature)
    }

    /// Malformed and forged tokens both verify to `None`.
    async fn verify_token(&self, token: &str) -> anyhow::Result<Option<String>> {
        let Some((encoded_user, signature)) = token.split_once('.') else {
            return Ok(None);
        };
        let Ok(user_bytes) = URL_SAFE_NO_PAD.decode(encoded_user) else {
            return Ok(None);
        };
        let Ok(signature) = hex::decode(signature) else {
            return Ok(None);
        };

        let mut mac = self.mac();
        mac.update(&user_bytes);
        if mac.verify_slice(&signature).is_err() {
            return Ok(None);
        }

        match String::from_utf8(user_bytes) {
            Ok(user_id) if !user_id.is_empty() => Ok(Some(user_id)),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_issued_token_verifies() {
        let auth = SimpleAuthProvider::new("s3cret").unwrap();
        let token = auth.issue_token("user-42");
        assert_eq!(auth.verify_token(&token).await.unwrap(), Some("user-42".to_string()));
    }

    #[tokio::test]
    async fn test_token_from_other_secret_is_rejected() {
        let ours = SimpleAuthProvider::new("s3cret").unwrap();
        let theirs = SimpleAuthProvider::new("other").unwrap();
        let token = theirs.issue_token("user-42");
        assert_eq!(ours.verify_token(&token).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_tampered_user_is_rejected() {
        let auth = SimpleAuthProvider::new("s3cret").unwrap();
        let token = auth.issue_token("user-42");
        let (_, signature) = token.split_once('.').unwrap();
        let forged = format!("{}.{}", URL_SAFE_NO_PAD.encode("admin"), signature);
        assert_eq!(auth.verify_token(&forged).await.unwrap(), None);
    }

    #[test]
    fn test_empty_secret_is_refused() {
        assert!(SimpleAuthProvider::new("").is_err());
    }

    #[tokio::test]
    async fn test_garbage_is_rejected() {
        let auth = SimpleAuthProvider::new("s3cret").unwrap();
        for token in ["", "no-dot", "!!!.abc", "dXNlcg.zz"] {
            assert_eq!(auth.verify_token(token).await.unwrap(), None);
        }
    }
}
