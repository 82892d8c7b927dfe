//! # JWT Issuance and Verification
//!
//! Signs and verifies the two kinds of bearer token this service issues:
//! access tokens (always JWTs here, carrying a `scope` claim) and, for the
//! OIDC flows, ID tokens carrying the OpenID profile claims. Both share one
//! `Claims` shape; callers populate only the fields relevant to the token
//! they're minting.
//!
//! ## Algorithm selection
//!
//! HS256 is mandatory and the default. RS256 is supported when a key pair is
//! configured (see [`crate::config::JwtConfig`]); in that case tokens carry
//! a `kid` header matching the configured key id, and [`JwtService::jwks`]
//! publishes the public key for verifiers outside this process.
//!
//! ## Claims
//!
//! | Claim | Present on | Meaning |
//! |-------|-----------|---------|
//! | `iss`, `sub`, `aud`, `exp`, `iat`, `jti` | always | standard registered claims |
//! | `scope` | access tokens | space-delimited granted scope |
//! | `token_type` | always | `access`, `refresh`, or `id_token` |
//! | `nonce` | ID tokens, when the authorize request carried one | OIDC replay binding |
//! | `auth_time` | ID tokens | when the user actually authenticated |
//! | `azp` | ID tokens | authorized party (the client_id) |

use crate::config::{JwtAlgorithm, JwtConfig};
use crate::errors::ApiError;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rsa::pkcs8::DecodePublicKey;
use rsa::traits::PublicKeyParts;
use rsa::RsaPublicKey;
use serde::{Deserialize, Serialize};
use std::fs;
use uuid::Uuid;

/// Whether a token is an access token, a refresh token, or an ID token.
/// Distinguished so a token presented where a different kind is expected is
/// rejected rather than silently accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
    Refresh,
    IdToken,
}

/// JWT claim set shared by access tokens and ID tokens. Unused fields are
/// omitted from the wire form via `skip_serializing_if`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub iss: String,
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
    pub jti: Uuid,
    pub token_type: TokenType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,
}

/// One entry of `/oauth2/.well-known/jwks.json`, for the RS256 case.
#[derive(Debug, Clone, Serialize)]
pub struct JwkEntry {
    pub kty: &'static str,
    #[serde(rename = "use")]
    pub use_: &'static str,
    pub alg: &'static str,
    pub kid: String,
    pub n: String,
    pub e: String,
}

/// `/oauth2/.well-known/jwks.json` response body.
#[derive(Debug, Clone, Serialize)]
pub struct JwksDocument {
    pub keys: Vec<JwkEntry>,
}

/// Signs and verifies tokens for one configured algorithm/key pair.
///
/// Holds both the encoding and decoding halves so a single service instance
/// can both mint and validate tokens without re-reading key material per
/// call.
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
    kid: Option<String>,
    config: JwtConfig,
    /// RSA public key components (base64url modulus/exponent) for JWKS
    /// publication. Only populated for RS256, derived from the configured
    /// public key PEM by [`rsa_modulus_and_exponent`].
    rsa_public: Option<(String, String)>,
}

impl JwtService {
    /// Builds the service from configuration. Panics at startup (not at
    /// request time) if RS256 is configured but the key files are unreadable
    /// or malformed — a misconfigured deployment should fail fast.
    pub fn new(config: JwtConfig) -> Self {
        match config.algorithm {
            JwtAlgorithm::Hs256 => {
                let key_bytes = config.secret.as_bytes();
                Self {
                    encoding_key: EncodingKey::from_secret(key_bytes),
                    decoding_key: DecodingKey::from_secret(key_bytes),
                    algorithm: Algorithm::HS256,
                    kid: config.kid.clone(),
                    config,
                    rsa_public: None,
                }
            }
            JwtAlgorithm::Rs256 => {
                let private_path = config
                    .private_key_path
                    .as_ref()
                    .expect("JWT_PRIVATE_KEY_PATH required for RS256");
                let public_path = config
                    .public_key_path
                    .as_ref()
                    .expect("JWT_PUBLIC_KEY_PATH required for RS256");

                let private_pem =
                    fs::read(private_path).expect("failed to read JWT private key file");
                let public_pem =
                    fs::read(public_path).expect("failed to read JWT public key file");

                let encoding_key = EncodingKey::from_rsa_pem(&private_pem)
                    .expect("JWT private key is not a valid RSA PEM");
                let decoding_key = DecodingKey::from_rsa_pem(&public_pem)
                    .expect("JWT public key is not a valid RSA PEM");

                let rsa_public = Some(
                    rsa_modulus_and_exponent(&public_pem)
                        .expect("JWT public key is not a valid RSA SubjectPublicKeyInfo PEM"),
                );

                Self {
                    encoding_key,
                    decoding_key,
                    algorithm: Algorithm::RS256,
                    kid: config.kid.clone(),
                    config,
                    rsa_public,
                }
            }
        }
    }

    /// Mints an access token carrying `scope`, bound to `client_id` as
    /// audience. `jti` is returned alongside so callers can persist it as
    /// the `OAuth2Token.id` / introspection key.
    pub fn issue_access_token(
        &self,
        user_id: Uuid,
        client_id: &str,
        scope: &str,
    ) -> Result<(String, Uuid, i64), ApiError> {
        let now = chrono::Utc::now().timestamp();
        let jti = Uuid::new_v4();
        let exp = now + self.config.access_token_ttl_seconds as i64;

        let claims = Claims {
            sub: user_id,
            iss: self.config.issuer.clone(),
            aud: client_id.to_string(),
            exp,
            iat: now,
            jti,
            token_type: TokenType::Access,
            scope: Some(scope.to_string()),
            nonce: None,
            auth_time: None,
            azp: None,
            email: None,
            preferred_username: None,
        };

        let token = self.encode(&claims)?;
        Ok((token, jti, exp))
    }

    /// Mints an OIDC ID token. `nonce` is carried through verbatim from the
    /// authorize request when present; `auth_time` is when the user actually
    /// authenticated (not necessarily "now", for long-lived sessions).
    #[allow(clippy::too_many_arguments)]
    pub fn issue_id_token(
        &self,
        user_id: Uuid,
        client_id: &str,
        nonce: Option<String>,
        auth_time: i64,
        email: Option<String>,
        preferred_username: Option<String>,
    ) -> Result<String, ApiError> {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: user_id,
            iss: self.config.issuer.clone(),
            aud: client_id.to_string(),
            exp: now + self.config.access_token_ttl_seconds as i64,
            iat: now,
            jti: Uuid::new_v4(),
            token_type: TokenType::IdToken,
            scope: None,
            nonce,
            auth_time: Some(auth_time),
            azp: Some(client_id.to_string()),
            email,
            preferred_username,
        };

        self.encode(&claims)
    }

    fn encode(&self, claims: &Claims) -> Result<String, ApiError> {
        let mut header = Header::new(self.algorithm);
        header.kid = self.kid.clone();
        encode(&header, claims, &self.encoding_key).map_err(|e| {
            tracing::error!(error = %e, "failed to sign jwt");
            ApiError::InternalError {
                message: "token signing failed".to_string(),
            }
        })
    }

    /// Verifies a token's signature and standard claims, without regard to
    /// `token_type`. Callers that need a specific type call
    /// [`Self::validate_access_token`] instead.
    pub fn decode_token(&self, token: &str) -> Result<Claims, ApiError> {
        let mut validation = Validation::new(self.algorithm);
        validation.set_issuer(&[&self.config.issuer]);
        validation.validate_aud = false;

        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            use jsonwebtoken::errors::ErrorKind;
            match e.kind() {
                ErrorKind::ExpiredSignature => ApiError::TokenExpired,
                _ => ApiError::InvalidToken,
            }
        })?;

        Ok(data.claims)
    }

    /// Decodes and requires the token to be an access token.
    pub fn validate_access_token(&self, token: &str) -> Result<Claims, ApiError> {
        let claims = self.decode_token(token)?;
        if claims.token_type != TokenType::Access {
            return Err(ApiError::InvalidToken);
        }
        Ok(claims)
    }

    /// Strips the `Bearer ` prefix from an `Authorization` header value.
    pub fn extract_from_header(header: &str) -> Result<&str, ApiError> {
        header.strip_prefix("Bearer ").ok_or(ApiError::MissingAuth)
    }

    /// The configured algorithm, for callers that branch on it (e.g. the
    /// discovery document).
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// `alg` as the string OIDC discovery publishes under
    /// `id_token_signing_alg_values_supported`.
    pub fn algorithm_name(&self) -> &'static str {
        match self.algorithm {
            Algorithm::HS256 => "HS256",
            Algorithm::RS256 => "RS256",
            _ => "HS256",
        }
    }

    /// The configured token issuer (`iss` claim value), reused verbatim as
    /// the OIDC discovery document's `issuer`.
    pub fn issuer(&self) -> &str {
        &self.config.issuer
    }

    /// Publishes the public verification key(s) for
    /// `/oauth2/.well-known/jwks.json`. `None` when HS256 is configured — a
    /// symmetric secret is never published.
    pub fn jwks(&self) -> Option<JwksDocument> {
        let (n, e) = self.rsa_public.clone()?;
        let kid = self.kid.clone().unwrap_or_else(|| "default".to_string());
        Some(JwksDocument {
            keys: vec![JwkEntry {
                kty: "RSA",
                use_: "sig",
                alg: "RS256",
                kid,
                n,
                e,
            }],
        })
    }
}

/// Extracts base64url-encoded modulus/exponent from an RSA public key PEM, for
/// the `n`/`e` fields of a JWKS entry (RFC 7517 §9.3). `None` if the PEM
/// isn't a valid RSA SubjectPublicKeyInfo.
fn rsa_modulus_and_exponent(public_pem: &[u8]) -> Option<(String, String)> {
    let pem = std::str::from_utf8(public_pem).ok()?;
    let public_key = RsaPublicKey::from_public_key_pem(pem).ok()?;
    let n = URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be());
    let e = URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be());
    Some((n, e))
}

impl std::fmt::Debug for JwtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtService")
            .field("algorithm", &self.algorithm)
            .field("kid", &self.kid)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JwtConfig;

    fn test_config() -> JwtConfig {
        JwtConfig {
            secret: "test-secret-at-least-32-bytes-long".to_string(),
            algorithm: JwtAlgorithm::Hs256,
            kid: None,
            private_key_path: None,
            public_key_path: None,
            access_token_ttl_seconds: 900,
            refresh_token_ttl_seconds: 604_800,
            issuer: "https://auth.example.test".to_string(),
            audience: "default".to_string(),
        }
    }

    #[test]
    fn test_issue_and_validate_access_token_round_trip() {
        let service = JwtService::new(test_config());
        let user_id = Uuid::new_v4();

        let (token, jti, _exp) = service
            .issue_access_token(user_id, "client-123", "openid profile")
            .unwrap();

        let claims = service.validate_access_token(&token).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.jti, jti);
        assert_eq!(claims.aud, "client-123");
        assert_eq!(claims.scope.as_deref(), Some("openid profile"));
    }

    #[test]
    fn test_id_token_carries_nonce_and_auth_time() {
        let service = JwtService::new(test_config());
        let user_id = Uuid::new_v4();

        let token = service
            .issue_id_token(
                user_id,
                "client-123",
                Some("abc-nonce".to_string()),
                1_700_000_000,
                Some("user@example.com".to_string()),
                Some("jdoe".to_string()),
            )
            .unwrap();

        let claims = service.decode_token(&token).unwrap();
        assert_eq!(claims.token_type, TokenType::IdToken);
        assert_eq!(claims.nonce.as_deref(), Some("abc-nonce"));
        assert_eq!(claims.auth_time, Some(1_700_000_000));
        assert_eq!(claims.email.as_deref(), Some("user@example.com"));
    }

    #[test]
    fn test_refresh_token_rejected_by_access_validator() {
        let service = JwtService::new(test_config());
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: Uuid::new_v4(),
            iss: service.config.issuer.clone(),
            aud: "client-123".to_string(),
            exp: now + 60,
            iat: now,
            jti: Uuid::new_v4(),
            token_type: TokenType::Refresh,
            scope: None,
            nonce: None,
            auth_time: None,
            azp: None,
            email: None,
            preferred_username: None,
        };
        let token = service.encode(&claims).unwrap();

        assert!(matches!(
            service.validate_access_token(&token),
            Err(ApiError::InvalidToken)
        ));
    }

    #[test]
    fn test_extract_from_header() {
        assert_eq!(
            JwtService::extract_from_header("Bearer abc.def.ghi").unwrap(),
            "abc.def.ghi"
        );
        assert!(JwtService::extract_from_header("abc.def.ghi").is_err());
    }

    #[test]
    fn test_hs256_jwks_is_none() {
        let service = JwtService::new(test_config());
        assert!(service.jwks().is_none());
    }
}
