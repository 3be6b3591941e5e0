use anyhow::{anyhow, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub access_token_expiry_minutes: i64,
    pub refresh_token_expiry_days: i64,
    pub leeway_seconds: u64,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            access_token_expiry_minutes: 10,
            refresh_token_expiry_days: 7,
            leeway_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }
}

/// Identity carried by both tokens of a pair. A refreshed pair preserves
/// these fields verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: Uuid,
    pub username: String,
    pub role: String,
    pub session_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub username: String,
    pub role: String,
    pub session_id: String,
    pub exp: i64,
    pub iat: i64,
    #[serde(rename = "type")]
    pub token_type: String,
}

impl Claims {
    fn new(identity: &Identity, token_type: TokenType, expiry_seconds: i64) -> Self {
        let now = Utc::now();
        Self {
            sub: identity.user_id.to_string(),
            username: identity.username.clone(),
            role: identity.role.clone(),
            session_id: identity.session_id.to_string(),
            exp: (now + Duration::seconds(expiry_seconds)).timestamp(),
            iat: now.timestamp(),
            token_type: token_type.as_str().to_string(),
        }
    }

    pub fn user_id(&self) -> Result<Uuid> {
        Uuid::parse_str(&self.sub).map_err(|e| anyhow!("Invalid user ID in claims: {e}"))
    }

    pub fn session_id(&self) -> Result<Uuid> {
        Uuid::parse_str(&self.session_id).map_err(|e| anyhow!("Invalid session ID in claims: {e}"))
    }

    pub fn identity(&self) -> Result<Identity> {
        Ok(Identity {
            user_id: self.user_id()?,
            username: self.username.clone(),
            role: self.role.clone(),
            session_id: self.session_id()?,
        })
    }

    pub fn is_access_token(&self) -> bool {
        self.token_type == TokenType::Access.as_str()
    }

    pub fn is_refresh_token(&self) -> bool {
        self.token_type == TokenType::Refresh.as_str()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub refresh_expires_in: i64,
}

/// Signs and verifies the access/refresh token pair. The two token families
/// use independent HS256 secrets so one cannot stand in for the other even
/// if the `type` claim were forged.
pub struct JwtManager {
    config: JwtConfig,
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
}

impl JwtManager {
    pub fn new(config: JwtConfig, access_secret: &str, refresh_secret: &str) -> Result<Self> {
        if access_secret.len() < 32 || refresh_secret.len() < 32 {
            return Err(anyhow!("JWT secrets must be at least 32 characters"));
        }
        Ok(Self {
            config,
            access_encoding: EncodingKey::from_secret(access_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(access_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(refresh_secret.as_bytes()),
        })
    }

    pub fn generate_access_token(&self, identity: &Identity) -> Result<String> {
        let claims = Claims::new(
            identity,
            TokenType::Access,
            self.config.access_token_expiry_minutes * 60,
        );
        encode(&Header::new(Algorithm::HS256), &claims, &self.access_encoding)
            .map_err(|e| anyhow!("Failed to encode access token: {e}"))
    }

    pub fn generate_refresh_token(&self, identity: &Identity) -> Result<String> {
        let claims = Claims::new(
            identity,
            TokenType::Refresh,
            self.config.refresh_token_expiry_days * 24 * 60 * 60,
        );
        encode(&Header::new(Algorithm::HS256), &claims, &self.refresh_encoding)
            .map_err(|e| anyhow!("Failed to encode refresh token: {e}"))
    }

    pub fn generate_token_pair(&self, identity: &Identity) -> Result<TokenPair> {
        Ok(TokenPair {
            access_token: self.generate_access_token(identity)?,
            refresh_token: self.generate_refresh_token(identity)?,
            expires_in: self.config.access_token_expiry_minutes * 60,
            refresh_expires_in: self.config.refresh_token_expiry_days * 24 * 60 * 60,
        })
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = self.config.leeway_seconds;
        validation
    }

    pub fn validate_access_token(&self, token: &str) -> Result<Claims> {
        let data = decode::<Claims>(token, &self.access_decoding, &self.validation())
            .map_err(|e| anyhow!("Token validation failed: {e}"))?;
        if !data.claims.is_access_token() {
            return Err(anyhow!("Token is not an access token"));
        }
        Ok(data.claims)
    }

    pub fn validate_refresh_token(&self, token: &str) -> Result<Claims> {
        let data = decode::<Claims>(token, &self.refresh_decoding, &self.validation())
            .map_err(|e| anyhow!("Token validation failed: {e}"))?;
        if !data.claims.is_refresh_token() {
            return Err(anyhow!("Token is not a refresh token"));
        }
        Ok(data.claims)
    }

    /// Reads claims from an expired or otherwise unverifiable access token.
    /// Used only to learn which session a stale token belonged to.
    pub fn decode_without_validation(&self, token: &str) -> Result<Claims> {
        let mut validation = self.validation();
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;

        let data = decode::<Claims>(token, &self.access_decoding, &validation)
            .map_err(|e| anyhow!("Failed to decode token: {e}"))?;
        Ok(data.claims)
    }

    pub fn config(&self) -> &JwtConfig {
        &self.config
    }
}
