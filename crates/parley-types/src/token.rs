use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

use crate::UserId;
use crate::error::ChatError;

/// JWT claims shared by the REST middleware and the gateway admission check.
/// Canonical definition lives here to eliminate duplication between the two
/// boundaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: UserId,
    pub exp: usize,
}

/// Validates bearer tokens and extracts the subject identity. Stateless:
/// constructed once from the signing secret and shared by reference.
///
/// Verification failure is a normal branch (`ChatError::InvalidToken`) —
/// never a panic — regardless of whether the token is empty, malformed,
/// carries a bad signature, or has expired.
pub struct TokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            // Default validation checks exp with HS256.
            validation: Validation::default(),
        }
    }

    pub fn verify(&self, token: &str) -> Result<Claims, ChatError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|_| ChatError::InvalidToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};

    const SECRET: &str = "test-secret";

    fn token_with_exp(sub: UserId, exp: i64) -> String {
        let claims = Claims {
            sub,
            exp: exp as usize,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn valid_token_yields_subject() {
        let verifier = TokenVerifier::new(SECRET);
        let exp = (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp();
        let token = token_with_exp(42, exp);

        let claims = verifier.verify(&token).unwrap();
        assert_eq!(claims.sub, 42);
    }

    #[test]
    fn expired_token_is_rejected() {
        let verifier = TokenVerifier::new(SECRET);
        let exp = (chrono::Utc::now() - chrono::Duration::hours(1)).timestamp();
        let token = token_with_exp(42, exp);

        assert_eq!(verifier.verify(&token), Err(ChatError::InvalidToken));
    }

    #[test]
    fn wrong_signature_is_rejected() {
        let verifier = TokenVerifier::new("a different secret");
        let exp = (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp();
        let token = token_with_exp(42, exp);

        assert_eq!(verifier.verify(&token), Err(ChatError::InvalidToken));
    }

    #[test]
    fn garbage_and_empty_tokens_are_rejected() {
        let verifier = TokenVerifier::new(SECRET);
        assert_eq!(verifier.verify(""), Err(ChatError::InvalidToken));
        assert_eq!(
            verifier.verify("not.a.token"),
            Err(ChatError::InvalidToken)
        );
    }
}
