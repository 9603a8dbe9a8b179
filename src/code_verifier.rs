use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};

/// Number of random bytes backing a code verifier. Encodes to 43 base64url characters, the
/// minimum length allowed by RFC 7636.
const CODE_VERIFIER_ENTROPY_BYTES: usize = 32;

/// Base64 encoding using the URL safe alphabet (`-` and `_` instead of `+` and `/`) without any
/// trailing `=` padding.
pub fn base64_url_encode(bytes: impl AsRef<[u8]>) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeVerifier {
    code_verifier: String,
}

impl CodeVerifier {
    /// see: https://datatracker.ietf.org/doc/html/rfc7636#section-4.1
    pub fn generate() -> Self {
        use rand::RngCore;

        // `rand::rng()` is a thread-local CSPRNG, periodically reseeded from the OS.
        let mut bytes = [0u8; CODE_VERIFIER_ENTROPY_BYTES];
        rand::rng().fill_bytes(&mut bytes);

        Self {
            code_verifier: base64_url_encode(bytes),
        }
    }

    /// Restore a verifier previously persisted between the authorization redirect and the
    /// callback.
    pub(crate) fn from_stored(code_verifier: String) -> Self {
        Self { code_verifier }
    }

    /// see: https://datatracker.ietf.org/doc/html/rfc7636#section-4.2
    pub fn to_code_challenge(&self) -> CodeChallenge {
        use sha2::Digest;

        let mut hasher = sha2::Sha256::new();
        hasher.update(self.code_verifier.as_bytes());
        let digest = hasher.finalize();

        CodeChallenge {
            code_challenge: base64_url_encode(digest),
            code_challenge_method: CodeChallengeMethod::S256,
        }
    }

    pub fn code_verifier(&self) -> &str {
        self.code_verifier.as_str()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeChallengeMethod {
    S256,
}

impl CodeChallengeMethod {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            CodeChallengeMethod::S256 => "S256",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeChallenge {
    code_challenge: String,
    code_challenge_method: CodeChallengeMethod,
}

impl CodeChallenge {
    pub fn code_challenge(&self) -> &str {
        self.code_challenge.as_str()
    }

    pub fn code_challenge_method(&self) -> CodeChallengeMethod {
        self.code_challenge_method
    }
}
