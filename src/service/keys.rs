use base64::{engine::general_purpose::STANDARD, Engine};
use rand::rngs::OsRng;
use x25519_dalek::{PublicKey, StaticSecret};

/// A freshly generated x25519 key pair, base64-encoded the way wg(8)
/// expects keys in config files.
pub struct Keypair {
    pub private: String,
    pub public: String,
}

impl Keypair {
    pub fn generate() -> Self {
        let private = StaticSecret::new(OsRng);
        let public = PublicKey::from(&private);

        Self {
            private: STANDARD.encode(private.to_bytes()),
            public: STANDARD.encode(public.to_bytes()),
        }
    }
}
