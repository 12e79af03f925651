pub mod aead;
pub mod kdf;
pub mod mac;

pub use aead::{decrypt_leaf, encrypt_leaf};
pub use kdf::{DerivedKeyMaterial, Seed, derive, derive_from_seed};
