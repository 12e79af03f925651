pub mod aes_256_gcm;
pub mod xchacha20_poly1305;
