//! XChaCha20-Poly1305 leaf cipher (detached tag)

use chacha20poly1305::{
    Key, Tag, XChaCha20Poly1305, XNonce,
    aead::{AeadInPlace, Error, KeyInit},
};
use zeroize::Zeroizing;

use crate::algorithm::TAG_SIZE;

pub const NONCE_SIZE: usize = 24;

pub fn seal(
    key: &[u8; 32],
    nonce: &[u8; NONCE_SIZE],
    plaintext: &[u8],
    aad: &[u8],
) -> Result<(Vec<u8>, [u8; TAG_SIZE]), Error> {
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key));

    let mut buffer = plaintext.to_vec();
    let tag = cipher.encrypt_in_place_detached(XNonce::from_slice(nonce), aad, &mut buffer)?;

    let mut tag_bytes = [0u8; TAG_SIZE];
    tag_bytes.copy_from_slice(&tag);

    Ok((buffer, tag_bytes))
}

pub fn open(
    key: &[u8; 32],
    nonce: &[u8; NONCE_SIZE],
    ciphertext: &[u8],
    tag: &[u8; TAG_SIZE],
    aad: &[u8],
) -> Result<Zeroizing<Vec<u8>>, Error> {
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key));

    let mut buffer = Zeroizing::new(ciphertext.to_vec());
    cipher.decrypt_in_place_detached(
        XNonce::from_slice(nonce),
        aad,
        &mut buffer[..],
        Tag::from_slice(tag),
    )?;

    Ok(buffer)
}
