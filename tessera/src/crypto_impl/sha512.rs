use sha2::{Digest, Sha512};

use crate::crypto::*;

/// The version and type of the sha2 crate that the `Sha512Hash` trait is implemented for.
pub type CrateSha512 = Sha512;
impl Sha512Hash for CrateSha512 {
    fn new() -> Self {
        Digest::new()
    }

    fn update(&mut self, data: &[u8]) {
        Digest::update(self, data)
    }

    fn finish(self) -> [u8; SHA512_HASH_SIZE] {
        self.finalize().into()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn streaming_matches_one_shot() {
        let mut h = <CrateSha512 as Sha512Hash>::new();
        Sha512Hash::update(&mut h, b"alice");
        Sha512Hash::update(&mut h, b"@service1");
        let streamed = h.finish();
        let one_shot: [u8; SHA512_HASH_SIZE] = Sha512::digest(b"alice@service1").into();
        assert_eq!(streamed, one_shot);
    }
}
