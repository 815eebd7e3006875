/// The size of a SHA512 hash, which is always 64 bytes
pub const SHA512_HASH_SIZE: usize = 64;

/// A SHA-512 implementation.
/// Does not need to be threadsafe.
pub trait Sha512Hash {
    /// Create a new instance of SHA-512 for streaming data to.
    fn new() -> Self;
    /// Update the instance of SHA-512 with input `data`.
    /// This must update the state of SHA-512 as if `data` was appended to the previous input.
    fn update(&mut self, data: &[u8]);
    /// Finish streaming input and output the final hash.
    fn finish(self) -> [u8; SHA512_HASH_SIZE];
}
