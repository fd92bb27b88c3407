use rand::Rng;

/// Alphabet used for generated short codes: digits plus both letter cases,
/// 62 symbols. Codes are case-sensitive.
const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Length of every generated code.
pub const CODE_LEN: usize = 6;

/// Stateless generator of random fixed-length short codes.
///
/// Each call draws from the thread-local RNG, so it is safe to share one
/// generator across concurrent requests.
#[derive(Debug, Clone, Copy, Default)]
pub struct CodeGenerator;

impl CodeGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Produce one uniformly random 6-character alphanumeric code.
    pub fn generate(&self) -> String {
        let mut rng = rand::thread_rng();
        (0..CODE_LEN)
            .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
            .collect()
    }
}
