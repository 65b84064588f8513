use rand_core::{OsRng, RngCore};
use sharekeep_core::validation::{INVITE_CODE_ALPHABET, INVITE_CODE_LENGTH};

/// Source of candidate invite codes. Uniqueness is enforced by the store.
pub trait InviteCodes: Send + Sync {
    fn generate(&self) -> String;
}

/// Uniform codes over [`INVITE_CODE_ALPHABET`] from the OS RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomInviteCodes;

// Largest multiple of the alphabet size below 256; bytes at or above it are
// rejected to keep the distribution uniform.
const ACCEPT_BELOW: u8 = (256 / INVITE_CODE_ALPHABET.len() * INVITE_CODE_ALPHABET.len()) as u8;

impl InviteCodes for RandomInviteCodes {
    fn generate(&self) -> String {
        let mut code = String::with_capacity(INVITE_CODE_LENGTH);
        let mut buf = [0_u8; 16];
        while code.len() < INVITE_CODE_LENGTH {
            OsRng.fill_bytes(&mut buf);
            for byte in buf {
                if byte >= ACCEPT_BELOW {
                    continue;
                }
                let index = usize::from(byte) % INVITE_CODE_ALPHABET.len();
                code.push(char::from(INVITE_CODE_ALPHABET[index]));
                if code.len() == INVITE_CODE_LENGTH {
                    break;
                }
            }
        }
        code
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use sharekeep_core::validation::validate_invite_code;

    use super::*;

    #[test]
    fn generated_codes_are_valid() {
        assert_eq!(ACCEPT_BELOW, 224);
        for _ in 0..200 {
            let code = RandomInviteCodes.generate();
            assert!(validate_invite_code(&code).is_ok(), "{code}");
        }
    }

    #[test]
    fn generated_codes_vary() {
        let codes: HashSet<_> = (0..50).map(|_| RandomInviteCodes.generate()).collect();
        assert!(codes.len() > 45);
    }
}
