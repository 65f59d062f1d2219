use crate::{error::*, repository::GroupRepository};
use rand::Rng;
use tracing::debug;

/// Length of a group invite code.
pub const CODE_LENGTH: usize = 6;

/// Codes are drawn from uppercase letters and digits, giving 36^6 possible
/// values; collisions stay negligible until the group count approaches the
/// birthday bound (~50k groups for a 2% collision chance per draw).
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Retry bound for unique-code generation. A bound turns a pathological
/// store into a surfaced error instead of a hang.
pub const MAX_CODE_ATTEMPTS: u32 = 32;

/// Source of candidate invite codes. Swappable so tests can force collisions.
pub trait InviteCodeSource: Send + Sync {
    fn generate(&self) -> String;
}

/// Default random code source.
pub struct RandomCodeSource;

impl InviteCodeSource for RandomCodeSource {
    fn generate(&self) -> String {
        let mut rng = rand::thread_rng();
        (0..CODE_LENGTH)
            .map(|_| {
                let index = rng.gen_range(0..CODE_ALPHABET.len());
                char::from(CODE_ALPHABET[index])
            })
            .collect()
    }
}

/// Draw codes until one does not collide with an existing group.
///
/// Uniqueness is only as strong as the store's own guarantee; callers that
/// need it across concurrent creations must back `find_by_invite_code` with
/// a unique constraint.
pub async fn generate_unique_code(
    repository: &dyn GroupRepository,
    source: &dyn InviteCodeSource,
) -> Result<String> {
    for attempt in 0..MAX_CODE_ATTEMPTS {
        let code = source.generate();
        if repository.find_by_invite_code(&code).await?.is_none() {
            return Ok(code);
        }
        debug!(attempt, code = %code, "invite code collision, retrying");
    }

    Err(MembershipError::Conflict(
        "could not generate a unique invite code".to_string(),
    ))
}
