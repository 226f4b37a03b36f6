use rand::{rngs::OsRng, RngCore};
use time::{Duration, OffsetDateTime};
use tracing::warn;

use super::password::{hash_password, verify_password};
use crate::users::repo_types::{ResetTicket, User};

pub const RESET_TOKEN_TTL: Duration = Duration::minutes(10);

/// Plain token for the mail plus the ticket to persist.
pub struct IssuedReset {
    pub plain: String,
    pub ticket: ResetTicket,
}

pub fn issue_reset_token(now: OffsetDateTime) -> anyhow::Result<IssuedReset> {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    let plain = hex::encode(bytes);
    let token_hash = hash_password(&plain)?;
    Ok(IssuedReset {
        plain,
        ticket: ResetTicket {
            token_hash,
            expires_at: now + RESET_TOKEN_TTL,
        },
    })
}

/// Fails closed: no ticket, an expired ticket or a bad hash all give `false`.
pub fn verify_reset_token(user: &User, plain: &str, now: OffsetDateTime) -> bool {
    let Some(ticket) = &user.reset else {
        return false;
    };
    if now >= ticket.expires_at {
        return false;
    }
    match verify_password(plain, &ticket.token_hash) {
        Ok(ok) => ok,
        Err(e) => {
            warn!(user_id = %user.id, error = %e, "stored reset hash unreadable");
            false
        }
    }
}
