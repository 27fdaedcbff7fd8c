//! Public identifiers.

use chrono::Utc;
use rand::Rng;

const UPPER_ALNUM: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
/// No 0/O or 1/I/L.
const UNAMBIGUOUS: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

fn random_from(alphabet: &[u8], len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| alphabet[rng.gen_range(0..alphabet.len())] as char)
        .collect()
}

fn tail(s: &str, n: usize) -> &str {
    let start = s.char_indices().rev().nth(n.saturating_sub(1)).map_or(0, |(i, _)| i);
    &s[start..]
}

/// Eight upper-case alphanumerics, e.g. `7K2M9QXA`.
pub fn request_id() -> String {
    random_from(UPPER_ALNUM, 8)
}

/// `{prefix}-{last 6 of user id}-{unix millis}-{6 random upper-case base36}`.
///
/// Long enough for gateways that require identifiers of 20+ characters.
pub fn order_id(prefix: &str, user_id: &str) -> String {
    format!(
        "{}-{}-{}-{}",
        prefix,
        tail(user_id, 6),
        Utc::now().timestamp_millis(),
        random_from(UPPER_ALNUM, 6)
    )
}

/// Six unambiguous characters followed by the last four of the user id.
pub fn referral_code(user_id: &str) -> String {
    format!("{}{}", random_from(UNAMBIGUOUS, 6), tail(user_id, 4).to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_id_shape() {
        let id = request_id();
        assert_eq!(id.len(), 8);
        assert!(id.bytes().all(|b| UPPER_ALNUM.contains(&b)));
    }

    #[test]
    fn test_order_id_shape() {
        let id = order_id("TELE", "7012345678");
        let parts: Vec<&str> = id.split('-').collect();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0], "TELE");
        assert_eq!(parts[1], "345678");
        assert!(parts[2].parse::<i64>().is_ok());
        assert_eq!(parts[3].len(), 6);
        assert!(id.len() >= 20);

        // Short user ids are used whole
        assert!(order_id("TELE", "42").starts_with("TELE-42-"));
    }

    #[test]
    fn test_referral_code_shape() {
        let code = referral_code("7012345678");
        assert_eq!(code.len(), 10);
        assert!(code.ends_with("5678"));
        assert!(code[..6].bytes().all(|b| UNAMBIGUOUS.contains(&b)));
    }
}
