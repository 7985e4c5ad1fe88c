//! Input hygiene: format validation, sanitization, and IP normalization.
//!
//! Pure helpers used by the HTTP layer before requests reach the engines.

use std::net::IpAddr;

/// Check that an email address is structurally plausible: exactly one `@`,
/// a non-empty local part, and a dotted domain with an alphabetic TLD of at
/// least two characters.
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    if !local
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '%' | '+' | '-'))
    {
        return false;
    }

    let Some((name, tld)) = domain.rsplit_once('.') else {
        return false;
    };
    if name.is_empty()
        || !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-'))
    {
        return false;
    }
    tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic())
}

/// Usernames are 3-20 characters of `[A-Za-z0-9_-]`.
pub fn is_valid_username(username: &str) -> bool {
    (3..=20).contains(&username.len())
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Password policy: at least 8 characters with an uppercase letter, a
/// lowercase letter, a digit, and a special character.
pub fn is_valid_password(password: &str) -> bool {
    const SPECIALS: &str = "!@#$%^&*(),.?\":{}|<>";

    password.len() >= 8
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| SPECIALS.contains(c))
}

/// Strip characters commonly used in injection payloads.
pub fn sanitize_input(input: &str) -> String {
    input
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | '\'' | '"' | ';'))
        .collect()
}

/// IPs with a known history of abuse, rejected outright.
const IP_BLACKLIST: &[&str] = &["1.2.3.4", "5.6.7.8"];

/// Whether the IP is on the static blacklist. The address is normalized
/// first so IPv4-mapped IPv6 forms cannot dodge the list.
pub fn is_ip_blacklisted(ip_address: &str) -> bool {
    let normalized = normalize_ip(ip_address);
    IP_BLACKLIST.contains(&normalized.as_str())
}

/// Normalize an IP address so the same client is keyed consistently.
///
/// IPv4-mapped IPv6 addresses (e.g. `::ffff:192.168.1.1`) become their plain
/// IPv4 form. Strings that do not parse as IPs are returned unchanged.
pub fn normalize_ip(ip_str: &str) -> String {
    match ip_str.parse::<IpAddr>() {
        Ok(IpAddr::V6(v6)) => {
            if let Some(v4) = v6.to_ipv4_mapped() {
                v4.to_string()
            } else {
                v6.to_string()
            }
        }
        Ok(IpAddr::V4(v4)) => v4.to_string(),
        Err(_) => ip_str.to_string(),
    }
}
