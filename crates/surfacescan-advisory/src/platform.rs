//! Platform identifier (CPE) canonicalization
//!
//! A fixed lookup table maps common product names to CPE 2.3 prefixes.
//! First matching entry wins, so order is part of the contract.

/// Product keyword to CPE 2.3 prefix, common exposed software first
pub const PRODUCT_PLATFORM_MAP: &[(&str, &str)] = &[
    // Web servers
    ("apache", "cpe:2.3:a:apache:http_server"),
    ("nginx", "cpe:2.3:a:nginx:nginx"),
    ("iis", "cpe:2.3:a:microsoft:internet_information_services"),
    // Databases
    ("mysql", "cpe:2.3:a:mysql:mysql"),
    ("mariadb", "cpe:2.3:a:mariadb:mariadb"),
    ("postgresql", "cpe:2.3:a:postgresql:postgresql"),
    ("mongodb", "cpe:2.3:a:mongodb:mongodb"),
    ("redis", "cpe:2.3:a:redis:redis"),
    // Remote access
    ("openssh", "cpe:2.3:a:openbsd:openssh"),
    // File transfer
    ("vsftpd", "cpe:2.3:a:vsftpd_project:vsftpd"),
    ("proftpd", "cpe:2.3:a:proftpd_project:proftpd"),
    // Mail
    ("postfix", "cpe:2.3:a:postfix:postfix"),
    ("exim", "cpe:2.3:a:exim:exim"),
    ("dovecot", "cpe:2.3:a:dovecot:dovecot"),
    // Runtimes and app servers
    ("php", "cpe:2.3:a:php:php"),
    ("node.js", "cpe:2.3:a:nodejs:node.js"),
    ("tomcat", "cpe:2.3:a:apache:tomcat"),
];

/// Build a platform identifier from service identity, if the product is known.
///
/// The version is reduced to its leading token and stripped to digits and
/// dots, so "2.4.41 (Ubuntu)" canonicalizes to "2.4.41".
pub fn platform_id(name: &str, product: Option<&str>, version: Option<&str>) -> Option<String> {
    let subject = product.unwrap_or(name).to_ascii_lowercase();
    if subject.is_empty() {
        return None;
    }

    let (_, prefix) = PRODUCT_PLATFORM_MAP
        .iter()
        .find(|(key, _)| subject.contains(key))?;

    match version.and_then(sanitize_version) {
        Some(version) => Some(format!("{}:{}:*:*:*:*:*:*:*", prefix, version)),
        None => Some(format!("{}:*:*:*:*:*:*:*:*", prefix)),
    }
}

/// Keep only the numeric dotted core of the leading version token
fn sanitize_version(version: &str) -> Option<String> {
    let token = version.split_whitespace().next()?;
    let cleaned: String = token
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_product_with_version() {
        let id = platform_id("http", Some("nginx"), Some("1.18.0"));
        assert_eq!(
            id.as_deref(),
            Some("cpe:2.3:a:nginx:nginx:1.18.0:*:*:*:*:*:*:*")
        );
    }

    #[test]
    fn test_version_sanitization() {
        let id = platform_id("http", Some("Apache httpd"), Some("2.4.41 (Ubuntu)"));
        assert_eq!(
            id.as_deref(),
            Some("cpe:2.3:a:apache:http_server:2.4.41:*:*:*:*:*:*:*")
        );
    }

    #[test]
    fn test_version_with_patch_suffix() {
        let id = platform_id("ssh", Some("OpenSSH"), Some("8.9p1"));
        assert_eq!(
            id.as_deref(),
            Some("cpe:2.3:a:openbsd:openssh:8.9:*:*:*:*:*:*:*")
        );
    }

    #[test]
    fn test_known_product_without_version() {
        let id = platform_id("mysql", None, None);
        assert_eq!(
            id.as_deref(),
            Some("cpe:2.3:a:mysql:mysql:*:*:*:*:*:*:*:*")
        );
    }

    #[test]
    fn test_unknown_product() {
        assert_eq!(platform_id("gopher", Some("Gophernicus"), Some("3.1")), None);
        assert_eq!(platform_id("", None, None), None);
    }

    #[test]
    fn test_first_match_wins() {
        // "Apache Tomcat" hits the apache entry before tomcat; table order
        // is part of the contract
        let id = platform_id("http", Some("Apache Tomcat"), None);
        assert_eq!(
            id.as_deref(),
            Some("cpe:2.3:a:apache:http_server:*:*:*:*:*:*:*:*")
        );
    }
}
