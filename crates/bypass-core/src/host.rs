//! Host classification and bypass decisions.
//!
//! Maps a requested host to the domain key used by the direct list, and
//! decides whether a request goes direct or through the proxy. The PAC
//! script served to browsers implements the same algorithm in JavaScript
//! (`hostIsIP`, `host2Domain`, `FindProxyForURL`), so every branch here has
//! to stay in lockstep with that template.
//!
//! ## Reduction rules
//!
//! ```text
//! 10.1.2.3            → ""              (private IPv4, always direct)
//! 8.8.4.4             → 8.8.4.4         (public IPv4 is its own key)
//! localhost           → ""              (single label)
//! example.com         → example.com     (already two labels)
//! www.example.com     → example.com
//! www.example.co.uk   → example.co.uk   ("co" is a known second-level label)
//! ```

use std::fmt;
use std::sync::Arc;

use crate::direct_list::DirectList;
use crate::tld::TopLevelDomainTable;

/// Result of the bypass decision for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decision {
    /// Connect to the origin without the proxy.
    Direct,
    /// Route through the proxy.
    Proxy,
}

impl Decision {
    /// Returns the decision name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Direct => "direct",
            Decision::Proxy => "proxy",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Checks whether `host` is a dotted-decimal IPv4 address.
///
/// Returns `(is_ip, is_private)`. Each octet must be one to three ASCII
/// digits with a value of at most 255. The private test compares the
/// written octets the same way the browser script does: `10`, `127` and
/// `192.168` literally, and `172.16`–`172.31` numerically on the second
/// octet.
pub fn host_is_ip(host: &str) -> (bool, bool) {
    let parts: Vec<&str> = host.split('.').collect();
    if parts.len() != 4 {
        return (false, false);
    }

    let mut octets = [0u16; 4];
    for (slot, part) in octets.iter_mut().zip(&parts) {
        if part.is_empty() || part.len() > 3 || !part.bytes().all(|b| b.is_ascii_digit()) {
            return (false, false);
        }
        // At most three digits, cannot overflow
        let n: u16 = part.parse().unwrap_or(u16::MAX);
        if n > 255 {
            return (false, false);
        }
        *slot = n;
    }

    if parts[0] == "127" || parts[0] == "10" || (parts[0] == "192" && parts[1] == "168") {
        return (true, true);
    }
    if parts[0] == "172" && (16..=31).contains(&octets[1]) {
        return (true, true);
    }
    (true, false)
}

/// Position of the last `.` at or before `from`, with a negative `from`
/// clamped to zero like `String.prototype.lastIndexOf`.
fn last_dot_at_or_before(host: &str, from: isize) -> Option<usize> {
    let end = (from.max(0) as usize + 1).min(host.len());
    host.as_bytes()[..end].iter().rposition(|&b| b == b'.')
}

/// Substring between two byte offsets, swapping them if reversed.
fn substring(host: &str, start: usize, end: usize) -> &str {
    let (lo, hi) = if start <= end { (start, end) } else { (end, start) };
    &host[lo.min(host.len())..hi.min(host.len())]
}

/// Reduces hosts to direct-list keys and makes bypass decisions.
///
/// Cheap to clone; the top-level table is shared.
#[derive(Debug, Clone, Default)]
pub struct HostClassifier {
    table: Arc<TopLevelDomainTable>,
}

impl HostClassifier {
    /// Creates a classifier over the given top-level table.
    pub fn new(table: Arc<TopLevelDomainTable>) -> Self {
        Self { table }
    }

    /// Reduces `host` to its classification key.
    ///
    /// The result is always a suffix of `host` or the empty string. Never
    /// fails: malformed addresses fall through to the hostname rules.
    pub fn classify<'a>(&self, host: &'a str) -> &'a str {
        let (is_ip, is_private) = host_is_ip(host);
        if is_private {
            return "";
        }
        if is_ip {
            return host;
        }

        let last_dot = match host.rfind('.') {
            Some(pos) => pos,
            None => return "",
        };
        let dot_2nd_last = match last_dot_at_or_before(host, last_dot as isize - 1) {
            Some(pos) => pos,
            None => return host,
        };

        let label = substring(host, dot_2nd_last + 1, last_dot);
        if self.table.contains(label) {
            return match last_dot_at_or_before(host, dot_2nd_last as isize - 1) {
                Some(dot_3rd_last) => &host[dot_3rd_last + 1..],
                None => host,
            };
        }
        &host[dot_2nd_last + 1..]
    }

    /// Decides whether a request for `url` on `host` bypasses the proxy.
    pub fn decide(&self, url: &str, host: &str, direct: &DirectList) -> Decision {
        if url.starts_with("ftp:") || host.starts_with("::ffff:") || host.ends_with(".local") {
            return Decision::Direct;
        }

        let domain = self.classify(host);
        let is_direct = if host.len() == domain.len() {
            direct.contains(host)
        } else {
            direct.contains(host) || direct.contains(domain)
        };

        if is_direct {
            Decision::Direct
        } else {
            Decision::Proxy
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> HostClassifier {
        HostClassifier::default()
    }

    fn direct(domains: &[&str]) -> DirectList {
        domains.iter().map(|d| d.to_string()).collect()
    }

    // ==================== host_is_ip Tests ====================

    #[test]
    fn host_is_ip_private_ranges() {
        assert_eq!(host_is_ip("10.0.0.5"), (true, true));
        assert_eq!(host_is_ip("127.0.0.1"), (true, true));
        assert_eq!(host_is_ip("192.168.1.1"), (true, true));
        assert_eq!(host_is_ip("172.16.0.1"), (true, true));
        assert_eq!(host_is_ip("172.31.255.255"), (true, true));
    }

    #[test]
    fn host_is_ip_public() {
        assert_eq!(host_is_ip("8.8.4.4"), (true, false));
        assert_eq!(host_is_ip("172.15.0.1"), (true, false));
        assert_eq!(host_is_ip("172.32.0.1"), (true, false));
        assert_eq!(host_is_ip("192.169.0.1"), (true, false));
    }

    #[test]
    fn host_is_ip_rejects_malformed() {
        assert_eq!(host_is_ip("1.2.3"), (false, false));
        assert_eq!(host_is_ip("1.2.3.4.5"), (false, false));
        assert_eq!(host_is_ip("1.2.3.256"), (false, false));
        assert_eq!(host_is_ip("1..3.4"), (false, false));
        assert_eq!(host_is_ip("1.2.3.1000"), (false, false));
        assert_eq!(host_is_ip("a.b.c.d"), (false, false));
        assert_eq!(host_is_ip("www.example.co.uk"), (false, false));
    }

    #[test]
    fn host_is_ip_compares_written_octets() {
        // Leading zeros are numerically valid but not the literal "10"
        assert_eq!(host_is_ip("010.0.0.1"), (true, false));
        // Second octet of 172.x is compared numerically
        assert_eq!(host_is_ip("172.016.0.1"), (true, true));
    }

    // ==================== classify Tests ====================

    #[test]
    fn classify_private_ipv4_is_empty() {
        let c = classifier();
        for host in [
            "10.1.2.3",
            "127.0.0.1",
            "192.168.0.10",
            "172.16.5.4",
            "172.20.0.1",
            "172.31.9.9",
        ] {
            assert_eq!(c.classify(host), "", "host {}", host);
        }
    }

    #[test]
    fn classify_public_ipv4_is_identity() {
        let c = classifier();
        for host in ["8.8.4.4", "1.1.1.1", "172.32.0.1", "203.0.113.7"] {
            assert_eq!(c.classify(host), host);
        }
    }

    #[test]
    fn classify_hostnames() {
        let c = classifier();
        assert_eq!(c.classify("www.example.com"), "example.com");
        assert_eq!(c.classify("a.b.c.example.com"), "example.com");
        assert_eq!(c.classify("example.com"), "example.com");
        assert_eq!(c.classify("localhost"), "");
        assert_eq!(c.classify(""), "");
    }

    #[test]
    fn classify_climbs_for_known_label() {
        let c = classifier();
        assert_eq!(c.classify("www.example.co.uk"), "example.co.uk");
        assert_eq!(c.classify("news.bbc.co.uk"), "bbc.co.uk");
        assert_eq!(c.classify("www.sina.com.cn"), "sina.com.cn");
        // Nothing left to climb
        assert_eq!(c.classify("co.uk"), "co.uk");
        assert_eq!(c.classify("example.co.uk"), "example.co.uk");
    }

    #[test]
    fn classify_uses_injected_table() {
        let c = HostClassifier::new(Arc::new(TopLevelDomainTable::new(["example"])));
        assert_eq!(c.classify("a.b.example.com"), "b.example.com");
        assert_eq!(c.classify("www.example.co.uk"), "co.uk");
    }

    #[test]
    fn classify_malformed_ip_falls_through() {
        let c = classifier();
        assert_eq!(c.classify("1.2.3"), "2.3");
        assert_eq!(c.classify("1.2.3.999"), "3.999");
    }

    #[test]
    fn classify_leading_dot() {
        let c = classifier();
        assert_eq!(c.classify(".com"), "com");
        assert_eq!(c.classify("."), "");
    }

    #[test]
    fn classify_is_a_fixed_point() {
        let c = classifier();
        for host in [
            "www.example.com",
            "www.example.co.uk",
            "deep.sub.domain.org",
            "8.8.8.8",
            "10.0.0.1",
            "localhost",
        ] {
            let once = c.classify(host);
            assert_eq!(c.classify(once), once, "host {}", host);
        }
    }

    // ==================== decide Tests ====================

    #[test]
    fn decide_reduced_domain_in_list() {
        let c = classifier();
        let list = direct(&["example.com", "foo.org"]);
        assert_eq!(
            c.decide("http://sub.example.com/", "sub.example.com", &list),
            Decision::Direct
        );
        assert_eq!(
            c.decide("http://www.bar.net/", "www.bar.net", &list),
            Decision::Proxy
        );
    }

    #[test]
    fn decide_public_ip_needs_exact_entry() {
        let c = classifier();
        let list = direct(&["example.com", "foo.org"]);
        assert_eq!(c.decide("http://8.8.4.4/", "8.8.4.4", &list), Decision::Proxy);
        let list = direct(&["8.8.4.4"]);
        assert_eq!(c.decide("http://8.8.4.4/", "8.8.4.4", &list), Decision::Direct);
    }

    #[test]
    fn decide_private_ip_is_always_direct() {
        let c = classifier();
        assert_eq!(
            c.decide("http://10.0.0.5/", "10.0.0.5", &DirectList::default()),
            Decision::Direct
        );
        assert_eq!(
            c.decide("http://10.0.0.5/", "10.0.0.5", &direct(&["example.com"])),
            Decision::Direct
        );
    }

    #[test]
    fn decide_special_rules_skip_lookup() {
        let c = classifier();
        let list = DirectList::default();
        assert_eq!(c.decide("http://svc.local/", "svc.local", &list), Decision::Direct);
        assert_eq!(c.decide("ftp://files.example.com/", "files.example.com", &list), Decision::Direct);
        assert_eq!(c.decide("http://[::ffff:8.8.8.8]/", "::ffff:8.8.8.8", &list), Decision::Direct);
    }

    #[test]
    fn decide_single_label_is_direct() {
        let c = classifier();
        assert_eq!(
            c.decide("http://intranet/", "intranet", &DirectList::default()),
            Decision::Direct
        );
    }

    #[test]
    fn decide_unreduced_host_in_list() {
        let c = classifier();
        let list = direct(&["example.com"]);
        assert_eq!(
            c.decide("https://example.com/", "example.com", &list),
            Decision::Direct
        );
        // Exact host entry also matches when reduction happened
        let list = direct(&["cdn.example.net"]);
        assert_eq!(
            c.decide("https://cdn.example.net/", "cdn.example.net", &list),
            Decision::Direct
        );
    }

    // ==================== Decision Tests ====================

    #[test]
    fn decision_display() {
        assert_eq!(Decision::Direct.to_string(), "direct");
        assert_eq!(Decision::Proxy.to_string(), "proxy");
    }
}
