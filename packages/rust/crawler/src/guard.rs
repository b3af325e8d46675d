//! Rejects URLs that point at local or private network resources.

use std::net::IpAddr;

use url::Url;

/// Whether fetching `url` could reach something other than the public web.
pub fn is_ssrf_target(url: &Url) -> bool {
    match url.scheme() {
        "http" | "https" => {}
        _ => return true,
    }

    let Some(host) = url.host() else {
        return true;
    };

    match host {
        url::Host::Ipv4(v4) => is_private_ip(&IpAddr::V4(v4)),
        url::Host::Ipv6(v6) => is_private_ip(&IpAddr::V6(v6)),
        url::Host::Domain(name) => {
            let name = name.to_ascii_lowercase();
            name == "localhost"
                || name.ends_with(".localhost")
                || name.ends_with(".local")
                || name.ends_with(".internal")
        }
    }
}

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let [a, b, c, _] = v4.octets();
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                // 100.64.0.0/10
                || (a == 100 && (b & 0xC0) == 64)
                // 192.0.0.0/24
                || (a == 192 && b == 0 && c == 0)
        }
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_unspecified()
                // fc00::/7 unique local
                || (v6.segments()[0] & 0xfe00) == 0xfc00
                // fe80::/10 link local
                || (v6.segments()[0] & 0xffc0) == 0xfe80
                || v6.to_ipv4_mapped().is_some_and(|v4| is_private_ip(&IpAddr::V4(v4)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blocked(raw: &str) -> bool {
        is_ssrf_target(&Url::parse(raw).unwrap())
    }

    #[test]
    fn blocks_non_http_schemes() {
        assert!(blocked("file:///etc/passwd"));
        assert!(blocked("ftp://example.com/file"));
    }

    #[test]
    fn blocks_private_and_loopback_addresses() {
        assert!(blocked("http://192.168.1.1/admin"));
        assert!(blocked("http://10.0.0.1/"));
        assert!(blocked("http://127.0.0.1:8080/"));
        assert!(blocked("http://100.64.3.2/"));
        assert!(blocked("http://[::1]/"));
        assert!(blocked("http://[fd00::1]/"));
        assert!(blocked("http://[::ffff:10.0.0.1]/"));
    }

    #[test]
    fn blocks_local_hostnames() {
        assert!(blocked("http://localhost:3000/api"));
        assert!(blocked("http://printer.local/"));
        assert!(blocked("http://metadata.internal/"));
    }

    #[test]
    fn allows_public_sites() {
        assert!(!blocked("https://www.healthline.com/health/chatbots"));
        assert!(!blocked("http://93.184.216.34/"));
    }
}
