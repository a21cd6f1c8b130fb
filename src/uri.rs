//! Collection URI parsing (spec §6): `[proto:]path[:service]` with
//! `proto ∈ {file, flush, tcp, udp}` and bracketed IPv6 support for the
//! network protocols, e.g. `tcp:[::1]:3003`.

const KNOWN_PROTOCOLS: [&str; 4] = ["file", "flush", "tcp", "udp"];

/// A parsed collection URI. Any field may be absent; `parse_uri`'s
/// minimal accepted form is `(None, path, None)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionUri {
    pub protocol: Option<String>,
    pub path: String,
    pub port: Option<String>,
}

impl CollectionUri {
    pub fn new(
        protocol: Option<impl Into<String>>,
        path: impl Into<String>,
        port: Option<impl Into<String>>,
    ) -> Self {
        Self {
            protocol: protocol.map(Into::into),
            path: path.into(),
            port: port.map(Into::into),
        }
    }
}

/// Parses a collection URI string into its `(protocol, path, port)`
/// parts. Never fails: unrecognized forms degrade per spec.md §6 rather
/// than erroring, with a `log::warn!` marking the ambiguous cases.
pub fn parse_uri(input: &str) -> CollectionUri {
    if let Some((proto, rest)) = split_known_protocol(input) {
        return parse_after_protocol(proto, rest);
    }

    match input.split_once(':') {
        Some((head, tail)) => {
            log::warn!(
                "collection URI `{}` has unrecognized scheme `{}`; treating as host:port with no protocol",
                input,
                head
            );
            CollectionUri::new(None::<String>, head, Some(tail))
        }
        None => {
            if input.contains('/') {
                CollectionUri::new(None::<String>, input, None::<String>)
            } else {
                log::warn!(
                    "collection URI `{}` has no scheme; treating as tcp:{}",
                    input,
                    input
                );
                CollectionUri::new(Some("tcp"), input, None::<String>)
            }
        }
    }
}

fn split_known_protocol(input: &str) -> Option<(&str, &str)> {
    for proto in KNOWN_PROTOCOLS {
        if let Some(rest) = input.strip_prefix(proto) {
            if let Some(rest) = rest.strip_prefix(':') {
                return Some((proto, rest));
            }
        }
    }
    None
}

fn parse_after_protocol(proto: &str, rest: &str) -> CollectionUri {
    if let Some(stripped) = rest.strip_prefix('[') {
        if let Some(end) = stripped.find(']') {
            let path = &stripped[..end];
            let after = &stripped[end + 1..];
            let port = after.strip_prefix(':').map(|p| p.to_string());
            return CollectionUri::new(Some(proto), path, port);
        }
    }

    match proto {
        "tcp" | "udp" => match rest.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() => {
                CollectionUri::new(Some(proto), host, Some(port))
            }
            _ => CollectionUri::new(Some(proto), rest, None::<String>),
        },
        _ => CollectionUri::new(Some(proto), rest, None::<String>),
    }
}

/// Renders a `CollectionUri` back into its string form. `parse_uri`
/// and `render_uri` round-trip for any tuple `parse_uri` can produce
/// (spec §8 round-trip law).
pub fn render_uri(uri: &CollectionUri) -> String {
    let bracket_needed = uri.path.contains(':');
    match (&uri.protocol, &uri.port) {
        (Some(proto), Some(port)) if bracket_needed => {
            format!("{}:[{}]:{}", proto, uri.path, port)
        }
        (Some(proto), Some(port)) => format!("{}:{}:{}", proto, uri.path, port),
        (Some(proto), None) => format!("{}:{}", proto, uri.path),
        (None, Some(port)) => format!("{}:{}", uri.path, port),
        (None, None) => uri.path.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tcp_ipv6_bracketed() {
        let parsed = parse_uri("tcp:[::1]:3003");
        assert_eq!(parsed.protocol.as_deref(), Some("tcp"));
        assert_eq!(parsed.path, "::1");
        assert_eq!(parsed.port.as_deref(), Some("3003"));
    }

    #[test]
    fn file_with_plain_path() {
        let parsed = parse_uri("file:/tmp/out.log");
        assert_eq!(parsed.protocol.as_deref(), Some("file"));
        assert_eq!(parsed.path, "/tmp/out.log");
        assert_eq!(parsed.port, None);
    }

    #[test]
    fn unknown_scheme_two_tokens() {
        let parsed = parse_uri("host.example:9999");
        assert_eq!(parsed.protocol, None);
        assert_eq!(parsed.path, "host.example");
        assert_eq!(parsed.port.as_deref(), Some("9999"));
    }

    #[test]
    fn unknown_scheme_single_token_becomes_tcp() {
        let parsed = parse_uri("myhost");
        assert_eq!(parsed.protocol.as_deref(), Some("tcp"));
        assert_eq!(parsed.path, "myhost");
        assert_eq!(parsed.port, None);
    }

    #[test]
    fn minimal_accepted_form() {
        let parsed = parse_uri("/tmp/out.log");
        assert_eq!(parsed.protocol, None);
        assert_eq!(parsed.path, "/tmp/out.log");
        assert_eq!(parsed.port, None);
    }

    #[test]
    fn round_trips_for_documented_tuples() {
        for input in [
            "tcp:[::1]:3003",
            "file:/tmp/out.log",
            "host.example:9999",
            "flush:/var/log/oml.log",
            "udp:239.1.1.1:4000",
        ] {
            let parsed = parse_uri(input);
            assert_eq!(parse_uri(&render_uri(&parsed)), parsed, "input: {}", input);
        }
    }
}
