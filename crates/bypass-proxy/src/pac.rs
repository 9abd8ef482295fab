//! PAC document rendering.
//!
//! Each PAC request gets a freshly rendered document because the proxy
//! address embedded in it depends on which local address the client
//! connected to. The script skeleton is compiled once; rendering only
//! substitutes the proxy address, the current direct list and the
//! pre-serialized top-level table.

use std::sync::Arc;

use bypass_core::{DirectList, TopLevelDomainTable};

use crate::error::Result;
use crate::template::{PacFields, PacTemplate};

/// Content type browsers expect for proxy auto-config scripts.
pub const PAC_CONTENT_TYPE: &str = "application/x-ns-proxy-autoconfig";

/// Script skeleton. `hostIsIP`, `host2Domain` and `FindProxyForURL` mirror
/// `bypass_core::host` and must change together with it.
pub const PAC_TEMPLATE: &str = r#"var direct = 'DIRECT';
var httpProxy = 'PROXY {{.ProxyAddr}}; DIRECT';

var directList = [
"",
"{{.DirectDomains}}"
];

var directAcc = {};
for (var i = 0; i < directList.length; i += 1) {
	directAcc[directList[i]] = true;
}

var topLevel = {
{{.TopLevel}}
};

// hostIsIP determines whether a host address is an IP address and whether
// it is private. Currenly only handles IPv4 addresses.
function hostIsIP(host) {
	var part = host.split('.');
	if (part.length != 4) {
		return [false, false];
	}
	var n;
	for (var i = 3; i >= 0; i--) {
		if (part[i].length === 0 || part[i].length > 3) {
			return [false, false];
		}
		n = Number(part[i]);
		if (isNaN(n) || n < 0 || n > 255) {
			return [false, false];
		}
	}
	if (part[0] == '127' || part[0] == '10' || (part[0] == '192' && part[1] == '168')) {
		return [true, true];
	}
	if (part[0] == '172') {
		n = Number(part[1]);
		if (16 <= n && n <= 31) {
			return [true, true];
		}
	}
	return [true, false];
}

function host2Domain(host) {
	var arr, isIP, isPrivate;
	arr = hostIsIP(host);
	isIP = arr[0];
	isPrivate = arr[1];
	if (isPrivate) {
		return "";
	}
	if (isIP) {
		return host;
	}

	var lastDot = host.lastIndexOf('.');
	if (lastDot === -1) {
		return ""; // simple host name has no domain
	}
	// Find the second last dot
	dot2ndLast = host.lastIndexOf(".", lastDot-1);
	if (dot2ndLast === -1)
		return host;

	var part = host.substring(dot2ndLast+1, lastDot);
	if (topLevel[part]) {
		var dot3rdLast = host.lastIndexOf(".", dot2ndLast-1);
		if (dot3rdLast === -1) {
			return host;
		}
		return host.substring(dot3rdLast+1);
	}
	return host.substring(dot2ndLast+1);
}

function FindProxyForURL(url, host) {
	if (url.substring(0,4) == "ftp:")
		return direct;
	if (host.substring(0,7) == "::ffff:")
		return direct;
	if (host.indexOf(".local", host.length - 6) !== -1) {
		return direct;
	}
	var domain = host2Domain(host);
	if (host.length == domain.length) {
		return directAcc[host] ? direct : httpProxy;
	}
	return (directAcc[host] || directAcc[domain]) ? direct : httpProxy;
}
"#;

/// Builds the fixed response header.
///
/// No Content-Length: the connection is closed after the body.
pub fn pac_header(server_name: &str) -> String {
    format!(
        "HTTP/1.1 200 OK\r\nServer: {}\r\nContent-Type: {}\r\nConnection: close\r\n\r\n",
        server_name, PAC_CONTENT_TYPE
    )
}

/// Body served while the direct list is empty.
pub fn minimal_body(proxy_addr: &str) -> String {
    format!(
        "function FindProxyForURL(url, host) {{ return 'PROXY {}; DIRECT'; }};",
        proxy_addr
    )
}

/// Serializes the table as `\t"<label>": true,` lines, last comma removed.
pub fn serialize_top_level(table: &TopLevelDomainTable) -> String {
    let mut out = String::new();
    for label in table.iter() {
        out.push_str(&format!("\t\"{}\": true,\n", escape_js(label)));
    }
    // Drop the final ",\n"
    let trimmed = out.len().saturating_sub(2);
    out.truncate(trimmed);
    out
}

/// Joins domains into the body of a JS string array (without the outer quotes).
pub fn join_direct_domains(direct: &DirectList) -> String {
    direct
        .domains()
        .iter()
        .map(|domain| escape_js(domain))
        .collect::<Vec<_>>()
        .join("\",\n\"")
}

/// Escapes a value for use inside a double-quoted JS string literal.
fn escape_js(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c => out.push(c),
        }
    }
    out
}

/// Renders PAC documents.
///
/// Cheap to clone; the compiled template and serialized table are shared
/// read-only between all clones.
#[derive(Debug, Clone)]
pub struct PacRenderer {
    template: Arc<PacTemplate>,
    top_level: Arc<str>,
    header: Arc<str>,
}

impl PacRenderer {
    /// Compiles the script skeleton.
    ///
    /// Fails with [`PacError::Initialization`](crate::PacError::Initialization)
    /// if the skeleton does not parse; callers should treat that as fatal.
    pub fn new(table: &TopLevelDomainTable, server_name: &str) -> Result<Self> {
        let template = PacTemplate::parse("pac", PAC_TEMPLATE)?;
        Ok(Self {
            template: Arc::new(template),
            top_level: serialize_top_level(table).into(),
            header: pac_header(server_name).into(),
        })
    }

    /// Returns the response header bytes.
    pub fn header(&self) -> &str {
        &self.header
    }

    /// Renders the complete response (header and body) into a buffer.
    ///
    /// Nothing is returned on failure, so a caller never writes a partial
    /// document.
    pub fn render(&self, direct: &DirectList, proxy_addr: &str) -> Result<Vec<u8>> {
        let domains = join_direct_domains(direct);

        let mut buf = Vec::with_capacity(self.header.len() + PAC_TEMPLATE.len() + domains.len());
        buf.extend_from_slice(self.header.as_bytes());

        if domains.is_empty() {
            buf.extend_from_slice(minimal_body(proxy_addr).as_bytes());
            return Ok(buf);
        }

        let fields = PacFields {
            proxy_addr,
            direct_domains: &domains,
            top_level: &self.top_level,
        };
        self.template.execute(&mut buf, &fields)?;
        Ok(buf)
    }
}
