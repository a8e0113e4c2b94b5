//! Browser side of the live channel.
//!
//! The script is served from memory at [`SCRIPT_URL`] and referenced by a
//! `<script>` tag injected into every HTML response.

/// Path the live client is served under.
pub const SCRIPT_URL: &str = "/__kiln/live.js";

const PORT_PLACEHOLDER: &str = "__KILN_WS_PORT__";

const SCRIPT: &str = r#"(function () {
  var port = __KILN_WS_PORT__;
  var here = location.pathname;
  if (here.endsWith("/")) here += "index.html";
  else if (here.lastIndexOf(".") < here.lastIndexOf("/")) here += ".html";

  // update: [dst, src, eid]
  function affects(update) {
    var dst = update[0];
    return dst === here || !dst.endsWith(".html");
  }

  function connect() {
    var ws = new WebSocket("ws://" + location.hostname + ":" + port);
    ws.onmessage = function (event) {
      var msg = JSON.parse(event.data);
      if (msg.type === "update" && msg.updates.some(affects)) location.reload();
      else if (msg.type === "error") console.error("[kiln] " + msg.message);
    };
    ws.onclose = function () { setTimeout(connect, 1000); };
  }
  connect();
})();
"#;

/// The live client script bound to `ws_port`.
pub fn script(ws_port: u16) -> String {
    SCRIPT.replace(PORT_PLACEHOLDER, &ws_port.to_string())
}

/// Insert the client `<script>` tag before the last `</body>`, or append it.
pub fn inject(body: &[u8]) -> Vec<u8> {
    const PATTERN: &[u8] = b"</body>";
    let tag = format!(r#"<script src="{SCRIPT_URL}"></script>"#);
    let tag = tag.as_bytes();

    let at = body
        .windows(PATTERN.len())
        .rposition(|w| w.eq_ignore_ascii_case(PATTERN))
        .unwrap_or(body.len());

    let mut result = Vec::with_capacity(body.len() + tag.len());
    result.extend_from_slice(&body[..at]);
    result.extend_from_slice(tag);
    result.extend_from_slice(&body[at..]);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_binds_port() {
        let js = script(35730);
        assert!(js.contains("var port = 35730;"));
        assert!(!js.contains(PORT_PLACEHOLDER));
    }

    #[test]
    fn test_inject_before_last_body() {
        let out = inject(b"<html><BODY>x</BODY></html>");
        let out = String::from_utf8(out).unwrap();
        assert_eq!(
            out,
            format!(r#"<html><BODY>x<script src="{SCRIPT_URL}"></script></BODY></html>"#)
        );
    }

    #[test]
    fn test_inject_appends_without_body() {
        let out = String::from_utf8(inject(b"<p>fragment</p>")).unwrap();
        assert!(out.starts_with("<p>fragment</p><script"));
    }
}
