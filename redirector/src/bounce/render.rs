//! HTML document served on the bounce path.
//!
//! The inline script does in the browser what `BouncePage` does in process:
//! fire the pixel event inside try/catch, wait the settle delay, navigate, and
//! drop the pending navigation when the page is hidden.

use super::page::{BounceError, BounceParams};
use crate::classify::Destination;
use crate::config::BounceSettings;
use serde::Serialize;

const PIXEL_LOADER: &str = "!function(f,b,e,v,n,t,s){if(f.fbq)return;n=f.fbq=function(){\
n.callMethod?n.callMethod.apply(n,arguments):n.queue.push(arguments)};if(!f._fbq)f._fbq=n;\
n.push=n;n.loaded=!0;n.version='2.0';n.queue=[];t=b.createElement(e);t.async=!0;t.src=v;\
s=b.getElementsByTagName(e)[0];s.parentNode.insertBefore(t,s)}(window,document,'script',\
'https://connect.facebook.net/en_US/fbevents.js');";

pub fn render(query: Option<&str>, settings: &BounceSettings) -> Result<String, BounceError> {
    let params = BounceParams::from_query(query, &settings.default_source)?;
    let (to, relative) = match &params.to {
        Destination::Absolute(url) => (url.as_str(), false),
        Destination::Relative(path) => (path.as_str(), true),
    };

    let pixel = match &settings.pixel_id {
        Some(id) => format!("<script>{PIXEL_LOADER}fbq('init', {});</script>\n", js(id)),
        None => String::new(),
    };

    Ok(format!(
        r#"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<meta name="robots" content="noindex">
<title>Redirecting</title>
{pixel}</head>
<body>
<noscript><a href="{href}">Continue</a></noscript>
<script>
(function () {{
  var to = {to};
  var data = {{ source: {source} }};
  var intent = {intent};
  if (intent !== null) {{ data.intent = intent; }}
  try {{
    window.fbq("track", {event}, data);
  }} catch (e) {{
    console.error("tracking event not sent", e);
  }}
  var timer = setTimeout(function () {{
    if ({relative}) {{
      window.location.assign(to);
    }} else {{
      window.location.href = to;
    }}
  }}, {settle});
  window.addEventListener("pagehide", function () {{ clearTimeout(timer); }});
}})();
</script>
</body>
</html>
"#,
        href = html_attr(to),
        to = js(to),
        source = js(&params.source),
        intent = js(&params.intent),
        event = js(&settings.event_name),
        settle = settings.settle().as_millis(),
    ))
}

/// JSON literal that is safe inside an inline `<script>`.
fn js<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value)
        .unwrap_or_else(|_| "null".to_string())
        .replace("</", "<\\/")
        .replace('\u{2028}', "\\u2028")
        .replace('\u{2029}', "\\u2029")
}

fn html_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
    out
}
