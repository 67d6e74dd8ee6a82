//! HTML stats page and stylesheet

use alloc::string::String;
use core::fmt::{self, Write};

use crate::aggregator::{Calibration, StatsSnapshot, VOLUME_UNIT};
use crate::sensors::celsius_to_fahrenheit;

use super::request::{CALIBRATION_PARAM, CALIBRATION_PATH, STYLESHEET_PATH};

const SECONDS_PER_DAY: f32 = 86_400.0;

pub const STYLESHEET: &str = r#"html { font-family: sans-serif; background: #eee; padding: 1rem; }
body { max-width: 960px; margin: 0 auto; background: white; }
h1 { font-family: serif; color: #377ba8; margin: 1rem 0; }
a { color: #377ba8; }
hr { border: none; border-top: 1px solid lightgray; }
nav { background: lightgray; display: flex; align-items: center; padding: 0 0.5rem; }
nav h1 { flex: auto; margin: 0; }
.content { padding: 0 1rem 1rem; }
.content > header { border-bottom: 1px solid lightgray; display: flex; align-items: flex-end; }
.content > header h1 { flex: auto; margin: 1rem 0 0.25rem 0; }
.flash { margin: 1em 0; padding: 1em; background: #cae6f6; border: 1px solid #377ba8; }
.content:last-child { margin-bottom: 0; }
.content form { margin: 1em 0; display: flex; flex-direction: column; }
.content label { font-weight: bold; margin-bottom: 0.5em; }
.content input { margin-bottom: 1em; }
input[type=submit] { align-self: start; min-width: 10em; }
"#;

/// Render the stats page for `snapshot`, with an optional error banner.
///
/// Pure: the same snapshot and error always produce the same document.
pub fn render_stats(snapshot: &StatsSnapshot, error: Option<&str>) -> String {
    let mut html = String::with_capacity(3072);
    // Writing into a String cannot fail
    let _ = write_stats(&mut html, snapshot, error);
    html
}

fn write_stats<W: Write>(out: &mut W, s: &StatsSnapshot, error: Option<&str>) -> fmt::Result {
    write!(
        out,
        r#"<!DOCTYPE html>
<html>
<head>
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>Well Flow Monitor</title>
<link rel="stylesheet" href="{STYLESHEET_PATH}">
<script>
window.addEventListener('DOMContentLoaded', function () {{
  document.getElementById('currentTime').textContent = new Date({now_ms}).toString();
  document.getElementById('startTime').textContent = new Date({start_ms}).toString();
}});
</script>
</head>
<body>
<nav><h1>Well Flow Monitor</h1></nav>
<section class="content">
<header><h1>Flow Data</h1></header>
<article>
"#,
        now_ms = s.now_unix * 1000,
        start_ms = s.started_unix * 1000,
    )?;

    if let Some(message) = error {
        writeln!(out, r#"<div class="flash">{}</div>"#, Escaped(message))?;
    }

    writeln!(
        out,
        "<p>Flow count is {} which is {:.1} {VOLUME_UNIT}</p>",
        s.pulses,
        s.volume(s.pulses)
    )?;

    write!(out, "<p>Latest {VOLUME_UNIT} per minute ")?;
    match s.minute_rate {
        Some(rate) => write!(out, "{:.2}", s.volume(rate))?,
        None => out.write_str("n/a")?,
    }
    out.write_str("</p>\n")?;

    write!(out, "<p>Latest {VOLUME_UNIT} per day, oldest first: [")?;
    for (index, day) in s.history.days().iter().enumerate() {
        if index > 0 {
            out.write_str(", ")?;
        }
        match day {
            Some(ticks) => write!(out, "{:.1}", s.volume(*ticks))?,
            None => out.write_str("n/a")?,
        }
    }
    out.write_str("]</p>\n")?;

    let uptime = s.uptime_secs();
    writeln!(
        out,
        "<p>Time running is {} seconds, or {:.1} days</p>",
        uptime,
        uptime as f32 / SECONDS_PER_DAY
    )?;
    out.write_str(
        r#"<p>Current time is <span id="currentTime"></span>, up since <span id="startTime"></span></p>
"#,
    )?;

    match s.temperature_c {
        Some(celsius) => writeln!(
            out,
            "<p>Device temperature is {:.1} &deg;C ({:.0} &deg;F)</p>",
            celsius,
            celsius_to_fahrenheit(celsius)
        )?,
        None => out.write_str("<p>Device temperature is unavailable</p>\n")?,
    }

    write!(
        out,
        r#"<form action="./">
<input type="submit" value="Refresh" />
</form>
<form action=".{CALIBRATION_PATH}">
<label for="{CALIBRATION_PARAM}">Ticks per gallon:</label>
<input type="number" id="{CALIBRATION_PARAM}" name="{CALIBRATION_PARAM}" min="{min}" max="{max}" step="1" value="{value}" />
<input type="submit" value="Change Divisor" />
</form>
</article>
</section>
</body>
</html>
"#,
        min = Calibration::MIN,
        max = Calibration::MAX,
        value = s.calibration.ticks_per_unit(),
    )
}

/// Displays text with HTML special characters escaped.
struct Escaped<'a>(&'a str);

impl fmt::Display for Escaped<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for ch in self.0.chars() {
            match ch {
                '<' => f.write_str("&lt;")?,
                '>' => f.write_str("&gt;")?,
                '&' => f.write_str("&amp;")?,
                '"' => f.write_str("&quot;")?,
                '\'' => f.write_str("&#39;")?,
                _ => f.write_char(ch)?,
            }
        }
        Ok(())
    }
}
