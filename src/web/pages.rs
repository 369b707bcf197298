// 该文件是 Yumi （玉米计数） 项目的一部分。
// src/web/pages.rs - 页面渲染
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use chrono::{DateTime, TimeZone};

use crate::pipeline::Outcome;

const STYLE: &str = r#"<style>
  body { font-family: sans-serif; margin: 2em auto; max-width: 960px; color: #222; }
  .flash { background: #fdecea; border: 1px solid #f5c2c0; padding: 0.6em 1em; }
  form { margin: 1em 0; }
  table { border-collapse: collapse; }
  td, th { border: 1px solid #ccc; padding: 0.3em 0.8em; text-align: left; }
  .swatch { display: inline-block; width: 1em; height: 1em; vertical-align: middle; }
  img, video { max-width: 100%; }
</style>"#;

const UPLOAD_TEMPLATE: &str = r#"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<title>Corn Counter</title>
__STYLE__
</head>
<body>
<h1>Corn Counter</h1>
__FLASH__
<h2>Upload an image</h2>
<form method="post" action="/" enctype="multipart/form-data">
  <input type="file" name="file" accept=".png,.jpg,.jpeg">
  <input type="submit" value="Detect">
</form>
<h2>Browser camera</h2>
<video id="preview" autoplay playsinline width="480"></video>
<canvas id="snapshot" hidden></canvas>
<div><button id="snap" type="button">Capture and detect</button></div>
<h2>Server camera</h2>
<form method="post" action="/capture_webcam">
  <input type="submit" value="Capture from webcam">
</form>
<form method="post" action="/reset">
  <input type="submit" value="Reset count">
</form>
<script>
(function () {
  const video = document.getElementById('preview');
  const canvas = document.getElementById('snapshot');
  if (navigator.mediaDevices && navigator.mediaDevices.getUserMedia) {
    navigator.mediaDevices.getUserMedia({ video: true })
      .then(function (stream) { video.srcObject = stream; })
      .catch(function () { video.hidden = true; });
  }
  document.getElementById('snap').onclick = function () {
    canvas.width = video.videoWidth;
    canvas.height = video.videoHeight;
    canvas.getContext('2d').drawImage(video, 0, 0);
    canvas.toBlob(function (blob) {
      const form = new FormData();
      form.append('webcam_image_data', blob, 'webcam_image.jpg');
      fetch('/', { method: 'POST', body: form })
        .then(function (resp) { return resp.text().then(function (html) { return [resp, html]; }); })
        .then(function (pair) {
          if (pair[0].redirected) { window.location = pair[0].url; return; }
          document.open(); document.write(pair[1]); document.close();
        });
    }, 'image/jpeg');
  };
})();
</script>
</body>
</html>
"#;

const RESULT_TEMPLATE: &str = r#"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<title>Corn Counter - Result</title>
__STYLE__
</head>
<body>
<h1>Detection result</h1>
<img src="data:image/jpeg;base64,__IMAGE__" alt="annotated image">
<h2>Counts</h2>
<table>
<tr><th>Class</th><th>Count</th></tr>
__ROWS__
</table>
<p>Cumulative count: <strong>__CUMULATIVE__</strong></p>
<p><small>Processed at __PROCESSED_AT__ in __ELAPSED__</small></p>
<form method="post" action="/reset">
  <input type="submit" value="Reset count">
</form>
<p><a href="/">Detect another image</a></p>
</body>
</html>
"#;

pub fn escape_html(text: &str) -> String {
  let mut escaped = String::with_capacity(text.len());
  for c in text.chars() {
    match c {
      '&' => escaped.push_str("&amp;"),
      '<' => escaped.push_str("&lt;"),
      '>' => escaped.push_str("&gt;"),
      '"' => escaped.push_str("&quot;"),
      '\'' => escaped.push_str("&#x27;"),
      _ => escaped.push(c),
    }
  }
  escaped
}

pub fn upload_page(flash: Option<&str>) -> String {
  let flash = flash
    .filter(|message| !message.is_empty())
    .map(|message| format!(r#"<p class="flash">{}</p>"#, escape_html(message)))
    .unwrap_or_default();

  UPLOAD_TEMPLATE
    .replace("__STYLE__", STYLE)
    .replace("__FLASH__", &flash)
}

pub fn result_page<Tz>(outcome: &Outcome, cumulative: u64, processed_at: DateTime<Tz>) -> String
where
  Tz: TimeZone,
  Tz::Offset: std::fmt::Display,
{
  let rows = if outcome.tally.is_empty() {
    r#"<tr><td colspan="2">Nothing detected</td></tr>"#.to_string()
  } else {
    outcome
      .tally
      .iter()
      .map(|(name, count)| {
        let color = outcome
          .colors
          .get(name)
          .map(String::as_str)
          .unwrap_or("#000000");
        format!(
          r#"<tr><td><span class="swatch" style="background: {}"></span> {}</td><td>{}</td></tr>"#,
          color,
          escape_html(name),
          count
        )
      })
      .collect::<Vec<_>>()
      .join("\n")
  };

  RESULT_TEMPLATE
    .replace("__STYLE__", STYLE)
    .replace("__IMAGE__", &outcome.image_base64)
    .replace("__ROWS__", &rows)
    .replace("__CUMULATIVE__", &cumulative.to_string())
    .replace(
      "__PROCESSED_AT__",
      &processed_at.format("%Y-%m-%d %H:%M:%S").to_string(),
    )
    .replace("__ELAPSED__", &format!("{:.2?}", outcome.elapsed))
}
