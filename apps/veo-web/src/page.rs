use veo_core::{DEFAULT_PADDING, DEFAULT_WIDTH};

#[derive(Debug, Clone)]
pub struct PageModel {
    pub message: Option<String>,
    pub padding: String,
    pub width: String,
}

impl Default for PageModel {
    fn default() -> Self {
        Self {
            message: None,
            padding: DEFAULT_PADDING.to_string(),
            width: DEFAULT_WIDTH.to_string(),
        }
    }
}

pub fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            other => out.push(other),
        }
    }
    out
}

pub fn render_page(model: &PageModel) -> String {
    let message = model
        .message
        .as_deref()
        .map(|m| format!("\n      <p class=\"message\">{}</p>", escape_html(m)))
        .unwrap_or_default();
    format!(
        r#"<!doctype html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <title>Veo 16:9 Converter</title>
    <style>
      body {{ font-family: system-ui, sans-serif; margin: 40px; background: #f5f5f5; }}
      main {{ max-width: 520px; margin: auto; background: #fff; padding: 28px 32px; border-radius: 12px; box-shadow: 0 12px 35px rgba(23, 23, 23, 0.08); }}
      h1 {{ font-size: 1.8rem; margin-bottom: 0.6rem; }}
      form {{ display: grid; gap: 16px; }}
      label {{ display: block; font-weight: 600; margin-bottom: 6px; }}
      input[type="number"], input[type="file"] {{ width: 100%; padding: 10px; border-radius: 8px; border: 1px solid #ccc; }}
      input[type="submit"] {{ cursor: pointer; border: none; padding: 12px 18px; border-radius: 8px; background: #3a7afe; color: #fff; font-weight: 600; }}
      input[type="submit"]:hover {{ background: #336be0; }}
      .message {{ padding: 14px 16px; border-radius: 8px; background: #ffe7e7; border: 1px solid #ffb3b3; color: #8a1f1f; }}
      .hint {{ color: #666; font-size: 0.9rem; margin-top: 4px; }}
    </style>
  </head>
  <body>
    <main>
      <h1>Veo 16:9 Converter</h1>
      <p class="hint">Upload an image and get back a 16:9 PNG with white bands, ready for Veo.</p>{message}
      <form method="post" enctype="multipart/form-data">
        <div>
          <label for="image">Image (JPG, PNG, WebP)</label>
          <input id="image" name="image" type="file" accept="image/*" required />
        </div>
        <div>
          <label for="padding">Height of the white bands (px)</label>
          <input id="padding" name="padding" type="number" min="0" value="{padding}" />
          <p class="hint">Defaults to {default_padding} pixels at the top and bottom.</p>
        </div>
        <div>
          <label for="width">Canvas width (px)</label>
          <input id="width" name="width" type="number" min="16" value="{width}" />
          <p class="hint">The height follows automatically at 16:9.</p>
        </div>
        <input type="submit" value="Convert and download" />
      </form>
    </main>
  </body>
</html>
"#,
        message = message,
        padding = escape_html(&model.padding),
        width = escape_html(&model.width),
        default_padding = DEFAULT_PADDING,
    )
}
