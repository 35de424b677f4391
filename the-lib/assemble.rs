//! Combine a [`Snapshot`] into one HTML document.
//!
//! Assembly is plain string composition. Nothing is parsed or validated, so
//! it cannot fail: malformed markup, style or script is copied through as is
//! and only misbehaves once the document runs inside the sandbox.
//!
//! The style goes into a `<style>` block in `<head>`, the markup into
//! `<body>`, and the script into a `<script>` block at the very end of
//! `<body>` so every element it references already exists when it runs.
//! Empty style or script buffers produce no block at all.

use std::ops::Range;

use crate::buffer::{
  BufferKind,
  Snapshot,
};

const DOCTYPE: &str = "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n";
const HEAD_END: &str = "</head>\n<body>\n";
const BODY_END: &str = "</body>\n</html>\n";

/// Id of the element the error overlay writes into.
pub const ERROR_OVERLAY_ID: &str = "__preview_errors";

const ERROR_OVERLAY: &str = r#"(function () {
  function report(text) {
    var box = document.getElementById("__preview_errors");
    if (!box) {
      box = document.createElement("pre");
      box.id = "__preview_errors";
      box.style.cssText = "color:#b00020;background:#fff0f0;margin:0;padding:4px;white-space:pre-wrap";
      (document.body || document.documentElement).appendChild(box);
    }
    box.textContent += text + "\n";
  }
  window.addEventListener("error", function (event) {
    report(event.message + " (" + event.lineno + ":" + event.colno + ")");
  });
  window.addEventListener("unhandledrejection", function (event) {
    report("Unhandled rejection: " + event.reason);
  });
})();"#;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssembleOptions {
  /// Report uncaught script errors inside the preview itself.
  pub error_overlay: bool,
}

/// A complete document built from one snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledDocument {
  html:     String,
  revision: u64,
  sections: [Range<usize>; 3],
}

impl AssembledDocument {
  pub fn as_str(&self) -> &str {
    &self.html
  }

  pub fn into_string(self) -> String {
    self.html
  }

  /// Revision of the snapshot this document was built from.
  pub fn revision(&self) -> u64 {
    self.revision
  }

  /// The exact text embedded for `kind`.
  pub fn section(&self, kind: BufferKind) -> &str {
    let range = match kind {
      BufferKind::Markup => &self.sections[0],
      BufferKind::Style => &self.sections[1],
      BufferKind::Script => &self.sections[2],
    };
    &self.html[range.clone()]
  }

  pub fn len(&self) -> usize {
    self.html.len()
  }

  pub fn is_empty(&self) -> bool {
    self.html.is_empty()
  }
}

pub fn assemble(snapshot: &Snapshot) -> AssembledDocument {
  assemble_with(snapshot, &AssembleOptions::default())
}

pub fn assemble_with(snapshot: &Snapshot, options: &AssembleOptions) -> AssembledDocument {
  let (markup, style, script) = (snapshot.markup(), snapshot.style(), snapshot.script());
  let mut html = String::with_capacity(
    DOCTYPE.len()
      + HEAD_END.len()
      + BODY_END.len()
      + markup.len()
      + style.len()
      + script.len()
      + if options.error_overlay { ERROR_OVERLAY.len() + 40 } else { 0 }
      + 64,
  );

  html.push_str(DOCTYPE);
  if options.error_overlay {
    push_block(&mut html, "script", ERROR_OVERLAY);
  }
  let style_range = if style.is_empty() {
    html.len()..html.len()
  } else {
    push_block(&mut html, "style", style)
  };
  html.push_str(HEAD_END);

  let markup_start = html.len();
  html.push_str(markup);
  let markup_range = markup_start..html.len();
  if !markup.is_empty() && !markup.ends_with('\n') {
    html.push('\n');
  }

  let script_range = if script.is_empty() {
    html.len()..html.len()
  } else {
    push_block(&mut html, "script", script)
  };
  html.push_str(BODY_END);

  AssembledDocument {
    html,
    revision: snapshot.revision(),
    sections: [markup_range, style_range, script_range],
  }
}

/// Append `<tag>\n{content}\n</tag>\n` and return the range of `content`.
fn push_block(html: &mut String, tag: &str, content: &str) -> Range<usize> {
  html.push('<');
  html.push_str(tag);
  html.push_str(">\n");
  let start = html.len();
  html.push_str(content);
  let end = html.len();
  html.push_str("\n</");
  html.push_str(tag);
  html.push_str(">\n");
  start..end
}
