//! Server-rendered HTML: the log page, the policy index, source listings,
//! and the page templates that embed a JSON configuration object.

use std::fmt::Write as _;

use codeserver_core::names::ModuleName;
use codeserver_core::outbox_table::PolicyEntry;
use codeserver_core::source_handler::SOURCEMAP_PATH;
use serde_json::Value;

const ERROR_MARKER: &str = "[ERROR]";

pub const FRONT_PAGE_TEMPLATE: &str = include_str!("../assets/frontpage.html");
pub const MODULE_PAGE_TEMPLATE: &str = include_str!("../assets/modulepage.html");
pub const DEV_MODE_ON_TEMPLATE: &str = include_str!("../assets/dev_mode_on.js");

/// Replace the characters that are significant in HTML text and attributes.
pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Minimal tag writer. All text and attribute values go through [`escape`].
#[derive(Default)]
pub struct HtmlWriter {
    out: String,
}

impl HtmlWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_tag(&mut self, name: &str) -> &mut Self {
        let _ = write!(self.out, "<{name}>");
        self
    }

    /// Start a tag with a single attribute, e.g. `("a", "href", url)`.
    pub fn start_tag_with(&mut self, name: &str, attr: &str, value: &str) -> &mut Self {
        let _ = write!(self.out, "<{name} {attr}=\"{}\">", escape(value));
        self
    }

    pub fn end_tag(&mut self, name: &str) -> &mut Self {
        let _ = write!(self.out, "</{name}>");
        self
    }

    pub fn text(&mut self, text: &str) -> &mut Self {
        self.out.push_str(&escape(text));
        self
    }

    pub fn nl(&mut self) -> &mut Self {
        self.out.push('\n');
        self
    }

    pub fn finish(self) -> String {
        self.out
    }
}

/// The compile log with every line containing `[ERROR]` highlighted.
pub fn log_page(module: &str, log: &str) -> String {
    let mut out = HtmlWriter::new();
    out.start_tag("html").nl();
    out.start_tag("head").nl();
    out.start_tag("title")
        .text(&format!("{module} compile log"))
        .end_tag("title")
        .nl();
    out.start_tag("style").nl();
    out.text(".error { color: red; font-weight: bold; }").nl();
    out.end_tag("style").nl();
    out.end_tag("head").nl();
    out.start_tag("body").nl();

    out.start_tag("pre").nl();
    for line in log.lines() {
        if line.contains(ERROR_MARKER) {
            out.start_tag_with("span", "class", "error")
                .text(line)
                .end_tag("span");
        } else {
            out.text(line);
        }
        out.nl();
    }
    out.end_tag("pre").nl();

    out.end_tag("body").nl();
    out.end_tag("html").nl();
    out.finish()
}

/// One table per module that has a policy manifest. Service names link to
/// their Java source, policy files to `/policies/<file>`.
pub fn policy_index(manifests: &[(ModuleName, Vec<PolicyEntry>)]) -> String {
    let mut out = HtmlWriter::new();
    out.start_tag("html").nl();
    out.start_tag("head").nl();
    out.start_tag("title").text("Policy Files").end_tag("title").nl();
    out.end_tag("head");
    out.start_tag("body");
    out.start_tag("h1").text("Policy Files").end_tag("h1").nl();

    for (module, entries) in manifests {
        out.start_tag("h2").text(module.as_str()).end_tag("h2").nl();
        out.start_tag("table").nl();
        for entry in entries {
            let service_url = format!(
                "{SOURCEMAP_PATH}{module}/{}.java",
                entry.service_name.replace('.', "/")
            );
            let policy_url = format!("/policies/{}", entry.policy_file);

            out.start_tag("tr");
            out.start_tag("td");
            out.start_tag_with("a", "href", &service_url)
                .text(&entry.service_name)
                .end_tag("a");
            out.end_tag("td");
            out.start_tag("td");
            out.start_tag_with("a", "href", &policy_url)
                .text(&entry.policy_file)
                .end_tag("a");
            out.end_tag("td");
            out.end_tag("tr").nl();
        }
        out.end_tag("table").nl();
    }

    out.end_tag("body").nl();
    out.end_tag("html").nl();
    out.finish()
}

/// Directory index under `/sourcemaps/<module>/`. Entries are relative hrefs.
pub fn source_listing(module: &ModuleName, directory: &str, entries: &[String]) -> String {
    let title = format!("{module} sources: /{directory}");
    let mut out = HtmlWriter::new();
    out.start_tag("html").nl();
    out.start_tag("head").nl();
    out.start_tag("title").text(&title).end_tag("title").nl();
    out.end_tag("head").nl();
    out.start_tag("body").nl();
    out.start_tag("h1").text(&title).end_tag("h1").nl();
    out.start_tag("ul").nl();
    for entry in entries {
        out.start_tag("li");
        out.start_tag_with("a", "href", entry).text(entry).end_tag("a");
        out.end_tag("li").nl();
    }
    out.end_tag("ul").nl();
    out.end_tag("body").nl();
    out.end_tag("html").nl();
    out.finish()
}

/// JSON that is safe to place inside a `<script>` element.
fn script_safe_json(json: &Value) -> String {
    json.to_string().replace("</", "<\\/")
}

/// Prefix an HTML template with a script defining `var <name> = <json>;`.
/// Templates begin inside `<head>`.
pub fn page_with_json(name: &str, json: &Value, template: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<script>\nvar {name} = {};\n</script>\n{template}",
        script_safe_json(json)
    )
}

/// Prefix a JavaScript template with `<name> = <json>;`.
pub fn script_with_json(name: &str, json: &Value, template: &str) -> String {
    format!("{name} = {};\n{template}", script_safe_json(json))
}
