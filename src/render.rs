//! HTML rendering of [`UiState`].
//!
//! Everything here is a pure function of the state. Any text that came from
//! the user or the server goes through [`escape_html`] before it touches
//! markup.

use std::fmt::Write;

use crate::files::SelectedFile;
use crate::state::{Banner, BannerLevel, ChatEntry, EntryKind, UiState};

/// Element id of the newest transcript entry; the web UI redirects to it.
pub const LATEST_ANCHOR: &str = "chat-latest";

const STYLE: &str = r#"
*{margin:0;padding:0;box-sizing:border-box}
body{background:#0d1117;color:#c9d1d9;font-family:'Segoe UI',system-ui,sans-serif;min-height:100vh;display:flex;flex-direction:column}
header{padding:14px 24px;border-bottom:1px solid #21262d;display:flex;align-items:center;justify-content:space-between}
header h1{font-size:1.15rem;color:#58a6ff}
.counters{display:flex;gap:16px;font-size:.85rem;color:#8b949e}
.counters b{color:#c9d1d9}
main{flex:1;display:grid;grid-template-columns:340px 1fr 260px;gap:0}
section{padding:16px 20px;border-right:1px solid #21262d;overflow-y:auto}
section h2{font-size:.75rem;color:#8b949e;text-transform:uppercase;letter-spacing:.5px;margin-bottom:10px}
textarea,input[type=text]{width:100%;background:#0d1117;border:1px solid #30363d;color:#c9d1d9;padding:6px 10px;border-radius:6px;font-family:inherit;font-size:.85rem}
.btn{border:none;padding:6px 14px;border-radius:6px;font-family:inherit;font-size:.85rem;cursor:pointer;color:#fff;background:#238636;margin-top:8px}
.btn:disabled{background:#21262d;color:#484f58;cursor:not-allowed}
.btn-secondary{background:#30363d}
.btn-close{background:none;border:none;color:inherit;cursor:pointer;float:right}
.file-item{display:flex;justify-content:space-between;font-size:.8rem;padding:3px 0;border-bottom:1px solid #161b22}
.text-muted{color:#8b949e}
.alert{padding:8px 12px;border-radius:6px;margin-top:10px;font-size:.82rem}
.alert-success{background:#0d2010;color:#3fb950}
.alert-warning{background:#2a1f05;color:#e3b341}
.alert-danger{background:#200d0d;color:#f85149}
.alert-info{background:#0d1a2a;color:#58a6ff}
.spinner-border{display:inline-block;width:.8rem;height:.8rem;border:2px solid currentColor;border-right-color:transparent;border-radius:50%;animation:spin .75s linear infinite}
@keyframes spin{to{transform:rotate(360deg)}}
#chatContainer{height:60vh;overflow-y:auto;display:flex;flex-direction:column;gap:8px;margin-bottom:10px}
.user-message,.bot-message{padding:8px 12px;border-radius:8px;font-size:.9rem;line-height:1.5;white-space:pre-wrap;word-wrap:break-word}
.user-message{background:#1f6feb33;align-self:flex-end}
.bot-message{background:#161b22;align-self:flex-start}
.message-time{display:block;font-size:.65rem;color:#8b949e;margin-top:2px}
.typing-indicator span{display:inline-block;width:6px;height:6px;margin:0 2px;background:#8b949e;border-radius:50%;animation:blink 1.2s infinite}
@keyframes blink{50%{opacity:.3}}
.empty-state{margin:auto;text-align:center;color:#8b949e}
.empty-state h5{font-size:1rem;margin-bottom:4px}
.list-group{list-style:none}
.source-item{font-size:.8rem;padding:5px 0;border-bottom:1px solid #161b22;word-break:break-all}
"#;

/// Escape text for use in element content and quoted attributes.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// Render the whole page.
pub fn page(state: &UiState) -> String {
    let refresh = if state.busy.upload || state.busy.populate || state.busy.query {
        r#"<meta http-equiv="refresh" content="2">"#
    } else {
        ""
    };
    let scroll = if state.scroll_to_latest {
        "<script>var c=document.getElementById('chatContainer');if(c)c.scrollTop=c.scrollHeight;</script>"
    } else {
        ""
    };
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
{refresh}
<title>Document Chat</title>
<style>{STYLE}</style>
</head>
<body>
<header>
  <h1>Document Chat</h1>
  {counters}
</header>
<main>
<section id="documents">
  <h2>Upload documents</h2>
  {upload}
  <h2 style="margin-top:20px">Index</h2>
  {database}
</section>
<section id="chat">
  <h2>Chat</h2>
  {chat}
</section>
<section id="sources">
  <h2>Sources</h2>
  {sources}
</section>
</main>
{scroll}
</body>
</html>"#,
        counters = counters(state),
        upload = upload_panel(state),
        database = database_panel(state),
        chat = chat_panel(state),
        sources = sources_panel(state),
    )
}

pub fn counters(state: &UiState) -> String {
    format!(
        r#"<div class="counters"><span>Documents: <b id="docCount">{}</b></span><span>Chunks: <b id="chunkCount">{}</b></span></div>"#,
        state.document_count, state.chunk_count
    )
}

// ---------------------------------------------------------------------------
// Upload and database panels
// ---------------------------------------------------------------------------

pub fn file_preview(files: &[SelectedFile]) -> String {
    if files.is_empty() {
        return r#"<div id="filePreview" style="display:none"></div>"#.to_string();
    }
    let mut out = String::from(r#"<div id="filePreview"><div id="fileList">"#);
    for f in files {
        let _ = write!(
            out,
            r#"<div class="file-item"><span>{}</span><small class="text-muted">{}</small></div>"#,
            escape_html(&f.name),
            f.size_label()
        );
    }
    out.push_str(
        r#"</div><form method="post" action="/files/clear"><button type="submit" class="btn btn-secondary" id="clearFiles">Clear</button></form></div>"#,
    );
    out
}

fn upload_panel(state: &UiState) -> String {
    let button = if state.busy.upload {
        r#"<button type="submit" class="btn" disabled><span class="spinner-border" role="status" aria-hidden="true"></span> Uploading...</button>"#
    } else {
        r#"<button type="submit" class="btn">Upload</button>"#
    };
    format!(
        r#"<form method="post" action="/files">
    <textarea name="paths" rows="3" placeholder="One local file path per line"></textarea>
    <button type="submit" class="btn btn-secondary">Select files</button>
  </form>
  {preview}
  <form method="post" action="/upload" id="uploadForm">{button}</form>
  <div id="uploadStatus">{status}</div>"#,
        preview = file_preview(&state.selection),
        status = state
            .upload_status
            .as_ref()
            .map(|b| banner(b, "upload"))
            .unwrap_or_default(),
    )
}

fn database_panel(state: &UiState) -> String {
    let disabled = if state.busy.populate { " disabled" } else { "" };
    format!(
        r#"<form method="post" action="/populate">
    <label class="text-muted"><input type="checkbox" name="reset" value="1" id="resetCheck"> Reset database</label><br>
    <button type="submit" class="btn" id="populateBtn"{disabled}>Populate database</button>
  </form>
  <form method="post" action="/diagnose"><button type="submit" class="btn btn-secondary">Check pipeline</button></form>
  <div id="dbStatus">{status}</div>"#,
        status = state
            .db_status
            .as_ref()
            .map(|b| banner(b, "db"))
            .unwrap_or_default(),
    )
}

/// Render a status banner. `target` names it for the dismiss form.
pub fn banner(b: &Banner, target: &str) -> String {
    if b.level == BannerLevel::Progress {
        return format!(
            r#"<div class="alert alert-info"><span class="spinner-border" role="status"></span> {}</div>"#,
            escape_html(&b.text)
        );
    }
    let class = match b.level {
        BannerLevel::Success => "alert-success",
        BannerLevel::Warning => "alert-warning",
        BannerLevel::Danger | BannerLevel::Progress => "alert-danger",
    };
    let mut details = String::new();
    if !b.details.is_empty() {
        details.push_str(r#"<div class="mt-2">"#);
        let lines: Vec<String> = b
            .details
            .iter()
            .map(|d| format!("<small>{}</small>", escape_html(d)))
            .collect();
        details.push_str(&lines.join("<br>"));
        details.push_str("</div>");
    }
    format!(
        r#"<div class="alert {class}" role="alert"><form method="post" action="/status/dismiss" style="display:inline"><input type="hidden" name="target" value="{target}"><button type="submit" class="btn-close" aria-label="Close">&times;</button></form>{text}{details}</div>"#,
        text = escape_html(&b.text),
    )
}

// ---------------------------------------------------------------------------
// Chat and sources
// ---------------------------------------------------------------------------

pub const EMPTY_STATE: &str = r#"<div class="empty-state"><h5>No messages yet</h5><p>Ask a question about your documents to get started</p></div>"#;

pub fn transcript(entries: &[ChatEntry]) -> String {
    if entries.is_empty() {
        return EMPTY_STATE.to_string();
    }
    let last = entries.len() - 1;
    entries
        .iter()
        .enumerate()
        .map(|(i, e)| entry(e, i == last))
        .collect()
}

pub fn entry(e: &ChatEntry, latest: bool) -> String {
    let id = if latest { format!(r#" id="{LATEST_ANCHOR}""#) } else { String::new() };
    let text = escape_html(&e.text);
    let time = e.time_label();
    match e.kind {
        EntryKind::User => format!(
            r#"<div class="user-message"{id}><strong>You:</strong> {text}<small class="message-time">{time}</small></div>"#
        ),
        EntryKind::Assistant => format!(
            r#"<div class="bot-message"{id}><strong>Assistant:</strong> {text}<small class="message-time">{time}</small></div>"#
        ),
        EntryKind::Error => format!(
            r#"<div class="bot-message alert alert-danger"{id}>{text}<small class="message-time">{time}</small></div>"#
        ),
        EntryKind::Typing => format!(
            r#"<div class="bot-message typing-indicator"{id}><span></span><span></span><span></span></div>"#
        ),
    }
}

fn chat_panel(state: &UiState) -> String {
    let disabled = if state.busy.query { " disabled" } else { "" };
    let autofocus = if state.focus_question { " autofocus" } else { "" };
    format!(
        r#"<div id="chatContainer">{transcript}</div>
  <form method="post" action="/query" id="queryForm">
    <input type="text" name="question" id="questionInput" placeholder="Ask a question about your documents" value="{draft}"{disabled}{autofocus}>
    <button type="submit" class="btn" id="askButton"{disabled}>Ask</button>
  </form>
  <form method="post" action="/chat/clear"><button type="submit" class="btn btn-secondary" id="clearChat">Clear chat</button></form>"#,
        transcript = transcript(&state.transcript),
        draft = escape_html(&state.question_draft),
    )
}

pub fn sources_list(sources: &[String]) -> String {
    if sources.is_empty() {
        return String::new();
    }
    let items: String = sources
        .iter()
        .map(|s| format!(r#"<li class="list-group-item source-item">{}</li>"#, escape_html(s)))
        .collect();
    format!(r#"<h6>Sources:</h6><ul class="list-group">{items}</ul>"#)
}

fn sources_panel(state: &UiState) -> String {
    format!(
        r#"<small class="text-muted" id="sourcesCount">{}</small><div id="sourcesContainer">{}</div>"#,
        state.source_caption,
        sources_list(&state.sources)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::QueryResponse;
    use crate::error::DocchatError;
    use crate::state::Operation;
    use chrono::Local;
    use proptest::prelude::*;

    fn count(haystack: &str, needle: &str) -> usize {
        haystack.matches(needle).count()
    }

    #[test]
    fn escape_covers_markup_characters() {
        assert_eq!(
            escape_html(r#"<a href="x">'&'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&#x27;&amp;&#x27;&lt;/a&gt;"
        );
        assert_eq!(escape_html("plain text"), "plain text");
    }

    proptest! {
        #[test]
        fn escaped_text_has_no_raw_markup(s in ".*") {
            let out = escape_html(&s);
            prop_assert!(!out.contains('<'));
            prop_assert!(!out.contains('>'));
            prop_assert!(!out.contains('"'));
        }
    }

    #[test]
    fn empty_transcript_renders_empty_state() {
        let html = page(&UiState::new());
        assert!(html.contains("No messages yet"));
        assert!(html.contains("0 documents referenced"));
    }

    #[test]
    fn two_sources_render_two_items() {
        let mut s = UiState::new();
        s.query_started("q", Local::now());
        s.query_succeeded(
            &QueryResponse {
                response: "answer".into(),
                sources: Some(vec!["doc1.pdf".into(), "doc2.pdf".into()]),
            },
            Local::now(),
        );
        let html = page(&s);
        assert_eq!(count(&html, r#"class="list-group-item source-item""#), 2);
        assert!(html.contains("doc1.pdf"));
        assert!(html.contains("doc2.pdf"));
        assert!(html.contains("2 documents referenced"));
    }

    #[test]
    fn no_sources_renders_zero_items() {
        let mut s = UiState::new();
        s.query_started("q", Local::now());
        s.query_succeeded(&QueryResponse { response: "a".into(), sources: None }, Local::now());
        let html = page(&s);
        assert_eq!(count(&html, "source-item\""), 0);
        assert!(html.contains("No sources referenced"));
    }

    #[test]
    fn server_text_is_escaped_everywhere() {
        let mut s = UiState::new();
        s.query_started("<b>q</b>", Local::now());
        s.query_succeeded(
            &QueryResponse {
                response: "<script>alert(1)</script>".into(),
                sources: Some(vec!["<img src=x>".into()]),
            },
            Local::now(),
        );
        let html = page(&s);
        assert!(!html.contains("<script>alert(1)</script>"));
        assert!(!html.contains("<img src=x>"));
        assert!(!html.contains("<b>q</b>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn typing_placeholder_rendered_while_in_flight() {
        let mut s = UiState::new();
        assert!(s.try_begin(Operation::Query));
        s.query_started("q", Local::now());
        let html = page(&s);
        assert_eq!(count(&html, "typing-indicator\""), 1);
        assert!(html.contains(r#"id="askButton" disabled"#));
        assert!(html.contains("http-equiv=\"refresh\""));
    }

    #[test]
    fn latest_entry_carries_anchor() {
        let mut s = UiState::new();
        s.query_started("q", Local::now());
        s.query_failed(&DocchatError::Transport("down".into()), Local::now());
        let html = transcript(&s.transcript);
        assert_eq!(count(&html, LATEST_ANCHOR), 1);
        let anchor_at = html.find(LATEST_ANCHOR).unwrap();
        assert!(html[anchor_at..].contains("Error: down"));
    }

    #[test]
    fn busy_upload_shows_spinner() {
        let mut s = UiState::new();
        assert!(s.try_begin(Operation::Upload));
        let html = page(&s);
        assert!(html.contains("Uploading..."));
        assert!(html.contains("spinner-border"));
    }

    #[test]
    fn preview_hidden_without_selection() {
        assert!(file_preview(&[]).contains("display:none"));
        let html = file_preview(&[SelectedFile { name: "a&b.pdf".into(), path: "a".into(), size_bytes: 2048 }]);
        assert!(html.contains("a&amp;b.pdf"));
        assert!(html.contains("2.0 KB"));
    }

    #[test]
    fn populate_banner_lists_counts() {
        let b = Banner::new(BannerLevel::Success, "done").with_details(vec!["Documents: 5".into(), "Chunks: 42".into()]);
        let html = banner(&b, "db");
        assert!(html.contains("alert-success"));
        assert!(html.contains("<small>Documents: 5</small><br><small>Chunks: 42</small>"));
        assert!(html.contains(r#"name="target" value="db""#));
    }
}
