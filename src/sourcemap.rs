//! Debug-map preserving code injection.
//!
//! Prepending the helper import to already-compiled code would shift every
//! generated position by one line and silently break the compiler's map.
//! This module decodes the map, rebuilds the code as a tree of chunks
//! annotated with original positions, prepends the import as an unmapped
//! chunk, and serializes code plus a fresh inline map. A failure anywhere in
//! that path must never break a build: the stitcher degrades to a plain
//! textual prepend and drops the map.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::trace::Trace;

lazy_static! {
    /// Inline or referenced debug-map markers: `//# sourceMappingURL=...`,
    /// `//@ sourceMappingURL=...` and the `/*` comment forms.
    static ref SOURCE_MAPPING_URL_RE: Regex =
        Regex::new(r"(?m)/[/*][@#]\s+sourceMappingURL=.+$").unwrap();
}

// ═══════════════════════════════════════════════════════════════════════════════
// V3 MAP RECORD
// ═══════════════════════════════════════════════════════════════════════════════

/// A V3 debug map as produced by the compiler.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SourceMap {
    pub version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_root: Option<String>,
    pub sources: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources_content: Option<Vec<Option<String>>>,
    pub names: Vec<String>,
    pub mappings: String,
}

// ═══════════════════════════════════════════════════════════════════════════════
// BASE64 VLQ
// ═══════════════════════════════════════════════════════════════════════════════

const VLQ_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

fn vlq_digit(byte: u8) -> Result<i64, String> {
    VLQ_CHARS
        .iter()
        .position(|&c| c == byte)
        .map(|i| i as i64)
        .ok_or_else(|| format!("invalid VLQ digit '{}'", byte as char))
}

/// Decode one VLQ value starting at `bytes[*pos]`, advancing `pos`.
fn vlq_decode(bytes: &[u8], pos: &mut usize) -> Result<i64, String> {
    let mut result: i64 = 0;
    let mut shift = 0u32;
    loop {
        if *pos >= bytes.len() {
            return Err("truncated VLQ segment".to_string());
        }
        let digit = vlq_digit(bytes[*pos])?;
        *pos += 1;
        result |= (digit & 0x1f) << shift;
        if digit & 0x20 == 0 {
            break;
        }
        shift += 5;
        if shift > 60 {
            return Err("VLQ segment too long".to_string());
        }
    }
    let value = result >> 1;
    Ok(if result & 1 == 1 { -value } else { value })
}

fn vlq_encode(value: i64, out: &mut String) {
    let mut vlq = if value < 0 {
        ((-value) << 1) | 1
    } else {
        value << 1
    };
    loop {
        let mut digit = vlq & 0x1f;
        vlq >>= 5;
        if vlq > 0 {
            digit |= 0x20;
        }
        out.push(VLQ_CHARS[digit as usize] as char);
        if vlq == 0 {
            break;
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MAPPING TOKENS
// ═══════════════════════════════════════════════════════════════════════════════

/// One decoded mapping segment with absolute positions.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Token {
    gen_line: u32,
    gen_col: u32,
    /// Source index, original line, original column.
    source: Option<(usize, u32, u32)>,
    name: Option<usize>,
}

/// Decode a `mappings` string into generated-position-ordered tokens.
fn decode_mappings(mappings: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut src: i64 = 0;
    let mut src_line: i64 = 0;
    let mut src_col: i64 = 0;
    let mut name: i64 = 0;

    for (gen_line, line) in mappings.split(';').enumerate() {
        let mut gen_col: i64 = 0;
        for segment in line.split(',') {
            if segment.is_empty() {
                continue;
            }
            let bytes = segment.as_bytes();
            let mut pos = 0;
            gen_col += vlq_decode(bytes, &mut pos)?;
            if gen_col < 0 {
                return Err("negative generated column".to_string());
            }
            let mut token = Token {
                gen_line: gen_line as u32,
                gen_col: gen_col as u32,
                source: None,
                name: None,
            };
            if pos < bytes.len() {
                src += vlq_decode(bytes, &mut pos)?;
                src_line += vlq_decode(bytes, &mut pos)?;
                src_col += vlq_decode(bytes, &mut pos)?;
                if src < 0 || src_line < 0 || src_col < 0 {
                    return Err("negative original position".to_string());
                }
                token.source = Some((src as usize, src_line as u32, src_col as u32));
                if pos < bytes.len() {
                    name += vlq_decode(bytes, &mut pos)?;
                    if name < 0 {
                        return Err("negative name index".to_string());
                    }
                    token.name = Some(name as usize);
                }
            }
            tokens.push(token);
        }
    }

    Ok(tokens)
}

// ═══════════════════════════════════════════════════════════════════════════════
// MAPPED NODE TREE
// ═══════════════════════════════════════════════════════════════════════════════

/// Generated code annotated with original positions: a tree of text chunks,
/// each either attributed to an original position or raw.
#[derive(Debug)]
struct MappedNode {
    chunks: Vec<Chunk>,
}

#[derive(Debug)]
enum Chunk {
    /// Text with no original-source attribution; debuggers step over it.
    Raw(String),
    /// Text attributed to one original position.
    Mapped {
        text: String,
        source: usize,
        line: u32,
        column: u32,
        name: Option<usize>,
    },
}

impl Chunk {
    fn text(&self) -> &str {
        match self {
            Chunk::Raw(text) => text,
            Chunk::Mapped { text, .. } => text,
        }
    }
}

fn split_lines_keep_ends(code: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut start = 0;
    for (i, byte) in code.bytes().enumerate() {
        if byte == b'\n' {
            lines.push(&code[start..=i]);
            start = i + 1;
        }
    }
    if start < code.len() {
        lines.push(&code[start..]);
    }
    lines
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn char_slice(text: &str, start: usize, end: usize) -> String {
    text.chars()
        .skip(start)
        .take(end.saturating_sub(start))
        .collect()
}

impl MappedNode {
    /// Split `code` at the decoded token columns, attributing each run of
    /// text to the token that covers it. Text before the first token of a
    /// line stays raw; tokens pointing past the end of a line are clamped.
    fn from_compiled(code: &str, tokens: &[Token]) -> MappedNode {
        let lines = split_lines_keep_ends(code);
        let mut chunks = Vec::new();
        let mut next = 0;

        for (line_no, line) in lines.iter().enumerate() {
            let line_len = char_len(line);
            let mut cursor = 0;

            while next < tokens.len() && tokens[next].gen_line as usize == line_no {
                let token = tokens[next];
                let start = (token.gen_col as usize).min(line_len);
                if start > cursor {
                    chunks.push(Chunk::Raw(char_slice(line, cursor, start)));
                }
                let end = if next + 1 < tokens.len()
                    && tokens[next + 1].gen_line as usize == line_no
                {
                    (tokens[next + 1].gen_col as usize).min(line_len).max(start)
                } else {
                    line_len
                };
                let text = char_slice(line, start, end);
                match token.source {
                    Some((source, line, column)) => chunks.push(Chunk::Mapped {
                        text,
                        source,
                        line,
                        column,
                        name: token.name,
                    }),
                    None => chunks.push(Chunk::Raw(text)),
                }
                cursor = end;
                next += 1;
            }

            if cursor < line_len {
                chunks.push(Chunk::Raw(char_slice(line, cursor, line_len)));
            }
        }

        MappedNode { chunks }
    }

    /// Prepend text that has no corresponding original position.
    fn prepend_raw(&mut self, text: &str) {
        self.chunks.insert(0, Chunk::Raw(text.to_string()));
    }

    /// Serialize back into text plus a fresh map targeted at `file`. The
    /// source and name tables are carried over from the input map.
    fn render(&self, file: &str, input: &SourceMap) -> (String, SourceMap) {
        let mut code = String::new();
        let mut mappings = String::new();
        let mut gen_col: i64 = 0;
        let mut prev_gen_col: i64 = 0;
        let mut prev_src: i64 = 0;
        let mut prev_line: i64 = 0;
        let mut prev_col: i64 = 0;
        let mut prev_name: i64 = 0;
        let mut line_has_segment = false;

        for chunk in &self.chunks {
            if let Chunk::Mapped {
                source,
                line,
                column,
                name,
                ..
            } = chunk
            {
                if line_has_segment {
                    mappings.push(',');
                }
                vlq_encode(gen_col - prev_gen_col, &mut mappings);
                prev_gen_col = gen_col;
                vlq_encode(*source as i64 - prev_src, &mut mappings);
                prev_src = *source as i64;
                vlq_encode(*line as i64 - prev_line, &mut mappings);
                prev_line = *line as i64;
                vlq_encode(*column as i64 - prev_col, &mut mappings);
                prev_col = *column as i64;
                if let Some(name) = name {
                    vlq_encode(*name as i64 - prev_name, &mut mappings);
                    prev_name = *name as i64;
                }
                line_has_segment = true;
            }

            let text = chunk.text();
            code.push_str(text);
            for ch in text.chars() {
                if ch == '\n' {
                    mappings.push(';');
                    gen_col = 0;
                    prev_gen_col = 0;
                    line_has_segment = false;
                } else {
                    gen_col += 1;
                }
            }
        }

        let map = SourceMap {
            version: 3,
            file: Some(file.to_string()),
            source_root: input.source_root.clone(),
            sources: input.sources.clone(),
            sources_content: input.sources_content.clone(),
            names: input.names.clone(),
            mappings,
        };

        (code, map)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// STITCHING
// ═══════════════════════════════════════════════════════════════════════════════

/// Prepend `prefix` to compiled `code`, keeping the debug map accurate.
///
/// On success the result carries exactly one inline base64 map marker as its
/// final line, with every mapping shifted past the prefix. On any failure
/// the map is dropped and the result is the plain concatenation; correctness
/// of the code takes priority over debuggability.
pub fn stitch(code: &str, map: &serde_json::Value, prefix: &str, trace: &Trace) -> String {
    match stitch_mapped(code, map, prefix) {
        Ok(stitched) => stitched,
        Err(reason) => {
            trace.warn(format!("error patching source map: {}", reason));
            format!("{}{}", prefix, code)
        }
    }
}

fn stitch_mapped(code: &str, map: &serde_json::Value, prefix: &str) -> Result<String, String> {
    let map: SourceMap = serde_json::from_value(map.clone()).map_err(|e| e.to_string())?;
    let file = map
        .file
        .clone()
        .ok_or_else(|| "map has no file attribute".to_string())?;

    let tokens = decode_mappings(&map.mappings)?;
    let mut node = MappedNode::from_compiled(code, &tokens);
    node.prepend_raw(prefix);
    let (rendered, out_map) = node.render(&file, &map);

    let json = serde_json::to_string(&out_map).map_err(|e| e.to_string())?;
    let mut out = SOURCE_MAPPING_URL_RE.replace_all(&rendered, "").into_owned();
    out.push_str("\n//# sourceMappingURL=data:application/json;charset=utf-8;base64,");
    out.push_str(&BASE64.encode(json));
    Ok(out)
}
