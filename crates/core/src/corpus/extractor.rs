//! Reference extraction: imports, requires and local hyperlinks.
//!
//! Extraction runs in two steps. A lexical pass produces a *masked* copy of
//! the text in which comments, code samples and string contents are blanked
//! with spaces (newlines are kept, so byte offsets and line numbers stay
//! valid). A single pattern per syntax is then matched against the masked
//! copy, and literals and raw text are read back from the original text at
//! the same offsets. Keywords inside comments or strings therefore never
//! match, while the path literal itself is still recovered.

use std::ops::Range;
use std::path::Path;
use std::sync::LazyLock;

use regex::bytes::{CaptureMatches, Captures, Regex};
use serde::Serialize;

use crate::index::types::RelationKind;

/// How a document's text is scanned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syntax {
    /// JavaScript/TypeScript family: imports, dynamic imports, `require`.
    Script,
    /// Markdown and other prose: inline links and link definitions.
    Markup,
    /// MDX: markdown links plus top-level `import`/`export` statements.
    Mixed,
}

impl Syntax {
    pub fn for_path(path: &str) -> Self {
        let ext = Path::new(path).extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext.to_ascii_lowercase().as_str() {
            "js" | "mjs" | "cjs" | "jsx" | "ts" | "mts" | "cts" | "tsx" => Self::Script,
            "mdx" => Self::Mixed,
            _ => Self::Markup,
        }
    }
}

/// A local reference found in a document, resolved but not yet validated
/// against the set of indexed documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Relation {
    pub kind: RelationKind,
    /// The path literal as written, minus any `#fragment` or `?query`.
    pub literal: String,
    /// `literal` joined onto the referencing document's directory.
    pub resolved_path: String,
    /// 1-based line of the start of the match.
    pub line_number: u32,
    /// The matched source text.
    pub raw_text: String,
}

const SCRIPT_PATTERN: &str = concat!(
    r#"(?P<dynamic>\bimport\s*\(\s*(?P<dq>"[^"\n]*"|'[^'\n]*'|`[^`\n]*`)\s*\))"#,
    r#"|(?P<static>\bimport\s+(?:[^;"'`()]*?\bfrom\s*)?(?P<sq>"[^"\n]*"|'[^'\n]*'))"#,
    r#"|(?P<reexport>\bexport\s+[^;"'`()]*?\bfrom\s*(?P<eq>"[^"\n]*"|'[^'\n]*'))"#,
    r#"|(?P<require>\brequire\s*\(\s*(?P<rq>"[^"\n]*"|'[^'\n]*')\s*\))"#,
);

// Link text may hold one level of brackets, so a badge such as
// `[![alt](./badge.svg)](./guide.md)` matches as a single link.
const MARKUP_PATTERN: &str = concat!(
    r#"(?P<inline>(?P<bang>!?)\[(?:[^\[\]\n]|!?\[[^\[\]\n]*\](?:\([^)\s]*\))?)*\]"#,
    r#"\(\s*(?P<target><[^>\n]*>|[^)\s]+)(?:\s+(?:"[^"\n]*"|'[^'\n]*'))?\s*\))"#,
    r#"|(?m:^[ \t]{0,3}\[[^\]\n]+\]:[ \t]*(?P<def><[^>\n]*>|\S+))"#,
);

static SCRIPT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(SCRIPT_PATTERN).expect("script relation pattern is valid"));

static MARKUP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(MARKUP_PATTERN).expect("markup relation pattern is valid"));

static MIXED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("{SCRIPT_PATTERN}|{MARKUP_PATTERN}"))
        .expect("mixed relation pattern is valid")
});

/// Masked view of one document, ready to yield relation candidates.
///
/// The scan is computed once; [`RelationScan::candidates`] can be called any
/// number of times and each call starts a fresh, lazy pass.
#[derive(Debug)]
pub struct RelationScan<'t> {
    text: &'t str,
    base_dir: String,
    syntax: Syntax,
    masked: Vec<u8>,
}

impl<'t> RelationScan<'t> {
    /// Prepare a scan of `text`, the content of the document at `path`
    /// (corpus-relative, forward slashes).
    pub fn new(text: &'t str, path: &str) -> Self {
        let syntax = Syntax::for_path(path);
        let masked = match syntax {
            Syntax::Script => mask_script(text.as_bytes()),
            Syntax::Markup | Syntax::Mixed => mask_markup(text.as_bytes()),
        };
        let base_dir = match path.rfind('/') {
            Some(i) => path[..i].to_string(),
            None => String::new(),
        };
        Self { text, base_dir, syntax, masked }
    }

    pub fn syntax(&self) -> Syntax {
        self.syntax
    }

    /// Iterate over the local relation candidates, in document order.
    pub fn candidates(&self) -> Relations<'_> {
        let pattern: &'static Regex = match self.syntax {
            Syntax::Script => &SCRIPT_RE,
            Syntax::Markup => &MARKUP_RE,
            Syntax::Mixed => &MIXED_RE,
        };
        Relations {
            text: self.text,
            masked: &self.masked,
            base_dir: &self.base_dir,
            matches: pattern.captures_iter(&self.masked),
            cursor: LineCursor { offset: 0, line: 1 },
        }
    }
}

/// Collect every local relation candidate of a document.
pub fn extract_relations(text: &str, path: &str) -> Vec<Relation> {
    RelationScan::new(text, path).candidates().collect()
}

/// Lazy iterator over the candidates of a [`RelationScan`].
pub struct Relations<'s> {
    text: &'s str,
    masked: &'s [u8],
    base_dir: &'s str,
    matches: CaptureMatches<'static, 's>,
    cursor: LineCursor,
}

impl Iterator for Relations<'_> {
    type Item = Relation;

    fn next(&mut self) -> Option<Relation> {
        for caps in self.matches.by_ref() {
            if let Some(relation) =
                build_relation(self.text, self.masked, self.base_dir, &mut self.cursor, &caps)
            {
                return Some(relation);
            }
        }
        None
    }
}

/// Tracks the line number of the last match so counting stays linear.
struct LineCursor {
    offset: usize,
    line: u32,
}

impl LineCursor {
    fn line_at(&mut self, masked: &[u8], offset: usize) -> u32 {
        let newlines = masked[self.offset..offset].iter().filter(|b| **b == b'\n').count();
        self.line += u32::try_from(newlines).unwrap_or(u32::MAX);
        self.offset = offset;
        self.line
    }
}

fn build_relation(
    text: &str,
    masked: &[u8],
    base_dir: &str,
    cursor: &mut LineCursor,
    caps: &Captures<'_>,
) -> Option<Relation> {
    let (kind, literal_range) = classify_match(caps)?;
    let whole = caps.get(0)?;

    let literal = clean_literal(text.get(literal_range)?);
    if !is_local(literal) {
        return None;
    }
    let resolved_path = resolve_relative(base_dir, literal)?;

    let line_number = cursor.line_at(masked, whole.start());
    let raw_text = text.get(whole.range())?.trim().to_string();

    Some(Relation { kind, literal: literal.to_string(), resolved_path, line_number, raw_text })
}

/// Decide the relation kind and where its literal sits (quotes excluded).
fn classify_match(caps: &Captures<'_>) -> Option<(RelationKind, Range<usize>)> {
    if caps.name("dynamic").is_some() {
        return Some((RelationKind::DynamicImport, unquote(caps.name("dq")?.range())));
    }
    if caps.name("static").is_some() {
        return Some((RelationKind::StaticImport, unquote(caps.name("sq")?.range())));
    }
    if caps.name("reexport").is_some() {
        return Some((RelationKind::StaticImport, unquote(caps.name("eq")?.range())));
    }
    if caps.name("require").is_some() {
        return Some((RelationKind::RequireStyle, unquote(caps.name("rq")?.range())));
    }
    if caps.name("inline").is_some() {
        // Images embed assets, they do not reference documents.
        if caps.name("bang").is_some_and(|b| !b.is_empty()) {
            return None;
        }
        let target = caps.name("target")?;
        return Some((RelationKind::Reference, unangle(target.as_bytes(), target.range())));
    }
    let def = caps.name("def")?;
    Some((RelationKind::Reference, unangle(def.as_bytes(), def.range())))
}

fn unquote(range: Range<usize>) -> Range<usize> {
    range.start + 1..range.end.saturating_sub(1).max(range.start + 1)
}

fn unangle(bytes: &[u8], range: Range<usize>) -> Range<usize> {
    if bytes.first() == Some(&b'<') && bytes.last() == Some(&b'>') {
        unquote(range)
    } else {
        range
    }
}

/// Drop `#fragment` and `?query` suffixes.
fn clean_literal(literal: &str) -> &str {
    let end = literal.find(['#', '?']).unwrap_or(literal.len());
    literal[..end].trim()
}

/// Only explicit relative paths count; package names and URLs do not.
fn is_local(literal: &str) -> bool {
    (literal.starts_with("./") || literal.starts_with("../")) && !literal.contains("${")
}

/// Join `literal` onto `base_dir`, folding `.` and `..` segments.
///
/// Returns `None` when the result would climb above the corpus root or is
/// empty.
pub fn resolve_relative(base_dir: &str, literal: &str) -> Option<String> {
    let mut stack: Vec<&str> = base_dir.split(['/', '\\']).filter(|s| !s.is_empty()).collect();

    for segment in literal.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                stack.pop()?;
            }
            s => stack.push(s),
        }
    }

    if stack.is_empty() { None } else { Some(stack.join("/")) }
}

fn blank(out: &mut [u8], range: Range<usize>) {
    for b in &mut out[range] {
        if *b != b'\n' {
            *b = b' ';
        }
    }
}

fn find_from(haystack: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    haystack.get(from..)?.windows(needle.len()).position(|w| w == needle).map(|p| p + from)
}

/// Blank comments and the contents of string and template literals.
fn mask_script(src: &[u8]) -> Vec<u8> {
    let mut out = src.to_vec();
    let mut i = 0;

    while i < src.len() {
        match src[i] {
            b'/' if src.get(i + 1) == Some(&b'/') => {
                let end = find_from(src, i, b"\n").unwrap_or(src.len());
                blank(&mut out, i..end);
                i = end;
            }
            b'/' if src.get(i + 1) == Some(&b'*') => {
                let end = find_from(src, i + 2, b"*/").map_or(src.len(), |p| p + 2);
                blank(&mut out, i..end);
                i = end;
            }
            quote @ (b'"' | b'\'' | b'`') => {
                let (content_end, next) = string_end(src, i, quote);
                blank(&mut out, i + 1..content_end);
                i = next;
            }
            _ => i += 1,
        }
    }

    out
}

/// Returns (end of content, index after the literal). Plain strings stop at
/// an unescaped newline; template literals may span lines.
fn string_end(src: &[u8], open: usize, quote: u8) -> (usize, usize) {
    let mut j = open + 1;
    while j < src.len() {
        match src[j] {
            b'\\' => j += 2,
            b'\n' if quote != b'`' => return (j, j),
            c if c == quote => return (j, j + 1),
            _ => j += 1,
        }
    }
    (src.len(), src.len())
}

/// Blank fenced code blocks, inline code spans and HTML comments.
fn mask_markup(src: &[u8]) -> Vec<u8> {
    let mut out = src.to_vec();

    // Fenced blocks, line by line.
    let mut fence: Option<(u8, usize)> = None;
    let mut start = 0;
    while start < src.len() {
        let end = find_from(src, start, b"\n").map_or(src.len(), |p| p + 1);
        let line = &src[start..end];
        let indent = line.iter().take_while(|b| **b == b' ').count();
        let rest = &line[indent.min(line.len())..];
        let marker = rest.first().copied().filter(|c| *c == b'`' || *c == b'~');
        let run = marker.map_or(0, |m| rest.iter().take_while(|b| **b == m).count());

        match fence {
            None if indent <= 3 && run >= 3 => {
                fence = marker.map(|m| (m, run));
                blank(&mut out, start..end);
            }
            Some((m, len)) => {
                blank(&mut out, start..end);
                if marker == Some(m) && run >= len && rest[run..].iter().all(u8::is_ascii_whitespace)
                {
                    fence = None;
                }
            }
            None => {}
        }
        start = end;
    }

    // Inline code spans and HTML comments, on what is left.
    let mut i = 0;
    while i < out.len() {
        if out[i] == b'`' {
            let run = out[i..].iter().take_while(|b| **b == b'`').count();
            let paragraph_end = find_from(&out, i, b"\n\n").unwrap_or(out.len());
            match find_closing_run(&out[..paragraph_end], i + run, run) {
                Some(close) => {
                    blank(&mut out, i..close + run);
                    i = close + run;
                }
                None => i += run,
            }
        } else if out[i..].starts_with(b"<!--") {
            let end = find_from(&out, i + 4, b"-->").map_or(out.len(), |p| p + 3);
            blank(&mut out, i..end);
            i = end;
        } else {
            i += 1;
        }
    }

    out
}

/// Find a backtick run of exactly `len` starting at or after `from`.
fn find_closing_run(src: &[u8], from: usize, len: usize) -> Option<usize> {
    let mut j = from;
    while j < src.len() {
        if src[j] == b'`' {
            let run = src[j..].iter().take_while(|b| **b == b'`').count();
            if run == len {
                return Some(j);
            }
            j += run;
        } else {
            j += 1;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn render(relations: &[Relation]) -> String {
        relations
            .iter()
            .map(|r| {
                format!("{} {} {} -> {}", r.line_number, r.kind.as_str(), r.literal, r.resolved_path)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn extracts_all_script_forms_in_order() {
        let text = r#"import fs from "fs";
import { helper } from './lib/helper.js';
import './side-effect.js';
export * from "../shared/types.ts";
const lazy = () => import('./lazy.js');
const cfg = require("./config.cjs");
import {
  a,
  b,
} from './multi.js';
"#;
        let relations = extract_relations(text, "src/app/main.js");

        insta::assert_snapshot!(render(&relations), @r"
        2 static_import ./lib/helper.js -> src/app/lib/helper.js
        3 static_import ./side-effect.js -> src/app/side-effect.js
        4 static_import ../shared/types.ts -> src/shared/types.ts
        5 dynamic_import ./lazy.js -> src/app/lazy.js
        6 require_style ./config.cjs -> src/app/config.cjs
        7 static_import ./multi.js -> src/app/multi.js
        ");
    }

    #[test]
    fn ignores_comments_and_string_contents() {
        let text = r#"// import a from './commented.js';
/* require('./block.js')
   import('./block2.js') */
const s = "import x from './in-string.js'";
const t = `require('./in-template.js')`;
import real from './real.js';
"#;
        let relations = extract_relations(text, "index.ts");

        assert_eq!(relations.len(), 1);
        assert_eq!(relations[0].resolved_path, "real.js");
        assert_eq!(relations[0].line_number, 6);
        assert_eq!(relations[0].raw_text, "import real from './real.js'");
    }

    #[test]
    fn skips_non_local_references() {
        let text = r#"import React from 'react';
import x from '@scope/pkg/file.js';
const y = require('/abs/path.js');
const z = import(`./locale/${lang}.js`);
"#;
        assert!(extract_relations(text, "a.js").is_empty());
    }

    #[test]
    fn extracts_markdown_links() {
        let text = "# Readme\n\nSee [the guide](./guide.md#setup) and [up](../top.md \"Top\").\n\
                    External [site](https://example.com) and ![diagram](./diagram.png).\n\n\
                    [ref]: <./docs/ref.md>\n\
                    [![build](./badge.svg)](./install.md) and [a [nested] label](./nested.md)\n";
        let relations = extract_relations(text, "docs/readme.md");

        assert_eq!(render(&relations), "3 reference ./guide.md -> docs/guide.md\n\
             3 reference ../top.md -> top.md\n\
             6 reference ./docs/ref.md -> docs/docs/ref.md\n\
             7 reference ./install.md -> docs/install.md\n\
             7 reference ./nested.md -> docs/nested.md");
    }

    #[test]
    fn badge_links_reference_their_target_only() {
        let relations = extract_relations("[![status](./badge.svg)](./guide.md)\n", "readme.md");

        assert_eq!(relations.len(), 1);
        assert_eq!(relations[0].resolved_path, "guide.md");
        assert_eq!(relations[0].raw_text, "[![status](./badge.svg)](./guide.md)");
    }

    #[test]
    fn mdx_extracts_imports_and_links() {
        let text = "import Chart from './chart.jsx'\n\
                    export { meta } from '../meta.js'\n\n\
                    # Page\n\n\
                    See [setup](./setup.mdx).\n\n\
                    ```js\n\
                    import hidden from './hidden.js'\n\
                    ```\n";
        let relations = extract_relations(text, "docs/page.mdx");

        assert_eq!(render(&relations), "1 static_import ./chart.jsx -> docs/chart.jsx\n\
             2 static_import ../meta.js -> meta.js\n\
             6 reference ./setup.mdx -> docs/setup.mdx");
    }

    #[test]
    fn ignores_links_inside_code() {
        let text = "Intro [a](./a.md)\n\n```md\n[b](./b.md)\n```\n\nInline `[c](./c.md)` here.\n\
                    <!-- [d](./d.md) -->\n~~~\nimport x from './e.js'\n~~~\n[f](./f.md)\n";
        let relations = extract_relations(text, "x.md");

        let targets: Vec<_> = relations.iter().map(|r| r.resolved_path.as_str()).collect();
        assert_eq!(targets, vec!["a.md", "f.md"]);
        assert_eq!(relations[1].line_number, 12);
    }

    #[test]
    fn markup_does_not_match_script_forms() {
        let text = "import x from './x.js'\nrequire('./y.js')\n";
        assert!(extract_relations(text, "notes.md").is_empty());
    }

    #[test]
    fn candidates_can_be_restarted() {
        let text = "[a](./a.md) [b](./b.md)";
        let scan = RelationScan::new(text, "index.md");

        let first: Vec<_> = scan.candidates().collect();
        let second: Vec<_> = scan.candidates().collect();
        assert_eq!(first.len(), 2);
        assert_eq!(first, second);

        let mut lazy = scan.candidates();
        assert_eq!(lazy.next().map(|r| r.resolved_path), Some("a.md".to_string()));
    }

    #[test]
    fn line_numbers_count_preceding_newlines() {
        let text = "\n\n[a](./a.md)\n\n\n[b](./b.md)";
        let relations = extract_relations(text, "x.md");
        assert_eq!(relations[0].line_number, 3);
        assert_eq!(relations[1].line_number, 6);
    }

    #[test]
    fn handles_multibyte_text() {
        let text = "// café ☕\nconst s = \"naïve ünïcode\";\nimport a from './ä.js';\n";
        let relations = extract_relations(text, "src/x.js");
        assert_eq!(relations.len(), 1);
        assert_eq!(relations[0].resolved_path, "src/ä.js");
        assert_eq!(relations[0].line_number, 3);
    }

    #[rstest]
    #[case("src/deep", "../lib/x.js", Some("src/lib/x.js"))]
    #[case("", "./b.js", Some("b.js"))]
    #[case("a/b", "./././c.md", Some("a/b/c.md"))]
    #[case("a", "../../escape.md", None)]
    #[case("a", "..", None)]
    #[case("a", ".\\win\\path.md", Some("a/win/path.md"))]
    fn resolves_relative_paths(
        #[case] base: &str,
        #[case] literal: &str,
        #[case] expected: Option<&str>,
    ) {
        assert_eq!(resolve_relative(base, literal).as_deref(), expected);
    }

    #[rstest]
    #[case("a.ts", Syntax::Script)]
    #[case("a.MJS", Syntax::Script)]
    #[case("rules/a.mdc", Syntax::Markup)]
    #[case("docs/page.MDX", Syntax::Mixed)]
    #[case("notes.txt", Syntax::Markup)]
    #[case("Makefile", Syntax::Markup)]
    fn picks_syntax_from_extension(#[case] path: &str, #[case] expected: Syntax) {
        assert_eq!(Syntax::for_path(path), expected);
    }
}
