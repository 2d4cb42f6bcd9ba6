use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Text,
    TagOpen,
    TagClose,
    OutputOpen,
    OutputClose,
    Comment,
    /// `-` right after an opening delimiter.
    TrimLeft,
    /// `-` right before a closing delimiter.
    TrimRight,
    /// Inner text of a tag or output, trim markers excluded.
    Source,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub lexeme: &'a str,
    pub offset: usize,
}

#[derive(Clone, Copy)]
enum Delim {
    Tag,
    Output,
    Comment,
}

/// A delimited span `{? ... ?}` located in the source.
#[derive(Clone, Copy)]
struct Span {
    start: usize,
    inner: (usize, usize),
    end: usize,
    trim_left: bool,
    trim_right: bool,
}

/// 将模板源码切分为词法单元
pub fn tokenize(source: &str) -> Result<Vec<Token<'_>>> {
    let mut lexer = Lexer {
        source,
        pos: 0,
        tokens: Vec::new(),
    };
    lexer.run()?;
    Ok(lexer.tokens)
}

struct Lexer<'a> {
    source: &'a str,
    pos: usize,
    tokens: Vec<Token<'a>>,
}

impl<'a> Lexer<'a> {
    fn run(&mut self) -> Result<()> {
        while self.pos < self.source.len() {
            let rest = &self.source[self.pos..];
            let Some((idx, delim)) = find_open(rest) else {
                self.push(TokenKind::Text, self.pos, self.source.len());
                break;
            };
            if idx > 0 {
                self.push(TokenKind::Text, self.pos, self.pos + idx);
            }
            self.pos += idx;
            match delim {
                Delim::Comment => self.lex_comment()?,
                Delim::Output => {
                    let span = self.delimited("{{", "}}")?;
                    self.emit(span, TokenKind::OutputOpen, TokenKind::OutputClose);
                }
                Delim::Tag => self.lex_tag()?,
            }
        }
        Ok(())
    }

    fn push(&mut self, kind: TokenKind, start: usize, end: usize) {
        self.tokens.push(Token {
            kind,
            lexeme: &self.source[start..end],
            offset: start,
        });
    }

    fn lex_comment(&mut self) -> Result<()> {
        let start = self.pos;
        let inner = start + 2;
        let close = self.source[inner..]
            .find("#}")
            .ok_or_else(|| Error::syntax("Unterminated comment, expected '#}'", start))?
            + inner;
        let body = &self.source[inner..close];
        if body.starts_with('-') {
            self.push(TokenKind::TrimLeft, inner, inner + 1);
        }
        self.push(TokenKind::Comment, start, close + 2);
        if body.len() > 1 && body.ends_with('-') {
            self.push(TokenKind::TrimRight, close - 1, close);
        }
        self.pos = close + 2;
        Ok(())
    }

    fn lex_tag(&mut self) -> Result<()> {
        let span = self.delimited("{%", "%}")?;
        let (s, e) = span.inner;
        match self.source[s..e].trim() {
            "raw" => self.verbatim(span, "raw", TokenKind::Text),
            "comment" => self.verbatim(span, "comment", TokenKind::Comment),
            _ => {
                self.emit(span, TokenKind::TagOpen, TokenKind::TagClose);
                Ok(())
            }
        }
    }

    /// Locates the closing delimiter of the construct starting at `self.pos`
    /// and advances past it.
    fn delimited(&mut self, open: &str, close: &str) -> Result<Span> {
        let start = self.pos;
        let inner_start = start + open.len();
        let end = find_close(&self.source[inner_start..], close)
            .ok_or_else(|| {
                Error::syntax(
                    format!("Unterminated '{}', expected '{}'", open, close),
                    start,
                )
            })?
            + inner_start;
        let mut s = inner_start;
        let mut e = end;
        let trim_left = self.source[s..e].starts_with('-');
        if trim_left {
            s += 1;
        }
        let trim_right = e > s && self.source[s..e].ends_with('-');
        if trim_right {
            e -= 1;
        }
        self.pos = end + close.len();
        Ok(Span {
            start,
            inner: (s, e),
            end: self.pos,
            trim_left,
            trim_right,
        })
    }

    fn emit(&mut self, span: Span, open: TokenKind, close: TokenKind) {
        let (s, e) = span.inner;
        let open_end = if span.trim_left { s - 1 } else { s };
        self.push(open, span.start, open_end);
        if span.trim_left {
            self.push(TokenKind::TrimLeft, s - 1, s);
        }
        self.push(TokenKind::Source, s, e);
        if span.trim_right {
            self.push(TokenKind::TrimRight, e, e + 1);
        }
        let close_start = if span.trim_right { e + 1 } else { e };
        self.push(close, close_start, span.end);
    }

    /// `{% raw %}` / `{% comment %}` bodies are taken verbatim up to the
    /// matching `{% endraw %}` / `{% endcomment %}`.
    fn verbatim(&mut self, open: Span, name: &str, kind: TokenKind) -> Result<()> {
        let closer = format!("end{}", name);
        let Some((close_start, close)) = find_end_tag(self.source, open.end, &closer) else {
            return Err(Error::syntax(
                format!("Unterminated '{}' block, expected '{{% {} %}}'", name, closer),
                open.start,
            ));
        };
        if open.trim_left {
            self.push(TokenKind::TrimLeft, open.inner.0 - 1, open.inner.0);
        }
        match kind {
            TokenKind::Text => {
                if open.trim_right {
                    self.push(TokenKind::TrimRight, open.inner.1, open.inner.1 + 1);
                }
                self.push(TokenKind::Text, open.end, close_start);
                if close.trim_left {
                    self.push(TokenKind::TrimLeft, close.inner.0 - 1, close.inner.0);
                }
            }
            _ => self.push(kind, open.start, close.end),
        }
        if close.trim_right {
            self.push(TokenKind::TrimRight, close.inner.1, close.inner.1 + 1);
        }
        self.pos = close.end;
        Ok(())
    }
}

fn find_open(s: &str) -> Option<(usize, Delim)> {
    let bytes = s.as_bytes();
    let mut from = 0;
    while let Some(off) = s[from..].find('{') {
        let at = from + off;
        match bytes.get(at + 1) {
            Some(b'%') => return Some((at, Delim::Tag)),
            Some(b'{') => return Some((at, Delim::Output)),
            Some(b'#') => return Some((at, Delim::Comment)),
            _ => from = at + 1,
        }
    }
    None
}

/// Finds `close` outside string literals and balanced braces.
fn find_close(s: &str, close: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let close = close.as_bytes();
    let mut quote: Option<u8> = None;
    let mut depth = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == b'\\' {
                i += 2;
                continue;
            }
            if b == q {
                quote = None;
            }
        } else if depth == 0 && bytes[i..].starts_with(close) {
            return Some(i);
        } else {
            match b {
                b'\'' | b'"' => quote = Some(b),
                b'{' => depth += 1,
                b'}' if depth > 0 => depth -= 1,
                _ => {}
            }
        }
        i += 1;
    }
    None
}

/// Searches for `{%-? closer -?%}` starting at `from`.
fn find_end_tag(source: &str, from: usize, closer: &str) -> Option<(usize, Span)> {
    let mut cursor = from;
    while let Some(off) = source[cursor..].find("{%") {
        let start = cursor + off;
        let mut i = start + 2;
        let trim_left = source[i..].starts_with('-');
        if trim_left {
            i += 1;
        }
        let inner_start = i;
        let rest = &source[i..];
        let body = rest.trim_start();
        if let Some(after) = body.strip_prefix(closer) {
            let after_trimmed = after.trim_start();
            let (trim_right, tail) = match after_trimmed.strip_prefix('-') {
                Some(tail) => (true, tail),
                None => (false, after_trimmed),
            };
            if tail.starts_with("%}") {
                let close_at = source.len() - tail.len();
                let inner_end = if trim_right { close_at - 1 } else { close_at };
                return Some((
                    start,
                    Span {
                        start,
                        inner: (inner_start, inner_end),
                        end: close_at + 2,
                        trim_left,
                        trim_right,
                    },
                ));
            }
        }
        cursor = start + 2;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use TokenKind::*;

    fn kinds(source: &str) -> Vec<(TokenKind, &str)> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| (t.kind, t.lexeme))
            .collect()
    }

    #[test]
    fn test_plain_text() {
        assert_eq!(kinds("hello { world }"), vec![(Text, "hello { world }")]);
        assert!(tokenize("").unwrap().is_empty());
    }

    #[test]
    fn test_tag_and_output() {
        assert_eq!(
            kinds("a{% if x %}b{{ y }}"),
            vec![
                (Text, "a"),
                (TagOpen, "{%"),
                (Source, " if x "),
                (TagClose, "%}"),
                (Text, "b"),
                (OutputOpen, "{{"),
                (Source, " y "),
                (OutputClose, "}}"),
            ]
        );
    }

    #[test]
    fn test_trim_markers() {
        assert_eq!(
            kinds("{%- x -%}{{-y-}}"),
            vec![
                (TagOpen, "{%"),
                (TrimLeft, "-"),
                (Source, " x "),
                (TrimRight, "-"),
                (TagClose, "%}"),
                (OutputOpen, "{{"),
                (TrimLeft, "-"),
                (Source, "y"),
                (TrimRight, "-"),
                (OutputClose, "}}"),
            ]
        );
    }

    #[test]
    fn test_braces_and_quotes_inside_output() {
        assert_eq!(
            kinds("{{ {} }}"),
            vec![(OutputOpen, "{{"), (Source, " {} "), (OutputClose, "}}")]
        );
        assert_eq!(
            kinds("{{ '}}' }}!"),
            vec![
                (OutputOpen, "{{"),
                (Source, " '}}' "),
                (OutputClose, "}}"),
                (Text, "!")
            ]
        );
        assert_eq!(kinds("{{ {'a': 1}}}")[1], (Source, " {'a': 1}"));
    }

    #[test]
    fn test_comments() {
        assert_eq!(kinds("{# note #}"), vec![(Comment, "{# note #}")]);
        assert_eq!(
            kinds("a {#- x -#} b"),
            vec![
                (Text, "a "),
                (TrimLeft, "-"),
                (Comment, "{#- x -#}"),
                (TrimRight, "-"),
                (Text, " b")
            ]
        );
        assert_eq!(
            kinds("{% comment %}{{ x }}{% endcomment %}"),
            vec![(Comment, "{% comment %}{{ x }}{% endcomment %}")]
        );
    }

    #[test]
    fn test_raw_block() {
        assert_eq!(
            kinds("{% raw %}{{ x }}{% endraw %}!"),
            vec![(Text, "{{ x }}"), (Text, "!")]
        );
        assert_eq!(
            kinds("{% raw -%} a {%- endraw %}"),
            vec![(TrimRight, "-"), (Text, " a "), (TrimLeft, "-")]
        );
    }

    #[test]
    fn test_unterminated() {
        let err = tokenize("ab{% if x").unwrap_err();
        assert_eq!(err.offset(), Some(2));
        assert!(err.message().contains("Unterminated"));
        assert!(tokenize("{{ x").is_err());
        assert!(tokenize("{# x").is_err());
        assert!(tokenize("{% raw %}x{% endrawx %}").is_err());
    }
}
