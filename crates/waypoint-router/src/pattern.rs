//! Path template compilation.
//!
//! A template is a `/`-separated path in which any part may be a placeholder:
//!
//! - `/home/profile` - literal path
//! - `/home/{uid}` - parameter `uid`, matches `\w+`
//! - `/home/{uid:\d+}` - parameter `uid`, matches the fragment `\d+`
//!
//! Leading and trailing slashes of the template are ignored and the incoming
//! path may always end with a single optional `/`.
//!
//! The Perl classes `\w`, `\d` and `\s` (and their negations) match ASCII
//! only, in the default constraint as well as in custom ones. Expressions keep
//! the text the template was written with; the rewrite only affects the regex
//! that is actually run.

use regex::Regex;
use tracing::{debug, trace};

use crate::error::{Result, RouterError};

/// Fragment used by placeholders that do not carry a constraint.
pub const DEFAULT_CONSTRAINT: &str = r"\w+";

/// A compiled path template.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    /// The original template.
    template: String,
    /// Anchored match expression.
    expression: String,
    /// `expression` with ASCII-only Perl classes, the source of `regex`.
    source: String,
    regex: Regex,
    /// Parameter names in placeholder order, `None` for literal templates.
    param_names: Option<Vec<String>>,
    /// Capture group index of each placeholder.
    param_groups: Vec<usize>,
}

impl CompiledPattern {
    /// Compiles a path template.
    ///
    /// # Example
    ///
    /// ```
    /// use waypoint_router::CompiledPattern;
    ///
    /// let pattern = CompiledPattern::compile("/home/{uid:\\d+}/{tab}").unwrap();
    /// assert_eq!(pattern.expression(), r"^/home/(\d+)/(\w+)/?$");
    /// assert_eq!(pattern.param_names(), Some(&["uid".to_string(), "tab".to_string()][..]));
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::PatternSyntax`] for an empty template, unbalanced
    /// or nested braces, an empty or malformed placeholder name and a
    /// constraint that is not a valid regular expression.
    pub fn compile(template: &str) -> Result<Self> {
        if template.is_empty() {
            return Err(RouterError::syntax(template, "template is empty"));
        }

        let mut body = String::new();
        let mut source = String::new();
        let mut names = Vec::new();
        let mut param_groups = Vec::new();
        let mut next_group = 1;
        let mut rest = template.trim_matches('/');

        while let Some(open) = rest.find(|c: char| c == '{' || c == '}') {
            let (literal, tail) = rest.split_at(open);
            let escaped = regex::escape(literal);
            body.push_str(&escaped);
            source.push_str(&escaped);

            if tail.starts_with('}') {
                return Err(RouterError::syntax(
                    template,
                    format!("unmatched `}}` after `{literal}`"),
                ));
            }

            let inner = &tail[1..];
            let close = inner.find(|c: char| c == '{' || c == '}').ok_or_else(|| {
                RouterError::syntax(template, format!("unterminated placeholder `{tail}`"))
            })?;
            if inner[close..].starts_with('{') {
                return Err(RouterError::syntax(
                    template,
                    format!("nested `{{` in placeholder `{{{}`", &inner[..close]),
                ));
            }

            let placeholder = &inner[..close];
            let (name, constraint) = placeholder.split_once(':').unwrap_or((placeholder, ""));
            check_name(template, name)?;
            let constraint = if constraint.is_empty() {
                DEFAULT_CONSTRAINT
            } else {
                constraint
            };
            let ascii = ascii_classes(constraint);
            let inner_groups = Regex::new(&ascii)
                .map_err(|e| {
                    RouterError::syntax(
                        template,
                        format!("invalid constraint for `{name}`: {e}"),
                    )
                })?
                .captures_len()
                - 1;

            body.push_str(&format!("({constraint})"));
            source.push_str(&format!("({ascii})"));
            names.push(name.to_string());
            param_groups.push(next_group);
            next_group += 1 + inner_groups;

            rest = &inner[close + 1..];
        }
        let rest = regex::escape(rest);
        body.push_str(&rest);
        source.push_str(&rest);

        let expression = format!("^/{body}/?$");
        let source = format!("^/{source}/?$");
        let regex =
            Regex::new(&source).map_err(|e| RouterError::syntax(template, e.to_string()))?;

        if has_duplicates(&names) {
            debug!(template, "template repeats a placeholder name, last value wins");
        }
        trace!(template, expression = %expression, "compiled path template");

        Ok(Self {
            template: template.to_string(),
            expression,
            source,
            regex,
            param_names: if names.is_empty() { None } else { Some(names) },
            param_groups,
        })
    }

    /// Returns the original template.
    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Returns the anchored match expression.
    #[must_use]
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Returns the parameter names, or `None` when the template is literal.
    #[must_use]
    pub fn param_names(&self) -> Option<&[String]> {
        self.param_names.as_deref()
    }

    /// Number of capture groups in the expression, group 0 included.
    pub(crate) fn captures_len(&self) -> usize {
        self.regex.captures_len()
    }

    /// Returns `true` if the path matches.
    #[must_use]
    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// Matches a path and returns the captured values in parameter order.
    ///
    /// A literal template yields an empty list on success.
    #[must_use]
    pub fn match_path(&self, path: &str) -> Option<Vec<String>> {
        let caps = self.regex.captures(path)?;
        Some(self.values_at(&caps, 0))
    }

    /// Reads the placeholder values out of `caps`, with this pattern's groups
    /// starting `offset` groups further in.
    fn values_at(&self, caps: &regex::Captures<'_>, offset: usize) -> Vec<String> {
        self.param_groups
            .iter()
            .map(|group| {
                caps.get(offset + group)
                    .map_or_else(String::new, |m| m.as_str().to_string())
            })
            .collect()
    }
}

impl PartialEq for CompiledPattern {
    fn eq(&self, other: &Self) -> bool {
        self.template == other.template
            && self.expression == other.expression
            && self.param_names == other.param_names
    }
}

impl Eq for CompiledPattern {}

fn check_name(template: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(RouterError::syntax(template, "empty placeholder name"));
    }
    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
    {
        return Err(RouterError::syntax(
            template,
            format!("invalid character `{bad}` in placeholder name `{name}`"),
        ));
    }
    Ok(())
}

/// Rewrites `\w`, `\d`, `\s`, `\W`, `\D` and `\S` in a regex fragment into
/// explicit ASCII sets.
///
/// `\d` becomes `[0-9]` and `\D` becomes `[^0-9]`. Inside a bracket class the
/// set is nested, so `[a\d]` becomes `[a[0-9]]`. Other escapes are copied
/// untouched.
fn ascii_classes(fragment: &str) -> String {
    let mut out = String::with_capacity(fragment.len());
    let mut chars = fragment.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(escaped) = chars.next() else {
            out.push(c);
            break;
        };
        let set = match escaped.to_ascii_lowercase() {
            'w' => "0-9A-Za-z_",
            'd' => "0-9",
            's' => r"\t\n\x0B\x0C\r ",
            _ => {
                out.push(c);
                out.push(escaped);
                continue;
            }
        };
        let negate = if escaped.is_ascii_uppercase() { "^" } else { "" };
        out.push_str(&format!("[{negate}{set}]"));
    }
    out
}

fn has_duplicates(names: &[String]) -> bool {
    names
        .iter()
        .enumerate()
        .any(|(i, name)| names[..i].contains(name))
}

/// Several templates joined into one alternation.
///
/// Every alternative is wrapped in its own capture group; the first wrapping
/// group that participates in a match tells which template matched. Group
/// offsets are taken from each compiled alternative, so constraints that
/// carry groups of their own do not shift the lookup.
#[derive(Debug, Clone)]
pub struct CombinedPattern {
    expression: String,
    regex: Regex,
    patterns: Vec<CompiledPattern>,
    offsets: Vec<usize>,
}

impl CombinedPattern {
    /// Compiles and combines templates, in order.
    ///
    /// # Example
    ///
    /// ```
    /// use waypoint_router::CombinedPattern;
    ///
    /// let combined = CombinedPattern::combine(["/a/{x}", "/b"]).unwrap();
    /// assert_eq!(combined.expression(), r"(^/a/(\w+)/?$)|(^/b/?$)");
    /// assert_eq!(combined.match_path("/b"), Some((1, vec![])));
    /// assert_eq!(combined.match_path("/a/5"), Some((0, vec!["5".to_string()])));
    /// ```
    ///
    /// # Errors
    ///
    /// Fails with the first template that does not compile.
    pub fn combine<I, S>(templates: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = templates
            .into_iter()
            .map(|t| CompiledPattern::compile(t.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Self::from_patterns(patterns)
    }

    /// Combines already compiled patterns.
    ///
    /// # Errors
    ///
    /// Fails if the joined expression exceeds the regex engine limits.
    pub fn from_patterns(patterns: Vec<CompiledPattern>) -> Result<Self> {
        let mut offsets = Vec::with_capacity(patterns.len());
        let mut next = 1;
        for pattern in &patterns {
            offsets.push(next);
            // one wrapping group plus the alternative's own groups
            next += pattern.captures_len();
        }

        let expression = patterns
            .iter()
            .map(|p| format!("({})", p.expression))
            .collect::<Vec<_>>()
            .join("|");
        let source = patterns
            .iter()
            .map(|p| format!("({})", p.source))
            .collect::<Vec<_>>()
            .join("|");
        let regex =
            Regex::new(&source).map_err(|e| RouterError::syntax(&expression, e.to_string()))?;

        Ok(Self {
            expression,
            regex,
            patterns,
            offsets,
        })
    }

    /// Returns the combined expression.
    #[must_use]
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Returns the parameter names of every alternative, in input order.
    #[must_use]
    pub fn params(&self) -> Vec<Option<&[String]>> {
        self.patterns.iter().map(CompiledPattern::param_names).collect()
    }

    /// Returns the compiled alternatives.
    #[must_use]
    pub fn patterns(&self) -> &[CompiledPattern] {
        &self.patterns
    }

    /// Number of alternatives.
    #[must_use]
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Returns `true` when nothing was combined.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Matches a path and returns the index of the first alternative that
    /// matched together with its captured values.
    #[must_use]
    pub fn match_path(&self, path: &str) -> Option<(usize, Vec<String>)> {
        let caps = self.regex.captures(path)?;
        let index = self.offsets.iter().position(|&o| caps.get(o).is_some())?;
        let values = self.patterns[index].values_at(&caps, self.offsets[index]);
        Some((index, values))
    }
}
